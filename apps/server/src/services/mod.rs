//! Operations that span the platform and tenant stores.

pub mod login;
pub mod vendor;
