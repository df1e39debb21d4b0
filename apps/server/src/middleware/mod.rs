//! Request middleware: tenant resolution, then section access.

pub mod access;
pub mod tenant;
