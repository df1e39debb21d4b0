//! # Tenant Resolution Rules
//!
//! Pure rules for deciding which vendor a request belongs to and which
//! sections of the shop that vendor may use.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Session token carries a tenant id  ──► use it (if still active)     │
//! │                    │ no                                                 │
//! │                    ▼                                                    │
//! │  2. X-Tenant-Code / X-Tenant header    ──► code                         │
//! │                    │ absent                                             │
//! │                    ▼                                                    │
//! │  3. Host ends with .{tenant_domain}    ──► first label of subdomain     │
//! │                    │ no                                                 │
//! │                    ▼                                                    │
//! │  4. Host has more than two labels      ──► first label                  │
//! │                    │ no                                                 │
//! │                    ▼                                                    │
//! │  No tenant (platform request)                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step 1 needs the database and lives in the server; steps 2-4 are
//! [`extract_tenant_code`].

use crate::types::Tenant;

/// Primary header carrying a tenant code.
pub const TENANT_CODE_HEADER: &str = "x-tenant-code";

/// Fallback header carrying a tenant code.
pub const TENANT_HEADER: &str = "x-tenant";

/// File extension appended to tenant database names.
pub const TENANT_DB_EXTENSION: &str = ".sqlite3";

/// Extracts a tenant code from a header value or the request host.
///
/// ## Arguments
/// * `header` - Value of `X-Tenant-Code` (or `X-Tenant`) if present
/// * `host` - The `Host` header, possibly with a port
/// * `tenant_domain` - Base domain vendors are served under, e.g. `kirana.np`
///
/// ## Example
/// ```rust
/// use kirana_core::tenant::extract_tenant_code;
///
/// assert_eq!(
///     extract_tenant_code(None, Some("ktm.kirana.np:8000"), Some("kirana.np")),
///     Some("ktm".to_string())
/// );
/// assert_eq!(
///     extract_tenant_code(Some("  KTM "), Some("localhost"), None),
///     Some("ktm".to_string())
/// );
/// assert_eq!(extract_tenant_code(None, Some("localhost:8000"), None), None);
/// ```
pub fn extract_tenant_code(
    header: Option<&str>,
    host: Option<&str>,
    tenant_domain: Option<&str>,
) -> Option<String> {
    if let Some(code) = header.map(str::trim).filter(|c| !c.is_empty()) {
        return Some(code.to_lowercase());
    }

    let host = host?.split(':').next()?.trim().to_lowercase();
    if host.is_empty() {
        return None;
    }

    if let Some(domain) = tenant_domain.map(str::trim).filter(|d| !d.is_empty()) {
        let suffix = format!(".{}", domain.to_lowercase());
        if let Some(sub) = host.strip_suffix(&suffix) {
            return sub
                .split('.')
                .next()
                .filter(|label| !label.is_empty())
                .map(str::to_string);
        }
    }

    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() > 2 && !parts[0].is_empty() {
        return Some(parts[0].to_string());
    }

    None
}

/// Registry key of a tenant's database connection.
pub fn tenant_alias(tenant_id: i64) -> String {
    format!("tenant_{}", tenant_id)
}

/// Default database name of a new vendor.
pub fn default_db_name(code: &str) -> String {
    format!("shop_{}", code)
}

/// File name of a tenant database, appending the extension when missing.
pub fn db_file_name(db_name: &str) -> String {
    if db_name.ends_with(TENANT_DB_EXTENSION) {
        db_name.to_string()
    } else {
        format!("{}{}", db_name, TENANT_DB_EXTENSION)
    }
}

// =============================================================================
// Sections
// =============================================================================

/// A shop section that vendors can be granted or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Customers,
    Inventory,
    Sales,
    Reports,
}

impl Section {
    /// Maps a request path to the section that guards it.
    ///
    /// ## Example
    /// ```rust
    /// use kirana_core::tenant::Section;
    ///
    /// assert_eq!(Section::from_path("/sales/api/create-sale"), Some(Section::Sales));
    /// assert_eq!(Section::from_path("/salesman"), None);
    /// assert_eq!(Section::from_path("/auth/login"), None);
    /// ```
    pub fn from_path(path: &str) -> Option<Section> {
        const RULES: [(&str, Section); 4] = [
            ("/customers", Section::Customers),
            ("/inventory", Section::Inventory),
            ("/sales", Section::Sales),
            ("/reports", Section::Reports),
        ];

        RULES.iter().find_map(|(prefix, section)| {
            let rest = path.strip_prefix(prefix)?;
            (rest.is_empty() || rest.starts_with('/')).then_some(*section)
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Customers => "customers",
            Section::Inventory => "inventory",
            Section::Sales => "sales",
            Section::Reports => "reports",
        }
    }
}

impl Tenant {
    /// Registry key of this tenant's connection.
    pub fn alias(&self) -> String {
        tenant_alias(self.id)
    }

    /// Whether this vendor may use a section.
    pub fn allows(&self, section: Section) -> bool {
        match section {
            Section::Customers => self.access_customers,
            Section::Inventory => self.access_inventory,
            Section::Sales => self.access_sales,
            Section::Reports => self.access_reports,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TenantStatus;
    use chrono::Utc;

    fn tenant() -> Tenant {
        let now = Utc::now();
        Tenant {
            id: 7,
            name: "Kathmandu Books".to_string(),
            code: "ktm".to_string(),
            owner_email: "owner@ktm.np".to_string(),
            db_name: "shop_ktm".to_string(),
            access_customers: true,
            access_vendors: true,
            access_inventory: false,
            access_sales: true,
            access_reports: false,
            admin_user_id: Some(2),
            status: TenantStatus::Active,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_header_wins_over_host() {
        let code = extract_tenant_code(Some("PKR"), Some("ktm.kirana.np"), Some("kirana.np"));
        assert_eq!(code.as_deref(), Some("pkr"));
    }

    #[test]
    fn test_blank_header_falls_back_to_host() {
        let code = extract_tenant_code(Some("   "), Some("ktm.kirana.np"), Some("kirana.np"));
        assert_eq!(code.as_deref(), Some("ktm"));
    }

    #[test]
    fn test_nested_subdomain_uses_first_label() {
        let code = extract_tenant_code(None, Some("pos.ktm.kirana.np"), Some("kirana.np"));
        assert_eq!(code.as_deref(), Some("pos"));
    }

    #[test]
    fn test_bare_tenant_domain_has_no_tenant() {
        assert_eq!(extract_tenant_code(None, Some("kirana.np"), Some("kirana.np")), None);
    }

    #[test]
    fn test_three_label_host_without_domain() {
        let code = extract_tenant_code(None, Some("Shop1.Example.com:443"), None);
        assert_eq!(code.as_deref(), Some("shop1"));
        assert_eq!(extract_tenant_code(None, Some("example.com"), None), None);
        assert_eq!(extract_tenant_code(None, None, None), None);
    }

    #[test]
    fn test_db_naming() {
        assert_eq!(tenant_alias(12), "tenant_12");
        assert_eq!(default_db_name("ktm"), "shop_ktm");
        assert_eq!(db_file_name("shop_ktm"), "shop_ktm.sqlite3");
        assert_eq!(db_file_name("shop_ktm.sqlite3"), "shop_ktm.sqlite3");
    }

    #[test]
    fn test_section_rules() {
        assert_eq!(Section::from_path("/customers"), Some(Section::Customers));
        assert_eq!(Section::from_path("/inventory/products/4"), Some(Section::Inventory));
        assert_eq!(Section::from_path("/reports/dashboard"), Some(Section::Reports));
        assert_eq!(Section::from_path("/superadmin/vendors"), None);
    }

    #[test]
    fn test_tenant_allows() {
        let t = tenant();
        assert_eq!(t.alias(), "tenant_7");
        assert!(t.allows(Section::Sales));
        assert!(t.allows(Section::Customers));
        assert!(!t.allows(Section::Inventory));
        assert!(!t.allows(Section::Reports));
    }
}
