//! Shared application state.

use std::sync::Arc;

use kirana_db::{DbConfig, DbResult, PlatformDb, TenantRegistry};
use tracing::info;

use crate::auth::JwtManager;
use crate::config::ServerConfig;

/// State handed to every handler through `State<SharedState>`.
pub struct AppState {
    pub platform: PlatformDb,
    pub registry: TenantRegistry,
    pub jwt: JwtManager,
    pub config: ServerConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Opens (and migrates) the platform database and prepares an empty
    /// tenant registry. Tenant pools are opened on first use.
    pub async fn open(config: ServerConfig) -> DbResult<SharedState> {
        let platform = PlatformDb::open(DbConfig::new(config.platform_db_path.clone())).await?;
        info!(path = %config.platform_db_path.display(), "Platform database ready");
        Ok(Self::with_platform(platform, config))
    }

    pub fn with_platform(platform: PlatformDb, config: ServerConfig) -> SharedState {
        Arc::new(AppState {
            platform,
            registry: TenantRegistry::new(config.tenant_db_dir.clone()),
            jwt: JwtManager::new(config.jwt_secret.clone(), config.token_lifetime_secs),
            config,
        })
    }

    /// Closes every pool (graceful shutdown).
    pub async fn close(&self) {
        self.registry.close_all().await;
        self.platform.database().close().await;
    }
}
