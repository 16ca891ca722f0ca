use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use biblio_db::CatalogStore;

/// Context provided to modules during initialization
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
    pub db: &'a Arc<dyn CatalogStore>,
}

/// Schema migration contributed by a module
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// A feature module of the service.
///
/// Lifecycle: `init` → (migrations) → `start` → serve `routes` → `stop`.
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name; routes mount under `/api/{name}`
    fn name(&self) -> &'static str;

    /// Wire the module to the store and settings. Called before `routes`.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment (`paths` + `components.schemas`) merged into the service document
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Migrations in execution order
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
