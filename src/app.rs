use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use biblio_db::CatalogStore;
use biblio_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// A fully initialised service: settings, the catalogue store, and every
/// registered module wired to both.
pub struct App {
    settings: Settings,
    db: Arc<dyn CatalogStore>,
    registry: ModuleRegistry,
}

impl App {
    /// Connect the store, register modules, and run their `init` hooks.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let db = biblio_db::connect(&settings.database.endpoint)
            .with_context(|| format!("failed to open store '{}'", settings.database.endpoint))?;

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry)?;

        let ctx = InitCtx {
            settings: &settings,
            db: &db,
        };
        registry.init_all(&ctx).await?;

        Ok(Self {
            settings,
            db,
            registry,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.db
    }

    pub fn router(&self) -> Router {
        biblio_http::build_router(&self.registry, &self.settings)
    }

    /// Start modules, serve until shutdown, then stop modules in reverse order.
    pub async fn serve(self) -> anyhow::Result<()> {
        let ctx = InitCtx {
            settings: &self.settings,
            db: &self.db,
        };
        self.registry.start_all(&ctx).await?;

        let served = biblio_http::start_server(&self.registry, &self.settings).await;

        self.registry.stop_all().await?;
        served
    }
}
