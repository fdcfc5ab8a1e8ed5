use std::sync::Arc;

use anyhow::Context;

use labstock_core::DomainError;
use labstock_infra::{ImageStore, InventoryStore, StoreResult};

use crate::config::AppConfig;

/// Shared handles injected into every handler via `Extension`.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn InventoryStore>,
    pub images: ImageStore,
    /// Number of transactions reported by `/stats`.
    pub recent_limit: u32,
}

impl AppServices {
    pub fn new(store: Arc<dyn InventoryStore>, images: ImageStore, recent_limit: u32) -> Self {
        Self {
            store,
            images,
            recent_limit,
        }
    }

    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store = labstock_infra::connect(&config.database_url, config.stock_policy)
            .await
            .context("failed to open inventory store")?;
        let images = ImageStore::open(&config.upload_dir)
            .await
            .with_context(|| format!("failed to open upload dir {}", config.upload_dir.display()))?;

        tracing::info!(
            backend = store.backend(),
            upload_dir = %config.upload_dir.display(),
            stock_policy = ?config.stock_policy,
            "inventory services ready"
        );
        Ok(Self::new(store, images, config.recent_transactions))
    }

    /// A material may only point at an image that was uploaded.
    pub async fn ensure_image_stored(&self, name: Option<&str>) -> StoreResult<()> {
        let Some(name) = name else {
            return Ok(());
        };
        if self.images.exists(name).await? {
            Ok(())
        } else {
            Err(DomainError::validation(format!("image '{name}' has not been uploaded")).into())
        }
    }

    /// Remove a stored image once no material refers to it. Never fails the request.
    pub async fn discard_image(&self, name: &str) {
        match self.store.image_references(name).await {
            Ok(0) => {}
            Ok(count) => {
                tracing::debug!(image = name, count, "image still referenced; keeping file");
                return;
            }
            Err(e) => {
                tracing::warn!(image = name, error = %e, "failed to count image references");
                return;
            }
        }
        if let Err(e) = self.images.remove(name).await {
            tracing::warn!(image = name, error = %e, "failed to remove image");
        }
    }
}
