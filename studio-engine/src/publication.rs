//! Publishing, deleting and feedback.

use std::sync::Arc;

use studio_core::{ImageState, LayerEvent, LayerId, LayerStore, ReviewStage};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{AddMediaRequest, FeedbackUpdate, StudioApi};
use crate::config::StudioConfig;
use crate::error::{EngineError, EngineResult};
use crate::prefs::ReviewAskFile;

/// How a delete request was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The layer is gone.
    Removed(LayerId),
    /// Live images are unpublished outside the app; follow the guide.
    UnpublishGuide {
        /// Help page describing the manual steps.
        url: String,
    },
}

/// A settled publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// The new live layer.
    pub layer_id: LayerId,
    /// Final position in the product's media list.
    pub order: Option<u32>,
}

/// Publishes drafts as live product images and deletes generated ones.
#[derive(Clone)]
pub struct PublicationController {
    api: Arc<dyn StudioApi>,
    store: LayerStore,
    unpublish_guide_url: String,
    review_file: Option<ReviewAskFile>,
}

impl PublicationController {
    /// Create a controller over a shared store.
    #[must_use]
    pub fn new(api: Arc<dyn StudioApi>, store: LayerStore, config: &StudioConfig) -> Self {
        Self {
            api,
            store,
            unpublish_guide_url: config.unpublish_guide_url.clone(),
            review_file: config.feedback_path().map(ReviewAskFile::new),
        }
    }

    /// Publish a finished draft.
    ///
    /// An optimistic live layer appears immediately and is rolled back if
    /// the service refuses. The draft itself is never modified.
    ///
    /// # Errors
    ///
    /// Cap and precondition violations fail before any request is made.
    /// Service failures are returned after the rollback.
    pub async fn publish(&self, draft_id: &LayerId) -> EngineResult<Published> {
        let pending = self.store.begin_publish(draft_id)?;
        let product_id = pending.product_id.clone().ok_or_else(|| {
            EngineError::Validation(format!("Layer {draft_id} has no product"))
        })?;
        let request = AddMediaRequest {
            image_url: pending.image_url().unwrap_or_default().to_string(),
            task_id: pending.parent_task_id.clone(),
            variant_id: pending.variant_id.clone(),
            order: pending.order.unwrap_or_default(),
        };
        info!(
            "Publishing layer {draft_id} to product {product_id} as {}",
            pending.id
        );

        match self.api.add_media(&product_id, &request).await {
            Ok(media) => {
                let order = media.order.or(pending.order);
                self.store
                    .finish_publish(&pending.id, media.image_url, media.order)?;
                self.persist_feedback();
                info!("Layer {} is live (media {})", pending.id, media.id);
                Ok(Published {
                    layer_id: pending.id,
                    order,
                })
            }
            Err(e) => {
                warn!("Publishing layer {draft_id} failed, rolling back: {e}");
                if let Err(re) = self.store.remove(&pending.id) {
                    warn!("Rollback of {} failed: {re}", pending.id);
                }
                Err(e.into())
            }
        }
    }

    /// Publish in the background.
    #[must_use]
    pub fn spawn_publish(&self, draft_id: LayerId) -> JoinHandle<EngineResult<Published>> {
        let controller = self.clone();
        tokio::spawn(async move { controller.publish(&draft_id).await })
    }

    /// Delete a layer.
    ///
    /// Local-only layers are dropped directly. Generated layers are deleted
    /// on the service first and revert to their prior state if that fails.
    /// Live images are never deleted here.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Busy`] while another foreground operation runs,
    /// or the service error after reverting.
    pub async fn delete(&self, id: &LayerId) -> EngineResult<DeleteOutcome> {
        let _guard = self.store.try_begin_foreground()?;
        let layer = self
            .store
            .get(id)
            .ok_or_else(|| studio_core::CoreError::LayerNotFound(id.to_string()))?;

        if layer.is_live_image || layer.state() == ImageState::Live {
            debug!("Layer {id} is live, handing out the unpublish guide");
            return Ok(DeleteOutcome::UnpublishGuide {
                url: self.unpublish_guide_url.clone(),
            });
        }

        if layer.state().is_transient() {
            return Err(EngineError::Validation(format!(
                "Layer {id} is {}, wait for it to finish",
                layer.state()
            )));
        }

        let Some(task_id) = layer.generation.as_ref().map(|g| g.task_id.clone()) else {
            self.store.remove(id)?;
            debug!("Removed local layer {id}");
            return Ok(DeleteOutcome::Removed(id.clone()));
        };

        let prior = layer.state();
        self.store.transition(id, LayerEvent::Delete)?;
        match self.api.delete_generated(&[task_id]).await {
            Ok(()) => {
                self.store.remove(id)?;
                info!("Deleted generated layer {id}");
                Ok(DeleteOutcome::Removed(id.clone()))
            }
            Err(e) => {
                warn!("Deleting layer {id} failed, reverting to {prior}: {e}");
                self.store.transition(
                    id,
                    LayerEvent::DeleteFailed {
                        prior: Some(prior),
                    },
                )?;
                Err(e.into())
            }
        }
    }

    /// Record user feedback on a generation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for layers that were never
    /// generated, or the service error. The local copy changes only after
    /// the service accepts.
    pub async fn update_feedback(
        &self,
        id: &LayerId,
        feedback: Option<String>,
        comments: Option<String>,
    ) -> EngineResult<()> {
        let task_id = self
            .store
            .get(id)
            .and_then(|l| l.generation.map(|g| g.task_id))
            .ok_or_else(|| EngineError::Validation(format!("Layer {id} has no generation")))?;
        let update = FeedbackUpdate { feedback, comments };
        self.api.update_feedback(&task_id, &update).await?;
        self.store.set_feedback(id, update.feedback, update.comments)?;
        Ok(())
    }

    /// Check whether a review survey is due after publishing.
    pub fn check_review_prompt(&self) -> Option<ReviewStage> {
        let stage = self.store.check_review_prompt()?;
        self.persist_feedback();
        Some(stage)
    }

    fn persist_feedback(&self) {
        if let Some(file) = &self.review_file {
            file.save(&self.store.feedback());
        }
    }
}
