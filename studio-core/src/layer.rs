//! Image layers and their lifecycle state machine.
//!
//! ```text
//! uploaded ⇄ selected ─┐
//!                      ├─ submit ─▶ processing ─┬─▶ confirm (batch) ─ accept ─▶ edit
//! edit / confirm / error┘                       ├─▶ edit (single)
//!                                               └─▶ error
//! publishing ─▶ live            (optimistic copy inserted by the publisher)
//! any settled state ─▶ deleting ─▶ removed, or back to the prior state
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult, ACCEPTED_EXTENSIONS, MAX_UPLOAD_BYTES};

/// Opaque layer identifier. Client generated for uploads and optimistic
/// inserts, server assigned for records loaded from the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(String);

impl LayerId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh client-side identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A local file picked by the user, not yet uploaded anywhere.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// File name including extension.
    pub name: String,
    /// MIME type.
    pub mime: String,
    /// Encoded file contents.
    pub bytes: Vec<u8>,
}

impl LocalFile {
    /// Create a local file.
    #[must_use]
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Lowercased extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Where a layer's pixels come from. Exactly one source is authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSource {
    /// A pending local file.
    Local(LocalFile),
    /// A remote URL, canonical once upload or generation completes.
    Remote(String),
}

impl LayerSource {
    /// The local file, if that is the authoritative source.
    #[must_use]
    pub fn file(&self) -> Option<&LocalFile> {
        match self {
            Self::Local(file) => Some(file),
            Self::Remote(_) => None,
        }
    }

    /// The remote URL, if that is the authoritative source.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Remote(url) => Some(url),
        }
    }

    /// Whether the source is a local file.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// Lifecycle state of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageState {
    /// Freshly picked local file.
    Uploaded,
    /// Marked as a reference image for a batch copy edit.
    Selected,
    /// Generation request in flight.
    Processing,
    /// Batch candidate awaiting user acceptance.
    Confirm,
    /// Generated and ready to view or publish.
    Edit,
    /// Generation failed; retry or discard.
    Error,
    /// Live-image creation in flight.
    Publishing,
    /// Published to the product's media.
    Live,
    /// Deletion in flight.
    Deleting,
}

impl ImageState {
    /// States with a network call in flight.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Processing | Self::Publishing | Self::Deleting)
    }

    /// States that count against the reference-image limit.
    #[must_use]
    pub fn is_reference_eligible(self) -> bool {
        matches!(self, Self::Uploaded | Self::Selected)
    }

    /// Lowercase name, as shown on state badges.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Selected => "selected",
            Self::Processing => "processing",
            Self::Confirm => "confirm",
            Self::Edit => "edit",
            Self::Error => "error",
            Self::Publishing => "publishing",
            Self::Live => "live",
            Self::Deleting => "deleting",
        }
    }

    /// The single transition function for layer lifecycle.
    ///
    /// `source` decides where a deselected layer returns to.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] for any pair not listed.
    pub fn next(self, event: &LayerEvent, source: &LayerSource) -> CoreResult<Self> {
        let next = match (self, event) {
            (Self::Uploaded | Self::Edit | Self::Confirm, LayerEvent::Select) => Self::Selected,
            (Self::Selected, LayerEvent::Deselect) => {
                if source.is_local() {
                    Self::Uploaded
                } else {
                    Self::Edit
                }
            }
            (state, LayerEvent::Submit) if !state.is_transient() && state != Self::Live => {
                Self::Processing
            }
            (Self::Processing, LayerEvent::Completed { batch: true }) => Self::Confirm,
            (Self::Processing, LayerEvent::Completed { batch: false }) => Self::Edit,
            (Self::Processing, LayerEvent::Failed) => Self::Error,
            (Self::Confirm, LayerEvent::Accept) => Self::Edit,
            (Self::Publishing, LayerEvent::PublishSucceeded) => Self::Live,
            (state, LayerEvent::Delete) if !state.is_transient() => Self::Deleting,
            (Self::Deleting, LayerEvent::DeleteFailed { prior }) => prior.unwrap_or(Self::Error),
            (from, event) => {
                return Err(CoreError::InvalidTransition {
                    from,
                    event: *event,
                })
            }
        };
        Ok(next)
    }
}

impl fmt::Display for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that drive [`ImageState::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerEvent {
    /// Mark as a reference image.
    Select,
    /// Unmark as a reference image.
    Deselect,
    /// Dispatch a generation request.
    Submit,
    /// The service completed and the result decoded.
    Completed {
        /// Whether the request was part of a batch copy edit.
        batch: bool,
    },
    /// The service, the network or the decode failed.
    Failed,
    /// Accept a batch candidate.
    Accept,
    /// The live image was created.
    PublishSucceeded,
    /// Start deleting.
    Delete,
    /// Deletion failed; revert.
    DeleteFailed {
        /// State before the delete started, if known.
        prior: Option<ImageState>,
    },
}

/// Generation metadata, populated only after a successful generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMeta {
    /// Server-assigned generation task ID.
    pub task_id: String,
    /// Prompt as rewritten by the service.
    pub enhanced_prompt: Option<String>,
    /// Seed used for the generation.
    pub seed: Option<i64>,
    /// Free-form user comments.
    pub comments: Option<String>,
    /// User feedback (e.g. thumbs up/down).
    pub feedback: Option<String>,
}

/// A single image unit with its own lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Opaque identifier.
    pub id: LayerId,
    source: LayerSource,
    state: ImageState,
    /// Current pixel width.
    pub width: u32,
    /// Current pixel height.
    pub height: u32,
    /// As-loaded pixel width.
    pub original_width: u32,
    /// As-loaded pixel height.
    pub original_height: u32,
    /// Catalog product this layer belongs to.
    pub product_id: Option<String>,
    /// Catalog variant this layer belongs to.
    pub variant_id: Option<String>,
    /// Generation task this layer was derived from.
    pub parent_task_id: Option<String>,
    /// Whether this layer is part of the product's live media.
    pub is_live_image: bool,
    /// Position within the live media.
    pub order: Option<u32>,
    /// Generation metadata.
    pub generation: Option<GenerationMeta>,
}

impl Layer {
    fn with_source(id: LayerId, source: LayerSource, state: ImageState) -> Self {
        Self {
            id,
            source,
            state,
            width: 0,
            height: 0,
            original_width: 0,
            original_height: 0,
            product_id: None,
            variant_id: None,
            parent_task_id: None,
            is_live_image: false,
            order: None,
            generation: None,
        }
    }

    /// A freshly picked local file.
    #[must_use]
    pub fn uploaded(file: LocalFile, width: u32, height: u32) -> Self {
        Self::with_source(LayerId::generate(), LayerSource::Local(file), ImageState::Uploaded)
            .with_dimensions(width, height)
    }

    /// A layer backed by a remote image, e.g. a draft loaded from the service.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SourceMismatch`] for `uploaded`, which requires a
    /// local file.
    pub fn remote(id: LayerId, url: impl Into<String>, state: ImageState) -> CoreResult<Self> {
        if state == ImageState::Uploaded {
            return Err(CoreError::SourceMismatch(state));
        }
        let mut layer = Self::with_source(id, LayerSource::Remote(url.into()), state);
        layer.is_live_image = state == ImageState::Live;
        Ok(layer)
    }

    /// The optimistic live copy of a draft, inserted before publish resolves.
    ///
    /// Returns `None` if the draft has no remote image yet.
    #[must_use]
    pub fn pending_publish(draft: &Self, order: u32) -> Option<Self> {
        let url = draft.source.image_url()?;
        let mut layer = Self::with_source(
            LayerId::generate(),
            LayerSource::Remote(url.to_string()),
            ImageState::Publishing,
        )
        .with_dimensions(draft.width, draft.height);
        layer.product_id.clone_from(&draft.product_id);
        layer.variant_id.clone_from(&draft.variant_id);
        layer.parent_task_id = draft.generation.as_ref().map(|g| g.task_id.clone());
        layer.is_live_image = true;
        layer.order = Some(order);
        Some(layer)
    }

    /// Set current and original dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self.original_width = width;
        self.original_height = height;
        self
    }

    /// Link to a catalog product and variant.
    #[must_use]
    pub fn with_product(mut self, product_id: impl Into<String>, variant_id: Option<String>) -> Self {
        self.product_id = Some(product_id.into());
        self.variant_id = variant_id;
        self
    }

    /// Attach generation metadata.
    #[must_use]
    pub fn with_generation(mut self, meta: GenerationMeta) -> Self {
        self.generation = Some(meta);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ImageState {
        self.state
    }

    /// Authoritative source.
    #[must_use]
    pub fn source(&self) -> &LayerSource {
        &self.source
    }

    /// Pending local file, if any.
    #[must_use]
    pub fn file(&self) -> Option<&LocalFile> {
        self.source.file()
    }

    /// Canonical remote URL, if any.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.source.image_url()
    }

    /// Apply an event through the transition function.
    pub(crate) fn apply(&mut self, event: &LayerEvent) -> CoreResult<ImageState> {
        self.state = self.state.next(event, &self.source)?;
        Ok(self.state)
    }

    /// Swap the source to a remote URL.
    pub(crate) fn set_remote(&mut self, url: String) {
        self.source = LayerSource::Remote(url);
    }

    /// Whether the source agrees with the state.
    ///
    /// `uploaded` needs a local file; `edit`, `confirm` and `live` need a URL.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match self.state {
            ImageState::Uploaded => self.source.is_local(),
            ImageState::Edit | ImageState::Confirm | ImageState::Live => !self.source.is_local(),
            _ => true,
        }
    }
}

/// Check an upload against the size and extension limits.
///
/// # Errors
///
/// Returns [`CoreError::UploadTooLarge`] or [`CoreError::UnsupportedFormat`].
pub fn validate_upload(name: &str, size: u64) -> CoreResult<()> {
    if size > MAX_UPLOAD_BYTES {
        return Err(CoreError::UploadTooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CoreError::UnsupportedFormat(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LayerSource {
        LayerSource::Local(LocalFile::new("shoe.png", "image/png", vec![1, 2, 3]))
    }

    fn remote() -> LayerSource {
        LayerSource::Remote("https://cdn.example.com/a.png".to_string())
    }

    #[test]
    fn test_select_and_deselect_round_trip() {
        let selected = ImageState::Uploaded
            .next(&LayerEvent::Select, &local())
            .expect("select");
        assert_eq!(selected, ImageState::Selected);
        let back = selected.next(&LayerEvent::Deselect, &local()).expect("deselect");
        assert_eq!(back, ImageState::Uploaded);

        let back_remote = ImageState::Selected
            .next(&LayerEvent::Deselect, &remote())
            .expect("deselect");
        assert_eq!(back_remote, ImageState::Edit);
    }

    #[test]
    fn test_submit_from_settled_states() {
        for state in [
            ImageState::Uploaded,
            ImageState::Selected,
            ImageState::Edit,
            ImageState::Confirm,
            ImageState::Error,
        ] {
            assert_eq!(
                state.next(&LayerEvent::Submit, &remote()).expect("submit"),
                ImageState::Processing
            );
        }
    }

    #[test]
    fn test_no_duplicate_submission() {
        let result = ImageState::Processing.next(&LayerEvent::Submit, &remote());
        assert!(matches!(result, Err(CoreError::InvalidTransition { .. })));
        assert!(ImageState::Live.next(&LayerEvent::Submit, &remote()).is_err());
    }

    #[test]
    fn test_completion_depends_on_mode() {
        let single = ImageState::Processing
            .next(&LayerEvent::Completed { batch: false }, &remote())
            .expect("single");
        let batch = ImageState::Processing
            .next(&LayerEvent::Completed { batch: true }, &remote())
            .expect("batch");
        assert_eq!(single, ImageState::Edit);
        assert_eq!(batch, ImageState::Confirm);
        assert_eq!(
            batch.next(&LayerEvent::Accept, &remote()).expect("accept"),
            ImageState::Edit
        );
    }

    #[test]
    fn test_failure_only_from_processing() {
        assert_eq!(
            ImageState::Processing
                .next(&LayerEvent::Failed, &remote())
                .expect("fail"),
            ImageState::Error
        );
        assert!(ImageState::Edit.next(&LayerEvent::Failed, &remote()).is_err());
    }

    #[test]
    fn test_delete_revert() {
        let deleting = ImageState::Live
            .next(&LayerEvent::Delete, &remote())
            .expect("delete");
        assert_eq!(deleting, ImageState::Deleting);
        let reverted = deleting
            .next(
                &LayerEvent::DeleteFailed {
                    prior: Some(ImageState::Live),
                },
                &remote(),
            )
            .expect("revert");
        assert_eq!(reverted, ImageState::Live);
        let unknown = deleting
            .next(&LayerEvent::DeleteFailed { prior: None }, &remote())
            .expect("revert");
        assert_eq!(unknown, ImageState::Error);
    }

    #[test]
    fn test_transient_states_reject_delete() {
        assert!(ImageState::Publishing
            .next(&LayerEvent::Delete, &remote())
            .is_err());
        assert!(ImageState::Deleting
            .next(&LayerEvent::Delete, &remote())
            .is_err());
    }

    #[test]
    fn test_pending_publish_copies_linkage() {
        let draft = Layer::remote(LayerId::new("d1"), "https://cdn/x.png", ImageState::Edit)
            .expect("draft")
            .with_product("p1", Some("v1".to_string()))
            .with_generation(GenerationMeta {
                task_id: "task-9".to_string(),
                ..GenerationMeta::default()
            });
        let pending = Layer::pending_publish(&draft, 4).expect("pending");
        assert_ne!(pending.id, draft.id);
        assert_eq!(pending.state(), ImageState::Publishing);
        assert!(pending.is_live_image);
        assert_eq!(pending.order, Some(4));
        assert_eq!(pending.product_id.as_deref(), Some("p1"));
        assert_eq!(pending.parent_task_id.as_deref(), Some("task-9"));
        assert_eq!(pending.image_url(), Some("https://cdn/x.png"));
    }

    #[test]
    fn test_pending_publish_requires_remote() {
        let upload = Layer::uploaded(LocalFile::new("a.png", "image/png", vec![]), 10, 10);
        assert!(Layer::pending_publish(&upload, 0).is_none());
    }

    #[test]
    fn test_remote_uploaded_rejected() {
        assert!(Layer::remote(LayerId::new("x"), "u", ImageState::Uploaded).is_err());
    }

    #[test]
    fn test_consistency() {
        let upload = Layer::uploaded(LocalFile::new("a.png", "image/png", vec![]), 10, 10);
        assert!(upload.is_consistent());
        let live = Layer::remote(LayerId::new("x"), "u", ImageState::Live).expect("live");
        assert!(live.is_consistent());
        assert!(live.is_live_image);
    }

    #[test]
    fn test_validate_upload() {
        assert!(validate_upload("photo.JPG", 1024).is_ok());
        assert!(validate_upload("photo.webp", MAX_UPLOAD_BYTES).is_ok());
        assert!(matches!(
            validate_upload("photo.png", MAX_UPLOAD_BYTES + 1),
            Err(CoreError::UploadTooLarge { .. })
        ));
        assert!(matches!(
            validate_upload("photo.gif", 10),
            Err(CoreError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            validate_upload("noext", 10),
            Err(CoreError::UnsupportedFormat(_))
        ));
    }
}
