//! Getting files into the layer store.

use std::path::Path;

use studio_core::{validate_upload, LayerId, LayerStore, LocalFile};
use studio_renderer::{load_image_from_bytes, ImageFormat};

use crate::config::StudioConfig;
use crate::error::{EngineError, EngineResult};
use crate::prefs::ReviewAskFile;

/// Catalog product a layer belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    /// Product ID.
    pub product_id: String,
    /// Variant ID.
    pub variant_id: Option<String>,
}

impl ProductRef {
    /// Reference a product without a variant.
    #[must_use]
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: None,
        }
    }
}

/// A store seeded with the persisted review-ask state.
#[must_use]
pub fn open_store(config: &StudioConfig) -> LayerStore {
    match config.feedback_path() {
        Some(path) => LayerStore::with_feedback(ReviewAskFile::new(path).load()),
        None => LayerStore::new(),
    }
}

/// Add an in-memory file as an `uploaded` layer.
///
/// # Errors
///
/// Returns a validation error for oversized files, unsupported extensions or
/// a full reference set, and a preparation error if the bytes do not decode.
pub fn upload_bytes(
    store: &LayerStore,
    name: &str,
    bytes: Vec<u8>,
    product: Option<&ProductRef>,
) -> EngineResult<LayerId> {
    validate_upload(name, bytes.len() as u64)?;
    let texture = load_image_from_bytes(&bytes)?;
    let mut format = ImageFormat::from_magic_bytes(&bytes);
    if format == ImageFormat::Unknown {
        let ext = name.rsplit_once('.').map_or("", |(_, ext)| ext);
        format = ImageFormat::from_extension(ext);
    }
    let file = LocalFile::new(name, format.mime(), bytes);
    let id = store.add_upload(file, texture.width, texture.height)?;
    if let Some(product) = product {
        store.set_product(&id, product.product_id.clone(), product.variant_id.clone())?;
    }
    tracing::debug!("Uploaded {name} as layer {id} ({}x{})", texture.width, texture.height);
    Ok(id)
}

/// Read a file from disk and add it as an `uploaded` layer.
///
/// The size limit is checked before the file is read.
///
/// # Errors
///
/// Same as [`upload_bytes`], plus I/O errors.
pub async fn upload_file(
    store: &LayerStore,
    path: &Path,
    product: Option<&ProductRef>,
) -> EngineResult<LayerId> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EngineError::Validation(format!("{} is not a file", path.display())))?
        .to_string();
    let metadata = tokio::fs::metadata(path).await?;
    validate_upload(&name, metadata.len())?;
    let bytes = tokio::fs::read(path).await?;
    upload_bytes(store, &name, bytes, product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::{CoreError, ImageState, MAX_REFERENCE_IMAGES};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([9, 9, 9, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).expect("encode");
        buf.into_inner()
    }

    #[test]
    fn test_upload_bytes_records_dimensions() {
        let store = LayerStore::new();
        let product = ProductRef::new("prod-1");
        let id = upload_bytes(&store, "mug.png", png(30, 20), Some(&product)).expect("upload");
        let layer = store.get(&id).expect("layer");
        assert_eq!(layer.state(), ImageState::Uploaded);
        assert_eq!((layer.width, layer.height), (30, 20));
        assert_eq!(layer.product_id.as_deref(), Some("prod-1"));
        assert_eq!(layer.file().map(|f| f.mime.as_str()), Some("image/png"));
    }

    #[test]
    fn test_upload_rejects_extension() {
        let store = LayerStore::new();
        let err = upload_bytes(&store, "mug.gif", png(4, 4), None).expect_err("gif");
        assert!(matches!(err, EngineError::Model(CoreError::UnsupportedFormat(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_upload_rejects_garbage() {
        let store = LayerStore::new();
        let err = upload_bytes(&store, "mug.png", vec![0, 1, 2], None).expect_err("garbage");
        assert!(matches!(err, EngineError::Preparation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_upload_respects_reference_limit() {
        let store = LayerStore::new();
        for i in 0..MAX_REFERENCE_IMAGES {
            upload_bytes(&store, &format!("{i}.png"), png(2, 2), None).expect("upload");
        }
        let err = upload_bytes(&store, "extra.png", png(2, 2), None).expect_err("limit");
        assert!(matches!(err, EngineError::Model(CoreError::ReferenceLimit { .. })));
    }

    #[tokio::test]
    async fn test_upload_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shoe.png");
        std::fs::write(&path, png(12, 8)).expect("write");
        let store = LayerStore::new();
        let id = upload_file(&store, &path, None).await.expect("upload");
        assert_eq!(store.get(&id).map(|l| l.width), Some(12));
    }

    #[test]
    fn test_open_store_loads_gate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StudioConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..StudioConfig::new()
        };
        let mut gate = studio_core::FeedbackGate::new();
        gate.record_published();
        ReviewAskFile::new(config.feedback_path().expect("path")).save(&gate);
        assert_eq!(open_store(&config).feedback(), gate);
    }
}
