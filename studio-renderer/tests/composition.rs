//! Integration tests for the composition engine (studio-renderer).
//!
//! Covers the load/annotate/export workflow end to end, export placement of
//! annotations relative to the image, and non-destructive export.

use proptest::prelude::*;
use studio_core::{AspectRatio, ExportRequest, LayerId, ShapeKind};
use studio_renderer::{
    export_image_bytes, Composer, ExportFormat, ExportLabel, ExportSettings, ImageFormat,
    ImageSource, TextureData,
};

fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).expect("encode");
    buf.into_inner()
}

fn png_settings() -> ExportSettings {
    ExportSettings {
        format: ExportFormat::Png,
        ..ExportSettings::default()
    }
}

// ==========================================================================
// Workflow
// ==========================================================================

#[test]
fn test_load_annotate_export() {
    let mut composer = Composer::new(800.0, 400.0);
    composer.load_image(&ImageSource::Bytes(solid_png(400, 200, [0, 0, 255, 255])));
    assert!(composer.error().is_none());
    composer.add_rectangle();

    let label = ExportLabel::new("Blue Mug", LayerId::new("layer-7"));
    let file = composer
        .export_composition(&ExportRequest::default(), &png_settings(), Some(&label))
        .expect("export");

    assert_eq!(file.name, "Studio Blue Mug layer-7.png");
    assert_eq!(file.mime, "image/png");
    assert_eq!((file.width, file.height), (400, 200));

    let decoded = image::load_from_memory(&file.bytes).expect("decode").to_rgba8();
    assert_eq!(decoded.get_pixel(200, 150).0, [0, 0, 255, 255]);
}

#[test]
fn test_data_uri_source() {
    use base64::Engine;
    let encoded = base64::engine::general_purpose::STANDARD.encode(solid_png(8, 4, [1, 2, 3, 255]));
    let mut composer = Composer::new(80.0, 40.0);
    composer.load_image(&ImageSource::DataUri(format!("data:image/png;base64,{encoded}")));
    let image = composer.scene().image_shape().expect("image");
    assert_eq!(image.kind, ShapeKind::Image);
    assert!((image.transform.scale_x - 10.0).abs() < 1e-9);
}

#[test]
fn test_annotation_lands_scaled_in_export() {
    // 2:1 canvas exported at twice the size: the rectangle doubles with it.
    let mut composer = Composer::new(400.0, 200.0);
    composer.load_texture(TextureData {
        width: 400,
        height: 200,
        data: [255u8, 255, 255, 255].repeat(400 * 200),
        format: ImageFormat::Unknown,
    });
    composer.add_rectangle();

    let settings = png_settings();
    let file = composer
        .export_composition(&ExportRequest::default().with_width(800), &settings, None)
        .expect("export");
    assert_eq!((file.width, file.height), (800, 400));

    let decoded = image::load_from_memory(&file.bytes).expect("decode").to_rgba8();
    // On screen the left edge sits at x = 20, so in the export it is at x = 40.
    let edge = decoded.get_pixel(40, 100).0;
    assert!(edge[0] > 200 && edge[1] < 150, "expected red stroke, got {edge:?}");
    // Outside the rectangle the white image shows through.
    assert_eq!(decoded.get_pixel(400, 300).0, [255, 255, 255, 255]);
}

#[test]
fn test_square_export_letterboxes() {
    let mut composer = Composer::new(800.0, 400.0);
    composer.load_image(&ImageSource::Bytes(solid_png(200, 100, [0, 0, 0, 255])));

    let request = ExportRequest::default()
        .with_width(600)
        .with_aspect_ratio(AspectRatio::new(1, 1).expect("ratio"));
    let file = composer
        .export_composition(&request, &png_settings(), None)
        .expect("export");
    assert_eq!((file.width, file.height), (600, 600));

    let decoded = image::load_from_memory(&file.bytes).expect("decode").to_rgba8();
    // The 2:1 canvas occupies rows 150..450.
    assert_eq!(decoded.get_pixel(300, 50).0, [255, 255, 255, 255]);
    assert_eq!(decoded.get_pixel(300, 300).0, [0, 0, 0, 255]);
}

#[test]
fn test_letterbox_uses_configured_background() {
    let bytes = solid_png(200, 100, [0, 0, 0, 255]);
    let settings = ExportSettings {
        background: [90, 90, 90, 255],
        ..png_settings()
    };
    let request = ExportRequest::default()
        .with_width(300)
        .with_aspect_ratio(AspectRatio::new(1, 1).expect("ratio"));

    let mut composer = Composer::new(200.0, 100.0);
    composer.load_image(&ImageSource::Bytes(bytes.clone()));
    let composed = composer
        .export_composition(&request, &settings, None)
        .expect("export");
    let direct = export_image_bytes(&bytes, &request, &settings, None).expect("export");

    let composed = image::load_from_memory(&composed.bytes).expect("decode").to_rgba8();
    let direct = image::load_from_memory(&direct.bytes).expect("decode").to_rgba8();
    assert_eq!(composed.get_pixel(150, 10).0, [90, 90, 90, 255]);
    assert_eq!(direct.get_pixel(150, 10).0, [90, 90, 90, 255]);
    assert_eq!(composed.get_pixel(150, 150).0, [0, 0, 0, 255]);
    assert_eq!(direct.get_pixel(150, 150).0, [0, 0, 0, 255]);
}

#[test]
fn test_jpeg_export_quality_setting() {
    let mut composer = Composer::new(200.0, 200.0);
    composer.load_image(&ImageSource::Bytes(solid_png(64, 64, [200, 10, 10, 255])));

    let low = ExportSettings {
        quality: 5,
        ..ExportSettings::default()
    };
    let high = ExportSettings {
        quality: 100,
        ..ExportSettings::default()
    };
    let request = ExportRequest::default();
    let small = composer.export_composition(&request, &low, None).expect("low");
    let large = composer.export_composition(&request, &high, None).expect("high");
    assert_eq!(small.mime, "image/jpeg");
    assert!(small.bytes.len() <= large.bytes.len());
}

// ==========================================================================
// Non-destructive export
// ==========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn export_leaves_scene_untouched(
        first_width in 16u32..256,
        second_width in 16u32..256,
        dx in -50.0..50.0f64,
        dy in -50.0..50.0f64,
        shapes in 0usize..4,
    ) {
        let mut composer = Composer::new(160.0, 90.0);
        composer.load_texture(TextureData {
            width: 32,
            height: 18,
            data: vec![90; 32 * 18 * 4],
            format: ImageFormat::Unknown,
        });
        for i in 0..shapes {
            if i % 2 == 0 {
                composer.add_rectangle();
            } else {
                composer.add_circle();
            }
        }
        composer.move_image(dx, dy).expect("move");
        let before = composer.scene().transforms();
        let dirty_before = composer.is_image_dirty();

        let settings = png_settings();
        composer
            .export_composition(&ExportRequest::default().with_width(first_width), &settings, None)
            .expect("first");
        composer
            .export_composition(&ExportRequest::default().with_width(second_width), &settings, None)
            .expect("second");

        prop_assert_eq!(composer.scene().transforms(), before);
        prop_assert_eq!(composer.is_image_dirty(), dirty_before);
        prop_assert_eq!(composer.scene().size().to_pixels(), (160, 90));
    }

    #[test]
    fn image_survives_any_delete_sequence(ops in proptest::collection::vec(0u8..4, 0..40)) {
        let mut composer = Composer::new(200.0, 100.0);
        composer.load_texture(TextureData {
            width: 20,
            height: 10,
            data: vec![255; 20 * 10 * 4],
            format: ImageFormat::Unknown,
        });
        let image_id = composer.scene().image_shape().expect("image").id;
        for op in ops {
            match op {
                0 => {
                    composer.add_rectangle();
                }
                1 => {
                    composer.add_circle();
                }
                2 => composer.select(image_id).expect("select"),
                _ => {
                    let removed = composer.delete_active_shape();
                    prop_assert!(removed.map_or(true, |shape| shape.kind != ShapeKind::Image));
                }
            }
            prop_assert!(composer.scene().image_shape().is_some());
        }
    }
}
