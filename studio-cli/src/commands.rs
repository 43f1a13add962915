//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use studio_core::geometry::fit_scale;
use studio_core::{LayerId, ReviewStage, Size};
use studio_engine::{
    open_store, upload_file, BatchResults, GenerationOrchestrator, ProductRef,
    PublicationController, StudioApi, StudioApiClient, StudioConfig,
};
use studio_renderer::{Composer, ExportLabel, ImageSource};

use crate::{CliArgs, Command, ExportArgs, GenerateArgs};

/// Run the parsed command line.
///
/// # Errors
///
/// Returns an error if the command fails.
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = StudioConfig::from(&args);
    match &args.command {
        Command::Export(export_args) => {
            let path = export(&config, export_args)?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Generate(generate_args) => generate(&config, generate_args).await,
    }
}

/// Annotate and export one image. Returns the written path.
///
/// # Errors
///
/// Returns an error if the image cannot be read, decoded, exported or
/// written.
pub fn export(config: &StudioConfig, args: &ExportArgs) -> anyhow::Result<PathBuf> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let texture = ImageSource::Bytes(bytes)
        .decode()
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    // Size the canvas to the image so the export has no letterbox bands.
    let natural = Size::from_pixels(texture.width, texture.height);
    let container = Size::new(config.container_width, config.container_height);
    let scale = fit_scale(container, natural);
    let mut composer = Composer::new(natural.width * scale, natural.height * scale);
    composer.load_texture(texture);
    for _ in 0..args.rectangles {
        composer.add_rectangle();
    }
    for _ in 0..args.circles {
        composer.add_circle();
    }

    let label = args
        .product_name
        .as_ref()
        .map(|name| ExportLabel::new(name.clone(), LayerId::generate()));
    let file = composer.export_composition(
        &args.request(),
        &config.export_settings(),
        label.as_ref(),
    )?;

    let path = output_path(args.output.as_deref(), &file.name);
    std::fs::write(&path, &file.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(
        "Exported {}x{} {} to {}",
        file.width,
        file.height,
        file.mime,
        path.display()
    );
    Ok(path)
}

fn output_path(output: Option<&Path>, name: &str) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(name),
    }
}

/// Upload, generate and optionally publish.
///
/// # Errors
///
/// Returns an error if an upload fails or any generation fails.
pub async fn generate(config: &StudioConfig, args: &GenerateArgs) -> anyhow::Result<()> {
    let api: Arc<dyn StudioApi> = Arc::new(StudioApiClient::new(config)?);
    let store = open_store(config);
    let product = args.product_id.as_ref().map(|product_id| ProductRef {
        product_id: product_id.clone(),
        variant_id: args.variant_id.clone(),
    });

    let mut ids = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let id = upload_file(&store, path, product.as_ref())
            .await
            .with_context(|| format!("Failed to upload {}", path.display()))?;
        ids.push(id);
    }

    let orchestrator = GenerationOrchestrator::new(Arc::clone(&api), store.clone(), config.clone());
    let settings = args.settings();
    let results: BatchResults = match ids.as_slice() {
        [single] if !args.batch => {
            vec![(single.clone(), orchestrator.submit_edit(single, &settings).await)]
        }
        targets => orchestrator.submit_batch(targets, &settings).await?,
    };

    let publication = PublicationController::new(Arc::clone(&api), store.clone(), config);
    let mut failed = 0;
    for (id, result) in &results {
        match result {
            Ok(generated) => {
                let url = store
                    .get(id)
                    .and_then(|l| l.image_url().map(str::to_string))
                    .unwrap_or_default();
                println!("{id}: {} {url}", generated.state);
                if let Some(stage) = generated.review_prompt {
                    print_review_prompt(stage);
                }
                if let Some(dir) = &args.download {
                    download(api.as_ref(), dir, id, &url).await?;
                }
                if args.publish {
                    match publication.publish(id).await {
                        Ok(published) => println!(
                            "{id}: live as {} at position {}",
                            published.layer_id,
                            published.order.unwrap_or_default()
                        ),
                        Err(e) => {
                            failed += 1;
                            eprintln!("{id}: {}", e.user_message());
                        }
                    }
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{id}: {}", e.user_message());
                tracing::debug!("{id}: {e}");
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} operations failed", results.len());
    }
    Ok(())
}

async fn download(api: &dyn StudioApi, dir: &Path, id: &LayerId, url: &str) -> anyhow::Result<()> {
    let bytes = api
        .fetch_image(url)
        .await
        .with_context(|| format!("Failed to download {url}"))?;
    let name = url
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map_or_else(|| id.to_string(), str::to_string);
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{id}: saved {}", path.display());
    Ok(())
}

fn print_review_prompt(stage: ReviewStage) {
    tracing::debug!("Review stage reached: {stage:?}");
    println!("Enjoying Catalog Studio? We'd love a quick review.");
}
