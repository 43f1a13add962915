//! # Catalog Studio CLI
//!
//! Export annotated product photos, generate new versions and publish them.

use clap::Parser;
use studio_cli::CliArgs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing on stderr, leaving stdout for results.
///
/// Set `RUST_LOG` to control log levels and `RUST_LOG_FORMAT=json` for JSON
/// output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,studio_cli=info,studio_engine=info,studio_renderer=info")
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    tracing::debug!("Using service at {}", args.api_url);
    studio_cli::run(args).await
}
