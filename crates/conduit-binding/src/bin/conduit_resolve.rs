use anyhow::{bail, Context, Result};
use conduit_binding::ParserRegistry;
use conduit_catalog::{CatalogConfig, CatalogLoader, DescriptorSource, StepCatalog};
use conduit_monitoring::{init_logging, LogExt, LoggingConfig};
use std::path::Path;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let logging = LoggingConfig::from_env("conduit-resolve");
    init_logging(&logging).context("Failed to initialize logging")?;

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: conduit-resolve <binding-file> [catalog-config.yaml]");
    };

    // an explicit config file replaces the environment
    let config = match args.next() {
        Some(config_path) => CatalogConfig::from_yaml_file(Path::new(&config_path))
            .with_context(|| format!("Failed to load catalog configuration from {}", config_path))?,
        None => CatalogConfig::load(),
    };
    config.validate().context("Invalid catalog configuration")?;
    if config.sources.is_empty() {
        bail!("no catalog sources configured (set CONDUIT_CATALOG_SOURCES)");
    }

    let sources: Vec<DescriptorSource> = config
        .sources
        .iter()
        .map(|s| DescriptorSource::from_location(s))
        .collect();

    let catalog = StepCatalog::new();
    let build = catalog.spawn_refresh(CatalogLoader::from_config(&config), sources);
    let snapshot = catalog
        .await_ready_timeout(config.ready_timeout())
        .await
        .context("Catalog is not available")?;
    let report = build
        .await
        .context("Catalog build task failed")?
        .log_err("Catalog build failed")
        .context("Catalog build failed")?;
    info!(
        steps = report.steps,
        skipped = report.skipped,
        generation = report.generation,
        "Catalog ready"
    );

    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    let steps = ParserRegistry::default()
        .resolve(&text, &snapshot)
        .log_ok("Binding resolved")
        .with_context(|| format!("Failed to resolve {}", path))?;

    println!("{}", serde_json::to_string_pretty(&steps)?);
    Ok(())
}
