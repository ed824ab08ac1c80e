//! The catalog build pipeline.
//!
//! A blocking walker task reads descriptors from a source and feeds them into a
//! bounded channel. Each descriptor is parsed on the blocking pool, with at
//! most `parse_concurrency` parses in flight, and every result flows back into
//! a single aggregation loop. Nothing is held locked across I/O.

use conduit_model::Step;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::index::{CatalogBuild, StepCatalog};
use crate::parser::ParserRegistry;
use crate::source::{DescriptorSource, RawDescriptor, SourceReader};

/// Steps parsed from one source plus the per-descriptor tally
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Parsed steps, ordered by id then by descriptor path
    pub steps: Vec<Step>,
    /// Descriptors that were parsed (including those yielding no steps)
    pub parsed: usize,
    /// Descriptors that failed and were skipped
    pub skipped: usize,
}

/// Summary of a completed [`StepCatalog::refresh`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub parsed: usize,
    pub skipped: usize,
    /// Distinct steps in the published snapshot
    pub steps: usize,
    pub generation: u64,
}

/// Reads descriptor sources and parses them into steps
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    reader: SourceReader,
    parsers: ParserRegistry,
    parse_concurrency: usize,
}

impl CatalogLoader {
    pub fn new(reader: SourceReader, parsers: ParserRegistry) -> Self {
        Self {
            reader,
            parsers,
            parse_concurrency: CatalogConfig::default().parse_concurrency,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(
            SourceReader::new(config.excluded_dirs.iter().cloned()),
            ParserRegistry::default(),
        )
        .with_parse_concurrency(config.parse_concurrency)
    }

    pub fn with_parse_concurrency(mut self, parse_concurrency: usize) -> Self {
        self.parse_concurrency = parse_concurrency.max(1);
        self
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Parse every descriptor of `source`.
    ///
    /// Fails only when the source cannot be opened; malformed descriptors are
    /// logged and counted as skipped.
    #[instrument(skip_all, fields(source = %source))]
    pub async fn parse_catalog(&self, source: &DescriptorSource) -> CatalogResult<ParseOutcome> {
        let reader = self.reader.clone();
        let filter = self.parsers.name_filter();
        let opened = source.clone();
        let descriptors = tokio::task::spawn_blocking(move || reader.entries(&opened, filter))
            .await
            .map_err(|e| CatalogError::Task(e.to_string()))??;

        let (tx, rx) = mpsc::channel::<RawDescriptor>(self.parse_concurrency * 2);
        let walker = tokio::task::spawn_blocking(move || {
            let mut sent = 0usize;
            for descriptor in descriptors {
                if tx.blocking_send(descriptor).is_err() {
                    break;
                }
                sent += 1;
            }
            sent
        });

        let parsers = self.parsers.clone();
        let mut results = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|descriptor| (descriptor, rx))
        })
        .map(|descriptor| {
            let parsers = parsers.clone();
            async move {
                let name = descriptor.path.clone();
                let joined = tokio::task::spawn_blocking(move || parse_one(&parsers, &descriptor)).await;
                (name, joined)
            }
        })
        .buffer_unordered(self.parse_concurrency)
        .boxed();

        let mut outcome = ParseOutcome::default();
        let mut per_file: Vec<(String, Vec<Step>)> = Vec::new();
        while let Some((name, joined)) = results.next().await {
            match joined {
                Ok(Ok(steps)) => {
                    debug!(file = %name, steps = steps.len(), "Descriptor parsed");
                    outcome.parsed += 1;
                    per_file.push((name, steps));
                }
                Ok(Err(e)) => {
                    warn!(file = %name, error = %e, code = e.error_code(), "Skipping descriptor");
                    outcome.skipped += 1;
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Descriptor parse task failed");
                    outcome.skipped += 1;
                }
            }
        }

        let discovered = walker
            .await
            .map_err(|e| CatalogError::Task(e.to_string()))?;
        outcome.steps = order_steps(per_file);

        info!(
            discovered,
            parsed = outcome.parsed,
            skipped = outcome.skipped,
            steps = outcome.steps.len(),
            "Catalog source parsed"
        );
        Ok(outcome)
    }
}

impl Default for CatalogLoader {
    fn default() -> Self {
        Self::new(SourceReader::default(), ParserRegistry::default())
    }
}

/// Flatten per-file results into id order. Parses finish in any order, so
/// steps sharing an id are ordered by descriptor path and the last path wins
/// when the batch is stored.
fn order_steps(per_file: Vec<(String, Vec<Step>)>) -> Vec<Step> {
    let mut tagged: Vec<(String, Step)> = per_file
        .into_iter()
        .flat_map(|(path, steps)| steps.into_iter().map(move |step| (path.clone(), step)))
        .collect();
    tagged.sort_by(|(a_path, a), (b_path, b)| a.id.cmp(&b.id).then_with(|| a_path.cmp(b_path)));

    for pair in tagged.windows(2) {
        let ((replaced, earlier), (kept, later)) = (&pair[0], &pair[1]);
        if earlier.id == later.id && replaced != kept {
            warn!(id = %later.id, kept = %kept, replaced = %replaced, "Step id declared by several descriptors");
        }
    }

    tagged.into_iter().map(|(_, step)| step).collect()
}

fn parse_one(parsers: &ParserRegistry, descriptor: &RawDescriptor) -> CatalogResult<Vec<Step>> {
    let parser = parsers
        .parser_for(&descriptor.name)
        .ok_or_else(|| CatalogError::descriptor(&descriptor.name, "no parser handles this file"))?;
    parser.parse(descriptor)
}

impl StepCatalog {
    /// Rebuild the whole catalog from `sources` and publish it.
    ///
    /// If any source cannot be opened the build is aborted and the previous
    /// snapshot keeps serving.
    pub async fn refresh(
        &self,
        loader: &CatalogLoader,
        sources: &[DescriptorSource],
    ) -> CatalogResult<BuildReport> {
        run_build(self.begin_build(), loader, sources).await
    }

    /// Start a rebuild in the background.
    ///
    /// The catalog is already in the building state when this returns, so a
    /// following [`StepCatalog::await_ready`] waits for this build.
    pub fn spawn_refresh(
        &self,
        loader: CatalogLoader,
        sources: Vec<DescriptorSource>,
    ) -> tokio::task::JoinHandle<CatalogResult<BuildReport>> {
        let build = self.begin_build();
        tokio::spawn(async move { run_build(build, &loader, &sources).await })
    }
}

#[instrument(skip_all, fields(sources = sources.len()))]
async fn run_build(
    build: CatalogBuild,
    loader: &CatalogLoader,
    sources: &[DescriptorSource],
) -> CatalogResult<BuildReport> {
    let mut parsed = 0;
    let mut skipped = 0;

    for source in sources {
        match loader.parse_catalog(source).await {
            Ok(outcome) => {
                parsed += outcome.parsed;
                skipped += outcome.skipped;
                build.store(outcome.steps);
            }
            Err(e) => {
                build.abort(&e);
                return Err(e);
            }
        }
    }

    let snapshot = build.finish();
    Ok(BuildReport {
        parsed,
        skipped,
        steps: snapshot.len(),
        generation: snapshot.generation(),
    })
}
