//! # Conduit Catalog
//!
//! Builds the searchable step catalog from component descriptor sources.
//!
//! Sources are archives (`.zip`/`.jar`) or directory trees. Each descriptor is
//! parsed into one or more [`conduit_model::Step`]s by the first applicable
//! variant of the [`ParserRegistry`]; the results are published into a
//! [`StepCatalog`] as an immutable [`CatalogSnapshot`].
//!
//! ```no_run
//! use conduit_catalog::{CatalogLoader, DescriptorSource, StepCatalog};
//!
//! # async fn run() -> Result<(), conduit_catalog::CatalogError> {
//! let catalog = StepCatalog::new();
//! let loader = CatalogLoader::default();
//! let sources = vec![DescriptorSource::from_location("/opt/camel-catalog.zip")];
//! catalog.refresh(&loader, &sources).await?;
//!
//! let snapshot = catalog.await_ready().await?;
//! let consumer = snapshot.search_by_id("timer-consumer");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod parser;
pub mod source;

pub use config::CatalogConfig;
pub use error::{CatalogError, CatalogResult};
pub use index::{CatalogBuild, CatalogSnapshot, CatalogState, StepCatalog};
pub use loader::{BuildReport, CatalogLoader, ParseOutcome};
pub use parser::{
    ComponentDescriptorParser, DescriptorParser, KameletDescriptorParser, ParserRegistry,
    KAMELET_TYPE_LABEL, STEP_ID_PARAMETER,
};
pub use source::{DescriptorSource, RawDescriptor, SourceReader};
