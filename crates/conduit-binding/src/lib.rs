//! # Conduit Binding
//!
//! Resolves integration documents against the step catalog.
//!
//! A `KameletBinding` names its source, sink and intermediate steps either by
//! URI (`scheme:path?query`) or by structured reference. The [`BindingEngine`]
//! matches each of them to a catalog step, copies the template and binds the
//! values carried by the document. [`KameletBindingGenerator`] renders a
//! resolved step list back into a document.

pub mod document;
pub mod engine;
pub mod error;
pub mod generator;
pub mod parser;

pub use document::{BindingDocument, BindingSpec, BindingStep, ObjectMeta, ObjectReference};
pub use engine::{bind_uri, BindingEngine, BINDING_KINDS};
pub use error::{BindingError, BindingResult};
pub use generator::{connector_uri, DeploymentGenerator, KameletBindingGenerator};
pub use parser::{IntegrationView, KameletBindingParser, ParseResult, ParserRegistry, StepParser};

use conduit_catalog::CatalogSnapshot;
use conduit_model::Step;

/// Resolve a `KameletBinding` document with the default engine
pub fn resolve(text: &str, snapshot: &CatalogSnapshot) -> BindingResult<Vec<Step>> {
    KameletBindingParser::default().parse(text, snapshot)
}
