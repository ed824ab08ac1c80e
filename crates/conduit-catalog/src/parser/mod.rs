//! Descriptor parsers.
//!
//! Each parser variant recognises its files by name and turns one raw
//! descriptor into zero or more steps. The [`ParserRegistry`] dispatches a file
//! to the first variant, in registration order, that applies to it.

mod component;
mod kamelet;

pub use component::{ComponentDescriptorParser, STEP_ID_PARAMETER};
pub use kamelet::{KameletDescriptorParser, KAMELET_TYPE_LABEL};

use conduit_model::Step;
use std::sync::Arc;

use crate::error::CatalogResult;
use crate::source::{NameFilter, RawDescriptor};

/// One descriptor format
pub trait DescriptorParser: Send + Sync {
    /// Short name used in logs
    fn identifier(&self) -> &'static str;

    /// Whether a file with this name is handled by this parser
    fn applies_to(&self, file_name: &str) -> bool;

    /// Parse one descriptor into its step variants
    fn parse(&self, descriptor: &RawDescriptor) -> CatalogResult<Vec<Step>>;
}

/// Ordered set of descriptor parsers
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn DescriptorParser>>,
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self { parsers: Vec::new() }
    }

    pub fn register(mut self, parser: Arc<dyn DescriptorParser>) -> Self {
        self.parsers.push(parser);
        self
    }

    /// The first registered parser that handles `file_name`
    pub fn parser_for(&self, file_name: &str) -> Option<Arc<dyn DescriptorParser>> {
        self.parsers
            .iter()
            .find(|p| p.applies_to(file_name))
            .cloned()
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        self.parsers.iter().any(|p| p.applies_to(file_name))
    }

    /// File-name filter for a [`crate::SourceReader`]
    pub fn name_filter(&self) -> NameFilter {
        let registry = self.clone();
        Arc::new(move |name: &str| registry.accepts(name))
    }

    pub fn identifiers(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.identifier()).collect()
    }
}

impl Default for ParserRegistry {
    /// Kamelet descriptors are registered first so `*.kamelet.yaml` files never
    /// reach a more generic variant.
    fn default() -> Self {
        ParserRegistry::empty()
            .register(Arc::new(KameletDescriptorParser))
            .register(Arc::new(ComponentDescriptorParser))
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.identifiers())
            .finish()
    }
}
