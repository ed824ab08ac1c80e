//! # Conduit Model
//!
//! The typed catalog model shared by the catalog build pipeline and the
//! binding resolution engine: [`Step`] templates and their [`Parameter`]s.

mod error;
mod parameter;
mod step;
mod text;

pub mod kinds;

pub use error::ModelError;
pub use parameter::{Parameter, ParameterType, DEFAULT_PATH_SEPARATOR};
pub use step::{Step, StepType};
pub use text::humanize;
