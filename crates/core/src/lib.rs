//! Shared foundation for the taxflow interview engine: fact paths and
//! values, the fact engine interface, configuration and the error taxonomy.

pub mod config;
pub mod dictionary;
pub mod error;
pub mod fact;
pub mod graph;
pub mod path;

pub use config::AppConfig;
pub use dictionary::{FactDefinition, FactDictionary};
pub use error::{FlowError, FlowResult};
pub use fact::{Collection, Dollar, EnumValue, FactKind, FactResult, FactValue};
pub use graph::{FactGraph, SaveOutcome};
pub use path::{ConcretePath, FactPath};
