//! The fact engine interface consumed by the flow and session crates.

use serde::{Deserialize, Serialize};

use crate::dictionary::FactDictionary;
use crate::error::FlowResult;
use crate::fact::{FactResult, FactValue};
use crate::path::{ConcretePath, FactPath};

/// Summary returned by [`FactGraph::save`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Number of staged writes and deletes committed by this save.
    pub committed: usize,
}

/// A fact-computation engine. Writes are staged by `set`/`delete` and take
/// effect on `save`.
pub trait FactGraph {
    fn get(&self, path: &ConcretePath) -> FactResult;

    fn set(&mut self, path: &ConcretePath, value: FactValue) -> FlowResult<()>;

    fn delete(&mut self, path: &ConcretePath);

    fn save(&mut self) -> FlowResult<SaveOutcome>;

    /// Persisted form of every writable fact, keyed by concrete path.
    fn to_json(&self) -> FlowResult<serde_json::Value>;

    fn dictionary(&self) -> &FactDictionary;

    /// Reads `path` in the context of `collection_id`.
    fn get_in(&self, path: &FactPath, collection_id: Option<&str>) -> FlowResult<FactResult> {
        Ok(self.get(&path.concretize(collection_id)?))
    }

    /// Item ids of the collection at `path`, empty unless the collection is
    /// complete.
    fn collection_items(&self, path: &ConcretePath) -> Vec<String> {
        self.get(path).complete_items()
    }
}
