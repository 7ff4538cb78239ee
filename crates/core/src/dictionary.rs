//! Fact dictionary: the static description of every fact an engine knows.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{FlowError, FlowResult};
use crate::fact::{FactKind, FactResult, FactValue};
use crate::graph::FactGraph;
use crate::path::{ConcretePath, FactPath};

/// Computes a derived fact from the rest of the graph.
pub type Derivation = Arc<dyn Fn(&dyn FactGraph, &ConcretePath) -> FactResult + Send + Sync>;

#[derive(Clone)]
pub struct FactDefinition {
    pub path: FactPath,
    pub kind: FactKind,
    pub writable: bool,
    pub placeholder: Option<FactValue>,
    pub enum_options: Vec<String>,
    pub derivation: Option<Derivation>,
}

impl fmt::Debug for FactDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactDefinition")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("writable", &self.writable)
            .field("placeholder", &self.placeholder)
            .field("enum_options", &self.enum_options)
            .field("derived", &self.derivation.is_some())
            .finish()
    }
}

impl FactDefinition {
    pub fn writable(path: FactPath, kind: FactKind) -> Self {
        Self {
            path,
            kind,
            writable: true,
            placeholder: None,
            enum_options: Vec::new(),
            derivation: None,
        }
    }

    pub fn derived(
        path: FactPath,
        kind: FactKind,
        derivation: impl Fn(&dyn FactGraph, &ConcretePath) -> FactResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            path,
            kind,
            writable: false,
            placeholder: None,
            enum_options: Vec::new(),
            derivation: Some(Arc::new(derivation)),
        }
    }

    pub fn with_placeholder(mut self, value: FactValue) -> Self {
        self.placeholder = Some(value);
        self
    }

    pub fn with_enum_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enum_options = options.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FactDictionary {
    facts: HashMap<FactPath, FactDefinition>,
}

impl FactDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, definition: FactDefinition) -> &mut Self {
        self.facts.insert(definition.path.clone(), definition);
        self
    }

    pub fn with(mut self, definition: FactDefinition) -> Self {
        self.define(definition);
        self
    }

    pub fn definition(&self, path: &FactPath) -> Option<&FactDefinition> {
        self.facts.get(path)
    }

    /// Looks up the definition for a concrete path via its abstract form.
    pub fn definition_for(&self, path: &ConcretePath) -> FlowResult<&FactDefinition> {
        let abstract_path = path.to_abstract();
        self.facts
            .get(&abstract_path)
            .ok_or_else(|| FlowError::UnknownFact(path.to_string()))
    }

    pub fn enum_options(&self, path: &FactPath) -> Option<&[String]> {
        self.facts
            .get(path)
            .filter(|d| d.kind == FactKind::Enum)
            .map(|d| d.enum_options.as_slice())
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}
