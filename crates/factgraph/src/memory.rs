use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use taxflow_core::{
    Collection, ConcretePath, FactDictionary, FactGraph, FactResult, FactValue, FlowError,
    FlowResult, SaveOutcome,
};

#[derive(Debug, Clone)]
enum Mutation {
    Set(ConcretePath, FactValue),
    Delete(ConcretePath),
}

/// A fact engine that keeps writable values in memory. Writes are staged and
/// only become visible to `get` once `save` commits them.
#[derive(Debug, Clone)]
pub struct MemoryFactGraph {
    dictionary: Arc<FactDictionary>,
    facts: BTreeMap<ConcretePath, FactValue>,
    staged: Vec<Mutation>,
}

impl MemoryFactGraph {
    pub fn new(dictionary: Arc<FactDictionary>) -> Self {
        Self {
            dictionary,
            facts: BTreeMap::new(),
            staged: Vec::new(),
        }
    }

    /// Rebuilds an engine from the persisted form produced by
    /// [`FactGraph::to_json`]. Entries the dictionary no longer knows are
    /// dropped with a warning.
    pub fn from_json(dictionary: Arc<FactDictionary>, json: &serde_json::Value) -> FlowResult<Self> {
        let object = json.as_object().ok_or_else(|| {
            FlowError::InvariantViolation("persisted fact state must be a JSON object".to_string())
        })?;

        let mut graph = Self::new(dictionary);
        for (raw_path, raw_value) in object {
            let path = ConcretePath::parse(raw_path.clone())?;
            let value: FactValue = serde_json::from_value(raw_value.clone())?;
            match graph.dictionary.definition_for(&path) {
                Ok(def) if def.writable && def.kind == value.kind() => {
                    graph.facts.insert(path, value);
                }
                Ok(def) => {
                    warn!(path = %path, kind = %def.kind, "Skipping persisted fact that no longer matches its definition");
                }
                Err(_) => {
                    warn!(path = %path, "Skipping persisted fact missing from the dictionary");
                }
            }
        }
        debug!(facts = graph.facts.len(), "Loaded persisted fact state");
        Ok(graph)
    }

    pub fn from_json_str(dictionary: Arc<FactDictionary>, raw: &str) -> FlowResult<Self> {
        let json: serde_json::Value = serde_json::from_str(raw)?;
        Self::from_json(dictionary, &json)
    }

    /// Stages a new item at the end of the collection at `collection` and
    /// returns its id. Relative to the last saved state.
    pub fn add_collection_item(&mut self, collection: &ConcretePath) -> FlowResult<String> {
        let id = Uuid::new_v4().to_string();
        let mut items = match self.facts.get(collection) {
            Some(FactValue::Collection(c)) => c.clone(),
            _ => Collection::default(),
        };
        items.items.push(id.clone());
        self.set(collection, FactValue::Collection(items))?;
        Ok(id)
    }

    pub fn has_staged_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    fn commit_set(&mut self, path: ConcretePath, value: FactValue) {
        if let FactValue::Collection(next) = &value {
            if let Some(FactValue::Collection(previous)) = self.facts.get(&path) {
                let removed: Vec<String> = previous
                    .items
                    .iter()
                    .filter(|id| !next.contains(id))
                    .cloned()
                    .collect();
                self.prune_items(&path, &removed);
            }
        }
        self.facts.insert(path, value);
    }

    /// Drops every fact stored under a removed collection item.
    fn prune_items(&mut self, collection: &ConcretePath, removed: &[String]) {
        for id in removed {
            let prefix = format!("{collection}/#{id}/");
            self.facts.retain(|p, _| !p.starts_with(&prefix));
        }
    }
}

impl FactGraph for MemoryFactGraph {
    fn get(&self, path: &ConcretePath) -> FactResult {
        let Ok(def) = self.dictionary.definition_for(path) else {
            warn!(path = %path, "Read of a fact missing from the dictionary");
            return FactResult::missing();
        };
        if let Some(derivation) = &def.derivation {
            return derivation(self, path);
        }
        if let Some(value) = self.facts.get(path) {
            return FactResult::complete(value.clone());
        }
        match &def.placeholder {
            Some(placeholder) => FactResult::placeholder(placeholder.clone()),
            None => FactResult::missing(),
        }
    }

    fn set(&mut self, path: &ConcretePath, value: FactValue) -> FlowResult<()> {
        let def = self.dictionary.definition_for(path)?;
        if !def.writable {
            return Err(FlowError::NotWritable(path.to_string()));
        }
        if def.kind != value.kind() {
            return Err(FlowError::TypeMismatch {
                path: path.to_string(),
                expected: def.kind.to_string(),
                found: value.kind().to_string(),
            });
        }
        if let FactValue::Enum(e) = &value {
            if !def.enum_options.is_empty() && !def.enum_options.contains(&e.value) {
                return Err(FlowError::TypeMismatch {
                    path: path.to_string(),
                    expected: format!("one of {:?}", def.enum_options),
                    found: e.value.clone(),
                });
            }
        }
        self.staged.push(Mutation::Set(path.clone(), value));
        Ok(())
    }

    fn delete(&mut self, path: &ConcretePath) {
        self.staged.push(Mutation::Delete(path.clone()));
    }

    fn save(&mut self) -> FlowResult<SaveOutcome> {
        let committed = self.staged.len();
        for mutation in std::mem::take(&mut self.staged) {
            match mutation {
                Mutation::Set(path, value) => self.commit_set(path, value),
                Mutation::Delete(path) => {
                    if let Some(FactValue::Collection(previous)) = self.facts.remove(&path) {
                        self.prune_items(&path, &previous.items);
                    }
                }
            }
        }
        debug!(committed, "Fact graph saved");
        Ok(SaveOutcome { committed })
    }

    fn to_json(&self) -> FlowResult<serde_json::Value> {
        let mut object = serde_json::Map::new();
        for (path, value) in &self.facts {
            object.insert(path.to_string(), serde_json::to_value(value)?);
        }
        Ok(serde_json::Value::Object(object))
    }

    fn dictionary(&self) -> &FactDictionary {
        &self.dictionary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use taxflow_core::{Dollar, FactDefinition, FactKind, FactPath};

    fn path(raw: &str) -> ConcretePath {
        ConcretePath::parse(raw).unwrap()
    }

    fn dictionary() -> Arc<FactDictionary> {
        let mut d = FactDictionary::new();
        d.define(FactDefinition::writable(FactPath::parse("/formW2s").unwrap(), FactKind::Collection))
            .define(FactDefinition::writable(
                FactPath::parse("/formW2s/*/wages").unwrap(),
                FactKind::Dollar,
            ))
            .define(
                FactDefinition::writable(FactPath::parse("/flowIsKnockedOut").unwrap(), FactKind::Boolean)
                    .with_placeholder(FactValue::Boolean(false)),
            )
            .define(FactDefinition::derived(
                FactPath::parse("/hasW2s").unwrap(),
                FactKind::Boolean,
                |graph, _| {
                    let items = graph.collection_items(&ConcretePath::parse("/formW2s").unwrap());
                    FactResult::complete(FactValue::Boolean(!items.is_empty()))
                },
            ));
        Arc::new(d)
    }

    #[test]
    fn writes_are_staged_until_save() {
        let mut graph = MemoryFactGraph::new(dictionary());
        graph.set(&path("/formW2s"), FactValue::Collection(Collection::new(["a"]))).unwrap();
        assert!(!graph.get(&path("/formW2s")).has_value());
        let outcome = graph.save().unwrap();
        assert_eq!(outcome.committed, 1);
        assert_eq!(graph.get(&path("/formW2s")).complete_items(), vec!["a".to_string()]);
    }

    #[test]
    fn placeholder_is_present_but_incomplete() {
        let graph = MemoryFactGraph::new(dictionary());
        let result = graph.get(&path("/flowIsKnockedOut"));
        assert!(result.has_value());
        assert!(!result.complete);
    }

    #[test]
    fn derived_facts_reflect_saved_state() {
        let mut graph = MemoryFactGraph::new(dictionary());
        assert_eq!(graph.get(&path("/hasW2s")).complete_bool(), Some(false));
        graph.add_collection_item(&path("/formW2s")).unwrap();
        graph.save().unwrap();
        assert_eq!(graph.get(&path("/hasW2s")).complete_bool(), Some(true));
    }

    #[test]
    fn set_rejects_unknown_derived_and_mistyped_facts() {
        let mut graph = MemoryFactGraph::new(dictionary());
        assert!(matches!(
            graph.set(&path("/nope"), FactValue::Boolean(true)),
            Err(FlowError::UnknownFact(_))
        ));
        assert!(matches!(
            graph.set(&path("/hasW2s"), FactValue::Boolean(true)),
            Err(FlowError::NotWritable(_))
        ));
        assert!(matches!(
            graph.set(&path("/formW2s/#a/wages"), FactValue::Boolean(true)),
            Err(FlowError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn shrinking_a_collection_prunes_item_facts() {
        let mut graph = MemoryFactGraph::new(dictionary());
        graph.set(&path("/formW2s"), FactValue::Collection(Collection::new(["a", "b"]))).unwrap();
        graph.set(&path("/formW2s/#a/wages"), FactValue::Dollar(Dollar(100))).unwrap();
        graph.set(&path("/formW2s/#b/wages"), FactValue::Dollar(Dollar(200))).unwrap();
        graph.save().unwrap();

        graph.set(&path("/formW2s"), FactValue::Collection(Collection::new(["a"]))).unwrap();
        graph.save().unwrap();
        assert!(graph.get(&path("/formW2s/#a/wages")).complete);
        assert!(!graph.get(&path("/formW2s/#b/wages")).has_value());
    }

    #[test]
    fn json_round_trip_preserves_facts() {
        let mut graph = MemoryFactGraph::new(dictionary());
        graph.set(&path("/formW2s"), FactValue::Collection(Collection::new(["a"]))).unwrap();
        graph.set(&path("/formW2s/#a/wages"), FactValue::Dollar(Dollar(123_45))).unwrap();
        graph.save().unwrap();

        let json = graph.to_json().unwrap();
        assert_eq!(
            json["/formW2s/#a/wages"],
            serde_json::json!({"$type": "DollarWrapper", "item": "123.45"})
        );
        let restored = MemoryFactGraph::from_json(dictionary(), &json).unwrap();
        assert_eq!(restored.get(&path("/formW2s/#a/wages")), graph.get(&path("/formW2s/#a/wages")));
        assert_eq!(restored.get(&path("/hasW2s")), graph.get(&path("/hasW2s")));
    }

    #[test]
    fn from_json_skips_unknown_paths() {
        let json = serde_json::json!({
            "/retired": {"$type": "BooleanWrapper", "item": true},
            "/flowIsKnockedOut": {"$type": "BooleanWrapper", "item": true}
        });
        let graph = MemoryFactGraph::from_json(dictionary(), &json).unwrap();
        assert_eq!(graph.get(&path("/flowIsKnockedOut")).complete_bool(), Some(true));
    }

    proptest! {
        #[test]
        fn round_trip_reproduces_every_wage(wages in proptest::collection::vec(-1_000_000i64..1_000_000, 0..6)) {
            let mut graph = MemoryFactGraph::new(dictionary());
            let ids: Vec<String> = (0..wages.len()).map(|i| format!("w{i}")).collect();
            graph.set(&path("/formW2s"), FactValue::Collection(Collection::new(ids.clone()))).unwrap();
            for (id, cents) in ids.iter().zip(&wages) {
                graph.set(&path(&format!("/formW2s/#{id}/wages")), FactValue::Dollar(Dollar(*cents))).unwrap();
            }
            graph.save().unwrap();

            let restored = MemoryFactGraph::from_json(dictionary(), &graph.to_json().unwrap()).unwrap();
            for id in &ids {
                let p = path(&format!("/formW2s/#{id}/wages"));
                prop_assert_eq!(restored.get(&p), graph.get(&p));
            }
        }
    }
}
