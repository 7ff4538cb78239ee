//! Compiled screen content and set-fact actions.

use chrono::Datelike;
use tracing::debug;

use taxflow_core::{Collection, FactGraph, FactPath, FactValue, FlowError, FlowResult};

use crate::condition::{conditions_pass, Condition};
use crate::context::ExternalContext;
use crate::declarations::{ComponentKind, ContentDecl, DisplayOnlyOn, SetFactActionDecl};

/// Facts that never hold navigation back even though a screen edits them.
/// Each entry is optional on paper but modelled as a plain writable fact.
pub const SKIPPED_INCOMPLETE_FACTS: [&str; 14] = [
    "/familyAndHousehold/*/writableMiddleInitial",
    "/filers/*/writableMiddleInitial",
    "/filers/*/writableSuffix",
    "/familyAndHousehold/*/writableSuffix",
    "/primaryFiler/tin",
    "/formW2s/*/writableHasBox14Codes",
    "/formW2s/*/writableState",
    "/formW2s/*/writableStateEmployerId",
    "/formW2s/*/writableStateWages",
    "/formW2s/*/writableStateWithholding",
    "/formW2s/*/writableLocalWages",
    "/formW2s/*/writableLocalWithholding",
    "/formW2s/*/writableLocality",
    "/form1099Rs/*/writablePayerNameLine2",
];

pub fn is_skipped_incomplete_fact(path: &FactPath) -> bool {
    SKIPPED_INCOMPLETE_FACTS.contains(&path.as_str())
}

const EMPTY_COLLECTION: &str = "emptyCollection";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub component: ComponentKind,
    pub path: Option<FactPath>,
    pub conditions: Vec<Condition>,
    pub display_only_on: Option<DisplayOnlyOn>,
    pub read_only: bool,
    pub lock_year_to: Option<FactPath>,
    pub loop_name: Option<String>,
    pub done_path: Option<FactPath>,
    pub i18n_key: Option<String>,
}

impl ContentItem {
    pub fn compile(decl: &ContentDecl) -> FlowResult<Self> {
        if decl.component.is_fact() && decl.path.is_none() {
            return Err(FlowError::Specification(format!(
                "{:?} content needs a fact path",
                decl.component
            )));
        }
        if decl.component == ComponentKind::CollectionItemManager && decl.loop_name.is_none() {
            return Err(FlowError::Specification(
                "CollectionItemManager needs a loop name".to_string(),
            ));
        }
        if decl.lock_year_to.is_some() && decl.component != ComponentKind::DatePicker {
            return Err(FlowError::Specification(format!(
                "only DatePicker content can lock its year, found {:?}",
                decl.component
            )));
        }

        let mut conditions = Condition::parse_all(decl.condition.iter())?;
        conditions.extend(Condition::parse_all(&decl.conditions)?);

        Ok(Self {
            component: decl.component,
            path: decl.path.clone(),
            conditions,
            display_only_on: decl.display_only_on,
            read_only: decl.read_only,
            lock_year_to: decl.lock_year_to.clone(),
            loop_name: decl.loop_name.clone(),
            done_path: decl.done_path.clone(),
            i18n_key: decl.i18n_key.clone(),
        })
    }

    pub fn is_fact(&self) -> bool {
        self.component.is_fact()
    }

    pub fn is_available(
        &self,
        graph: &dyn FactGraph,
        ctx: &ExternalContext,
        collection_id: Option<&str>,
    ) -> bool {
        conditions_pass(&self.conditions, graph, ctx, collection_id)
    }

    /// The fact path this item requires the filer to answer, if any.
    /// Content that is hidden, display-only on the data view, read only, an
    /// optional selector, or on the skip list requires nothing.
    pub fn required_fact(
        &self,
        graph: &dyn FactGraph,
        ctx: &ExternalContext,
        collection_id: Option<&str>,
    ) -> Option<&FactPath> {
        if !self.is_fact()
            || self.read_only
            || self.component == ComponentKind::FactSelect
            || self.display_only_on == Some(DisplayOnlyOn::DataView)
        {
            return None;
        }
        let path = self.path.as_ref()?;
        if is_skipped_incomplete_fact(path) || !self.is_available(graph, ctx, collection_id) {
            return None;
        }
        Some(path)
    }

    /// The year a DatePicker is locked to. The source fact must be complete.
    pub fn locked_year(&self, graph: &dyn FactGraph, collection_id: Option<&str>) -> FlowResult<Option<i32>> {
        let Some(source) = &self.lock_year_to else {
            return Ok(None);
        };
        let result = graph.get_in(source, collection_id)?;
        if !result.complete {
            return Err(FlowError::InvariantViolation(format!(
                "date field locks its year to {source}, which is incomplete"
            )));
        }
        match result.get() {
            Some(FactValue::Date(date)) => Ok(Some(date.year())),
            Some(FactValue::String(raw)) => raw.trim().parse().map(Some).map_err(|_| {
                FlowError::InvariantViolation(format!("{source} does not hold a year: {raw}"))
            }),
            other => Err(FlowError::InvariantViolation(format!(
                "{source} does not hold a year: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactActionSource {
    Path(FactPath),
    EmptyCollection,
}

/// Copies a value into a fact when the filer leaves a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetFactAction {
    pub path: FactPath,
    pub source: FactActionSource,
    pub conditions: Vec<Condition>,
}

impl SetFactAction {
    pub fn compile(decl: &SetFactActionDecl) -> FlowResult<Self> {
        let source = if decl.source == EMPTY_COLLECTION {
            FactActionSource::EmptyCollection
        } else {
            FactActionSource::Path(FactPath::parse(decl.source.as_str()).map_err(|e| {
                FlowError::Specification(format!("set-fact source {} is not a fact path: {e}", decl.source))
            })?)
        };
        let mut conditions = Condition::parse_all(decl.condition.iter())?;
        conditions.extend(Condition::parse_all(&decl.conditions)?);
        Ok(Self {
            path: decl.path.clone(),
            source,
            conditions,
        })
    }

    pub fn is_active(&self, graph: &dyn FactGraph, ctx: &ExternalContext, collection_id: Option<&str>) -> bool {
        conditions_pass(&self.conditions, graph, ctx, collection_id)
    }

    /// Stages the write if the conditions pass and the source is complete.
    /// Returns whether a write was staged.
    pub fn apply(
        &self,
        graph: &mut dyn FactGraph,
        ctx: &ExternalContext,
        collection_id: Option<&str>,
    ) -> FlowResult<bool> {
        if !self.is_active(&*graph, ctx, collection_id) {
            return Ok(false);
        }
        let value = match &self.source {
            FactActionSource::EmptyCollection => FactValue::Collection(Collection::default()),
            FactActionSource::Path(source) => {
                let result = graph.get_in(source, collection_id)?;
                match (result.complete, result.value) {
                    (true, Some(value)) => value,
                    _ => {
                        debug!(source = %source, target = %self.path, "Skipping set-fact action with incomplete source");
                        return Ok(false);
                    }
                }
            }
        };
        let target = self.path.concretize(collection_id)?;
        graph.set(&target, value)?;
        Ok(true)
    }
}

/// Applies every action in order. Returns how many writes were staged.
pub fn apply_set_fact_actions(
    actions: &[SetFactAction],
    graph: &mut dyn FactGraph,
    ctx: &ExternalContext,
    collection_id: Option<&str>,
) -> FlowResult<usize> {
    let mut applied = 0;
    for action in actions {
        if action.apply(graph, ctx, collection_id)? {
            applied += 1;
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use taxflow_core::{fact_path, ConcretePath, FactDefinition, FactDictionary, FactKind};
    use taxflow_factgraph::MemoryFactGraph;

    fn graph() -> MemoryFactGraph {
        let mut d = FactDictionary::new();
        d.define(FactDefinition::writable(fact_path!("/taxYearStart"), FactKind::Date))
            .define(FactDefinition::writable(fact_path!("/reviewed"), FactKind::Boolean))
            .define(FactDefinition::writable(fact_path!("/answer"), FactKind::Boolean))
            .define(FactDefinition::writable(fact_path!("/dependents"), FactKind::Collection));
        MemoryFactGraph::new(Arc::new(d))
    }

    fn concrete(raw: &str) -> ConcretePath {
        ConcretePath::parse(raw).unwrap()
    }

    #[test]
    fn fact_content_needs_a_path() {
        let err = ContentItem::compile(&ContentDecl::new(ComponentKind::Boolean)).unwrap_err();
        assert!(matches!(err, FlowError::Specification(_)));
    }

    #[test]
    fn skip_list_and_read_only_content_require_nothing() {
        let ctx = ExternalContext::default();
        let g = graph();
        let skipped = ContentItem::compile(&ContentDecl::fact(
            ComponentKind::GenericString,
            fact_path!("/filers/*/writableMiddleInitial"),
        ))
        .unwrap();
        assert!(skipped.required_fact(&g, &ctx, Some("a")).is_none());

        let read_only =
            ContentItem::compile(&ContentDecl::fact(ComponentKind::Boolean, fact_path!("/answer")).read_only())
                .unwrap();
        assert!(read_only.required_fact(&g, &ctx, None).is_none());

        let select = ContentItem::compile(&ContentDecl::fact(ComponentKind::FactSelect, fact_path!("/answer"))).unwrap();
        assert!(select.required_fact(&g, &ctx, None).is_none());

        let required = ContentItem::compile(&ContentDecl::fact(ComponentKind::Boolean, fact_path!("/answer"))).unwrap();
        assert_eq!(required.required_fact(&g, &ctx, None), Some(&fact_path!("/answer")));
    }

    #[test]
    fn locked_year_reads_a_complete_date() {
        let mut g = graph();
        let item = ContentItem::compile(
            &ContentDecl::fact(ComponentKind::DatePicker, fact_path!("/answer")).lock_year_to(fact_path!("/taxYearStart")),
        )
        .unwrap();

        let err = item.locked_year(&g, None).unwrap_err();
        assert!(matches!(err, FlowError::InvariantViolation(_)));

        g.set(
            &concrete("/taxYearStart"),
            FactValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        )
        .unwrap();
        g.save().unwrap();
        assert_eq!(item.locked_year(&g, None).unwrap(), Some(2024));
    }

    #[test]
    fn set_fact_actions_copy_complete_sources() {
        let ctx = ExternalContext::default();
        let mut g = graph();
        let copy = SetFactAction::compile(&SetFactActionDecl {
            path: fact_path!("/reviewed"),
            source: "/answer".to_string(),
            condition: None,
            conditions: Vec::new(),
        })
        .unwrap();
        let reset = SetFactAction::compile(&SetFactActionDecl {
            path: fact_path!("/dependents"),
            source: EMPTY_COLLECTION.to_string(),
            condition: None,
            conditions: Vec::new(),
        })
        .unwrap();

        let actions = vec![copy, reset];
        assert_eq!(apply_set_fact_actions(&actions, &mut g, &ctx, None).unwrap(), 1);

        g.set(&concrete("/answer"), FactValue::Boolean(true)).unwrap();
        g.save().unwrap();
        assert_eq!(apply_set_fact_actions(&actions, &mut g, &ctx, None).unwrap(), 2);
        g.save().unwrap();
        assert_eq!(g.get(&concrete("/reviewed")).complete_bool(), Some(true));
        assert!(g.get(&concrete("/dependents")).complete);
    }
}
