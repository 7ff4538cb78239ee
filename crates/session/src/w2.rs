//! W-2 normalizers run at the end of every save that made it through the
//! correction cascade. Both work on the engine directly and save on their
//! own when they change anything.

use tracing::info;

use taxflow_core::{ConcretePath, FactGraph, FactPath, FactValue, FlowResult};

pub const FORM_W2_COLLECTION: &str = "/formW2s";
const CARE_PROVIDER_COLLECTION: &str = "/cdccCareProviders";
const CARE_PROVIDER_W2_REFERENCE: &str = "/cdccCareProviders/*/writableEmployerWhoFurnishedCare";
const CARE_PROVIDER_HAS_W2_REFERENCE: &str = "/cdccCareProviders/*/hasW2Employer";

/// Box code gates and the enum whose options name the selected code facts.
const BOX_CODE_GATES: [(&str, &str); 2] = [
    ("/formW2s/*/writableHasBox12Codes", "/formW2s/*/writableBox12Code"),
    ("/formW2s/*/writableHasBox14Codes", "/formW2s/*/writableBox14Code"),
];

/// Deletes the per-option facts next to `selector` for one item.
fn clear_selected_facts(graph: &mut dyn FactGraph, selector: &FactPath, collection_id: &str) -> FlowResult<()> {
    let Some(options) = graph.dictionary().enum_options(selector).map(<[String]>::to_vec) else {
        return Ok(());
    };
    for option in options {
        let selected = selector.sibling(&option)?.concretize(Some(collection_id))?;
        graph.delete(&selected);
    }
    Ok(())
}

/// Clears the selected box 12/14 codes of every W-2 whose gate was just
/// answered "no". Returns whether anything was cleared.
pub fn normalize_w2s(graph: &mut dyn FactGraph, dirty: &[ConcretePath]) -> FlowResult<bool> {
    let collection = graph.get(&ConcretePath::parse(FORM_W2_COLLECTION)?);
    if !collection.complete {
        return Ok(false);
    }

    let mut did_clear = false;
    for id in collection.complete_items() {
        for (gate, selector) in BOX_CODE_GATES {
            let gate = FactPath::parse(gate)?.concretize(Some(&id))?;
            if !dirty.contains(&gate) {
                continue;
            }
            // Only an explicit "no" clears.
            if graph.get(&gate).complete_bool() == Some(false) {
                info!(w2 = %id, gate = %gate, "Clearing selected W-2 box codes");
                clear_selected_facts(graph, &FactPath::parse(selector)?, &id)?;
                did_clear = true;
            }
        }
    }

    if did_clear {
        graph.save()?;
    }
    Ok(did_clear)
}

fn item_ids(graph: &dyn FactGraph, collection: &str) -> FlowResult<Option<Vec<String>>> {
    let result = graph.get(&ConcretePath::parse(collection)?);
    Ok(result
        .get()
        .and_then(FactValue::as_collection)
        .map(|c| c.items.clone()))
}

/// Deletes care provider references to W-2s that no longer exist, once the
/// W-2 collection has been touched. Returns whether anything was deleted.
pub fn clear_dangling_w2_references(graph: &mut dyn FactGraph, dirty: &[ConcretePath]) -> FlowResult<bool> {
    if !dirty.iter().any(|path| path.starts_with(FORM_W2_COLLECTION)) {
        return Ok(false);
    }
    let (Some(w2_ids), Some(provider_ids)) = (
        item_ids(&*graph, FORM_W2_COLLECTION)?,
        item_ids(&*graph, CARE_PROVIDER_COLLECTION)?,
    ) else {
        return Ok(false);
    };
    if w2_ids.is_empty() || provider_ids.is_empty() {
        return Ok(false);
    }

    let reference = FactPath::parse(CARE_PROVIDER_W2_REFERENCE)?;
    let has_reference = FactPath::parse(CARE_PROVIDER_HAS_W2_REFERENCE)?;
    let mut did_change = false;
    for provider in &provider_ids {
        let reference_path = reference.concretize(Some(provider))?;
        let referenced = graph.get(&reference_path);
        let Some(w2) = referenced.get().and_then(FactValue::as_item_ref) else {
            continue;
        };
        if !w2_ids.iter().any(|id| id == w2) {
            info!(provider = %provider, w2 = %w2, "Clearing care provider reference to a removed W-2");
            graph.delete(&has_reference.concretize(Some(provider))?);
            graph.delete(&reference_path);
            did_change = true;
        }
    }

    if did_change {
        graph.save()?;
    }
    Ok(did_change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxflow_core::{Collection, Dollar, EnumValue};
    use taxflow_factgraph::demo::demo_dictionary;
    use taxflow_factgraph::MemoryFactGraph;

    fn concrete(raw: &str) -> ConcretePath {
        ConcretePath::parse(raw).unwrap()
    }

    fn w2_with_box12_code() -> MemoryFactGraph {
        let mut g = MemoryFactGraph::new(demo_dictionary());
        g.set(&concrete("/formW2s"), FactValue::Collection(Collection::new(["x"]))).unwrap();
        g.set(&concrete("/formW2s/#x/writableHasBox12Codes"), FactValue::Boolean(true)).unwrap();
        g.set(
            &concrete("/formW2s/#x/writableBox12Code"),
            FactValue::Enum(EnumValue {
                value: "box12CodeD".to_string(),
                enum_options_path: "/box12Options".to_string(),
            }),
        )
        .unwrap();
        g.set(&concrete("/formW2s/#x/box12CodeD"), FactValue::Dollar(Dollar::from_cents(50_000))).unwrap();
        g.save().unwrap();
        g
    }

    #[test]
    fn answering_no_clears_selected_codes() {
        let mut g = w2_with_box12_code();
        let gate = concrete("/formW2s/#x/writableHasBox12Codes");
        g.set(&gate, FactValue::Boolean(false)).unwrap();
        g.save().unwrap();

        assert!(normalize_w2s(&mut g, &[gate]).unwrap());
        assert!(!g.get(&concrete("/formW2s/#x/box12CodeD")).has_value());
    }

    #[test]
    fn untouched_gates_are_left_alone() {
        let mut g = w2_with_box12_code();
        g.set(&concrete("/formW2s/#x/writableHasBox12Codes"), FactValue::Boolean(false)).unwrap();
        g.save().unwrap();

        assert!(!normalize_w2s(&mut g, &[]).unwrap());
        assert!(g.get(&concrete("/formW2s/#x/box12CodeD")).has_value());
    }

    #[test]
    fn references_need_a_w2_change() {
        let mut g = MemoryFactGraph::new(demo_dictionary());
        g.set(&concrete("/formW2s"), FactValue::Collection(Collection::new(["x"]))).unwrap();
        g.set(&concrete("/cdccCareProviders"), FactValue::Collection(Collection::new(["p"]))).unwrap();
        g.set(
            &concrete("/cdccCareProviders/#p/writableEmployerWhoFurnishedCare"),
            FactValue::CollectionItem("gone".to_string()),
        )
        .unwrap();
        g.save().unwrap();

        assert!(!clear_dangling_w2_references(&mut g, &[concrete("/cdccCareProviders")]).unwrap());
        assert!(clear_dangling_w2_references(&mut g, &[concrete("/formW2s")]).unwrap());
        assert!(!g
            .get(&concrete("/cdccCareProviders/#p/writableEmployerWhoFurnishedCare"))
            .has_value());
    }
}
