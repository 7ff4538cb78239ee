//! Facts whose meaning depends on having a spouse. They are deleted when the
//! filing status moves into or out of married filing jointly.

use taxflow_core::{ConcretePath, FactGraph, FactPath, FlowError, FlowResult};
use taxflow_flow::FlowConfig;

pub const DEDUCTIONS_SUBCATEGORY_ROUTE: &str = "/flow/credits-and-deductions/deductions";
pub const CREDITS_SUBCATEGORY_ROUTE: &str = "/flow/credits-and-deductions/credits";
pub const FORM_1095A_LOOP: &str = "/1095As";
const HOUSEHOLD_COLLECTION: &str = "/familyAndHousehold";

/// Household member facts cleared for every current member.
pub const CLEARABLE_DEPENDENT_FACTS: [&str; 18] = [
    "/familyAndHousehold/*/relationshipCategory",
    "/familyAndHousehold/*/siblingRelationship",
    "/familyAndHousehold/*/childRelationship",
    "/familyAndHousehold/*/parentalRelationship",
    "/familyAndHousehold/*/inlawRelationship",
    "/familyAndHousehold/*/hasOtherBiologicalOrAdoptiveParent",
    "/familyAndHousehold/*/whichParentNotClaiming",
    "/familyAndHousehold/*/tpAgiHigherThanOtherParent",
    "/familyAndHousehold/*/tpPaidMostOfHomeUpkeep",
    "/familyAndHousehold/*/tpPaidMostOfParentHomeUpkeep",
    "/familyAndHousehold/*/writableQrSupportTest",
    "/familyAndHousehold/*/writableCouldBeQualifyingChildOfAnother",
    "/familyAndHousehold/*/writablePotentialClaimerMustFile",
    "/familyAndHousehold/*/writablePotentialClaimerDidFile",
    "/familyAndHousehold/*/writablePotentialClaimerFiledOnlyForRefund",
    "/familyAndHousehold/*/cdccHadExpensesPaidToQualifyingProvider",
    "/familyAndHousehold/*/cdccHasDependentCareExpenses",
    "/familyAndHousehold/*/writableCdccQualifyingExpenseAmount",
];

/// Every fact path asked inside the 1095-A loop, plus the collection.
pub fn form_1095a_paths(flow: &FlowConfig) -> FlowResult<Vec<FactPath>> {
    let mut paths: Vec<FactPath> = flow
        .loop_by_name(FORM_1095A_LOOP)
        .map(|lp| {
            lp.screens
                .iter()
                .flat_map(|id| flow.screen(*id).fact_paths.iter().cloned())
                .collect()
        })
        .unwrap_or_default();
    paths.push(FactPath::parse(FORM_1095A_LOOP)?);
    Ok(paths)
}

fn subcategory_facts(flow: &FlowConfig, route: &str) -> FlowResult<Vec<ConcretePath>> {
    let sub = flow.subcategory_by_route(route).ok_or_else(|| {
        FlowError::InvariantViolation("credits and deductions subcategories must exist".to_string())
    })?;
    // Collections inside these sections are cleared separately.
    sub.screens
        .iter()
        .flat_map(|id| flow.screen(*id).fact_paths.iter())
        .filter(|path| !path.is_abstract())
        .map(|path| path.concretize(None))
        .collect()
}

fn for_each_item(
    graph: &dyn FactGraph,
    collection: &str,
    paths: &[FactPath],
    out: &mut Vec<ConcretePath>,
) -> FlowResult<()> {
    for item in graph.collection_items(&ConcretePath::parse(collection)?) {
        for path in paths {
            out.push(path.concretize(Some(&item))?);
        }
    }
    Ok(())
}

/// Deductions and credits answers, the custody questions of every household
/// member and every 1095-A.
pub fn fields_to_clear_on_filing_status_change(
    flow: &FlowConfig,
    graph: &dyn FactGraph,
) -> FlowResult<Vec<ConcretePath>> {
    let mut fields = subcategory_facts(flow, DEDUCTIONS_SUBCATEGORY_ROUTE)?;
    fields.extend(subcategory_facts(flow, CREDITS_SUBCATEGORY_ROUTE)?);

    let dependent_facts = CLEARABLE_DEPENDENT_FACTS
        .iter()
        .map(|raw| FactPath::parse(*raw))
        .collect::<FlowResult<Vec<_>>>()?;
    for_each_item(graph, HOUSEHOLD_COLLECTION, &dependent_facts, &mut fields)?;
    for_each_item(graph, FORM_1095A_LOOP, &form_1095a_paths(flow)?, &mut fields)?;
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use taxflow_core::{Collection, FactValue};
    use taxflow_factgraph::demo::demo_dictionary;
    use taxflow_factgraph::MemoryFactGraph;
    use taxflow_flow::demo::demo_flow;

    fn concrete(raw: &str) -> ConcretePath {
        ConcretePath::parse(raw).unwrap()
    }

    #[test]
    fn clears_sections_members_and_forms() {
        let flow = FlowConfig::compile(&demo_flow()).unwrap();
        let mut g = MemoryFactGraph::new(demo_dictionary());
        g.set(&concrete("/familyAndHousehold"), FactValue::Collection(Collection::new(["h1"])))
            .unwrap();
        g.set(&concrete("/1095As"), FactValue::Collection(Collection::new(["x"])))
            .unwrap();
        g.save().unwrap();

        let fields = fields_to_clear_on_filing_status_change(&flow, &g).unwrap();
        let raw: Vec<&str> = fields.iter().map(ConcretePath::as_str).collect();

        assert_eq!(
            &raw[..5],
            &[
                "/hadStudentLoanInterestPayments",
                "/studentLoanInterestAmount",
                "/hadSaversCreditContributions",
                "/saversCreditContributionAmount",
                "/writablePrimaryFilerDependentCarePlanMaximum",
            ]
        );
        assert!(raw.contains(&"/familyAndHousehold/#h1/relationshipCategory"));
        assert!(raw.contains(&"/1095As/#x/issuerName"));
        assert!(raw.contains(&"/1095As"));
        assert!(!raw.iter().any(|p| p.starts_with("/cdccCareProviders")));
        assert_eq!(fields.len(), 5 + CLEARABLE_DEPENDENT_FACTS.len() + 3);
    }

    #[test]
    fn no_members_means_only_section_facts() {
        let flow = FlowConfig::compile(&demo_flow()).unwrap();
        let g = MemoryFactGraph::new(demo_dictionary());
        assert_eq!(fields_to_clear_on_filing_status_change(&flow, &g).unwrap().len(), 5);
    }

    #[test]
    fn missing_sections_are_an_invariant_violation() {
        let flow = FlowConfig::default();
        let g = MemoryFactGraph::new(demo_dictionary());
        let err = fields_to_clear_on_filing_status_change(&flow, &g).unwrap_err();
        assert!(matches!(err, FlowError::InvariantViolation(_)));
    }
}
