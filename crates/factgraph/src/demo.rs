//! A small fact dictionary covering a simplified individual return. It backs
//! the demo flow, the CLI defaults and the cross-crate tests.

use std::sync::Arc;

use taxflow_core::{
    ConcretePath, Dollar, FactDefinition, FactDictionary, FactGraph, FactKind, FactPath,
    FactResult, FactValue,
};

pub const FILING_STATUS_OPTIONS: [&str; 5] = [
    "single",
    "marriedFilingJointly",
    "marriedFilingSeparately",
    "headOfHousehold",
    "qualifiedSurvivingSpouse",
];

pub const BOX12_OPTIONS: [&str; 3] = ["box12CodeD", "box12CodeDD", "box12CodeW"];
pub const BOX14_OPTIONS: [&str; 2] = ["box14StateDisability", "box14Other"];

fn p(raw: &str) -> FactPath {
    taxflow_core::fact_path!(raw)
}

fn concrete(raw: &str) -> ConcretePath {
    p(raw).concretize(None).unwrap_or_else(|_| unreachable!("demo paths are absolute"))
}

fn writable(raw: &str, kind: FactKind) -> FactDefinition {
    FactDefinition::writable(p(raw), kind)
}

/// Reads a sibling fact of `path` under the same collection item.
fn sibling(graph: &dyn FactGraph, path: &ConcretePath, leaf: &str) -> FactResult {
    let raw = path.as_str();
    let prefix = raw.rfind('/').map(|idx| &raw[..idx]).unwrap_or("");
    match ConcretePath::parse(format!("{prefix}/{leaf}")) {
        Ok(sibling) => graph.get(&sibling),
        Err(_) => FactResult::missing(),
    }
}

fn all_complete(results: &[FactResult]) -> FactResult {
    FactResult::complete(FactValue::Boolean(results.iter().all(|r| r.complete)))
}

fn filing_status(graph: &dyn FactGraph) -> Option<String> {
    let result = graph.get(&concrete("/filingStatus"));
    if !result.complete {
        return None;
    }
    result.get().and_then(FactValue::as_enum).map(str::to_string)
}

pub fn demo_dictionary() -> Arc<FactDictionary> {
    let mut d = FactDictionary::new();

    d.define(FactDefinition::derived(p("/flowTrue"), FactKind::Boolean, |_, _| {
        FactResult::complete(FactValue::Boolean(true))
    }))
    .define(FactDefinition::derived(p("/flowFalse"), FactKind::Boolean, |_, _| {
        FactResult::complete(FactValue::Boolean(false))
    }));

    // You and your family
    d.define(writable("/filers", FactKind::Collection))
        .define(writable("/filers/*/firstName", FactKind::String))
        .define(writable("/filers/*/writableMiddleInitial", FactKind::String))
        .define(writable("/filers/*/lastName", FactKind::String))
        .define(writable("/filers/*/dateOfBirth", FactKind::Date))
        .define(writable("/filers/*/isPrimaryFiler", FactKind::Boolean))
        .define(writable("/filers/*/hasIpPin", FactKind::Boolean))
        .define(writable("/filers/*/identityPin", FactKind::IpPin))
        .define(FactDefinition::derived(
            p("/filers/*/isComplete"),
            FactKind::Boolean,
            |graph, path| {
                all_complete(&[
                    sibling(graph, path, "firstName"),
                    sibling(graph, path, "lastName"),
                    sibling(graph, path, "dateOfBirth"),
                ])
            },
        ))
        .define(FactDefinition::derived(
            p("/aboutYouIsComplete"),
            FactKind::Boolean,
            |graph, _| {
                let filers = graph.collection_items(&concrete("/filers"));
                let Some(primary) = filers.first() else {
                    return FactResult::complete(FactValue::Boolean(false));
                };
                match ConcretePath::parse(format!("/filers/#{primary}/isComplete")) {
                    Ok(path) => graph.get(&path),
                    Err(_) => FactResult::missing(),
                }
            },
        ))
        .define(writable("/filingStatus", FactKind::Enum).with_enum_options(FILING_STATUS_OPTIONS))
        .define(writable("/livedApartFromSpouse", FactKind::Boolean))
        .define(FactDefinition::derived(
            p("/filingStatusIsComplete"),
            FactKind::Boolean,
            |graph, _| FactResult::complete(FactValue::Boolean(filing_status(graph).is_some())),
        ))
        .define(FactDefinition::derived(
            p("/isMarriedFilingJointly"),
            FactKind::Boolean,
            |graph, _| match filing_status(graph) {
                Some(status) => FactResult::complete(FactValue::Boolean(status == "marriedFilingJointly")),
                None => FactResult::missing(),
            },
        ))
        .define(FactDefinition::derived(
            p("/isMarriedFilingSeparately"),
            FactKind::Boolean,
            |graph, _| match filing_status(graph) {
                Some(status) => {
                    FactResult::complete(FactValue::Boolean(status == "marriedFilingSeparately"))
                }
                None => FactResult::missing(),
            },
        ))
        .define(FactDefinition::derived(
            p("/mfsButEligibleForCdcc"),
            FactKind::Boolean,
            |graph, _| {
                if filing_status(graph).as_deref() != Some("marriedFilingSeparately") {
                    return FactResult::complete(FactValue::Boolean(false));
                }
                match graph.get(&concrete("/livedApartFromSpouse")).complete_bool() {
                    Some(apart) => FactResult::complete(FactValue::Boolean(apart)),
                    None => FactResult::missing(),
                }
            },
        ))
        .define(writable("/familyAndHousehold", FactKind::Collection))
        .define(writable("/familyAndHouseholdIsDone", FactKind::Boolean))
        .define(FactDefinition::derived(
            p("/familyAndHousehold/*/isComplete"),
            FactKind::Boolean,
            |graph, path| {
                all_complete(&[
                    sibling(graph, path, "firstName"),
                    sibling(graph, path, "relationshipCategory"),
                ])
            },
        ))
        .define(writable("/familyAndHousehold/*/firstName", FactKind::String))
        .define(writable("/familyAndHousehold/*/writableMiddleInitial", FactKind::String))
        .define(writable("/familyAndHousehold/*/relationshipCategory", FactKind::String))
        .define(writable("/familyAndHousehold/*/writableQrSupportTest", FactKind::Boolean))
        .define(writable("/familyAndHousehold/*/cdccHasDependentCareExpenses", FactKind::Boolean))
        .define(writable(
            "/familyAndHousehold/*/writableCdccQualifyingExpenseAmount",
            FactKind::Dollar,
        ));

    // Income
    d.define(writable("/formW2s", FactKind::Collection))
        .define(writable("/formW2sIsDone", FactKind::Boolean))
        .define(writable("/formW2s/*/employerName", FactKind::String))
        .define(writable("/formW2s/*/wages", FactKind::Dollar))
        .define(writable("/formW2s/*/writableHasBox12Codes", FactKind::Boolean))
        .define(writable("/formW2s/*/writableBox12Code", FactKind::Enum).with_enum_options(BOX12_OPTIONS))
        .define(writable("/formW2s/*/writableHasBox14Codes", FactKind::Boolean))
        .define(writable("/formW2s/*/writableBox14Code", FactKind::Enum).with_enum_options(BOX14_OPTIONS))
        .define(writable("/formW2s/*/writableState", FactKind::String))
        .define(FactDefinition::derived(
            p("/formW2s/*/isComplete"),
            FactKind::Boolean,
            |graph, path| {
                all_complete(&[sibling(graph, path, "employerName"), sibling(graph, path, "wages")])
            },
        ));
    for option in BOX12_OPTIONS.iter().chain(BOX14_OPTIONS.iter()) {
        d.define(writable(&format!("/formW2s/*/{option}"), FactKind::Dollar));
    }

    // Credits and deductions
    d.define(writable("/hadStudentLoanInterestPayments", FactKind::Boolean))
        .define(writable("/studentLoanInterestAmount", FactKind::Dollar))
        .define(writable("/deductionsReviewed", FactKind::Boolean))
        .define(writable("/hadSaversCreditContributions", FactKind::Boolean))
        .define(writable("/saversCreditContributionAmount", FactKind::Dollar))
        .define(writable("/writablePrimaryFilerDependentCarePlanMaximum", FactKind::Dollar))
        .define(writable("/creditsReviewed", FactKind::Boolean))
        .define(writable("/cdccCareProviders", FactKind::Collection))
        .define(writable("/cdccCareProvidersIsDone", FactKind::Boolean))
        .define(writable("/cdccCareProviders/*/writableName", FactKind::String))
        .define(writable("/cdccCareProviders/*/hasW2Employer", FactKind::Boolean))
        .define(writable(
            "/cdccCareProviders/*/writableEmployerWhoFurnishedCare",
            FactKind::CollectionItem,
        ))
        .define(FactDefinition::derived(
            p("/cdccCareProviders/*/isComplete"),
            FactKind::Boolean,
            |graph, path| all_complete(&[sibling(graph, path, "writableName")]),
        ))
        .define(writable("/1095As", FactKind::Collection))
        .define(writable("/1095As/*/issuerName", FactKind::String))
        .define(writable("/1095As/*/monthlyPremium", FactKind::Dollar));

    // Your taxes and signing
    d.define(writable("/writableRequiresPaperFiling", FactKind::Boolean))
        .define(FactDefinition::derived(
            p("/isPaperPath"),
            FactKind::Boolean,
            |graph, _| match graph.get(&concrete("/writableRequiresPaperFiling")).complete_bool() {
                Some(paper) => FactResult::complete(FactValue::Boolean(paper)),
                None => FactResult::placeholder(FactValue::Boolean(false)),
            },
        ))
        .define(writable("/payViaAch", FactKind::Boolean))
        .define(writable("/flowHasSeenPaymentMethodAutocorrect", FactKind::Boolean))
        .define(writable("/flowHasSeenPaymentPaperPathAssertion", FactKind::Boolean))
        .define(FactDefinition::derived(
            p("/finalTaxAmount"),
            FactKind::Dollar,
            |graph, _| {
                let collection = graph.get(&concrete("/formW2s"));
                if !collection.complete {
                    return FactResult::missing();
                }
                let mut total = 0i64;
                for id in collection.complete_items() {
                    let Ok(path) = ConcretePath::parse(format!("/formW2s/#{id}/wages")) else {
                        return FactResult::missing();
                    };
                    match graph.get(&path).get() {
                        Some(FactValue::Dollar(wages)) => total += wages.cents(),
                        _ => return FactResult::missing(),
                    }
                }
                FactResult::complete(FactValue::Dollar(Dollar::from_cents(total / 10)))
            },
        ))
        .define(writable("/flowHasSeenAmount", FactKind::Boolean))
        .define(writable("/flowHasAmountChanged", FactKind::Boolean))
        .define(writable("/hasSeenReviewScreen", FactKind::Boolean))
        .define(writable("/isLegacySigningPath", FactKind::Boolean))
        .define(writable("/isResubmitting", FactKind::Boolean))
        .define(writable("/hasForeignAccounts", FactKind::Boolean))
        .define(writable("/flowIsKnockedOut", FactKind::Boolean).with_placeholder(FactValue::Boolean(false)))
        .define(writable("/signedReturn", FactKind::Boolean));

    Arc::new(d)
}

/// Facts whose true value blocks submission.
pub fn submission_blocking_facts() -> Vec<FactPath> {
    vec![p("/flowIsKnockedOut"), p("/hasForeignAccounts")]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFactGraph;
    use taxflow_core::{Collection, EnumValue};

    fn status(value: &str) -> FactValue {
        FactValue::Enum(EnumValue {
            value: value.to_string(),
            enum_options_path: "/filingStatusOptions".to_string(),
        })
    }

    #[test]
    fn mfs_eligibility_follows_living_arrangement() {
        let mut graph = MemoryFactGraph::new(demo_dictionary());
        graph.set(&concrete("/filingStatus"), status("marriedFilingSeparately")).unwrap();
        graph.save().unwrap();
        assert!(!graph.get(&concrete("/mfsButEligibleForCdcc")).complete);

        graph.set(&concrete("/livedApartFromSpouse"), FactValue::Boolean(true)).unwrap();
        graph.save().unwrap();
        assert_eq!(graph.get(&concrete("/mfsButEligibleForCdcc")).complete_bool(), Some(true));
    }

    #[test]
    fn final_tax_amount_is_a_tenth_of_wages() {
        let mut graph = MemoryFactGraph::new(demo_dictionary());
        graph
            .set(&concrete("/formW2s"), FactValue::Collection(Collection::new(["a", "b"])))
            .unwrap();
        graph
            .set(&ConcretePath::parse("/formW2s/#a/wages").unwrap(), FactValue::Dollar(Dollar(10_000)))
            .unwrap();
        graph.save().unwrap();
        assert!(!graph.get(&concrete("/finalTaxAmount")).complete);

        graph
            .set(&ConcretePath::parse("/formW2s/#b/wages").unwrap(), FactValue::Dollar(Dollar(5_000)))
            .unwrap();
        graph.save().unwrap();
        assert_eq!(
            graph.get(&concrete("/finalTaxAmount")).get(),
            Some(&FactValue::Dollar(Dollar(1_500)))
        );
    }

    #[test]
    fn paper_path_defaults_to_placeholder_false() {
        let graph = MemoryFactGraph::new(demo_dictionary());
        let result = graph.get(&concrete("/isPaperPath"));
        assert!(result.has_value());
        assert!(!result.complete);
    }
}
