//! The demo interview: a simplified individual return written against the
//! fact dictionary in `taxflow_factgraph::demo`. The CLI falls back to it
//! when no flow file is given, and the integration tests drive it.

use taxflow_core::FactPath;

use crate::condition::{ConditionOperator, DataImportOperator, ImportSectionKey, RawCondition};
use crate::declarations::{
    AssertionDecl, AssertionType, CategoryDecl, CollectionLoopDecl, ComponentKind, ContentDecl, DisplayOnlyOn,
    FlowDecl, GateDecl, ScreenDecl, SubSubcategoryDecl, SubcategoryDecl,
};

pub const REVIEW_SCREEN_ROUTE: &str = "/flow/complete/review/review";

fn p(raw: &str) -> FactPath {
    taxflow_core::fact_path!(raw)
}

/// A screen asking for one fact.
fn question(route: &str, component: ComponentKind, path: &str) -> ScreenDecl {
    ScreenDecl::new(route)
        .heading(format!("fields.{route}.heading"))
        .fact(component, p(path))
        .continue_button()
}

fn is_true(path: &str) -> RawCondition {
    RawCondition::with_operator(ConditionOperator::IsTrue, path)
}

fn is_false(condition: &str) -> RawCondition {
    RawCondition::with_operator(ConditionOperator::IsFalse, condition)
}

fn you_and_your_family() -> CategoryDecl {
    let about_you = SubcategoryDecl::new("about-you")
        .collection_context(p("/filers"))
        .complete_if("/aboutYouIsComplete")
        .child(
            SubSubcategoryDecl::new("basic-info")
                .screen(
                    ScreenDecl::new("about-you-intro")
                        .heading("fields.about-you-intro.heading")
                        .content(ContentDecl::new(ComponentKind::InfoDisplay))
                        .continue_button(),
                )
                .screen(
                    question("about-you-name", ComponentKind::GenericString, "/filers/*/firstName")
                        .fact(ComponentKind::GenericString, p("/filers/*/writableMiddleInitial"))
                        .fact(ComponentKind::GenericString, p("/filers/*/lastName")),
                )
                .screen(question("about-you-dob", ComponentKind::DatePicker, "/filers/*/dateOfBirth")),
        )
        .child(
            SubSubcategoryDecl::new("ip-pin")
                .screen(
                    question("about-you-ip-pin-choice", ComponentKind::Boolean, "/filers/*/hasIpPin").when(
                        RawCondition::data_import(
                            ImportSectionKey::IpPinTaxpayerHasIpPin,
                            DataImportOperator::IsUnknown,
                        ),
                    ),
                )
                .screen(
                    question("about-you-ip-pin-ready", ComponentKind::IpPin, "/filers/*/identityPin")
                        .when(is_true("/filers/*/hasIpPin")),
                ),
        );

    let filing_status = SubcategoryDecl::new("filing-status")
        .complete_if("/filingStatusIsComplete")
        .child(
            SubSubcategoryDecl::new("status")
                .screen(question("filing-status", ComponentKind::Enum, "/filingStatus"))
                .child(GateDecl::new("/isMarriedFilingSeparately").child(question(
                    "lived-apart",
                    ComponentKind::Boolean,
                    "/livedApartFromSpouse",
                ))),
        )
        .child(
            SubSubcategoryDecl::new("foreign-accounts").screen(question(
                "foreign-accounts",
                ComponentKind::Boolean,
                "/hasForeignAccounts",
            )),
        );

    let dependents = SubcategoryDecl::new("dependents")
        .collection_context(p("/familyAndHousehold"))
        .complete_if("/familyAndHouseholdIsDone")
        .lock_future_sections_if_collection_items_incomplete()
        .child(
            SubSubcategoryDecl::new("dependents-intro").screen(
                ScreenDecl::new("dependents-hub")
                    .heading("fields.dependents-hub.heading")
                    .content(ContentDecl::collection_item_manager(
                        "/familyAndHousehold",
                        p("/familyAndHouseholdIsDone"),
                    )),
            ),
        )
        .child(
            CollectionLoopDecl::new("/familyAndHousehold")
                .done_path(p("/familyAndHouseholdIsDone"))
                .item_completed_if("/familyAndHousehold/*/isComplete")
                .child(
                    SubSubcategoryDecl::new("dependent-basic-info")
                        .screen(
                            question("dependent-name", ComponentKind::GenericString, "/familyAndHousehold/*/firstName")
                                .fact(ComponentKind::GenericString, p("/familyAndHousehold/*/writableMiddleInitial")),
                        )
                        .screen(question(
                            "dependent-relationship",
                            ComponentKind::GenericString,
                            "/familyAndHousehold/*/relationshipCategory",
                        ))
                        .screen(question(
                            "dependent-support",
                            ComponentKind::Boolean,
                            "/familyAndHousehold/*/writableQrSupportTest",
                        )),
                ),
        );

    CategoryDecl::new("you-and-your-family")
        .child(about_you)
        .child(filing_status)
        .child(dependents)
}

fn income() -> CategoryDecl {
    let w2 = CollectionLoopDecl::new("/formW2s")
        .collection(p("/formW2s"))
        .done_path(p("/formW2sIsDone"))
        .item_completed_if("/formW2s/*/isComplete")
        .child(
            SubSubcategoryDecl::new("w2-basic")
                .screen(question("w2-employer", ComponentKind::GenericString, "/formW2s/*/employerName"))
                .screen(question("w2-wages", ComponentKind::Dollar, "/formW2s/*/wages")),
        )
        .child(
            SubSubcategoryDecl::new("w2-codes")
                .screen(question("w2-has-box12", ComponentKind::Boolean, "/formW2s/*/writableHasBox12Codes"))
                .child(GateDecl::new("/formW2s/*/writableHasBox12Codes").child(question(
                    "w2-box12",
                    ComponentKind::Enum,
                    "/formW2s/*/writableBox12Code",
                )))
                .screen(question("w2-has-box14", ComponentKind::Boolean, "/formW2s/*/writableHasBox14Codes"))
                .child(GateDecl::new("/formW2s/*/writableHasBox14Codes").child(question(
                    "w2-box14",
                    ComponentKind::Enum,
                    "/formW2s/*/writableBox14Code",
                )))
                .screen(question("w2-state", ComponentKind::GenericString, "/formW2s/*/writableState")),
        );

    let jobs = SubcategoryDecl::new("jobs")
        .complete_if("/formW2sIsDone")
        .lock_future_sections_if_collection_items_incomplete()
        .child(
            SubSubcategoryDecl::new("jobs-intro").screen(
                ScreenDecl::new("w2-hub")
                    .heading("fields.w2-hub.heading")
                    .content(ContentDecl::collection_item_manager("/formW2s", p("/formW2sIsDone"))),
            ),
        )
        .child(AssertionDecl {
            assertion_type: AssertionType::Info,
            i18n_key: "dataviews.jobs.noFormW2s".to_string(),
            condition: Some(is_false("/formW2sIsDone")),
            conditions: Vec::new(),
            edit_route: Some("/flow/income/jobs/w2-hub".to_string()),
        })
        .child(w2);

    CategoryDecl::new("income").child(jobs)
}

fn credits_and_deductions() -> CategoryDecl {
    let deductions = SubcategoryDecl::new("deductions")
        .complete_if("/deductionsReviewed")
        .child(
            SubSubcategoryDecl::new("student-loans")
                .screen(question(
                    "student-loan-interest",
                    ComponentKind::Boolean,
                    "/hadStudentLoanInterestPayments",
                ))
                .child(GateDecl::new("/hadStudentLoanInterestPayments").child(question(
                    "student-loan-amount",
                    ComponentKind::Dollar,
                    "/studentLoanInterestAmount",
                ))),
        )
        .child(
            SubSubcategoryDecl::new("deductions-done").screen(
                ScreenDecl::new("deductions-breather")
                    .heading("fields.deductions-breather.heading")
                    .continue_button()
                    .set_fact(p("/deductionsReviewed"), "/flowTrue"),
            ),
        );

    let care_providers = CollectionLoopDecl::new("/cdccCareProviders")
        .collection(p("/cdccCareProviders"))
        .inner()
        .done_path(p("/cdccCareProvidersIsDone"))
        .item_completed_if("/cdccCareProviders/*/isComplete")
        .child(question(
            "care-provider-name",
            ComponentKind::GenericString,
            "/cdccCareProviders/*/writableName",
        ))
        .child(question(
            "care-provider-employer",
            ComponentKind::Boolean,
            "/cdccCareProviders/*/hasW2Employer",
        ))
        .child(GateDecl::new("/cdccCareProviders/*/hasW2Employer").child(question(
            "care-provider-which-employer",
            ComponentKind::CollectionItemReference,
            "/cdccCareProviders/*/writableEmployerWhoFurnishedCare",
        )));

    let premiums = CollectionLoopDecl::new("/1095As")
        .collection(p("/1095As"))
        .inner()
        .child(question("1095a-issuer", ComponentKind::GenericString, "/1095As/*/issuerName"))
        .child(question("1095a-premium", ComponentKind::Dollar, "/1095As/*/monthlyPremium"));

    let credits = SubcategoryDecl::new("credits")
        .complete_if("/creditsReviewed")
        .child(
            SubSubcategoryDecl::new("savers")
                .screen(question(
                    "savers-contributions",
                    ComponentKind::Boolean,
                    "/hadSaversCreditContributions",
                ))
                .child(GateDecl::new("/hadSaversCreditContributions").child(question(
                    "savers-amount",
                    ComponentKind::Dollar,
                    "/saversCreditContributionAmount",
                ))),
        )
        .child(
            SubSubcategoryDecl::new("dependent-care")
                .screen(
                    question(
                        "dependent-care-plan",
                        ComponentKind::Dollar,
                        "/writablePrimaryFilerDependentCarePlanMaximum",
                    )
                    .when(is_true("/mfsButEligibleForCdcc")),
                )
                .screen(
                    ScreenDecl::new("care-providers-hub")
                        .heading("fields.care-providers-hub.heading")
                        .content(ContentDecl::collection_item_manager(
                            "/cdccCareProviders",
                            p("/cdccCareProvidersIsDone"),
                        )),
                )
                .child(care_providers),
        )
        .child(
            SubSubcategoryDecl::new("premium-tax-credit")
                .screen(
                    ScreenDecl::new("1095a-import-notice")
                        .when(RawCondition::data_import(
                            ImportSectionKey::HasAtLeastOne1095A,
                            DataImportOperator::IsTrue,
                        ))
                        .heading("fields.1095a-import-notice.heading")
                        .content(ContentDecl::new(ComponentKind::DataPreview))
                        .continue_button(),
                )
                .screen(
                    ScreenDecl::new("1095a-hub")
                        .heading("fields.1095a-hub.heading")
                        .content(ContentDecl {
                            loop_name: Some("/1095As".to_string()),
                            ..ContentDecl::new(ComponentKind::CollectionItemManager)
                        }),
                )
                .child(premiums),
        )
        .child(
            SubSubcategoryDecl::new("credits-done").screen(
                ScreenDecl::new("credits-breather")
                    .heading("fields.credits-breather.heading")
                    .continue_button()
                    .set_fact(p("/creditsReviewed"), "/flowTrue"),
            ),
        );

    CategoryDecl::new("credits-and-deductions")
        .child(deductions)
        .child(credits)
}

fn your_taxes() -> CategoryDecl {
    let payment = SubcategoryDecl::new("payment")
        .complete_if(vec![
            RawCondition::with_operator(ConditionOperator::IsComplete, "/payViaAch"),
            RawCondition::from("/flowHasSeenAmount"),
        ])
        .child(
            SubSubcategoryDecl::new("paper-filing").screen(question(
                "paper-filing",
                ComponentKind::Boolean,
                "/writableRequiresPaperFiling",
            )),
        )
        .child(
            SubSubcategoryDecl::new("payment-method")
                .screen(question("payment-method", ComponentKind::Boolean, "/payViaAch"))
                .screen(
                    ScreenDecl::new("payment-method-autocorrect")
                        .when(is_true("/isPaperPath"))
                        .heading("fields.payment-method-autocorrect.heading")
                        .content(ContentDecl::new(ComponentKind::DfAlert))
                        .continue_button()
                        .set_fact(p("/flowHasSeenPaymentMethodAutocorrect"), "/flowTrue"),
                ),
        )
        .child(
            SubSubcategoryDecl::new("amount").screen(
                ScreenDecl::new("tax-amount")
                    .heading("fields.tax-amount.heading")
                    .content(ContentDecl::fact(ComponentKind::Dollar, p("/finalTaxAmount")).read_only())
                    .content(
                        ContentDecl::new(ComponentKind::TaxReturnAlert).display_only_on(DisplayOnlyOn::DataView),
                    )
                    .continue_button()
                    .set_fact(p("/flowHasSeenAmount"), "/flowTrue"),
            ),
        );

    CategoryDecl::new("your-taxes").child(payment)
}

fn complete() -> CategoryDecl {
    let review = SubcategoryDecl::new("review")
        .skip_data_view()
        .complete_if("/hasSeenReviewScreen")
        .child(
            SubSubcategoryDecl::new("review").screen(
                ScreenDecl::new("review")
                    .heading("fields.review.heading")
                    .content(ContentDecl::new(ComponentKind::SummaryTable))
                    .continue_button()
                    .set_fact(p("/hasSeenReviewScreen"), "/flowTrue"),
            ),
        );

    let signing = SubcategoryDecl::new("sign-and-submit")
        .skip_data_view()
        .sign_and_submit()
        .complete_if("/signedReturn")
        .child(
            SubSubcategoryDecl::new("sign").child(
                GateDecl::new("submissionBlockingFactsAreFalse")
                    .child(
                        ScreenDecl::new("sign-return")
                            .when("isEssarSigningPath")
                            .heading("fields.sign-return.heading")
                            .fact(ComponentKind::Boolean, p("/signedReturn"))
                            .content(ContentDecl::new(ComponentKind::SubmitButton)),
                    )
                    .child(
                        ScreenDecl::new("sign-return-legacy")
                            .when(is_false("isEssarSigningPath"))
                            .heading("fields.sign-return-legacy.heading")
                            .fact(ComponentKind::Boolean, p("/signedReturn"))
                            .content(ContentDecl::new(ComponentKind::SubmitButton)),
                    ),
            ),
        );

    CategoryDecl::new("complete").child(review).child(signing)
}

fn knockout() -> CategoryDecl {
    CategoryDecl::new("knockout").child(
        SubcategoryDecl::new("foreign-accounts-knockout").skip_data_view().child(
            ScreenDecl::new("knockout-foreign-accounts")
                .when("/hasForeignAccounts")
                .knockout()
                .heading("fields.knockout-foreign-accounts.heading")
                .content(ContentDecl::new(ComponentKind::KnockoutButton)),
        ),
    )
}

pub fn demo_flow() -> FlowDecl {
    FlowDecl::new()
        .child(you_and_your_family())
        .child(income())
        .child(credits_and_deductions())
        .child(your_taxes())
        .child(complete())
        .child(knockout())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FlowConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn demo_flow_compiles() {
        let flow = FlowConfig::compile(&demo_flow()).unwrap();
        assert_eq!(flow.categories().len(), 6);
        assert!(flow.screen_by_route(REVIEW_SCREEN_ROUTE).is_some());
        let providers = flow.loop_by_name("/cdccCareProviders").unwrap();
        assert!(providers.is_inner);
        assert_eq!(providers.full_route, "/flow/credits-and-deductions/credits/dependent-care");
    }

    #[test]
    fn demo_flow_survives_json() {
        let decl = demo_flow();
        let json = serde_json::to_string(&decl).unwrap();
        assert_eq!(FlowDecl::from_json_str(&json).unwrap(), decl);
    }
}
