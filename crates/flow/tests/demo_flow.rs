//! Resolution over the demo interview and the demo fact dictionary.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use taxflow_core::{Collection, ConcretePath, Dollar, EnumValue, FactGraph, FactValue};
use taxflow_factgraph::demo::{demo_dictionary, submission_blocking_facts};
use taxflow_factgraph::MemoryFactGraph;
use taxflow_flow::checklist::KNOCKOUT_CATEGORY_ROUTE;
use taxflow_flow::demo::demo_flow;
use taxflow_flow::{ExternalContext, FlowConfig, FlowResolver, NextScreen, NextScreenOptions, ScreenId};

fn flow() -> FlowConfig {
    FlowConfig::compile(&demo_flow()).unwrap()
}

fn set(g: &mut MemoryFactGraph, path: &str, value: FactValue) {
    g.set(&ConcretePath::parse(path).unwrap(), value).unwrap();
}

fn screen(flow: &FlowConfig, route: &str) -> ScreenId {
    flow.screen_by_route(route)
        .unwrap_or_else(|| panic!("no screen at {route}"))
        .id
}

fn string(value: &str) -> FactValue {
    FactValue::String(value.to_string())
}

fn add_w2(g: &mut MemoryFactGraph, id: &str, employer: Option<&str>, wages: Option<i64>) {
    if let Some(employer) = employer {
        set(g, &format!("/formW2s/#{id}/employerName"), string(employer));
    }
    if let Some(cents) = wages {
        set(g, &format!("/formW2s/#{id}/wages"), FactValue::Dollar(Dollar::from_cents(cents)));
    }
}

fn graph_with_w2s(items: &[&str]) -> MemoryFactGraph {
    let mut g = MemoryFactGraph::new(demo_dictionary());
    set(&mut g, "/formW2s", FactValue::Collection(Collection::new(items.iter().copied())));
    g
}

#[test]
fn incomplete_second_item_is_found_in_its_own_loop_iteration() {
    let flow = flow();
    let mut g = graph_with_w2s(&["a", "b"]);
    add_w2(&mut g, "a", Some("Acme"), Some(5_000_000));
    add_w2(&mut g, "b", Some("Globex"), None);
    g.save().unwrap();

    let ctx = ExternalContext::default();
    let resolver = FlowResolver::new(&flow, &g, &ctx);
    let jobs = flow.subcategory_by_route("/flow/income/jobs").unwrap().id;
    let location = resolver.find_first_incomplete_screen_of_subcategory(jobs, None).unwrap();

    assert_eq!(location.screen, screen(&flow, "/flow/income/jobs/w2-wages"));
    assert_eq!(location.collection_id.as_deref(), Some("b"));
    assert!(!resolver.is_subcategory_complete(jobs, None));
}

#[test]
fn finished_items_but_undone_loop_route_to_the_hub() {
    let flow = flow();
    let mut g = graph_with_w2s(&["a"]);
    add_w2(&mut g, "a", Some("Acme"), Some(100));
    g.save().unwrap();

    let ctx = ExternalContext::default();
    let resolver = FlowResolver::new(&flow, &g, &ctx);
    let jobs = flow.subcategory_by_route("/flow/income/jobs").unwrap().id;
    let location = resolver.find_first_incomplete_screen_of_subcategory(jobs, None).unwrap();
    assert_eq!(location.screen, screen(&flow, "/flow/income/jobs/w2-hub"));
    assert_eq!(location.collection_id, None);

    set(&mut g, "/formW2sIsDone", FactValue::Boolean(true));
    g.save().unwrap();
    let resolver = FlowResolver::new(&flow, &g, &ctx);
    assert_eq!(resolver.find_first_incomplete_screen_of_subcategory(jobs, None), None);
    assert!(resolver.is_subcategory_complete(jobs, None));
}

#[test]
fn empty_return_starts_at_about_you() {
    let flow = flow();
    let g = MemoryFactGraph::new(demo_dictionary());
    let ctx = ExternalContext::default();
    let state = FlowResolver::new(&flow, &g, &ctx).checklist_state(None, &[KNOCKOUT_CATEGORY_ROUTE]);

    assert_eq!(state.len(), 5);
    let about_you = &state[0].subcategories[0];
    assert_eq!(about_you.subcategory_route, "/flow/you-and-your-family/about-you");
    assert!(about_you.is_next);
    assert_eq!(
        about_you.navigation_url.as_deref(),
        Some("/flow/you-and-your-family/about-you/about-you-intro")
    );
    assert!(state
        .iter()
        .flat_map(|c| c.subcategories.iter())
        .skip(1)
        .all(|s| !s.is_next && !s.is_complete));
}

#[test]
fn completed_about_you_links_to_its_data_view() {
    let flow = flow();
    let mut g = MemoryFactGraph::new(demo_dictionary());
    set(&mut g, "/filers", FactValue::Collection(Collection::new(["f1"])));
    set(&mut g, "/filers/#f1/firstName", string("Ada"));
    set(&mut g, "/filers/#f1/lastName", string("Lovelace"));
    set(
        &mut g,
        "/filers/#f1/dateOfBirth",
        FactValue::Date(NaiveDate::from_ymd_opt(1985, 12, 10).unwrap()),
    );
    g.save().unwrap();

    let ctx = ExternalContext::default();
    let state = FlowResolver::new(&flow, &g, &ctx).checklist_state(None, &[KNOCKOUT_CATEGORY_ROUTE]);
    let family = &state[0].subcategories;

    assert!(family[0].is_complete);
    assert_eq!(
        family[0].navigation_url.as_deref(),
        Some("/data-view/flow/you-and-your-family/about-you?%2Ffilers=f1&reviewMode=true")
    );
    assert!(family[1].is_next);
    assert_eq!(
        family[1].navigation_url.as_deref(),
        Some("/flow/you-and-your-family/filing-status/filing-status")
    );
}

#[test]
fn gated_screens_are_skipped_when_walking_forward() {
    let flow = flow();
    let mut g = MemoryFactGraph::new(demo_dictionary());
    set(
        &mut g,
        "/filingStatus",
        FactValue::Enum(EnumValue {
            value: "single".to_string(),
            enum_options_path: "/filingStatusOptions".to_string(),
        }),
    );
    g.save().unwrap();
    let ctx = ExternalContext::default();
    let resolver = FlowResolver::new(&flow, &g, &ctx);

    let next = resolver
        .get_next_screen(
            screen(&flow, "/flow/you-and-your-family/filing-status/filing-status"),
            None,
            NextScreenOptions::default(),
        )
        .unwrap();
    assert_eq!(
        next.full_route(&flow),
        "/flow/you-and-your-family/filing-status/foreign-accounts"
    );

    let leaving = resolver
        .get_next_screen(
            screen(&flow, "/flow/you-and-your-family/filing-status/foreign-accounts"),
            None,
            NextScreenOptions::default(),
        )
        .unwrap();
    assert_eq!(
        leaving,
        NextScreen::Route {
            route: "/data-view/flow/you-and-your-family/filing-status".to_string(),
            collection_id: None,
        }
    );
}

#[test]
fn loop_items_end_at_their_own_data_view() {
    let flow = flow();
    let mut g = graph_with_w2s(&["a"]);
    set(&mut g, "/formW2s/#a/writableHasBox12Codes", FactValue::Boolean(false));
    set(&mut g, "/formW2s/#a/writableHasBox14Codes", FactValue::Boolean(false));
    g.save().unwrap();
    let ctx = ExternalContext::default();
    let resolver = FlowResolver::new(&flow, &g, &ctx);

    let end = resolver
        .get_next_screen(screen(&flow, "/flow/income/jobs/w2-state"), Some("a"), NextScreenOptions::default())
        .unwrap();
    assert_eq!(end.full_route(&flow), "/data-view/loop/%2FformW2s/a");
    assert_eq!(end.collection_id(), Some("a"));

    let review = NextScreenOptions {
        navigate_to_data_view_at_end_of_sub_subcategory: true,
    };
    let edit = resolver
        .get_next_screen(screen(&flow, "/flow/income/jobs/w2-wages"), Some("a"), review)
        .unwrap();
    assert_eq!(edit.full_route(&flow), "/data-view/loop/%2FformW2s/a");

    let within = resolver
        .get_next_screen(screen(&flow, "/flow/income/jobs/w2-has-box12"), Some("a"), review)
        .unwrap();
    assert_eq!(
        within.full_route(&flow),
        "/flow/income/jobs/w2-has-box14?%2FformW2s=a"
    );
}

#[test]
fn signing_waits_for_blocking_facts() {
    let flow = flow();
    let mut g = MemoryFactGraph::new(demo_dictionary());
    let ctx = ExternalContext::default().with_submission_blocking_facts(submission_blocking_facts());
    let legacy = flow.screen_by_route("/flow/complete/sign-and-submit/sign-return-legacy").unwrap();
    let essar = flow.screen_by_route("/flow/complete/sign-and-submit/sign-return").unwrap();

    assert!(!legacy.is_available(&g, &ctx, None));

    set(&mut g, "/hasForeignAccounts", FactValue::Boolean(false));
    g.save().unwrap();
    assert!(legacy.is_available(&g, &ctx, None));
    assert!(!essar.is_available(&g, &ctx, None));

    set(&mut g, "/hasForeignAccounts", FactValue::Boolean(true));
    g.save().unwrap();
    assert!(!legacy.is_available(&g, &ctx, None));
}

#[test]
fn review_screen_is_followed_by_signing() {
    let flow = flow();
    let mut g = MemoryFactGraph::new(demo_dictionary());
    set(&mut g, "/hasForeignAccounts", FactValue::Boolean(false));
    g.save().unwrap();
    let ctx = ExternalContext::default().with_submission_blocking_facts(submission_blocking_facts());
    let resolver = FlowResolver::new(&flow, &g, &ctx);

    let next = resolver
        .get_next_screen(
            screen(&flow, taxflow_flow::demo::REVIEW_SCREEN_ROUTE),
            None,
            NextScreenOptions::default(),
        )
        .unwrap();
    // The review subcategory has no data view.
    assert_eq!(next.full_route(&flow), "/checklist");

    let routes = flow.routes_from(taxflow_flow::demo::REVIEW_SCREEN_ROUTE);
    assert_eq!(routes.first().copied(), Some(taxflow_flow::demo::REVIEW_SCREEN_ROUTE));
    assert!(routes.iter().any(|r| r.contains("knockout")));
}

proptest! {
    #[test]
    fn resolution_does_not_depend_on_call_order(complete in proptest::collection::vec(any::<bool>(), 1..5)) {
        let flow = flow();
        let ids: Vec<String> = (0..complete.len()).map(|i| format!("w{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut g = graph_with_w2s(&refs);
        for (id, done) in ids.iter().zip(&complete) {
            add_w2(&mut g, id, Some("Employer"), done.then_some(1_000));
        }
        g.save().unwrap();

        let ctx = ExternalContext::default();
        let resolver = FlowResolver::new(&flow, &g, &ctx);
        let jobs = flow.subcategory_by_route("/flow/income/jobs").unwrap().id;

        let first = resolver.find_first_incomplete_screen_of_subcategory(jobs, None);
        let checklist = resolver.checklist_state(None, &[KNOCKOUT_CATEGORY_ROUTE]);
        prop_assert_eq!(resolver.find_first_incomplete_screen_of_subcategory(jobs, None), first.clone());
        prop_assert_eq!(resolver.checklist_state(None, &[KNOCKOUT_CATEGORY_ROUTE]), checklist);

        let expected_item = complete.iter().position(|done| !done).map(|i| ids[i].clone());
        match expected_item {
            Some(item) => prop_assert_eq!(first.and_then(|l| l.collection_id), Some(item)),
            None => prop_assert_eq!(first.map(|l| l.screen), Some(screen(&flow, "/flow/income/jobs/w2-hub"))),
        }
    }
}
