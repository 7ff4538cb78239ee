//! A fact graph decorator that owns the "changing X must also clear Y"
//! policy the engine itself knows nothing about.
//!
//! `save` runs a strictly ordered cascade. Each correction that triggers
//! deletes its facts, saves the engine again and returns without looking at
//! later corrections; the W-2 normalizers only run when none triggered.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use taxflow_core::{
    ConcretePath, FactDictionary, FactGraph, FactResult, FactValue, FlowResult, SaveOutcome,
};
use taxflow_flow::{apply_set_fact_actions, ExternalContext, FlowConfig, FlowResolver, ScreenId};

use crate::field_clearing;
use crate::w2;

const HAS_SEEN_REVIEW_SCREEN: &str = "/hasSeenReviewScreen";
const FILING_STATUS: &str = "/filingStatus";
const MFJ_OPTION: &str = "marriedFilingJointly";
const MFS_CONSIDERED_UNMARRIED: &str = "/mfsButEligibleForCdcc";
const PF_MAX_DEP_CARE_EXCLUSION: &str = "/writablePrimaryFilerDependentCarePlanMaximum";
const IS_PAPER_PATH: &str = "/isPaperPath";
const PAYMENT_METHOD: &str = "/payViaAch";
const PAYMENT_METHOD_WAS_AUTOCORRECTED: &str = "/flowHasSeenPaymentMethodAutocorrect";
const PAYMENT_METHOD_ASSERTION: &str = "/flowHasSeenPaymentPaperPathAssertion";
const KNOCKOUT_MARKER: &str = "knockout";

fn concrete(raw: &str) -> FlowResult<ConcretePath> {
    ConcretePath::parse(raw)
}

/// Both results are complete and hold different values.
fn changed(before: &FactResult, after: &FactResult) -> bool {
    before.complete && after.complete && before.value != after.value
}

fn is_mfj(result: &FactResult) -> bool {
    result.get().and_then(FactValue::as_enum) == Some(MFJ_OPTION)
}

pub struct InterceptingFactGraph<G: FactGraph> {
    inner: G,
    flow: Arc<FlowConfig>,
    /// Routes on which the review screen still counts as seen. `None` when
    /// the flow has no review screen.
    review_routes: Option<HashSet<String>>,
    current_route: Option<String>,
    dirty: Vec<ConcretePath>,
    pub(crate) previous_final_tax_amount: Option<String>,
}

impl<G: FactGraph> InterceptingFactGraph<G> {
    pub fn new(inner: G, flow: Arc<FlowConfig>, review_route: &str) -> Self {
        let routes = flow.routes_from(review_route);
        let has_review_fact = concrete(HAS_SEEN_REVIEW_SCREEN)
            .and_then(|path| inner.dictionary().definition_for(&path).map(|_| ()))
            .is_ok();
        let review_routes = if routes.is_empty() {
            warn!(route = %review_route, "Review screen not found in the flow, review staleness is disabled");
            None
        } else if !has_review_fact {
            warn!(fact = HAS_SEEN_REVIEW_SCREEN, "Review fact not in the dictionary, review staleness is disabled");
            None
        } else {
            Some(
                routes
                    .into_iter()
                    .filter(|route| !route.contains(KNOCKOUT_MARKER))
                    .map(str::to_string)
                    .collect(),
            )
        };
        Self {
            inner,
            flow,
            review_routes,
            current_route: None,
            dirty: Vec::new(),
            previous_final_tax_amount: None,
        }
    }

    pub fn flow(&self) -> &FlowConfig {
        &self.flow
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    pub fn into_inner(self) -> G {
        self.inner
    }

    /// Paths set or deleted since the last save that completed the cascade.
    pub fn dirty_paths(&self) -> &[ConcretePath] {
        &self.dirty
    }

    /// Records where the filer is. Query string and fragment are dropped.
    pub fn set_current_route(&mut self, route: impl Into<String>) {
        let mut route = route.into();
        if let Some(idx) = route.find(|c| c == '?' || c == '#') {
            route.truncate(idx);
        }
        self.current_route = Some(route);
    }

    pub fn current_route(&self) -> Option<&str> {
        self.current_route.as_deref()
    }

    pub fn resolver<'a>(&'a self, ctx: &'a ExternalContext) -> FlowResolver<'a> {
        FlowResolver::new(&self.flow, self, ctx)
    }

    /// Makes `screen` the current route and reports whether it is available
    /// for `collection_id`. Import conditions on the screen stage the
    /// imported IP PIN facts.
    pub fn enter_screen(
        &mut self,
        screen: ScreenId,
        collection_id: Option<&str>,
        ctx: &ExternalContext,
    ) -> FlowResult<bool> {
        let flow = Arc::clone(&self.flow);
        let screen = flow.screen(screen);
        self.set_current_route(screen.screen_route.as_str());
        for condition in &screen.conditions {
            condition.evaluate_recording_imports(&mut *self, ctx, collection_id)?;
        }
        Ok(screen.is_available(&*self, ctx, collection_id))
    }

    /// Applies the screen's set-fact actions and saves.
    pub fn leave_screen(
        &mut self,
        screen: ScreenId,
        collection_id: Option<&str>,
        ctx: &ExternalContext,
    ) -> FlowResult<SaveOutcome> {
        let flow = Arc::clone(&self.flow);
        let screen = flow.screen(screen);
        let applied = apply_set_fact_actions(&screen.set_actions, &mut *self, ctx, collection_id)?;
        debug!(screen = %screen.screen_route, applied, "Leaving screen");
        self.save()
    }

    fn should_mark_review_unseen(&self) -> bool {
        match &self.review_routes {
            Some(routes) => !routes.contains(self.current_route.as_deref().unwrap_or_default()),
            None => false,
        }
    }
}

impl<G: FactGraph> FactGraph for InterceptingFactGraph<G> {
    fn get(&self, path: &ConcretePath) -> FactResult {
        self.inner.get(path)
    }

    fn set(&mut self, path: &ConcretePath, value: FactValue) -> FlowResult<()> {
        self.dirty.push(path.clone());
        self.inner.set(path, value)
    }

    fn delete(&mut self, path: &ConcretePath) {
        self.dirty.push(path.clone());
        self.inner.delete(path)
    }

    fn save(&mut self) -> FlowResult<SaveOutcome> {
        if self.should_mark_review_unseen() {
            self.set(&concrete(HAS_SEEN_REVIEW_SCREEN)?, FactValue::Boolean(false))?;
        }

        let filing_status = concrete(FILING_STATUS)?;
        let mfs_unmarried = concrete(MFS_CONSIDERED_UNMARRIED)?;
        let is_paper_path = concrete(IS_PAPER_PATH)?;
        let filing_status_before = self.inner.get(&filing_status);
        let mfs_unmarried_before = self.inner.get(&mfs_unmarried);
        let paper_path_before = self.inner.get(&is_paper_path);
        let autocorrected_before = self.inner.get(&concrete(PAYMENT_METHOD_WAS_AUTOCORRECTED)?);

        let outcome = self.inner.save()?;

        let filing_status_after = self.inner.get(&filing_status);
        let paper_path_after = self.inner.get(&is_paper_path);
        let mfs_unmarried_after = self.inner.get(&mfs_unmarried);

        if changed(&filing_status_before, &filing_status_after)
            && (is_mfj(&filing_status_before) || is_mfj(&filing_status_after))
        {
            let fields = field_clearing::fields_to_clear_on_filing_status_change(&self.flow, &self.inner)?;
            info!(count = fields.len(), "Filing status moved into or out of married filing jointly, clearing facts");
            for field in &fields {
                self.delete(field);
            }
            return self.inner.save();
        }

        if paper_path_before.complete_bool() == Some(true)
            && paper_path_after.complete_bool() == Some(false)
            && autocorrected_before.complete_bool() == Some(true)
        {
            info!("Filer left the paper path after a payment method autocorrection, clearing payment method");
            for raw in [PAYMENT_METHOD, PAYMENT_METHOD_WAS_AUTOCORRECTED, PAYMENT_METHOD_ASSERTION] {
                self.delete(&concrete(raw)?);
            }
            return self.inner.save();
        }

        if changed(&mfs_unmarried_before, &mfs_unmarried_after) {
            info!("Dependent care eligibility changed, clearing the employer exclusion");
            self.delete(&concrete(PF_MAX_DEP_CARE_EXCLUSION)?);
            return self.inner.save();
        }

        w2::normalize_w2s(&mut self.inner, &self.dirty)?;
        w2::clear_dangling_w2_references(&mut self.inner, &self.dirty)?;
        self.dirty.clear();
        Ok(outcome)
    }

    fn to_json(&self) -> FlowResult<serde_json::Value> {
        self.inner.to_json()
    }

    fn dictionary(&self) -> &FactDictionary {
        self.inner.dictionary()
    }
}
