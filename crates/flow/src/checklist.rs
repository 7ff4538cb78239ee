//! Per-section progress shown on the checklist: which subcategory is next,
//! which are complete or started, and where each one links to.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::SubcategoryConfig;
use crate::navigation::FlowResolver;
use crate::routes;

pub const KNOCKOUT_CATEGORY_ROUTE: &str = "/flow/knockout";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionCode {
    pub error_code: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// The latest submission outcome for the return, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionStatus {
    pub status: String,
    pub rejection_codes: Vec<RejectionCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistSubcategoryState {
    pub subcategory_route: String,
    pub is_next: bool,
    pub is_started_but_not_complete: bool,
    pub is_complete: bool,
    pub has_incomplete_collection_item: bool,
    pub navigation_url: Option<String>,
    pub has_rejection_errors: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistCategoryState {
    pub route: String,
    pub subcategories: Vec<ChecklistSubcategoryState>,
    pub category_active: bool,
}

impl<'a> FlowResolver<'a> {
    /// The collection item a subcategory is shown for from the checklist:
    /// the first item of its collection.
    pub fn default_collection_id(&self, sub: &SubcategoryConfig) -> Option<String> {
        sub.collection_name
            .as_ref()
            .and_then(|collection| self.first_collection_item(collection))
    }

    fn is_hidden(&self, sub: &SubcategoryConfig, collection_id: Option<&str>) -> bool {
        sub.display_only_if
            .iter()
            .any(|c| !c.evaluate(self.graph, self.ctx, collection_id))
    }

    /// Walks categories in order. Only the first subcategory that is not
    /// complete is next, and nothing after it can be complete.
    pub fn checklist_state(
        &self,
        submission_status: Option<&SubmissionStatus>,
        excluded_categories: &[&str],
    ) -> Vec<ChecklistCategoryState> {
        let has_rejection_errors = submission_status.is_some_and(|s| !s.rejection_codes.is_empty());
        let mut prev_complete = true;
        let mut categories = Vec::new();

        for category in self.flow.categories() {
            if excluded_categories.contains(&category.route.as_str()) {
                continue;
            }
            let mut category_active = false;
            let mut subcategories = Vec::new();

            for sub_id in &category.subcategories {
                let sub = self.flow.subcategory(*sub_id);
                let collection_id = self.default_collection_id(sub);
                let id = collection_id.as_deref();
                if self.is_hidden(sub, id) {
                    debug!(subcategory = %sub.route, "Subcategory hidden");
                    continue;
                }

                let started = self.subcategory_has_some_completed_facts(sub.id, id);
                let has_incomplete_collection_item = category_active
                    && prev_complete
                    && started
                    && sub
                        .loops
                        .iter()
                        .filter(|loop_id| {
                            self.flow
                                .collection_loop(**loop_id)
                                .screens
                                .iter()
                                .any(|s| self.screen_available(*s, id))
                        })
                        .any(|loop_id| self.has_at_least_one_incomplete_collection_item(*loop_id));
                let locked = sub.lock_future_sections_if_collection_items_incomplete && has_incomplete_collection_item;

                let is_complete = prev_complete
                    && sub.complete_if.iter().all(|c| c.evaluate(self.graph, self.ctx, id))
                    && !locked;
                let mut is_next = prev_complete && !is_complete;
                if is_next {
                    prev_complete = false;
                }
                if is_next || is_complete {
                    category_active = true;
                }
                let is_started_but_not_complete = is_next && !is_complete && started;

                let navigation_url = if !category_active {
                    None
                } else if sub.has_data_view && (is_complete || is_started_but_not_complete) {
                    let override_screen = sub
                        .screens
                        .iter()
                        .map(|s| self.flow.screen(*s))
                        .filter(|s| s.act_as_data_view)
                        .find(|s| s.is_available(self.graph, self.ctx, id));
                    Some(match override_screen {
                        Some(screen) => screen.full_route(id, true),
                        None => routes::with_query(
                            &routes::data_view_route(&sub.route),
                            &routes::url_search_params(sub.collection_name.as_ref(), id, true),
                        ),
                    })
                } else {
                    sub.screens
                        .iter()
                        .map(|s| self.flow.screen(*s))
                        .find(|s| s.is_available(self.graph, self.ctx, id))
                        .map(|s| s.full_route(id, false))
                };

                // A next subcategory with nowhere to go is skipped over.
                if is_next && navigation_url.is_none() {
                    is_next = false;
                    prev_complete = true;
                }

                subcategories.push(ChecklistSubcategoryState {
                    subcategory_route: sub.route.clone(),
                    is_next,
                    is_started_but_not_complete,
                    is_complete,
                    has_incomplete_collection_item,
                    navigation_url,
                    has_rejection_errors,
                });
            }

            categories.push(ChecklistCategoryState {
                route: category.route.clone(),
                subcategories,
                category_active,
            });
        }
        categories
    }
}
