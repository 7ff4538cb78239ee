//! Resolution over the compiled flow and the current fact state: the first
//! incomplete screen of a subcategory, subcategory completeness and the
//! screen that follows another one.

use serde::Serialize;
use tracing::debug;

use taxflow_core::{FactGraph, FlowError, FlowResult};

use crate::condition::conditions_pass;
use crate::context::ExternalContext;
use crate::model::{FlowConfig, ScreenConfig, ScreenId, SubcategoryChild, SubcategoryId};
use crate::routes;

/// A screen together with the collection item it is shown for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenLocation {
    pub screen: ScreenId,
    pub collection_id: Option<String>,
}

impl ScreenLocation {
    fn new(screen: ScreenId, collection_id: Option<&str>) -> Self {
        Self {
            screen,
            collection_id: collection_id.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NextScreenOptions {
    /// Leave for the data view as soon as the subsubcategory ends (review
    /// mode edits).
    pub navigate_to_data_view_at_end_of_sub_subcategory: bool,
}

/// Where the filer goes after a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextScreen {
    Screen(ScreenLocation),
    Route {
        route: String,
        collection_id: Option<String>,
    },
}

impl NextScreen {
    fn route(route: impl Into<String>, collection_id: Option<&str>) -> Self {
        NextScreen::Route {
            route: route.into(),
            collection_id: collection_id.map(str::to_string),
        }
    }

    pub fn full_route(&self, flow: &FlowConfig) -> String {
        match self {
            NextScreen::Screen(location) => flow
                .screen(location.screen)
                .full_route(location.collection_id.as_deref(), false),
            NextScreen::Route { route, .. } => route.clone(),
        }
    }

    pub fn collection_id(&self) -> Option<&str> {
        match self {
            NextScreen::Screen(location) => location.collection_id.as_deref(),
            NextScreen::Route { collection_id, .. } => collection_id.as_deref(),
        }
    }
}

/// Read-only view of a flow against one fact state.
#[derive(Clone, Copy)]
pub struct FlowResolver<'a> {
    pub(crate) flow: &'a FlowConfig,
    pub(crate) graph: &'a dyn FactGraph,
    pub(crate) ctx: &'a ExternalContext,
}

impl<'a> FlowResolver<'a> {
    pub fn new(flow: &'a FlowConfig, graph: &'a dyn FactGraph, ctx: &'a ExternalContext) -> Self {
        Self { flow, graph, ctx }
    }

    pub fn flow(&self) -> &'a FlowConfig {
        self.flow
    }

    pub(crate) fn screen_available(&self, screen: ScreenId, collection_id: Option<&str>) -> bool {
        self.flow
            .screen(screen)
            .is_available(self.graph, self.ctx, collection_id)
    }

    /// The first screen with a required fact or an active set-fact action
    /// whose target is not complete.
    pub(crate) fn find_first_incomplete_screen(
        &self,
        screens: &[ScreenId],
        collection_id: Option<&str>,
    ) -> Option<ScreenId> {
        screens.iter().copied().find(|id| {
            let screen = self.flow.screen(*id);
            let missing_fact = screen
                .content
                .iter()
                .filter_map(|c| c.required_fact(self.graph, self.ctx, collection_id))
                .any(|path| self.fact_complete(path, collection_id) == Some(false));
            missing_fact
                || screen
                    .set_actions
                    .iter()
                    .filter(|a| a.is_active(self.graph, self.ctx, collection_id))
                    .any(|a| self.fact_complete(&a.path, collection_id) == Some(false))
        })
    }

    /// Walks the subcategory's children in order. Loops with an incomplete
    /// item yield the first incomplete screen of that item; loops not yet
    /// marked done yield their hub; subsubcategories yield their first
    /// incomplete available screen.
    pub fn find_first_incomplete_screen_of_subcategory(
        &self,
        subcategory: SubcategoryId,
        collection_id: Option<&str>,
    ) -> Option<ScreenLocation> {
        let sub = self.flow.subcategory(subcategory);
        for child in &sub.children {
            match *child {
                SubcategoryChild::Loop(loop_id) => {
                    let lp = self.flow.collection_loop(loop_id);
                    if self.has_at_least_one_incomplete_collection_item(loop_id) {
                        for item in self.collection_items(&lp.collection) {
                            if let Some(screen) = self.find_first_incomplete_screen_of_loop(loop_id, &item) {
                                debug!(loop_name = %lp.loop_name, item = %item, "Incomplete collection item found");
                                return Some(ScreenLocation::new(screen, Some(item.as_str())));
                            }
                        }
                    }
                    if !self.is_loop_done(lp) {
                        if let Some(hub) = self.loop_hub(loop_id) {
                            if self.screen_available(hub, collection_id) {
                                debug!(loop_name = %lp.loop_name, "Loop not done, routing to its hub");
                                return Some(ScreenLocation::new(hub, collection_id));
                            }
                        }
                    }
                }
                SubcategoryChild::SubSubcategory(ssc) => {
                    let available: Vec<ScreenId> = self
                        .flow
                        .sub_subcategory(ssc)
                        .screens
                        .iter()
                        .copied()
                        .filter(|id| self.screen_available(*id, collection_id))
                        .collect();
                    if let Some(screen) = self.find_first_incomplete_screen(&available, collection_id) {
                        return Some(ScreenLocation::new(screen, collection_id));
                    }
                }
            }
        }
        None
    }

    /// True once the filer has answered something in the subcategory:
    /// a required fact on an available screen outside any loop, or an item
    /// in a loop that does not iterate on its own.
    pub fn subcategory_has_some_completed_facts(
        &self,
        subcategory: SubcategoryId,
        collection_id: Option<&str>,
    ) -> bool {
        let sub = self.flow.subcategory(subcategory);
        let answered = sub.screens.iter().any(|id| {
            let screen = self.flow.screen(*id);
            screen.collection_loop.is_none()
                && screen.is_available(self.graph, self.ctx, collection_id)
                && screen
                    .content
                    .iter()
                    .filter_map(|c| c.required_fact(self.graph, self.ctx, collection_id))
                    .any(|path| self.fact_complete(path, collection_id) == Some(true))
        });
        answered
            || sub.loops.iter().any(|id| {
                !self.flow.collection_loop(*id).auto_iterate && self.collection_loop_has_at_least_one_member(*id)
            })
    }

    /// Every completion condition passes and no loop has an incomplete item.
    pub fn is_subcategory_complete(&self, subcategory: SubcategoryId, collection_id: Option<&str>) -> bool {
        let sub = self.flow.subcategory(subcategory);
        conditions_pass(&sub.complete_if, self.graph, self.ctx, collection_id)
            && !sub
                .loops
                .iter()
                .any(|id| self.has_at_least_one_incomplete_collection_item(*id))
    }

    /// The next screen to route to automatically, tracking which collection
    /// item each candidate is shown for.
    fn next_screen_with_id(
        &self,
        current: &ScreenConfig,
        collection_id: Option<&str>,
        candidates: &[ScreenId],
    ) -> Option<ScreenLocation> {
        let mut prev_loop = current.loop_id();
        let mut prev_id = collection_id.map(str::to_string);
        for id in candidates.iter().copied() {
            let screen = self.flow.screen(id);
            let mut maybe_id = if prev_loop == screen.loop_id() {
                prev_id.clone()
            } else {
                None
            };
            if let Some(membership) = screen.collection_loop {
                if membership.auto_iterate && (prev_id.is_none() || prev_loop != Some(membership.id)) {
                    maybe_id = screen
                        .collection_context
                        .as_ref()
                        .and_then(|collection| self.first_collection_item(collection));
                }
            }
            prev_loop = screen.loop_id();
            prev_id = maybe_id.clone();
            if screen.route_automatically && screen.is_available(self.graph, self.ctx, maybe_id.as_deref()) {
                return Some(ScreenLocation {
                    screen: id,
                    collection_id: maybe_id,
                });
            }
        }
        None
    }

    pub fn get_next_screen(
        &self,
        current: ScreenId,
        collection_id: Option<&str>,
        options: NextScreenOptions,
    ) -> FlowResult<NextScreen> {
        let screen = self.flow.screen(current);

        if let (Some(membership), Some(id)) = (screen.collection_loop, collection_id) {
            let at_end_of_loop = self.last_available_screen_of_loop(membership.id, id) == Some(current);
            if at_end_of_loop && membership.auto_iterate {
                let items = screen
                    .collection_context
                    .as_ref()
                    .map(|collection| self.collection_items(collection))
                    .unwrap_or_default();
                let next_item = items
                    .iter()
                    .position(|item| item == id)
                    .and_then(|idx| items.get(idx + 1));
                if let Some(next_item) = next_item {
                    if let Some(first) = self.first_available_screen_of_loop(membership.id, next_item) {
                        debug!(item = %next_item, "Iterating to the next collection item");
                        return Ok(NextScreen::Screen(ScreenLocation::new(first, Some(next_item.as_str()))));
                    }
                }
            }
            if at_end_of_loop && !membership.auto_iterate {
                let loop_name = &self.flow.collection_loop(membership.id).loop_name;
                return Ok(NextScreen::route(routes::loop_data_view_route(loop_name, id), Some(id)));
            }
        }

        let following: Vec<ScreenId> = self.flow.screens()[current.index() + 1..]
            .iter()
            .map(|s| s.id)
            .collect();
        let next = self
            .next_screen_with_id(screen, collection_id, &following)
            .ok_or_else(|| FlowError::Navigation(format!("no available route after {}", screen.screen_route)))?;
        let next_screen = self.flow.screen(next.screen);
        let same_subcategory = screen.subcategory == next_screen.subcategory;
        let same_sub_subcategory = screen.sub_subcategory == next_screen.sub_subcategory;

        if next_screen.is_knockout {
            return Ok(NextScreen::Screen(next));
        }

        if options.navigate_to_data_view_at_end_of_sub_subcategory && !same_sub_subcategory {
            if screen.act_as_data_view {
                return Ok(NextScreen::route(routes::CHECKLIST_ROUTE, collection_id));
            }
            // A split subsubcategory may continue after other children.
            let ssc = screen.sub_subcategory.ok_or_else(|| {
                FlowError::Navigation(format!("screen {} is not in a subsubcategory", screen.screen_route))
            })?;
            let remaining: Vec<ScreenId> = self
                .flow
                .sub_subcategory(ssc)
                .screens
                .iter()
                .copied()
                .skip_while(|id| *id != current)
                .skip(1)
                .collect();
            if let Some(next_in_ssc) = self.next_screen_with_id(screen, collection_id, &remaining) {
                return Ok(NextScreen::Screen(next_in_ssc));
            }
            return Ok(NextScreen::route(self.data_view_route(screen, collection_id, true), collection_id));
        }

        if same_subcategory {
            return Ok(NextScreen::Screen(next));
        }

        let sub = self.flow.subcategory(screen.subcategory);
        let has_screen_acting_as_data_view = sub.screens.iter().any(|id| self.flow.screen(*id).act_as_data_view);
        let has_collection_with_loops = sub.collection_name.is_some() && !sub.loops.is_empty();
        let route = if has_screen_acting_as_data_view || !sub.has_data_view || has_collection_with_loops {
            routes::CHECKLIST_ROUTE.to_string()
        } else {
            self.data_view_route(screen, collection_id, false)
        };
        Ok(NextScreen::route(route, collection_id))
    }

    fn data_view_route(&self, screen: &ScreenConfig, collection_id: Option<&str>, review_mode: bool) -> String {
        if let (Some(membership), Some(id)) = (screen.collection_loop, collection_id) {
            if !membership.auto_iterate {
                let loop_name = &self.flow.collection_loop(membership.id).loop_name;
                return routes::loop_data_view_route(loop_name, id);
            }
        }
        let route = routes::data_view_route(&screen.subcategory_route);
        if !review_mode {
            return route;
        }
        let suffix = self
            .flow
            .subcategory(screen.subcategory)
            .sub_subcategories
            .iter()
            .map(|id| self.flow.sub_subcategory(*id))
            .find(|ssc| Some(ssc.id) == screen.sub_subcategory)
            .map(|ssc| ssc.route_suffix.as_str());
        match suffix {
            Some(suffix) => format!("{route}#{suffix}"),
            None => route,
        }
    }
}
