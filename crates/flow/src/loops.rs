//! Collection loops: one sub-flow applied to every item of a collection.

use tracing::debug;

use taxflow_core::{ConcretePath, FactPath};

use crate::declarations::ComponentKind;
use crate::model::{CollectionLoopConfig, LoopId, ScreenConfig, ScreenId};
use crate::navigation::FlowResolver;

impl<'a> FlowResolver<'a> {
    /// Item ids of a complete collection, empty otherwise.
    pub fn collection_items(&self, collection: &ConcretePath) -> Vec<String> {
        self.graph.collection_items(collection)
    }

    pub(crate) fn first_collection_item(&self, collection: &ConcretePath) -> Option<String> {
        self.collection_items(collection).into_iter().next()
    }

    /// False when the loop has no item completion condition. Otherwise true
    /// if any current item fails it.
    pub fn has_at_least_one_incomplete_collection_item(&self, loop_id: LoopId) -> bool {
        let lp = self.flow.collection_loop(loop_id);
        let Some(completed) = &lp.item_completed_condition else {
            return false;
        };
        self.collection_items(&lp.collection)
            .iter()
            .any(|id| !completed.evaluate(self.graph, self.ctx, Some(id)))
    }

    pub fn collection_loop_has_at_least_one_member(&self, loop_id: LoopId) -> bool {
        !self
            .collection_items(&self.flow.collection_loop(loop_id).collection)
            .is_empty()
    }

    pub fn first_available_screen_of_loop(&self, loop_id: LoopId, collection_id: &str) -> Option<ScreenId> {
        self.flow
            .collection_loop(loop_id)
            .screens
            .iter()
            .copied()
            .find(|id| self.screen_available(*id, Some(collection_id)))
    }

    pub fn last_available_screen_of_loop(&self, loop_id: LoopId, collection_id: &str) -> Option<ScreenId> {
        self.flow
            .collection_loop(loop_id)
            .screens
            .iter()
            .rev()
            .copied()
            .find(|id| self.screen_available(*id, Some(collection_id)))
    }

    /// Searches one item's screens, unless the loop knows the item is
    /// already complete.
    pub fn find_first_incomplete_screen_of_loop(&self, loop_id: LoopId, collection_id: &str) -> Option<ScreenId> {
        let lp = self.flow.collection_loop(loop_id);
        if let Some(completed) = &lp.item_completed_condition {
            if completed.evaluate(self.graph, self.ctx, Some(collection_id)) {
                return None;
            }
        }
        let available: Vec<ScreenId> = lp
            .screens
            .iter()
            .copied()
            .filter(|id| self.screen_available(*id, Some(collection_id)))
            .collect();
        self.find_first_incomplete_screen(&available, Some(collection_id))
    }

    /// True when the loop's done fact is complete and true. Loops without a
    /// done fact are never waiting on their hub.
    pub fn is_loop_done(&self, lp: &CollectionLoopConfig) -> bool {
        let Some(done_path) = &lp.done_path else {
            return true;
        };
        match done_path.concretize(None) {
            Ok(path) => self.graph.get(&path).complete_bool() == Some(true),
            Err(_) => false,
        }
    }

    /// The screen that lists and manages a loop's items. Prefers a screen
    /// outside the loop with a collection item manager for it, then the
    /// manager screen of the subsubcategory an inner loop lives in.
    pub fn loop_hub(&self, loop_id: LoopId) -> Option<ScreenId> {
        let lp = self.flow.collection_loop(loop_id);
        let sub = self.flow.subcategory(lp.subcategory);
        let manages = |screen: &ScreenConfig, loop_name: Option<&str>| {
            screen.content.iter().any(|c| {
                c.component == ComponentKind::CollectionItemManager
                    && loop_name.map_or(true, |name| c.loop_name.as_deref() == Some(name))
            })
        };

        let named = sub.screens.iter().copied().find(|id| {
            let screen = self.flow.screen(*id);
            screen.loop_id() != Some(loop_id) && manages(screen, Some(&lp.loop_name))
        });
        if named.is_some() {
            return named;
        }
        sub.sub_subcategories
            .iter()
            .map(|id| self.flow.sub_subcategory(*id))
            .find(|ssc| ssc.full_route == lp.full_route)
            .and_then(|ssc| {
                ssc.screens
                    .iter()
                    .copied()
                    .find(|id| manages(self.flow.screen(*id), None))
            })
    }

    /// Completeness of one fact. `None` when an abstract path has no item
    /// to read it for.
    pub(crate) fn fact_complete(&self, path: &FactPath, collection_id: Option<&str>) -> Option<bool> {
        match path.concretize(collection_id) {
            Ok(concrete) => Some(self.graph.get(&concrete).complete),
            Err(e) => {
                debug!(path = %path, error = %e, "Skipping completeness of a path without an item");
                None
            }
        }
    }
}
