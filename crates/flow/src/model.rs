//! The compiled flow: an immutable arena of categories, subcategories,
//! subsubcategories, collection loops and screens, indexed by route and by
//! loop name. Built once by [`FlowConfig::compile`].

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use taxflow_core::{ConcretePath, FactGraph, FactPath, FlowError, FlowResult};

use crate::condition::{conditions_pass, Condition};
use crate::content::{ContentItem, SetFactAction};
use crate::context::ExternalContext;
use crate::declarations::{
    AlertAggregatorType, AssertionDecl, AssertionType, CategoryDecl, CollectionLoopDecl,
    ComponentKind, FlowDecl, FlowNode, GateDecl, ScreenDecl, SubSubcategoryDecl, SubcategoryDecl,
};
use crate::routes;

macro_rules! arena_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
            pub struct $name(usize);

            impl $name {
                pub fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

arena_id!(CategoryId, SubcategoryId, SubSubcategoryId, LoopId, ScreenId);

#[derive(Debug, Clone)]
pub struct CategoryConfig {
    pub id: CategoryId,
    /// `/flow/<category>`
    pub route: String,
    pub subcategories: Vec<SubcategoryId>,
}

/// An ordered child of a subcategory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubcategoryChild {
    SubSubcategory(SubSubcategoryId),
    Loop(LoopId),
}

#[derive(Debug, Clone)]
pub struct AssertionConfig {
    pub assertion_type: AssertionType,
    pub i18n_key: String,
    pub sub_subcategory_route: Option<String>,
    pub conditions: Vec<Condition>,
    pub edit_route: Option<String>,
}

impl AssertionConfig {
    pub fn is_active(&self, graph: &dyn FactGraph, ctx: &ExternalContext, collection_id: Option<&str>) -> bool {
        conditions_pass(&self.conditions, graph, ctx, collection_id)
    }
}

#[derive(Debug, Clone)]
pub struct SubcategoryConfig {
    pub id: SubcategoryId,
    pub category: CategoryId,
    pub category_route: String,
    /// `/flow/<category>/<subcategory>`
    pub route: String,
    pub complete_if: Vec<Condition>,
    /// The subcategory is hidden if any of these fail.
    pub display_only_if: Vec<Condition>,
    /// Set when the whole subcategory is about one collection.
    pub collection_name: Option<ConcretePath>,
    pub has_data_view: bool,
    pub is_sign_and_submit: bool,
    pub lock_future_sections_if_collection_items_incomplete: bool,
    pub screens: Vec<ScreenId>,
    /// Subsubcategories outside any loop.
    pub sub_subcategories: Vec<SubSubcategoryId>,
    pub loops: Vec<LoopId>,
    pub children: Vec<SubcategoryChild>,
    pub assertions: Vec<AssertionConfig>,
}

#[derive(Debug, Clone)]
pub struct SubSubcategoryConfig {
    pub id: SubSubcategoryId,
    pub subcategory: SubcategoryId,
    /// `<subcategory route>/<route suffix>`
    pub full_route: String,
    pub route_suffix: String,
    pub loop_id: Option<LoopId>,
    pub editable: bool,
    pub hidden: bool,
    pub screens: Vec<ScreenId>,
}

#[derive(Debug, Clone)]
pub struct CollectionLoopConfig {
    pub id: LoopId,
    pub loop_name: String,
    pub subcategory: SubcategoryId,
    /// The subsubcategory route for inner loops, the subcategory route
    /// otherwise.
    pub full_route: String,
    pub collection: ConcretePath,
    pub auto_iterate: bool,
    pub is_inner: bool,
    pub done_path: Option<FactPath>,
    pub item_completed_condition: Option<Condition>,
    pub knockout_route: Option<String>,
    pub screens: Vec<ScreenId>,
    pub sub_subcategories: Vec<SubSubcategoryId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopMembership {
    pub id: LoopId,
    pub auto_iterate: bool,
}

#[derive(Debug, Clone)]
pub struct ScreenConfig {
    pub id: ScreenId,
    pub route: String,
    /// `<subcategory route>/<route>`
    pub screen_route: String,
    pub category_route: String,
    pub subcategory: SubcategoryId,
    pub subcategory_route: String,
    pub sub_subcategory: Option<SubSubcategoryId>,
    pub sub_subcategory_route: Option<String>,
    /// Gate conditions followed by the screen's own condition.
    pub conditions: Vec<Condition>,
    pub local_condition: Option<Condition>,
    pub collection_context: Option<ConcretePath>,
    pub collection_loop: Option<LoopMembership>,
    pub route_automatically: bool,
    pub act_as_data_view: bool,
    pub is_knockout: bool,
    pub hide_breadcrumbs: bool,
    pub has_screen_route_override: bool,
    pub alert_aggregator_type: AlertAggregatorType,
    pub content: Vec<ContentItem>,
    pub set_actions: Vec<SetFactAction>,
    pub fact_paths: Vec<FactPath>,
}

impl ScreenConfig {
    /// Screens of an auto-iterating loop need at least one item in the
    /// collection; every screen needs all of its conditions to pass.
    pub fn is_available(
        &self,
        graph: &dyn FactGraph,
        ctx: &ExternalContext,
        collection_id: Option<&str>,
    ) -> bool {
        if self.collection_loop.is_some_and(|l| l.auto_iterate) {
            let has_members = self.collection_context.as_ref().is_some_and(|collection| {
                graph
                    .get(collection)
                    .get()
                    .and_then(|v| v.as_collection())
                    .is_some_and(|c| !c.items.is_empty())
            });
            if !has_members {
                return false;
            }
        }
        conditions_pass(&self.conditions, graph, ctx, collection_id)
    }

    pub fn loop_id(&self) -> Option<LoopId> {
        self.collection_loop.map(|l| l.id)
    }

    /// The route to open this screen with its collection context and,
    /// optionally, review mode.
    pub fn full_route(&self, collection_id: Option<&str>, review_mode: bool) -> String {
        if self.has_screen_route_override {
            if let Some(ssc_route) = &self.sub_subcategory_route {
                return routes::data_view_route(ssc_route);
            }
        }
        let params = routes::url_search_params(self.collection_context.as_ref(), collection_id, review_mode);
        routes::with_query(&self.screen_route, &params)
    }

    /// Category, subcategory and subsubcategory routes, outermost first.
    pub fn ancestor_routes(&self) -> Vec<&str> {
        let mut ancestors = vec![self.category_route.as_str(), self.subcategory_route.as_str()];
        if let Some(ssc) = &self.sub_subcategory_route {
            ancestors.push(ssc);
        }
        ancestors
    }
}

#[derive(Debug, Clone, Default)]
pub struct FlowConfig {
    categories: Vec<CategoryConfig>,
    subcategories: Vec<SubcategoryConfig>,
    sub_subcategories: Vec<SubSubcategoryConfig>,
    loops: Vec<CollectionLoopConfig>,
    screens: Vec<ScreenConfig>,
    screens_by_route: HashMap<String, ScreenId>,
    subcategories_by_route: HashMap<String, SubcategoryId>,
    sub_subcategories_by_route: HashMap<String, SubSubcategoryId>,
    loops_by_name: HashMap<String, LoopId>,
}

impl FlowConfig {
    /// Compiles a flow description, rejecting malformed screens and
    /// structure.
    pub fn compile(flow: &FlowDecl) -> FlowResult<Self> {
        info!(top_level_nodes = flow.children.len(), "Compiling flow");
        let mut builder = FlowConfigBuilder::default();
        builder.parse_all(&flow.children, &ParseContext::default())?;
        let config = builder.config;
        info!(
            categories = config.categories.len(),
            subcategories = config.subcategories.len(),
            loops = config.loops.len(),
            screens = config.screens.len(),
            "Flow compiled"
        );
        Ok(config)
    }

    pub fn categories(&self) -> &[CategoryConfig] {
        &self.categories
    }

    pub fn subcategories(&self) -> &[SubcategoryConfig] {
        &self.subcategories
    }

    pub fn loops(&self) -> &[CollectionLoopConfig] {
        &self.loops
    }

    /// Every screen in declaration order.
    pub fn screens(&self) -> &[ScreenConfig] {
        &self.screens
    }

    pub fn category(&self, id: CategoryId) -> &CategoryConfig {
        &self.categories[id.0]
    }

    pub fn subcategory(&self, id: SubcategoryId) -> &SubcategoryConfig {
        &self.subcategories[id.0]
    }

    pub fn sub_subcategory(&self, id: SubSubcategoryId) -> &SubSubcategoryConfig {
        &self.sub_subcategories[id.0]
    }

    pub fn collection_loop(&self, id: LoopId) -> &CollectionLoopConfig {
        &self.loops[id.0]
    }

    pub fn screen(&self, id: ScreenId) -> &ScreenConfig {
        &self.screens[id.0]
    }

    pub fn screen_by_route(&self, route: &str) -> Option<&ScreenConfig> {
        self.screens_by_route.get(route).map(|id| self.screen(*id))
    }

    pub fn subcategory_by_route(&self, route: &str) -> Option<&SubcategoryConfig> {
        self.subcategories_by_route.get(route).map(|id| self.subcategory(*id))
    }

    pub fn sub_subcategory_by_route(&self, route: &str) -> Option<&SubSubcategoryConfig> {
        self.sub_subcategories_by_route
            .get(route)
            .map(|id| self.sub_subcategory(*id))
    }

    pub fn loop_by_name(&self, loop_name: &str) -> Option<&CollectionLoopConfig> {
        self.loops_by_name.get(loop_name).map(|id| self.collection_loop(*id))
    }

    /// Section routes of a subcategory as they are listed for display.
    /// Inner loops share their subsubcategory's route and appear once.
    pub fn display_sections(&self, subcategory: SubcategoryId) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.subcategory(subcategory)
            .children
            .iter()
            .map(|child| match child {
                SubcategoryChild::SubSubcategory(id) => self.sub_subcategory(*id).full_route.as_str(),
                SubcategoryChild::Loop(id) => self.collection_loop(*id).full_route.as_str(),
            })
            .filter(|route| seen.insert(*route))
            .collect()
    }

    /// Screen routes from the first screen whose route is `route` onward.
    pub fn routes_from(&self, route: &str) -> Vec<&str> {
        match self.screens_by_route.get(route) {
            Some(id) => self.screens[id.0..].iter().map(|s| s.screen_route.as_str()).collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ParseContext {
    category: Option<CategoryId>,
    subcategory: Option<SubcategoryId>,
    sub_subcategory: Option<SubSubcategoryId>,
    collection_context: Option<ConcretePath>,
    collection_loop: Option<LoopMembership>,
    conditions: Vec<Condition>,
}

#[derive(Default)]
struct FlowConfigBuilder {
    config: FlowConfig,
}

fn collection_path(path: &FactPath, owner: &str) -> FlowResult<ConcretePath> {
    path.concretize(None).map_err(|_| {
        FlowError::Specification(format!("{owner} uses the abstract collection {path}"))
    })
}

impl FlowConfigBuilder {
    fn parse_all(&mut self, nodes: &[FlowNode], ctx: &ParseContext) -> FlowResult<()> {
        for node in nodes {
            self.parse(node, ctx)?;
        }
        Ok(())
    }

    fn parse(&mut self, node: &FlowNode, ctx: &ParseContext) -> FlowResult<()> {
        match node {
            FlowNode::Category(decl) => self.add_category(decl, ctx),
            FlowNode::Subcategory(decl) => self.add_subcategory(decl, ctx),
            FlowNode::SubSubcategory(decl) => self.add_sub_subcategory(decl, ctx),
            FlowNode::CollectionLoop(decl) => self.add_collection_loop(decl, ctx),
            FlowNode::Gate(decl) => self.add_gate(decl, ctx),
            FlowNode::Assertion(decl) => self.add_assertion(decl, ctx),
            FlowNode::Screen(decl) => self.add_screen(decl, ctx),
        }
    }

    fn add_category(&mut self, decl: &CategoryDecl, ctx: &ParseContext) -> FlowResult<()> {
        let id = CategoryId(self.config.categories.len());
        let route = format!("/flow/{}", decl.route);
        debug!(route = %route, "Adding category");
        self.config.categories.push(CategoryConfig {
            id,
            route,
            subcategories: Vec::new(),
        });
        let ctx = ParseContext {
            category: Some(id),
            ..ctx.clone()
        };
        self.parse_all(&decl.children, &ctx)
    }

    fn add_subcategory(&mut self, decl: &SubcategoryDecl, ctx: &ParseContext) -> FlowResult<()> {
        let category = ctx.category.ok_or_else(|| {
            FlowError::Specification(format!("subcategory {} is not in a category", decl.route))
        })?;
        let category_route = self.config.category(category).route.clone();
        let route = format!("{category_route}/{}", decl.route);
        if self.config.subcategories_by_route.contains_key(&route) {
            return Err(FlowError::Specification(format!("duplicate subcategory {route}")));
        }
        let collection_name = decl
            .collection_context
            .as_ref()
            .map(|p| collection_path(p, &route))
            .transpose()?;

        let id = SubcategoryId(self.config.subcategories.len());
        self.config.subcategories.push(SubcategoryConfig {
            id,
            category,
            category_route,
            route: route.clone(),
            complete_if: Condition::parse_all(&decl.complete_if.to_vec())?,
            display_only_if: match &decl.display_only_if {
                Some(conditions) => Condition::parse_all(&conditions.to_vec())?,
                None => Vec::new(),
            },
            collection_name: collection_name.clone(),
            has_data_view: !decl.skip_data_view,
            is_sign_and_submit: decl.is_sign_and_submit,
            lock_future_sections_if_collection_items_incomplete: decl
                .lock_future_sections_if_collection_items_incomplete,
            screens: Vec::new(),
            sub_subcategories: Vec::new(),
            loops: Vec::new(),
            children: Vec::new(),
            assertions: Vec::new(),
        });
        self.config.categories[category.0].subcategories.push(id);
        self.config.subcategories_by_route.insert(route, id);

        let ctx = ParseContext {
            subcategory: Some(id),
            collection_context: collection_name.or_else(|| ctx.collection_context.clone()),
            ..ctx.clone()
        };
        self.parse_all(&decl.children, &ctx)
    }

    fn add_sub_subcategory(&mut self, decl: &SubSubcategoryDecl, ctx: &ParseContext) -> FlowResult<()> {
        let subcategory = ctx.subcategory.ok_or_else(|| {
            FlowError::Specification(format!("subsubcategory {} is not in a subcategory", decl.route))
        })?;
        let full_route = format!("{}/{}", self.config.subcategory(subcategory).route, decl.route);

        // A subsubcategory split around other children is declared twice
        // under the same route; both halves share one node.
        let id = match self.config.sub_subcategories_by_route.get(&full_route) {
            Some(existing) => *existing,
            None => {
                let id = SubSubcategoryId(self.config.sub_subcategories.len());
                let loop_id = ctx.collection_loop.map(|l| l.id);
                self.config.sub_subcategories.push(SubSubcategoryConfig {
                    id,
                    subcategory,
                    full_route: full_route.clone(),
                    route_suffix: decl.route.clone(),
                    loop_id,
                    editable: decl.editable != Some(false),
                    hidden: decl.hidden,
                    screens: Vec::new(),
                });
                self.config.sub_subcategories_by_route.insert(full_route, id);
                match loop_id {
                    Some(loop_id) => self.config.loops[loop_id.0].sub_subcategories.push(id),
                    None => {
                        let sub = &mut self.config.subcategories[subcategory.0];
                        sub.sub_subcategories.push(id);
                        sub.children.push(SubcategoryChild::SubSubcategory(id));
                    }
                }
                id
            }
        };

        let collection_context = match &decl.collection_context {
            Some(path) => Some(collection_path(path, &decl.route)?),
            None => ctx.collection_context.clone(),
        };
        let ctx = ParseContext {
            sub_subcategory: Some(id),
            collection_context,
            ..ctx.clone()
        };
        self.parse_all(&decl.children, &ctx)
    }

    fn add_collection_loop(&mut self, decl: &CollectionLoopDecl, ctx: &ParseContext) -> FlowResult<()> {
        let subcategory = ctx.subcategory.ok_or_else(|| {
            FlowError::Specification(format!("loop {} is not in a subcategory", decl.loop_name))
        })?;
        if self.config.loops_by_name.contains_key(&decl.loop_name) {
            return Err(FlowError::Specification(format!(
                "multiple loops named {}",
                decl.loop_name
            )));
        }
        let collection = match &decl.collection {
            Some(path) => collection_path(path, &decl.loop_name)?,
            None => ctx.collection_context.clone().ok_or_else(|| {
                FlowError::Specification(format!("loop {} has no collection context", decl.loop_name))
            })?,
        };
        let full_route = if decl.is_inner {
            let ssc = ctx.sub_subcategory.ok_or_else(|| {
                FlowError::Specification(format!(
                    "inner loop {} must be inside a subsubcategory",
                    decl.loop_name
                ))
            })?;
            self.config.sub_subcategory(ssc).full_route.clone()
        } else {
            self.config.subcategory(subcategory).route.clone()
        };

        let id = LoopId(self.config.loops.len());
        debug!(loop_name = %decl.loop_name, collection = %collection, "Adding collection loop");
        self.config.loops.push(CollectionLoopConfig {
            id,
            loop_name: decl.loop_name.clone(),
            subcategory,
            full_route,
            collection: collection.clone(),
            auto_iterate: decl.auto_iterate,
            is_inner: decl.is_inner,
            done_path: decl.done_path.clone(),
            item_completed_condition: decl
                .collection_item_completed_condition
                .as_ref()
                .map(Condition::parse)
                .transpose()?,
            knockout_route: decl.knockout_route.clone(),
            screens: Vec::new(),
            sub_subcategories: Vec::new(),
        });
        self.config.loops_by_name.insert(decl.loop_name.clone(), id);
        let sub = &mut self.config.subcategories[subcategory.0];
        sub.loops.push(id);
        sub.children.push(SubcategoryChild::Loop(id));

        let ctx = ParseContext {
            collection_context: Some(collection),
            collection_loop: Some(LoopMembership {
                id,
                auto_iterate: decl.auto_iterate,
            }),
            ..ctx.clone()
        };
        self.parse_all(&decl.children, &ctx)
    }

    fn add_gate(&mut self, decl: &GateDecl, ctx: &ParseContext) -> FlowResult<()> {
        let mut conditions = ctx.conditions.clone();
        conditions.push(Condition::parse(&decl.condition)?);
        let ctx = ParseContext {
            conditions,
            ..ctx.clone()
        };
        self.parse_all(&decl.children, &ctx)
    }

    fn add_assertion(&mut self, decl: &AssertionDecl, ctx: &ParseContext) -> FlowResult<()> {
        let subcategory = ctx.subcategory.ok_or_else(|| {
            FlowError::Specification(format!("assertion {} is not in a subcategory", decl.i18n_key))
        })?;
        let mut conditions = Condition::parse_all(decl.condition.iter())?;
        conditions.extend(Condition::parse_all(&decl.conditions)?);
        let sub_subcategory_route = ctx
            .sub_subcategory
            .map(|id| self.config.sub_subcategory(id).full_route.clone());
        self.config.subcategories[subcategory.0]
            .assertions
            .push(AssertionConfig {
                assertion_type: decl.assertion_type,
                i18n_key: decl.i18n_key.clone(),
                sub_subcategory_route,
                conditions,
                edit_route: decl.edit_route.clone(),
            });
        Ok(())
    }

    fn add_screen(&mut self, decl: &ScreenDecl, ctx: &ParseContext) -> FlowResult<()> {
        let subcategory = ctx.subcategory.ok_or_else(|| {
            FlowError::Specification(format!("screen {} is not in a subcategory", decl.route))
        })?;
        let sub = self.config.subcategory(subcategory);
        let screen_route = format!("{}/{}", sub.route, decl.route);

        let content = decl
            .content
            .iter()
            .map(ContentItem::compile)
            .collect::<FlowResult<Vec<_>>>()
            .map_err(|e| FlowError::Specification(format!("screen {screen_route}: {e}")))?;
        check_required_buttons(&screen_route, &content)?;
        check_headings(&screen_route, &content)?;

        if self.config.screens_by_route.contains_key(&screen_route) {
            return Err(FlowError::Specification(format!(
                "multiple screens for route {screen_route}"
            )));
        }
        if ctx.sub_subcategory.is_none() && content.iter().any(ContentItem::is_fact) {
            return Err(FlowError::Specification(format!(
                "{screen_route} needs a subsubcategory"
            )));
        }

        let local_condition = decl.condition.as_ref().map(Condition::parse).transpose()?;
        let mut conditions = ctx.conditions.clone();
        conditions.extend(local_condition.iter().cloned());
        let set_actions = decl
            .actions
            .iter()
            .map(SetFactAction::compile)
            .collect::<FlowResult<Vec<_>>>()?;
        let fact_paths = content.iter().filter(|c| c.is_fact()).filter_map(|c| c.path.clone()).collect();

        let id = ScreenId(self.config.screens.len());
        let screen = ScreenConfig {
            id,
            route: decl.route.clone(),
            screen_route: screen_route.clone(),
            category_route: sub.category_route.clone(),
            subcategory,
            subcategory_route: sub.route.clone(),
            sub_subcategory: ctx.sub_subcategory,
            sub_subcategory_route: ctx
                .sub_subcategory
                .map(|ssc| self.config.sub_subcategory(ssc).full_route.clone()),
            conditions,
            local_condition,
            collection_context: ctx.collection_context.clone(),
            collection_loop: ctx.collection_loop,
            route_automatically: decl.route_automatically != Some(false),
            act_as_data_view: decl.act_as_data_view,
            is_knockout: decl.is_knockout,
            hide_breadcrumbs: decl.hide_breadcrumbs,
            has_screen_route_override: decl.has_screen_route_override,
            alert_aggregator_type: decl.alert_aggregator_type,
            content,
            set_actions,
            fact_paths,
        };

        self.config.screens.push(screen);
        self.config.screens_by_route.insert(screen_route, id);
        self.config.subcategories[subcategory.0].screens.push(id);
        if let Some(membership) = ctx.collection_loop {
            self.config.loops[membership.id.0].screens.push(id);
        }
        if let Some(ssc) = ctx.sub_subcategory {
            self.config.sub_subcategories[ssc.0].screens.push(id);
        }
        Ok(())
    }
}

fn check_required_buttons(screen_route: &str, content: &[ContentItem]) -> FlowResult<()> {
    if content.iter().any(|c| c.component.is_terminal_action()) {
        Ok(())
    } else {
        Err(FlowError::Specification(format!(
            "screen at route {screen_route} has no button or link to leave it"
        )))
    }
}

/// One unconditioned heading, or several headings that are all conditioned.
fn check_headings(screen_route: &str, content: &[ContentItem]) -> FlowResult<()> {
    let headings: Vec<&ContentItem> = content
        .iter()
        .filter(|c| c.component == ComponentKind::Heading)
        .collect();
    match headings.as_slice() {
        [] => Err(FlowError::Specification(format!(
            "screen at route {screen_route} requires a Heading"
        ))),
        [only] if !only.conditions.is_empty() => Err(FlowError::Specification(format!(
            "screen at route {screen_route} has only one Heading and it is conditioned"
        ))),
        [_] => Ok(()),
        many if many.iter().any(|h| h.conditions.is_empty()) => Err(FlowError::Specification(format!(
            "screen at route {screen_route} has several Headings but not all are conditioned"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionOperator, RawCondition};
    use crate::declarations::ContentDecl;
    use pretty_assertions::assert_eq;
    use taxflow_core::fact_path;

    fn screen(route: &str) -> ScreenDecl {
        ScreenDecl::new(route).heading("heading").continue_button()
    }

    fn flow_with(children: Vec<FlowNode>) -> FlowDecl {
        let mut sub = SubcategoryDecl::new("sub");
        sub.children = children;
        FlowDecl::new().child(CategoryDecl::new("cat").child(sub))
    }

    fn compile_error(flow: FlowDecl) -> String {
        match FlowConfig::compile(&flow) {
            Err(FlowError::Specification(message)) => message,
            other => panic!("expected a specification error, got {other:?}"),
        }
    }

    #[test]
    fn routes_and_indexes() {
        let flow = flow_with(vec![
            SubSubcategoryDecl::new("intro").screen(screen("start")).into(),
            CollectionLoopDecl::new("/formW2s")
                .collection(fact_path!("/formW2s"))
                .child(SubSubcategoryDecl::new("w2").screen(
                    screen("w2-wages").fact(ComponentKind::Dollar, fact_path!("/formW2s/*/wages")),
                ))
                .into(),
        ]);
        let config = FlowConfig::compile(&flow).unwrap();

        assert_eq!(config.categories()[0].route, "/flow/cat");
        let sub = config.subcategory_by_route("/flow/cat/sub").unwrap();
        assert_eq!(sub.screens.len(), 2);
        assert_eq!(sub.sub_subcategories.len(), 1);
        assert_eq!(sub.children.len(), 2);

        let wages = config.screen_by_route("/flow/cat/sub/w2-wages").unwrap();
        assert_eq!(wages.ancestor_routes(), vec!["/flow/cat", "/flow/cat/sub", "/flow/cat/sub/w2"]);
        assert_eq!(wages.collection_context.as_ref().map(|c| c.as_str()), Some("/formW2s"));
        assert_eq!(wages.fact_paths, vec![fact_path!("/formW2s/*/wages")]);
        assert!(wages.route_automatically);

        let w2_loop = config.loop_by_name("/formW2s").unwrap();
        assert_eq!(w2_loop.full_route, "/flow/cat/sub");
        assert_eq!(w2_loop.screens, vec![wages.id]);
        assert_eq!(w2_loop.sub_subcategories.len(), 1);
        assert_eq!(config.routes_from("/flow/cat/sub/w2-wages"), vec!["/flow/cat/sub/w2-wages"]);
    }

    #[test]
    fn gates_accumulate_conditions() {
        let flow = flow_with(vec![SubSubcategoryDecl::new("a")
            .child(GateDecl::new("/outer").child(GateDecl::new("/inner").child(screen("gated").when("/local"))))
            .into()]);
        let config = FlowConfig::compile(&flow).unwrap();
        let gated = config.screen_by_route("/flow/cat/sub/gated").unwrap();
        let rendered: Vec<String> = gated.conditions.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["/outer", "/inner", "/local"]);
        assert_eq!(gated.local_condition.as_ref().map(ToString::to_string).as_deref(), Some("/local"));
    }

    #[test]
    fn split_sub_subcategories_merge() {
        let flow = flow_with(vec![
            SubSubcategoryDecl::new("a").screen(screen("one")).into(),
            SubSubcategoryDecl::new("b").screen(screen("two")).into(),
            SubSubcategoryDecl::new("a").screen(screen("three")).into(),
        ]);
        let config = FlowConfig::compile(&flow).unwrap();
        let a = config.sub_subcategory_by_route("/flow/cat/sub/a").unwrap();
        assert_eq!(a.screens.len(), 2);
        let sub = config.subcategory_by_route("/flow/cat/sub").unwrap();
        assert_eq!(sub.sub_subcategories.len(), 2);
    }

    #[test]
    fn inner_loops_appear_once_in_display_sections() {
        let flow = flow_with(vec![SubSubcategoryDecl::new("providers")
            .screen(screen("providers-hub"))
            .child(
                CollectionLoopDecl::new("/cdccCareProviders")
                    .collection(fact_path!("/cdccCareProviders"))
                    .inner()
                    .child(screen("provider-name")),
            )
            .into()]);
        let config = FlowConfig::compile(&flow).unwrap();
        let inner = config.loop_by_name("/cdccCareProviders").unwrap();
        assert_eq!(inner.full_route, "/flow/cat/sub/providers");
        let sub = config.subcategory_by_route("/flow/cat/sub").unwrap();
        assert_eq!(sub.children.len(), 2);
        assert_eq!(config.display_sections(sub.id), vec!["/flow/cat/sub/providers"]);
    }

    #[test]
    fn screens_need_a_way_out() {
        let flow = flow_with(vec![ScreenDecl::new("stuck").heading("heading").into()]);
        assert!(compile_error(flow).contains("no button"));
    }

    #[test]
    fn heading_rules() {
        let none = flow_with(vec![ScreenDecl::new("none").continue_button().into()]);
        assert!(compile_error(none).contains("requires a Heading"));

        let lone_conditioned = flow_with(vec![ScreenDecl::new("lone")
            .content(ContentDecl::heading("h").when("/x"))
            .continue_button()
            .into()]);
        assert!(compile_error(lone_conditioned).contains("only one Heading"));

        let mixed = flow_with(vec![ScreenDecl::new("mixed")
            .heading("h1")
            .content(ContentDecl::heading("h2").when("/x"))
            .continue_button()
            .into()]);
        assert!(compile_error(mixed).contains("not all are conditioned"));

        let all_conditioned = flow_with(vec![ScreenDecl::new("ok")
            .content(ContentDecl::heading("h1").when("/x"))
            .content(ContentDecl::heading("h2").when(RawCondition::with_operator(ConditionOperator::IsFalse, "/x")))
            .continue_button()
            .into()]);
        assert!(FlowConfig::compile(&all_conditioned).is_ok());
    }

    #[test]
    fn structural_errors() {
        let duplicate = flow_with(vec![screen("same").into(), screen("same").into()]);
        assert!(compile_error(duplicate).contains("multiple screens"));

        let loose_fact = flow_with(vec![screen("loose").fact(ComponentKind::Boolean, fact_path!("/x")).into()]);
        assert!(compile_error(loose_fact).contains("needs a subsubcategory"));

        let no_collection = flow_with(vec![CollectionLoopDecl::new("/things").child(screen("thing")).into()]);
        assert!(compile_error(no_collection).contains("no collection context"));

        let outer_inner = flow_with(vec![CollectionLoopDecl::new("/things")
            .collection(fact_path!("/things"))
            .inner()
            .into()]);
        assert!(compile_error(outer_inner).contains("inside a subsubcategory"));

        let twice = flow_with(vec![
            CollectionLoopDecl::new("/things").collection(fact_path!("/things")).into(),
            CollectionLoopDecl::new("/things").collection(fact_path!("/things")).into(),
        ]);
        assert!(compile_error(twice).contains("multiple loops"));

        let bad_condition = flow_with(vec![screen("bad").when("not-a-path").into()]);
        assert!(compile_error(bad_condition).contains("not a fact path"));
    }

    #[test]
    fn subcategory_context_and_flags() {
        let mut sub = SubcategoryDecl::new("about-you")
            .collection_context(fact_path!("/filers"))
            .skip_data_view()
            .complete_if(vec![RawCondition::from("/a"), RawCondition::from("/b")]);
        sub.children = vec![SubSubcategoryDecl::new("basic").screen(screen("name")).into()];
        let flow = FlowDecl::new().child(CategoryDecl::new("you").child(sub));
        let config = FlowConfig::compile(&flow).unwrap();
        let sub = config.subcategory_by_route("/flow/you/about-you").unwrap();
        assert!(!sub.has_data_view);
        assert_eq!(sub.complete_if.len(), 2);
        assert_eq!(sub.collection_name.as_ref().map(|c| c.as_str()), Some("/filers"));
        let name = config.screen_by_route("/flow/you/about-you/name").unwrap();
        assert_eq!(name.full_route(Some("f1"), false), "/flow/you/about-you/name?%2Ffilers=f1");
    }
}
