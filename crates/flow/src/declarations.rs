//! The declarative flow description: a tagged tree of categories,
//! subcategories, subsubcategories, collection loops, gates, assertions and
//! screens. It deserializes from JSON and can be assembled in code with the
//! chainable constructors below.

use serde::{Deserialize, Serialize};

use taxflow_core::FactPath;

use crate::condition::RawCondition;

/// One condition or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<RawCondition>),
    One(RawCondition),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<RawCondition> {
        match self {
            OneOrMany::Many(all) => all.clone(),
            OneOrMany::One(one) => vec![one.clone()],
        }
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.into())
    }
}

impl From<RawCondition> for OneOrMany {
    fn from(value: RawCondition) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<RawCondition>> for OneOrMany {
    fn from(value: Vec<RawCondition>) -> Self {
        OneOrMany::Many(value)
    }
}

/// Every component a screen may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    // Fact editors
    Address,
    BankAccount,
    Boolean,
    CollectionItemReference,
    DatePicker,
    Dollar,
    Ein,
    Enum,
    MultiEnum,
    FactSelect,
    GenericString,
    IpPin,
    LimitingString,
    PhoneNumber,
    Pin,
    Tin,
    // Display only
    Heading,
    ContextHeading,
    Subheading,
    InfoDisplay,
    Hint,
    HelpLink,
    IntroContent,
    BigContent,
    IconDisplay,
    #[serde(rename = "DFAlert")]
    DfAlert,
    TaxReturnAlert,
    MefAlert,
    SummaryTable,
    ConditionalList,
    DataPreview,
    // Navigation and screen actions
    CollectionItemManager,
    CollectionDataPreview,
    InternalLink,
    CollectionDataViewInternalLink,
    SaveAndOrContinueButton,
    SaveAndOrContinueAndSetFactButton,
    ExitButton,
    SubmitButton,
    KnockoutButton,
    #[serde(rename = "DownloadPDFButton")]
    DownloadPdfButton,
    StateTaxesButton,
}

impl ComponentKind {
    /// Components that edit a fact at `path`.
    pub fn is_fact(self) -> bool {
        matches!(
            self,
            ComponentKind::Address
                | ComponentKind::BankAccount
                | ComponentKind::Boolean
                | ComponentKind::CollectionItemReference
                | ComponentKind::DatePicker
                | ComponentKind::Dollar
                | ComponentKind::Ein
                | ComponentKind::Enum
                | ComponentKind::MultiEnum
                | ComponentKind::FactSelect
                | ComponentKind::GenericString
                | ComponentKind::IpPin
                | ComponentKind::LimitingString
                | ComponentKind::PhoneNumber
                | ComponentKind::Pin
                | ComponentKind::Tin
        )
    }

    /// Components that let the filer leave a screen. Every screen needs one.
    pub fn is_terminal_action(self) -> bool {
        matches!(
            self,
            ComponentKind::SaveAndOrContinueButton
                | ComponentKind::SaveAndOrContinueAndSetFactButton
                | ComponentKind::ExitButton
                | ComponentKind::SubmitButton
                | ComponentKind::CollectionItemManager
                | ComponentKind::CollectionDataPreview
                | ComponentKind::KnockoutButton
                | ComponentKind::InternalLink
                | ComponentKind::CollectionDataViewInternalLink
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayOnlyOn {
    Edit,
    DataView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDecl {
    pub component: ComponentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<FactPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<RawCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RawCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_only_on: Option<DisplayOnlyOn>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_year_to: Option<FactPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_path: Option<FactPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n_key: Option<String>,
}

impl ContentDecl {
    pub fn new(component: ComponentKind) -> Self {
        Self {
            component,
            path: None,
            condition: None,
            conditions: Vec::new(),
            display_only_on: None,
            read_only: false,
            lock_year_to: None,
            loop_name: None,
            done_path: None,
            i18n_key: None,
        }
    }

    pub fn fact(component: ComponentKind, path: FactPath) -> Self {
        Self {
            path: Some(path),
            ..Self::new(component)
        }
    }

    pub fn heading(i18n_key: impl Into<String>) -> Self {
        Self {
            i18n_key: Some(i18n_key.into()),
            ..Self::new(ComponentKind::Heading)
        }
    }

    pub fn collection_item_manager(loop_name: impl Into<String>, done_path: FactPath) -> Self {
        Self {
            loop_name: Some(loop_name.into()),
            done_path: Some(done_path),
            ..Self::new(ComponentKind::CollectionItemManager)
        }
    }

    pub fn when(mut self, condition: impl Into<RawCondition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn display_only_on(mut self, on: DisplayOnlyOn) -> Self {
        self.display_only_on = Some(on);
        self
    }

    pub fn lock_year_to(mut self, path: FactPath) -> Self {
        self.lock_year_to = Some(path);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFactActionDecl {
    pub path: FactPath,
    /// A fact path, or `emptyCollection`.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<RawCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RawCondition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertAggregatorType {
    #[default]
    Screen,
    DataView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenDecl {
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<RawCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_automatically: Option<bool>,
    #[serde(default)]
    pub act_as_data_view: bool,
    #[serde(default)]
    pub is_knockout: bool,
    #[serde(default)]
    pub hide_breadcrumbs: bool,
    #[serde(default)]
    pub has_screen_route_override: bool,
    #[serde(default)]
    pub alert_aggregator_type: AlertAggregatorType,
    #[serde(default)]
    pub content: Vec<ContentDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<SetFactActionDecl>,
}

impl ScreenDecl {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            condition: None,
            route_automatically: None,
            act_as_data_view: false,
            is_knockout: false,
            hide_breadcrumbs: false,
            has_screen_route_override: false,
            alert_aggregator_type: AlertAggregatorType::Screen,
            content: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn when(mut self, condition: impl Into<RawCondition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn heading(self, i18n_key: impl Into<String>) -> Self {
        self.content(ContentDecl::heading(i18n_key))
    }

    pub fn fact(self, component: ComponentKind, path: FactPath) -> Self {
        self.content(ContentDecl::fact(component, path))
    }

    pub fn content(mut self, content: ContentDecl) -> Self {
        self.content.push(content);
        self
    }

    pub fn continue_button(self) -> Self {
        self.content(ContentDecl::new(ComponentKind::SaveAndOrContinueButton))
    }

    pub fn set_fact(mut self, path: FactPath, source: impl Into<String>) -> Self {
        self.actions.push(SetFactActionDecl {
            path,
            source: source.into(),
            condition: None,
            conditions: Vec::new(),
        });
        self
    }

    pub fn knockout(mut self) -> Self {
        self.is_knockout = true;
        self
    }

    pub fn no_automatic_routing(mut self) -> Self {
        self.route_automatically = Some(false);
        self
    }

    pub fn act_as_data_view(mut self) -> Self {
        self.act_as_data_view = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDecl {
    pub route: String,
    #[serde(default)]
    pub children: Vec<FlowNode>,
}

impl CategoryDecl {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, node: impl Into<FlowNode>) -> Self {
        self.children.push(node.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryDecl {
    pub route: String,
    #[serde(default)]
    pub complete_if: OneOrMany,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_only_if: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_context: Option<FactPath>,
    #[serde(default)]
    pub skip_data_view: bool,
    #[serde(default)]
    pub is_sign_and_submit: bool,
    #[serde(default)]
    pub lock_future_sections_if_collection_items_incomplete: bool,
    #[serde(default)]
    pub children: Vec<FlowNode>,
}

impl SubcategoryDecl {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            complete_if: OneOrMany::default(),
            display_only_if: None,
            collection_context: None,
            skip_data_view: false,
            is_sign_and_submit: false,
            lock_future_sections_if_collection_items_incomplete: false,
            children: Vec::new(),
        }
    }

    pub fn complete_if(mut self, conditions: impl Into<OneOrMany>) -> Self {
        self.complete_if = conditions.into();
        self
    }

    pub fn display_only_if(mut self, conditions: impl Into<OneOrMany>) -> Self {
        self.display_only_if = Some(conditions.into());
        self
    }

    pub fn collection_context(mut self, path: FactPath) -> Self {
        self.collection_context = Some(path);
        self
    }

    pub fn skip_data_view(mut self) -> Self {
        self.skip_data_view = true;
        self
    }

    pub fn sign_and_submit(mut self) -> Self {
        self.is_sign_and_submit = true;
        self
    }

    pub fn lock_future_sections_if_collection_items_incomplete(mut self) -> Self {
        self.lock_future_sections_if_collection_items_incomplete = true;
        self
    }

    pub fn child(mut self, node: impl Into<FlowNode>) -> Self {
        self.children.push(node.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSubcategoryDecl {
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_context: Option<FactPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub children: Vec<FlowNode>,
}

impl SubSubcategoryDecl {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            collection_context: None,
            editable: None,
            hidden: false,
            children: Vec::new(),
        }
    }

    pub fn child(mut self, node: impl Into<FlowNode>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn screen(self, screen: ScreenDecl) -> Self {
        self.child(screen)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionLoopDecl {
    pub loop_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<FactPath>,
    #[serde(default)]
    pub auto_iterate: bool,
    #[serde(default)]
    pub is_inner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_path: Option<FactPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_item_completed_condition: Option<RawCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knockout_route: Option<String>,
    #[serde(default)]
    pub children: Vec<FlowNode>,
}

impl CollectionLoopDecl {
    pub fn new(loop_name: impl Into<String>) -> Self {
        Self {
            loop_name: loop_name.into(),
            collection: None,
            auto_iterate: false,
            is_inner: false,
            done_path: None,
            collection_item_completed_condition: None,
            knockout_route: None,
            children: Vec::new(),
        }
    }

    pub fn collection(mut self, path: FactPath) -> Self {
        self.collection = Some(path);
        self
    }

    pub fn auto_iterate(mut self) -> Self {
        self.auto_iterate = true;
        self
    }

    pub fn inner(mut self) -> Self {
        self.is_inner = true;
        self
    }

    pub fn done_path(mut self, path: FactPath) -> Self {
        self.done_path = Some(path);
        self
    }

    pub fn item_completed_if(mut self, condition: impl Into<RawCondition>) -> Self {
        self.collection_item_completed_condition = Some(condition.into());
        self
    }

    pub fn child(mut self, node: impl Into<FlowNode>) -> Self {
        self.children.push(node.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecl {
    pub condition: RawCondition,
    #[serde(default)]
    pub children: Vec<FlowNode>,
}

impl GateDecl {
    pub fn new(condition: impl Into<RawCondition>) -> Self {
        Self {
            condition: condition.into(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, node: impl Into<FlowNode>) -> Self {
        self.children.push(node.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionType {
    Success,
    Warning,
    Inactive,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionDecl {
    #[serde(rename = "type")]
    pub assertion_type: AssertionType,
    pub i18n_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<RawCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RawCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_route: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FlowNode {
    Category(CategoryDecl),
    Subcategory(SubcategoryDecl),
    SubSubcategory(SubSubcategoryDecl),
    CollectionLoop(CollectionLoopDecl),
    Gate(GateDecl),
    Assertion(AssertionDecl),
    Screen(ScreenDecl),
}

macro_rules! into_flow_node {
    ($($decl:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$decl> for FlowNode {
                fn from(value: $decl) -> Self {
                    FlowNode::$variant(value)
                }
            }
        )*
    };
}

into_flow_node!(
    CategoryDecl => Category,
    SubcategoryDecl => Subcategory,
    SubSubcategoryDecl => SubSubcategory,
    CollectionLoopDecl => CollectionLoop,
    GateDecl => Gate,
    AssertionDecl => Assertion,
    ScreenDecl => Screen,
);

/// The root of a flow description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDecl {
    pub children: Vec<FlowNode>,
}

impl FlowDecl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(mut self, node: impl Into<FlowNode>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn from_json_str(raw: &str) -> taxflow_core::FlowResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
