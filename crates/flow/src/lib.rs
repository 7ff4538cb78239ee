//! Interview flow engine: the declarative flow description, its compiled
//! form, the condition language and the resolver that decides where a filer
//! goes next.
//!
//! A [`FlowDecl`] is compiled once into a [`FlowConfig`]. Every question
//! about progress is then answered by a [`FlowResolver`] built over the
//! compiled flow, a fact graph and the [`ExternalContext`].

pub mod checklist;
pub mod condition;
pub mod content;
pub mod context;
pub mod declarations;
pub mod demo;
pub mod loops;
pub mod model;
pub mod navigation;
pub mod routes;

pub use checklist::{ChecklistCategoryState, ChecklistSubcategoryState, RejectionCode, SubmissionStatus};
pub use condition::{Condition, ConditionKind, ConditionOperator, RawCondition};
pub use content::{apply_set_fact_actions, ContentItem, SetFactAction, SKIPPED_INCOMPLETE_FACTS};
pub use context::{DataImportProfile, ExternalContext, FeatureFlags, ImportProfileState};
pub use declarations::FlowDecl;
pub use model::{
    CategoryId, CollectionLoopConfig, FlowConfig, LoopId, ScreenConfig, ScreenId, SubSubcategoryId,
    SubcategoryConfig, SubcategoryId,
};
pub use navigation::{FlowResolver, NextScreen, NextScreenOptions, ScreenLocation};
