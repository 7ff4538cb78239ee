//! The condition language used to gate screens, content and subcategories.
//!
//! Raw conditions come from the flow description, either as a string
//! shorthand (`"/path"`, `"experimental"`, `"submissionBlockingFactsAreFalse"`,
//! `"isEssarSigningPath"`) or as an object `{operator?, condition, section?}`.
//! They are parsed once at compile time into a [`Condition`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use taxflow_core::{ConcretePath, FactGraph, FactPath, FactResult, FactValue, FlowError, FlowResult};

use crate::context::ExternalContext;

const EXPERIMENTAL: &str = "experimental";
const SUBMISSION_BLOCKING: &str = "submissionBlockingFactsAreFalse";
const ESSAR_SIGNING: &str = "isEssarSigningPath";
const DATA_IMPORT: &str = "data-import";
const LEGACY_SIGNING_PATH: &str = "/isLegacySigningPath";
const IS_RESUBMITTING_PATH: &str = "/isResubmitting";
const HAS_IP_PIN_PATH: &str = "/filers/*/hasIpPin";
const IDENTITY_PIN_PATH: &str = "/filers/*/identityPin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCondition {
    Shorthand(String),
    Object(RawConditionObject),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConditionObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl RawCondition {
    pub fn with_operator(operator: ConditionOperator, condition: impl Into<String>) -> Self {
        RawCondition::Object(RawConditionObject {
            operator: Some(operator.as_str().to_string()),
            condition: condition.into(),
            section: None,
        })
    }

    pub fn data_import(section: ImportSectionKey, operator: DataImportOperator) -> Self {
        RawCondition::Object(RawConditionObject {
            operator: Some(operator.as_str().to_string()),
            condition: DATA_IMPORT.to_string(),
            section: Some(section.as_str().to_string()),
        })
    }

    fn condition_str(&self) -> &str {
        match self {
            RawCondition::Shorthand(s) => s,
            RawCondition::Object(o) => &o.condition,
        }
    }

    fn operator_str(&self) -> Option<&str> {
        match self {
            RawCondition::Shorthand(_) => None,
            RawCondition::Object(o) => o.operator.as_deref(),
        }
    }
}

impl From<&str> for RawCondition {
    fn from(value: &str) -> Self {
        RawCondition::Shorthand(value.to_string())
    }
}

impl fmt::Display for RawCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawCondition::Shorthand(s) => f.write_str(s),
            RawCondition::Object(o) => {
                let operator = o.operator.as_deref().unwrap_or(ConditionOperator::IsTrue.as_str());
                write!(f, "{operator}:{}", o.condition)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    IsTrue,
    IsTrueAndComplete,
    IsTrueOrIncomplete,
    IsFalse,
    IsFalseAndComplete,
    IsFalseOrIncomplete,
    IsIncomplete,
    IsComplete,
}

impl ConditionOperator {
    pub const ALL: [ConditionOperator; 8] = [
        ConditionOperator::IsTrue,
        ConditionOperator::IsTrueAndComplete,
        ConditionOperator::IsTrueOrIncomplete,
        ConditionOperator::IsFalse,
        ConditionOperator::IsFalseAndComplete,
        ConditionOperator::IsFalseOrIncomplete,
        ConditionOperator::IsIncomplete,
        ConditionOperator::IsComplete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionOperator::IsTrue => "isTrue",
            ConditionOperator::IsTrueAndComplete => "isTrueAndComplete",
            ConditionOperator::IsTrueOrIncomplete => "isTrueOrIncomplete",
            ConditionOperator::IsFalse => "isFalse",
            ConditionOperator::IsFalseAndComplete => "isFalseAndComplete",
            ConditionOperator::IsFalseOrIncomplete => "isFalseOrIncomplete",
            ConditionOperator::IsIncomplete => "isIncomplete",
            ConditionOperator::IsComplete => "isComplete",
        }
    }

    pub fn parse(raw: &str) -> FlowResult<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == raw)
            .ok_or_else(|| FlowError::Specification(format!("unknown condition operator {raw}")))
    }

    /// Applies the operator to an engine result.
    pub fn apply(self, fact: &FactResult) -> bool {
        let truthy = fact.is_truthy();
        match self {
            ConditionOperator::IsTrue => fact.has_value() && truthy,
            ConditionOperator::IsTrueAndComplete => fact.complete && truthy,
            ConditionOperator::IsTrueOrIncomplete => !fact.complete || truthy,
            ConditionOperator::IsFalse => fact.has_value() && !truthy,
            ConditionOperator::IsFalseAndComplete => fact.complete && !truthy,
            ConditionOperator::IsFalseOrIncomplete => !fact.complete || !truthy,
            ConditionOperator::IsComplete => fact.complete,
            ConditionOperator::IsIncomplete => !fact.complete,
        }
    }

    /// Result of a signing-path condition while alternative signing is
    /// switched off.
    fn essar_disabled_default(self) -> bool {
        match self {
            ConditionOperator::IsTrue
            | ConditionOperator::IsTrueAndComplete
            | ConditionOperator::IsTrueOrIncomplete
            | ConditionOperator::IsIncomplete => false,
            ConditionOperator::IsFalse
            | ConditionOperator::IsFalseAndComplete
            | ConditionOperator::IsFalseOrIncomplete
            | ConditionOperator::IsComplete => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataImportOperator {
    IsTrue,
    IsFalse,
    IsUnknown,
}

impl DataImportOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            DataImportOperator::IsTrue => "isTrue",
            DataImportOperator::IsFalse => "isFalse",
            DataImportOperator::IsUnknown => "isUnknown",
        }
    }

    fn parse(raw: &str) -> FlowResult<Self> {
        match raw {
            "isTrue" => Ok(DataImportOperator::IsTrue),
            "isFalse" => Ok(DataImportOperator::IsFalse),
            "isUnknown" | "isUnknownOrResubmitting" => Ok(DataImportOperator::IsUnknown),
            other => Err(FlowError::Specification(format!(
                "unknown data import operator {other}"
            ))),
        }
    }

    fn apply(self, value: ImportValue) -> bool {
        match self {
            DataImportOperator::IsTrue => value == ImportValue::True,
            DataImportOperator::IsFalse => value == ImportValue::False,
            DataImportOperator::IsUnknown => value == ImportValue::Unknown,
        }
    }
}

/// Tri-state answer of a data import section. `Unknown` is an ordinary value,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportValue {
    True,
    False,
    Unknown,
}

impl From<bool> for ImportValue {
    fn from(value: bool) -> Self {
        if value {
            ImportValue::True
        } else {
            ImportValue::False
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportSectionKey {
    #[serde(rename = "about-you")]
    AboutYou,
    #[serde(rename = "ip-pin-taxpayer-has-ip-pin")]
    IpPinTaxpayerHasIpPin,
    #[serde(rename = "form-w2s")]
    FormW2s,
    #[serde(rename = "has-one-form-w2")]
    HasOneFormW2,
    #[serde(rename = "has-multiple-forms-w2")]
    HasMultipleFormsW2,
    #[serde(rename = "has-one-1099-int")]
    HasOne1099Int,
    #[serde(rename = "has-multiple-1099-ints")]
    HasMultiple1099Ints,
    #[serde(rename = "1099-ints")]
    Form1099Ints,
    #[serde(rename = "has-at-least-one-1095-a")]
    HasAtLeastOne1095A,
    #[serde(rename = "has-no-1095-a")]
    HasNo1095A,
}

impl ImportSectionKey {
    pub const ALL: [ImportSectionKey; 10] = [
        ImportSectionKey::AboutYou,
        ImportSectionKey::IpPinTaxpayerHasIpPin,
        ImportSectionKey::FormW2s,
        ImportSectionKey::HasOneFormW2,
        ImportSectionKey::HasMultipleFormsW2,
        ImportSectionKey::HasOne1099Int,
        ImportSectionKey::HasMultiple1099Ints,
        ImportSectionKey::Form1099Ints,
        ImportSectionKey::HasAtLeastOne1095A,
        ImportSectionKey::HasNo1095A,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImportSectionKey::AboutYou => "about-you",
            ImportSectionKey::IpPinTaxpayerHasIpPin => "ip-pin-taxpayer-has-ip-pin",
            ImportSectionKey::FormW2s => "form-w2s",
            ImportSectionKey::HasOneFormW2 => "has-one-form-w2",
            ImportSectionKey::HasMultipleFormsW2 => "has-multiple-forms-w2",
            ImportSectionKey::HasOne1099Int => "has-one-1099-int",
            ImportSectionKey::HasMultiple1099Ints => "has-multiple-1099-ints",
            ImportSectionKey::Form1099Ints => "1099-ints",
            ImportSectionKey::HasAtLeastOne1095A => "has-at-least-one-1095-a",
            ImportSectionKey::HasNo1095A => "has-no-1095-a",
        }
    }

    pub fn parse(raw: &str) -> FlowResult<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == raw)
            .ok_or_else(|| FlowError::Specification(format!("unknown data import section {raw}")))
    }
}

/// What the IP PIN section found in the import profile.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IpPinImport {
    Resubmitting,
    NotLoaded,
    HasPin(String),
    /// The profile claims a pin but it is not a six digit pin.
    InvalidPin,
    NoPin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionKind {
    /// The deployment-level experimental flag.
    FeatureFlag,
    Path { path: FactPath, operator: ConditionOperator },
    /// Every submission-blocking fact is present and false.
    SubmissionBlockingFactsAreFalse,
    /// The signing-path fact, reinterpreted by the alternative signing flag.
    EssarSigning { operator: ConditionOperator },
    DataImport {
        section: ImportSectionKey,
        operator: DataImportOperator,
    },
}

/// A parsed condition together with the raw form it was written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    raw: RawCondition,
    kind: ConditionKind,
}

impl Condition {
    pub fn parse(raw: &RawCondition) -> FlowResult<Self> {
        let condition = raw.condition_str();
        let path_operator = || match raw.operator_str() {
            Some(op) => ConditionOperator::parse(op),
            None => Ok(ConditionOperator::IsTrue),
        };

        let kind = match condition {
            EXPERIMENTAL => ConditionKind::FeatureFlag,
            ESSAR_SIGNING => ConditionKind::EssarSigning {
                operator: path_operator()?,
            },
            SUBMISSION_BLOCKING => ConditionKind::SubmissionBlockingFactsAreFalse,
            DATA_IMPORT => {
                let RawCondition::Object(object) = raw else {
                    return Err(FlowError::Specification(
                        "data import conditions need a section".to_string(),
                    ));
                };
                let section = object.section.as_deref().ok_or_else(|| {
                    FlowError::Specification("data import condition without a section".to_string())
                })?;
                ConditionKind::DataImport {
                    section: ImportSectionKey::parse(section)?,
                    operator: match &object.operator {
                        Some(op) => DataImportOperator::parse(op)?,
                        None => DataImportOperator::IsTrue,
                    },
                }
            }
            path => ConditionKind::Path {
                path: FactPath::parse(path).map_err(|e| {
                    FlowError::Specification(format!("condition {raw} is not a fact path: {e}"))
                })?,
                operator: path_operator()?,
            },
        };
        Ok(Self {
            raw: raw.clone(),
            kind,
        })
    }

    pub fn parse_all<'a>(raws: impl IntoIterator<Item = &'a RawCondition>) -> FlowResult<Vec<Self>> {
        raws.into_iter().map(Self::parse).collect()
    }

    pub fn kind(&self) -> &ConditionKind {
        &self.kind
    }

    pub fn raw(&self) -> &RawCondition {
        &self.raw
    }

    /// The fact path this condition reads, if it reads exactly one.
    pub fn fact_path(&self) -> Option<&FactPath> {
        match &self.kind {
            ConditionKind::Path { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Evaluates the condition. Never writes to the graph.
    pub fn evaluate(
        &self,
        graph: &dyn FactGraph,
        ctx: &ExternalContext,
        collection_id: Option<&str>,
    ) -> bool {
        match &self.kind {
            ConditionKind::FeatureFlag => ctx.flags.experimental,
            ConditionKind::Path { path, operator } => {
                evaluate_path(graph, path, *operator, collection_id)
            }
            ConditionKind::SubmissionBlockingFactsAreFalse => {
                ctx.submission_blocking_facts.iter().all(|path| {
                    // Placeholders count as present. A missing value fails.
                    match path.concretize(None) {
                        Ok(concrete) => {
                            let result = graph.get(&concrete);
                            result.has_value() && !result.is_truthy()
                        }
                        Err(_) => false,
                    }
                })
            }
            ConditionKind::EssarSigning { operator } => {
                if !ctx.flags.essar_signing_enabled {
                    return operator.essar_disabled_default();
                }
                let legacy = taxflow_core::fact_path!(LEGACY_SIGNING_PATH);
                !evaluate_path(graph, &legacy, *operator, None)
            }
            ConditionKind::DataImport { section, operator } => {
                operator.apply(import_value(graph, ctx, *section, collection_id))
            }
        }
    }

    /// Like [`Condition::evaluate`], but an IP PIN data import condition also
    /// records what the import profile says into the filer's IP PIN facts.
    /// This is the only condition that writes; the writes are staged and not
    /// saved.
    pub fn evaluate_recording_imports(
        &self,
        graph: &mut dyn FactGraph,
        ctx: &ExternalContext,
        collection_id: Option<&str>,
    ) -> FlowResult<bool> {
        let ConditionKind::DataImport {
            section: ImportSectionKey::IpPinTaxpayerHasIpPin,
            operator,
        } = &self.kind
        else {
            return Ok(self.evaluate(&*graph, ctx, collection_id));
        };
        let Some(id) = collection_id else {
            return Ok(operator.apply(ImportValue::Unknown));
        };

        let import = ip_pin_import(&*graph, ctx, collection_id);
        let has_ip_pin = taxflow_core::fact_path!(HAS_IP_PIN_PATH).concretize(Some(id))?;
        match &import {
            IpPinImport::HasPin(pin) => {
                let identity_pin = taxflow_core::fact_path!(IDENTITY_PIN_PATH).concretize(Some(id))?;
                graph.set(&has_ip_pin, FactValue::Boolean(true))?;
                graph.set(&identity_pin, FactValue::IpPin(pin.clone()))?;
                info!(filer = %id, "Recorded imported IP PIN");
            }
            IpPinImport::NoPin => {
                graph.set(&has_ip_pin, FactValue::Boolean(false))?;
                info!(filer = %id, "Recorded that the import profile has no IP PIN");
            }
            IpPinImport::Resubmitting | IpPinImport::NotLoaded | IpPinImport::InvalidPin => {}
        }
        Ok(operator.apply(ip_pin_value(&import)))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// True if every condition passes. An empty list passes.
pub fn conditions_pass(
    conditions: &[Condition],
    graph: &dyn FactGraph,
    ctx: &ExternalContext,
    collection_id: Option<&str>,
) -> bool {
    conditions
        .iter()
        .all(|c| c.evaluate(graph, ctx, collection_id))
}

fn evaluate_path(
    graph: &dyn FactGraph,
    path: &FactPath,
    operator: ConditionOperator,
    collection_id: Option<&str>,
) -> bool {
    if path.is_abstract() && collection_id.is_none() {
        return false;
    }
    match path.concretize(collection_id) {
        Ok(concrete) => operator.apply(&graph.get(&concrete)),
        Err(e) => {
            debug!(path = %path, error = %e, "Condition path could not be concretized");
            false
        }
    }
}

fn is_resubmitting(graph: &dyn FactGraph) -> bool {
    match ConcretePath::parse(IS_RESUBMITTING_PATH) {
        Ok(path) => graph.get(&path).complete_bool().unwrap_or(false),
        Err(_) => false,
    }
}

fn ip_pin_import(graph: &dyn FactGraph, ctx: &ExternalContext, collection_id: Option<&str>) -> IpPinImport {
    if collection_id.is_none() {
        return IpPinImport::NotLoaded;
    }
    if is_resubmitting(graph) {
        return IpPinImport::Resubmitting;
    }
    let Some(payload) = ctx.import_profile.profile().and_then(|p| p.ip_pin.loaded()) else {
        return IpPinImport::NotLoaded;
    };
    if !payload.has_ip_pin {
        return IpPinImport::NoPin;
    }
    let digits: String = payload
        .pin
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if digits.len() == 6 {
        IpPinImport::HasPin(digits)
    } else {
        IpPinImport::InvalidPin
    }
}

fn ip_pin_value(import: &IpPinImport) -> ImportValue {
    match import {
        IpPinImport::HasPin(_) => ImportValue::True,
        IpPinImport::NoPin => ImportValue::False,
        IpPinImport::Resubmitting | IpPinImport::NotLoaded | IpPinImport::InvalidPin => {
            ImportValue::Unknown
        }
    }
}

/// The tri-state value of a data import section.
pub fn import_value(
    graph: &dyn FactGraph,
    ctx: &ExternalContext,
    section: ImportSectionKey,
    collection_id: Option<&str>,
) -> ImportValue {
    let profile = ctx.import_profile.profile();
    let w2s = profile.and_then(|p| p.w2s.loaded()).map(Vec::len);
    let interest = profile.and_then(|p| p.interest_income.loaded()).map(Vec::len);

    match section {
        ImportSectionKey::AboutYou => {
            ImportValue::from(profile.is_some_and(|p| p.about_you_basic.loaded().is_some()))
        }
        ImportSectionKey::IpPinTaxpayerHasIpPin => {
            ip_pin_value(&ip_pin_import(graph, ctx, collection_id))
        }
        ImportSectionKey::FormW2s => {
            ImportValue::from(w2s.is_some_and(|n| n > 0))
        }
        ImportSectionKey::HasOneFormW2 => {
            ImportValue::from(w2s == Some(1))
        }
        ImportSectionKey::HasMultipleFormsW2 => {
            ImportValue::from(w2s.is_some_and(|n| n > 1))
        }
        ImportSectionKey::HasOne1099Int => {
            ImportValue::from(interest == Some(1))
        }
        ImportSectionKey::HasMultiple1099Ints => {
            ImportValue::from(interest.is_some_and(|n| n > 1))
        }
        ImportSectionKey::Form1099Ints => {
            ImportValue::from(interest.is_some_and(|n| n > 0))
        }
        ImportSectionKey::HasAtLeastOne1095A => {
            match profile.and_then(|p| p.f1095a.loaded()) {
                Some(payload) if payload.has_1095a => ImportValue::True,
                _ => ImportValue::Unknown,
            }
        }
        ImportSectionKey::HasNo1095A => match profile.and_then(|p| p.f1095a.loaded()) {
            Some(payload) if !payload.has_1095a => ImportValue::True,
            _ => ImportValue::Unknown,
        },
    }
}
