//! Read-only state from outside the fact graph that conditions consult:
//! deployment flags, the imported data profile and the submission-blocking
//! fact list.

use serde::{Deserialize, Serialize};

use taxflow_core::config::FlagsConfig;
use taxflow_core::FactPath;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub experimental: bool,
    pub essar_signing_enabled: bool,
}

impl From<&FlagsConfig> for FeatureFlags {
    fn from(config: &FlagsConfig) -> Self {
        Self {
            experimental: config.experimental,
            essar_signing_enabled: config.essar_signing_enabled,
        }
    }
}

/// Fetch state of one section of the import profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionState {
    Success,
    Incomplete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ImportSection<T> {
    pub state: SectionState,
    #[serde(default)]
    pub payload: Option<T>,
}

impl<T> ImportSection<T> {
    pub fn success(payload: T) -> Self {
        Self {
            state: SectionState::Success,
            payload: Some(payload),
        }
    }

    /// The payload of a successfully fetched section.
    pub fn loaded(&self) -> Option<&T> {
        match self.state {
            SectionState::Success => self.payload.as_ref(),
            _ => None,
        }
    }
}

impl<T> Default for ImportSection<T> {
    fn default() -> Self {
        Self {
            state: SectionState::Incomplete,
            payload: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpPinPayload {
    pub has_ip_pin: bool,
    #[serde(default)]
    pub pin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct F1095APayload {
    #[serde(rename = "has1095A")]
    pub has_1095a: bool,
}

/// The imported profile, one entry per source section. Individual records
/// are opaque to the flow engine, only their presence and count matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataImportProfile {
    pub about_you_basic: ImportSection<serde_json::Value>,
    pub w2s: ImportSection<Vec<serde_json::Value>>,
    pub interest_income: ImportSection<Vec<serde_json::Value>>,
    pub ip_pin: ImportSection<IpPinPayload>,
    #[serde(rename = "f1095A")]
    pub f1095a: ImportSection<F1095APayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ImportProfileState {
    #[default]
    NotLoaded,
    Loading,
    Complete {
        profile: DataImportProfile,
    },
    Error,
}

impl ImportProfileState {
    pub fn profile(&self) -> Option<&DataImportProfile> {
        match self {
            ImportProfileState::Complete { profile } => Some(profile),
            _ => None,
        }
    }
}

/// Everything a condition may read besides the fact graph. Passed explicitly
/// into every evaluation.
#[derive(Debug, Clone, Default)]
pub struct ExternalContext {
    pub flags: FeatureFlags,
    pub import_profile: ImportProfileState,
    /// Facts whose true value blocks submission.
    pub submission_blocking_facts: Vec<FactPath>,
}

impl ExternalContext {
    pub fn new(flags: FeatureFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn with_import_profile(mut self, state: ImportProfileState) -> Self {
        self.import_profile = state;
        self
    }

    pub fn with_submission_blocking_facts(mut self, facts: Vec<FactPath>) -> Self {
        self.submission_blocking_facts = facts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_state_deserializes_from_tagged_json() {
        let json = serde_json::json!({
            "status": "complete",
            "profile": {
                "w2s": {"state": "success", "payload": [{"employer": "Acme"}]},
                "ipPin": {"state": "success", "payload": {"hasIpPin": true, "pin": "123-456"}},
                "f1095A": {"state": "error"}
            }
        });
        let state: ImportProfileState = serde_json::from_value(json).unwrap();
        let profile = state.profile().unwrap();
        assert_eq!(profile.w2s.loaded().map(Vec::len), Some(1));
        assert_eq!(profile.ip_pin.loaded().and_then(|p| p.pin.as_deref()), Some("123-456"));
        assert!(profile.f1095a.loaded().is_none());
        assert_eq!(profile.about_you_basic.state, SectionState::Incomplete);
    }

    #[test]
    fn flags_follow_config() {
        let config = FlagsConfig {
            experimental: true,
            essar_signing_enabled: false,
        };
        let flags = FeatureFlags::from(&config);
        assert!(flags.experimental);
        assert!(!flags.essar_signing_enabled);
    }
}
