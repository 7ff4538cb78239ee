//! Fact path syntax.
//!
//! A path is a `/`-separated list of segments. A `*` segment marks
//! collection membership (an *abstract* path); a concrete path replaces the
//! wildcard with `#<item-id>`. Paths without a wildcard are absolute and are
//! already concrete.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};

const WILDCARD: &str = "*";
const ITEM_PREFIX: char = '#';

/// A fact path as written in the flow and the fact dictionary. May be
/// abstract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FactPath(String);

/// A path that names exactly one fact: no wildcard segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConcretePath(String);

fn validate(raw: &str) -> FlowResult<()> {
    if !raw.starts_with('/') {
        return Err(FlowError::InvalidPath(format!("{raw} must start with '/'")));
    }
    if raw.len() > 1 && raw[1..].split('/').any(str::is_empty) {
        return Err(FlowError::InvalidPath(format!("{raw} has an empty segment")));
    }
    Ok(())
}

impl FactPath {
    pub fn parse(raw: impl Into<String>) -> FlowResult<Self> {
        let raw = raw.into();
        validate(&raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split('/')
    }

    /// True if the path contains a collection wildcard.
    pub fn is_abstract(&self) -> bool {
        self.segments().any(|s| s == WILDCARD)
    }

    /// Substitutes the wildcard with `collection_id`. Abstract paths require
    /// an id; absolute paths ignore it.
    pub fn concretize(&self, collection_id: Option<&str>) -> FlowResult<ConcretePath> {
        if !self.is_abstract() {
            return Ok(ConcretePath(self.0.clone()));
        }
        let id = collection_id.ok_or_else(|| {
            FlowError::InvariantViolation(format!(
                "abstract path {} needs a collection id to become concrete",
                self.0
            ))
        })?;
        let concrete = self
            .segments()
            .map(|s| {
                if s == WILDCARD {
                    format!("{ITEM_PREFIX}{id}")
                } else {
                    s.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("/");
        Ok(ConcretePath(format!("/{concrete}")))
    }

    /// Replaces the last segment with `name`, keeping any wildcard.
    pub fn sibling(&self, name: &str) -> FlowResult<FactPath> {
        let prefix = match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        };
        FactPath::parse(format!("{prefix}/{name}"))
    }

    /// The path of the collection this abstract path belongs to
    /// (everything before the wildcard).
    pub fn collection_path(&self) -> Option<ConcretePath> {
        let idx = self.0.find("/*")?;
        Some(ConcretePath(self.0[..idx].to_string()))
    }
}

impl ConcretePath {
    pub fn parse(raw: impl Into<String>) -> FlowResult<Self> {
        let raw = raw.into();
        validate(&raw)?;
        if raw[1..].split('/').any(|s| s == WILDCARD) {
            return Err(FlowError::InvalidPath(format!(
                "{raw} contains a wildcard and is not concrete"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The dictionary form of this path: item segments become wildcards.
    pub fn to_abstract(&self) -> FactPath {
        let segments = self.0[1..]
            .split('/')
            .map(|s| if s.starts_with(ITEM_PREFIX) { WILDCARD } else { s })
            .collect::<Vec<_>>()
            .join("/");
        FactPath(format!("/{segments}"))
    }

    /// The first collection item id in the path, if any.
    pub fn collection_id(&self) -> Option<&str> {
        self.0[1..]
            .split('/')
            .find_map(|s| s.strip_prefix(ITEM_PREFIX))
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl TryFrom<String> for FactPath {
    type Error = FlowError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        FactPath::parse(value)
    }
}

impl TryFrom<String> for ConcretePath {
    type Error = FlowError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        ConcretePath::parse(value)
    }
}

impl From<FactPath> for String {
    fn from(value: FactPath) -> Self {
        value.0
    }
}

impl From<ConcretePath> for String {
    fn from(value: ConcretePath) -> Self {
        value.0
    }
}

impl fmt::Display for FactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ConcretePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shorthand for paths known to be well formed at compile time. Panics on a
/// malformed literal.
#[macro_export]
macro_rules! fact_path {
    ($raw:expr) => {
        $crate::path::FactPath::parse($raw).expect("static fact path literal")
    };
}
