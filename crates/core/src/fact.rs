//! Fact values as the engine stores and returns them.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// A dollar amount in cents. Serialized as a decimal string (`"1234.50"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dollar(pub i64);

impl Dollar {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Dollar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Dollar {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FlowError::TypeMismatch {
            path: String::new(),
            expected: "dollar amount".to_string(),
            found: s.to_string(),
        };
        let trimmed = s.trim().replace(',', "");
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.to_string()),
            None => (false, trimmed),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits.as_str(), ""),
        };
        if frac.len() > 2 || (whole.is_empty() && frac.is_empty()) {
            return Err(invalid());
        }
        // Signs are only allowed in front.
        if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .ok_or_else(invalid)?;
        Ok(Dollar(if negative { -cents } else { cents }))
    }
}

impl TryFrom<String> for Dollar {
    type Error = FlowError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dollar> for String {
    fn from(value: Dollar) -> Self {
        value.to_string()
    }
}

/// An ordered set of collection item ids.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Collection {
    pub items: Vec<String>,
}

impl Collection {
    pub fn new(items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item == id)
    }
}

/// A selected enum option together with the path that lists the options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    pub value: String,
    pub enum_options_path: String,
}

/// The closed set of fact kinds. The serde representation is the
/// persisted wrapper form: `{"$type": "BooleanWrapper", "item": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type", content = "item")]
pub enum FactValue {
    #[serde(rename = "BooleanWrapper")]
    Boolean(bool),
    #[serde(rename = "DollarWrapper")]
    Dollar(Dollar),
    #[serde(rename = "EnumWrapper")]
    Enum(EnumValue),
    #[serde(rename = "StringWrapper")]
    String(String),
    #[serde(rename = "DayWrapper")]
    Date(NaiveDate),
    #[serde(rename = "CollectionWrapper")]
    Collection(Collection),
    #[serde(rename = "CollectionItemWrapper")]
    CollectionItem(String),
    #[serde(rename = "IpPinWrapper")]
    IpPin(String),
}

/// Discriminant of [`FactValue`], used by the dictionary to type-check writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Boolean,
    Dollar,
    Enum,
    String,
    Date,
    Collection,
    CollectionItem,
    IpPin,
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FactKind::Boolean => "boolean",
            FactKind::Dollar => "dollar",
            FactKind::Enum => "enum",
            FactKind::String => "string",
            FactKind::Date => "date",
            FactKind::Collection => "collection",
            FactKind::CollectionItem => "collection item",
            FactKind::IpPin => "ip pin",
        };
        f.write_str(name)
    }
}

impl FactValue {
    pub fn kind(&self) -> FactKind {
        match self {
            FactValue::Boolean(_) => FactKind::Boolean,
            FactValue::Dollar(_) => FactKind::Dollar,
            FactValue::Enum(_) => FactKind::Enum,
            FactValue::String(_) => FactKind::String,
            FactValue::Date(_) => FactKind::Date,
            FactValue::Collection(_) => FactKind::Collection,
            FactValue::CollectionItem(_) => FactKind::CollectionItem,
            FactValue::IpPin(_) => FactKind::IpPin,
        }
    }

    /// Truthiness used by path conditions. Only booleans can be false; any
    /// other present value counts as true.
    pub fn is_truthy(&self) -> bool {
        match self {
            FactValue::Boolean(b) => *b,
            _ => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FactValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            FactValue::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&str> {
        match self {
            FactValue::Enum(e) => Some(&e.value),
            _ => None,
        }
    }

    pub fn as_item_ref(&self) -> Option<&str> {
        match self {
            FactValue::CollectionItem(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Boolean(b) => write!(f, "{b}"),
            FactValue::Dollar(d) => write!(f, "{d}"),
            FactValue::Enum(e) => f.write_str(&e.value),
            FactValue::String(s) | FactValue::IpPin(s) | FactValue::CollectionItem(s) => {
                f.write_str(s)
            }
            FactValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FactValue::Collection(c) => write!(f, "[{}]", c.items.join(", ")),
        }
    }
}

/// What the engine reports for one concrete path. Completeness is distinct
/// from presence: a placeholder has a value but is not complete.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactResult {
    pub value: Option<FactValue>,
    pub complete: bool,
}

impl FactResult {
    pub fn complete(value: FactValue) -> Self {
        Self {
            value: Some(value),
            complete: true,
        }
    }

    pub fn placeholder(value: FactValue) -> Self {
        Self {
            value: Some(value),
            complete: false,
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn get(&self) -> Option<&FactValue> {
        self.value.as_ref()
    }

    pub fn is_truthy(&self) -> bool {
        self.value.as_ref().is_some_and(FactValue::is_truthy)
    }

    /// The boolean value of a complete fact.
    pub fn complete_bool(&self) -> Option<bool> {
        if self.complete {
            self.value.as_ref().and_then(FactValue::as_bool)
        } else {
            None
        }
    }

    /// Item ids of a complete collection fact; empty otherwise.
    pub fn complete_items(&self) -> Vec<String> {
        match (&self.value, self.complete) {
            (Some(FactValue::Collection(c)), true) => c.items.clone(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_parse_and_display() {
        assert_eq!("1,234.5".parse::<Dollar>().unwrap(), Dollar(123_450));
        assert_eq!("-0.07".parse::<Dollar>().unwrap().to_string(), "-0.07");
        assert_eq!(Dollar(100).to_string(), "1.00");
        assert!("1.234".parse::<Dollar>().is_err());
        assert!("abc".parse::<Dollar>().is_err());
        assert!("1.-5".parse::<Dollar>().is_err());
        assert!("1.+5".parse::<Dollar>().is_err());
        assert!("--1".parse::<Dollar>().is_err());
        assert!("+1".parse::<Dollar>().is_err());
    }

    #[test]
    fn oversized_dollar_amounts_are_rejected() {
        assert!(matches!(
            "99999999999999999".parse::<Dollar>(),
            Err(FlowError::TypeMismatch { .. })
        ));
        assert!(matches!(
            "92233720368547758.07".parse::<Dollar>(),
            Ok(Dollar(i64::MAX))
        ));

        let json = serde_json::json!({"$type": "DollarWrapper", "item": "99999999999999999"});
        assert!(serde_json::from_value::<FactValue>(json).is_err());
    }

    #[test]
    fn wrapper_serialization() {
        let value = FactValue::Boolean(true);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({"$type": "BooleanWrapper", "item": true}));

        let dollar = FactValue::Dollar(Dollar(2500));
        let json = serde_json::to_value(&dollar).unwrap();
        assert_eq!(json, serde_json::json!({"$type": "DollarWrapper", "item": "25.00"}));
        let back: FactValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, dollar);
    }

    #[test]
    fn truthiness() {
        assert!(!FactValue::Boolean(false).is_truthy());
        assert!(FactValue::String(String::new()).is_truthy());
        assert!(!FactResult::missing().is_truthy());
    }

    #[test]
    fn placeholder_has_value_but_is_incomplete() {
        let result = FactResult::placeholder(FactValue::Boolean(false));
        assert!(result.has_value());
        assert!(!result.complete);
        assert_eq!(result.complete_bool(), None);
    }

    #[test]
    fn complete_items_requires_completeness() {
        let collection = FactValue::Collection(Collection::new(["a", "b"]));
        assert_eq!(FactResult::complete(collection.clone()).complete_items(), vec!["a", "b"]);
        assert!(FactResult::placeholder(collection).complete_items().is_empty());
    }
}
