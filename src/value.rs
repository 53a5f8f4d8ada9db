//! Values stored in relation tables.
//!
//! Every cell of a relation table holds a [`Value`]; every column declares the
//! [`ValueType`] it accepts. Relation instances additionally carry a
//! [`QuantityRange`], a [`Necessity`] and a [`Presence`] marker.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// Inclusive quantity range carried by a relation instance.
///
/// `max == None` means "no upper bound".
///
/// # Examples
///
/// ```
/// use kyroworld::QuantityRange;
///
/// let legs = QuantityRange::exactly(4);
/// assert!(legs.contains(4));
/// assert!(!legs.contains(3));
///
/// let grains = QuantityRange::at_least(1);
/// assert!(grains.contains(10_000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantityRange {
    /// Lower bound (inclusive).
    pub min: u32,
    /// Upper bound (inclusive), unbounded if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl QuantityRange {
    /// A range holding exactly `n`.
    #[must_use]
    pub const fn exactly(n: u32) -> Self {
        Self { min: n, max: Some(n) }
    }

    /// A range with no upper bound.
    #[must_use]
    pub const fn at_least(n: u32) -> Self {
        Self { min: n, max: None }
    }

    /// A bounded range. Returns `None` when `min > max`.
    #[must_use]
    pub const fn between(min: u32, max: u32) -> Option<Self> {
        if min > max {
            return None;
        }
        Some(Self { min, max: Some(max) })
    }

    /// Returns true if `n` lies inside the range.
    #[must_use]
    pub fn contains(&self, n: u32) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }
}

impl Default for QuantityRange {
    fn default() -> Self {
        Self::exactly(1)
    }
}

impl fmt::Display for QuantityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{max}"),
            Some(max) => write!(f, "{}..={max}", self.min),
            None => write!(f, "{}..", self.min),
        }
    }
}

/// Whether a relation must hold or may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Necessity {
    /// Must hold.
    #[default]
    Obligatory,
    /// May hold.
    Optional,
}

/// Whether a relation is present or absent.
///
/// On a condition this tests for presence or absence; on a change it means
/// "add" or "remove".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// The relation holds.
    #[default]
    Present,
    /// The relation does not hold.
    Absent,
}

/// A single cell value.
///
/// # Examples
///
/// ```
/// use kyroworld::Value;
///
/// let flammable = Value::Bool(true);
/// let weight = Value::Int(5);
///
/// assert!(flammable.is_bool());
/// assert_eq!(weight.as_int(), Some(5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Text.
    String(String),
    /// Node reference.
    Node(NodeId),
    /// Quantity range.
    Range(QuantityRange),
    /// Necessity flag.
    Necessity(Necessity),
    /// Presence flag.
    Presence(Presence),
    /// Empty cell.
    Null,
}

impl Value {
    /// Whether this is a boolean.
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// Whether this is an integer.
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Whether this is a float.
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// Whether this is text.
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Whether this is a node reference.
    pub const fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    /// Whether this is the empty cell.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for the scalar variants an attribute value may take.
    pub const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::String(_)
        )
    }

    /// The boolean, if this is one.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The float, if this is one.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The text, if this is text.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The node reference, if this is one.
    pub const fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(v) => Some(*v),
            _ => None,
        }
    }

    /// The quantity range, if this is one.
    pub const fn as_range(&self) -> Option<QuantityRange> {
        match self {
            Self::Range(v) => Some(*v),
            _ => None,
        }
    }

    /// The necessity, if this is one.
    pub const fn as_necessity(&self) -> Option<Necessity> {
        match self {
            Self::Necessity(v) => Some(*v),
            _ => None,
        }
    }

    /// The presence, if this is one.
    pub const fn as_presence(&self) -> Option<Presence> {
        match self {
            Self::Presence(v) => Some(*v),
            _ => None,
        }
    }

    /// The concrete type of this value, `None` for [`Value::Null`].
    #[must_use]
    pub const fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Bool(_) => Some(ValueType::Bool),
            Self::Int(_) => Some(ValueType::Int),
            Self::Float(_) => Some(ValueType::Float),
            Self::String(_) => Some(ValueType::Text),
            Self::Node(_) => Some(ValueType::Node),
            Self::Range(_) => Some(ValueType::Range),
            Self::Necessity(_) => Some(ValueType::Necessity),
            Self::Presence(_) => Some(ValueType::Presence),
            Self::Null => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self.value_type() {
            Some(t) => t.name(),
            None => "null",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Node(v) => write!(f, "{v}"),
            Self::Range(v) => write!(f, "{v}"),
            Self::Necessity(v) => write!(f, "{v:?}"),
            Self::Presence(v) => write!(f, "{v:?}"),
            Self::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<NodeId> for Value {
    fn from(v: NodeId) -> Self {
        Self::Node(v)
    }
}

impl From<QuantityRange> for Value {
    fn from(v: QuantityRange) -> Self {
        Self::Range(v)
    }
}

impl From<Necessity> for Value {
    fn from(v: Necessity) -> Self {
        Self::Necessity(v)
    }
}

impl From<Presence> for Value {
    fn from(v: Presence) -> Self {
        Self::Presence(v)
    }
}

/// Declared type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Boolean.
    Bool,
    /// Signed integer.
    Int,
    /// Float.
    Float,
    /// Text.
    Text,
    /// Node reference.
    Node,
    /// Quantity range.
    Range,
    /// Necessity flag.
    Necessity,
    /// Presence flag.
    Presence,
    /// Any of bool, int, float or text.
    Scalar,
}

impl ValueType {
    /// Every known value type.
    pub const ALL: [Self; 9] = [
        Self::Bool,
        Self::Int,
        Self::Float,
        Self::Text,
        Self::Node,
        Self::Range,
        Self::Necessity,
        Self::Presence,
        Self::Scalar,
    ];

    /// Stable lowercase name, also accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Node => "node",
            Self::Range => "range",
            Self::Necessity => "necessity",
            Self::Presence => "presence",
            Self::Scalar => "scalar",
        }
    }

    /// Returns true if a non-null `value` may be stored in a column of this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value.value_type()) {
            (_, None) => false,
            (Self::Scalar, Some(_)) => value.is_scalar(),
            (expected, Some(actual)) => expected == actual,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown value type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValueType(pub String);

impl FromStr for ValueType {
    type Err = UnknownValueType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.name() == key)
            .ok_or(UnknownValueType(s.to_string()))
    }
}
