//! Typed stage parameters and the insertion-ordered [`ParamSet`].

use indexmap::IndexMap;
use std::fmt;

/// The kind of a [`ParamValue`], used in type-mismatch errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// [`ParamValue::Bool`].
    Bool,
    /// [`ParamValue::Int`].
    Int,
    /// [`ParamValue::Float`].
    Float,
    /// [`ParamValue::Text`].
    Text,
    /// [`ParamValue::IntList`].
    IntList,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::IntList => "int list",
        };
        f.write_str(name)
    }
}

/// One configuration value of a stage.
///
/// Equality is what decides whether a parameter write is a no-op, so
/// floats compare by bit pattern: writing `NaN` over `NaN` is a no-op,
/// while `0.0` and `-0.0` are different values.
#[derive(Clone, Debug)]
pub enum ParamValue {
    /// A flag.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// Free text (paths, mode names).
    Text(String),
    /// A list of integers (per-axis radii, extents).
    IntList(Vec<i64>),
}

impl ParamValue {
    /// The kind of this value.
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Bool(_) => ParamKind::Bool,
            Self::Int(_) => ParamKind::Int,
            Self::Float(_) => ParamKind::Float,
            Self::Text(_) => ParamKind::Text,
            Self::IntList(_) => ParamKind::IntList,
        }
    }

    /// The flag, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The number, if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The text, if this is a `Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The list, if this is an `IntList`.
    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            Self::IntList(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::IntList(a), Self::IntList(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::IntList(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        Self::IntList(v)
    }
}

/// Named parameters of one stage, in declaration order.
///
/// A stage declares its parameters (with defaults) once, when it is
/// added to a pipeline. From then on only declared names can be set,
/// and only with a value of the declared kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamSet {
    values: IndexMap<String, ParamValue>,
}

impl ParamSet {
    /// An empty set.
    pub fn new() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    /// Builder-style declaration of a parameter and its default.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Insert or overwrite a value, returning the previous one.
    ///
    /// This performs no kind or change checks; the pipeline's
    /// `set_parameter` is the checked entry point.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.values.insert(name.into(), value)
    }

    /// Look up a value.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Whether `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameter is declared.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Typed lookup of a `Bool`.
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name)?.as_bool()
    }

    /// Typed lookup of an `Int`.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_int()
    }

    /// Typed lookup of a `Float`.
    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_float()
    }

    /// Typed lookup of a `Text`.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_text()
    }

    /// Typed lookup of an `IntList`.
    pub fn int_list(&self, name: &str) -> Option<&[i64]> {
        self.get(name)?.as_int_list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(ParamValue::Float(f64::NAN), ParamValue::Float(f64::NAN));
        assert_ne!(ParamValue::Float(0.0), ParamValue::Float(-0.0));
        assert_eq!(ParamValue::Float(1.5), ParamValue::from(1.5f64));
    }

    #[test]
    fn kinds_never_compare_equal() {
        assert_ne!(ParamValue::Int(1), ParamValue::Float(1.0));
        assert_ne!(ParamValue::Bool(false), ParamValue::Int(0));
    }

    #[test]
    fn set_keeps_declaration_order() {
        let set = ParamSet::new()
            .with("radius", 1i64)
            .with("scale", 2.0)
            .with("mode", "clamp");
        let names: Vec<&str> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["radius", "scale", "mode"]);
        assert_eq!(set.int("radius"), Some(1));
        assert_eq!(set.float("scale"), Some(2.0));
        assert_eq!(set.text("mode"), Some("clamp"));
        assert_eq!(set.float("radius"), None);
    }

    #[test]
    fn insert_returns_previous() {
        let mut set = ParamSet::new().with("offset", 1.0);
        let old = set.insert("offset", ParamValue::Float(2.0));
        assert_eq!(old, Some(ParamValue::Float(1.0)));
        assert_eq!(set.len(), 1);
    }
}
