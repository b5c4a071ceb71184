//! Conversion parameters: typed declarations and submitted values.
//!
//! Each [`ConversionTarget`](super::ConversionTarget) declares an ordered list of
//! parameters. A declaration is a [`ParameterSpec`]: a label plus a closed
//! [`ParamKind`] that carries the function turning a submitted value into an
//! instruction fragment for the model.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Submitted parameter values, keyed by parameter name.
pub type ParamValues = HashMap<String, ParamValue>;

/// A single submitted parameter value.
///
/// Deserializes untagged, so both `{"typescript": true}` and
/// `{"typescript": "on"}` are accepted.
///
/// # Examples
///
/// ```
/// use codeshift::query::ParamValue;
///
/// assert!(ParamValue::Bool(true).is_truthy());
/// assert!(ParamValue::from("on").is_truthy());
/// assert!(!ParamValue::from("yes").is_truthy());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Text(String),
}

impl ParamValue {
    /// Coerces the value to a boolean.
    ///
    /// Only the canonical `"true"` and `"on"` strings count as true; every
    /// other string (including `"1"` and `"yes"`) is false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => s == "true" || s == "on",
        }
    }

    /// Returns the value as a string, rendering booleans as `"true"`/`"false"`.
    pub fn as_text(&self) -> &str {
        match self {
            Self::Bool(true) => "true",
            Self::Bool(false) => "false",
            Self::Text(s) => s.as_str(),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

/// The shape of a parameter, together with its rendering function.
#[derive(Clone, Copy)]
pub enum ParamKind {
    /// An on/off switch.
    Boolean { render: fn(bool) -> String },
    /// One value out of a fixed set.
    Enumerated {
        values: &'static [&'static str],
        render: fn(&str) -> String,
    },
}

impl fmt::Debug for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean { .. } => f.write_str("Boolean"),
            Self::Enumerated { values, .. } => f.debug_tuple("Enumerated").field(values).finish(),
        }
    }
}

/// A declared parameter of a conversion target.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub label: &'static str,
    pub kind: ParamKind,
}

impl ParameterSpec {
    /// Declares a boolean parameter.
    pub const fn boolean(label: &'static str, render: fn(bool) -> String) -> Self {
        Self {
            label,
            kind: ParamKind::Boolean { render },
        }
    }

    /// Declares an enumerated parameter accepting only `values`.
    pub const fn enumerated(
        label: &'static str,
        values: &'static [&'static str],
        render: fn(&str) -> String,
    ) -> Self {
        Self {
            label,
            kind: ParamKind::Enumerated { values, render },
        }
    }

    /// Renders a submitted value into an instruction fragment.
    ///
    /// Returns `None` when an enumerated parameter receives a value outside
    /// its allowed set. Boolean parameters always render.
    pub fn render(&self, value: &ParamValue) -> Option<String> {
        match self.kind {
            ParamKind::Boolean { render } => Some(render(value.is_truthy())),
            ParamKind::Enumerated { values, render } => {
                let value = value.as_text();
                values.contains(&value).then(|| render(value))
            }
        }
    }
}
