//! Script properties
//!
//! A script exposes tunable variables by pairing a declaration line
//! (`gain:2<0,10,0.5>Gain control`) with an ordinary assignment
//! (`gain = 4;`). The declaration describes bounds and defaults; the
//! assignment holds the live value and is patched in place on edits.

mod list;
mod number;
mod variable;

pub use list::ListProperty;
pub use number::{equals_delta, NumberRangeProperty, PropertyNumber, DEFAULT_STEP};

use std::fmt;

/// Any property a script can declare
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptProperty {
    NumberRange(NumberRangeProperty<f64>),
    List(ListProperty),
}

impl ScriptProperty {
    /// Parse one declaration line; number ranges win over lists
    pub fn parse(line: &str, contents: &str) -> Option<Self> {
        NumberRangeProperty::parse(line, contents)
            .map(Self::NumberRange)
            .or_else(|| ListProperty::parse(line, contents).map(Self::List))
    }

    pub fn key(&self) -> &str {
        match self {
            Self::NumberRange(p) => p.key(),
            Self::List(p) => p.key(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::NumberRange(p) => p.description(),
            Self::List(p) => p.description(),
        }
    }

    pub fn has_default(&self) -> bool {
        match self {
            Self::NumberRange(p) => p.has_default(),
            Self::List(p) => p.has_default(),
        }
    }

    pub fn is_default(&self) -> bool {
        match self {
            Self::NumberRange(p) => p.is_default(),
            Self::List(p) => p.is_default(),
        }
    }

    pub fn restore_default(&mut self) {
        match self {
            Self::NumberRange(p) => p.restore_default(),
            Self::List(p) => p.restore_default(),
        }
    }

    /// Current value as `f64`
    pub fn value(&self) -> f64 {
        match self {
            Self::NumberRange(p) => p.value(),
            Self::List(p) => p.value() as f64,
        }
    }

    /// Write a new value; lists truncate towards zero, both clamp
    pub fn set_value(&mut self, value: f64) {
        match self {
            Self::NumberRange(p) => p.set_value(value),
            Self::List(p) => {
                if value.is_nan() {
                    p.set_value(p.range().minimum());
                } else {
                    p.set_value(value as i64);
                }
            }
        }
    }

    pub fn value_as_string(&self) -> String {
        match self {
            Self::NumberRange(p) => p.value_as_string(),
            Self::List(p) => p.value_as_string(),
        }
    }

    /// Patch the backing assignment; `None` leaves the caller's text unchanged
    pub fn manipulate(&self, contents: &str) -> Option<String> {
        match self {
            Self::NumberRange(p) => p.manipulate(contents),
            Self::List(p) => p.manipulate(contents),
        }
    }
}

impl fmt::Display for ScriptProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumberRange(p) => fmt::Display::fmt(p, f),
            Self::List(p) => fmt::Display::fmt(p, f),
        }
    }
}

impl From<NumberRangeProperty<f64>> for ScriptProperty {
    fn from(value: NumberRangeProperty<f64>) -> Self {
        Self::NumberRange(value)
    }
}

impl From<ListProperty> for ScriptProperty {
    fn from(value: ListProperty) -> Self {
        Self::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_prefers_number_range() {
        let text = "gain:<0,1>Gain\ngain = 0.5;";
        assert!(matches!(
            ScriptProperty::parse("gain:<0,1>Gain", text),
            Some(ScriptProperty::NumberRange(_))
        ));
    }

    #[test]
    fn factory_falls_back_to_list() {
        let text = "mode:<0,1{A,B}>Mode\nmode = 1;";
        assert!(matches!(
            ScriptProperty::parse("mode:<0,1{A,B}>Mode", text),
            Some(ScriptProperty::List(_))
        ));
    }

    #[test]
    fn ordinary_lines_are_not_properties() {
        assert!(ScriptProperty::parse("spl0 = spl0 * gain;", "spl0 = spl0 * gain;").is_none());
        assert!(ScriptProperty::parse("// just a comment", "").is_none());
    }

    #[test]
    fn list_set_value_truncates_and_clamps() {
        let text = "mode:<0,2{A,B,C}>Mode\nmode = 0;";
        let mut prop = ScriptProperty::parse("mode:<0,2{A,B,C}>Mode", text).unwrap();

        prop.set_value(1.9);
        assert_eq!(prop.value(), 1.0);

        prop.set_value(50.0);
        assert_eq!(prop.value(), 2.0);

        prop.set_value(f64::NAN);
        assert_eq!(prop.value(), 0.0);
    }
}
