//! List properties
//!
//! `key:default<min,max,step{Option A,Option B}>description`. The value is an
//! index into the option labels, so the range must start at zero.

use super::number::NumberRangeProperty;
use super::variable::find_variable;
use crate::error::{LiveprogError, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, error};

/// Integer range property with option labels
#[derive(Debug, Clone, PartialEq)]
pub struct ListProperty {
    inner: NumberRangeProperty<i64>,
    options: Vec<String>,
}

impl ListProperty {
    /// Create a list property; the range must be valid and start at zero
    pub fn new(
        key: impl Into<String>,
        description: impl Into<String>,
        default: Option<i64>,
        value: i64,
        minimum: i64,
        maximum: i64,
        options: Vec<String>,
    ) -> Result<Self> {
        let inner = NumberRangeProperty::new(key, description, default, value, minimum, maximum, 1)?;
        if minimum != 0 {
            return Err(LiveprogError::ListMinimum {
                key: inner.key().to_string(),
            });
        }
        Ok(Self { inner, options })
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Label of the selected option, if the index is covered
    pub fn selected_option(&self) -> Option<&str> {
        usize::try_from(self.inner.value())
            .ok()
            .and_then(|i| self.options.get(i))
            .map(String::as_str)
    }

    pub fn range(&self) -> &NumberRangeProperty<i64> {
        &self.inner
    }

    pub fn key(&self) -> &str {
        self.inner.key()
    }

    pub fn description(&self) -> &str {
        self.inner.description()
    }

    pub fn value(&self) -> i64 {
        self.inner.value()
    }

    pub fn set_value(&mut self, value: i64) {
        self.inner.set_value(value);
    }

    pub fn has_default(&self) -> bool {
        self.inner.has_default()
    }

    pub fn is_default(&self) -> bool {
        self.inner.is_default()
    }

    pub fn restore_default(&mut self) {
        self.inner.restore_default();
    }

    pub fn value_as_string(&self) -> String {
        self.inner.value().to_string()
    }

    pub fn manipulate(&self, contents: &str) -> Option<String> {
        self.inner.manipulate(contents)
    }

    /// Parse a declaration line, reading the live value from `contents`
    pub fn parse(line: &str, contents: &str) -> Option<Self> {
        let caps = definition_regex().captures(line)?;

        let key = caps.name("var")?.as_str();
        let desc = caps.name("desc")?.as_str().trim();
        let options: Vec<String> = caps
            .name("opt")?
            .as_str()
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
        let default = caps.name("def").and_then(|m| parse_int(m.as_str()));

        let Some(current) = find_variable(key, contents).and_then(parse_int) else {
            error!("Failed to find current value of list parameter (key={key})");
            return None;
        };

        let (Some(min), Some(max)) = (
            parse_int(caps.name("min")?.as_str()),
            parse_int(caps.name("max")?.as_str()),
        ) else {
            error!("List parameter bounds must be integers (key={key})");
            return None;
        };

        match Self::new(key, desc, default, current, min, max, options) {
            Ok(property) => {
                debug!("Found list property: {property}");
                Some(property)
            }
            Err(e) => {
                error!("Failed to parse list parameter: {e}");
                None
            }
        }
    }
}

impl fmt::Display for ListProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; options={:?}", self.inner, self.options)
    }
}

fn parse_int(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

fn definition_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?P<var>\w+):(?P<def>-?\d+\.?\d*)?<(?P<min>-?\d+\.?\d*),(?P<max>-?\d+\.?\d*),?(?P<step>-?\d+\.?\d*)?\{(?P<opt>[^\}]*)\}>(?P<desc>[\s\S][^\n]*)",
        )
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "mode:1<0,2,1{Off,Soft,Hard}>Clipping mode\n@init\nmode = 2;\n";

    #[test]
    fn parses_options_and_value() {
        let prop = ListProperty::parse("mode:1<0,2,1{Off, Soft ,Hard}>Clipping mode", SCRIPT)
            .unwrap();

        assert_eq!(prop.key(), "mode");
        assert_eq!(prop.options(), ["Off", "Soft", "Hard"]);
        assert_eq!(prop.value(), 2);
        assert_eq!(prop.selected_option(), Some("Hard"));
        assert_eq!(prop.range().step(), 1);
        assert!(!prop.is_default());
    }

    #[test]
    fn minimum_must_be_zero() {
        let err = ListProperty::new("m", "", None, 1, 1, 3, vec![]).unwrap_err();
        assert!(matches!(err, LiveprogError::ListMinimum { .. }));
    }

    #[test]
    fn range_is_checked_before_minimum() {
        let err = ListProperty::new("m", "", None, 1, 3, 1, vec![]).unwrap_err();
        assert!(matches!(err, LiveprogError::InvalidRange { .. }));
    }

    #[test]
    fn fractional_live_value_is_rejected() {
        let text = "mode:<0,2{A,B,C}>Mode\nmode = 1.5;";
        assert!(ListProperty::parse("mode:<0,2{A,B,C}>Mode", text).is_none());
    }

    #[test]
    fn value_is_always_written_as_integer() {
        let mut prop = ListProperty::parse(SCRIPT.lines().next().unwrap(), SCRIPT).unwrap();
        prop.set_value(7);
        assert_eq!(prop.value_as_string(), "2");
        assert_eq!(prop.manipulate("mode = 0;").unwrap(), "mode = 2;");
    }
}
