//! Number-range properties
//!
//! Declared in script text as `key:default<min,max,step>description`, where
//! `default` and `step` are optional. The live value is read from a separate
//! `key = <number>;` assignment elsewhere in the script.

use super::variable::{find_variable, replace_variable};
use crate::error::{LiveprogError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, error};

/// Step used when a declaration omits it
pub const DEFAULT_STEP: f64 = 0.1;

/// Relative tolerance comparison used for floating point defaults
///
/// `|a - b| < 1e-5 * max(|a|, |b|)`; note that two zeros are *not* equal under
/// this rule, callers check exact equality first.
pub fn equals_delta(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.00001 * a.abs().max(b.abs())
}

/// Numeric types a range property can hold
pub trait PropertyNumber:
    Copy + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    fn to_f64(self) -> f64;

    /// Equality used by `is_default`
    fn matches(self, other: Self) -> bool;
}

impl PropertyNumber for f64 {
    fn to_f64(self) -> f64 {
        self
    }

    fn matches(self, other: Self) -> bool {
        self == other || equals_delta(self, other)
    }
}

impl PropertyNumber for i64 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn matches(self, other: Self) -> bool {
        self == other
    }
}

/// Bounded, steppable numeric script variable
#[derive(Debug, Clone, PartialEq)]
pub struct NumberRangeProperty<T: PropertyNumber> {
    key: String,
    description: String,
    default: Option<T>,
    value: T,
    minimum: T,
    maximum: T,
    step: T,
}

impl<T: PropertyNumber> NumberRangeProperty<T> {
    /// Create a property; fails unless `minimum < maximum`
    ///
    /// The initial value is clamped into the range.
    pub fn new(
        key: impl Into<String>,
        description: impl Into<String>,
        default: Option<T>,
        value: T,
        minimum: T,
        maximum: T,
        step: T,
    ) -> Result<Self> {
        let key = key.into();
        if minimum.partial_cmp(&maximum) != Some(Ordering::Less) {
            return Err(LiveprogError::InvalidRange { key });
        }

        let mut property = Self {
            key,
            description: description.into(),
            default,
            value,
            minimum,
            maximum,
            step,
        };
        property.value = property.validate_range(value);
        Ok(property)
    }

    /// Clamp a value into `[minimum, maximum]`
    ///
    /// Unordered input (NaN) maps to the minimum.
    pub fn validate_range(&self, input: T) -> T {
        match input.partial_cmp(&self.minimum) {
            Some(Ordering::Less) | None => self.minimum,
            _ => match input.partial_cmp(&self.maximum) {
                Some(Ordering::Greater) => self.maximum,
                _ => input,
            },
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn value(&self) -> T {
        self.value
    }

    /// Set the value, clamping into range
    pub fn set_value(&mut self, value: T) {
        self.value = self.validate_range(value);
    }

    pub fn default_value(&self) -> Option<T> {
        self.default
    }

    pub fn minimum(&self) -> T {
        self.minimum
    }

    pub fn maximum(&self) -> T {
        self.maximum
    }

    pub fn step(&self) -> T {
        self.step
    }

    /// Whether the value should be written without decimals
    pub fn handle_as_int(&self) -> bool {
        let step = self.step.to_f64();
        equals_delta(step, step.floor())
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_default(&self) -> bool {
        self.default.is_some_and(|default| default.matches(self.value))
    }

    /// Reset the value to the declared default, if any
    pub fn restore_default(&mut self) {
        if let Some(default) = self.default {
            self.value = self.validate_range(default);
        }
    }

    /// Text written back into the script
    pub fn value_as_string(&self) -> String {
        if self.handle_as_int() {
            (self.value.to_f64() as i64).to_string()
        } else {
            format!("{:.2}", self.value.to_f64())
        }
    }

    /// Patch the backing assignment in `contents`
    ///
    /// Returns `None` when the assignment cannot be found.
    pub fn manipulate(&self, contents: &str) -> Option<String> {
        replace_variable(&self.key, &self.value_as_string(), contents)
    }
}

impl<T: PropertyNumber> fmt::Display for NumberRangeProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key={}; desc={}; value={}; handleAsInt={}; default={:?}; min={}; max={}; step={}",
            self.key,
            self.description,
            self.value,
            self.handle_as_int(),
            self.default,
            self.minimum,
            self.maximum,
            self.step
        )
    }
}

fn definition_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?P<var>\w+):(?P<def>-?\d+\.?\d*)?<(?P<min>-?\d+\.?\d*),(?P<max>-?\d+\.?\d*),?(?P<step>-?\d+\.?\d*)?>(?P<desc>[\s\S][^\n]*)",
        )
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

impl NumberRangeProperty<f64> {
    /// Parse a declaration line, reading the live value from `contents`
    pub fn parse(line: &str, contents: &str) -> Option<Self> {
        let caps = definition_regex().captures(line)?;

        let key = caps.name("var")?.as_str();
        let min = caps.name("min")?.as_str();
        let max = caps.name("max")?.as_str();
        let desc = caps.name("desc")?.as_str().trim();
        let default = caps.name("def").and_then(|m| m.as_str().parse::<f64>().ok());
        let step = caps
            .name("step")
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(DEFAULT_STEP);

        let Some(current) = find_variable(key, contents).and_then(|v| v.parse::<f64>().ok())
        else {
            error!("Failed to find current value of number range parameter (key={key})");
            return None;
        };

        let (Ok(min), Ok(max)) = (min.parse::<f64>(), max.parse::<f64>()) else {
            error!("Failed to parse number range bounds (key={key})");
            return None;
        };

        match Self::new(key, desc, default, current, min, max, step) {
            Ok(property) => {
                debug!("Found number range property: {property}");
                Some(property)
            }
            Err(e) => {
                error!("Failed to parse number range parameter: {e}");
                None
            }
        }
    }
}
