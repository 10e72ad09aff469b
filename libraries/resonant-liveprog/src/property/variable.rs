//! Lookup and patching of `key = <number>;` assignments

use regex::Regex;
use tracing::warn;

fn assignment_regex(key: &str) -> Option<Regex> {
    let pattern = format!(r"\b{}\s*=\s*(-?\d+\.?\d*)\s*;", regex::escape(key));
    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Cannot build assignment pattern for key {key}: {e}");
            None
        }
    }
}

/// Numeric literal of the first `key = <number>;` assignment in `contents`
pub(crate) fn find_variable<'a>(key: &str, contents: &'a str) -> Option<&'a str> {
    let caps = assignment_regex(key)?.captures(contents)?;
    Some(caps.get(1)?.as_str())
}

/// Replace the literal of the first assignment, leaving all other text intact
pub(crate) fn replace_variable(key: &str, value: &str, contents: &str) -> Option<String> {
    let caps = assignment_regex(key)?.captures(contents)?;
    let span = caps.get(1)?.range();

    let mut patched = String::with_capacity(contents.len() + value.len());
    patched.push_str(&contents[..span.start]);
    patched.push_str(value);
    patched.push_str(&contents[span.end..]);
    Some(patched)
}
