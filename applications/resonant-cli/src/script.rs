//! Script property inspection and editing

use anyhow::{bail, Context, Result};
use resonant_core::FileStore;
use resonant_liveprog::{LoadOptions, ScriptDocument};
use std::fmt::Write as _;
use std::sync::Arc;

/// Load `path` with its properties parsed
pub fn open(files: Arc<dyn FileStore>, path: &str) -> Result<ScriptDocument> {
    let mut document = ScriptDocument::new(files);
    document
        .load(path, LoadOptions::default())
        .with_context(|| format!("Failed to load script '{}'", path))?;
    if !document.is_loaded() {
        bail!("No script at '{}'", path);
    }
    Ok(document)
}

/// Human-readable summary of a document
pub fn render(document: &ScriptDocument) -> String {
    let mut out = String::new();
    let name = document.file_name().unwrap_or_default();
    let _ = writeln!(out, "{}", document.description().unwrap_or(name));
    if !document.tags().is_empty() {
        let _ = writeln!(out, "tags: {}", document.tags().join(", "));
    }

    if document.properties().is_empty() {
        let _ = writeln!(out, "(no properties)");
    }
    for property in document.properties() {
        let marker = if property.has_default() && !property.is_default() {
            "*"
        } else {
            " "
        };
        let _ = writeln!(
            out,
            "{} {} = {}    # {}",
            marker,
            property.key(),
            property.value_as_string(),
            property.description()
        );
    }
    out
}

/// Set one property and save the file
pub fn set(document: &mut ScriptDocument, key: &str, value: f64) -> Result<()> {
    if document.property(key).is_none() {
        bail!("Script has no property '{}'", key);
    }
    if !document.set_property_value(key, value) {
        bail!("Could not patch '{}' in the script text", key);
    }
    if !document.save() {
        bail!("Failed to save the script");
    }
    Ok(())
}

/// Restore every declared default and save the file
pub fn restore(document: &mut ScriptDocument) -> Result<()> {
    if !document.has_defaults() {
        bail!("Script declares no defaults");
    }
    if !document.restore_defaults() {
        bail!("Failed to save the script");
    }
    Ok(())
}
