//! Script source document
//!
//! Owns the text of one script file together with everything derived from
//! it: description, tags and the declared properties. Property edits are
//! applied to the text in place so the rest of the script (comments,
//! formatting) survives a round trip.

use crate::error::{LiveprogError, Result};
use crate::property::ScriptProperty;
use regex::Regex;
use resonant_core::{CoreError, FileStore};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, warn};

/// Flags for [`ScriptDocument::load`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Reparse even if the content hash is unchanged
    pub force: bool,
    /// Load the text only
    pub skip_parse: bool,
    /// Parse description and tags but no properties
    pub skip_properties: bool,
}

/// Document lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Unloaded,
    Loaded,
    /// Text modified in memory but not yet saved
    Dirty,
}

/// A loaded script and its derived metadata
pub struct ScriptDocument {
    files: Arc<dyn FileStore>,
    path: Option<PathBuf>,
    file_name: Option<String>,
    contents: Option<String>,
    description: Option<String>,
    has_description: bool,
    tags: Vec<String>,
    properties: Vec<ScriptProperty>,
    last_hash: Option<[u8; 32]>,
    dirty: bool,
}

impl ScriptDocument {
    pub fn new(files: Arc<dyn FileStore>) -> Self {
        Self {
            files,
            path: None,
            file_name: None,
            contents: None,
            description: None,
            has_description: false,
            tags: Vec::new(),
            properties: Vec::new(),
            last_hash: None,
            dirty: false,
        }
    }

    /// Load a script from the file store
    ///
    /// Returns `Ok(false)` for a blank path (document reset) and when the
    /// content is identical to the previous load and `force` is not set.
    /// A missing file resets the document and fails.
    pub fn load(&mut self, path: &str, options: LoadOptions) -> Result<bool> {
        if path.trim().is_empty() {
            self.reset();
            return Ok(false);
        }

        let resolved = self.files.resolve(path);
        let contents = match self.files.read_to_string(&resolved) {
            Ok(text) => text,
            Err(CoreError::FileNotFound(p)) => {
                error!("Script file not found '{}'", p);
                self.reset();
                return Err(LiveprogError::FileNotFound(p));
            }
            Err(e) => {
                error!("Failed to read script '{}': {}", resolved.display(), e);
                self.reset();
                return Err(e.into());
            }
        };
        debug!("Loaded script '{}'", resolved.display());

        // Unsaved edits mean the parsed properties no longer match the file
        let hash = content_hash(&contents);
        let unchanged = !self.dirty
            && self.last_hash == Some(hash)
            && self.path.as_deref() == Some(&*resolved);

        self.file_name = resolved
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned());
        self.path = Some(resolved);
        self.contents = Some(contents);
        self.dirty = false;

        if unchanged && !options.force {
            warn!("Parsing skipped; script identical with previous file");
            return Ok(false);
        }

        self.clear_derived();
        if !options.skip_parse {
            self.parse(options.skip_properties);
        }
        self.last_hash = Some(hash);
        Ok(true)
    }

    /// Reload the current file, skipping the parse if it did not change
    pub fn refresh(&mut self) -> bool {
        let Some(path) = self.path.clone() else {
            return false;
        };

        if let Err(e) = self.load(&path.to_string_lossy(), LoadOptions::default()) {
            warn!("Refreshing script failed: {}", e);
        }
        true
    }

    /// Forget the loaded file
    pub fn unload(&mut self) {
        self.reset();
    }

    /// Write the text back to the file it was loaded from
    pub fn save(&mut self) -> bool {
        let (Some(path), Some(contents)) = (&self.path, &self.contents) else {
            return false;
        };

        match self.files.write_string(path, contents) {
            Ok(()) => {
                self.dirty = false;
                self.last_hash = Some(content_hash(contents));
                true
            }
            Err(e) => {
                error!("Failed to save script '{}': {}", path.display(), e);
                false
            }
        }
    }

    /// Replace (or append) a property and patch its value into the text
    ///
    /// The document is marked dirty; call [`save`](Self::save) to persist.
    pub fn manipulate_property(&mut self, property: ScriptProperty) -> bool {
        let Some(contents) = self.contents.as_deref() else {
            return false;
        };

        debug!(
            "Manipulating property {} to value '{}'",
            property.key(),
            property.value_as_string()
        );
        let patched = property.manipulate(contents);

        match self.properties.iter_mut().find(|p| p.key() == property.key()) {
            Some(slot) => *slot = property,
            None => {
                warn!(
                    "Property {} was not found in property list; appending",
                    property.key()
                );
                self.properties.push(property);
            }
        }

        match patched {
            Some(text) => {
                self.contents = Some(text);
                self.dirty = true;
                true
            }
            None => {
                error!("Failed to patch script text; assignment not found");
                false
            }
        }
    }

    /// Set a property by key, clamping, and patch the text
    pub fn set_property_value(&mut self, key: &str, value: f64) -> bool {
        let Some(mut property) = self.property(key).cloned() else {
            warn!("Unknown script property {}", key);
            return false;
        };
        property.set_value(value);
        self.manipulate_property(property)
    }

    /// Restore every property that declares a default, then save
    ///
    /// Properties patched before a failure stay patched.
    pub fn restore_defaults(&mut self) -> bool {
        if !self.is_loaded() {
            return false;
        }

        let restored: Vec<ScriptProperty> = self
            .properties
            .iter()
            .filter(|p| p.has_default())
            .cloned()
            .map(|mut p| {
                p.restore_default();
                p
            })
            .collect();

        for property in restored {
            if !self.manipulate_property(property) {
                warn!("Restoring a default left the script text unchanged");
            }
        }
        self.save()
    }

    /// Whether any property has a default it is not currently at
    pub fn can_load_defaults(&self) -> bool {
        self.is_loaded() && self.properties.iter().any(|p| p.has_default() && !p.is_default())
    }

    pub fn has_defaults(&self) -> bool {
        self.is_loaded() && self.properties.iter().any(ScriptProperty::has_default)
    }

    /// 1-based line of a section annotation such as `@init` or `@sample`
    pub fn find_annotation_line(&self, name: &str) -> Option<usize> {
        let contents = self.contents.as_deref()?;
        contents
            .lines()
            .position(|line| {
                annotation_regex()
                    .captures(line)
                    .and_then(|c| c.get(1))
                    .is_some_and(|m| m.as_str() == name)
            })
            .map(|i| i + 1)
    }

    pub fn is_loaded(&self) -> bool {
        self.path.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn state(&self) -> DocumentState {
        match (self.is_loaded(), self.dirty) {
            (false, _) => DocumentState::Unloaded,
            (true, false) => DocumentState::Loaded,
            (true, true) => DocumentState::Dirty,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// File name without extension
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    /// `desc:` line, or the file name when the script has none
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn has_description(&self) -> bool {
        self.has_description
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn properties(&self) -> &[ScriptProperty] {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&ScriptProperty> {
        self.properties.iter().find(|p| p.key() == key)
    }

    fn parse(&mut self, skip_properties: bool) {
        let Some(contents) = self.contents.as_deref() else {
            return;
        };

        let desc = description_regex()
            .captures(contents)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string());
        self.has_description = desc.is_some();
        self.description = desc.or_else(|| {
            self.path
                .as_deref()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
        });
        debug!("Found description: {:?}", self.description);

        self.tags = tags_regex()
            .captures(contents)
            .and_then(|c| c.get(1))
            .map(|m| {
                m.as_str()
                    .split(' ')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        debug!("Found tags: {:?}", self.tags);

        if skip_properties {
            return;
        }

        self.properties = contents
            .lines()
            .filter_map(|line| ScriptProperty::parse(line, contents))
            .collect();
    }

    fn clear_derived(&mut self) {
        self.properties.clear();
        self.tags.clear();
        self.has_description = false;
        self.description = None;
        self.last_hash = None;
    }

    fn reset(&mut self) {
        self.clear_derived();
        self.path = None;
        self.file_name = None;
        self.contents = None;
        self.dirty = false;
    }
}

fn content_hash(contents: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    hasher.finalize().into()
}

fn description_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?m)^desc:([^\n]*)").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

fn tags_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?m)^[\W/]*tags:([^\n]*)")
            .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

fn annotation_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^\s*(@\w*)").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonant_core::LocalFileStore;

    const SCRIPT: &str = "desc: Soft clipper\n// tags: dynamics  clip\ngain:2<0,10,0.5>Gain control\n\n@init\ngain = 4;\n\n@sample\nspl0 = spl0 * gain;\n";

    fn document_with(text: &str) -> (tempfile::TempDir, ScriptDocument) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clipper.eel"), text).unwrap();
        let doc = ScriptDocument::new(Arc::new(LocalFileStore::new(dir.path())));
        (dir, doc)
    }

    #[test]
    fn parses_metadata() {
        let (_dir, mut doc) = document_with(SCRIPT);
        assert!(doc.load("clipper.eel", LoadOptions::default()).unwrap());

        assert_eq!(doc.file_name(), Some("clipper"));
        assert_eq!(doc.description(), Some("Soft clipper"));
        assert!(doc.has_description());
        assert_eq!(doc.tags(), ["dynamics", "clip"]);
        assert_eq!(doc.properties().len(), 1);
        assert_eq!(doc.state(), DocumentState::Loaded);
    }

    #[test]
    fn description_defaults_to_file_name() {
        let (_dir, mut doc) = document_with("@sample\nspl0 = 0;\n");
        doc.load("clipper.eel", LoadOptions::default()).unwrap();

        assert!(!doc.has_description());
        assert_eq!(doc.description(), Some("clipper.eel"));
        assert!(doc.tags().is_empty());
    }

    #[test]
    fn blank_path_resets() {
        let (_dir, mut doc) = document_with(SCRIPT);
        doc.load("clipper.eel", LoadOptions::default()).unwrap();

        assert!(!doc.load("  ", LoadOptions::default()).unwrap());
        assert_eq!(doc.state(), DocumentState::Unloaded);
        assert!(doc.properties().is_empty());
    }

    #[test]
    fn skip_properties_keeps_metadata_only() {
        let (_dir, mut doc) = document_with(SCRIPT);
        let options = LoadOptions {
            skip_properties: true,
            ..LoadOptions::default()
        };
        doc.load("clipper.eel", options).unwrap();

        assert_eq!(doc.description(), Some("Soft clipper"));
        assert!(doc.properties().is_empty());
    }

    #[test]
    fn annotation_lines_are_one_based() {
        let (_dir, mut doc) = document_with(SCRIPT);
        doc.load("clipper.eel", LoadOptions::default()).unwrap();

        assert_eq!(doc.find_annotation_line("@init"), Some(5));
        assert_eq!(doc.find_annotation_line("@sample"), Some(8));
        assert_eq!(doc.find_annotation_line("@gfx"), None);
    }

    #[test]
    fn manipulate_marks_dirty_without_saving() {
        let (dir, mut doc) = document_with(SCRIPT);
        doc.load("clipper.eel", LoadOptions::default()).unwrap();

        assert!(doc.set_property_value("gain", 7.0));
        assert!(doc.is_dirty());
        assert!(doc.contents().unwrap().contains("gain = 7.00;"));

        let on_disk = std::fs::read_to_string(dir.path().join("clipper.eel")).unwrap();
        assert!(on_disk.contains("gain = 4;"));
    }

    #[test]
    fn unknown_property_is_rejected() {
        let (_dir, mut doc) = document_with(SCRIPT);
        doc.load("clipper.eel", LoadOptions::default()).unwrap();
        assert!(!doc.set_property_value("missing", 1.0));
        assert!(!doc.is_dirty());
    }

    #[test]
    fn save_requires_a_loaded_file() {
        let (_dir, mut doc) = document_with(SCRIPT);
        assert!(!doc.save());
    }
}
