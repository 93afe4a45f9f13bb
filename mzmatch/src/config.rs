//! The configuration values threaded into every parse

use std::{any::type_name, collections::HashMap, path::Path, sync::Arc};

use context_error::{BoxedError, CreateError, Context};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{ParseError, ParseErrorKind},
    helper_functions::remove_extension,
    resolution::FixedModificationRule,
};

/// What to do when an optional column is missing from a header
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum MissingColumnPolicy {
    /// Log a warning and continue without the column
    #[default]
    Warn,
    /// Fail with a missing mandatory field error
    Fail,
    /// Silently continue without the column
    Ignore,
}

/// The search settings needed to interpret the modifications in a file.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct SearchConfiguration {
    /// The fixed modifications used in the search, all other modifications are variable
    pub fixed_modifications: Vec<FixedModificationRule>,
    /// The absolute tolerance in Dalton used to compare modification masses
    pub mass_tolerance: f64,
    /// The handling of missing optional columns
    pub missing_columns: MissingColumnPolicy,
}

impl Default for SearchConfiguration {
    fn default() -> Self {
        Self {
            fixed_modifications: Vec::new(),
            mass_tolerance: 0.01,
            missing_columns: MissingColumnPolicy::default(),
        }
    }
}

impl SearchConfiguration {
    /// Add a fixed modification
    #[must_use]
    pub fn with_fixed_modification(mut self, rule: FixedModificationRule) -> Self {
        self.fixed_modifications.push(rule);
        self
    }

    /// Load the configuration from a JSON file
    /// # Errors
    /// If the file could not be read or is not valid JSON for this structure.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        load_json(path.as_ref())
    }
}

/// The settings for indexing de novo tags
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(default)]
pub struct SequenceMatchingConfiguration {
    /// The number of residues in every key of the tag map
    pub tag_key_length: usize,
}

impl Default for SequenceMatchingConfiguration {
    fn default() -> Self {
        Self { tag_key_length: 3 }
    }
}

impl SequenceMatchingConfiguration {
    /// Load the configuration from a JSON file
    /// # Errors
    /// If the file could not be read or is not valid JSON for this structure.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        load_json(path.as_ref())
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ParseError> {
    let source = path.to_string_lossy().to_string();
    let text = std::fs::read_to_string(path).map_err(|err| {
        BoxedError::new(
            ParseErrorKind::InvalidConfiguration,
            "Could not read configuration",
            err.to_string(),
            Context::none().source(source.clone()).to_owned(),
        )
    })?;
    serde_json::from_str(&text).map_err(|err| {
        BoxedError::new(
            ParseErrorKind::InvalidConfiguration,
            format!("Invalid JSON (for {})", type_name::<T>()),
            err.to_string(),
            Context::default()
                .source(source)
                .line_index(u32::try_from(err.line().saturating_sub(1)).unwrap_or(u32::MAX))
                .lines(0, text.lines().nth(err.line().saturating_sub(1)).unwrap_or_default().to_string())
                .to_owned(),
        )
    })
}

/// Look up the title of a spectrum when the identification file only gives an index.
pub trait SpectrumTitleProvider {
    /// The title of the spectrum at the given 0-based index in the given spectrum file
    fn title(&self, spectrum_file: &str, index: usize) -> Option<String>;
}

/// Titles per spectrum file, the file can be given with or without extension
impl<S: std::hash::BuildHasher> SpectrumTitleProvider for HashMap<String, Vec<String>, S> {
    fn title(&self, spectrum_file: &str, index: usize) -> Option<String> {
        self.get(spectrum_file)
            .or_else(|| {
                let stem = remove_extension(spectrum_file);
                self.iter()
                    .find(|(file, _)| remove_extension(file) == stem)
                    .map(|(_, titles)| titles)
            })
            .and_then(|titles| titles.get(index).cloned())
    }
}

/// The default read buffer capacity, 100 KiB
pub const DEFAULT_BUFFER_CAPACITY: usize = 100 * 1024;

/// The per file settings for opening a reader
#[derive(Clone)]
pub struct ReaderSettings {
    /// The capacity of the read buffer in bytes
    pub buffer_capacity: usize,
    /// The source of spectrum titles for formats that only give indices
    pub spectrum_titles: Option<Arc<dyn SpectrumTitleProvider + Send + Sync>>,
    /// Use this as the spectrum file name instead of the one derived from the file
    pub spectrum_file: Option<String>,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            spectrum_titles: None,
            spectrum_file: None,
        }
    }
}

impl std::fmt::Debug for ReaderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSettings")
            .field("buffer_capacity", &self.buffer_capacity)
            .field("spectrum_titles", &self.spectrum_titles.is_some())
            .field("spectrum_file", &self.spectrum_file)
            .finish()
    }
}

impl ReaderSettings {
    /// Use the given spectrum titles
    #[must_use]
    pub fn with_titles(mut self, titles: impl SpectrumTitleProvider + Send + Sync + 'static) -> Self {
        self.spectrum_titles = Some(Arc::new(titles));
        self
    }

    /// Use the given spectrum file name
    #[must_use]
    pub fn with_spectrum_file(mut self, spectrum_file: impl Into<String>) -> Self {
        self.spectrum_file = Some(spectrum_file.into());
        self
    }

    /// Get the title for a spectrum, if a provider is set and knows it
    pub(crate) fn title(&self, spectrum_file: &str, index: usize) -> Option<String> {
        self.spectrum_titles
            .as_ref()
            .and_then(|p| p.title(spectrum_file, index))
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let search = SearchConfiguration::default();
        assert!(search.fixed_modifications.is_empty());
        assert_eq!(search.missing_columns, MissingColumnPolicy::Warn);
        assert_eq!(SequenceMatchingConfiguration::default().tag_key_length, 3);
        assert_eq!(ReaderSettings::default().buffer_capacity, 102_400);
    }

    #[test]
    fn from_json() {
        let search: SearchConfiguration = serde_json::from_str(
            r#"{"fixed_modifications": [{"mass_delta": 57.021464, "residues": "C"}], "missing_columns": "Fail"}"#,
        )
        .unwrap();
        assert_eq!(search.fixed_modifications.len(), 1);
        assert!((search.mass_tolerance - 0.01).abs() < f64::EPSILON);
        assert_eq!(search.missing_columns, MissingColumnPolicy::Fail);
        let matching: SequenceMatchingConfiguration =
            serde_json::from_str(r#"{"tag_key_length": 4}"#).unwrap();
        assert_eq!(matching.tag_key_length, 4);
    }

    #[test]
    fn missing_file() {
        use context_error::*;
        let error = SearchConfiguration::from_json_file("does/not/exist.json").unwrap_err();
        assert!(matches!(
            error.get_kind(),
            ParseErrorKind::InvalidConfiguration
        ));
    }

    #[test]
    fn titles() {
        let mut titles = HashMap::new();
        titles.insert(
            "run1.mgf".to_string(),
            vec!["first".to_string(), "second".to_string()],
        );
        let settings = ReaderSettings::default().with_titles(titles);
        assert_eq!(settings.title("run1.mgf", 1).as_deref(), Some("second"));
        assert_eq!(settings.title("run1", 0).as_deref(), Some("first"));
        assert_eq!(settings.title("run1.mgf", 2), None);
        assert_eq!(settings.title("run2.mgf", 0), None);
    }
}
