use serde::{Deserialize, Serialize};

/// A reference to a spectrum within its spectrum file
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum SpectrumId {
    /// The human readable title (the `TITLE=` of an MGF file)
    Title(String),
    /// A 0-based spectrum index, used when no title is known
    Index(usize),
}

impl Default for SpectrumId {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl std::fmt::Display for SpectrumId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title(t) => write!(f, "{t}"),
            Self::Index(i) => write!(f, "index={i}"),
        }
    }
}

impl SpectrumId {
    /// Get the title if this is a title
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Title(t) => Some(t),
            Self::Index(_) => None,
        }
    }

    /// Get the index if this is an index
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Title(_) => None,
        }
    }
}

/// The key of a spectrum match: the spectrum file name (without extension) and the spectrum
/// within that file. Unique within one adapter run.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct SpectrumKey {
    /// The spectrum file, stored without its extension
    pub file: String,
    /// The spectrum within the file
    pub spectrum: SpectrumId,
}

impl SpectrumKey {
    /// Create a key for a spectrum title, the extension of the file name is removed
    pub fn from_title(file: &str, title: impl Into<String>) -> Self {
        Self {
            file: crate::helper_functions::remove_extension(file).to_string(),
            spectrum: SpectrumId::Title(title.into()),
        }
    }

    /// Create a key for a spectrum index, the extension of the file name is removed
    pub fn from_index(file: &str, index: usize) -> Self {
        Self {
            file: crate::helper_functions::remove_extension(file).to_string(),
            spectrum: SpectrumId::Index(index),
        }
    }
}

impl std::fmt::Display for SpectrumKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.spectrum)
    }
}
