use std::{fmt::Display, path::Path};

use context_error::{BoxedError, CreateError, Context};
use serde::{Deserialize, Serialize};

use crate::{
    config::ReaderSettings,
    error::{ParseError, ParseErrorKind},
    formats::*,
    helper_functions::{ends_with_ignore_case, file_name, strip_suffix_ignore_case},
    reader::IdentificationReader,
};

/// All supported identification file formats
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum KnownFormat {
    /// Tide (Crux) tab separated target results
    Tide,
    /// MS Amanda tab separated results
    MsAmanda,
    /// Andromeda `.res` results
    Andromeda,
    /// PepNovo+ de novo tags
    PepNovo,
    /// DirecTag de novo tags
    DirecTag,
    /// mzIdentML
    MzIdentML,
}

impl KnownFormat {
    /// All formats
    pub const ALL: &[Self] = &[
        Self::Tide,
        Self::MsAmanda,
        Self::Andromeda,
        Self::PepNovo,
        Self::DirecTag,
        Self::MzIdentML,
    ];

    /// Get the name of the format
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tide => "Tide",
            Self::MsAmanda => "MS Amanda",
            Self::Andromeda => "Andromeda",
            Self::PepNovo => "PepNovo+",
            Self::DirecTag => "DirecTag",
            Self::MzIdentML => "mzIdentML",
        }
    }

    /// The canonical file name suffix
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Tide => TIDE_EXTENSION,
            Self::MsAmanda => MS_AMANDA_EXTENSION,
            Self::Andromeda => ANDROMEDA_EXTENSION,
            Self::PepNovo => PEPNOVO_EXTENSION,
            Self::DirecTag => DIREC_TAG_EXTENSION,
            Self::MzIdentML => MZIDENTML_EXTENSION,
        }
    }

    /// Check if files of this format can be read from a gzipped file
    pub const fn allows_compression(self) -> bool {
        !matches!(self, Self::DirecTag | Self::MzIdentML)
    }

    /// Find the format from a file name, ignoring case and a trailing `.gz`
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = strip_suffix_ignore_case(name, ".gz");
        Self::ALL
            .iter()
            .copied()
            .find(|format| ends_with_ignore_case(name, format.extension()))
    }
}

impl Display for KnownFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Open the selected path and determine the format from its extension. Gzipped files are
/// decompressed on the fly for the formats that are read in a single pass.
///
/// # Errors
/// If the extension is not known, or if opening the file fails.
pub fn open_identification_file(
    path: impl AsRef<Path>,
    settings: ReaderSettings,
) -> Result<Box<dyn IdentificationReader>, ParseError> {
    let path = path.as_ref();
    let format = KnownFormat::from_file_name(&file_name(path)).ok_or_else(|| {
        BoxedError::new(
            ParseErrorKind::UnknownFormat,
            "Unknown extension",
            format!(
                "Use one of {}, or any of the single pass formats as a gzipped file (eg .res.gz)",
                KnownFormat::ALL
                    .iter()
                    .map(|f| f.extension())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Context::none()
                .source(path.to_string_lossy().to_string())
                .to_owned(),
        )
    })?;
    Ok(match format {
        KnownFormat::Tide => Box::new(TideReader::open(path, settings)?),
        KnownFormat::MsAmanda => Box::new(MsAmandaReader::open(path, &settings)?),
        KnownFormat::Andromeda => Box::new(AndromedaReader::open(path, settings)?),
        KnownFormat::PepNovo => Box::new(PepNovoReader::open(path, settings)?),
        KnownFormat::DirecTag => Box::new(DirecTagReader::open(path, settings)?),
        KnownFormat::MzIdentML => Box::new(MzIdentMLReader::open(path, settings)?),
    })
}
