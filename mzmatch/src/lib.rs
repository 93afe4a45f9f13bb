#![doc = include_str!("../README.md")]

pub mod ambiguity;
pub mod config;
mod csv;
/// The error type of this crate
pub mod error;
pub mod formats;
/// Open any supported file by its extension
pub mod general;
mod helper_functions;
pub mod index;
mod io;
pub mod model;
pub mod progress;
pub mod reader;
pub mod resolution;
pub mod score;

#[cfg(test)]
mod test;

pub use crate::{
    error::{ParseError, ParseErrorKind},
    general::{KnownFormat, open_identification_file},
    model::SpectrumMatch,
    reader::IdentificationReader,
};

/// A subset of the types and traits that are envisioned to be used the most, importing this is a good starting point for working with the crate
pub mod prelude {
    pub use crate::config::{
        ReaderSettings, SearchConfiguration, SequenceMatchingConfiguration,
    };
    pub use crate::error::{ParseError, ParseErrorKind};
    pub use crate::general::{KnownFormat, open_identification_file};
    pub use crate::model::{
        Advocate, Assumption, Candidate, Charge, ModificationMatch, Peptide, SpectrumId,
        SpectrumKey, SpectrumMatch, Tag,
    };
    pub use crate::progress::{CancellationToken, ProgressHandler};
    pub use crate::reader::IdentificationReader;
    pub use crate::resolution::{FixedModificationRule, SpecificityRule};
}
