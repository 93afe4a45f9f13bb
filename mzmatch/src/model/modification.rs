use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseErrorKind};
use context_error::{BoxedError, CreateError, Context};

/// One localised modification on a peptide or tag.
///
/// The site is 1-based: site 1 is the first residue (and carries N-terminal modifications), site
/// `length` is the last residue (and carries C-terminal modifications). Raw locations coming from
/// formats that use 0 and `length + 1` for the termini are remapped before a match is created,
/// see [`ModificationMatch::at_location`].
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ModificationMatch {
    tag: String,
    site: usize,
    variable: bool,
}

impl ModificationMatch {
    /// Create a modification at a 1-based site, checked against the length of the sequence
    /// # Errors
    /// If the site is 0 or beyond the end of the sequence.
    pub fn new(
        tag: impl Into<String>,
        site: usize,
        variable: bool,
        sequence_length: usize,
    ) -> Result<Self, ParseError> {
        let tag = tag.into();
        if site == 0 || site > sequence_length.max(1) {
            return Err(BoxedError::new(
                ParseErrorKind::MalformedRecord,
                "Invalid modification site",
                format!(
                    "The modification '{tag}' is placed at site {site} but the sequence only has {sequence_length} residues"
                ),
                Context::none(),
            ));
        }
        Ok(Self {
            tag,
            site,
            variable,
        })
    }

    /// Create a modification from a raw location where 0 is the N-terminus and `length + 1` the
    /// C-terminus, these are remapped to site 1 and site `length` respectively.
    /// # Errors
    /// If the location is beyond the C-terminus.
    pub fn at_location(
        tag: impl Into<String>,
        location: usize,
        variable: bool,
        sequence_length: usize,
    ) -> Result<Self, ParseError> {
        Self::new(
            tag,
            remap_terminal_location(location, sequence_length),
            variable,
            sequence_length,
        )
    }

    /// The identifying tag, either an accession or a `mass@residue` composite
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The 1-based site
    pub const fn site(&self) -> usize {
        self.site
    }

    /// If this is a variable modification (otherwise it is fixed)
    pub const fn is_variable(&self) -> bool {
        self.variable
    }

    /// If this is a fixed modification
    pub const fn is_fixed(&self) -> bool {
        !self.variable
    }
}

impl std::fmt::Display for ModificationMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}{}",
            self.tag,
            self.site,
            if self.variable { "" } else { " (fixed)" }
        )
    }
}

/// Remap raw terminal locations (0 and `length + 1`) onto the first and last residue.
pub(crate) const fn remap_terminal_location(location: usize, sequence_length: usize) -> usize {
    if location == 0 {
        1
    } else if location == sequence_length + 1 {
        sequence_length
    } else {
        location
    }
}

/// The composite tag used for modifications that are only known by mass, `mass@residue`.
pub fn mass_tag(mass: f64, residue: char) -> String {
    format!("{mass}@{residue}")
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn terminal_remapping() {
        let n = ModificationMatch::at_location("42.010565@P", 0, true, 7).unwrap();
        assert_eq!(n.site(), 1);
        let c = ModificationMatch::at_location("0.984016@E", 8, true, 7).unwrap();
        assert_eq!(c.site(), 7);
        let inside = ModificationMatch::at_location("15.9949@M", 3, true, 7).unwrap();
        assert_eq!(inside.site(), 3);
        assert!(ModificationMatch::at_location("x", 9, true, 7).is_err());
        assert!(ModificationMatch::new("x", 0, true, 7).is_err());
    }

    #[test]
    fn tags() {
        assert_eq!(mass_tag(15.9949, 'M'), "15.9949@M");
        assert_eq!(mass_tag(-17.026549, 'Q'), "-17.026549@Q");
    }
}
