use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

use crate::{error::ParseError, model::ModificationMatch};

/// A fully sequenced candidate peptide with its modifications.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Peptide {
    sequence: String,
    modifications: ThinVec<ModificationMatch>,
}

impl Peptide {
    /// Create a peptide, the sequence is stored in uppercase
    /// # Errors
    /// If any modification site lies outside of the sequence.
    pub fn new(
        sequence: impl Into<String>,
        modifications: impl IntoIterator<Item = ModificationMatch>,
    ) -> Result<Self, ParseError> {
        let sequence = sequence.into().to_ascii_uppercase();
        let modifications: ThinVec<_> = modifications.into_iter().collect();
        for m in &modifications {
            // Rebuilding checks the site against this sequence
            ModificationMatch::new(m.tag(), m.site(), m.is_variable(), sequence.len())?;
        }
        Ok(Self {
            sequence,
            modifications,
        })
    }

    /// The amino acid sequence
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// The number of residues
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// If this peptide has no residues
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// All modifications, both fixed and variable
    pub fn modifications(&self) -> &[ModificationMatch] {
        &self.modifications
    }

    /// Only the variable modifications
    pub fn variable_modifications(&self) -> impl Iterator<Item = &ModificationMatch> {
        self.modifications.iter().filter(|m| m.is_variable())
    }

    /// Only the fixed modifications
    pub fn fixed_modifications(&self) -> impl Iterator<Item = &ModificationMatch> {
        self.modifications.iter().filter(|m| m.is_fixed())
    }
}

impl std::fmt::Display for Peptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sequence)
    }
}

/// A partially sequenced candidate: a run of residues flanked by unexplained mass gaps.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Tag {
    n_gap: OrderedFloat<f64>,
    residues: String,
    c_gap: OrderedFloat<f64>,
    modifications: ThinVec<ModificationMatch>,
}

impl Tag {
    /// Create a tag, modification sites are relative to the residues of the tag
    /// # Errors
    /// If any modification site lies outside of the residues.
    pub fn new(
        n_gap: f64,
        residues: impl Into<String>,
        c_gap: f64,
        modifications: impl IntoIterator<Item = ModificationMatch>,
    ) -> Result<Self, ParseError> {
        let residues = residues.into().to_ascii_uppercase();
        let modifications: ThinVec<_> = modifications.into_iter().collect();
        for m in &modifications {
            ModificationMatch::new(m.tag(), m.site(), m.is_variable(), residues.len())?;
        }
        Ok(Self {
            n_gap: OrderedFloat(n_gap),
            residues,
            c_gap: OrderedFloat(c_gap),
            modifications,
        })
    }

    /// The unexplained mass before the residues
    pub fn n_gap(&self) -> f64 {
        self.n_gap.0
    }

    /// The sequenced residues
    pub fn residues(&self) -> &str {
        &self.residues
    }

    /// The unexplained mass after the residues
    pub fn c_gap(&self) -> f64 {
        self.c_gap.0
    }

    /// The modifications on the residues
    pub fn modifications(&self) -> &[ModificationMatch] {
        &self.modifications
    }

    /// All windows of `length` consecutive residues, used as keys when indexing tags
    pub fn keys(&self, length: usize) -> impl Iterator<Item = &str> {
        let end = if length == 0 {
            0
        } else {
            (self.residues.len() + 1).saturating_sub(length)
        };
        (0..end).filter_map(move |start| self.residues.get(start..start + length))
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{:.3}>{}<{:.3}>",
            self.n_gap.0, self.residues, self.c_gap.0
        )
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn peptide_sites() {
        let m = ModificationMatch::new("15.9949@M", 3, true, 6).unwrap();
        let peptide = Peptide::new("tamagk", [m.clone()]).unwrap();
        assert_eq!(peptide.sequence(), "TAMAGK");
        assert_eq!(peptide.variable_modifications().count(), 1);
        assert!(Peptide::new("TA", [m]).is_err());
    }

    #[test]
    fn tag_keys() {
        let tag = Tag::new(100.0, "PEPTI", 0.0, []).unwrap();
        assert_eq!(tag.keys(3).collect::<Vec<_>>(), ["PEP", "EPT", "PTI"]);
        assert_eq!(tag.keys(5).count(), 1);
        assert_eq!(tag.keys(6).count(), 0);
        assert_eq!(tag.keys(0).count(), 0);
    }
}
