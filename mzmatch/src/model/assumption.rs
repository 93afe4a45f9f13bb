use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::model::{Advocate, Charge, ModificationMatch, Peptide, Tag};

/// The explanation an assumption gives for a spectrum
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Candidate {
    /// A complete peptide
    Peptide(Peptide),
    /// A partial, gapped sequence
    Tag(Tag),
}

/// One ranked candidate explaining a spectrum, from one advocate.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Assumption {
    candidate: Candidate,
    rank: u32,
    advocate: Advocate,
    charge: Charge,
    e_value: OrderedFloat<f64>,
    raw_score: Option<OrderedFloat<f64>>,
    identification_file: String,
}

impl Assumption {
    /// A peptide assumption
    pub fn peptide(
        peptide: Peptide,
        rank: u32,
        advocate: Advocate,
        charge: Charge,
        e_value: f64,
        identification_file: impl Into<String>,
    ) -> Self {
        Self::new(
            Candidate::Peptide(peptide),
            rank,
            advocate,
            charge,
            e_value,
            identification_file,
        )
    }

    /// A tag assumption
    pub fn tag(
        tag: Tag,
        rank: u32,
        advocate: Advocate,
        charge: Charge,
        e_value: f64,
        identification_file: impl Into<String>,
    ) -> Self {
        Self::new(
            Candidate::Tag(tag),
            rank,
            advocate,
            charge,
            e_value,
            identification_file,
        )
    }

    fn new(
        candidate: Candidate,
        rank: u32,
        advocate: Advocate,
        charge: Charge,
        e_value: f64,
        identification_file: impl Into<String>,
    ) -> Self {
        Self {
            candidate,
            rank,
            advocate,
            charge,
            e_value: OrderedFloat(e_value),
            raw_score: None,
            identification_file: identification_file.into(),
        }
    }

    /// Keep the original engine score next to the e-value
    #[must_use]
    pub fn with_raw_score(mut self, raw_score: Option<f64>) -> Self {
        self.raw_score = raw_score.map(OrderedFloat);
        self
    }

    /// The same assumption for another candidate, used when expanding ambiguous sequences
    #[must_use]
    pub fn with_candidate(&self, candidate: Candidate) -> Self {
        Self {
            candidate,
            ..self.clone()
        }
    }

    /// The candidate
    pub const fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    /// The peptide, if this is a peptide assumption
    pub const fn as_peptide(&self) -> Option<&Peptide> {
        match &self.candidate {
            Candidate::Peptide(p) => Some(p),
            Candidate::Tag(_) => None,
        }
    }

    /// The tag, if this is a tag assumption
    pub const fn as_tag(&self) -> Option<&Tag> {
        match &self.candidate {
            Candidate::Tag(t) => Some(t),
            Candidate::Peptide(_) => None,
        }
    }

    /// The residues of the candidate
    pub fn sequence(&self) -> &str {
        match &self.candidate {
            Candidate::Peptide(p) => p.sequence(),
            Candidate::Tag(t) => t.residues(),
        }
    }

    /// The modifications of the candidate
    pub fn modifications(&self) -> &[ModificationMatch] {
        match &self.candidate {
            Candidate::Peptide(p) => p.modifications(),
            Candidate::Tag(t) => t.modifications(),
        }
    }

    /// The rank as given by the engine, 1 is best
    pub const fn rank(&self) -> u32 {
        self.rank
    }

    /// The advocate
    pub const fn advocate(&self) -> &Advocate {
        &self.advocate
    }

    /// The charge
    pub const fn charge(&self) -> Charge {
        self.charge
    }

    /// The canonical e-value, lower is better
    pub const fn e_value(&self) -> f64 {
        self.e_value.0
    }

    /// The original engine score, if it differs from the e-value
    pub fn raw_score(&self) -> Option<f64> {
        self.raw_score.map(|s| s.0)
    }

    /// The name of the file this assumption was read from
    pub fn identification_file(&self) -> &str {
        &self.identification_file
    }
}
