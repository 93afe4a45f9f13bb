//! Decide if a located modification is one of the configured fixed modifications

use context_error::{BoxedError, CreateError, Context};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ParseError, ParseErrorKind},
    model::{ModificationMatch, mass_tag, remap_terminal_location},
};

/// The accession for an unknown modification, never used to match rules by accession
pub const UNKNOWN_MODIFICATION: &str = "MS:1001460";

/// A constraint on where a modification may occur, identified by its PSI-MS accession.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum SpecificityRule {
    /// MS:1001189, modification specificity peptide N-term
    PeptideNTerm,
    /// MS:1002057, modification specificity protein N-term
    ProteinNTerm,
    /// MS:1001190, modification specificity peptide C-term
    PeptideCTerm,
    /// MS:1002058, modification specificity protein C-term
    ProteinCTerm,
    /// MS:1001875 or MS:1001876, accepted in specificity rule lists but without a location
    /// constraint
    Unconstrained(#[serde(skip_deserializing)] &'static str),
}

impl SpecificityRule {
    /// Interpret a specificity rule accession
    /// # Errors
    /// If the accession is not a known specificity rule.
    pub fn from_accession(accession: &str) -> Result<Self, ParseError> {
        match accession.trim() {
            "MS:1001189" => Ok(Self::PeptideNTerm),
            "MS:1002057" => Ok(Self::ProteinNTerm),
            "MS:1001190" => Ok(Self::PeptideCTerm),
            "MS:1002058" => Ok(Self::ProteinCTerm),
            "MS:1001875" => Ok(Self::Unconstrained("MS:1001875")),
            "MS:1001876" => Ok(Self::Unconstrained("MS:1001876")),
            other => Err(BoxedError::new(
                ParseErrorKind::UnknownSpecificityRule,
                "Unknown specificity rule",
                format!("The specificity rule '{other}' is not recognised"),
                Context::show(other.to_string()),
            )),
        }
    }

    /// The accession
    pub const fn accession(&self) -> &'static str {
        match self {
            Self::PeptideNTerm => "MS:1001189",
            Self::ProteinNTerm => "MS:1002057",
            Self::PeptideCTerm => "MS:1001190",
            Self::ProteinCTerm => "MS:1002058",
            Self::Unconstrained(accession) => accession,
        }
    }

    /// Check a raw location (0 = N-terminus, `length + 1` = C-terminus) against this rule
    pub const fn allows(&self, location: usize, sequence_length: usize) -> bool {
        match self {
            Self::PeptideNTerm | Self::ProteinNTerm => location == 0,
            Self::PeptideCTerm | Self::ProteinCTerm => location == sequence_length + 1,
            Self::Unconstrained(_) => true,
        }
    }
}

impl TryFrom<String> for SpecificityRule {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_accession(&value).map_err(|e| e.to_string())
    }
}

impl From<SpecificityRule> for String {
    fn from(value: SpecificityRule) -> Self {
        value.accession().to_string()
    }
}

/// A fixed modification as configured for the search.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct FixedModificationRule {
    /// The accession of the modification, if known
    #[serde(default)]
    pub accession: Option<String>,
    /// The monoisotopic mass delta in Dalton
    pub mass_delta: OrderedFloat<f64>,
    /// The residues this can occur on, empty or `.` means any residue
    #[serde(default)]
    pub residues: String,
    /// The location constraints, all have to be satisfied
    #[serde(default)]
    pub specificity: Vec<SpecificityRule>,
}

impl FixedModificationRule {
    /// Create a rule with the given mass on the given residues without location constraints
    pub fn new(mass_delta: f64, residues: impl Into<String>) -> Self {
        Self {
            accession: None,
            mass_delta: OrderedFloat(mass_delta),
            residues: residues.into(),
            specificity: Vec::new(),
        }
    }

    /// Set the accession
    #[must_use]
    pub fn with_accession(mut self, accession: impl Into<String>) -> Self {
        self.accession = Some(accession.into());
        self
    }

    /// Add a location constraint
    #[must_use]
    pub fn with_specificity(mut self, rule: SpecificityRule) -> Self {
        self.specificity.push(rule);
        self
    }

    /// Check if a located modification is explained by this fixed rule
    fn matches(
        &self,
        modification: &LocatedModification<'_>,
        residue: char,
        sequence_length: usize,
        tolerance: f64,
    ) -> bool {
        let same_modification = modification
            .accession
            .is_some_and(|a| a != UNKNOWN_MODIFICATION && self.accession.as_deref() == Some(a))
            || crate::helper_functions::masses_match(
                self.mass_delta.0,
                modification.mass_delta,
                tolerance,
            );
        same_modification
            && self
                .specificity
                .iter()
                .all(|rule| rule.allows(modification.location, sequence_length))
            && (self.residues.is_empty()
                || self
                    .residues
                    .chars()
                    .any(|r| r == '.' || r.eq_ignore_ascii_case(&residue)))
    }
}

/// A modification as read from a file, before it is classified
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocatedModification<'a> {
    /// The accession, if the format gives one
    pub accession: Option<&'a str>,
    /// The mass delta in Dalton
    pub mass_delta: f64,
    /// The raw location, 0 is the N-terminus, 1 the first residue, `length + 1` the C-terminus
    pub location: usize,
}

/// Classify a modification as fixed or variable and create its [`ModificationMatch`] with a
/// `mass@residue` tag. The first fixed rule that matches wins, otherwise it is variable.
/// Terminal locations are remapped onto the first and last residue.
/// # Errors
/// If the location lies outside of the sequence (beyond the C-terminus) or the sequence is empty.
pub fn resolve_modification(
    sequence: &str,
    modification: &LocatedModification<'_>,
    fixed_rules: &[FixedModificationRule],
    tolerance: f64,
) -> Result<ModificationMatch, ParseError> {
    let length = sequence.len();
    let residue = residue_at(sequence, modification.location).ok_or_else(|| {
        BoxedError::new(
            ParseErrorKind::MalformedRecord,
            "Invalid modification location",
            format!(
                "The modification with mass {} is placed at location {} but the sequence '{sequence}' only has {length} residues",
                modification.mass_delta, modification.location
            ),
            Context::show(sequence.to_string()),
        )
    })?;
    let fixed = fixed_rules
        .iter()
        .any(|rule| rule.matches(modification, residue, length, tolerance));
    ModificationMatch::new(
        mass_tag(modification.mass_delta, residue),
        remap_terminal_location(modification.location, length),
        !fixed,
        length,
    )
}

/// The residue a raw location refers to, the termini refer to the first and last residue
fn residue_at(sequence: &str, location: usize) -> Option<char> {
    let length = sequence.len();
    let index = if location == 0 {
        0
    } else if location <= length + 1 {
        location.min(length).checked_sub(1)?
    } else {
        return None;
    };
    sequence.chars().nth(index).map(|c| c.to_ascii_uppercase())
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use context_error::*;

    const CARBAMIDOMETHYL: f64 = 57.021464;

    fn at(mass_delta: f64, location: usize) -> LocatedModification<'static> {
        LocatedModification {
            accession: None,
            mass_delta,
            location,
        }
    }

    #[test]
    fn fixed_on_residue() {
        let rules = [FixedModificationRule::new(CARBAMIDOMETHYL, "C")];
        let m = resolve_modification("PEPCK", &at(CARBAMIDOMETHYL, 4), &rules, 0.01).unwrap();
        assert!(m.is_fixed());
        assert_eq!(m.site(), 4);
        assert_eq!(m.tag(), "57.021464@C");
        // Same mass on another residue is variable
        let m = resolve_modification("PEPMK", &at(CARBAMIDOMETHYL, 4), &rules, 0.01).unwrap();
        assert!(m.is_variable());
        // Engines round differently
        let m = resolve_modification("PEPCK", &at(57.0215, 4), &rules, 0.01).unwrap();
        assert!(m.is_fixed());
    }

    #[test]
    fn accession_match() {
        let rules = [FixedModificationRule::new(57.0, "C").with_accession("UNIMOD:4")];
        let m = LocatedModification {
            accession: Some("UNIMOD:4"),
            mass_delta: CARBAMIDOMETHYL,
            location: 1,
        };
        assert!(resolve_modification("CPEPK", &m, &rules, 0.001).unwrap().is_fixed());
        let unknown = [FixedModificationRule::new(57.0, "C").with_accession(UNKNOWN_MODIFICATION)];
        let m = LocatedModification {
            accession: Some(UNKNOWN_MODIFICATION),
            mass_delta: CARBAMIDOMETHYL,
            location: 1,
        };
        assert!(resolve_modification("CPEPK", &m, &unknown, 0.001).unwrap().is_variable());
    }

    #[test]
    fn terminal_rules() {
        let n_term = [FixedModificationRule::new(42.010565, "")
            .with_specificity(SpecificityRule::from_accession("MS:1002057").unwrap())];
        let m = resolve_modification("PEPTIDE", &at(42.010565, 0), &n_term, 0.01).unwrap();
        assert!(m.is_fixed());
        assert_eq!(m.site(), 1);
        assert_eq!(m.tag(), "42.010565@P");
        // On a residue instead of the terminus the rule does not apply
        let m = resolve_modification("PEPTIDE", &at(42.010565, 1), &n_term, 0.01).unwrap();
        assert!(m.is_variable());

        let c_term = [FixedModificationRule::new(-0.984016, ".")
            .with_specificity(SpecificityRule::PeptideCTerm)];
        let m = resolve_modification("PEPTIDE", &at(-0.984016, 8), &c_term, 0.01).unwrap();
        assert!(m.is_fixed());
        assert_eq!(m.site(), 7);
        assert_eq!(m.tag(), "-0.984016@E");

        let unconstrained = [FixedModificationRule::new(15.994915, "M")
            .with_specificity(SpecificityRule::from_accession("MS:1001875").unwrap())];
        assert!(
            resolve_modification("PEMK", &at(15.994915, 3), &unconstrained, 0.01)
                .unwrap()
                .is_fixed()
        );
    }

    #[test]
    fn errors() {
        let error = SpecificityRule::from_accession("MS:0000000").unwrap_err();
        assert!(matches!(
            error.get_kind(),
            ParseErrorKind::UnknownSpecificityRule
        ));
        assert!(resolve_modification("PEP", &at(1.0, 5), &[], 0.01).is_err());
        assert!(resolve_modification("", &at(1.0, 0), &[], 0.01).is_err());
    }

    #[test]
    fn sites_are_within_sequence() {
        let sequence = "ACDEFGHIK";
        for location in 0..=sequence.len() + 1 {
            let m = resolve_modification(sequence, &at(1.0, location), &[], 0.01).unwrap();
            assert!((1..=sequence.len()).contains(&m.site()));
        }
    }

    #[test]
    fn rule_from_json() {
        let rule: FixedModificationRule = serde_json::from_str(
            r#"{"mass_delta": 57.021464, "residues": "C", "specificity": ["MS:1001875"]}"#,
        )
        .unwrap();
        assert_eq!(rule.specificity, [SpecificityRule::Unconstrained("MS:1001875")]);
        assert!(
            serde_json::from_str::<FixedModificationRule>(
                r#"{"mass_delta": 1.0, "specificity": ["MS:1"]}"#
            )
            .is_err()
        );
    }
}
