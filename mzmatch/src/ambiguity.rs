//! Expand sequences with ambiguous residue codes into all concrete sequences they stand for

use crate::{
    error::ParseError,
    model::{ModificationMatch, Peptide},
};

/// The twenty standard amino acids, the options for `X`
pub const STANDARD_RESIDUES: &[char] = &[
    'A', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'V', 'W',
    'Y',
];

/// The concrete residues an ambiguity code stands for, `None` if this is not an ambiguity code
pub fn ambiguity_options(residue: char) -> Option<&'static [char]> {
    match residue.to_ascii_uppercase() {
        'B' => Some(&['D', 'N']),
        'Z' => Some(&['E', 'Q']),
        'J' => Some(&['I', 'L']),
        'X' => Some(STANDARD_RESIDUES),
        _ => None,
    }
}

/// Check if a sequence contains any ambiguity codes
pub fn has_ambiguity(sequence: &str) -> bool {
    sequence.chars().any(|c| ambiguity_options(c).is_some())
}

/// A lazy iterator over all concrete sequences of an ambiguous sequence, in the order of a
/// Cartesian product where the last ambiguous position changes fastest. Cloning or calling
/// [`Combinations::restart`] starts from the beginning again.
#[derive(Clone, Debug)]
pub struct Combinations {
    sequence: Vec<char>,
    /// The position in the sequence and the options for every ambiguous position
    positions: Vec<(usize, &'static [char])>,
    /// The current option for every ambiguous position, `None` when exhausted
    counters: Option<Vec<usize>>,
}

impl Combinations {
    /// Set up the combinations for a sequence, a sequence without ambiguity codes gives itself
    pub fn new(sequence: &str) -> Self {
        let sequence: Vec<char> = sequence.chars().collect();
        let positions: Vec<_> = sequence
            .iter()
            .enumerate()
            .filter_map(|(i, c)| ambiguity_options(*c).map(|o| (i, o)))
            .collect();
        Self {
            counters: Some(vec![0; positions.len()]),
            sequence,
            positions,
        }
    }

    /// The total number of combinations
    pub fn total(&self) -> usize {
        self.positions.iter().map(|(_, o)| o.len()).product()
    }

    /// Start over from the first combination
    pub fn restart(&mut self) {
        self.counters = Some(vec![0; self.positions.len()]);
    }
}

impl Iterator for Combinations {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let counters = self.counters.as_mut()?;
        let mut result = self.sequence.clone();
        for ((position, options), counter) in self.positions.iter().zip(counters.iter()) {
            result[*position] = options[*counter];
        }
        // Odometer increment, rightmost position first
        let mut exhausted = true;
        for ((_, options), counter) in self.positions.iter().zip(counters.iter_mut()).rev() {
            *counter += 1;
            if *counter < options.len() {
                exhausted = false;
                break;
            }
            *counter = 0;
        }
        if exhausted {
            self.counters = None;
        }
        Some(result.into_iter().collect())
    }
}

/// Expand a peptide into all concrete peptides. Every peptide gets a copy of the original
/// modifications at the same sites, they are not resolved again for the new residues.
/// # Errors
/// Only if a modification would lie outside of the sequence, which cannot happen as the
/// expanded sequences have the same length.
pub fn expand_peptide(
    peptide: &Peptide,
) -> impl Iterator<Item = Result<Peptide, ParseError>> + '_ {
    let modifications: &[ModificationMatch] = peptide.modifications();
    Combinations::new(peptide.sequence())
        .map(move |sequence| Peptide::new(sequence, modifications.iter().cloned()))
}
