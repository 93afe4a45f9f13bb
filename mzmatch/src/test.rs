use std::collections::HashSet;

use crate::{
    config::{SearchConfiguration, SequenceMatchingConfiguration},
    model::{Candidate, SpectrumMatch},
    reader::IdentificationReader,
};

/// Parse a file twice (with two readers from `open`) and check it for common errors
/// # Errors
/// * If parsing fails.
/// * See errors at [`test_spectrum_match`].
/// * If the second parse does not give identical results.
pub(crate) fn test_format<R: IdentificationReader>(
    open: impl Fn() -> R,
    search: &SearchConfiguration,
    sequence_matching: Option<&SequenceMatchingConfiguration>,
    expand_ambiguous: bool,
) -> Result<Vec<SpectrumMatch>, String> {
    let mut reader = open();
    let first = reader
        .parse(&mut (), search, sequence_matching, expand_ambiguous)
        .map_err(|e| e.to_string())?;
    reader.close();

    let mut keys = HashSet::new();
    for spectrum_match in &first {
        if !keys.insert(spectrum_match.key().clone()) {
            return Err(format!(
                "Spectrum match {} occurs more than once",
                spectrum_match.key()
            ));
        }
        test_spectrum_match(spectrum_match)?;
    }

    let second = open()
        .parse(&mut (), search, sequence_matching, expand_ambiguous)
        .map_err(|e| e.to_string())?;
    if first != second {
        return Err("Parsing the same file twice gave different results".to_string());
    }
    Ok(first)
}

/// Test a spectrum match for common errors
/// # Errors
/// * If the ranks of an advocate are not monotonic within a block of hits.
/// * If any modification site lies outside of its sequence.
/// * If any e-value is negative or not finite.
/// * If a hit is filed under another advocate than its own.
pub(crate) fn test_spectrum_match(spectrum_match: &SpectrumMatch) -> Result<(), String> {
    for advocate in spectrum_match.advocates() {
        let hits = spectrum_match.hits(advocate);
        if hits.windows(2).any(|w| {
            w[0].block > w[1].block
                || (w[0].block == w[1].block && w[0].assumption.rank() > w[1].assumption.rank())
        }) {
            return Err(format!(
                "The ranks for {advocate} on {} are not monotonic within a block",
                spectrum_match.key()
            ));
        }
        for hit in hits {
            let assumption = &hit.assumption;
            if assumption.advocate() != advocate {
                return Err(format!(
                    "A hit from {} is stored under {advocate} on {}",
                    assumption.advocate(),
                    spectrum_match.key()
                ));
            }
            if !assumption.e_value().is_finite() || assumption.e_value() < 0.0 {
                return Err(format!(
                    "The e-value {} for {} on {} is invalid",
                    assumption.e_value(),
                    assumption.sequence(),
                    spectrum_match.key()
                ));
            }
            let (length, modifications) = match assumption.candidate() {
                Candidate::Peptide(p) => (p.len(), p.modifications()),
                Candidate::Tag(t) => (t.residues().len(), t.modifications()),
            };
            if let Some(m) = modifications
                .iter()
                .find(|m| m.site() == 0 || m.site() > length.max(1))
            {
                return Err(format!(
                    "The modification {m} lies outside of {} on {}",
                    assumption.sequence(),
                    spectrum_match.key()
                ));
            }
        }
    }
    Ok(())
}
