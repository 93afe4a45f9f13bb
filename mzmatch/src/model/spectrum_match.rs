use std::collections::BTreeMap;

use context_error::{BoxedError, CreateError, Context};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ParseError, ParseErrorKind},
    model::{Advocate, Assumption, SpectrumKey},
};

/// An assumption as stored on a spectrum match
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Hit {
    /// The assumption
    pub assumption: Assumption,
    /// If this is the representative hit, hits created by expanding an ambiguous sequence are
    /// all non-primary except the first so they can be collapsed downstream
    pub primary: bool,
    /// The contiguous block of hits of one charge this hit was read in, counted per advocate.
    /// Ranks only have to be non-decreasing within a block, engines restart ranking for every
    /// charge state and a spectrum that is listed again later starts a new block as well.
    pub block: u32,
}

/// All assumptions, from any advocate, for one experimental spectrum.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SpectrumMatch {
    key: SpectrumKey,
    spectrum_number: Option<usize>,
    hits: BTreeMap<Advocate, Vec<Hit>>,
}

impl SpectrumMatch {
    /// Create an empty spectrum match
    pub const fn new(key: SpectrumKey) -> Self {
        Self {
            key,
            spectrum_number: None,
            hits: BTreeMap::new(),
        }
    }

    /// Set the spectrum number
    #[must_use]
    pub const fn with_spectrum_number(mut self, number: Option<usize>) -> Self {
        self.spectrum_number = number;
        self
    }

    /// The key
    pub const fn key(&self) -> &SpectrumKey {
        &self.key
    }

    /// The spectrum number (scan number or 1-based position in the spectrum file), if the format gives one
    pub const fn spectrum_number(&self) -> Option<usize> {
        self.spectrum_number
    }

    /// Append a hit for an advocate. Ranks are kept as given by the engine. A hit with another
    /// charge than the previous hit of this advocate starts a new block, within a block the
    /// ranks have to be non-decreasing.
    /// # Errors
    /// If the rank of this assumption is lower than the last rank in the same block.
    pub fn add_hit(
        &mut self,
        advocate: Advocate,
        assumption: Assumption,
        primary: bool,
    ) -> Result<(), ParseError> {
        let hits = self.hits.entry(advocate).or_default();
        let block = match hits.last() {
            None => 0,
            Some(last) if last.assumption.charge() != assumption.charge() => last.block + 1,
            Some(last) if last.assumption.rank() <= assumption.rank() => last.block,
            Some(last) => {
                return Err(BoxedError::new(
                    ParseErrorKind::MalformedRecord,
                    "Rank out of order",
                    format!(
                        "Spectrum '{}' got a hit with rank {} after a hit with rank {} from {} at charge {}",
                        self.key,
                        assumption.rank(),
                        last.assumption.rank(),
                        assumption.advocate(),
                        assumption.charge(),
                    ),
                    Context::none(),
                ));
            }
        };
        hits.push(Hit {
            assumption,
            primary,
            block,
        });
        Ok(())
    }

    /// Append a primary hit under the advocate of the assumption
    /// # Errors
    /// See [`Self::add_hit`].
    pub fn add_assumption(&mut self, assumption: Assumption) -> Result<(), ParseError> {
        self.add_hit(assumption.advocate().clone(), assumption, true)
    }

    /// Merge all hits from another match for the same spectrum into this one, the hits of every
    /// advocate are appended as new blocks
    pub fn merge(&mut self, other: Self) {
        if self.spectrum_number.is_none() {
            self.spectrum_number = other.spectrum_number;
        }
        for (advocate, hits) in other.hits {
            let existing = self.hits.entry(advocate).or_default();
            let offset = existing.last().map_or(0, |hit| hit.block + 1);
            existing.extend(hits.into_iter().map(|mut hit| {
                hit.block += offset;
                hit
            }));
        }
    }

    /// All advocates with hits
    pub fn advocates(&self) -> impl Iterator<Item = &Advocate> {
        self.hits.keys()
    }

    /// The hits of one advocate in insertion (file) order
    pub fn hits(&self, advocate: &Advocate) -> &[Hit] {
        self.hits.get(advocate).map_or(&[], Vec::as_slice)
    }

    /// All hits, grouped by advocate
    pub fn all_hits(&self) -> impl Iterator<Item = (&Advocate, &Hit)> {
        self.hits
            .iter()
            .flat_map(|(advocate, hits)| hits.iter().map(move |hit| (advocate, hit)))
    }

    /// All assumptions that explain the spectrum with a full peptide
    pub fn peptide_assumptions(&self) -> impl Iterator<Item = &Assumption> {
        self.all_hits()
            .map(|(_, h)| &h.assumption)
            .filter(|a| a.as_peptide().is_some())
    }

    /// All assumptions that explain the spectrum with a tag
    pub fn tag_assumptions(&self) -> impl Iterator<Item = &Assumption> {
        self.all_hits()
            .map(|(_, h)| &h.assumption)
            .filter(|a| a.as_tag().is_some())
    }

    /// The total number of hits
    pub fn len(&self) -> usize {
        self.hits.values().map(Vec::len).sum()
    }

    /// Check if there are no hits at all
    pub fn is_empty(&self) -> bool {
        self.hits.values().all(Vec::is_empty)
    }
}
