//! The shared interface of all identification file readers and the state they share while parsing

use std::fmt::Display;

use context_error::{BoxedError, CreateError, Context};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::{
    ambiguity::{expand_peptide, has_ambiguity},
    config::{SearchConfiguration, SequenceMatchingConfiguration},
    error::{ParseError, ParseErrorKind},
    model::{Assumption, Candidate, SpectrumKey, SpectrumMatch},
    progress::ProgressHandler,
};

/// The software named in a file, with all versions found for it
pub type SoftwareVersions = IndexMap<String, Vec<String>>;

/// Every tag key (a window of residues of a tag) with the spectra that have a tag containing it
pub type TagMap = IndexMap<String, Vec<SpectrumKey>>;

/// Add a software (with optional version) without creating duplicates
pub(crate) fn add_software_version(
    versions: &mut SoftwareVersions,
    name: impl Into<String>,
    version: Option<&str>,
) {
    let list = versions.entry(name.into()).or_default();
    if let Some(version) = version.map(str::trim).filter(|v| !v.is_empty())
        && !list.iter().any(|v| v == version)
    {
        list.push(version.to_string());
    }
}

/// A reader for one identification file.
pub trait IdentificationReader {
    /// The canonical file name suffix for this format
    fn extension(&self) -> &'static str;

    /// Read all spectrum matches from the file. A reader is bound to one file and can be parsed
    /// only once, the file is closed afterwards. When the progress handler requests
    /// cancellation all spectrum matches completed up to then are returned.
    /// # Errors
    /// If the file is malformed, misses mandatory fields, uses unknown scores or specificity
    /// rules, or cannot be read.
    fn parse(
        &mut self,
        progress: &mut dyn ProgressHandler,
        search: &SearchConfiguration,
        sequence_matching: Option<&SequenceMatchingConfiguration>,
        expand_ambiguous: bool,
    ) -> Result<Vec<SpectrumMatch>, ParseError>;

    /// Release the underlying file, calling this more than once is fine
    fn close(&mut self);

    /// The software (and versions) that produced the file
    fn software_versions(&self) -> &SoftwareVersions;

    /// Check if this reader produces de novo tags
    fn has_de_novo_tags(&self) -> bool {
        false
    }

    /// The tag map, only built for tag producing formats when a sequence matching configuration
    /// was given to [`Self::parse`]
    fn tags_by_key(&self) -> Option<&TagMap> {
        None
    }

    /// Free the tag map
    fn clear_tags_map(&mut self) {}
}

/// The steps every reader goes through
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ParserState {
    /// Nothing read yet
    #[default]
    Start,
    /// Reading format banners and versions
    ParsingHeader,
    /// Reading the search settings stored in the file
    ParsingParameters,
    /// Reading spectra and hits
    ParsingRecords,
    /// Storing the last spectrum match
    Flush,
    /// Done
    Completed,
    /// Stopped on an error
    Failed,
}

impl Display for ParserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl ParserState {
    /// Move to the next state
    pub(crate) fn advance(&mut self, next: Self, source: &str) {
        if *self != next {
            debug!(source, from = %self, to = %next, "parser state");
            *self = next;
        }
    }

    /// Track the outcome of a parse, any error moves to [`Self::Failed`]
    pub(crate) fn track<T>(
        &mut self,
        source: &str,
        result: Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        match result {
            Ok(value) => {
                self.advance(Self::Completed, source);
                Ok(value)
            }
            Err(error) => {
                self.advance(Self::Failed, source);
                Err(error)
            }
        }
    }
}

/// Error for a reader that is used after it was closed
pub(crate) fn closed_error(source: &str) -> ParseError {
    BoxedError::new(
        ParseErrorKind::IO,
        "Reader closed",
        "This reader was already parsed or closed, open the file again to read it again",
        Context::none().source(source.to_string()).to_owned(),
    )
}

/// Collects spectrum matches while parsing. One match is pending at a time, it is flushed when a
/// record for another spectrum starts. Flushed matches for the same key are merged, matches are
/// returned in the order they were first seen.
#[derive(Debug)]
pub(crate) struct MatchCollector {
    pending: Option<SpectrumMatch>,
    flushed: IndexMap<SpectrumKey, SpectrumMatch>,
    expand_ambiguous: bool,
    tag_key_length: Option<usize>,
    tags: TagMap,
}

impl MatchCollector {
    pub(crate) fn new(
        expand_ambiguous: bool,
        sequence_matching: Option<&SequenceMatchingConfiguration>,
    ) -> Self {
        Self {
            pending: None,
            flushed: IndexMap::new(),
            expand_ambiguous,
            tag_key_length: sequence_matching.map(|c| c.tag_key_length),
            tags: TagMap::new(),
        }
    }

    /// Make the match for this key the pending one, the previous pending match is flushed if it
    /// is for another spectrum
    pub(crate) fn start(
        &mut self,
        key: SpectrumKey,
        spectrum_number: Option<usize>,
        progress: &mut dyn ProgressHandler,
    ) {
        if self.pending.as_ref().is_some_and(|m| *m.key() == key) {
            return;
        }
        self.flush(progress);
        self.pending = Some(SpectrumMatch::new(key).with_spectrum_number(spectrum_number));
    }

    /// Check if there is a pending match
    pub(crate) const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Store the pending match, a match for a key that was flushed before is merged into it
    pub(crate) fn flush(&mut self, progress: &mut dyn ProgressHandler) {
        let Some(spectrum_match) = self.pending.take() else {
            return;
        };
        if let Some(length) = self.tag_key_length {
            for assumption in spectrum_match.tag_assumptions() {
                if let Candidate::Tag(tag) = assumption.candidate() {
                    for key in tag.keys(length) {
                        let spectra = self.tags.entry(key.to_string()).or_default();
                        if !spectra.contains(spectrum_match.key()) {
                            spectra.push(spectrum_match.key().clone());
                        }
                    }
                }
            }
        }
        progress.spectrum_flushed(spectrum_match.key());
        if let Some(existing) = self.flushed.get_mut(spectrum_match.key()) {
            existing.merge(spectrum_match);
        } else {
            self.flushed
                .insert(spectrum_match.key().clone(), spectrum_match);
        }
    }

    fn pending_match(&mut self, assumption: &Assumption) -> Result<&mut SpectrumMatch, ParseError> {
        self.pending.as_mut().ok_or_else(|| {
            BoxedError::new(
                ParseErrorKind::MalformedRecord,
                "Hit outside of a spectrum",
                format!(
                    "A hit for '{}' was found before any spectrum was started",
                    assumption.sequence()
                ),
                Context::none(),
            )
        })
    }

    /// Add a peptide assumption to the pending match. When expanding ambiguous sequences every
    /// concrete sequence is added instead of the original, only the first as primary hit.
    /// # Errors
    /// If there is no pending match or the rank is out of order.
    pub(crate) fn add_peptide(&mut self, assumption: Assumption) -> Result<(), ParseError> {
        let expand = self.expand_ambiguous
            && assumption
                .as_peptide()
                .is_some_and(|p| has_ambiguity(p.sequence()));
        let pending = self.pending_match(&assumption)?;
        if let Some(peptide) = assumption.as_peptide().filter(|_| expand) {
            for (index, concrete) in expand_peptide(peptide).enumerate() {
                pending.add_hit(
                    assumption.advocate().clone(),
                    assumption.with_candidate(Candidate::Peptide(concrete?)),
                    index == 0,
                )?;
            }
            Ok(())
        } else {
            pending.add_assumption(assumption)
        }
    }

    /// Add a tag assumption to the pending match
    /// # Errors
    /// If there is no pending match or the rank is out of order.
    pub(crate) fn add_tag(&mut self, assumption: Assumption) -> Result<(), ParseError> {
        self.pending_match(&assumption)?.add_assumption(assumption)
    }

    /// The final flush, returns all matches in first seen order and the tag map (if requested)
    pub(crate) fn finish(
        mut self,
        source: &str,
        progress: &mut dyn ProgressHandler,
    ) -> (Vec<SpectrumMatch>, Option<TagMap>) {
        self.flush(progress);
        info!(
            source,
            spectrum_matches = self.flushed.len(),
            hits = self.flushed.values().map(SpectrumMatch::len).sum::<usize>(),
            "parsed identification file"
        );
        self.into_parts()
    }

    /// Stop early, the pending match is discarded as it might not be complete
    pub(crate) fn cancel(mut self, source: &str) -> (Vec<SpectrumMatch>, Option<TagMap>) {
        if let Some(pending) = self.pending.take() {
            debug!(source, spectrum = %pending.key(), "discarded incomplete spectrum match");
        }
        tracing::warn!(
            source,
            spectrum_matches = self.flushed.len(),
            "parsing cancelled"
        );
        self.into_parts()
    }

    fn into_parts(self) -> (Vec<SpectrumMatch>, Option<TagMap>) {
        (
            self.flushed.into_values().collect(),
            self.tag_key_length.map(|_| self.tags),
        )
    }
}
