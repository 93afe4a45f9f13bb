use std::{
    collections::HashMap,
    fmt::Display,
    fs::File,
    io::{BufRead, BufReader, Seek, SeekFrom},
    path::Path,
    str::FromStr,
};

use context_error::{BoxedError, CreateError, Context};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use tracing::debug;

use crate::{
    config::{ReaderSettings, SearchConfiguration, SequenceMatchingConfiguration},
    error::{ParseError, ParseErrorKind, io_error},
    helper_functions::file_name,
    io::open_seekable,
    model::{Advocate, AdvocateRegistry, Assumption, Charge, Peptide, SpectrumKey, SpectrumMatch},
    progress::{ProgressHandler, ProgressScale},
    reader::{
        IdentificationReader, MatchCollector, ParserState, SoftwareVersions,
        add_software_version, closed_error,
    },
    resolution::{FixedModificationRule, LocatedModification, SpecificityRule, resolve_modification},
    score::normalise_score,
};

/// The canonical extension of mzIdentML files
pub const MZIDENTML_EXTENSION: &str = ".mzid";

/// Modification index, listed on search modifications but not a modification itself
const MODIFICATION_INDEX: &str = "MS:1002504";
/// Spectrum title
const SPECTRUM_TITLE: &str = "MS:1000796";

/// A reader for mzIdentML files.
///
/// The file is read in two passes. The first pass collects everything that spectrum results
/// refer to: the analysis software, the peptides with their modifications, the spectra data
/// files and the fixed search modifications. The second pass reads the spectrum identification
/// results and resolves all references by lookup, so no element order is assumed.
///
/// Scores are normalised with [`crate::score::SCORE_TABLE`]. Hits scored with a generic score
/// (like a PSM-level q-value) are attributed to the first known software named in the file,
/// otherwise to a user advocate with the name of the first software, otherwise to
/// [`Advocate::GenericMzIdentML`].
#[derive(Debug)]
pub struct MzIdentMLReader<R> {
    reader: Option<R>,
    file_name: String,
    length: Option<u64>,
    settings: ReaderSettings,
    advocates: AdvocateRegistry,
    versions: SoftwareVersions,
    state: ParserState,
}

impl MzIdentMLReader<BufReader<File>> {
    /// Open an mzIdentML file, it cannot be compressed
    /// # Errors
    /// If the file could not be opened or is gzipped.
    pub fn open(path: impl AsRef<Path>, settings: ReaderSettings) -> Result<Self, ParseError> {
        let (reader, length) = open_seekable(path.as_ref(), settings.buffer_capacity)?;
        Ok(Self::from_reader(reader, file_name(path), length, settings))
    }
}

impl<R: BufRead + Seek> MzIdentMLReader<R> {
    /// Read mzIdentML data from any seekable buffered reader
    pub fn from_reader(
        reader: R,
        file_name: impl Into<String>,
        length: Option<u64>,
        settings: ReaderSettings,
    ) -> Self {
        Self {
            reader: Some(reader),
            file_name: file_name.into(),
            length,
            settings,
            advocates: AdvocateRegistry::default(),
            versions: SoftwareVersions::new(),
            state: ParserState::Start,
        }
    }

    /// Use this registry for software that is not a known advocate, so that user advocates get
    /// the same index over multiple files
    #[must_use]
    pub fn with_advocates(mut self, advocates: AdvocateRegistry) -> Self {
        self.advocates = advocates;
        self
    }

    /// The registry with all user advocates seen so far
    pub const fn advocates(&self) -> &AdvocateRegistry {
        &self.advocates
    }

    fn parse_records(
        &mut self,
        progress: &mut dyn ProgressHandler,
        search: &SearchConfiguration,
        sequence_matching: Option<&SequenceMatchingConfiguration>,
        expand_ambiguous: bool,
    ) -> Result<Vec<SpectrumMatch>, ParseError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| closed_error(&self.file_name))?;
        let collector = MatchCollector::new(expand_ambiguous, sequence_matching);
        // Both passes read the whole file
        let mut scale = ProgressScale::start(self.length.map(|l| l * 2), progress);

        self.state
            .advance(ParserState::ParsingParameters, &self.file_name);
        let mut references = ReferenceHandler::default();
        if !walk(
            &mut *reader,
            &self.file_name,
            0,
            &mut references,
            progress,
            &mut scale,
        )? {
            return Ok(collector.cancel(&self.file_name).0);
        }
        let references = references.references;
        for (name, version) in &references.software {
            // Known software is stored under its advocate name, hits are attributed to that name
            let known = Advocate::from_name(name);
            let name = known.as_ref().map_or(name.as_str(), Advocate::name);
            add_software_version(&mut self.versions, name, version.as_deref());
        }
        let generic = references.generic_advocate(&mut self.advocates);
        let rules: Vec<FixedModificationRule> = references
            .fixed
            .iter()
            .chain(&search.fixed_modifications)
            .cloned()
            .collect();
        debug!(
            source = %self.file_name,
            peptides = references.peptides.len(),
            spectra_data = references.spectra_data.len(),
            fixed_modifications = references.fixed.len(),
            generic_advocate = %generic,
            "read mzIdentML references"
        );

        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| io_error(&e, &self.file_name))?;
        self.state
            .advance(ParserState::ParsingRecords, &self.file_name);
        let mut results = ResultHandler {
            references: &references,
            rules: &rules,
            tolerance: search.mass_tolerance,
            generic,
            settings: &self.settings,
            source: &self.file_name,
            collector,
            result: None,
            advocates: Vec::new(),
        };
        let completed = walk(
            &mut *reader,
            &self.file_name,
            self.length.unwrap_or_default(),
            &mut results,
            progress,
            &mut scale,
        )?;
        let ResultHandler {
            collector,
            advocates,
            ..
        } = results;
        if !completed {
            return Ok(collector.cancel(&self.file_name).0);
        }
        for advocate in &advocates {
            add_software_version(&mut self.versions, advocate.name(), None);
        }

        self.state.advance(ParserState::Flush, &self.file_name);
        let (matches, _) = collector.finish(&self.file_name, progress);
        scale.finish(progress);
        Ok(matches)
    }
}

impl<R: BufRead + Seek> IdentificationReader for MzIdentMLReader<R> {
    fn extension(&self) -> &'static str {
        MZIDENTML_EXTENSION
    }

    fn parse(
        &mut self,
        progress: &mut dyn ProgressHandler,
        search: &SearchConfiguration,
        sequence_matching: Option<&SequenceMatchingConfiguration>,
        expand_ambiguous: bool,
    ) -> Result<Vec<SpectrumMatch>, ParseError> {
        let result = self.parse_records(progress, search, sequence_matching, expand_ambiguous);
        self.close();
        let source = self.file_name.clone();
        self.state.track(&source, result)
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn software_versions(&self) -> &SoftwareVersions {
        &self.versions
    }
}

/// Receives the elements of one pass over the file
trait ElementHandler {
    /// An element starts, `parent` is the enclosing element
    fn open(&mut self, element: &BytesStart<'_>, parent: Option<&[u8]>) -> Result<(), ParseError>;

    /// Text directly inside `element`
    fn text(&mut self, _element: &[u8], _text: &str) {}

    /// An element ends, self closing elements are closed right after they are opened
    fn close(
        &mut self,
        element: &[u8],
        progress: &mut dyn ProgressHandler,
    ) -> Result<(), ParseError>;
}

/// Feed all elements in the file to the handler. Returns false when cancelled. The `offset` is
/// added to the position for progress reporting.
fn walk<B: BufRead>(
    inner: B,
    source: &str,
    offset: u64,
    handler: &mut impl ElementHandler,
    progress: &mut dyn ProgressHandler,
    scale: &mut ProgressScale,
) -> Result<bool, ParseError> {
    let mut xml = Reader::from_reader(inner);
    xml.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    loop {
        let position = xml.buffer_position();
        let event = xml
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(e, source, position))?;
        match event {
            Event::Start(e) => {
                if progress.is_cancelled() {
                    return Ok(false);
                }
                handler.open(&e, path.last().map(Vec::as_slice))?;
                path.push(e.local_name().as_ref().to_vec());
            }
            Event::Empty(e) => {
                handler.open(&e, path.last().map(Vec::as_slice))?;
                handler.close(e.local_name().as_ref(), progress)?;
            }
            Event::Text(t) => {
                if let Some(element) = path.last() {
                    let text = t.decode().map_err(|e| xml_error(e, source, position))?;
                    handler.text(element, &text);
                }
            }
            Event::End(e) => {
                path.pop();
                handler.close(e.local_name().as_ref(), progress)?;
            }
            Event::Eof => break,
            _ => (),
        }
        scale.update(offset + xml.buffer_position(), progress);
        buf.clear();
    }
    Ok(true)
}

fn xml_error(error: impl Display, source: &str, position: u64) -> ParseError {
    BoxedError::new(
        ParseErrorKind::MalformedRecord,
        "Invalid XML",
        format!("The XML is not well formed near byte {position}: {error}"),
        Context::none().source(source).to_owned(),
    )
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .with_checks(false)
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
}

fn required(element: &BytesStart<'_>, name: &'static str) -> Result<String, ParseError> {
    attribute(element, name.as_bytes()).ok_or_else(|| {
        BoxedError::new(
            ParseErrorKind::MissingMandatoryField,
            "Missing attribute",
            format!(
                "The attribute '{name}' is required on '{}'",
                String::from_utf8_lossy(element.local_name().as_ref())
            ),
            Context::show(String::from_utf8_lossy(element).to_string()),
        )
    })
}

fn required_number<T: FromStr>(
    element: &BytesStart<'_>,
    name: &'static str,
) -> Result<T, ParseError> {
    let value = required(element, name)?;
    value.parse().map_err(|_| {
        BoxedError::new(
            ParseErrorKind::MalformedRecord,
            "Invalid attribute",
            format!("The attribute '{name}' has to be a number but is '{value}'"),
            Context::show(String::from_utf8_lossy(element).to_string()),
        )
    })
}

fn missing_reference(kind: &str, id: &str, source: &str) -> ParseError {
    BoxedError::new(
        ParseErrorKind::MalformedRecord,
        "Unknown reference",
        format!("The {kind} '{id}' is referenced but not defined in this file"),
        Context::none().source(source).to_owned(),
    )
}

#[derive(Debug, Default)]
struct PeptideRecord {
    sequence: String,
    modifications: Vec<ModificationRecord>,
}

#[derive(Debug)]
struct ModificationRecord {
    accession: Option<String>,
    mass_delta: f64,
    location: usize,
}

#[derive(Debug)]
struct SearchModification {
    fixed: bool,
    mass_delta: f64,
    residues: String,
    specificity: Vec<SpecificityRule>,
    accessions: Vec<String>,
}

impl SearchModification {
    /// One rule per modification accession
    fn into_rules(self) -> Vec<FixedModificationRule> {
        let mut rule = FixedModificationRule::new(self.mass_delta, self.residues);
        rule.specificity = self.specificity;
        if self.accessions.is_empty() {
            vec![rule]
        } else {
            self.accessions
                .into_iter()
                .map(|accession| rule.clone().with_accession(accession))
                .collect()
        }
    }
}

/// Everything spectrum results refer to
#[derive(Debug, Default)]
struct References {
    software: Vec<(String, Option<String>)>,
    peptides: HashMap<String, PeptideRecord>,
    spectra_data: HashMap<String, String>,
    fixed: Vec<FixedModificationRule>,
}

impl References {
    fn generic_advocate(&self, registry: &mut AdvocateRegistry) -> Advocate {
        self.software
            .iter()
            .find_map(|(name, _)| Advocate::from_name(name))
            .or_else(|| {
                self.software
                    .first()
                    .map(|(name, _)| registry.get_or_register(name))
            })
            .unwrap_or(Advocate::GenericMzIdentML)
    }
}

#[derive(Debug, Default)]
struct ReferenceHandler {
    references: References,
    software_version: Option<String>,
    peptide: Option<(String, PeptideRecord)>,
    search_modification: Option<SearchModification>,
}

impl ElementHandler for ReferenceHandler {
    fn open(&mut self, element: &BytesStart<'_>, parent: Option<&[u8]>) -> Result<(), ParseError> {
        match (element.local_name().as_ref(), parent) {
            (b"AnalysisSoftware", _) => {
                self.software_version = attribute(element, b"version").filter(|v| !v.is_empty());
            }
            (b"cvParam" | b"userParam", Some(b"SoftwareName")) => {
                if let Some(name) = attribute(element, b"name").filter(|n| !n.is_empty()) {
                    self.references
                        .software
                        .push((name, self.software_version.clone()));
                }
            }
            (b"Peptide", _) => {
                self.peptide = Some((required(element, "id")?, PeptideRecord::default()));
            }
            (b"Modification", Some(b"Peptide")) => {
                let modification = ModificationRecord {
                    accession: None,
                    mass_delta: required_number(element, "monoisotopicMassDelta")?,
                    location: required_number(element, "location")?,
                };
                if let Some((_, peptide)) = &mut self.peptide {
                    peptide.modifications.push(modification);
                }
            }
            (b"cvParam", Some(b"Modification")) => {
                // Only the first term names the modification
                if let Some(modification) = self
                    .peptide
                    .as_mut()
                    .and_then(|(_, p)| p.modifications.last_mut())
                    && modification.accession.is_none()
                {
                    modification.accession = attribute(element, b"accession");
                }
            }
            (b"SpectraData", _) => {
                if let Some(id) = attribute(element, b"id") {
                    let name = attribute(element, b"name")
                        .filter(|n| !n.is_empty())
                        .or_else(|| attribute(element, b"location"));
                    if let Some(name) = name {
                        self.references.spectra_data.insert(id, name);
                    }
                }
            }
            (b"SearchModification", _) => {
                self.search_modification = Some(SearchModification {
                    fixed: attribute(element, b"fixedMod")
                        .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1"),
                    mass_delta: required_number(element, "massDelta")?,
                    residues: attribute(element, b"residues")
                        .unwrap_or_default()
                        .split_whitespace()
                        .collect(),
                    specificity: Vec::new(),
                    accessions: Vec::new(),
                });
            }
            (b"cvParam", Some(b"SpecificityRules")) => {
                if let Some(modification) = &mut self.search_modification
                    && let Some(accession) = attribute(element, b"accession")
                {
                    modification
                        .specificity
                        .push(SpecificityRule::from_accession(&accession)?);
                }
            }
            (b"cvParam", Some(b"SearchModification")) => {
                if let Some(modification) = &mut self.search_modification
                    && let Some(accession) = attribute(element, b"accession")
                    && accession != MODIFICATION_INDEX
                {
                    modification.accessions.push(accession);
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn text(&mut self, element: &[u8], text: &str) {
        if element == b"PeptideSequence"
            && let Some((_, peptide)) = &mut self.peptide
        {
            peptide.sequence.push_str(text.trim());
        }
    }

    fn close(
        &mut self,
        element: &[u8],
        _progress: &mut dyn ProgressHandler,
    ) -> Result<(), ParseError> {
        match element {
            b"AnalysisSoftware" => self.software_version = None,
            b"Peptide" => {
                if let Some((id, mut peptide)) = self.peptide.take() {
                    peptide.sequence.make_ascii_uppercase();
                    self.references.peptides.insert(id, peptide);
                }
            }
            b"SearchModification" => {
                if let Some(modification) = self.search_modification.take()
                    && modification.fixed
                {
                    self.references.fixed.extend(modification.into_rules());
                }
            }
            _ => (),
        }
        Ok(())
    }
}

#[derive(Debug)]
struct SpectrumResult {
    spectra_data: String,
    spectrum_id: String,
    title: Option<String>,
    items: Vec<ItemRecord>,
}

#[derive(Debug)]
struct ItemRecord {
    rank: u32,
    peptide: String,
    charge: i32,
    scores: HashMap<String, f64>,
}

struct ResultHandler<'a> {
    references: &'a References,
    rules: &'a [FixedModificationRule],
    tolerance: f64,
    generic: Advocate,
    settings: &'a ReaderSettings,
    source: &'a str,
    collector: MatchCollector,
    result: Option<SpectrumResult>,
    /// The advocates hits were attributed to, in order of first use
    advocates: Vec<Advocate>,
}

impl ResultHandler<'_> {
    fn store(
        &mut self,
        mut result: SpectrumResult,
        progress: &mut dyn ProgressHandler,
    ) -> Result<(), ParseError> {
        let spectrum_file = self
            .references
            .spectra_data
            .get(&result.spectra_data)
            .ok_or_else(|| missing_reference("SpectraData", &result.spectra_data, self.source))?;
        let index = result
            .spectrum_id
            .strip_prefix("index=")
            .and_then(|i| i.trim().parse::<usize>().ok());
        let key = match (result.title, index) {
            (Some(title), _) => SpectrumKey::from_title(spectrum_file, title),
            (None, Some(index)) => self.settings.title(spectrum_file, index).map_or_else(
                || SpectrumKey::from_index(spectrum_file, index),
                |title| SpectrumKey::from_title(spectrum_file, title),
            ),
            (None, None) => SpectrumKey::from_title(spectrum_file, result.spectrum_id),
        };
        self.collector.start(key, index.map(|i| i + 1), progress);

        result.items.sort_by_key(|item| item.rank);
        for item in result.items {
            let peptide = self
                .references
                .peptides
                .get(&item.peptide)
                .ok_or_else(|| missing_reference("Peptide", &item.peptide, self.source))?;
            let score = normalise_score(&item.scores, || self.generic.clone())?;
            if !self.advocates.contains(&score.advocate) {
                self.advocates.push(score.advocate.clone());
            }
            let modifications = peptide
                .modifications
                .iter()
                .map(|m| {
                    resolve_modification(
                        &peptide.sequence,
                        &LocatedModification {
                            accession: m.accession.as_deref(),
                            mass_delta: m.mass_delta,
                            location: m.location,
                        },
                        self.rules,
                        self.tolerance,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;
            self.collector.add_peptide(
                Assumption::peptide(
                    Peptide::new(peptide.sequence.clone(), modifications)?,
                    item.rank,
                    score.advocate,
                    Charge::from_signed(item.charge),
                    score.e_value,
                    self.source,
                )
                .with_raw_score(score.raw_score),
            )?;
        }
        Ok(())
    }
}

impl ElementHandler for ResultHandler<'_> {
    fn open(&mut self, element: &BytesStart<'_>, parent: Option<&[u8]>) -> Result<(), ParseError> {
        match (element.local_name().as_ref(), parent) {
            (b"SpectrumIdentificationResult", _) => {
                self.result = Some(SpectrumResult {
                    spectra_data: required(element, "spectraData_ref")?,
                    spectrum_id: required(element, "spectrumID")?,
                    title: None,
                    items: Vec::new(),
                });
            }
            (b"SpectrumIdentificationItem", Some(b"SpectrumIdentificationResult")) => {
                let item = ItemRecord {
                    rank: required_number(element, "rank")?,
                    peptide: required(element, "peptide_ref")?,
                    charge: required_number(element, "chargeState")?,
                    scores: HashMap::new(),
                };
                if let Some(result) = &mut self.result {
                    result.items.push(item);
                }
            }
            (b"cvParam", Some(b"SpectrumIdentificationItem")) => {
                // Terms without a numeric value are not scores
                if let Some(item) = self.result.as_mut().and_then(|r| r.items.last_mut())
                    && let Some(accession) = attribute(element, b"accession")
                    && let Some(value) =
                        attribute(element, b"value").and_then(|v| v.parse::<f64>().ok())
                {
                    item.scores.insert(accession, value);
                }
            }
            (b"cvParam", Some(b"SpectrumIdentificationResult")) => {
                if let Some(result) = &mut self.result {
                    let is_title = attribute(element, b"accession")
                        .is_some_and(|a| a == SPECTRUM_TITLE)
                        || attribute(element, b"name")
                            .is_some_and(|n| n.eq_ignore_ascii_case("spectrum title"));
                    if is_title {
                        result.title = attribute(element, b"value").filter(|t| !t.is_empty());
                    }
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn close(
        &mut self,
        element: &[u8],
        progress: &mut dyn ProgressHandler,
    ) -> Result<(), ParseError> {
        if element == b"SpectrumIdentificationResult"
            && let Some(result) = self.result.take()
        {
            self.store(result, progress)?;
        }
        Ok(())
    }
}
