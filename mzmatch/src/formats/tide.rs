use std::{io::BufRead, path::Path};

use context_error::{BoxedError, CreateError};

use crate::{
    config::{ReaderSettings, SearchConfiguration, SequenceMatchingConfiguration},
    csv::{ColumnSpec, Columns, CsvHeader, CsvLine},
    error::{ParseError, ParseErrorKind},
    helper_functions::{file_name, strip_suffix_ignore_case},
    io::{Line, LineReader, SequentialReader, open_sequential},
    model::{Advocate, Assumption, Charge, Peptide, SpectrumKey, SpectrumMatch},
    progress::{ProgressHandler, ProgressScale},
    reader::{
        IdentificationReader, MatchCollector, ParserState, SoftwareVersions,
        add_software_version, closed_error,
    },
    resolution::{LocatedModification, resolve_modification},
    score::Conversion,
};

/// The canonical extension of Tide result files
pub const TIDE_EXTENSION: &str = ".tide-search.target.txt";

const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required("scan", &["scan"]),
    ColumnSpec::required("charge", &["charge"]),
    ColumnSpec::required("rank", &["xcorr rank"]),
    ColumnSpec::required("sequence", &["sequence"]),
    ColumnSpec::optional("xcorr", &["xcorr score"]),
    ColumnSpec::optional("p-value", &["exact p-value"]),
];

/// The e-value given to hits with a negative xcorr
const NEGATIVE_XCORR_E_VALUE: f64 = 100.0;

/// A reader for Tide tab separated search results.
///
/// Every row is one peptide for a scan, rows for the same scan do not have to be adjacent. The
/// scan is the 0-based index of the spectrum in the spectrum file, its title is looked up with
/// the spectrum title provider if one is given.
#[derive(Debug)]
pub struct TideReader<R> {
    reader: Option<LineReader<R>>,
    file_name: String,
    length: Option<u64>,
    settings: ReaderSettings,
    versions: SoftwareVersions,
    state: ParserState,
}

impl TideReader<SequentialReader> {
    /// Open a Tide file, it can be gzipped
    /// # Errors
    /// If the file could not be opened.
    pub fn open(path: impl AsRef<Path>, settings: ReaderSettings) -> Result<Self, ParseError> {
        let (reader, length) = open_sequential(path.as_ref(), settings.buffer_capacity)?;
        Ok(Self::from_reader(
            reader,
            file_name(path),
            length,
            settings,
        ))
    }
}

impl<R: BufRead> TideReader<R> {
    /// Read Tide data from any buffered reader, the file name is used to find the spectrum file
    pub fn from_reader(
        reader: R,
        file_name: impl Into<String>,
        length: Option<u64>,
        settings: ReaderSettings,
    ) -> Self {
        let file_name = file_name.into();
        let mut versions = SoftwareVersions::new();
        add_software_version(&mut versions, Advocate::Tide.name(), None);
        Self {
            reader: Some(LineReader::new(reader, file_name.clone())),
            file_name,
            length,
            settings,
            versions,
            state: ParserState::Start,
        }
    }

    /// The spectrum file the scans refer to, Tide names its output after the spectrum file
    fn spectrum_file(&self) -> String {
        self.settings.spectrum_file.clone().unwrap_or_else(|| {
            let name = strip_suffix_ignore_case(&self.file_name, ".gz");
            format!("{}.mgf", strip_suffix_ignore_case(name, TIDE_EXTENSION))
        })
    }

    fn parse_records(
        &mut self,
        progress: &mut dyn ProgressHandler,
        search: &SearchConfiguration,
        sequence_matching: Option<&SequenceMatchingConfiguration>,
        expand_ambiguous: bool,
    ) -> Result<Vec<SpectrumMatch>, ParseError> {
        let spectrum_file = self.spectrum_file();
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| closed_error(&self.file_name))?;
        self.state.advance(ParserState::ParsingHeader, &self.file_name);
        let header = CsvHeader::read(reader, b'\t')?;
        let columns = Columns::resolve(&header, COLUMNS, search.missing_columns)?;
        if !columns.has("p-value") && !columns.has("xcorr") {
            return Err(BoxedError::new(
                ParseErrorKind::MissingMandatoryField,
                "Missing score column",
                "A Tide file needs either an 'exact p-value' or an 'xcorr score' column",
                context_error::Context::none()
                    .source(self.file_name.clone())
                    .to_owned(),
            ));
        }

        self.state.advance(ParserState::ParsingRecords, &self.file_name);
        let mut collector = MatchCollector::new(expand_ambiguous, sequence_matching);
        let mut scale = ProgressScale::start(self.length, progress);
        loop {
            if progress.is_cancelled() {
                return Ok(collector.cancel(&self.file_name).0);
            }
            let Some(line) = reader.next_line()? else {
                break;
            };
            if line.text.trim().is_empty() {
                continue;
            }
            scale.update(line.offset, progress);
            let row = CsvLine::new(line, header.separator());

            let scan: usize = row.parse(&columns, "scan")?;
            let key = self.settings.title(&spectrum_file, scan).map_or_else(
                || SpectrumKey::from_index(&spectrum_file, scan),
                |title| SpectrumKey::from_title(&spectrum_file, title),
            );
            collector.start(key, Some(scan), progress);

            let p_value = row.parse_optional::<f64>(&columns, "p-value")?;
            let (e_value, raw_score) = if let Some(p_value) = p_value {
                (p_value, p_value)
            } else {
                let xcorr: f64 = row.parse(&columns, "xcorr")?;
                let e_value = if xcorr < 0.0 {
                    NEGATIVE_XCORR_E_VALUE
                } else {
                    Conversion::PowerTenNegative.apply(xcorr)
                };
                (e_value, xcorr)
            };

            let (sequence, masses) =
                parse_inline_masses(row.field(&columns, "sequence")?, row.line())?;
            let modifications = masses
                .into_iter()
                .map(|(mass_delta, location)| {
                    resolve_modification(
                        &sequence,
                        &LocatedModification {
                            accession: None,
                            mass_delta,
                            location,
                        },
                        &search.fixed_modifications,
                        search.mass_tolerance,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;
            let assumption = Assumption::peptide(
                Peptide::new(sequence, modifications)?,
                row.parse(&columns, "rank")?,
                Advocate::Tide,
                row.parse::<Charge>(&columns, "charge")?,
                e_value,
                self.file_name.clone(),
            )
            .with_raw_score(Some(raw_score));
            collector.add_peptide(assumption)?;
        }
        self.state.advance(ParserState::Flush, &self.file_name);
        let (matches, _) = collector.finish(&self.file_name, progress);
        scale.finish(progress);
        Ok(matches)
    }
}

/// Split a sequence with inline masses (`TAM[15.9949]AGK`) into the bare sequence and the masses
/// with their raw location (0 for a mass before the first residue)
pub(crate) fn parse_inline_masses(
    text: &str,
    line: &Line<'_>,
) -> Result<(String, Vec<(f64, usize)>), ParseError> {
    let mut sequence = String::with_capacity(text.len());
    let mut masses = Vec::new();
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if c == '[' {
            let Some(end) = rest.find(']') else {
                return Err(BoxedError::new(
                    ParseErrorKind::MalformedRecord,
                    "Invalid modification",
                    "A modification is opened with '[' but never closed",
                    line.part_context(rest),
                ));
            };
            let mass = rest[1..end].trim().parse::<f64>().map_err(|_| {
                BoxedError::new(
                    ParseErrorKind::MalformedRecord,
                    "Invalid modification",
                    "The modification mass is not a number",
                    line.part_context(&rest[1..end]),
                )
            })?;
            masses.push((mass, sequence.len()));
            rest = &rest[end + 1..];
        } else if c.is_ascii_alphabetic() {
            sequence.push(c.to_ascii_uppercase());
            rest = &rest[1..];
        } else {
            return Err(BoxedError::new(
                ParseErrorKind::MalformedRecord,
                "Invalid sequence",
                format!("The character '{c}' is not an amino acid"),
                line.part_context(&rest[..c.len_utf8()]),
            ));
        }
    }
    Ok((sequence, masses))
}

impl<R: BufRead> IdentificationReader for TideReader<R> {
    fn extension(&self) -> &'static str {
        TIDE_EXTENSION
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
