use std::{io::BufRead, path::Path, sync::LazyLock};

use context_error::{BoxedError, CreateError, Context};
use regex::Regex;

use crate::{
    config::{ReaderSettings, SearchConfiguration, SequenceMatchingConfiguration},
    csv::{ColumnSpec, Columns, CsvHeader, CsvLine},
    error::{ParseError, ParseErrorKind},
    helper_functions::{file_name, url_decode},
    io::{Line, LineReader, SequentialReader, open_sequential},
    model::{
        Advocate, Assumption, Charge, ModificationMatch, Peptide, SpectrumKey, SpectrumMatch,
        mass_tag,
    },
    progress::{ProgressHandler, ProgressScale},
    reader::{
        IdentificationReader, MatchCollector, ParserState, SoftwareVersions,
        add_software_version, closed_error,
    },
    score::Conversion,
};

/// The canonical extension of MS Amanda result files
pub const MS_AMANDA_EXTENSION: &str = ".ms-amanda.csv";

const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required("title", &["title"]),
    ColumnSpec::required("sequence", &["sequence"]),
    ColumnSpec::required("modifications", &["modifications"]),
    ColumnSpec::required("score", &["amanda score"]),
    ColumnSpec::required("rank", &["rank"]),
    ColumnSpec::required("charge", &["charge"]),
    ColumnSpec::required("filename", &["filename"]),
    ColumnSpec::optional("scan", &["scan number", "scan"]),
    ColumnSpec::optional("probability", &["weighted probability"]),
    ColumnSpec::optional("proteins", &["protein accessions"]),
    ColumnSpec::optional("mz", &["m/z"]),
    ColumnSpec::optional("rt", &["rt"]),
];

/// A single modification: `N-Term(name|mass|variable)`, `C-Term(...)` or `C4(name|mass|fixed)`
static MODIFICATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(n-term|c-term|[a-z](\d+))\((.*)\|([^|]*)\|(fixed|variable)\)$").unwrap()
});

/// A reader for MS Amanda tab separated result files.
///
/// Rows are grouped into spectrum matches by their (URL encoded) spectrum title, a new match is
/// started whenever the title changes.
#[derive(Debug)]
pub struct MsAmandaReader<R> {
    reader: Option<LineReader<R>>,
    file_name: String,
    length: Option<u64>,
    versions: SoftwareVersions,
    state: ParserState,
}

impl MsAmandaReader<SequentialReader> {
    /// Open an MS Amanda file, it can be gzipped
    /// # Errors
    /// If the file could not be opened.
    pub fn open(path: impl AsRef<Path>, settings: &ReaderSettings) -> Result<Self, ParseError> {
        let (reader, length) = open_sequential(path.as_ref(), settings.buffer_capacity)?;
        Ok(Self::from_reader(reader, file_name(path), length))
    }
}

impl<R: BufRead> MsAmandaReader<R> {
    /// Read MS Amanda data from any buffered reader
    pub fn from_reader(reader: R, file_name: impl Into<String>, length: Option<u64>) -> Self {
        let file_name = file_name.into();
        Self {
            reader: Some(LineReader::new(reader, file_name.clone())),
            file_name,
            length,
            versions: SoftwareVersions::new(),
            state: ParserState::Start,
        }
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
        self.state.advance(ParserState::ParsingHeader, &self.file_name);
        let first = reader.next_non_empty_line()?.ok_or_else(|| {
            BoxedError::new(
                ParseErrorKind::MissingMandatoryField,
                "Missing header",
                "The file is empty, so no column headers could be read",
                Context::none().source(self.file_name.clone()).to_owned(),
            )
        })?;
        // Version 1.0.0.3196 and newer start with a version line
        let header = if let Some(version) = first
            .text
            .get(..9)
            .filter(|start| start.eq_ignore_ascii_case("#version:"))
            .map(|_| first.text[9..].trim())
        {
            add_software_version(&mut self.versions, Advocate::MsAmanda.name(), Some(version));
            CsvHeader::read(reader, b'\t')?
        } else {
            add_software_version(&mut self.versions, Advocate::MsAmanda.name(), None);
            CsvHeader::from_line(&first, b'\t')
        };
        let columns = Columns::resolve(&header, COLUMNS, search.missing_columns)?;

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

            let title = url_decode(row.field(&columns, "title")?);
            let key = SpectrumKey::from_title(row.field(&columns, "filename")?, title);
            collector.start(key, row.parse_optional(&columns, "scan")?, progress);

            let raw_score: f64 = row.parse(&columns, "score")?;
            let e_value = match row.parse_optional::<f64>(&columns, "probability")? {
                Some(probability) => probability,
                None => Conversion::PowerTenNegative.apply(raw_score),
            };

            let sequence = row.field(&columns, "sequence")?.to_ascii_uppercase();
            let modifications = row
                .get(&columns, "modifications")
                .map(|text| parse_modifications(text, &sequence, row.line()))
                .transpose()?
                .unwrap_or_default();
            let assumption = Assumption::peptide(
                Peptide::new(sequence, modifications)?,
                row.parse(&columns, "rank")?,
                Advocate::MsAmanda,
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

/// Parse the `;` separated modifications of a row, with the fixed flag as given in the file
fn parse_modifications(
    text: &str,
    sequence: &str,
    line: &Line<'_>,
) -> Result<Vec<ModificationMatch>, ParseError> {
    let length = sequence.len();
    text.split(';')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|modification| {
            let error = |long: String| {
                BoxedError::new(
                    ParseErrorKind::MalformedRecord,
                    "Invalid modification",
                    long,
                    line.part_context(modification),
                )
            };
            let captures = MODIFICATION.captures(modification).ok_or_else(|| {
                error(format!(
                    "The modification should look like 'C4(name|mass|fixed)' but is '{modification}'"
                ))
            })?;
            let site = match captures.get(2) {
                Some(site) => site
                    .as_str()
                    .parse::<usize>()
                    .map_err(|_| error("The modification site is too big".to_string()))?,
                None if captures[1].eq_ignore_ascii_case("n-term") => 1,
                None => length,
            };
            let mass = captures[4].trim().parse::<f64>().map_err(|_| {
                error(format!(
                    "The modification mass '{}' is not a number",
                    &captures[4]
                ))
            })?;
            let residue = site
                .checked_sub(1)
                .and_then(|index| sequence.chars().nth(index))
                .ok_or_else(|| {
                    error(format!(
                        "The modification site {site} is outside of the sequence '{sequence}'"
                    ))
                })?;
            ModificationMatch::new(
                mass_tag(mass, residue),
                site,
                captures[5].eq_ignore_ascii_case("variable"),
                length,
            )
        })
        .collect()
}

impl<R: BufRead> IdentificationReader for MsAmandaReader<R> {
    fn extension(&self) -> &'static str {
        MS_AMANDA_EXTENSION
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
