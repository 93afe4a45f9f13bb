use std::{io::BufRead, path::Path};

use context_error::{BoxedError, CreateError};

use crate::{
    config::{ReaderSettings, SearchConfiguration, SequenceMatchingConfiguration},
    error::{ParseError, ParseErrorKind, malformed_line},
    helper_functions::{file_name, strip_suffix_ignore_case, tab_fields},
    io::{Line, LineReader, SequentialReader, open_sequential},
    model::{Advocate, Assumption, Charge, ModificationMatch, Peptide, SpectrumKey, SpectrumMatch},
    progress::{ProgressHandler, ProgressScale},
    reader::{
        IdentificationReader, MatchCollector, ParserState, SoftwareVersions,
        add_software_version, closed_error,
    },
    resolution::{LocatedModification, resolve_modification},
    score::Conversion,
};

/// The canonical extension of Andromeda result files
pub const ANDROMEDA_EXTENSION: &str = ".res";

/// A reader for Andromeda `.res` files.
///
/// ```text
/// >spectrum title
/// PEPTIDEK	2	85.3	A,A,A,A,A,A,A,A,A,A
/// ```
///
/// Every spectrum starts with a `>` line holding its title, followed by one tab separated line
/// per hit: sequence, charge, score, modifications and an optional rank. The modifications are
/// given per position, from the N-terminus (0) to the C-terminus (length + 1), `A` meaning no
/// modification and anything else a mass delta.
#[derive(Debug)]
pub struct AndromedaReader<R> {
    reader: Option<LineReader<R>>,
    file_name: String,
    length: Option<u64>,
    settings: ReaderSettings,
    versions: SoftwareVersions,
    state: ParserState,
}

impl AndromedaReader<SequentialReader> {
    /// Open an Andromeda file, it can be gzipped
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

impl<R: BufRead> AndromedaReader<R> {
    /// Read Andromeda data from any buffered reader
    pub fn from_reader(
        reader: R,
        file_name: impl Into<String>,
        length: Option<u64>,
        settings: ReaderSettings,
    ) -> Self {
        let file_name = file_name.into();
        let mut versions = SoftwareVersions::new();
        add_software_version(&mut versions, Advocate::Andromeda.name(), None);
        Self {
            reader: Some(LineReader::new(reader, file_name.clone())),
            file_name,
            length,
            settings,
            versions,
            state: ParserState::Start,
        }
    }

    fn spectrum_file(&self) -> String {
        self.settings.spectrum_file.clone().unwrap_or_else(|| {
            let name = strip_suffix_ignore_case(&self.file_name, ".gz");
            format!(
                "{}.mgf",
                strip_suffix_ignore_case(name, ANDROMEDA_EXTENSION)
            )
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
        self.state.advance(ParserState::ParsingRecords, &self.file_name);
        let mut collector = MatchCollector::new(expand_ambiguous, sequence_matching);
        let mut scale = ProgressScale::start(self.length, progress);
        let mut rank = 0;
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

            if let Some(title) = line.text.strip_prefix('>') {
                collector.start(
                    SpectrumKey::from_title(&spectrum_file, title.trim()),
                    None,
                    progress,
                );
                rank = 0;
            } else if collector.has_pending() {
                rank += 1;
                let assumption = parse_hit(&line, rank, search, &self.file_name)?;
                collector.add_peptide(assumption)?;
            } else {
                return Err(malformed_line(
                    "Hit outside of a spectrum",
                    "A hit line was found before the first '>' spectrum line",
                    line.line_index,
                    line.text,
                ));
            }
        }
        self.state.advance(ParserState::Flush, &self.file_name);
        let (matches, _) = collector.finish(&self.file_name, progress);
        scale.finish(progress);
        Ok(matches)
    }
}

/// Parse a hit line, the rank is used if the line does not give one
fn parse_hit(
    line: &Line<'_>,
    rank: u32,
    search: &SearchConfiguration,
    identification_file: &str,
) -> Result<Assumption, ParseError> {
    let fields = tab_fields(line.text);
    if fields.len() < 4 {
        return Err(malformed_line(
            "Invalid hit",
            format!(
                "A hit line needs at least 4 tab separated fields (sequence, charge, score, modifications) but has {}",
                fields.len()
            ),
            line.line_index,
            line.text,
        ));
    }
    let number = |field: &str, name: &str| {
        BoxedError::new(
            ParseErrorKind::MalformedRecord,
            "Invalid hit",
            format!("The {name} '{field}' is not a valid number"),
            line.part_context(field),
        )
    };

    let sequence = fields[0].trim().to_ascii_uppercase();
    let charge: Charge = fields[1]
        .trim()
        .parse()
        .map_err(|_| number(fields[1], "charge"))?;
    let score: f64 = fields[2]
        .trim()
        .parse()
        .map_err(|_| number(fields[2], "score"))?;
    let rank = match fields.get(4).map(|r| r.trim()).filter(|r| !r.is_empty()) {
        Some(given) => given.parse().map_err(|_| number(given, "rank"))?,
        None => rank,
    };

    let mut modifications: Vec<ModificationMatch> = Vec::new();
    for (location, value) in fields[3].split(',').enumerate() {
        let value = value.trim();
        if value.is_empty() || value == "A" {
            continue;
        }
        let mass_delta: f64 = value
            .parse()
            .map_err(|_| number(value, "modification mass"))?;
        modifications.push(resolve_modification(
            &sequence,
            &LocatedModification {
                accession: None,
                mass_delta,
                location,
            },
            &search.fixed_modifications,
            search.mass_tolerance,
        )?);
    }

    Ok(Assumption::peptide(
        Peptide::new(sequence, modifications)?,
        rank,
        Advocate::Andromeda,
        charge,
        Conversion::PowerTenNegative.apply(score / 10.0),
        identification_file,
    )
    .with_raw_score(Some(score)))
}

impl<R: BufRead> IdentificationReader for AndromedaReader<R> {
    fn extension(&self) -> &'static str {
        ANDROMEDA_EXTENSION
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
