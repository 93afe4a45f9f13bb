use std::{io::BufRead, path::Path};

use context_error::{BoxedError, CreateError};
use tracing::warn;

use crate::{
    config::{ReaderSettings, SearchConfiguration, SequenceMatchingConfiguration},
    csv::CsvHeader,
    error::{ParseError, ParseErrorKind, malformed_line},
    helper_functions::{file_name, strip_suffix_ignore_case, tab_fields, url_decode},
    io::{Line, LineReader, SequentialReader, open_sequential},
    model::{Advocate, Assumption, Charge, SpectrumKey, SpectrumMatch, Tag},
    progress::{ProgressHandler, ProgressScale},
    reader::{
        IdentificationReader, MatchCollector, ParserState, SoftwareVersions, TagMap,
        add_software_version, closed_error,
    },
    resolution::{LocatedModification, resolve_modification},
};

/// The canonical extension of PepNovo+ result files
pub const PEPNOVO_EXTENSION: &str = ".out";

/// The version of PepNovo+ that writes this format
const PEPNOVO_VERSION: &str = "3.1 (beta)";

/// The table header that has to follow every spectrum line
const HEADER: &[&str] = &[
    "#Index", "RnkScr", "PnvScr", "N-Gap", "C-Gap", "[M+H]", "Charge", "Sequence",
];

/// Comment lines that can occur between a spectrum line and its table header
const SKIPPED: &[&str] = &["# No", "# Charge", "#Problem", "# too"];

/// The mass of water plus a proton, PepNovo+ reports the C-terminal gap including this
const C_TERMINAL_CORRECTION: f64 = 19.017841150522;

/// A reader for PepNovo+ de novo results.
///
/// ```text
/// >> 0 12 File1.scan3 (SQS 0.92)
/// #Index	RnkScr	PnvScr	N-Gap	C-Gap	[M+H]	Charge	Sequence
/// 0	1.52	55.2	0.000	19.018	1002.51	2	^+42PEPM+16TIDE
/// ```
///
/// Each hit is a tag, ranked in file order. Spectra that PepNovo+ could not process have
/// neither `#Problem` nor `(SQS` on their spectrum line and are skipped.
#[derive(Debug)]
pub struct PepNovoReader<R> {
    reader: Option<LineReader<R>>,
    file_name: String,
    length: Option<u64>,
    settings: ReaderSettings,
    versions: SoftwareVersions,
    state: ParserState,
    tags: Option<TagMap>,
}

impl PepNovoReader<SequentialReader> {
    /// Open a PepNovo+ file, it can be gzipped
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

impl<R: BufRead> PepNovoReader<R> {
    /// Read PepNovo+ data from any buffered reader
    pub fn from_reader(
        reader: R,
        file_name: impl Into<String>,
        length: Option<u64>,
        settings: ReaderSettings,
    ) -> Self {
        let file_name = file_name.into();
        let mut versions = SoftwareVersions::new();
        add_software_version(
            &mut versions,
            Advocate::PepNovo.name(),
            Some(PEPNOVO_VERSION),
        );
        Self {
            reader: Some(LineReader::new(reader, file_name.clone())),
            file_name,
            length,
            settings,
            versions,
            state: ParserState::Start,
            tags: None,
        }
    }

    /// PepNovo+ names its output after the spectrum file: `run1.mgf.out`
    fn spectrum_file(&self) -> String {
        self.settings.spectrum_file.clone().unwrap_or_else(|| {
            let name = strip_suffix_ignore_case(&self.file_name, ".gz");
            strip_suffix_ignore_case(name, PEPNOVO_EXTENSION).to_string()
        })
    }

    fn parse_records(
        &mut self,
        progress: &mut dyn ProgressHandler,
        search: &SearchConfiguration,
        sequence_matching: Option<&SequenceMatchingConfiguration>,
    ) -> Result<Vec<SpectrumMatch>, ParseError> {
        let spectrum_file = self.spectrum_file();
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| closed_error(&self.file_name))?;
        self.state.advance(ParserState::ParsingRecords, &self.file_name);
        let mut collector = MatchCollector::new(false, sequence_matching);
        let mut scale = ProgressScale::start(self.length, progress);
        let mut in_spectrum = false;
        let mut expect_header = false;
        let mut rank = 0;
        loop {
            if progress.is_cancelled() {
                let (matches, tags) = collector.cancel(&self.file_name);
                self.tags = tags;
                return Ok(matches);
            }
            let Some(line) = reader.next_line()? else {
                break;
            };
            if line.text.trim().is_empty() {
                continue;
            }
            scale.update(line.offset, progress);

            if line.text.starts_with(">>") {
                if let Some(title) = spectrum_title(&line)? {
                    collector.start(
                        SpectrumKey::from_title(&spectrum_file, title),
                        None,
                        progress,
                    );
                    in_spectrum = true;
                    expect_header = true;
                    rank = 0;
                } else {
                    warn!(
                        source = %self.file_name,
                        line = line.line_index + 1,
                        "skipped spectrum that could not be processed by PepNovo+"
                    );
                    collector.flush(progress);
                    in_spectrum = false;
                    expect_header = false;
                }
            } else if expect_header {
                if SKIPPED.iter().any(|s| line.text.starts_with(s)) {
                    continue;
                }
                if !CsvHeader::from_line(&line, b'\t').is(HEADER) {
                    return Err(malformed_line(
                        "Unrecognised table format",
                        format!("The table header should be '{}'", HEADER.join("\t")),
                        line.line_index,
                        line.text,
                    ));
                }
                expect_header = false;
            } else if in_spectrum && !line.text.starts_with('#') {
                rank += 1;
                let assumption = parse_tag(&line, rank, search, &self.file_name)?;
                collector.add_tag(assumption)?;
            }
        }
        self.state.advance(ParserState::Flush, &self.file_name);
        let (matches, tags) = collector.finish(&self.file_name, progress);
        self.tags = tags;
        scale.finish(progress);
        Ok(matches)
    }
}

/// The title on a spectrum line (from the fourth token on, up to `#Problem` or `(SQS`), `None`
/// if the line has neither marker
fn spectrum_title(line: &Line<'_>) -> Result<Option<String>, ParseError> {
    let tokens: Vec<&str> = line.text.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(malformed_line(
            "Invalid spectrum line",
            "A spectrum line needs at least 4 whitespace separated tokens",
            line.line_index,
            line.text,
        ));
    }
    let joined = tokens[3..].join(" ");
    Ok(joined
        .rfind("#Problem")
        .or_else(|| joined.rfind("(SQS"))
        .map(|end| url_decode(joined[..end].trim())))
}

/// Parse a hit line into a tag assumption
fn parse_tag(
    line: &Line<'_>,
    rank: u32,
    search: &SearchConfiguration,
    identification_file: &str,
) -> Result<Assumption, ParseError> {
    let fields = tab_fields(line.text.trim());
    if fields.len() < 8 {
        return Err(malformed_line(
            "Invalid hit",
            format!(
                "A hit line needs 8 tab separated fields but has {}",
                fields.len()
            ),
            line.line_index,
            line.text,
        ));
    }
    let number = |index: usize| {
        fields[index].trim().parse::<f64>().map_err(|_| {
            BoxedError::new(
                ParseErrorKind::MalformedRecord,
                "Invalid hit",
                format!("The {} '{}' is not a valid number", HEADER[index], fields[index]),
                line.part_context(fields[index]),
            )
        })
    };
    let rank_score = number(1)?;
    let pepnovo_score = number(2)?;
    let n_gap = number(3)?;
    let mut c_gap = number(4)?;
    if c_gap > 0.0 && c_gap < C_TERMINAL_CORRECTION {
        return Err(BoxedError::new(
            ParseErrorKind::MalformedRecord,
            "Invalid hit",
            format!("The C-terminal gap {c_gap} is smaller than the mass of water and a proton"),
            line.part_context(fields[4]),
        ));
    } else if c_gap > 0.0 {
        c_gap -= C_TERMINAL_CORRECTION;
    }
    let charge = fields[6].trim().parse::<Charge>().map_err(|_| {
        BoxedError::new(
            ParseErrorKind::MalformedRecord,
            "Invalid hit",
            format!("The charge '{}' is not a valid number", fields[6]),
            line.part_context(fields[6]),
        )
    })?;

    let (residues, masses) = parse_sequence(fields[7].trim(), line)?;
    let modifications = masses
        .into_iter()
        .map(|(mass_delta, location)| {
            resolve_modification(
                &residues,
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

    Ok(Assumption::tag(
        Tag::new(n_gap, residues, c_gap, modifications)?,
        rank,
        Advocate::PepNovo,
        charge,
        pepnovo_score,
        identification_file,
    )
    .with_raw_score(Some(rank_score)))
}

/// Split a PepNovo+ sequence (`^+42PEPM+16TIDE$-1`) into residues and masses with their raw
/// location, `^` is the N-terminus (0) and `$` the C-terminus (length + 1)
fn parse_sequence(text: &str, line: &Line<'_>) -> Result<(String, Vec<(f64, usize)>), ParseError> {
    enum Anchor {
        Residue,
        NTerm,
        CTerm,
    }
    let mut residues = String::with_capacity(text.len());
    let mut masses = Vec::new();
    let mut anchor = Anchor::Residue;
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            '^' => anchor = Anchor::NTerm,
            '$' => anchor = Anchor::CTerm,
            '+' | '-' | '0'..='9' | '.' => {
                let mut end = start + c.len_utf8();
                while let Some((i, n)) = chars.next_if(|(_, n)| n.is_ascii_digit() || *n == '.')
                {
                    end = i + n.len_utf8();
                }
                let mass = text[start..end].parse::<f64>().map_err(|_| {
                    BoxedError::new(
                        ParseErrorKind::MalformedRecord,
                        "Invalid modification",
                        format!("The modification mass '{}' is not a number", &text[start..end]),
                        line.part_context(&text[start..end]),
                    )
                })?;
                let location = match anchor {
                    Anchor::NTerm => 0,
                    Anchor::CTerm => residues.len() + 1,
                    Anchor::Residue => residues.len(),
                };
                masses.push((mass, location));
            }
            c if c.is_ascii_alphabetic() => {
                residues.push(c.to_ascii_uppercase());
                anchor = Anchor::Residue;
            }
            c => {
                return Err(BoxedError::new(
                    ParseErrorKind::MalformedRecord,
                    "Invalid sequence",
                    format!("The character '{c}' is not an amino acid"),
                    line.part_context(&text[start..start + c.len_utf8()]),
                ));
            }
        }
    }
    Ok((residues, masses))
}

impl<R: BufRead> IdentificationReader for PepNovoReader<R> {
    fn extension(&self) -> &'static str {
        PEPNOVO_EXTENSION
    }

    fn parse(
        &mut self,
        progress: &mut dyn ProgressHandler,
        search: &SearchConfiguration,
        sequence_matching: Option<&SequenceMatchingConfiguration>,
        _expand_ambiguous: bool,
    ) -> Result<Vec<SpectrumMatch>, ParseError> {
        let result = self.parse_records(progress, search, sequence_matching);
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

    fn has_de_novo_tags(&self) -> bool {
        true
    }

    fn tags_by_key(&self) -> Option<&TagMap> {
        self.tags.as_ref()
    }

    fn clear_tags_map(&mut self) {
        self.tags = None;
    }
}
