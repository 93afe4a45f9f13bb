use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, Seek},
    path::Path,
};

use context_error::{BoxedError, CreateError, Context};
use indexmap::IndexMap;
use tracing::debug;

use crate::{
    config::{ReaderSettings, SearchConfiguration, SequenceMatchingConfiguration},
    csv::{ColumnSpec, Columns, CsvHeader, CsvLine},
    error::{ParseError, ParseErrorKind, malformed_line},
    helper_functions::{file_name, strip_suffix_ignore_case},
    index::{IndexBuilder, IndexRecord, scan_lines},
    io::{Line, LineReader, open_seekable},
    model::{
        Advocate, Assumption, Charge, ModificationMatch, SpectrumKey, SpectrumMatch, Tag,
        mass_tag,
    },
    progress::{ProgressHandler, ProgressScale},
    reader::{
        IdentificationReader, MatchCollector, ParserState, SoftwareVersions, TagMap,
        add_software_version, closed_error,
    },
};

/// The canonical extension of DirecTag result files
pub const DIREC_TAG_EXTENSION: &str = ".tags";

const SPECTRUM_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::optional("id", &["id"]),
    ColumnSpec::optional("charge", &["charge"]),
];

const TAG_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::required("tag", &["tag"]),
    ColumnSpec::required("n-gap", &["nterminusmass"]),
    ColumnSpec::required("c-gap", &["cterminusmass"]),
    ColumnSpec::required("charge", &["tagchargestate"]),
    ColumnSpec::required("total", &["total"]),
];

/// The dynamic modifications by their index in the tags: the residue and the mass delta
type DynamicModifications = HashMap<char, (char, f64)>;

/// A reader for DirecTag `.tags` files.
///
/// The file starts with `H` header lines (generator, version, input file), a `TagsParameters`
/// section with the search settings and the column headers for spectrum (`H(S)`) and tag
/// (`H(T)`) lines. The results are read in two phases: all `S` and `T` lines are indexed by
/// spectrum id first, after which every spectrum with its tags is read by seeking to the
/// recorded offsets. Spectra are returned in index order, spectra without tags are left out.
#[derive(Debug)]
pub struct DirecTagReader<R> {
    reader: Option<LineReader<R>>,
    file_name: String,
    length: Option<u64>,
    settings: ReaderSettings,
    versions: SoftwareVersions,
    state: ParserState,
    input_file: Option<String>,
    parameters: IndexMap<String, String>,
    tags: Option<TagMap>,
}

impl DirecTagReader<BufReader<File>> {
    /// Open a DirecTag file, it cannot be compressed as it is read with random access
    /// # Errors
    /// If the file could not be opened or is gzipped.
    pub fn open(path: impl AsRef<Path>, settings: ReaderSettings) -> Result<Self, ParseError> {
        let (reader, length) = open_seekable(path.as_ref(), settings.buffer_capacity)?;
        Ok(Self::from_reader(
            reader,
            file_name(path),
            length,
            settings,
        ))
    }
}

impl<R: BufRead + Seek> DirecTagReader<R> {
    /// Read DirecTag data from any seekable buffered reader
    pub fn from_reader(
        reader: R,
        file_name: impl Into<String>,
        length: Option<u64>,
        settings: ReaderSettings,
    ) -> Self {
        let file_name = file_name.into();
        Self {
            reader: Some(LineReader::new(reader, file_name.clone())),
            file_name,
            length,
            settings,
            versions: SoftwareVersions::new(),
            state: ParserState::Start,
            input_file: None,
            parameters: IndexMap::new(),
            tags: None,
        }
    }

    /// The spectrum file named in the header, available after parsing
    pub fn input_file(&self) -> Option<&str> {
        self.input_file.as_deref()
    }

    /// A value from the `TagsParameters` section, available after parsing
    pub fn tags_parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// All values from the `TagsParameters` section in file order
    pub const fn tags_parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }

    /// The spectrum file: the configured one, the input file named in the header, or the name of
    /// this file with an `.mgf` extension
    fn spectrum_file(&self) -> String {
        self.settings
            .spectrum_file
            .clone()
            .or_else(|| {
                self.input_file
                    .as_deref()
                    .and_then(|path| path.rsplit(['/', '\\']).next())
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| {
                format!(
                    "{}.mgf",
                    strip_suffix_ignore_case(&self.file_name, DIREC_TAG_EXTENSION)
                )
            })
    }

    fn parse_records(
        &mut self,
        progress: &mut dyn ProgressHandler,
        search: &SearchConfiguration,
        sequence_matching: Option<&SequenceMatchingConfiguration>,
    ) -> Result<Vec<SpectrumMatch>, ParseError> {
        let source = self.file_name.clone();
        let mut reader = self.reader.take().ok_or_else(|| closed_error(&source))?;

        self.state.advance(ParserState::ParsingHeader, &source);
        self.read_header(&mut reader)?;
        self.state.advance(ParserState::ParsingParameters, &source);
        self.read_parameters(&mut reader)?;
        let dynamic_modifications = self.dynamic_modifications()?;
        let (spectrum_header, tag_header) = read_column_headers(&mut reader)?;
        let spectrum_columns =
            Columns::resolve(&spectrum_header, SPECTRUM_COLUMNS, search.missing_columns)?;
        let tag_columns = Columns::resolve(&tag_header, TAG_COLUMNS, search.missing_columns)?;

        // Index
        let mut spectra = IndexBuilder::new();
        let mut tag_records = IndexBuilder::new();
        let mut count = 0;
        let mut current = None;
        let complete = scan_lines(&mut reader, self.length, progress, |line| {
            if line.text.starts_with('S') {
                let id = match CsvLine::new(*line, b'\t').get(&spectrum_columns, "id") {
                    Some(text) => parse_spectrum_id(text, line)?,
                    None => count,
                };
                count += 1;
                spectra.insert(id, line.into());
                current = Some(id);
            } else if line.text.starts_with('T') {
                let id = current.ok_or_else(|| {
                    malformed_line(
                        "Tag outside of a spectrum",
                        "A tag line was found before the first spectrum line",
                        line.line_index,
                        line.text,
                    )
                })?;
                tag_records.insert(id, line.into());
            }
            Ok(true)
        })?;
        let spectra = spectra.finish();
        let tag_records = tag_records.finish();
        debug!(
            source = %source,
            spectra = spectra.len(),
            tags = tag_records.record_count(),
            complete,
            "indexed tags file"
        );
        let mut collector = MatchCollector::new(false, sequence_matching);
        if !complete {
            let (matches, tags) = collector.cancel(&source);
            self.tags = tags;
            return Ok(matches);
        }

        // Materialise
        self.state.advance(ParserState::ParsingRecords, &source);
        let spectrum_file = self.spectrum_file();
        let mut scale = ProgressScale::start(Some(spectra.len() as u64), progress);
        for (position, id) in spectra.ids().enumerate() {
            if progress.is_cancelled() {
                let (matches, tags) = collector.cancel(&source);
                self.tags = tags;
                return Ok(matches);
            }
            scale.update(position as u64, progress);
            let (Some(tags), Some(record)) = (tag_records.get(id), spectra.first(id)) else {
                continue;
            };
            let line = read_record(&mut reader, record)?;
            let charge = CsvLine::new(line, b'\t')
                .parse_optional::<Charge>(&spectrum_columns, "charge")?;
            let key = self.settings.title(&spectrum_file, *id).map_or_else(
                || SpectrumKey::from_index(&spectrum_file, *id),
                |title| SpectrumKey::from_title(&spectrum_file, title),
            );
            collector.start(key, Some(id + 1), progress);
            for (rank, record) in tags.iter().enumerate() {
                let line = read_record(&mut reader, *record)?;
                let assumption = parse_tag(
                    &CsvLine::new(line, b'\t'),
                    &tag_columns,
                    rank as u32 + 1,
                    charge,
                    &dynamic_modifications,
                    &source,
                )?;
                collector.add_tag(assumption)?;
            }
        }
        self.state.advance(ParserState::Flush, &source);
        let (matches, tags) = collector.finish(&source, progress);
        self.tags = tags;
        scale.finish(progress);
        Ok(matches)
    }

    /// Read the `H` lines up to the `TagsParameters` line
    fn read_header(&mut self, reader: &mut LineReader<R>) -> Result<(), ParseError> {
        let mut generator = None;
        let mut version = None;
        loop {
            let Some(line) = reader.next_line()? else {
                return Err(truncated(&self.file_name, "the header"));
            };
            if line.text.starts_with("H\tTagsParameters") {
                break;
            }
            check_not_record(&line, "the header")?;
            let content = line.text.get(1..).unwrap_or_default().trim();
            if let Some(value) = content.strip_prefix("TagsGeneratorVersion") {
                version = Some(value.trim().to_string());
            } else if let Some(value) = content.strip_prefix("TagsGenerator") {
                generator = Some(value.trim().to_string());
            } else if let Some(value) = content.strip_prefix("InputFile") {
                self.input_file = Some(value.trim().to_string());
            }
        }
        add_software_version(
            &mut self.versions,
            generator
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| Advocate::DirecTag.name().to_string()),
            version.as_deref(),
        );
        Ok(())
    }

    /// Read the `key: value` pairs of the `TagsParameters` section, up to the first empty line
    fn read_parameters(&mut self, reader: &mut LineReader<R>) -> Result<(), ParseError> {
        loop {
            let Some(line) = reader.next_line()? else {
                return Err(truncated(&self.file_name, "the tags parameters"));
            };
            if line.text.trim().is_empty() {
                return Ok(());
            }
            check_not_record(&line, "the tags parameters")?;
            for component in line.text.get(1..).unwrap_or_default().trim().split(", ") {
                if let Some((key, value)) = component.split_once(": ") {
                    self.parameters
                        .insert(key.trim().to_string(), value.trim().to_string());
                }
            }
        }
    }

    /// The `DynamicMods` parameter: `residue index mass` triples, like `M 0 15.994915`
    fn dynamic_modifications(&self) -> Result<DynamicModifications, ParseError> {
        let Some(text) = self.tags_parameter("DynamicMods") else {
            return Ok(DynamicModifications::new());
        };
        let parts: Vec<&str> = text.split_whitespace().collect();
        parts
            .chunks_exact(3)
            .map(|triple| {
                let invalid = || {
                    BoxedError::new(
                        ParseErrorKind::MalformedRecord,
                        "Invalid dynamic modification",
                        format!(
                            "A dynamic modification should be 'residue index mass' but is '{}'",
                            triple.join(" ")
                        ),
                        Context::show(text.to_string())
                            .source(self.file_name.clone())
                            .to_owned(),
                    )
                };
                let residue = single_char(triple[0]).ok_or_else(invalid)?;
                let index = single_char(triple[1]).ok_or_else(invalid)?;
                let mass = triple[2].parse::<f64>().map_err(|_| invalid())?;
                Ok((index, (residue.to_ascii_uppercase(), mass)))
            })
            .collect()
    }
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    chars.next().filter(|_| chars.next().is_none())
}

fn truncated(source: &str, section: &str) -> ParseError {
    BoxedError::new(
        ParseErrorKind::MalformedRecord,
        "Unexpected end of file",
        format!("The file ended while reading {section}"),
        Context::none().source(source.to_string()).to_owned(),
    )
}

/// Spectrum and tag lines (or their headers) cannot occur before the column headers
fn check_not_record(line: &Line<'_>, section: &str) -> Result<(), ParseError> {
    if ["H(S)", "H(T)", "S", "T"]
        .iter()
        .any(|marker| line.text.starts_with(marker))
    {
        Err(malformed_line(
            "Unexpected record",
            format!("A spectrum or tag line was found while reading {section}"),
            line.line_index,
            line.text,
        ))
    } else {
        Ok(())
    }
}

/// Read the `H(S)` and `H(T)` column headers, in either order. The marker is kept as first
/// column so the columns line up with the `S` and `T` lines.
fn read_column_headers<R: BufRead>(
    reader: &mut LineReader<R>,
) -> Result<(CsvHeader, CsvHeader), ParseError> {
    let mut spectrum = None;
    let mut tag = None;
    while spectrum.is_none() || tag.is_none() {
        let Some(line) = reader.next_non_empty_line()? else {
            break;
        };
        if line.text.starts_with("H(S)") {
            spectrum = Some(CsvHeader::from_line(&line, b'\t'));
        } else if line.text.starts_with("H(T)") {
            tag = Some(CsvHeader::from_line(&line, b'\t'));
        } else if line.text.starts_with('S') || line.text.starts_with('T') {
            return Err(BoxedError::new(
                ParseErrorKind::MissingMandatoryField,
                "Missing column headers",
                "A spectrum or tag line was found before both the H(S) and H(T) column headers",
                line.context(),
            ));
        }
    }
    spectrum.zip(tag).ok_or_else(|| {
        BoxedError::new(
            ParseErrorKind::MissingMandatoryField,
            "Missing column headers",
            "The file ended before both the H(S) and H(T) column headers were found",
            Context::none().source(reader.source().to_string()).to_owned(),
        )
    })
}

/// The spectrum id, written as `index=N` or as a plain number
fn parse_spectrum_id(text: &str, line: &Line<'_>) -> Result<usize, ParseError> {
    let number = text.rsplit_once('=').map_or(text, |(_, n)| n).trim();
    number.parse().map_err(|_| {
        BoxedError::new(
            ParseErrorKind::MalformedRecord,
            "Invalid spectrum id",
            format!("The spectrum id should be 'index=N' but is '{text}'"),
            line.part_context(text),
        )
    })
}

/// Seek to an indexed line and read it
fn read_record<R: BufRead + Seek>(
    reader: &mut LineReader<R>,
    record: IndexRecord,
) -> Result<Line<'_>, ParseError> {
    reader.seek_to(record.offset, record.line_index)?;
    let source = reader.source().to_string();
    reader.next_line()?.ok_or_else(|| {
        BoxedError::new(
            ParseErrorKind::IO,
            "Index out of date",
            format!(
                "No line could be read at offset {}, the file changed after it was indexed",
                record.offset
            ),
            Context::none().source(source).to_owned(),
        )
    })
}

/// Parse a tag line, digits in the tag refer to the dynamic modifications. The charge of the
/// spectrum is used if known.
fn parse_tag(
    row: &CsvLine<'_>,
    columns: &Columns,
    rank: u32,
    spectrum_charge: Option<Charge>,
    dynamic_modifications: &DynamicModifications,
    identification_file: &str,
) -> Result<Assumption, ParseError> {
    let text = row.field(columns, "tag")?;
    let mut residues = String::with_capacity(text.len());
    let mut modifications = Vec::new();
    for (index, c) in text.char_indices() {
        if c.is_ascii_alphabetic() {
            residues.push(c.to_ascii_uppercase());
        } else if let Some((residue, mass)) = dynamic_modifications.get(&c) {
            residues.push(*residue);
            modifications.push((mass_tag(*mass, *residue), residues.len()));
        } else {
            return Err(BoxedError::new(
                ParseErrorKind::MalformedRecord,
                "Invalid tag",
                format!("'{c}' is neither an amino acid nor a dynamic modification index"),
                row.line().part_context(&text[index..index + c.len_utf8()]),
            ));
        }
    }
    let length = residues.len();
    let modifications = modifications
        .into_iter()
        .map(|(tag, site)| ModificationMatch::new(tag, site, true, length))
        .collect::<Result<Vec<_>, _>>()?;
    let charge = match spectrum_charge {
        Some(charge) => charge,
        None => row.parse(columns, "charge")?,
    };
    Ok(Assumption::tag(
        Tag::new(
            row.parse(columns, "n-gap")?,
            residues,
            row.parse(columns, "c-gap")?,
            modifications,
        )?,
        rank,
        Advocate::DirecTag,
        charge,
        row.parse(columns, "total")?,
        identification_file,
    ))
}

impl<R: BufRead + Seek> IdentificationReader for DirecTagReader<R> {
    fn extension(&self) -> &'static str {
        DIREC_TAG_EXTENSION
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
