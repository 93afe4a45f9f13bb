//! Header driven character separated files. (Internal use mostly).

use std::{collections::HashMap, io::BufRead, ops::Range, str::FromStr, sync::Arc};

use context_error::{BoxedError, CreateError, Context};
use itertools::Itertools;
use tracing::warn;

use crate::{
    config::MissingColumnPolicy,
    error::{ParseError, ParseErrorKind},
    io::{Line, LineReader},
};

/// The column headers of a file, stored in lowercase
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct CsvHeader {
    columns: Vec<Arc<String>>,
    separator: u8,
    line_index: u32,
    line: String,
}

impl CsvHeader {
    /// Read the header, a leading `sep=C` line overrides the separator
    /// # Errors
    /// If the file is empty or the separator is not a single byte character.
    pub(crate) fn read<R: BufRead>(
        reader: &mut LineReader<R>,
        mut separator: u8,
    ) -> Result<Self, ParseError> {
        let source = reader.source().to_string();
        let empty = || {
            BoxedError::new(
                ParseErrorKind::MissingMandatoryField,
                "Missing header",
                "The file is empty, so no column headers could be read",
                Context::none().source(source.clone()).to_owned(),
            )
        };
        let mut line = reader.next_non_empty_line()?.ok_or_else(empty)?;
        if let Some(sep) = line.text.strip_prefix("sep=") {
            match sep.chars().next() {
                Some(c) if c.len_utf8() == 1 => separator = c as u8,
                Some(_) => {
                    return Err(BoxedError::new(
                        ParseErrorKind::MalformedRecord,
                        "Unicode value separators not supported",
                        "This is a character that takes more than 1 byte to represent in Unicode, this is not supported in parsing CSV files.",
                        Context::line(Some(line.line_index), line.text.to_string(), 4, sep.len()),
                    ));
                }
                None => (),
            }
            line = reader.next_non_empty_line()?.ok_or_else(empty)?;
        }
        Ok(Self::from_line(&line, separator))
    }

    /// Use an already read line as the header
    pub(crate) fn from_line(line: &Line<'_>, separator: u8) -> Self {
        let columns = csv_separate(line.text, separator)
            .into_iter()
            .map(|r| Arc::new(line.text[r].trim().to_lowercase()))
            .collect();
        Self {
            columns,
            separator,
            line_index: line.line_index,
            line: line.text.to_string(),
        }
    }

    /// The separator used in this file
    pub(crate) const fn separator(&self) -> u8 {
        self.separator
    }

    /// The position of the first column with one of the given names (in lowercase)
    fn position(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.columns.iter().position(|c| c.as_str() == *name))
    }

    /// Check if the header exactly matches these columns (ignoring case)
    pub(crate) fn is(&self, columns: &[&str]) -> bool {
        self.columns.len() == columns.len()
            && self
                .columns
                .iter()
                .zip(columns)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    fn context(&self) -> Context<'static> {
        Context::full_line(self.line_index, self.line.clone())
    }
}

/// A column a format reads, with all names engines use for it
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ColumnSpec {
    /// The name used to access the column
    pub name: &'static str,
    /// All accepted header names, in lowercase
    pub synonyms: &'static [&'static str],
    /// If the file cannot be read without this column
    pub required: bool,
}

impl ColumnSpec {
    pub(crate) const fn required(name: &'static str, synonyms: &'static [&'static str]) -> Self {
        Self {
            name,
            synonyms,
            required: true,
        }
    }

    pub(crate) const fn optional(name: &'static str, synonyms: &'static [&'static str]) -> Self {
        Self {
            name,
            synonyms,
            required: false,
        }
    }
}

/// The location of every known column in a header
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Columns {
    indices: HashMap<&'static str, usize>,
}

impl Columns {
    /// Find all columns in the header. All missing required columns are reported together.
    /// # Errors
    /// If a required column is missing, or an optional column is missing and the policy is
    /// [`MissingColumnPolicy::Fail`].
    pub(crate) fn resolve(
        header: &CsvHeader,
        specs: &[ColumnSpec],
        policy: MissingColumnPolicy,
    ) -> Result<Self, ParseError> {
        let mut indices = HashMap::new();
        let mut missing = Vec::new();
        for spec in specs {
            if let Some(index) = header.position(spec.synonyms) {
                indices.insert(spec.name, index);
            } else if spec.required || policy == MissingColumnPolicy::Fail {
                missing.push(spec);
            } else if policy == MissingColumnPolicy::Warn {
                warn!(column = spec.name, "optional column is missing");
            }
        }
        if missing.is_empty() {
            Ok(Self { indices })
        } else {
            Err(BoxedError::new(
                ParseErrorKind::MissingMandatoryField,
                "Missing column",
                format!(
                    "This file does not contain the needed column{} {}",
                    if missing.len() == 1 { "" } else { "s" },
                    missing
                        .iter()
                        .map(|s| format!("'{}'", s.synonyms.first().unwrap_or(&s.name)))
                        .join(", ")
                ),
                header.context(),
            ))
        }
    }

    /// Check if the column was found
    pub(crate) fn has(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }
}

/// A single row
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct CsvLine<'a> {
    line: Line<'a>,
    fields: Vec<Range<usize>>,
}

impl<'a> CsvLine<'a> {
    pub(crate) fn new(line: Line<'a>, separator: u8) -> Self {
        Self {
            fields: csv_separate(line.text, separator),
            line,
        }
    }

    /// The underlying line
    pub(crate) const fn line(&self) -> &Line<'a> {
        &self.line
    }

    /// Get the context applicable to the specified field
    fn field_context(&self, field: usize) -> Context<'static> {
        self.fields.get(field).map_or_else(
            || self.line.context(),
            |range| {
                Context::line(
                    Some(self.line.line_index),
                    self.line.text.to_string(),
                    range.start,
                    range.len(),
                )
            },
        )
    }

    /// Get the text of a column, `None` if the column is not in the header or the field is empty
    pub(crate) fn get(&self, columns: &Columns, name: &str) -> Option<&'a str> {
        let index = *columns.indices.get(name)?;
        self.fields
            .get(index)
            .map(|r| self.line.text[r.clone()].trim())
            .filter(|s| !s.is_empty())
    }

    /// Get the text of a required column
    /// # Errors
    /// If the row is too short or the field empty.
    pub(crate) fn field(&self, columns: &Columns, name: &str) -> Result<&'a str, ParseError> {
        self.get(columns, name).ok_or_else(|| {
            BoxedError::new(
                ParseErrorKind::MalformedRecord,
                "Missing value",
                format!("The column '{name}' is empty or missing on this line"),
                self.line.context(),
            )
        })
    }

    /// Parse a required column
    /// # Errors
    /// If the field is missing or cannot be parsed.
    pub(crate) fn parse<T: FromStr>(&self, columns: &Columns, name: &str) -> Result<T, ParseError> {
        let text = self.field(columns, name)?;
        text.parse().map_err(|_| self.parse_error::<T>(columns, name, text))
    }

    /// Parse an optional column, empty fields and `-` are `None`
    /// # Errors
    /// If the field is present but cannot be parsed.
    pub(crate) fn parse_optional<T: FromStr>(
        &self,
        columns: &Columns,
        name: &str,
    ) -> Result<Option<T>, ParseError> {
        match self.get(columns, name) {
            None | Some("-") => Ok(None),
            Some(text) => text
                .parse()
                .map(Some)
                .map_err(|_| self.parse_error::<T>(columns, name, text)),
        }
    }

    fn parse_error<T>(&self, columns: &Columns, name: &str, text: &str) -> ParseError {
        BoxedError::new(
            ParseErrorKind::MalformedRecord,
            "Invalid value",
            format!(
                "The column '{name}' should contain a {} but contains '{text}'",
                std::any::type_name::<T>().rsplit("::").next().unwrap_or("value")
            ),
            columns
                .indices
                .get(name)
                .map_or_else(|| self.line.context(), |i| self.field_context(*i)),
        )
    }
}

/// Split a line into the ranges of its fields, fields can be enclosed in double quotes
pub(crate) fn csv_separate(line: &str, separator: u8) -> Vec<Range<usize>> {
    let bytes = line.as_bytes();
    let mut row = Vec::new();
    let mut start = 0;
    while start <= bytes.len() {
        let rest = &bytes[start..];
        if rest.first() == Some(&b'"') {
            let close = rest[1..]
                .iter()
                .position(|b| *b == b'"')
                .map_or(bytes.len(), |p| start + 1 + p);
            row.push(start + 1..close);
            // Anything between the closing quote and the separator is ignored
            match bytes[close..].iter().position(|b| *b == separator) {
                Some(p) => start = close + p + 1,
                None => break,
            }
        } else if let Some(p) = rest.iter().position(|b| *b == separator) {
            row.push(start..start + p);
            start += p + 1;
        } else {
            row.push(start..bytes.len());
            break;
        }
    }
    row
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use std::io::Cursor;

    use context_error::*;

    use super::*;

    const SPECS: &[ColumnSpec] = &[
        ColumnSpec::required("scan", &["scan", "scan number"]),
        ColumnSpec::required("sequence", &["sequence"]),
        ColumnSpec::optional("rt", &["rt", "retention time"]),
    ];

    fn fields(line: &str, separator: u8) -> Vec<&str> {
        csv_separate(line, separator)
            .into_iter()
            .map(|r| &line[r])
            .collect()
    }

    #[test]
    fn separate() {
        assert_eq!(fields("a\tb\t\tc", b'\t'), ["a", "b", "", "c"]);
        assert_eq!(fields("a,\"b,c\",d", b','), ["a", "b,c", "d"]);
        assert_eq!(fields("a,", b','), ["a", ""]);
        assert_eq!(fields("", b','), [""]);
    }

    #[test]
    fn header_and_rows() {
        let text = "sep=,\nScan Number,Sequence,RT\n10,PEPTIDE,\n";
        let mut reader = LineReader::new(Cursor::new(text), "memory");
        let header = CsvHeader::read(&mut reader, b'\t').unwrap();
        assert_eq!(header.separator(), b',');
        let columns = Columns::resolve(&header, SPECS, MissingColumnPolicy::Fail).unwrap();
        let line = reader.next_line().unwrap().unwrap();
        let row = CsvLine::new(line, header.separator());
        assert_eq!(row.parse::<usize>(&columns, "scan").unwrap(), 10);
        assert_eq!(row.field(&columns, "sequence").unwrap(), "PEPTIDE");
        assert_eq!(row.parse_optional::<f64>(&columns, "rt").unwrap(), None);
        let error = row.parse::<f64>(&columns, "sequence").unwrap_err();
        assert!(matches!(error.get_kind(), ParseErrorKind::MalformedRecord));
    }

    #[test]
    fn missing_columns() {
        let mut reader = LineReader::new(Cursor::new("scan\tcharge\n1\t2\n"), "memory");
        let header = CsvHeader::read(&mut reader, b'\t').unwrap();
        let error = Columns::resolve(&header, SPECS, MissingColumnPolicy::Ignore).unwrap_err();
        assert!(matches!(
            error.get_kind(),
            ParseErrorKind::MissingMandatoryField
        ));

        let mut reader = LineReader::new(Cursor::new("scan\tsequence\n"), "memory");
        let header = CsvHeader::read(&mut reader, b'\t').unwrap();
        let columns = Columns::resolve(&header, SPECS, MissingColumnPolicy::Warn).unwrap();
        assert!(!columns.has("rt"));
        assert!(Columns::resolve(&header, SPECS, MissingColumnPolicy::Fail).is_err());

        let mut reader = LineReader::new(Cursor::new(""), "memory");
        assert!(CsvHeader::read(&mut reader, b'\t').is_err());
    }
}
