use context_error::{BoxedError, CreateError, Context, ErrorKind};

/// The error type used throughout this crate.
pub type ParseError = BoxedError<'static, ParseErrorKind>;

/// The kind of error that can occur when reading an identification file.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum ParseErrorKind {
    /// The underlying file is missing or could not be read
    #[default]
    IO,
    /// A line, element, or block did not have the structure expected at that point in the file
    MalformedRecord,
    /// A column or attribute needed by the format was not present, raised before any record is read
    MissingMandatoryField,
    /// None of the score fields on a record are known, so no e-value can be determined
    UnrecognizedScoreField,
    /// A modification specificity rule used an unknown code
    UnknownSpecificityRule,
    /// A configuration file could not be read
    InvalidConfiguration,
    /// The file name does not end in the extension of any supported format
    UnknownFormat,
}

impl ErrorKind for ParseErrorKind {
    type Settings = ();
    fn descriptor(&self) -> &'static str {
        "error"
    }
    fn ignored(&self, _settings: Self::Settings) -> bool {
        false
    }
    fn is_error(&self, _settings: Self::Settings) -> bool {
        true
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::IO => "IO failure",
                Self::MalformedRecord => "malformed record",
                Self::MissingMandatoryField => "missing mandatory field",
                Self::UnrecognizedScoreField => "unrecognised score field",
                Self::UnknownSpecificityRule => "unknown specificity rule",
                Self::InvalidConfiguration => "invalid configuration",
                Self::UnknownFormat => "unknown format",
            }
        )
    }
}

/// Wrap an IO error with the path or name of the file that caused it.
pub(crate) fn io_error(error: &std::io::Error, source: &str) -> ParseError {
    BoxedError::new(
        ParseErrorKind::IO,
        "Could not read file",
        error.to_string(),
        Context::none().source(source).to_owned(),
    )
}

/// An error for a line that does not follow the structure of its format.
pub(crate) fn malformed_line(
    short: &'static str,
    long: impl Into<String>,
    line_index: u32,
    line: &str,
) -> ParseError {
    BoxedError::new(
        ParseErrorKind::MalformedRecord,
        short,
        long.into(),
        Context::full_line(line_index, line).to_owned(),
    )
}
