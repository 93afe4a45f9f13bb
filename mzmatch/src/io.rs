//! Buffered line reading with byte offsets, shared by all text formats

use std::{
    fs::File,
    io::{BufRead, BufReader, Seek, SeekFrom},
    path::Path,
};

use context_error::{BoxedError, CreateError, Context};
use flate2::bufread::GzDecoder;

use crate::{
    error::{ParseError, ParseErrorKind, io_error},
    helper_functions::check_extension,
};

/// A boxed buffered reader, used for formats that are read in one forward pass
pub(crate) type SequentialReader = Box<dyn BufRead + Send>;

/// Open a file for a single forward pass, gzipped files are decompressed on the fly. Returns the
/// reader and the file length, if it is known (it is not for compressed files).
/// # Errors
/// If the file could not be opened.
pub(crate) fn open_sequential(
    path: &Path,
    capacity: usize,
) -> Result<(SequentialReader, Option<u64>), ParseError> {
    let (file, length) = open_file(path)?;
    if check_extension(path, "gz") {
        Ok((
            Box::new(BufReader::with_capacity(
                capacity,
                GzDecoder::new(BufReader::with_capacity(capacity, file)),
            )),
            None,
        ))
    } else {
        Ok((Box::new(BufReader::with_capacity(capacity, file)), length))
    }
}

/// Open a file for random access.
/// # Errors
/// If the file could not be opened or is compressed.
pub(crate) fn open_seekable(
    path: &Path,
    capacity: usize,
) -> Result<(BufReader<File>, Option<u64>), ParseError> {
    if check_extension(path, "gz") {
        return Err(BoxedError::new(
            ParseErrorKind::IO,
            "Compressed file not supported",
            "This format is read with random access, decompress the file first",
            Context::none()
                .source(path.to_string_lossy().to_string())
                .to_owned(),
        ));
    }
    let (file, length) = open_file(path)?;
    Ok((BufReader::with_capacity(capacity, file), length))
}

fn open_file(path: &Path) -> Result<(File, Option<u64>), ParseError> {
    let source = path.to_string_lossy();
    let file = File::open(path).map_err(|e| io_error(&e, &source))?;
    let length = file.metadata().ok().map(|m| m.len());
    Ok((file, length))
}

/// A single line with its position in the file
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Line<'a> {
    /// The byte offset of the start of the line
    pub offset: u64,
    /// The 0-based line index
    pub line_index: u32,
    /// The text without line ending
    pub text: &'a str,
}

impl Line<'_> {
    /// The context of the full line
    pub(crate) fn context(&self) -> Context<'static> {
        Context::full_line(self.line_index, self.text.to_string())
    }

    /// The context of a part of the line, the part has to be a subslice of the text
    pub(crate) fn part_context(&self, part: &str) -> Context<'static> {
        let start = (part.as_ptr() as usize)
            .checked_sub(self.text.as_ptr() as usize)
            .filter(|s| *s + part.len() <= self.text.len())
            .unwrap_or(0);
        Context::line(
            Some(self.line_index),
            self.text.to_string(),
            start,
            part.len(),
        )
    }
}

/// A line reader that keeps track of where it is in the file
#[derive(Debug)]
pub(crate) struct LineReader<R> {
    inner: R,
    source: String,
    offset: u64,
    line_index: u32,
    buf: String,
}

impl<R: BufRead> LineReader<R> {
    /// Read from the given reader, the source is the file name used in error messages
    pub(crate) fn new(inner: R, source: impl Into<String>) -> Self {
        Self {
            inner,
            source: source.into(),
            offset: 0,
            line_index: 0,
            buf: String::new(),
        }
    }

    /// The file name used in error messages
    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    /// The byte offset of the next line
    pub(crate) const fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next line, `None` at the end of the file
    /// # Errors
    /// If the underlying reader fails or the line is not valid UTF-8.
    pub(crate) fn next_line(&mut self) -> Result<Option<Line<'_>>, ParseError> {
        self.buf.clear();
        let read = self.inner.read_line(&mut self.buf).map_err(|e| {
            BoxedError::new(
                ParseErrorKind::IO,
                "Could not read line",
                e.to_string(),
                Context::none()
                    .source(self.source.clone())
                    .line_index(self.line_index)
                    .to_owned(),
            )
        })?;
        if read == 0 {
            return Ok(None);
        }
        let line = Line {
            offset: self.offset,
            line_index: self.line_index,
            text: self.buf.trim_end_matches(['\n', '\r']),
        };
        self.offset += read as u64;
        self.line_index += 1;
        Ok(Some(line))
    }

    /// Read lines until one is found that is not empty after trimming
    /// # Errors
    /// See [`Self::next_line`].
    pub(crate) fn next_non_empty_line(&mut self) -> Result<Option<Line<'_>>, ParseError> {
        loop {
            let empty = match self.next_line()? {
                None => return Ok(None),
                Some(line) => line.text.trim().is_empty(),
            };
            if !empty {
                // Reborrow the stored line, the buffer still holds it
                return Ok(Some(Line {
                    offset: self.offset - self.buf.len() as u64,
                    line_index: self.line_index - 1,
                    text: self.buf.trim_end_matches(['\n', '\r']),
                }));
            }
        }
    }
}

impl<R: BufRead + Seek> LineReader<R> {
    /// Jump to a position found earlier, the next line read is the line starting at this offset
    /// # Errors
    /// If the underlying reader cannot seek.
    pub(crate) fn seek_to(&mut self, offset: u64, line_index: u32) -> Result<(), ParseError> {
        self.inner
            .seek(SeekFrom::Start(offset))
            .map_err(|e| io_error(&e, &self.source))?;
        self.offset = offset;
        self.line_index = line_index;
        Ok(())
    }
}
