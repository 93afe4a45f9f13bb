//! Random access indexing: one forward pass records where every structural unit starts, after
//! which each unit is read by seeking to its offset.

use std::{
    hash::Hash,
    io::{BufRead, Seek},
};

use indexmap::IndexMap;

use crate::{
    error::ParseError,
    io::{Line, LineReader},
    progress::{ProgressHandler, ProgressScale},
};

/// The start of a structural unit in a file
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct IndexRecord {
    /// The byte offset into the file
    pub offset: u64,
    /// The line index
    pub line_index: u32,
}

impl From<&Line<'_>> for IndexRecord {
    fn from(line: &Line<'_>) -> Self {
        Self {
            offset: line.offset,
            line_index: line.line_index,
        }
    }
}

/// An immutable map from ids to the positions of their records, ids are kept in the order they
/// were first seen in the file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OffsetIndex<K: Hash + Eq> {
    records: IndexMap<K, Vec<IndexRecord>>,
}

impl<K: Hash + Eq> Default for OffsetIndex<K> {
    fn default() -> Self {
        Self {
            records: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq> OffsetIndex<K> {
    /// All records for an id, in file order
    pub fn get(&self, id: &K) -> Option<&[IndexRecord]> {
        self.records.get(id).map(Vec::as_slice)
    }

    /// The first record for an id
    pub fn first(&self, id: &K) -> Option<IndexRecord> {
        self.records.get(id).and_then(|r| r.first().copied())
    }

    /// All ids in the order they were first seen
    pub fn ids(&self) -> impl Iterator<Item = &K> {
        self.records.keys()
    }

    /// The number of ids
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The total number of records over all ids
    pub fn record_count(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }
}

/// Builds an [`OffsetIndex`], only [`IndexBuilder::finish`] gives access to the index so it
/// cannot change after it was built.
#[derive(Debug)]
pub(crate) struct IndexBuilder<K: Hash + Eq> {
    records: IndexMap<K, Vec<IndexRecord>>,
}

impl<K: Hash + Eq> IndexBuilder<K> {
    pub(crate) fn new() -> Self {
        Self {
            records: IndexMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, id: K, record: IndexRecord) {
        self.records.entry(id).or_default().push(record);
    }

    pub(crate) fn finish(self) -> OffsetIndex<K> {
        OffsetIndex {
            records: self.records,
        }
    }
}

/// Scan all lines from the current position of the reader to the end of the file. For every
/// line `classify` can register records in the indices it owns, returning `Ok(false)` stops
/// the scan early (the next line to read is then the line after the current one). Progress is
/// reported along the way and the scan stops early when cancelled, which is reported in the
/// returned boolean (`true` if the end was reached).
/// # Errors
/// If the reader fails or `classify` returns an error.
pub(crate) fn scan_lines<R: BufRead + Seek>(
    reader: &mut LineReader<R>,
    length: Option<u64>,
    progress: &mut dyn ProgressHandler,
    mut classify: impl FnMut(&Line<'_>) -> Result<bool, ParseError>,
) -> Result<bool, ParseError> {
    let mut scale = ProgressScale::start(length, progress);
    loop {
        if progress.is_cancelled() {
            return Ok(false);
        }
        let Some(line) = reader.next_line()? else {
            break;
        };
        let offset = line.offset;
        if !classify(&line)? {
            break;
        }
        scale.update(offset, progress);
    }
    scale.finish(progress);
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const BLOCKS: &str = "S\t1\nT\t1\ta\nS\t2\nT\t2\tb\nT\t1\tc\n\nS\t3\n";

    #[test]
    fn bijection() {
        let mut reader = LineReader::new(Cursor::new(BLOCKS), "memory");
        let mut spectra = IndexBuilder::new();
        let mut tags = IndexBuilder::new();
        let complete = scan_lines(&mut reader, Some(BLOCKS.len() as u64), &mut (), |line| {
            let mut fields = line.text.split('\t');
            match (fields.next(), fields.next()) {
                (Some("S"), Some(id)) => spectra.insert(id.to_string(), line.into()),
                (Some("T"), Some(id)) => tags.insert(id.to_string(), line.into()),
                _ => (),
            }
            Ok(true)
        })
        .unwrap();
        assert!(complete);
        let spectra = spectra.finish();
        let tags = tags.finish();
        assert_eq!(spectra.ids().collect::<Vec<_>>(), ["1", "2", "3"]);
        assert_eq!(spectra.record_count(), 3);
        assert_eq!(tags.get(&"1".to_string()).map(<[_]>::len), Some(2));
        assert!(tags.get(&"3".to_string()).is_none());

        // Every offset points at a record of the expected kind for the expected id
        let mut seen = std::collections::HashSet::new();
        for (marker, index) in [("S", &spectra), ("T", &tags)] {
            for id in index.ids() {
                for record in index.get(id).unwrap() {
                    assert!(seen.insert(record.offset));
                    reader.seek_to(record.offset, record.line_index).unwrap();
                    let line = reader.next_line().unwrap().unwrap();
                    let mut fields = line.text.split('\t');
                    assert_eq!(fields.next(), Some(marker));
                    assert_eq!(fields.next(), Some(id.as_str()));
                    assert_eq!(line.line_index, record.line_index);
                }
            }
        }
    }

    #[test]
    fn cancelled() {
        let token = crate::progress::CancellationToken::new();
        token.cancel();
        let mut reader = LineReader::new(Cursor::new(BLOCKS), "memory");
        let mut progress = token.clone();
        let complete = scan_lines(&mut reader, None, &mut progress, |_| Ok(true)).unwrap();
        assert!(!complete);
    }
}
