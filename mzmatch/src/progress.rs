//! Progress reporting and cooperative cancellation

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::model::SpectrumKey;

/// The caller side of a parse. Every method has a no-op default so a handler only needs to
/// implement what it is interested in.
pub trait ProgressHandler {
    /// The maximal progress value that will be reported
    fn set_maximum(&mut self, _maximum: u64) {}
    /// The current progress
    fn set_progress(&mut self, _progress: u64) {}
    /// A spectrum match was completed
    fn spectrum_flushed(&mut self, _key: &SpectrumKey) {}
    /// Checked once per record, when this returns true the parse stops and returns all spectrum
    /// matches flushed so far
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Ignore all progress
impl ProgressHandler for () {}

/// A shared cancellation flag, clones refer to the same flag so one can be handed to another
/// thread while the other is passed into a parse.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a new flag that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl ProgressHandler for CancellationToken {
    fn is_cancelled(&self) -> bool {
        Self::is_cancelled(self)
    }
}

/// The bounded counter progress is reported on
pub const PROGRESS_MAXIMUM: u64 = 100;

/// Scale byte offsets to a bounded counter, only reporting when the value changes
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct ProgressScale {
    length: Option<u64>,
    last: u64,
}

impl ProgressScale {
    /// Start reporting for a file of the given length, unknown lengths (compressed or in memory
    /// data) report nothing until the end
    pub(crate) fn start(length: Option<u64>, progress: &mut dyn ProgressHandler) -> Self {
        progress.set_maximum(PROGRESS_MAXIMUM);
        progress.set_progress(0);
        Self {
            length: length.filter(|l| *l > 0),
            last: 0,
        }
    }

    /// Report the current offset
    pub(crate) fn update(&mut self, offset: u64, progress: &mut dyn ProgressHandler) {
        if let Some(length) = self.length {
            let value = (u128::from(offset.min(length)) * u128::from(PROGRESS_MAXIMUM)
                / u128::from(length)) as u64;
            if value != self.last {
                self.last = value;
                progress.set_progress(value);
            }
        }
    }

    /// Report completion
    pub(crate) fn finish(&mut self, progress: &mut dyn ProgressHandler) {
        if self.last != PROGRESS_MAXIMUM {
            self.last = PROGRESS_MAXIMUM;
            progress.set_progress(PROGRESS_MAXIMUM);
        }
    }
}
