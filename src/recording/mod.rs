// src/recording/mod.rs
//! Generic access to extracellular recordings.

pub mod ttl;

use crate::error::{NwbError, Result};
use crate::types::DataType;
use chrono::NaiveDateTime;
use std::ops::Range;
use std::sync::Arc;

/// Frame-major access to an extracellular recording.
///
/// Implementations expose interleaved `int16` samples: frame `f` holds one
/// sample per channel, and `get_traces` returns the requested window in
/// C order (frames outermost).
pub trait Recording: Send + Sync {
    fn num_frames(&self) -> u64;

    fn num_channels(&self) -> usize;

    fn dtype(&self) -> DataType {
        DataType::I16
    }

    fn sampling_frequency(&self) -> f64;

    fn channel_ids(&self) -> Vec<String>;

    /// Read a window of samples, frame-major.
    ///
    /// The returned vector has `(frames.end - frames.start) * channels.len()`
    /// elements. Out-of-bounds ranges are errors, not truncations.
    fn get_traces(&self, frames: Range<u64>, channels: Range<usize>) -> Result<Vec<i16>>;

    /// Microvolts represented by one raw count; 1.0 when unknown.
    fn microvolts_per_bit(&self) -> f64 {
        1.0
    }

    fn session_start_time(&self) -> Option<NaiveDateTime> {
        None
    }
}

/// Validate a requested window against a recording's bounds.
pub(crate) fn check_window(
    frames: &Range<u64>,
    channels: &Range<usize>,
    num_frames: u64,
    num_channels: usize,
) -> Result<()> {
    if frames.start > frames.end || frames.end > num_frames {
        return Err(NwbError::FrameRangeOutOfBounds {
            start: frames.start,
            end: frames.end,
            num_frames,
        });
    }
    if channels.start > channels.end || channels.end > num_channels {
        return Err(NwbError::ChannelNotFound(format!(
            "channel range {}..{} out of bounds for {} channels",
            channels.start, channels.end, num_channels
        )));
    }
    Ok(())
}

/// A frame-range view over another recording.
///
/// Used for stub conversions: the view reports a shortened frame count and
/// offsets every read, leaving channel layout and scaling untouched. Views
/// compose, so a sub of a sub is valid.
pub struct SubRecording {
    inner: Arc<dyn Recording>,
    start: u64,
    end: u64,
}

impl SubRecording {
    pub fn new(inner: Arc<dyn Recording>, frames: Range<u64>) -> Result<Self> {
        check_window(&frames, &(0..0), inner.num_frames(), inner.num_channels())?;
        Ok(SubRecording {
            inner,
            start: frames.start,
            end: frames.end,
        })
    }

    /// Clamped view of the first `frames` frames.
    pub fn stub(inner: Arc<dyn Recording>, frames: u64) -> Self {
        let end = frames.min(inner.num_frames());
        SubRecording {
            inner,
            start: 0,
            end,
        }
    }
}

impl Recording for SubRecording {
    fn num_frames(&self) -> u64 {
        self.end - self.start
    }

    fn num_channels(&self) -> usize {
        self.inner.num_channels()
    }

    fn dtype(&self) -> DataType {
        self.inner.dtype()
    }

    fn sampling_frequency(&self) -> f64 {
        self.inner.sampling_frequency()
    }

    fn channel_ids(&self) -> Vec<String> {
        self.inner.channel_ids()
    }

    fn get_traces(&self, frames: Range<u64>, channels: Range<usize>) -> Result<Vec<i16>> {
        check_window(&frames, &channels, self.num_frames(), self.num_channels())?;
        self.inner
            .get_traces(self.start + frames.start..self.start + frames.end, channels)
    }

    fn microvolts_per_bit(&self) -> f64 {
        self.inner.microvolts_per_bit()
    }

    fn session_start_time(&self) -> Option<NaiveDateTime> {
        self.inner.session_start_time()
    }
}

/// An in-memory recording over frame-major `int16` samples.
///
/// Backs small acquisitions (test signals, already-loaded auxiliary data) so
/// they flow through the same chunked write path as file-backed streams.
pub struct MemoryRecording {
    samples: Vec<i16>,
    num_channels: usize,
    rate: f64,
    uv_per_bit: f64,
}

impl MemoryRecording {
    pub fn new(samples: Vec<i16>, num_channels: usize, rate: f64) -> Result<Self> {
        if num_channels == 0 || samples.len() % num_channels != 0 {
            return Err(NwbError::InvalidShape(format!(
                "{} samples do not form whole frames of {} channels",
                samples.len(),
                num_channels
            )));
        }
        Ok(MemoryRecording {
            samples,
            num_channels,
            rate,
            uv_per_bit: 1.0,
        })
    }

    pub fn with_microvolts_per_bit(mut self, uv_per_bit: f64) -> Self {
        self.uv_per_bit = uv_per_bit;
        self
    }
}

impl Recording for MemoryRecording {
    fn num_frames(&self) -> u64 {
        (self.samples.len() / self.num_channels) as u64
    }

    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn sampling_frequency(&self) -> f64 {
        self.rate
    }

    fn channel_ids(&self) -> Vec<String> {
        (0..self.num_channels).map(|c| format!("CH{c}")).collect()
    }

    fn get_traces(&self, frames: Range<u64>, channels: Range<usize>) -> Result<Vec<i16>> {
        check_window(&frames, &channels, self.num_frames(), self.num_channels)?;
        let mut out = Vec::with_capacity((frames.end - frames.start) as usize * channels.len());
        for frame in frames {
            let row = frame as usize * self.num_channels;
            out.extend_from_slice(&self.samples[row + channels.start..row + channels.end]);
        }
        Ok(out)
    }

    fn microvolts_per_bit(&self) -> f64 {
        self.uv_per_bit
    }
}
