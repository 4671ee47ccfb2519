// src/spikeglx/recording.rs
use crate::error::{NwbError, Result};
use crate::recording::{check_window, Recording};
use crate::spikeglx::{SpikeGlxMeta, StreamKind};
use chrono::NaiveDateTime;
use memmap2::Mmap;
use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Memory-mapped reader for one SpikeGLX stream.
///
/// Samples are interleaved little-endian `int16`: frame 0 holds one sample
/// per saved channel, then frame 1, and so on. The mapping is validated to be
/// a whole number of frames at open time.
#[derive(Debug)]
pub struct SpikeGlxRecording {
    meta: SpikeGlxMeta,
    kind: StreamKind,
    bin_path: PathBuf,
    mmap: Mmap,
    num_channels: usize,
    num_frames: u64,
    sampling_rate: f64,
    uv_per_bit: Option<f64>,
    channel_ids: Vec<String>,
}

impl SpikeGlxRecording {
    /// Open a stream from its `.meta` path; the `.bin` file must sit next to
    /// it with the same stem.
    pub fn open(meta_path: impl AsRef<Path>) -> Result<Self> {
        let meta_path = meta_path.as_ref();
        let kind = StreamKind::from_path(meta_path)?;
        let meta = SpikeGlxMeta::open(meta_path)?;

        let bin_path = meta_path.with_extension("bin");
        if !bin_path.is_file() {
            return Err(NwbError::BinaryNotFound(bin_path));
        }

        let num_channels = meta.num_saved_channels()?;
        if num_channels == 0 {
            return Err(NwbError::InvalidMeta {
                path: meta_path.to_path_buf(),
                reason: "nSavedChans is zero".to_string(),
            });
        }
        let sampling_rate = meta.sampling_rate(kind)?;

        let file = File::open(&bin_path)?;
        // Safety: the mapping is read-only and the file is not truncated by
        // this process while mapped.
        let mmap = unsafe { Mmap::map(&file)? };

        let frame_bytes = num_channels * std::mem::size_of::<i16>();
        if mmap.len() % frame_bytes != 0 {
            return Err(NwbError::InvalidShape(format!(
                "{} has {} bytes, not a multiple of the {}-byte frame",
                bin_path.display(),
                mmap.len(),
                frame_bytes
            )));
        }
        let num_frames = (mmap.len() / frame_bytes) as u64;

        let uv_per_bit = meta.microvolts_per_bit(kind);
        let channel_ids = (0..num_channels)
            .map(|index| format!("{}{index}", kind.channel_prefix()))
            .collect();

        log::debug!(
            "opened {} stream {}: {} channels x {} frames @ {} Hz",
            kind,
            bin_path.display(),
            num_channels,
            num_frames,
            sampling_rate
        );

        Ok(SpikeGlxRecording {
            meta,
            kind,
            bin_path,
            mmap,
            num_channels,
            num_frames,
            sampling_rate,
            uv_per_bit,
            channel_ids,
        })
    }

    pub fn meta(&self) -> &SpikeGlxMeta {
        &self.meta
    }

    pub fn stream_kind(&self) -> StreamKind {
        self.kind
    }

    pub fn bin_path(&self) -> &Path {
        &self.bin_path
    }

    /// Index of a channel id, e.g. `"XA3"`.
    pub fn channel_index(&self, channel_id: &str) -> Result<usize> {
        self.channel_ids
            .iter()
            .position(|id| id == channel_id)
            .ok_or_else(|| NwbError::ChannelNotFound(channel_id.to_string()))
    }

    fn samples(&self) -> Result<&[i16]> {
        bytemuck::try_cast_slice(&self.mmap[..]).map_err(|_| {
            NwbError::InvalidShape(format!(
                "{} is not aligned for int16 access",
                self.bin_path.display()
            ))
        })
    }
}

impl Recording for SpikeGlxRecording {
    fn num_frames(&self) -> u64 {
        self.num_frames
    }

    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn sampling_frequency(&self) -> f64 {
        self.sampling_rate
    }

    fn channel_ids(&self) -> Vec<String> {
        self.channel_ids.clone()
    }

    fn get_traces(&self, frames: Range<u64>, channels: Range<usize>) -> Result<Vec<i16>> {
        check_window(&frames, &channels, self.num_frames, self.num_channels)?;
        let samples = self.samples()?;
        let mut out =
            Vec::with_capacity((frames.end - frames.start) as usize * channels.len());
        for frame in frames {
            let row_start = frame as usize * self.num_channels;
            out.extend_from_slice(&samples[row_start + channels.start..row_start + channels.end]);
        }
        Ok(out)
    }

    fn microvolts_per_bit(&self) -> f64 {
        self.uv_per_bit.unwrap_or(1.0)
    }

    fn session_start_time(&self) -> Option<NaiveDateTime> {
        self.meta.session_start_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Write;

    fn write_fixture(dir: &Path, num_channels: usize, num_frames: u64) -> PathBuf {
        let meta_path = dir.join("run_g0_t0.nidq.meta");
        let mut meta = File::create(&meta_path).unwrap();
        writeln!(meta, "nSavedChans={num_channels}").unwrap();
        writeln!(meta, "niSampRate=25000").unwrap();
        writeln!(meta, "fileCreateTime=2020-11-03T10:35:10").unwrap();
        writeln!(meta, "niAiRangeMin=-5").unwrap();
        writeln!(meta, "niAiRangeMax=5").unwrap();
        writeln!(meta, "niDev1ProductName=PXI-6133").unwrap();

        let mut bin = File::create(dir.join("run_g0_t0.nidq.bin")).unwrap();
        for frame in 0..num_frames {
            for channel in 0..num_channels {
                bin.write_i16::<LittleEndian>((frame * num_channels as u64 + channel as u64) as i16)
                    .unwrap();
            }
        }
        meta_path
    }

    #[test]
    fn test_open_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = write_fixture(dir.path(), 4, 100);

        let recording = SpikeGlxRecording::open(&meta_path).unwrap();
        assert_eq!(recording.num_channels(), 4);
        assert_eq!(recording.num_frames(), 100);
        assert_eq!(recording.stream_kind(), StreamKind::Nidq);
        assert_eq!(recording.channel_ids()[0], "XA0");

        let traces = recording.get_traces(2..4, 1..3).unwrap();
        assert_eq!(traces, vec![9, 10, 13, 14]);
    }

    #[test]
    fn test_missing_bin_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = dir.path().join("run_g0_t0.nidq.meta");
        std::fs::write(&meta_path, "nSavedChans=4\nniSampRate=25000\n").unwrap();
        let err = SpikeGlxRecording::open(&meta_path).unwrap_err();
        assert!(matches!(err, NwbError::BinaryNotFound(_)));
    }

    #[test]
    fn test_partial_frame_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = write_fixture(dir.path(), 4, 10);
        // Append a stray byte so the mapping is no longer whole frames.
        let mut bin = std::fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join("run_g0_t0.nidq.bin"))
            .unwrap();
        bin.write_all(&[0u8]).unwrap();
        drop(bin);

        let err = SpikeGlxRecording::open(&meta_path).unwrap_err();
        assert!(matches!(err, NwbError::InvalidShape(_)));
    }

    #[test]
    fn test_channel_index_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = write_fixture(dir.path(), 4, 10);
        let recording = SpikeGlxRecording::open(&meta_path).unwrap();
        assert_eq!(recording.channel_index("XA2").unwrap(), 2);
        assert!(recording.channel_index("XA9").is_err());
    }

    #[test]
    fn test_scaling_from_range() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = write_fixture(dir.path(), 2, 10);
        let recording = SpikeGlxRecording::open(&meta_path).unwrap();
        assert!((recording.microvolts_per_bit() - 5.0 / 32768.0 * 1e6).abs() < 1e-9);
        assert_eq!(
            recording
                .session_start_time()
                .unwrap()
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
            "2020-11-03T10:35:10"
        );
    }
}
