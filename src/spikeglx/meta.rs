// src/spikeglx/meta.rs
use crate::error::{NwbError, Result};
use crate::metadata::parse_session_time;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Which SpikeGLX stream a `.meta`/`.bin` pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Imec action-potential (high-pass) band.
    Ap,
    /// Imec local-field (low-pass) band.
    Lf,
    /// National Instruments auxiliary (NIDQ) board.
    Nidq,
}

impl StreamKind {
    /// Infer the stream kind from a `.meta` file name
    /// (`run_g0_t0.imec0.ap.meta`, `run_g0_t0.nidq.meta`, ...).
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if name.ends_with(".ap.meta") || name.ends_with(".ap.bin") {
            Ok(StreamKind::Ap)
        } else if name.ends_with(".lf.meta") || name.ends_with(".lf.bin") {
            Ok(StreamKind::Lf)
        } else if name.ends_with(".nidq.meta") || name.ends_with(".nidq.bin") {
            Ok(StreamKind::Nidq)
        } else {
            Err(NwbError::InvalidMeta {
                path: path.to_path_buf(),
                reason: "file name does not end in .ap/.lf/.nidq + .meta/.bin".to_string(),
            })
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::Ap => "ap",
            StreamKind::Lf => "lf",
            StreamKind::Nidq => "nidq",
        }
    }

    /// Header key holding the sampling rate for this stream.
    pub fn sample_rate_key(&self) -> &'static str {
        match self {
            StreamKind::Ap | StreamKind::Lf => "imSampRate",
            StreamKind::Nidq => "niSampRate",
        }
    }

    fn range_keys(&self) -> (&'static str, &'static str) {
        match self {
            StreamKind::Ap | StreamKind::Lf => ("imAiRangeMin", "imAiRangeMax"),
            StreamKind::Nidq => ("niAiRangeMin", "niAiRangeMax"),
        }
    }

    /// Prefix used when synthesizing channel ids ("AP0", "LF0", "XA0", ...).
    pub fn channel_prefix(&self) -> &'static str {
        match self {
            StreamKind::Ap => "AP",
            StreamKind::Lf => "LF",
            StreamKind::Nidq => "XA",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parsed SpikeGLX `.meta` header.
///
/// Headers are `key=value` lines; keys starting with `~` carry array values
/// (channel maps, shank maps) and are preserved verbatim. Unknown keys are
/// kept so device descriptions can serialize the full header.
#[derive(Debug, Clone)]
pub struct SpikeGlxMeta {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl SpikeGlxMeta {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = fs::read_to_string(&path)?;
        Self::parse(&path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(NwbError::InvalidMeta {
                    path: path.to_path_buf(),
                    reason: format!("line {} has no '=': {line}", line_no + 1),
                });
            };
            entries.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(SpikeGlxMeta {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| NwbError::MissingMetaKey(key.to_string()))
    }

    /// All header entries in sorted key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn require_parsed<T: std::str::FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.require(key)?;
        raw.parse().map_err(|_| NwbError::InvalidMeta {
            path: self.path.clone(),
            reason: format!("{key} is not a valid number: {raw}"),
        })
    }

    /// Total saved channel count (`nSavedChans`).
    pub fn num_saved_channels(&self) -> Result<usize> {
        self.require_parsed("nSavedChans")
    }

    /// Sampling rate in Hz for the given stream kind.
    pub fn sampling_rate(&self, kind: StreamKind) -> Result<f64> {
        self.require_parsed(kind.sample_rate_key())
    }

    /// Recording duration in seconds, when the header carries it.
    pub fn file_time_secs(&self) -> Option<f64> {
        self.get("fileTimeSecs").and_then(|v| v.parse().ok())
    }

    /// Session start time from `fileCreateTime`.
    pub fn session_start_time(&self) -> Option<NaiveDateTime> {
        self.get("fileCreateTime").and_then(parse_session_time)
    }

    /// NIDQ device product name (`niDev1ProductName`).
    pub fn product_name(&self) -> Option<&str> {
        self.get("niDev1ProductName")
    }

    /// Analog input range in volts for the stream kind, when present.
    pub fn ai_range(&self, kind: StreamKind) -> Option<(f64, f64)> {
        let (min_key, max_key) = kind.range_keys();
        let min = self.get(min_key)?.parse().ok()?;
        let max = self.get(max_key)?.parse().ok()?;
        Some((min, max))
    }

    /// Microvolts represented by one raw ADC count, derived from the analog
    /// input range over the signed 16-bit sample width. `None` when the header
    /// carries no range for this stream.
    pub fn microvolts_per_bit(&self, kind: StreamKind) -> Option<f64> {
        let (min, max) = self.ai_range(kind)?;
        let half_range = (max - min) / 2.0;
        Some(half_range / 32768.0 * 1e6)
    }
}
