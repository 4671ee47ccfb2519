// src/nwb/series.rs
use crate::recording::Recording;
use crate::types::DataType;
use std::fmt;
use std::sync::Arc;

/// Backing data of an acquisition series.
///
/// Small series can live in memory; recording-backed series stay lazy and are
/// streamed chunk-by-chunk at serialization time.
#[derive(Clone)]
pub enum AcquisitionData {
    /// In-memory frame-major samples with an explicit channel count.
    Int16 {
        samples: Vec<i16>,
        num_channels: usize,
    },
    /// Lazy samples pulled from a recording during the write.
    Recording {
        recording: Arc<dyn Recording>,
        /// Emit `float32` microvolt samples instead of raw counts.
        scaled: bool,
    },
}

impl AcquisitionData {
    /// Frames-by-channels shape.
    pub fn shape(&self) -> (u64, u64) {
        match self {
            AcquisitionData::Int16 {
                samples,
                num_channels,
            } => {
                if *num_channels == 0 {
                    (0, 0)
                } else {
                    ((samples.len() / num_channels) as u64, *num_channels as u64)
                }
            }
            AcquisitionData::Recording { recording, .. } => {
                (recording.num_frames(), recording.num_channels() as u64)
            }
        }
    }

    pub fn dtype(&self) -> DataType {
        match self {
            AcquisitionData::Int16 { .. } => DataType::I16,
            AcquisitionData::Recording { recording, scaled } => {
                if *scaled {
                    DataType::F32
                } else {
                    recording.dtype()
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let (frames, channels) = self.shape();
        frames == 0 || channels == 0
    }
}

impl fmt::Debug for AcquisitionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (frames, channels) = self.shape();
        match self {
            AcquisitionData::Int16 { .. } => {
                write!(f, "AcquisitionData::Int16({frames} x {channels})")
            }
            AcquisitionData::Recording { scaled, .. } => write!(
                f,
                "AcquisitionData::Recording({frames} x {channels}, scaled: {scaled})"
            ),
        }
    }
}

/// A raw voltage acquisition tied to rows of the electrodes table.
#[derive(Debug, Clone)]
pub struct ElectricalSeries {
    pub name: String,
    pub description: String,
    /// Row indices into the file's electrodes table, one per data column.
    pub electrode_indices: Vec<usize>,
    /// Sampling rate in Hz.
    pub rate: f64,
    /// Time of the first sample, seconds from session start.
    pub starting_time: f64,
    /// Multiply stored values by this to obtain volts.
    pub conversion: f64,
    /// Added after scaling, in volts.
    pub offset: f64,
    pub unit: String,
    pub data: AcquisitionData,
}

impl ElectricalSeries {
    pub fn new(name: impl Into<String>, rate: f64, data: AcquisitionData) -> Self {
        ElectricalSeries {
            name: name.into(),
            description: String::new(),
            electrode_indices: Vec::new(),
            rate,
            starting_time: 0.0,
            conversion: 1.0,
            offset: 0.0,
            unit: "volts".to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::test_support::PatternRecording;

    #[test]
    fn test_memory_shape() {
        let data = AcquisitionData::Int16 {
            samples: vec![0; 12],
            num_channels: 3,
        };
        assert_eq!(data.shape(), (4, 3));
        assert_eq!(data.dtype(), DataType::I16);
        assert!(!data.is_empty());
    }

    #[test]
    fn test_empty_memory_data() {
        let data = AcquisitionData::Int16 {
            samples: Vec::new(),
            num_channels: 4,
        };
        assert!(data.is_empty());
    }

    #[test]
    fn test_recording_backed_shape_and_dtype() {
        let data = AcquisitionData::Recording {
            recording: Arc::new(PatternRecording::new(50, 8)),
            scaled: true,
        };
        assert_eq!(data.shape(), (50, 8));
        assert_eq!(data.dtype(), DataType::F32);
    }

    #[test]
    fn test_series_defaults() {
        let series = ElectricalSeries::new(
            "ElectricalSeriesNIDQ",
            25_000.0,
            AcquisitionData::Int16 {
                samples: Vec::new(),
                num_channels: 0,
            },
        );
        assert_eq!(series.unit, "volts");
        assert_eq!(series.conversion, 1.0);
        assert_eq!(series.starting_time, 0.0);
    }
}
