// src/backend/mod.rs
//! Per-dataset storage configuration.
//!
//! Before serialization every large dataset in the file model gets a
//! [`DatasetIOConfiguration`] describing its chunk geometry and compression.
//! Defaults are derived automatically; callers may adjust individual entries
//! before writing.

mod hdf5;
mod zarr;

pub use hdf5::Hdf5BackendConfiguration;
pub use zarr::ZarrBackendConfiguration;

use crate::error::{NwbError, Result};
use crate::iterator::{
    default_buffer_shape, default_chunk_shape, electrical_series_chunk_shape, DEFAULT_CHUNK_MB,
};
use crate::nwb::NwbFile;
use crate::types::{format_shape, DataType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage backend of an NWB file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Hdf5,
    Zarr,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Hdf5 => f.write_str("hdf5"),
            Backend::Zarr => f.write_str("zarr"),
        }
    }
}

impl FromStr for Backend {
    type Err = NwbError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "hdf5" => Ok(Backend::Hdf5),
            "zarr" => Ok(Backend::Zarr),
            other => Err(NwbError::Unsupported(format!(
                "backend must be 'hdf5' or 'zarr', got '{other}'"
            ))),
        }
    }
}

/// Identity and geometry of one dataset inside the file model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// UUID of the owning neurodata object.
    pub object_id: String,
    /// Slash-separated location in the file, e.g.
    /// `acquisition/ElectricalSeriesAP/data`.
    pub location: String,
    pub full_shape: Vec<u64>,
    pub dtype: DataType,
}

impl DatasetInfo {
    pub fn new(location: impl Into<String>, full_shape: Vec<u64>, dtype: DataType) -> Self {
        DatasetInfo {
            object_id: uuid::Uuid::new_v4().to_string(),
            location: location.into(),
            full_shape,
            dtype,
        }
    }
}

impl fmt::Display for DatasetInfo {
    /// Human-oriented summary, location underlined:
    ///
    /// ```text
    ///
    /// acquisition/TestElectricalSeries/data
    /// -------------------------------------
    ///   full_shape: (1800000, 384)
    ///   dtype: int16
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.location)?;
        writeln!(f, "{}", "-".repeat(self.location.len()))?;
        writeln!(f, "  full_shape: {}", format_shape(&self.full_shape))?;
        write!(f, "  dtype: {}", self.dtype)
    }
}

/// Lossless compression codec applied to chunks.
///
/// `Gzip` maps to the `gzip` filter on HDF5 and the `zlib` codec on Zarr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    Gzip,
    None,
}

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 4;

/// Chunking and compression choices for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetIOConfiguration {
    pub dataset_info: DatasetInfo,
    pub chunk_shape: Vec<u64>,
    pub buffer_shape: Vec<u64>,
    pub compression_method: CompressionMethod,
    pub compression_level: u32,
}

impl DatasetIOConfiguration {
    /// Fill a configuration with automatically derived defaults.
    ///
    /// Two-dimensional datasets are treated as electrical series (long time
    /// axis, channel axis capped at 64); anything else gets the
    /// proportional-axes chunking.
    pub fn from_dataset_info(dataset_info: DatasetInfo) -> Self {
        let chunk_shape = match dataset_info.full_shape.as_slice() {
            &[frames, channels] => {
                let (chunk_frames, chunk_channels) = electrical_series_chunk_shape(
                    frames,
                    channels,
                    dataset_info.dtype,
                    DEFAULT_CHUNK_MB,
                );
                vec![chunk_frames, chunk_channels]
            }
            shape => default_chunk_shape(shape, dataset_info.dtype, DEFAULT_CHUNK_MB),
        };
        let buffer_shape = default_buffer_shape(
            &chunk_shape,
            &dataset_info.full_shape,
            dataset_info.dtype,
            crate::iterator::DEFAULT_BUFFER_GB,
        );
        DatasetIOConfiguration {
            dataset_info,
            chunk_shape,
            buffer_shape,
            compression_method: CompressionMethod::Gzip,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Derive a default configuration for every large dataset in the file.
///
/// Covers each non-empty acquisition's `data` and every numeric electrodes
/// column; string columns are serialized whole and are not configured.
pub fn default_dataset_io_configurations(nwbfile: &NwbFile) -> Vec<DatasetIOConfiguration> {
    let mut configurations = Vec::new();

    for series in nwbfile.acquisitions() {
        if series.data.is_empty() {
            continue;
        }
        let (frames, channels) = series.data.shape();
        let info = DatasetInfo::new(
            format!("acquisition/{}/data", series.name),
            vec![frames, channels],
            series.data.dtype(),
        );
        configurations.push(DatasetIOConfiguration::from_dataset_info(info));
    }

    let electrodes = nwbfile.electrodes();
    for column in electrodes.columns() {
        let Some(dtype) = column.values.dtype() else {
            continue;
        };
        if column.values.is_empty() {
            continue;
        }
        let info = DatasetInfo::new(
            format!(
                "general/extracellular_ephys/{}/{}",
                electrodes.name, column.name
            ),
            vec![column.values.len() as u64],
            dtype,
        );
        configurations.push(DatasetIOConfiguration::from_dataset_info(info));
    }

    configurations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nwb::{AcquisitionData, ColumnValues, Device, ElectricalSeries, ElectrodeGroup};

    fn mock_dataset_info() -> DatasetInfo {
        DatasetInfo {
            object_id: "481a0860-3a0c-40ec-b931-df4a3e9b101f".to_string(),
            location: "acquisition/TestElectricalSeries/data".to_string(),
            full_shape: vec![1_800_000, 384],
            dtype: DataType::I16,
        }
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("hdf5".parse::<Backend>().unwrap(), Backend::Hdf5);
        assert_eq!("zarr".parse::<Backend>().unwrap(), Backend::Zarr);
        assert!("netcdf".parse::<Backend>().is_err());
    }

    #[test]
    fn test_dataset_info_display() {
        let expected = "\n\
            acquisition/TestElectricalSeries/data\n\
            -------------------------------------\n\
            \x20 full_shape: (1800000, 384)\n\
            \x20 dtype: int16";
        assert_eq!(mock_dataset_info().to_string(), expected);
    }

    #[test]
    fn test_dataset_info_hashable() {
        let mut map = std::collections::HashMap::new();
        map.insert(mock_dataset_info(), true);
        assert_eq!(map[&mock_dataset_info()], true);
    }

    #[test]
    fn test_default_configuration_for_series_shape() {
        let configuration = DatasetIOConfiguration::from_dataset_info(mock_dataset_info());
        assert_eq!(configuration.chunk_shape, vec![78_125, 64]);
        assert_eq!(configuration.buffer_shape, vec![781_250, 384]);
        assert_eq!(configuration.compression_method, CompressionMethod::Gzip);
        assert_eq!(configuration.compression_level, DEFAULT_COMPRESSION_LEVEL);
    }

    fn nwbfile_with_series() -> NwbFile {
        let mut nwbfile = NwbFile::new("s", "i", None);
        nwbfile
            .add_device(Device {
                name: "d".to_string(),
                description: String::new(),
                manufacturer: String::new(),
            })
            .unwrap();
        nwbfile
            .add_electrode_group(ElectrodeGroup {
                name: "g".to_string(),
                description: String::new(),
                location: String::new(),
                device: "d".to_string(),
            })
            .unwrap();
        let ids: Vec<String> = (0..4).map(|c| format!("XA{c}")).collect();
        nwbfile.add_electrodes("g", &ids).unwrap();
        nwbfile
            .add_acquisition(ElectricalSeries::new(
                "ElectricalSeriesNIDQ",
                25_000.0,
                AcquisitionData::Int16 {
                    samples: vec![0; 4000],
                    num_channels: 4,
                },
            ))
            .unwrap();
        nwbfile
    }

    #[test]
    fn test_walk_covers_acquisitions() {
        let nwbfile = nwbfile_with_series();
        let configurations = default_dataset_io_configurations(&nwbfile);
        assert_eq!(configurations.len(), 1);
        assert_eq!(
            configurations[0].dataset_info.location,
            "acquisition/ElectricalSeriesNIDQ/data"
        );
        assert_eq!(configurations[0].dataset_info.full_shape, vec![1000, 4]);
    }

    #[test]
    fn test_walk_skips_empty_and_string_datasets() {
        let mut nwbfile = nwbfile_with_series();
        nwbfile
            .add_acquisition(ElectricalSeries::new(
                "EmptySeries",
                25_000.0,
                AcquisitionData::Int16 {
                    samples: Vec::new(),
                    num_channels: 4,
                },
            ))
            .unwrap();
        // String columns (group_name, channel_name) are never configured;
        // a numeric column is.
        nwbfile
            .electrodes_mut()
            .add_column("rel_x", "x position", ColumnValues::F64(vec![0.0; 4]))
            .unwrap();

        let configurations = default_dataset_io_configurations(&nwbfile);
        let locations: Vec<&str> = configurations
            .iter()
            .map(|c| c.dataset_info.location.as_str())
            .collect();
        assert_eq!(
            locations,
            vec![
                "acquisition/ElectricalSeriesNIDQ/data",
                "general/extracellular_ephys/electrodes/rel_x",
            ]
        );
    }
}
