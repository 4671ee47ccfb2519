// src/backend/hdf5.rs
use crate::backend::{default_dataset_io_configurations, DatasetIOConfiguration};
use crate::nwb::NwbFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dataset configurations for an HDF5-backed NWB file.
///
/// This crate derives HDF5 configurations (chunk geometry, gzip level) for
/// interchange with HDF5 writers but does not serialize HDF5 itself; see
/// [`Backend::Hdf5`](crate::backend::Backend) handling in the converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hdf5BackendConfiguration {
    /// Keyed by dataset location.
    pub dataset_configurations: BTreeMap<String, DatasetIOConfiguration>,
}

impl Hdf5BackendConfiguration {
    pub fn from_nwbfile(nwbfile: &NwbFile) -> Self {
        let dataset_configurations = default_dataset_io_configurations(nwbfile)
            .into_iter()
            .map(|configuration| (configuration.dataset_info.location.clone(), configuration))
            .collect();
        Hdf5BackendConfiguration {
            dataset_configurations,
        }
    }
}
