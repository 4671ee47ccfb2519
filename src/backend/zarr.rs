// src/backend/zarr.rs
use crate::backend::{default_dataset_io_configurations, DatasetIOConfiguration};
use crate::nwb::NwbFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dataset configurations for a Zarr-backed NWB file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZarrBackendConfiguration {
    /// Keyed by dataset location.
    pub dataset_configurations: BTreeMap<String, DatasetIOConfiguration>,
    /// Worker threads for chunk compression; 0 means available parallelism.
    pub number_of_jobs: usize,
}

impl ZarrBackendConfiguration {
    pub fn from_nwbfile(nwbfile: &NwbFile) -> Self {
        let dataset_configurations = default_dataset_io_configurations(nwbfile)
            .into_iter()
            .map(|configuration| (configuration.dataset_info.location.clone(), configuration))
            .collect();
        ZarrBackendConfiguration {
            dataset_configurations,
            number_of_jobs: 0,
        }
    }

    /// Resolved worker count.
    pub fn effective_jobs(&self) -> usize {
        if self.number_of_jobs > 0 {
            self.number_of_jobs
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub fn dataset(&self, location: &str) -> Option<&DatasetIOConfiguration> {
        self.dataset_configurations.get(location)
    }
}
