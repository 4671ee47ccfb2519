// src/converter.rs
//! Conversion orchestration.

use crate::backend::{Backend, ZarrBackendConfiguration};
use crate::error::{NwbError, Result};
use crate::interface::{ConversionOptions, DataInterface};
use crate::metadata::Metadata;
use crate::nwb::NwbFile;
use crate::store::{self, WriteReport};
use std::path::Path;

/// Runs a set of data interfaces into one NWB file.
///
/// Interface metadata is merged in order (later interfaces win on conflicts)
/// and user metadata is merged last. The converter owns the full pipeline:
/// validate, build the in-memory model, derive the backend configuration,
/// serialize.
pub struct NwbConverter {
    interfaces: Vec<Box<dyn DataInterface>>,
}

impl NwbConverter {
    pub fn new(interfaces: Vec<Box<dyn DataInterface>>) -> Self {
        NwbConverter { interfaces }
    }

    pub fn interfaces(&self) -> &[Box<dyn DataInterface>] {
        &self.interfaces
    }

    /// Merged starting metadata from every interface, with defaults filled.
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        for interface in &self.interfaces {
            metadata.deep_update(&interface.metadata());
        }
        metadata.ensure_defaults();
        metadata
    }

    pub fn validate_metadata(&self, metadata: &Metadata) -> Result<()> {
        metadata.validate_for_conversion()
    }

    /// Build the in-memory file model by running every interface.
    pub fn create_nwbfile(
        &self,
        metadata: &Metadata,
        options: &ConversionOptions,
    ) -> Result<NwbFile> {
        self.validate_metadata(metadata)?;
        let mut nwbfile = NwbFile::new(
            metadata
                .session_description()
                .expect("validated above")
                .to_string(),
            metadata.identifier().expect("validated above").to_string(),
            metadata.session_start_time(),
        );
        for interface in &self.interfaces {
            log::debug!("running interface {}", interface.name());
            interface.add_to_nwbfile(&mut nwbfile, metadata, options)?;
        }
        Ok(nwbfile)
    }

    /// Run the whole conversion and write the store at `output`.
    ///
    /// `metadata` overrides the merged interface metadata; pass `None` to use
    /// it as-is. Only the Zarr backend serializes; HDF5 is configuration-only.
    pub fn run_conversion(
        &self,
        output: impl AsRef<Path>,
        metadata: Option<Metadata>,
        backend: Backend,
        options: &ConversionOptions,
    ) -> Result<WriteReport> {
        if backend != Backend::Zarr {
            return Err(NwbError::Unsupported(format!(
                "serialization to the {backend} backend; derive its configuration instead"
            )));
        }

        let mut merged = self.metadata();
        if let Some(user_metadata) = metadata {
            merged.deep_update(&user_metadata);
        }
        let nwbfile = self.create_nwbfile(&merged, options)?;

        let mut configuration = ZarrBackendConfiguration::from_nwbfile(&nwbfile);
        configuration.number_of_jobs = options.number_of_jobs;
        for dataset in configuration.dataset_configurations.values_mut() {
            dataset.compression_level = options.compression_level;
        }

        log::info!(
            "converting {} interface(s) into {}",
            self.interfaces.len(),
            output.as_ref().display()
        );
        store::write_nwbfile(output, &nwbfile, &configuration)
    }
}
