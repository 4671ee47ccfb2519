// src/interface/mod.rs
//! Data interfaces: one per acquisition source format.
//!
//! An interface knows how to open its source, what metadata can be extracted
//! from it, and how to add its contents to an in-memory NWB file. Converters
//! aggregate interfaces and merge their metadata.

mod nidq;
mod spikeglx;

pub use nidq::SpikeGlxNidqInterface;
pub use spikeglx::SpikeGlxRecordingInterface;

use crate::error::Result;
use crate::metadata::Metadata;
use crate::nwb::{AcquisitionData, Device, ElectricalSeries, ElectrodeGroup, NwbFile};
use crate::recording::{Recording, SubRecording};
use serde_json::Value;
use std::sync::Arc;

/// Default stub length in frames for trial conversions.
pub const DEFAULT_STUB_FRAMES: u64 = 100;

/// Per-run conversion knobs, applied to every interface.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Shorten every acquisition to `stub_frames` for a quick trial run.
    pub stub_test: bool,
    pub stub_frames: u64,
    /// Write `float32` microvolt samples instead of raw counts.
    pub write_scaled: bool,
    /// Override the acquisition name of the (single) interface being run.
    pub es_key: Option<String>,
    /// Zlib level for data chunks.
    pub compression_level: u32,
    /// Worker threads for chunk writing; 0 means available parallelism.
    pub number_of_jobs: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        ConversionOptions {
            stub_test: false,
            stub_frames: DEFAULT_STUB_FRAMES,
            write_scaled: false,
            es_key: None,
            compression_level: crate::backend::DEFAULT_COMPRESSION_LEVEL,
            number_of_jobs: 0,
        }
    }
}

/// A single source of data feeding one conversion.
pub trait DataInterface {
    /// Short name used in logs and schemas.
    fn name(&self) -> &str;

    /// JSON description of the source arguments this interface accepts.
    fn source_schema(&self) -> Value;

    /// Metadata extracted from the source, as a starting point for the user.
    fn metadata(&self) -> Metadata;

    /// Add this interface's contents to the file model.
    fn add_to_nwbfile(
        &self,
        nwbfile: &mut NwbFile,
        metadata: &Metadata,
        options: &ConversionOptions,
    ) -> Result<()>;
}

/// Description of one recording's placement in the file, resolved from
/// merged metadata with interface defaults as fallback.
pub(crate) struct SeriesPlan {
    pub series_name: String,
    pub series_description: String,
    pub device: Device,
    pub group: ElectrodeGroup,
}

/// Shared implementation of adding a recording-backed series.
///
/// Creates the device and electrode group if the file does not have them yet
/// (so several streams of one probe can share a device), appends electrode
/// rows, and attaches the series with a lazy data source.
pub(crate) fn add_recording_to_nwbfile(
    recording: Arc<dyn Recording>,
    plan: &SeriesPlan,
    nwbfile: &mut NwbFile,
    options: &ConversionOptions,
) -> Result<()> {
    if nwbfile.device(&plan.device.name).is_none() {
        nwbfile.add_device(plan.device.clone())?;
    }
    if nwbfile.electrode_group(&plan.group.name).is_none() {
        nwbfile.add_electrode_group(plan.group.clone())?;
    }

    let channel_ids = recording.channel_ids();
    let rows = nwbfile.add_electrodes(&plan.group.name, &channel_ids)?;

    let recording: Arc<dyn Recording> = if options.stub_test {
        Arc::new(SubRecording::stub(recording, options.stub_frames))
    } else {
        recording
    };

    let uv_per_bit = recording.microvolts_per_bit();
    let rate = recording.sampling_frequency();
    let mut series = ElectricalSeries::new(
        plan.series_name.clone(),
        rate,
        AcquisitionData::Recording {
            recording,
            scaled: options.write_scaled,
        },
    );
    series.description = plan.series_description.clone();
    series.electrode_indices = rows.collect();
    // Stored values scale to volts: raw counts via the per-bit factor,
    // already-scaled microvolts via 1e-6.
    series.conversion = if options.write_scaled {
        1e-6
    } else {
        uv_per_bit * 1e-6
    };

    log::info!(
        "adding acquisition {} ({} channels @ {} Hz)",
        series.name,
        channel_ids.len(),
        rate
    );
    nwbfile.add_acquisition(series)
}

/// Pick the device entry matching `default_name` out of merged metadata, or
/// fall back to the interface default.
pub(crate) fn resolve_device(metadata: &Metadata, default: &Device) -> Device {
    let Some(Value::Array(devices)) = metadata.get_path(&["Ecephys", "Device"]) else {
        return default.clone();
    };
    let entry = devices
        .iter()
        .find(|entry| entry["name"].as_str() == Some(default.name.as_str()));
    match entry {
        Some(entry) => Device {
            name: default.name.clone(),
            description: entry["description"]
                .as_str()
                .unwrap_or(&default.description)
                .to_string(),
            manufacturer: entry["manufacturer"]
                .as_str()
                .unwrap_or(&default.manufacturer)
                .to_string(),
        },
        None => default.clone(),
    }
}

/// Same resolution for an electrode group entry.
pub(crate) fn resolve_electrode_group(
    metadata: &Metadata,
    default: &ElectrodeGroup,
) -> ElectrodeGroup {
    let Some(Value::Array(groups)) = metadata.get_path(&["Ecephys", "ElectrodeGroup"]) else {
        return default.clone();
    };
    let entry = groups
        .iter()
        .find(|entry| entry["name"].as_str() == Some(default.name.as_str()));
    match entry {
        Some(entry) => ElectrodeGroup {
            name: default.name.clone(),
            description: entry["description"]
                .as_str()
                .unwrap_or(&default.description)
                .to_string(),
            location: entry["location"]
                .as_str()
                .unwrap_or(&default.location)
                .to_string(),
            device: entry["device"].as_str().unwrap_or(&default.device).to_string(),
        },
        None => default.clone(),
    }
}
