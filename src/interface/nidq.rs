// src/interface/nidq.rs
use crate::error::{NwbError, Result};
use crate::interface::{
    add_recording_to_nwbfile, resolve_device, resolve_electrode_group, ConversionOptions,
    DataInterface, SeriesPlan,
};
use crate::metadata::Metadata;
use crate::nwb::{Device, ElectrodeGroup, NwbFile};
use crate::recording::{ttl, Recording};
use crate::spikeglx::{SpikeGlxRecording, StreamKind};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Interface for the National Instruments auxiliary (`.nidq`) stream.
///
/// Besides the raw traces, the NIDQ board carries the sync TTL pulses used to
/// align other streams to a common time basis; see
/// [`event_times_from_ttl`](Self::event_times_from_ttl).
#[derive(Debug)]
pub struct SpikeGlxNidqInterface {
    recording: Arc<SpikeGlxRecording>,
}

impl SpikeGlxNidqInterface {
    pub fn new(meta_path: impl AsRef<Path>) -> Result<Self> {
        let recording = SpikeGlxRecording::open(meta_path)?;
        if recording.stream_kind() != StreamKind::Nidq {
            return Err(NwbError::Unsupported(format!(
                "{} streams are handled by SpikeGlxRecordingInterface",
                recording.stream_kind()
            )));
        }
        Ok(SpikeGlxNidqInterface {
            recording: Arc::new(recording),
        })
    }

    pub fn recording(&self) -> &Arc<SpikeGlxRecording> {
        &self.recording
    }

    /// Channel ids as saved by the acquisition system.
    pub fn channel_names(&self) -> Vec<String> {
        self.recording.channel_ids()
    }

    /// Start times (seconds) of the TTL pulses on one NIDQ channel.
    pub fn event_times_from_ttl(&self, channel_name: &str) -> Result<Vec<f64>> {
        let channel = self.recording.channel_index(channel_name)?;
        ttl::event_times_from_ttl(self.recording.as_ref(), channel)
    }

    fn default_device(&self) -> Device {
        let meta = self.recording.meta();
        let name = meta.product_name().unwrap_or("NIDQBoard").to_string();
        // The full header doubles as the device description, minus the keys
        // already represented elsewhere.
        let mut header = Map::new();
        for (key, value) in meta.entries() {
            if key == "fileCreateTime" || key == "niDev1ProductName" {
                continue;
            }
            header.insert(key.to_string(), Value::String(value.to_string()));
        }
        Device {
            name,
            description: Value::Object(header).to_string(),
            manufacturer: "National Instruments".to_string(),
        }
    }

    fn default_group(&self, device_name: &str) -> ElectrodeGroup {
        ElectrodeGroup {
            name: "NIDQChannelGroup".to_string(),
            description: "A group representing the NIDQ channels.".to_string(),
            location: "unknown".to_string(),
            device: device_name.to_string(),
        }
    }
}

impl DataInterface for SpikeGlxNidqInterface {
    fn name(&self) -> &str {
        "SpikeGLXNIDQ"
    }

    fn source_schema(&self) -> Value {
        json!({
            "required": ["file_path"],
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the SpikeGLX .nidq.meta file."
                }
            }
        })
    }

    fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        if let Some(start) = self.recording.session_start_time() {
            metadata.set_session_start_time(start);
        }
        let device = self.default_device();
        metadata.set_path(
            &["Ecephys", "Device"],
            json!([{
                "name": device.name,
                "description": device.description,
                "manufacturer": device.manufacturer,
            }]),
        );
        let group = self.default_group(&device.name);
        metadata.set_path(
            &["Ecephys", "ElectrodeGroup"],
            json!([{
                "name": group.name,
                "description": group.description,
                "location": group.location,
                "device": group.device,
            }]),
        );
        metadata.set_path(
            &["Ecephys", "Electrodes"],
            json!([{
                "name": "group_name",
                "description": "Name of the ElectrodeGroup this electrode is a part of."
            }]),
        );
        metadata.set_path(
            &["Ecephys", "ElectricalSeriesNIDQ"],
            json!({
                "name": "ElectricalSeriesNIDQ",
                "description": "Raw acquisition traces from the NIDQ (.nidq.bin) channels."
            }),
        );
        metadata
    }

    fn add_to_nwbfile(
        &self,
        nwbfile: &mut NwbFile,
        metadata: &Metadata,
        options: &ConversionOptions,
    ) -> Result<()> {
        let series_name = options
            .es_key
            .clone()
            .or_else(|| {
                metadata
                    .get_str(&["Ecephys", "ElectricalSeriesNIDQ", "name"])
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "ElectricalSeriesNIDQ".to_string());
        let series_description = metadata
            .get_str(&["Ecephys", "ElectricalSeriesNIDQ", "description"])
            .unwrap_or("Raw acquisition traces from the NIDQ (.nidq.bin) channels.")
            .to_string();

        let device = resolve_device(metadata, &self.default_device());
        let group = resolve_electrode_group(metadata, &self.default_group(&device.name));
        let plan = SeriesPlan {
            series_name,
            series_description,
            device,
            group,
        };
        let recording: Arc<dyn Recording> = self.recording.clone();
        add_recording_to_nwbfile(recording, &plan, nwbfile, options)?;

        // Column descriptions supplied through metadata.
        if let Some(Value::Array(columns)) = metadata.get_path(&["Ecephys", "Electrodes"]) {
            for column in columns {
                let (Some(name), Some(description)) =
                    (column["name"].as_str(), column["description"].as_str())
                else {
                    continue;
                };
                if nwbfile.electrodes().column(name).is_some() {
                    nwbfile.electrodes_mut().describe_column(name, description)?;
                }
            }
        }
        Ok(())
    }
}
