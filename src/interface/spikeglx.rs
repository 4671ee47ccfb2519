// src/interface/spikeglx.rs
use crate::error::{NwbError, Result};
use crate::interface::{
    add_recording_to_nwbfile, resolve_device, resolve_electrode_group, ConversionOptions,
    DataInterface, SeriesPlan,
};
use crate::metadata::Metadata;
use crate::nwb::{Device, ElectrodeGroup, NwbFile};
use crate::recording::Recording;
use crate::spikeglx::{SpikeGlxRecording, StreamKind};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

/// Interface for the imec bands of a SpikeGLX recording (`.ap` / `.lf`).
#[derive(Debug)]
pub struct SpikeGlxRecordingInterface {
    recording: Arc<SpikeGlxRecording>,
    name: String,
}

impl SpikeGlxRecordingInterface {
    pub fn new(meta_path: impl AsRef<Path>) -> Result<Self> {
        let recording = SpikeGlxRecording::open(meta_path)?;
        if recording.stream_kind() == StreamKind::Nidq {
            return Err(NwbError::Unsupported(
                "nidq streams are handled by SpikeGlxNidqInterface".to_string(),
            ));
        }
        let name = format!("SpikeGLXRecording({})", recording.stream_kind());
        Ok(SpikeGlxRecordingInterface {
            recording: Arc::new(recording),
            name,
        })
    }

    pub fn recording(&self) -> &Arc<SpikeGlxRecording> {
        &self.recording
    }

    fn series_name(&self) -> &'static str {
        match self.recording.stream_kind() {
            StreamKind::Ap => "ElectricalSeriesAP",
            StreamKind::Lf => "ElectricalSeriesLF",
            StreamKind::Nidq => unreachable!("rejected at construction"),
        }
    }

    fn series_description(&self) -> &'static str {
        match self.recording.stream_kind() {
            StreamKind::Ap => "Raw acquisition traces from the AP (action potential) band.",
            StreamKind::Lf => "Raw acquisition traces from the LF (local field) band.",
            StreamKind::Nidq => unreachable!("rejected at construction"),
        }
    }

    fn default_device(&self) -> Device {
        Device {
            name: "Neuropixel-Imec".to_string(),
            description: "Imec Neuropixels probe recorded with SpikeGLX.".to_string(),
            manufacturer: "Imec".to_string(),
        }
    }

    fn default_group(&self) -> ElectrodeGroup {
        ElectrodeGroup {
            name: "s0".to_string(),
            description: "A group representing shank s0.".to_string(),
            location: "unknown".to_string(),
            device: "Neuropixel-Imec".to_string(),
        }
    }
}

impl DataInterface for SpikeGlxRecordingInterface {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_schema(&self) -> Value {
        json!({
            "required": ["file_path"],
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the SpikeGLX .ap.meta or .lf.meta file."
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
        let group = self.default_group();
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
            &["Ecephys", self.series_name()],
            json!({
                "name": self.series_name(),
                "description": self.series_description(),
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
                    .get_str(&["Ecephys", self.series_name(), "name"])
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.series_name().to_string());
        let series_description = metadata
            .get_str(&["Ecephys", self.series_name(), "description"])
            .unwrap_or(self.series_description())
            .to_string();

        let plan = SeriesPlan {
            series_name,
            series_description,
            device: resolve_device(metadata, &self.default_device()),
            group: resolve_electrode_group(metadata, &self.default_group()),
        };
        let recording: Arc<dyn Recording> = self.recording.clone();
        add_recording_to_nwbfile(recording, &plan, nwbfile, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Write;

    fn write_ap_fixture(dir: &Path, num_channels: usize, num_frames: u64) -> std::path::PathBuf {
        let meta_path = dir.join("run_g0_t0.imec0.ap.meta");
        let mut meta = std::fs::File::create(&meta_path).unwrap();
        writeln!(meta, "nSavedChans={num_channels}").unwrap();
        writeln!(meta, "imSampRate=30000").unwrap();
        writeln!(meta, "fileCreateTime=2021-05-20T08:00:00").unwrap();
        writeln!(meta, "imAiRangeMin=-0.6").unwrap();
        writeln!(meta, "imAiRangeMax=0.6").unwrap();

        let mut bin = std::fs::File::create(dir.join("run_g0_t0.imec0.ap.bin")).unwrap();
        for sample in 0..num_frames * num_channels as u64 {
            bin.write_i16::<LittleEndian>(sample as i16).unwrap();
        }
        meta_path
    }

    #[test]
    fn test_metadata_sections() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = write_ap_fixture(dir.path(), 4, 10);
        let interface = SpikeGlxRecordingInterface::new(&meta_path).unwrap();

        let metadata = interface.metadata();
        assert!(metadata.session_start_time().is_some());
        assert_eq!(
            metadata.get_str(&["Ecephys", "ElectricalSeriesAP", "name"]),
            Some("ElectricalSeriesAP")
        );
        assert_eq!(
            metadata.get_path(&["Ecephys", "Device"]).unwrap()[0]["manufacturer"],
            "Imec"
        );
    }

    #[test]
    fn test_add_to_nwbfile_wires_series() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = write_ap_fixture(dir.path(), 4, 10);
        let interface = SpikeGlxRecordingInterface::new(&meta_path).unwrap();

        let mut nwbfile = NwbFile::new("s", "i", None);
        interface
            .add_to_nwbfile(&mut nwbfile, &interface.metadata(), &ConversionOptions::default())
            .unwrap();

        let series = nwbfile.acquisition("ElectricalSeriesAP").unwrap();
        assert_eq!(series.rate, 30_000.0);
        assert_eq!(series.electrode_indices, vec![0, 1, 2, 3]);
        assert_eq!(series.data.shape(), (10, 4));
        assert!(nwbfile.device("Neuropixel-Imec").is_some());
        assert!(nwbfile.electrode_group("s0").is_some());
    }

    #[test]
    fn test_stub_shortens_series() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = write_ap_fixture(dir.path(), 4, 500);
        let interface = SpikeGlxRecordingInterface::new(&meta_path).unwrap();

        let mut nwbfile = NwbFile::new("s", "i", None);
        let options = ConversionOptions {
            stub_test: true,
            ..Default::default()
        };
        interface
            .add_to_nwbfile(&mut nwbfile, &interface.metadata(), &options)
            .unwrap();
        assert_eq!(
            nwbfile.acquisition("ElectricalSeriesAP").unwrap().data.shape(),
            (100, 4)
        );
    }

    #[test]
    fn test_nidq_meta_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = dir.path().join("run_g0_t0.nidq.meta");
        std::fs::write(&meta_path, "nSavedChans=1\nniSampRate=25000\n").unwrap();
        std::fs::write(dir.path().join("run_g0_t0.nidq.bin"), [0u8, 0]).unwrap();
        let err = SpikeGlxRecordingInterface::new(&meta_path).unwrap_err();
        assert!(matches!(err, NwbError::Unsupported(_)));
    }
}
