// src/nwb/file.rs
use crate::error::{NwbError, Result};
use crate::nwb::table::{ColumnValues, DynamicTable, RowValue};
use crate::nwb::ElectricalSeries;
use chrono::NaiveDateTime;
use std::ops::Range;

/// A recording device.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub description: String,
    pub manufacturer: String,
}

/// A physically grouped set of electrodes on one device.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectrodeGroup {
    pub name: String,
    pub description: String,
    pub location: String,
    /// Name of the owning [`Device`].
    pub device: String,
}

/// The in-memory NWB file being assembled by a conversion.
///
/// Object names are unique within their category; duplicate additions are
/// errors rather than silent replacements.
#[derive(Debug)]
pub struct NwbFile {
    pub session_description: String,
    pub identifier: String,
    pub session_start_time: Option<NaiveDateTime>,
    devices: Vec<Device>,
    electrode_groups: Vec<ElectrodeGroup>,
    electrodes: DynamicTable,
    acquisitions: Vec<ElectricalSeries>,
}

impl NwbFile {
    pub fn new(
        session_description: impl Into<String>,
        identifier: impl Into<String>,
        session_start_time: Option<NaiveDateTime>,
    ) -> Self {
        let mut electrodes =
            DynamicTable::new("electrodes", "metadata about extracellular electrodes");
        electrodes
            .add_column(
                "group_name",
                "Name of the ElectrodeGroup this electrode is a part of.",
                ColumnValues::Str(Vec::new()),
            )
            .expect("fresh table has no columns");
        electrodes
            .add_column(
                "channel_name",
                "Channel id in the acquisition system.",
                ColumnValues::Str(Vec::new()),
            )
            .expect("fresh table has no columns");

        NwbFile {
            session_description: session_description.into(),
            identifier: identifier.into(),
            session_start_time,
            devices: Vec::new(),
            electrode_groups: Vec::new(),
            electrodes,
            acquisitions: Vec::new(),
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.name == name)
    }

    pub fn add_device(&mut self, device: Device) -> Result<()> {
        if self.device(&device.name).is_some() {
            return Err(NwbError::DuplicateObject(format!("device {}", device.name)));
        }
        self.devices.push(device);
        Ok(())
    }

    pub fn electrode_groups(&self) -> &[ElectrodeGroup] {
        &self.electrode_groups
    }

    pub fn electrode_group(&self, name: &str) -> Option<&ElectrodeGroup> {
        self.electrode_groups.iter().find(|group| group.name == name)
    }

    pub fn add_electrode_group(&mut self, group: ElectrodeGroup) -> Result<()> {
        if self.device(&group.device).is_none() {
            return Err(NwbError::ObjectNotFound(format!(
                "device {} for electrode group {}",
                group.device, group.name
            )));
        }
        if self.electrode_group(&group.name).is_some() {
            return Err(NwbError::DuplicateObject(format!(
                "electrode group {}",
                group.name
            )));
        }
        self.electrode_groups.push(group);
        Ok(())
    }

    pub fn electrodes(&self) -> &DynamicTable {
        &self.electrodes
    }

    pub fn electrodes_mut(&mut self) -> &mut DynamicTable {
        &mut self.electrodes
    }

    /// Append one electrode row per channel id, all in the named group.
    ///
    /// Returns the row indices of the new electrodes, for wiring into an
    /// [`ElectricalSeries`].
    pub fn add_electrodes(
        &mut self,
        group_name: &str,
        channel_ids: &[String],
    ) -> Result<Range<usize>> {
        if self.electrode_group(group_name).is_none() {
            return Err(NwbError::ObjectNotFound(format!(
                "electrode group {group_name}"
            )));
        }
        let start = self.electrodes.num_rows();
        for channel_id in channel_ids {
            self.electrodes.append_row(vec![
                RowValue::Str(group_name.to_string()),
                RowValue::Str(channel_id.clone()),
            ])?;
        }
        Ok(start..self.electrodes.num_rows())
    }

    pub fn acquisitions(&self) -> &[ElectricalSeries] {
        &self.acquisitions
    }

    pub fn acquisition(&self, name: &str) -> Option<&ElectricalSeries> {
        self.acquisitions.iter().find(|series| series.name == name)
    }

    pub fn add_acquisition(&mut self, series: ElectricalSeries) -> Result<()> {
        if self.acquisition(&series.name).is_some() {
            return Err(NwbError::DuplicateObject(format!(
                "acquisition {}",
                series.name
            )));
        }
        self.acquisitions.push(series);
        Ok(())
    }
}
