// src/nwb/mod.rs
//! In-memory NWB file model.
//!
//! The model covers the subset of NWB a raw-ecephys conversion produces:
//! session-level metadata, devices, electrode groups, an electrodes table,
//! and `ElectricalSeries` acquisitions whose data may be lazy (backed by a
//! [`Recording`](crate::recording::Recording)) until serialization.

mod file;
mod series;
mod table;

pub use file::{Device, ElectrodeGroup, NwbFile};
pub use series::{AcquisitionData, ElectricalSeries};
pub use table::{Column, ColumnValues, DynamicTable, RowValue};
