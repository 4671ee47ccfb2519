// src/lib.rs
//! # nwbconv-rs
//!
//! A Rust library for converting extracellular neural recording data into the
//! NWB (Neurodata Without Borders) standard, writing NWB-shaped Zarr stores.
//!
//! ## Features
//!
//! - 🧠 **SpikeGLX Support**: imec `ap`/`lf` bands and NIDQ auxiliary streams
//! - 📦 **Memory Efficient**: memory-mapped sources, chunked streaming writes
//! - 🔒 **Thread-Safe**: chunk compression fans out over a worker pool
//! - 🎛️ **Configurable Storage**: per-dataset chunk shapes and zlib levels
//! - ⏱️ **Synchronization**: TTL pulse parsing for cross-stream alignment
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nwbconv_rs::*;
//!
//! fn main() -> Result<()> {
//!     let interface = SpikeGlxNidqInterface::new("run_g0_t0.nidq.meta")?;
//!     let converter = NwbConverter::new(vec![Box::new(interface)]);
//!
//!     converter.run_conversion(
//!         "session.nwb.zarr",
//!         None,
//!         Backend::Zarr,
//!         &ConversionOptions::default(),
//!     )?;
//!     Ok(())
//! }
//! ```
//!
//! ## Inspecting a stream
//!
//! ```rust,no_run
//! use nwbconv_rs::*;
//!
//! fn main() -> Result<()> {
//!     let recording = SpikeGlxRecording::open("run_g0_t0.imec0.ap.meta")?;
//!     println!(
//!         "{} channels @ {} Hz",
//!         recording.num_channels(),
//!         recording.sampling_frequency()
//!     );
//!     Ok(())
//! }
//! ```

// Modules
pub mod backend;
pub mod converter;
pub mod error;
pub mod interface;
pub mod iterator;
pub mod metadata;
pub mod nwb;
pub mod recording;
pub mod spikeglx;
pub mod store;
pub mod transfer;
pub mod types;

// Re-export commonly used types at the crate root for convenience
pub use error::{NwbError, Result};

// Type exports
pub use types::DataType;

// Metadata exports
pub use metadata::Metadata;

// Source exports
pub use recording::{MemoryRecording, Recording, SubRecording};
pub use spikeglx::{SpikeGlxMeta, SpikeGlxRecording, StreamKind};

// Interface exports
pub use interface::{
    ConversionOptions,
    DataInterface,
    SpikeGlxNidqInterface,
    SpikeGlxRecordingInterface,
};

// Configuration exports
pub use backend::{
    Backend,
    DatasetIOConfiguration,
    DatasetInfo,
    Hdf5BackendConfiguration,
    ZarrBackendConfiguration,
};

// Conversion exports
pub use converter::NwbConverter;
pub use store::{WriteReport, ZarrStore};

// Prelude module for glob imports
pub mod prelude {
    //! Convenient imports for common use cases.
    //!
    //! ```rust
    //! use nwbconv_rs::prelude::*;
    //! ```

    pub use crate::backend::Backend;
    pub use crate::converter::NwbConverter;
    pub use crate::error::{NwbError, Result};
    pub use crate::interface::{ConversionOptions, DataInterface};
    pub use crate::interface::{SpikeGlxNidqInterface, SpikeGlxRecordingInterface};
    pub use crate::recording::Recording;
    pub use crate::types::DataType;
}

// Version information
/// The NWB schema version stamped on written files
pub const NWB_VERSION: &str = store::NWB_VERSION;

/// The library version
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
