// src/spikeglx/mod.rs
//! SpikeGLX acquisition format support.
//!
//! SpikeGLX saves each stream as a `.bin`/`.meta` pair: the `.meta` file is an
//! INI-like text header and the `.bin` file holds interleaved little-endian
//! `int16` frames. Streams come in three kinds: the imec action-potential
//! band (`.ap`), the imec local-field band (`.lf`), and the National
//! Instruments auxiliary board (`.nidq`).

mod meta;
mod recording;

pub use meta::{SpikeGlxMeta, StreamKind};
pub use recording::SpikeGlxRecording;
