// tests/common/mod.rs
#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write a small synthetic SpikeGLX NIDQ pair into `dir`.
///
/// Sample at (frame f, channel c) is `(f * num_channels + c) as i16`.
pub fn write_nidq_fixture(dir: &Path, num_channels: usize, num_frames: u64) -> PathBuf {
    let meta_path = dir.join("run_g0_t0.nidq.meta");
    let mut meta = File::create(&meta_path).unwrap();
    writeln!(meta, "nSavedChans={num_channels}").unwrap();
    writeln!(meta, "niSampRate=25000").unwrap();
    writeln!(meta, "fileTimeSecs={}", num_frames as f64 / 25000.0).unwrap();
    writeln!(meta, "fileCreateTime=2020-11-03T10:35:10").unwrap();
    writeln!(meta, "niAiRangeMin=-5").unwrap();
    writeln!(meta, "niAiRangeMax=5").unwrap();
    writeln!(meta, "niDev1ProductName=PXI-6133").unwrap();
    writeln!(meta, "typeThis=nidq").unwrap();

    let mut bin = File::create(dir.join("run_g0_t0.nidq.bin")).unwrap();
    for frame in 0..num_frames {
        for channel in 0..num_channels {
            bin.write_i16::<LittleEndian>((frame * num_channels as u64 + channel as u64) as i16)
                .unwrap();
        }
    }
    meta_path
}

pub fn expected_sample(num_channels: usize, frame: u64, channel: usize) -> i16 {
    (frame * num_channels as u64 + channel as u64) as i16
}

/// Decompress one zlib chunk file.
pub fn read_zlib_chunk(path: &Path) -> Vec<u8> {
    use std::io::Read;
    let file = File::open(path).unwrap();
    let mut decoder = flate2::read::ZlibDecoder::new(file);
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes).unwrap();
    bytes
}

/// Parse a store-side JSON file (.zarray/.zattrs/.zgroup).
pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
