// src/store/mod.rs
//! NWB-shaped Zarr v2 directory store.
//!
//! The store is a directory tree: every group holds a `.zgroup` marker and
//! optional `.zattrs`, every array a `.zarray` descriptor plus `i.j` chunk
//! files, zlib-compressed. Large acquisitions are written through a worker
//! pool so chunk compression overlaps the reads.

use crate::backend::{CompressionMethod, DatasetIOConfiguration, ZarrBackendConfiguration};
use crate::error::{NwbError, Result};
use crate::iterator::{DataChunk, IteratorOptions, RecordingChunkIterator};
use crate::metadata::SESSION_TIME_FORMAT;
use crate::nwb::{AcquisitionData, ColumnValues, NwbFile};
use crate::recording::{MemoryRecording, Recording};
use crate::types::DataType;
use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// NWB schema version stamped on the root group.
pub const NWB_VERSION: &str = "2.6.0";

const ZARR_FORMAT: u32 = 2;

/// A Zarr v2 directory store rooted at one path.
pub struct ZarrStore {
    root: PathBuf,
}

impl ZarrStore {
    /// Create a new store; refuses to clobber a non-empty directory.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if root.exists() && fs::read_dir(&root)?.next().is_some() {
            return Err(NwbError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("output directory {} is not empty", root.display()),
            )));
        }
        fs::create_dir_all(&root)?;
        let store = ZarrStore { root };
        store.write_json("", ".zgroup", &json!({ "zarr_format": ZARR_FORMAT }))?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, group_path: &str) -> PathBuf {
        if group_path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(group_path)
        }
    }

    fn write_json(&self, group_path: &str, file_name: &str, value: &Value) -> Result<()> {
        let dir = self.dir(group_path);
        fs::create_dir_all(&dir)?;
        let text = serde_json::to_string_pretty(value)?;
        fs::write(dir.join(file_name), text)?;
        Ok(())
    }

    /// Create a (possibly nested) group.
    pub fn create_group(&self, group_path: &str) -> Result<()> {
        self.write_json(group_path, ".zgroup", &json!({ "zarr_format": ZARR_FORMAT }))
    }

    /// Attach user attributes to a group or array.
    pub fn set_attrs(&self, group_path: &str, attrs: Value) -> Result<()> {
        self.write_json(group_path, ".zattrs", &attrs)
    }

    /// Create a numeric array; chunk data is written through the handle.
    pub fn create_array(
        &self,
        array_path: &str,
        shape: &[u64],
        chunks: &[u64],
        dtype: DataType,
        compression_level: Option<u32>,
    ) -> Result<ZarrArray> {
        if shape.len() != chunks.len() || shape.is_empty() || shape.len() > 2 {
            return Err(NwbError::InvalidShape(format!(
                "array {array_path}: unsupported shape {shape:?} / chunks {chunks:?}"
            )));
        }
        if chunks.iter().any(|&c| c == 0) {
            return Err(NwbError::InvalidShape(format!(
                "array {array_path}: zero-sized chunk axis in {chunks:?}"
            )));
        }
        let compressor = match compression_level {
            Some(level) => json!({ "id": "zlib", "level": level }),
            None => Value::Null,
        };
        self.write_json(
            array_path,
            ".zarray",
            &json!({
                "zarr_format": ZARR_FORMAT,
                "shape": shape,
                "chunks": chunks,
                "dtype": dtype.zarr_dtype(),
                "compressor": compressor,
                "fill_value": 0,
                "order": "C",
                "filters": Value::Null,
            }),
        )?;
        Ok(ZarrArray {
            dir: self.dir(array_path),
            shape: shape.to_vec(),
            chunks: chunks.to_vec(),
            dtype,
            compression_level,
        })
    }

    /// Write a one-dimensional `int64` array in a single chunk.
    pub fn write_i64_array(&self, array_path: &str, values: &[i64]) -> Result<()> {
        let len = values.len() as u64;
        let array = self.create_array(array_path, &[len], &[len.max(1)], DataType::I64, None)?;
        if values.is_empty() {
            return Ok(());
        }
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for &value in values {
            bytes.write_i64::<LittleEndian>(value)?;
        }
        array.write_chunk(&[0], &[len], &bytes)
    }

    /// Write a one-dimensional `float64` array, chunked per `configuration`
    /// when one is supplied.
    pub fn write_f64_array(
        &self,
        array_path: &str,
        values: &[f64],
        configuration: Option<&DatasetIOConfiguration>,
    ) -> Result<()> {
        let len = values.len() as u64;
        let (chunk_len, level) = match configuration {
            Some(configuration) => (
                configuration.chunk_shape.first().copied().unwrap_or(len.max(1)),
                compression_level_of(configuration),
            ),
            None => (len.max(1), None),
        };
        let array = self.create_array(array_path, &[len], &[chunk_len], DataType::F64, level)?;
        for (index, window) in values.chunks(chunk_len as usize).enumerate() {
            let mut bytes = Vec::with_capacity(window.len() * 8);
            for &value in window {
                bytes.write_f64::<LittleEndian>(value)?;
            }
            array.write_chunk(&[index as u64], &[window.len() as u64], &bytes)?;
        }
        Ok(())
    }

    /// Write a one-dimensional string array as fixed-width bytes (`|S{n}`),
    /// uncompressed and in a single chunk.
    pub fn write_string_array(&self, array_path: &str, values: &[String]) -> Result<()> {
        let width = values.iter().map(|v| v.len()).max().unwrap_or(0).max(1);
        let len = values.len() as u64;
        self.write_json(
            array_path,
            ".zarray",
            &json!({
                "zarr_format": ZARR_FORMAT,
                "shape": [len],
                "chunks": [len.max(1)],
                "dtype": format!("|S{width}"),
                "compressor": Value::Null,
                "fill_value": Value::Null,
                "order": "C",
                "filters": Value::Null,
            }),
        )?;
        if values.is_empty() {
            return Ok(());
        }
        let mut bytes = vec![0u8; values.len() * width];
        for (index, value) in values.iter().enumerate() {
            bytes[index * width..index * width + value.len()].copy_from_slice(value.as_bytes());
        }
        fs::write(self.dir(array_path).join("0"), bytes)?;
        Ok(())
    }
}

/// Handle to one array in a [`ZarrStore`].
#[derive(Clone)]
pub struct ZarrArray {
    dir: PathBuf,
    shape: Vec<u64>,
    chunks: Vec<u64>,
    dtype: DataType,
    compression_level: Option<u32>,
}

impl ZarrArray {
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn chunks(&self) -> &[u64] {
        &self.chunks
    }

    /// Storage key of a chunk, e.g. `1.0`.
    pub fn chunk_key(index: &[u64]) -> String {
        index
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Write one chunk.
    ///
    /// `actual_shape` is the extent of real data in this chunk; edge chunks
    /// are padded to the nominal chunk shape with the fill value, so every
    /// stored chunk decompresses to `prod(chunks) * itemsize` bytes.
    pub fn write_chunk(&self, index: &[u64], actual_shape: &[u64], data: &[u8]) -> Result<()> {
        let itemsize = self.dtype.size();
        let actual_items: u64 = actual_shape.iter().product();
        if data.len() != actual_items as usize * itemsize {
            return Err(NwbError::InvalidShape(format!(
                "chunk {} has {} bytes, expected {} for shape {actual_shape:?}",
                Self::chunk_key(index),
                data.len(),
                actual_items as usize * itemsize
            )));
        }

        let full_items: u64 = self.chunks.iter().product();
        let payload: Vec<u8>;
        let bytes: &[u8] = if actual_shape == self.chunks.as_slice() {
            data
        } else {
            payload = self.pad_chunk(actual_shape, data, full_items as usize * itemsize)?;
            &payload
        };

        let path = self.dir.join(Self::chunk_key(index));
        match self.compression_level {
            Some(level) => {
                let file = fs::File::create(path)?;
                let mut encoder = ZlibEncoder::new(file, Compression::new(level));
                encoder.write_all(bytes)?;
                encoder.finish()?;
            }
            None => {
                fs::write(path, bytes)?;
            }
        }
        Ok(())
    }

    fn pad_chunk(&self, actual_shape: &[u64], data: &[u8], full_bytes: usize) -> Result<Vec<u8>> {
        let itemsize = self.dtype.size();
        let mut padded = vec![0u8; full_bytes];
        match (actual_shape, self.chunks.as_slice()) {
            ([_], [_]) => {
                padded[..data.len()].copy_from_slice(data);
            }
            (&[rows, cols], &[_, chunk_cols]) => {
                let src_stride = cols as usize * itemsize;
                let dst_stride = chunk_cols as usize * itemsize;
                for row in 0..rows as usize {
                    padded[row * dst_stride..row * dst_stride + src_stride]
                        .copy_from_slice(&data[row * src_stride..(row + 1) * src_stride]);
                }
            }
            _ => {
                return Err(NwbError::Unsupported(format!(
                    "padding for rank-{} chunks",
                    self.chunks.len()
                )))
            }
        }
        Ok(padded)
    }
}

fn compression_level_of(configuration: &DatasetIOConfiguration) -> Option<u32> {
    match configuration.compression_method {
        CompressionMethod::Gzip => Some(configuration.compression_level),
        CompressionMethod::None => None,
    }
}

/// Drain a chunk iterator into an array through a fixed worker pool.
///
/// Workers compress and write independent chunk files; the producing side
/// reads buffers sequentially. Returns the number of chunks written.
pub fn write_chunked(array: &ZarrArray, iterator: RecordingChunkIterator, jobs: usize) -> Result<u64> {
    let jobs = jobs.max(1);
    let (sender, receiver) = crossbeam_channel::bounded::<DataChunk>(jobs * 2);
    let errors: Mutex<Vec<NwbError>> = Mutex::new(Vec::new());
    let written = AtomicU64::new(0);

    std::thread::scope(|scope| {
        for _ in 0..jobs {
            let receiver = receiver.clone();
            let errors = &errors;
            let written = &written;
            scope.spawn(move || {
                for chunk in receiver.iter() {
                    let (rows, cols) = chunk.actual_shape();
                    let result = array.write_chunk(
                        &[chunk.chunk_index.0, chunk.chunk_index.1],
                        &[rows, cols],
                        &chunk.bytes,
                    );
                    match result {
                        Ok(()) => {
                            written.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            errors.lock().push(err);
                            return;
                        }
                    }
                }
            });
        }
        drop(receiver);

        for chunk in iterator {
            match chunk {
                Ok(chunk) => {
                    if sender.send(chunk).is_err() {
                        // All workers bailed out; their errors are recorded.
                        break;
                    }
                }
                Err(err) => {
                    errors.lock().push(err);
                    break;
                }
            }
        }
        drop(sender);
    });

    if let Some(err) = errors.into_inner().into_iter().next() {
        return Err(err);
    }
    Ok(written.into_inner())
}

/// Outcome of serializing a file model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub arrays: usize,
    pub chunks_written: u64,
}

/// Serialize a file model into a new store at `path`.
pub fn write_nwbfile(
    path: impl AsRef<Path>,
    nwbfile: &NwbFile,
    configuration: &ZarrBackendConfiguration,
) -> Result<WriteReport> {
    let store = ZarrStore::create(path)?;
    let mut report = WriteReport {
        arrays: 0,
        chunks_written: 0,
    };

    let mut root_attrs = json!({
        "nwb_version": NWB_VERSION,
        "session_description": nwbfile.session_description,
        "identifier": nwbfile.identifier,
    });
    if let Some(start) = nwbfile.session_start_time {
        root_attrs["session_start_time"] =
            json!(start.format(SESSION_TIME_FORMAT).to_string());
    }
    store.set_attrs("", root_attrs)?;

    store.create_group("general")?;
    store.create_group("general/devices")?;
    for device in nwbfile.devices() {
        let path = format!("general/devices/{}", device.name);
        store.create_group(&path)?;
        store.set_attrs(
            &path,
            json!({
                "neurodata_type": "Device",
                "description": device.description,
                "manufacturer": device.manufacturer,
            }),
        )?;
    }

    store.create_group("general/extracellular_ephys")?;
    for group in nwbfile.electrode_groups() {
        let path = format!("general/extracellular_ephys/{}", group.name);
        store.create_group(&path)?;
        store.set_attrs(
            &path,
            json!({
                "neurodata_type": "ElectrodeGroup",
                "description": group.description,
                "location": group.location,
                "device": format!("general/devices/{}", group.device),
            }),
        )?;
    }

    let electrodes = nwbfile.electrodes();
    let electrodes_path = format!("general/extracellular_ephys/{}", electrodes.name);
    store.create_group(&electrodes_path)?;
    store.set_attrs(
        &electrodes_path,
        json!({
            "neurodata_type": "DynamicTable",
            "description": electrodes.description,
            "colnames": electrodes.column_names(),
        }),
    )?;
    let ids: Vec<i64> = (0..electrodes.num_rows() as i64).collect();
    store.write_i64_array(&format!("{electrodes_path}/id"), &ids)?;
    report.arrays += 1;
    for column in electrodes.columns() {
        let column_path = format!("{electrodes_path}/{}", column.name);
        match &column.values {
            ColumnValues::Str(values) => store.write_string_array(&column_path, values)?,
            ColumnValues::I64(values) => store.write_i64_array(&column_path, values)?,
            ColumnValues::F64(values) => store.write_f64_array(
                &column_path,
                values,
                configuration.dataset(&column_path),
            )?,
        }
        store.set_attrs(&column_path, json!({ "description": column.description }))?;
        report.arrays += 1;
    }

    store.create_group("acquisition")?;
    for series in nwbfile.acquisitions() {
        let series_path = format!("acquisition/{}", series.name);
        store.create_group(&series_path)?;
        store.set_attrs(
            &series_path,
            json!({
                "neurodata_type": "ElectricalSeries",
                "description": series.description,
                "unit": series.unit,
                "conversion": series.conversion,
                "offset": series.offset,
                "rate": series.rate,
                "starting_time": series.starting_time,
            }),
        )?;
        let indices: Vec<i64> = series.electrode_indices.iter().map(|&i| i as i64).collect();
        store.write_i64_array(&format!("{series_path}/electrodes"), &indices)?;
        report.arrays += 1;

        let data_path = format!("{series_path}/data");
        let data_configuration = configuration.dataset(&data_path);
        report.chunks_written += write_series_data(
            &store,
            &data_path,
            series.rate,
            &series.data,
            data_configuration,
            configuration.effective_jobs(),
        )?;
        report.arrays += 1;
    }

    log::info!(
        "wrote NWB store {} ({} arrays, {} data chunks)",
        store.root().display(),
        report.arrays,
        report.chunks_written
    );
    Ok(report)
}

fn write_series_data(
    store: &ZarrStore,
    data_path: &str,
    rate: f64,
    data: &AcquisitionData,
    configuration: Option<&DatasetIOConfiguration>,
    jobs: usize,
) -> Result<u64> {
    let (frames, channels) = data.shape();
    let dtype = data.dtype();

    let (recording, scaled): (Arc<dyn Recording>, bool) = match data {
        AcquisitionData::Int16 {
            samples,
            num_channels,
        } => {
            if samples.is_empty() || *num_channels == 0 {
                store.create_array(data_path, &[frames, channels], &[1, 1], dtype, None)?;
                return Ok(0);
            }
            (
                Arc::new(MemoryRecording::new(samples.clone(), *num_channels, rate)?),
                false,
            )
        }
        AcquisitionData::Recording { recording, scaled } => (recording.clone(), *scaled),
    };

    let chunk_shape = configuration.map(|c| {
        let chunk_frames = c.chunk_shape.first().copied().unwrap_or(frames.max(1));
        let chunk_channels = c.chunk_shape.get(1).copied().unwrap_or(channels.max(1));
        (chunk_frames, chunk_channels)
    });
    let iterator = RecordingChunkIterator::new(
        recording,
        IteratorOptions {
            chunk_shape,
            return_scaled: scaled,
            ..Default::default()
        },
    )?;

    let level = match configuration {
        Some(configuration) => compression_level_of(configuration),
        None => Some(crate::backend::DEFAULT_COMPRESSION_LEVEL),
    };
    let (chunk_frames, chunk_channels) = iterator.chunk_shape();
    let array = store.create_array(
        data_path,
        &[frames, channels],
        &[chunk_frames, chunk_channels],
        iterator.dtype(),
        level,
    )?;

    write_chunked(&array, iterator, jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::test_support::PatternRecording;
    use std::io::Read;

    fn read_zlib_chunk(path: &Path) -> Vec<u8> {
        let file = fs::File::open(path).unwrap();
        let mut decoder = flate2::read::ZlibDecoder::new(file);
        let mut bytes = Vec::new();
        decoder.read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_store_create_refuses_non_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("existing"), "x").unwrap();
        assert!(ZarrStore::create(dir.path()).is_err());
    }

    #[test]
    fn test_group_and_attrs_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out.nwb.zarr");
        let store = ZarrStore::create(&root).unwrap();
        store.create_group("acquisition").unwrap();
        store
            .set_attrs("acquisition", json!({ "comment": "hi" }))
            .unwrap();

        assert!(root.join(".zgroup").is_file());
        assert!(root.join("acquisition/.zgroup").is_file());
        let attrs: Value = serde_json::from_str(
            &fs::read_to_string(root.join("acquisition/.zattrs")).unwrap(),
        )
        .unwrap();
        assert_eq!(attrs["comment"], "hi");
    }

    #[test]
    fn test_chunk_key() {
        assert_eq!(ZarrArray::chunk_key(&[0]), "0");
        assert_eq!(ZarrArray::chunk_key(&[3, 12]), "3.12");
    }

    #[test]
    fn test_edge_chunks_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ZarrStore::create(dir.path().join("s")).unwrap();
        let array = store
            .create_array("a", &[3, 3], &[2, 2], DataType::I16, Some(4))
            .unwrap();

        // Bottom-right corner chunk holds a single sample.
        array
            .write_chunk(&[1, 1], &[1, 1], &5i16.to_le_bytes())
            .unwrap();
        let bytes = read_zlib_chunk(&dir.path().join("s/a/1.1"));
        assert_eq!(bytes.len(), 2 * 2 * 2);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 5);
        assert!(bytes[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_row_padding_keeps_stride() {
        let dir = tempfile::tempdir().unwrap();
        let store = ZarrStore::create(dir.path().join("s")).unwrap();
        let array = store
            .create_array("a", &[4, 3], &[2, 2], DataType::I16, Some(1))
            .unwrap();

        // Right-edge chunk: 2 rows x 1 column, values 7 and 9.
        let mut data = Vec::new();
        data.extend_from_slice(&7i16.to_le_bytes());
        data.extend_from_slice(&9i16.to_le_bytes());
        array.write_chunk(&[0, 1], &[2, 1], &data).unwrap();

        let bytes = read_zlib_chunk(&dir.path().join("s/a/0.1"));
        let values: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(values, vec![7, 0, 9, 0]);
    }

    #[test]
    fn test_chunk_byte_length_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let store = ZarrStore::create(dir.path().join("s")).unwrap();
        let array = store
            .create_array("a", &[2, 2], &[2, 2], DataType::I16, None)
            .unwrap();
        let err = array.write_chunk(&[0, 0], &[2, 2], &[0u8; 3]).unwrap_err();
        assert!(matches!(err, NwbError::InvalidShape(_)));
    }

    #[test]
    fn test_write_chunked_covers_all_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = ZarrStore::create(dir.path().join("s")).unwrap();
        let recording = Arc::new(PatternRecording::new(100, 6));
        let iterator = RecordingChunkIterator::new(
            recording,
            IteratorOptions {
                chunk_shape: Some((32, 4)),
                buffer_shape: Some((64, 6)),
                ..Default::default()
            },
        )
        .unwrap();
        let array = store
            .create_array("data", &[100, 6], &[32, 4], DataType::I16, Some(4))
            .unwrap();
        let written = write_chunked(&array, iterator, 4).unwrap();
        assert_eq!(written, 8);
        for key in ["0.0", "0.1", "1.0", "1.1", "2.0", "2.1", "3.0", "3.1"] {
            let bytes = read_zlib_chunk(&dir.path().join("s/data").join(key));
            assert_eq!(bytes.len(), 32 * 4 * 2);
        }
    }

    #[test]
    fn test_string_array_fixed_width() {
        let dir = tempfile::tempdir().unwrap();
        let store = ZarrStore::create(dir.path().join("s")).unwrap();
        store
            .write_string_array(
                "names",
                &["XA0".to_string(), "XA10".to_string()],
            )
            .unwrap();
        let zarray: Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("s/names/.zarray")).unwrap(),
        )
        .unwrap();
        assert_eq!(zarray["dtype"], "|S4");
        let bytes = fs::read(dir.path().join("s/names/0")).unwrap();
        assert_eq!(&bytes, b"XA0\0XA10");
    }
}
