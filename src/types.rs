// src/types.rs
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Element type of a dataset or recording.
///
/// Names follow the numpy spellings used throughout the NWB ecosystem
/// ("int16", "float64", ...); the Zarr typestrings are the little-endian
/// encodings written into `.zarray` metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::I8 | DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 | DataType::F64 => 8,
        }
    }

    /// Numpy-style name ("int16", "float32", ...).
    pub fn name(&self) -> &'static str {
        match self {
            DataType::I8 => "int8",
            DataType::I16 => "int16",
            DataType::I32 => "int32",
            DataType::I64 => "int64",
            DataType::U8 => "uint8",
            DataType::U16 => "uint16",
            DataType::U32 => "uint32",
            DataType::U64 => "uint64",
            DataType::F32 => "float32",
            DataType::F64 => "float64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int8" => Some(DataType::I8),
            "int16" => Some(DataType::I16),
            "int32" => Some(DataType::I32),
            "int64" => Some(DataType::I64),
            "uint8" => Some(DataType::U8),
            "uint16" => Some(DataType::U16),
            "uint32" => Some(DataType::U32),
            "uint64" => Some(DataType::U64),
            "float32" => Some(DataType::F32),
            "float64" => Some(DataType::F64),
            _ => None,
        }
    }

    /// Little-endian Zarr typestring ("<i2", "<f4", ...).
    pub fn zarr_dtype(&self) -> &'static str {
        match self {
            DataType::I8 => "|i1",
            DataType::I16 => "<i2",
            DataType::I32 => "<i4",
            DataType::I64 => "<i8",
            DataType::U8 => "|u1",
            DataType::U16 => "<u2",
            DataType::U32 => "<u4",
            DataType::U64 => "<u8",
            DataType::F32 => "<f4",
            DataType::F64 => "<f8",
        }
    }

    pub fn from_zarr_dtype(dtype: &str) -> Option<Self> {
        match dtype {
            "|i1" => Some(DataType::I8),
            "<i2" => Some(DataType::I16),
            "<i4" => Some(DataType::I32),
            "<i8" => Some(DataType::I64),
            "|u1" => Some(DataType::U8),
            "<u2" => Some(DataType::U16),
            "<u4" => Some(DataType::U32),
            "<u8" => Some(DataType::U64),
            "<f4" => Some(DataType::F32),
            "<f8" => Some(DataType::F64),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DataTypeVisitor;

        impl Visitor<'_> for DataTypeVisitor {
            type Value = DataType;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a numpy-style dtype name such as \"int16\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<DataType, E> {
                DataType::from_name(value)
                    .or_else(|| DataType::from_zarr_dtype(value))
                    .ok_or_else(|| E::custom(format!("unknown dtype: {value}")))
            }
        }

        deserializer.deserialize_str(DataTypeVisitor)
    }
}

/// Format a shape the way the configuration printouts expect: `(1800000, 384)`,
/// with the trailing comma for one-dimensional shapes, `(100,)`.
pub fn format_shape(shape: &[u64]) -> String {
    match shape {
        [single] => format!("({single},)"),
        _ => {
            let parts: Vec<String> = shape.iter().map(u64::to_string).collect();
            format!("({})", parts.join(", "))
        }
    }
}
