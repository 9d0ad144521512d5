//! Source array description and loading.
//!
//! A [`SourceDescriptor`] is the fixed, read-only array that every trial
//! writes. It is produced once by the loader and borrowed by the rest of
//! the crate for the whole run.

use crate::axis::Endianness;
use crate::error::{BenchError, BenchResult};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Element data types supported by the source loader and the storage backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    #[clap(name = "uint8")]
    UInt8,
    #[clap(name = "int8")]
    Int8,
    #[clap(name = "uint16")]
    UInt16,
    #[clap(name = "int16")]
    Int16,
    #[clap(name = "uint32")]
    UInt32,
    #[clap(name = "int32")]
    Int32,
    #[clap(name = "uint64")]
    UInt64,
    #[clap(name = "int64")]
    Int64,
    #[clap(name = "float32")]
    Float32,
    #[clap(name = "float64")]
    Float64,
}

impl DType {
    /// Size of one element in bytes
    pub fn item_size(self) -> usize {
        match self {
            DType::UInt8 | DType::Int8 => 1,
            DType::UInt16 | DType::Int16 => 2,
            DType::UInt32 | DType::Int32 | DType::Float32 => 4,
            DType::UInt64 | DType::Int64 | DType::Float64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    /// Zarr v3 `data_type` name
    pub fn v3_name(self) -> &'static str {
        match self {
            DType::UInt8 => "uint8",
            DType::Int8 => "int8",
            DType::UInt16 => "uint16",
            DType::Int16 => "int16",
            DType::UInt32 => "uint32",
            DType::Int32 => "int32",
            DType::UInt64 => "uint64",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    /// Zarr v2 `dtype` string with its byte-order prefix, e.g. `<u2`.
    pub fn v2_code(self, endianness: Endianness) -> String {
        let order = match endianness {
            Endianness::Little => '<',
            Endianness::Big => '>',
            Endianness::None => '|',
        };
        let kind = if self.is_float() {
            'f'
        } else if matches!(
            self,
            DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64
        ) {
            'i'
        } else {
            'u'
        };
        format!("{}{}{}", order, kind, self.item_size())
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.v3_name())
    }
}

/// The array written by every trial.
///
/// `data` holds the elements in native byte order, C (row-major) layout.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    dtype: DType,
    shape: Vec<u64>,
    data: Vec<u8>,
}

impl SourceDescriptor {
    /// Wrap an in-memory buffer, checking it matches `shape` and `dtype`.
    pub fn new(dtype: DType, shape: Vec<u64>, data: Vec<u8>) -> BenchResult<Self> {
        validate_shape(&shape)?;
        let expected = byte_count(&shape, dtype.item_size())
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| {
                BenchError::Parse(format!(
                    "shape {} of {} is too large to address",
                    crate::utils::format_shape(&shape),
                    dtype
                ))
            })?;
        if data.len() != expected {
            return Err(BenchError::Parse(format!(
                "source holds {} bytes but shape {} of {} needs {}",
                data.len(),
                crate::utils::format_shape(&shape),
                dtype,
                expected
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Read a raw native-endian array dump from disk.
    pub fn load_raw(path: &Path, dtype: DType, shape: Vec<u64>) -> BenchResult<Self> {
        debug!("Reading raw source {:?} as {} {:?}", path, dtype, shape);
        let data = std::fs::read(path)?;
        Self::new(dtype, shape, data)
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Total bytes written by one trial
    pub fn num_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Bytes held by an array of `shape`, or `None` if the count overflows `u64`.
pub fn byte_count(shape: &[u64], item_size: usize) -> Option<u64> {
    shape
        .iter()
        .try_fold(item_size as u64, |acc, &axis| acc.checked_mul(axis))
}

fn validate_shape(shape: &[u64]) -> BenchResult<()> {
    if shape.is_empty() {
        return Err(BenchError::Parse("shape must have at least one axis".into()));
    }
    if shape.iter().any(|&ax| ax == 0) {
        return Err(BenchError::Parse(
            "shape must be positive in each axis".into(),
        ));
    }
    Ok(())
}
