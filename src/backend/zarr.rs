//! Zarr array storage on the local filesystem, written with `zarrs`.
//!
//! Each Configuration maps onto one array whose only codec stage is blosc:
//!
//! - v2: a `.zarray` with a `blosc` compressor and the byte order folded
//!   into the `dtype` string,
//! - v3: a `bytes` codec carrying the endianness followed by a `blosc`
//!   bytes-to-bytes codec.
//!
//! The metadata is built as JSON and handed to `zarrs` to parse, so anything
//! `zarrs` cannot realize is reported as a rejection during `open`.

use super::{BackendError, StorageBackend};
use crate::axis::{Endianness, ShuffleMode, ZarrVersion};
use crate::source::SourceDescriptor;
use crate::space::Configuration;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};
use zarrs::array::{Array, ArrayBytes, ArrayMetadata, ArrayMetadataV2, ArrayMetadataV3, ArraySubset};
use zarrs::filesystem::FilesystemStore;
use zarrs::storage::store::MemoryStore;

/// Blosc block size; 0 lets blosc pick
const BLOSC_BLOCKSIZE: u64 = 0;

/// Zarr backend writing to one destination directory
pub struct ZarrBackend {
    dest: PathBuf,
    metadata: Option<ArrayMetadata>,
}

impl ZarrBackend {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            metadata: None,
        }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }
}

fn fill_value(source: &SourceDescriptor) -> Value {
    if source.dtype().is_float() {
        json!(0.0)
    } else {
        json!(0)
    }
}

/// `.zarray` document for `config`
pub fn v2_metadata(config: &Configuration, source: &SourceDescriptor) -> Value {
    let shuffle = match config.shuffle().resolve(source.dtype().item_size()) {
        ShuffleMode::Byte => 1,
        ShuffleMode::Bit => 2,
        _ => 0,
    };
    json!({
        "zarr_format": 2,
        "shape": source.shape(),
        "chunks": config.chunk_shape().dims(),
        "dtype": source.dtype().v2_code(config.endianness()),
        "compressor": {
            "id": "blosc",
            "cname": config.compressor().id(),
            "clevel": config.clevel().get(),
            "shuffle": shuffle,
            "blocksize": BLOSC_BLOCKSIZE,
        },
        "fill_value": fill_value(source),
        "order": "C",
        "filters": null,
    })
}

/// `zarr.json` document for `config`
pub fn v3_metadata(config: &Configuration, source: &SourceDescriptor) -> Value {
    let bytes_codec = match config.endianness() {
        Endianness::None => json!({ "name": "bytes" }),
        endian => json!({ "name": "bytes", "configuration": { "endian": endian.name() } }),
    };
    let shuffle = match config.shuffle().resolve(source.dtype().item_size()) {
        ShuffleMode::Byte => "shuffle",
        ShuffleMode::Bit => "bitshuffle",
        _ => "noshuffle",
    };
    json!({
        "zarr_format": 3,
        "node_type": "array",
        "shape": source.shape(),
        "data_type": source.dtype().v3_name(),
        "chunk_grid": {
            "name": "regular",
            "configuration": { "chunk_shape": config.chunk_shape().dims() },
        },
        "chunk_key_encoding": {
            "name": "default",
            "configuration": { "separator": "/" },
        },
        "fill_value": fill_value(source),
        "codecs": [
            bytes_codec,
            {
                "name": "blosc",
                "configuration": {
                    "cname": config.compressor().id(),
                    "clevel": config.clevel().get(),
                    "shuffle": shuffle,
                    "typesize": source.dtype().item_size(),
                    "blocksize": BLOSC_BLOCKSIZE,
                },
            },
        ],
    })
}

fn array_metadata(
    config: &Configuration,
    source: &SourceDescriptor,
) -> Result<ArrayMetadata, BackendError> {
    let rejected = |err: serde_json::Error| BackendError::Rejected(err.to_string());
    Ok(match config.zarr_version() {
        ZarrVersion::V2 => ArrayMetadata::V2(
            serde_json::from_value::<ArrayMetadataV2>(v2_metadata(config, source))
                .map_err(rejected)?,
        ),
        ZarrVersion::V3 => ArrayMetadata::V3(
            serde_json::from_value::<ArrayMetadataV3>(v3_metadata(config, source))
                .map_err(rejected)?,
        ),
    })
}

impl StorageBackend for ZarrBackend {
    fn name(&self) -> &'static str {
        "zarr"
    }

    fn open(
        &mut self,
        config: &Configuration,
        source: &SourceDescriptor,
    ) -> Result<(), BackendError> {
        let metadata = array_metadata(config, source)?;

        // Instantiating against an empty in-memory store resolves the data
        // type, chunk grid and codecs without any filesystem access.
        Array::new_with_metadata(Arc::new(MemoryStore::new()), "/", metadata.clone())
            .map_err(|e| BackendError::Rejected(e.to_string()))?;

        debug!("Opened zarr backend at {:?} for {}", self.dest, config);
        self.metadata = Some(metadata);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), BackendError> {
        if self.dest.exists() {
            trace!("Removing {:?}", self.dest);
            std::fs::remove_dir_all(&self.dest)?;
        }
        std::fs::create_dir_all(&self.dest)?;
        Ok(())
    }

    fn write(&mut self, source: &SourceDescriptor) -> Result<(), BackendError> {
        let metadata = self
            .metadata
            .clone()
            .ok_or_else(|| BackendError::Io("write called before open".into()))?;
        let io = |e: &dyn std::fmt::Display| BackendError::Io(e.to_string());

        let store = FilesystemStore::new(&self.dest).map_err(|e| io(&e))?;
        let array = Array::new_with_metadata(Arc::new(store), "/", metadata)
            .map_err(|e| BackendError::Rejected(e.to_string()))?;
        array.store_metadata().map_err(|e| io(&e))?;

        let subset = ArraySubset::new_with_shape(source.shape().to_vec());
        array
            .store_array_subset(&subset, ArrayBytes::new_flen(source.data()))
            .map_err(|e| io(&e))?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.metadata = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{ChunkShape, CompressionLevel, Compressor};
    use crate::source::DType;

    fn source(dtype: DType) -> SourceDescriptor {
        let bytes = 8 * 8 * dtype.item_size();
        SourceDescriptor::new(dtype, vec![8, 8], vec![7; bytes]).unwrap()
    }

    fn config(version: ZarrVersion, shuffle: ShuffleMode, endianness: Endianness) -> Configuration {
        Configuration::new(
            version,
            CompressionLevel::new(3).unwrap(),
            Compressor::Zstd,
            shuffle,
            ChunkShape::new(vec![4, 8]).unwrap(),
            endianness,
        )
    }

    #[test]
    fn test_v2_metadata_document() {
        let doc = v2_metadata(
            &config(ZarrVersion::V2, ShuffleMode::Bit, Endianness::Big),
            &source(DType::UInt16),
        );
        assert_eq!(doc["zarr_format"], 2);
        assert_eq!(doc["dtype"], ">u2");
        assert_eq!(doc["chunks"], json!([4, 8]));
        assert_eq!(doc["compressor"]["cname"], "zstd");
        assert_eq!(doc["compressor"]["clevel"], 3);
        assert_eq!(doc["compressor"]["shuffle"], 2);
        assert_eq!(doc["fill_value"], 0);
    }

    #[test]
    fn test_v3_metadata_document() {
        let doc = v3_metadata(
            &config(ZarrVersion::V3, ShuffleMode::Auto, Endianness::Little),
            &source(DType::Float32),
        );
        assert_eq!(doc["data_type"], "float32");
        assert_eq!(doc["chunk_grid"]["configuration"]["chunk_shape"], json!([4, 8]));
        assert_eq!(doc["codecs"][0]["configuration"]["endian"], "little");
        assert_eq!(doc["codecs"][1]["configuration"]["shuffle"], "shuffle");
        assert_eq!(doc["codecs"][1]["configuration"]["typesize"], 4);
        assert_eq!(doc["fill_value"], 0.0);
    }

    #[test]
    fn test_v3_single_byte_has_no_endian() {
        let doc = v3_metadata(
            &config(ZarrVersion::V3, ShuffleMode::Auto, Endianness::None),
            &source(DType::UInt8),
        );
        assert!(doc["codecs"][0].get("configuration").is_none());
        assert_eq!(doc["codecs"][1]["configuration"]["shuffle"], "bitshuffle");
    }

    #[test]
    fn test_reset_recreates_empty_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("array");
        std::fs::create_dir_all(dest.join("stale")).unwrap();

        let mut backend = ZarrBackend::new(&dest);
        backend.reset().unwrap();
        assert!(dest.is_dir());
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn test_write_before_open_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = ZarrBackend::new(dir.path().join("array"));
        backend.reset().unwrap();
        assert!(matches!(
            backend.write(&source(DType::UInt8)),
            Err(BackendError::Io(_))
        ));
    }

    #[test]
    fn test_write_both_versions() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(DType::UInt16);

        for (version, marker) in [(ZarrVersion::V2, ".zarray"), (ZarrVersion::V3, "zarr.json")] {
            let dest = dir.path().join(format!("v{}", version));
            let mut backend = ZarrBackend::new(&dest);
            backend
                .open(&config(version, ShuffleMode::Byte, Endianness::Little), &src)
                .unwrap();
            backend.reset().unwrap();
            backend.write(&src).unwrap();
            backend.close().unwrap();
            assert!(dest.join(marker).is_file());
        }
    }
}
