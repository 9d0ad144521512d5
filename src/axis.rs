//! # Axis Resolver
//!
//! Every sweepable storage parameter is an *axis*. Each axis type implements
//! [`AxisValue`], which acts as that axis's row in a fixed table: its name,
//! how one token is parsed, how a parsed value is validated against the
//! source, and which candidate set is used when the user says nothing.
//!
//! [`resolve`] applies the table uniformly:
//!
//! - absent (or blank) input yields the default set, order preserved,
//! - present input is split on the axis delimiter, each token is parsed and
//!   validated, duplicates collapse and first-occurrence order is kept.
//!
//! Scalar axes use `,` between values. Chunk shapes use `,` between whole
//! shapes and `x` between the dimensions of one shape
//! (`64x64x64,128x128x128`).
//!
//! Cross-axis rules (e.g. endianness "none" only for 1-byte elements) are not
//! checked here; they belong to the Configuration Space Builder.

use crate::chunking::{suggest_chunk_shapes, ChunkHeuristic};
use crate::error::{BenchError, BenchResult};
use crate::source::DType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between candidate values on the command line
pub const VALUE_DELIMITER: char = ',';

/// Separator between the dimensions of one shape
pub const DIMENSION_DELIMITER: char = 'x';

/// What an axis may look at while parsing and choosing defaults
#[derive(Debug, Clone, Copy)]
pub struct AxisContext<'a> {
    pub shape: &'a [u64],
    pub dtype: DType,
    pub heuristic: ChunkHeuristic,
}

/// One axis's parser, validator and default candidate set.
pub trait AxisValue: Sized + Clone + PartialEq + fmt::Display {
    /// Axis name used in messages and summaries
    const NAME: &'static str;

    /// Parse one delimiter-free token.
    fn parse_token(token: &str) -> BenchResult<Self>;

    /// Check a parsed value against the source.
    fn validate(&self, _ctx: &AxisContext<'_>) -> BenchResult<()> {
        Ok(())
    }

    /// Candidate set used when the user supplies nothing.
    fn defaults(ctx: &AxisContext<'_>) -> Vec<Self>;
}

/// An ordered, deduplicated, non-empty candidate set for one axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec<T> {
    name: &'static str,
    values: Vec<T>,
}

impl<T: AxisValue> AxisSpec<T> {
    /// Build an axis set, collapsing duplicates. Fails on an empty set.
    pub fn new(values: impl IntoIterator<Item = T>) -> BenchResult<Self> {
        let mut unique: Vec<T> = Vec::new();
        for value in values {
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        if unique.is_empty() {
            return Err(BenchError::Parse(format!(
                "{} needs at least one candidate value",
                T::NAME
            )));
        }
        Ok(Self {
            name: T::NAME,
            values: unique,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Join the values back into the command-line form.
    pub fn to_arg_string(&self) -> String {
        self.values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(&VALUE_DELIMITER.to_string())
    }
}

/// Resolve one axis from an optional raw user value.
pub fn resolve<T: AxisValue>(raw: Option<&str>, ctx: &AxisContext<'_>) -> BenchResult<AxisSpec<T>> {
    let raw = match raw.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => return AxisSpec::new(T::defaults(ctx)),
    };

    let mut values = Vec::new();
    for token in raw.split(VALUE_DELIMITER) {
        let token = token.trim();
        if token.is_empty() {
            return Err(BenchError::Parse(format!(
                "empty {} value in `{}`",
                T::NAME,
                raw
            )));
        }
        let value = T::parse_token(token)?;
        value.validate(ctx)?;
        values.push(value);
    }
    AxisSpec::new(values)
}

/// Blosc compression level, 0 (none) to 9 (max)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub const MAX: u8 = 9;

    pub fn new(level: u8) -> BenchResult<Self> {
        if level > Self::MAX {
            return Err(BenchError::Parse(format!(
                "compression level {} is outside 0..={}",
                level,
                Self::MAX
            )));
        }
        Ok(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AxisValue for CompressionLevel {
    const NAME: &'static str = "clevel";

    fn parse_token(token: &str) -> BenchResult<Self> {
        let level: u8 = token.parse().map_err(|_| {
            BenchError::Parse(format!(
                "`{}` is not a compression level (integer 0 to 9)",
                token
            ))
        })?;
        Self::new(level)
    }

    fn defaults(_ctx: &AxisContext<'_>) -> Vec<Self> {
        crate::defaults::CLEVELS
            .iter()
            .map(|&level| Self(level))
            .collect()
    }
}

/// Blosc internal compressor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compressor {
    BloscLz,
    Lz4,
    Lz4Hc,
    Snappy,
    Zlib,
    Zstd,
}

impl Compressor {
    pub const ALL: [Compressor; 6] = [
        Compressor::BloscLz,
        Compressor::Lz4,
        Compressor::Lz4Hc,
        Compressor::Snappy,
        Compressor::Zlib,
        Compressor::Zstd,
    ];

    /// Blosc `cname`
    pub fn id(self) -> &'static str {
        match self {
            Compressor::BloscLz => "blosclz",
            Compressor::Lz4 => "lz4",
            Compressor::Lz4Hc => "lz4hc",
            Compressor::Snappy => "snappy",
            Compressor::Zlib => "zlib",
            Compressor::Zstd => "zstd",
        }
    }
}

impl fmt::Display for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl AxisValue for Compressor {
    const NAME: &'static str = "compressor";

    fn parse_token(token: &str) -> BenchResult<Self> {
        Compressor::ALL
            .into_iter()
            .find(|c| c.id() == token)
            .ok_or_else(|| {
                BenchError::Parse(format!(
                    "\"{}\" is not a known compressor id (valid: {})",
                    token,
                    Compressor::ALL.map(|c| c.id()).join(", ")
                ))
            })
    }

    fn defaults(_ctx: &AxisContext<'_>) -> Vec<Self> {
        Compressor::ALL.to_vec()
    }
}

/// Blosc shuffle filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// Bit shuffle for 1-byte elements, byte shuffle otherwise
    Auto,
    None,
    Byte,
    Bit,
}

impl ShuffleMode {
    pub const ALL: [ShuffleMode; 4] = [
        ShuffleMode::Auto,
        ShuffleMode::None,
        ShuffleMode::Byte,
        ShuffleMode::Bit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShuffleMode::Auto => "auto",
            ShuffleMode::None => "none",
            ShuffleMode::Byte => "byte",
            ShuffleMode::Bit => "bit",
        }
    }

    /// The concrete filter used for elements of `item_size` bytes.
    pub fn resolve(self, item_size: usize) -> ShuffleMode {
        match self {
            ShuffleMode::Auto if item_size == 1 => ShuffleMode::Bit,
            ShuffleMode::Auto => ShuffleMode::Byte,
            other => other,
        }
    }
}

impl fmt::Display for ShuffleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl AxisValue for ShuffleMode {
    const NAME: &'static str = "shuffle";

    fn parse_token(token: &str) -> BenchResult<Self> {
        ShuffleMode::ALL
            .into_iter()
            .find(|s| s.name() == token)
            .ok_or_else(|| {
                BenchError::Parse(format!(
                    "shuffle \"{}\" is not recognized (valid: {})",
                    token,
                    ShuffleMode::ALL.map(|s| s.name()).join(", ")
                ))
            })
    }

    fn defaults(_ctx: &AxisContext<'_>) -> Vec<Self> {
        vec![ShuffleMode::None, ShuffleMode::Bit, ShuffleMode::Byte]
    }
}

/// Byte order of stored elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Big,
    Little,
    /// No byte order; only meaningful for 1-byte elements
    None,
}

impl Endianness {
    pub fn name(self) -> &'static str {
        match self {
            Endianness::Big => "big",
            Endianness::Little => "little",
            Endianness::None => "none",
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl AxisValue for Endianness {
    const NAME: &'static str = "endianness";

    fn parse_token(token: &str) -> BenchResult<Self> {
        match token {
            "big" => Ok(Endianness::Big),
            "little" => Ok(Endianness::Little),
            "none" | "auto" => Ok(Endianness::None),
            _ => Err(BenchError::Parse(format!(
                "endianness \"{}\" is not recognized (valid: big, little, none)",
                token
            ))),
        }
    }

    fn defaults(ctx: &AxisContext<'_>) -> Vec<Self> {
        if ctx.dtype.item_size() == 1 {
            vec![Endianness::None]
        } else {
            vec![Endianness::Big, Endianness::Little]
        }
    }
}

/// Container format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ZarrVersion {
    #[serde(rename = "2")]
    V2,
    #[serde(rename = "3")]
    V3,
}

impl ZarrVersion {
    pub fn number(self) -> u8 {
        match self {
            ZarrVersion::V2 => 2,
            ZarrVersion::V3 => 3,
        }
    }
}

impl fmt::Display for ZarrVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl AxisValue for ZarrVersion {
    const NAME: &'static str = "zarr version";

    fn parse_token(token: &str) -> BenchResult<Self> {
        match token {
            "2" => Ok(ZarrVersion::V2),
            "3" => Ok(ZarrVersion::V3),
            _ => Err(BenchError::Parse(format!(
                "\"{}\" is not a supported zarr version (valid: 2, 3)",
                token
            ))),
        }
    }

    fn defaults(_ctx: &AxisContext<'_>) -> Vec<Self> {
        vec![ZarrVersion::V2, ZarrVersion::V3]
    }
}

/// One candidate chunk shape; every dimension is at least 1
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkShape(Vec<u64>);

impl ChunkShape {
    pub fn new(dims: Vec<u64>) -> BenchResult<Self> {
        if dims.is_empty() || dims.iter().any(|&d| d == 0) {
            return Err(BenchError::Parse(format!(
                "chunk shape {:?} must be positive in each axis",
                dims
            )));
        }
        Ok(Self(dims))
    }

    pub fn dims(&self) -> &[u64] {
        &self.0
    }

    /// Number of elements in one chunk
    pub fn volume(&self) -> u64 {
        self.0.iter().product()
    }

    /// Check dimensionality and bounds against the source shape.
    pub fn check_fits(&self, shape: &[u64]) -> BenchResult<()> {
        if self.0.len() != shape.len() {
            return Err(BenchError::ShapeMismatch(format!(
                "chunk {} has {} dimensions but the source has {}",
                self,
                self.0.len(),
                shape.len()
            )));
        }
        if let Some(axis) = (0..shape.len()).find(|&i| self.0[i] > shape[i]) {
            return Err(BenchError::ShapeMismatch(format!(
                "chunk {} exceeds the source extent {} along axis {}",
                self, shape[axis], axis
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ChunkShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::utils::format_shape(&self.0))
    }
}

impl AxisValue for ChunkShape {
    const NAME: &'static str = "chunk size";

    fn parse_token(token: &str) -> BenchResult<Self> {
        ChunkShape::new(parse_shape(token)?)
    }

    fn validate(&self, ctx: &AxisContext<'_>) -> BenchResult<()> {
        self.check_fits(ctx.shape)
    }

    fn defaults(ctx: &AxisContext<'_>) -> Vec<Self> {
        suggest_chunk_shapes(ctx.shape, ctx.dtype.item_size(), ctx.heuristic)
    }
}

/// Parse an `x`-delimited shape such as `1920x1080x512`.
pub fn parse_shape(text: &str) -> BenchResult<Vec<u64>> {
    text.trim()
        .split(DIMENSION_DELIMITER)
        .map(|ax| {
            ax.trim().parse::<u64>().map_err(|_| {
                BenchError::Parse(format!(
                    "`{}` is not an {}-delimited list of integers",
                    text, DIMENSION_DELIMITER
                ))
            })
        })
        .collect()
}

/// Raw, optional user input for every axis, as delivered by the CLI layer
#[derive(Debug, Clone, Default)]
pub struct AxisInputs {
    pub zarr_versions: Option<String>,
    pub clevels: Option<String>,
    pub compressors: Option<String>,
    pub shuffles: Option<String>,
    pub chunk_sizes: Option<String>,
    pub endiannesses: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(shape: &[u64], dtype: DType) -> AxisContext<'_> {
        AxisContext {
            shape,
            dtype,
            heuristic: ChunkHeuristic::default(),
        }
    }

    #[test]
    fn test_absent_input_yields_defaults_in_order() {
        let shape = [64, 64];
        let c = ctx(&shape, DType::UInt16);

        let levels = resolve::<CompressionLevel>(None, &c).unwrap();
        assert_eq!(levels.values(), CompressionLevel::defaults(&c).as_slice());

        let compressors = resolve::<Compressor>(Some("  "), &c).unwrap();
        assert_eq!(compressors.values(), &Compressor::ALL);

        let shuffles = resolve::<ShuffleMode>(None, &c).unwrap();
        assert_eq!(
            shuffles.values(),
            &[ShuffleMode::None, ShuffleMode::Bit, ShuffleMode::Byte]
        );

        let versions = resolve::<ZarrVersion>(None, &c).unwrap();
        assert_eq!(versions.values(), &[ZarrVersion::V2, ZarrVersion::V3]);
    }

    #[test]
    fn test_default_levels_are_capped_at_five() {
        let shape = [8];
        let levels = CompressionLevel::defaults(&ctx(&shape, DType::UInt8));
        assert!(levels.iter().all(|l| l.get() <= 5));
    }

    #[test]
    fn test_endianness_defaults_depend_on_item_size() {
        let shape = [8];
        assert_eq!(
            Endianness::defaults(&ctx(&shape, DType::UInt8)),
            vec![Endianness::None]
        );
        assert_eq!(
            Endianness::defaults(&ctx(&shape, DType::Float32)),
            vec![Endianness::Big, Endianness::Little]
        );
    }

    #[test]
    fn test_duplicates_collapse_keeping_first_occurrence() {
        let shape = [8];
        let levels = resolve::<CompressionLevel>(Some("5,1,5,3,1"), &ctx(&shape, DType::UInt8))
            .unwrap();
        let got: Vec<u8> = levels.values().iter().map(|l| l.get()).collect();
        assert_eq!(got, vec![5, 1, 3]);
    }

    #[test]
    fn test_parse_serialize_is_idempotent() {
        let shape = [100, 100, 100];
        let c = ctx(&shape, DType::UInt16);

        let shapes = resolve::<ChunkShape>(Some("50x50x50,100x100x10,50x50x50"), &c).unwrap();
        let reparsed = resolve::<ChunkShape>(Some(shapes.to_arg_string().as_str()), &c).unwrap();
        assert_eq!(shapes, reparsed);
        assert_eq!(shapes.to_arg_string(), "50x50x50,100x100x10");

        let compressors = resolve::<Compressor>(Some("zstd,lz4,zstd"), &c).unwrap();
        let reparsed = resolve::<Compressor>(Some(compressors.to_arg_string().as_str()), &c).unwrap();
        assert_eq!(compressors, reparsed);
    }

    #[test]
    fn test_malformed_tokens_are_parse_errors() {
        let shape = [10, 10];
        let c = ctx(&shape, DType::UInt16);

        assert!(matches!(
            resolve::<CompressionLevel>(Some("1,two"), &c),
            Err(BenchError::Parse(_))
        ));
        assert!(matches!(
            resolve::<CompressionLevel>(Some("10"), &c),
            Err(BenchError::Parse(_))
        ));
        assert!(matches!(
            resolve::<CompressionLevel>(Some("1,,2"), &c),
            Err(BenchError::Parse(_))
        ));
        assert!(matches!(
            resolve::<ChunkShape>(Some("5xfive"), &c),
            Err(BenchError::Parse(_))
        ));
        assert!(matches!(
            resolve::<ChunkShape>(Some("5x0"), &c),
            Err(BenchError::Parse(_))
        ));
        assert!(matches!(
            resolve::<Compressor>(Some("gzip"), &c),
            Err(BenchError::Parse(_))
        ));
    }

    #[test]
    fn test_chunk_shape_mismatch() {
        let shape = [10, 10];
        let c = ctx(&shape, DType::UInt16);

        assert!(matches!(
            resolve::<ChunkShape>(Some("5x5x5"), &c),
            Err(BenchError::ShapeMismatch(_))
        ));
        assert!(matches!(
            resolve::<ChunkShape>(Some("5x11"), &c),
            Err(BenchError::ShapeMismatch(_))
        ));
        assert!(resolve::<ChunkShape>(Some("10x10,5x5"), &c).is_ok());
    }

    #[test]
    fn test_endianness_none_parses_for_any_dtype() {
        // Cross-axis validity is decided by the space builder, not here.
        let shape = [4];
        let spec = resolve::<Endianness>(Some("none,little"), &ctx(&shape, DType::UInt32)).unwrap();
        assert_eq!(spec.values(), &[Endianness::None, Endianness::Little]);
    }

    #[test]
    fn test_parse_shape() {
        assert_eq!(parse_shape("1920x1080x512").unwrap(), vec![1920, 1080, 512]);
        assert_eq!(parse_shape("7").unwrap(), vec![7]);
        assert!(parse_shape("1920,1080").is_err());
    }

    #[test]
    fn test_shuffle_auto_resolution() {
        assert_eq!(ShuffleMode::Auto.resolve(1), ShuffleMode::Bit);
        assert_eq!(ShuffleMode::Auto.resolve(2), ShuffleMode::Byte);
        assert_eq!(ShuffleMode::None.resolve(1), ShuffleMode::None);
    }
}
