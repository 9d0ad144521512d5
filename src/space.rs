//! # Configuration Space Builder
//!
//! A [`ParameterSpace`] holds one resolved candidate set per axis and
//! enumerates their cross product lazily. Enumeration order is the
//! lexicographic cross-product order over the axes, outermost first:
//!
//! 1. zarr version
//! 2. compression level
//! 3. compressor
//! 4. shuffle
//! 5. chunk shape
//! 6. endianness
//!
//! Iterating twice yields the same sequence, so result files from separate
//! runs line up row for row.
//!
//! Validity is cross-axis (endianness depends on the element type), so each
//! combination is checked by the [`CONSTRAINTS`] predicates as it is
//! generated. Invalid combinations are skipped by [`ParameterSpace::iter`];
//! [`ParameterSpace::iter_checked`] exposes them so the caller can warn.

use crate::axis::{
    resolve, AxisContext, AxisInputs, AxisSpec, ChunkShape, CompressionLevel, Compressor,
    Endianness, ShuffleMode, ZarrVersion,
};
use crate::chunking::ChunkHeuristic;
use crate::error::{BenchError, BenchResult};
use crate::source::{byte_count, DType};
use crate::utils::format_shape;
use serde::{Deserialize, Serialize};
use std::fmt;

const AXIS_COUNT: usize = 6;

/// One concrete assignment of a value to every axis.
///
/// Identity is the tuple of axis values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    zarr_version: ZarrVersion,
    clevel: CompressionLevel,
    compressor: Compressor,
    shuffle: ShuffleMode,
    chunk_shape: ChunkShape,
    endianness: Endianness,
}

impl Configuration {
    pub fn new(
        zarr_version: ZarrVersion,
        clevel: CompressionLevel,
        compressor: Compressor,
        shuffle: ShuffleMode,
        chunk_shape: ChunkShape,
        endianness: Endianness,
    ) -> Self {
        Self {
            zarr_version,
            clevel,
            compressor,
            shuffle,
            chunk_shape,
            endianness,
        }
    }

    pub fn zarr_version(&self) -> ZarrVersion {
        self.zarr_version
    }

    pub fn clevel(&self) -> CompressionLevel {
        self.clevel
    }

    pub fn compressor(&self) -> Compressor {
        self.compressor
    }

    pub fn shuffle(&self) -> ShuffleMode {
        self.shuffle
    }

    pub fn chunk_shape(&self) -> &ChunkShape {
        &self.chunk_shape
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "zarr version: {}, clevel: {}, compressor: {}, shuffle: {}, chunk size: {}, endianness: {}",
            self.zarr_version,
            self.clevel,
            self.compressor,
            self.shuffle,
            self.chunk_shape,
            self.endianness
        )
    }
}

/// What the constraint predicates know about the source
#[derive(Debug, Clone, Copy)]
pub struct ConstraintContext<'a> {
    pub shape: &'a [u64],
    pub dtype: DType,
}

/// Outcome of checking one Configuration against one constraint
#[derive(Debug)]
pub enum Validity {
    Valid,
    Invalid(BenchError),
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

pub type Constraint = fn(&Configuration, &ConstraintContext<'_>) -> Validity;

/// Cross-axis predicates, evaluated in order on every generated Configuration
pub const CONSTRAINTS: &[Constraint] = &[endianness_matches_dtype, chunk_fits_source];

/// "none" endianness is only meaningful for 1-byte elements.
pub fn endianness_matches_dtype(config: &Configuration, ctx: &ConstraintContext<'_>) -> Validity {
    if config.endianness == Endianness::None && ctx.dtype.item_size() != 1 {
        return Validity::Invalid(BenchError::Configuration(format!(
            "endianness \"none\" requires a 1-byte dtype, but {} is {} bytes",
            ctx.dtype,
            ctx.dtype.item_size()
        )));
    }
    Validity::Valid
}

pub fn chunk_fits_source(config: &Configuration, ctx: &ConstraintContext<'_>) -> Validity {
    match config.chunk_shape.check_fits(ctx.shape) {
        Ok(()) => Validity::Valid,
        Err(err) => Validity::Invalid(BenchError::Configuration(err.to_string())),
    }
}

/// Run every constraint; the first failure wins.
pub fn check_configuration(
    config: &Configuration,
    ctx: &ConstraintContext<'_>,
) -> BenchResult<()> {
    for constraint in CONSTRAINTS {
        if let Validity::Invalid(err) = constraint(config, ctx) {
            return Err(err);
        }
    }
    Ok(())
}

/// The resolved axes for one source
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    shape: Vec<u64>,
    dtype: DType,
    zarr_versions: AxisSpec<ZarrVersion>,
    clevels: AxisSpec<CompressionLevel>,
    compressors: AxisSpec<Compressor>,
    shuffles: AxisSpec<ShuffleMode>,
    chunk_shapes: AxisSpec<ChunkShape>,
    endiannesses: AxisSpec<Endianness>,
}

impl ParameterSpace {
    /// Resolve every axis from raw user input, falling back to defaults.
    ///
    /// Fails on malformed input or chunk shapes that do not fit the source;
    /// both are fatal before any benchmarking.
    pub fn resolve(
        shape: &[u64],
        dtype: DType,
        inputs: &AxisInputs,
        heuristic: ChunkHeuristic,
    ) -> BenchResult<Self> {
        if shape.is_empty() || shape.contains(&0) {
            return Err(BenchError::Parse(
                "source shape must be non-empty and positive in each axis".into(),
            ));
        }
        // Everything downstream multiplies extents; reject shapes that overflow.
        if byte_count(shape, dtype.item_size()).is_none() {
            return Err(BenchError::Parse(format!(
                "source shape {} of {} is too large to address",
                format_shape(shape),
                dtype
            )));
        }
        let ctx = AxisContext {
            shape,
            dtype,
            heuristic,
        };
        Ok(Self {
            shape: shape.to_vec(),
            dtype,
            zarr_versions: resolve(inputs.zarr_versions.as_deref(), &ctx)?,
            clevels: resolve(inputs.clevels.as_deref(), &ctx)?,
            compressors: resolve(inputs.compressors.as_deref(), &ctx)?,
            shuffles: resolve(inputs.shuffles.as_deref(), &ctx)?,
            chunk_shapes: resolve(inputs.chunk_sizes.as_deref(), &ctx)?,
            endiannesses: resolve(inputs.endiannesses.as_deref(), &ctx)?,
        })
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn chunk_shapes(&self) -> &AxisSpec<ChunkShape> {
        &self.chunk_shapes
    }

    fn axis_lengths(&self) -> [usize; AXIS_COUNT] {
        [
            self.zarr_versions.len(),
            self.clevels.len(),
            self.compressors.len(),
            self.shuffles.len(),
            self.chunk_shapes.len(),
            self.endiannesses.len(),
        ]
    }

    /// Size of the raw cross product, before constraint checks
    pub fn num_combinations(&self) -> usize {
        self.axis_lengths().iter().product()
    }

    /// Number of combinations that pass every constraint.
    ///
    /// Walks the space without storing it.
    pub fn num_valid(&self) -> usize {
        self.iter().count()
    }

    fn constraint_context(&self) -> ConstraintContext<'_> {
        ConstraintContext {
            shape: &self.shape,
            dtype: self.dtype,
        }
    }

    /// Every combination in sweep order, each paired with its validity.
    pub fn iter_checked(&self) -> CheckedConfigurations<'_> {
        CheckedConfigurations {
            space: self,
            indices: [0; AXIS_COUNT],
            remaining: self.num_combinations(),
        }
    }

    /// Valid combinations only, in sweep order.
    pub fn iter(&self) -> impl Iterator<Item = Configuration> + '_ {
        self.iter_checked().filter_map(Result::ok)
    }

    fn configuration_at(&self, indices: &[usize; AXIS_COUNT]) -> Configuration {
        Configuration::new(
            self.zarr_versions.values()[indices[0]],
            self.clevels.values()[indices[1]],
            self.compressors.values()[indices[2]],
            self.shuffles.values()[indices[3]],
            self.chunk_shapes.values()[indices[4]].clone(),
            self.endiannesses.values()[indices[5]],
        )
    }
}

/// Lazy cross-product walk over a [`ParameterSpace`]
pub struct CheckedConfigurations<'a> {
    space: &'a ParameterSpace,
    indices: [usize; AXIS_COUNT],
    remaining: usize,
}

impl Iterator for CheckedConfigurations<'_> {
    type Item = BenchResult<Configuration>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let config = self.space.configuration_at(&self.indices);
        self.remaining -= 1;

        // Odometer step: innermost axis (endianness) moves fastest.
        let lengths = self.space.axis_lengths();
        for axis in (0..AXIS_COUNT).rev() {
            self.indices[axis] += 1;
            if self.indices[axis] < lengths[axis] {
                break;
            }
            // Wrapped: reset and carry into the next axis out.
            self.indices[axis] = 0;
        }

        // Invalid combinations are still yielded, as errors, so the caller
        // can count and report them.
        let ctx = self.space.constraint_context();
        Some(check_configuration(&config, &ctx).map(|()| config))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for CheckedConfigurations<'_> {}

impl fmt::Display for ParameterSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn row(f: &mut fmt::Formatter<'_>, title: &str, value: String) -> fmt::Result {
            writeln!(f, "  {:>15} {}", title, value)
        }

        writeln!(
            f,
            "Parameter space ({} total tests)",
            self.num_combinations()
        )?;
        row(f, "shape", format_shape(&self.shape))?;
        row(
            f,
            "chunk sizes",
            self.chunk_shapes
                .values()
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        )?;
        row(f, "dtype", self.dtype.to_string())?;
        row(f, "zarr versions", self.zarr_versions.to_arg_string())?;
        row(f, "clevels", self.clevels.to_arg_string())?;
        row(f, "compressors", self.compressors.to_arg_string())?;
        row(f, "shuffles", self.shuffles.to_arg_string())?;
        row(f, "endiannesses", self.endiannesses.to_arg_string())?;
        write!(f, "  {:>15} {}", "test count", self.num_combinations())
    }
}
