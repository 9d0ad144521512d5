//! # Chunk-Shape Heuristic
//!
//! Suggests a handful of chunk shapes when the user does not supply any.
//!
//! Along each axis the candidate lengths are `ceil(axis / n)` for a geometric
//! series of divisors `n`, starting where the length is about
//! [`MIN_AXIS_CHUNK`] and ending at the whole axis. Rounding up keeps the
//! last chunk along an axis more than half full. The cross product of the
//! per-axis lengths is ordered by volume, anything over the per-chunk memory
//! ceiling is dropped, and the list is thinned so each kept volume is a
//! fixed ratio larger than the previous one. The largest admissible shape is
//! always kept: sequential write throughput usually climbs with chunk volume,
//! so the large end of the range matters most.
//!
//! The result depends only on the source shape, element size and heuristic
//! options, so repeated calls return the same shapes in the same order.

use crate::axis::ChunkShape;
use crate::source::byte_count;
use tracing::debug;

/// Smallest per-axis chunk length the heuristic aims for
pub const MIN_AXIS_CHUNK: u64 = 32;

/// Per-chunk byte ceiling (blosc's maximum buffer size)
pub const MAX_CHUNK_BYTES: u64 = (1 << 31) - 17;

/// Upper bound on the number of suggested shapes
pub const MAX_SUGGESTIONS: usize = 5;

/// Options for [`suggest_chunk_shapes`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkHeuristic {
    /// Keep the last two axes whole (one chunk spans full frames) and only
    /// vary the leading axes. Uses a tighter geometric ratio because fewer
    /// lengths are available.
    pub full_frame: bool,
}

impl ChunkHeuristic {
    fn ratio(self) -> f64 {
        if self.full_frame {
            1.25
        } else {
            1.5
        }
    }
}

/// Candidate chunk lengths along one axis, longest divisor first.
fn axis_lengths(axis: u64, ratio: f64) -> Vec<u64> {
    if axis < MIN_AXIS_CHUNK {
        return vec![axis];
    }

    let mut lengths = Vec::new();
    let mut n = axis / MIN_AXIS_CHUNK;
    while n >= 1 {
        let length = axis.div_ceil(n);
        if !lengths.contains(&length) {
            lengths.push(length);
        }
        n = (n as f64 / ratio) as u64;
    }
    lengths
}

fn cartesian(per_axis: &[Vec<u64>]) -> Vec<Vec<u64>> {
    per_axis.iter().fold(vec![Vec::new()], |acc, lengths| {
        acc.iter()
            .flat_map(|prefix| {
                lengths.iter().map(move |&len| {
                    let mut shape = prefix.clone();
                    shape.push(len);
                    shape
                })
            })
            .collect()
    })
}

/// A chunk whose byte size overflows counts as over the ceiling.
fn under_ceiling(dims: &[u64], item_size: u64) -> bool {
    byte_count(dims, item_size as usize).is_some_and(|bytes| bytes <= MAX_CHUNK_BYTES)
}

/// Halve the longest dimension until the chunk fits under the ceiling.
fn shrink_to_ceiling(mut dims: Vec<u64>, item_size: u64) -> Vec<u64> {
    while !under_ceiling(&dims, item_size) {
        let Some(longest) = (0..dims.len()).max_by_key(|&i| (dims[i], std::cmp::Reverse(i)))
        else {
            break;
        };
        if dims[longest] == 1 {
            break;
        }
        dims[longest] = dims[longest].div_ceil(2);
    }
    dims
}

/// Suggest chunk shapes for a source of `shape` with `item_size`-byte
/// elements. Returned in ascending volume order; never empty for a
/// non-empty shape.
pub fn suggest_chunk_shapes(
    shape: &[u64],
    item_size: usize,
    heuristic: ChunkHeuristic,
) -> Vec<ChunkShape> {
    if shape.is_empty() || shape.contains(&0) {
        return Vec::new();
    }
    let ratio = heuristic.ratio();
    let item_size = item_size.max(1) as u64;

    let frame_axes = if heuristic.full_frame {
        shape.len().min(2)
    } else {
        0
    };
    let split = shape.len() - frame_axes;
    let per_axis: Vec<Vec<u64>> = shape
        .iter()
        .enumerate()
        .map(|(i, &axis)| {
            if i < split {
                axis_lengths(axis, ratio)
            } else {
                vec![axis]
            }
        })
        .collect();

    // Volumes are computed only after the ceiling check, so they cannot overflow.
    let mut candidates: Vec<(u64, Vec<u64>)> = cartesian(&per_axis)
        .into_iter()
        .filter(|dims| under_ceiling(dims, item_size))
        .map(|dims| (dims.iter().product::<u64>(), dims))
        .collect();
    candidates.sort();

    // Even the smallest per-axis lengths are too big: shrink one shape down.
    if candidates.is_empty() {
        let smallest: Vec<u64> = per_axis
            .iter()
            .map(|lengths| lengths.iter().copied().min().unwrap_or(1))
            .collect();
        let dims = shrink_to_ceiling(smallest, item_size);
        candidates.push((dims.iter().product(), dims));
    }

    // Thin: keep a candidate only once its volume clears the previous keep
    // by the geometric ratio.
    let mut selected: Vec<&(u64, Vec<u64>)> = vec![&candidates[0]];
    let mut volume_to_beat = candidates[0].0 as f64 * ratio;
    for candidate in &candidates[1..] {
        if candidate.0 as f64 > volume_to_beat {
            selected.push(candidate);
            volume_to_beat = candidate.0 as f64 * ratio;
        }
    }
    if let Some(largest) = candidates.last() {
        if selected.last().map(|s| &s.1) != Some(&largest.1) {
            selected.push(largest);
        }
    }

    // Subsample evenly, always including both ends.
    if selected.len() > MAX_SUGGESTIONS {
        let last = selected.len() - 1;
        let span = MAX_SUGGESTIONS - 1;
        selected = (0..MAX_SUGGESTIONS)
            .map(|i| selected[(i * last + span / 2) / span])
            .collect();
    }

    debug!(
        "Chunk heuristic kept {} of {} candidates for {:?}",
        selected.len(),
        candidates.len(),
        shape
    );

    selected
        .into_iter()
        .filter_map(|(_, dims)| ChunkShape::new(dims.clone()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_lengths() {
        assert_eq!(axis_lengths(10, 1.5), vec![10]);
        assert_eq!(axis_lengths(100, 1.5), vec![34, 50, 100]);
        assert_eq!(axis_lengths(64, 1.5), vec![32, 64]);
        for len in axis_lengths(2048, 1.5) {
            assert!(len >= MIN_AXIS_CHUNK && len <= 2048);
        }
    }

    #[test]
    fn test_cube_suggestions() {
        let shape = [100, 100, 100];
        let shapes = suggest_chunk_shapes(&shape, 4, ChunkHeuristic::default());

        assert!(shapes.len() >= 3);
        assert!(shapes.len() <= MAX_SUGGESTIONS);
        for chunk in &shapes {
            assert_eq!(chunk.dims().len(), 3);
            assert!(chunk.dims().iter().all(|&d| (1..=100).contains(&d)));
        }

        let volumes: Vec<u64> = shapes.iter().map(|s| s.volume()).collect();
        assert!(volumes.windows(2).all(|w| w[0] <= w[1]));

        let mut distinct = shapes.clone();
        distinct.dedup();
        assert_eq!(distinct.len(), shapes.len());

        // Whole array fits under the ceiling, so it is the largest suggestion.
        assert_eq!(shapes.last().unwrap().dims(), &[100, 100, 100]);
    }

    #[test]
    fn test_suggestions_are_deterministic() {
        let shape = [100, 100, 100];
        let first = suggest_chunk_shapes(&shape, 4, ChunkHeuristic::default());
        let second = suggest_chunk_shapes(&shape, 4, ChunkHeuristic::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_memory_ceiling_respected() {
        let shape = [1928, 1440, 2048];
        let shapes = suggest_chunk_shapes(&shape, 2, ChunkHeuristic::default());
        assert!(!shapes.is_empty());
        for chunk in &shapes {
            assert!(chunk.volume() * 2 <= MAX_CHUNK_BYTES);
            chunk.check_fits(&shape).unwrap();
        }
    }

    #[test]
    fn test_full_frame_keeps_last_axes_whole() {
        let shape = [512, 256, 256];
        let shapes = suggest_chunk_shapes(&shape, 2, ChunkHeuristic { full_frame: true });
        assert!(shapes.len() >= 2);
        for chunk in &shapes {
            assert_eq!(&chunk.dims()[1..], &[256, 256]);
        }
    }

    #[test]
    fn test_small_array_single_suggestion() {
        let shapes = suggest_chunk_shapes(&[8, 8], 1, ChunkHeuristic::default());
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].dims(), &[8, 8]);
    }

    #[test]
    fn test_huge_shape_does_not_overflow() {
        let shapes = suggest_chunk_shapes(&[1 << 32, 1 << 32, 4], 1, ChunkHeuristic::default());
        assert!(!shapes.is_empty());
        for chunk in &shapes {
            assert!(under_ceiling(chunk.dims(), 1));
        }
        assert!(!under_ceiling(&[u64::MAX, 2], 1));
    }

    #[test]
    fn test_shrink_to_ceiling() {
        let dims = shrink_to_ceiling(vec![1 << 16, 1 << 16], 8);
        assert!(under_ceiling(&dims, 8));
        assert!(dims.iter().all(|&d| d >= 1));
    }
}
