//! Seam classification and healing.
//!
//! A watershed separator that cuts through the shrink mask's core is an
//! artifact of a boundary indentation; one that only crosses material lost
//! under shrinking is a genuine neck. Artifact seams are painted back with
//! the foreground value.

use imageproc::point::Point;
use log::{debug, trace};

use crate::mask::{BinaryMask, Connectivity};
use crate::region::{connected_components, flood_fill};

/// Separator pixels and the seeds of the seams to heal.
#[derive(Debug, Clone)]
pub struct SeamClassification {
    /// Pixels that differ between the original and the split mask.
    pub separators: BinaryMask,
    /// One point per 8-connected piece of `separators ∧ shrink`, in raster
    /// order. Each lies on a separator.
    pub seeds: Vec<Point<u32>>,
}

/// Find the separator pixels introduced by the watershed and pick a seed on
/// every seam that crosses the shrink mask.
///
/// `connectivity` is the adjacency of the regions being separated. Seams are
/// labelled with [`Connectivity::seam`].
///
/// # Panics
///
/// Panics if the three masks differ in size.
#[must_use]
pub fn classify_seams(
    original: &BinaryMask,
    watershed_split: &BinaryMask,
    shrink: &BinaryMask,
    connectivity: Connectivity,
) -> SeamClassification {
    let separators = original.xor(watershed_split);
    let overlap = separators.and(shrink);
    let seeds: Vec<_> = connected_components(&overlap, connectivity.seam())
        .into_iter()
        .map(|c| c.start)
        .collect();

    debug!(
        "seams: {} separator pixels, {} overlap the core in {} places",
        separators.count(),
        overlap.count(),
        seeds.len()
    );
    SeamClassification { separators, seeds }
}

/// Paint every seam reachable from `seeds` back into `watershed_split`.
///
/// Seams are recovered with [`Connectivity::seam`] of the region
/// `connectivity`. Seams without a seed stay in place. A seed whose seam is
/// empty or a single pixel is skipped.
///
/// # Panics
///
/// Panics if `separators` and `watershed_split` differ in size.
#[must_use]
pub fn heal(
    mut watershed_split: BinaryMask,
    separators: &BinaryMask,
    seeds: &[Point<u32>],
    connectivity: Connectivity,
) -> BinaryMask {
    assert_eq!(
        separators.dimensions(),
        watershed_split.dimensions(),
        "separator mask size differs from the split mask"
    );
    let adjacency = connectivity.seam();
    for seed in seeds {
        let seam = flood_fill(separators, *seed, adjacency);
        if seam.len() < 2 {
            trace!("seams: degenerate seam at ({}, {}) skipped", seed.x, seed.y);
            continue;
        }
        trace!(
            "seams: healing {} pixels from ({}, {})",
            seam.len(),
            seed.x,
            seed.y
        );
        watershed_split.paint(&seam, true);
    }
    watershed_split
}
