//! Shrink-mask construction.
//!
//! The shrink mask is the "robust core" of the silhouette: material that
//! survives progressive erosion. Watershed cuts through the core follow
//! boundary indentations rather than genuine necks.

use imageproc::point::Point;
use log::{debug, trace};

use crate::error::{Error, Result};
use crate::mask::{BinaryMask, Connectivity};
use crate::region::{connected_components, ConvexityMeasure};

/// How the shrink mask is derived from the silhouette.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShrinkStrategy {
    /// Erode the whole mask a fixed number of times.
    FixedIterations(u8),
    /// Erode each component until its convexity exceeds the threshold, then
    /// keep its outline from that iteration.
    ConvexityDriven(f64),
}

impl Default for ShrinkStrategy {
    fn default() -> Self {
        ShrinkStrategy::FixedIterations(1)
    }
}

impl ShrinkStrategy {
    /// Select a strategy from the erosion cycle count and convexity
    /// threshold. A threshold of exactly 0 selects fixed iterations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCycles`] unless `cycles` is in `1..=255`, and
    /// [`Error::InvalidThreshold`] unless `threshold` is in `[0, 1]`.
    pub fn from_params(cycles: u32, threshold: f64) -> Result<Self> {
        let cycles = u8::try_from(cycles)
            .ok()
            .filter(|&c| c >= 1)
            .ok_or(Error::InvalidCycles(cycles))?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidThreshold(threshold));
        }

        if threshold <= 0.0 {
            Ok(ShrinkStrategy::FixedIterations(cycles))
        } else {
            Ok(ShrinkStrategy::ConvexityDriven(threshold))
        }
    }

    /// Check the parameters of an already-built strategy.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ShrinkStrategy::from_params`].
    pub fn validate(&self) -> Result<()> {
        match *self {
            ShrinkStrategy::FixedIterations(0) => Err(Error::InvalidCycles(0)),
            ShrinkStrategy::ConvexityDriven(t) if t.is_nan() || t <= 0.0 || t > 1.0 => {
                Err(Error::InvalidThreshold(t))
            }
            _ => Ok(()),
        }
    }
}

/// A component that reached the convexity threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenRegion {
    /// Number of erosions applied before the component was frozen.
    pub iteration: u32,
    /// Convexity measured at freeze time.
    pub convexity: f64,
    /// First pixel of the component in raster order at freeze time.
    pub start: Point<u32>,
    /// Pixel count of the filled outline written into the shrink mask.
    pub area: usize,
}

/// The shrink mask and, for the convexity-driven strategy, how it was built.
#[derive(Debug, Clone)]
pub struct ShrinkMask {
    /// Core pixels.
    pub mask: BinaryMask,
    /// Frozen components in the order they were frozen. Empty for the
    /// fixed-iteration strategy.
    pub frozen: Vec<FrozenRegion>,
}

/// Build the shrink mask of `original`.
pub fn build_shrink_mask<M>(
    original: &BinaryMask,
    strategy: ShrinkStrategy,
    connectivity: Connectivity,
    measure: &M,
) -> ShrinkMask
where
    M: ConvexityMeasure + ?Sized,
{
    match strategy {
        ShrinkStrategy::FixedIterations(cycles) => {
            let mask = original.eroded(connectivity, cycles);
            debug!(
                "shrink: {cycles} erosions keep {} of {} pixels",
                mask.count(),
                original.count()
            );
            ShrinkMask {
                mask,
                frozen: Vec::new(),
            }
        }
        ShrinkStrategy::ConvexityDriven(threshold) => {
            shrink_until_convex(original, threshold, connectivity, measure)
        }
    }
}

fn shrink_until_convex<M>(
    original: &BinaryMask,
    threshold: f64,
    connectivity: Connectivity,
    measure: &M,
) -> ShrinkMask
where
    M: ConvexityMeasure + ?Sized,
{
    let (width, height) = original.dimensions();
    let mut core = BinaryMask::new(width, height);
    let mut working = original.clone();
    let mut frozen = Vec::new();
    let mut iteration = 0u32;

    // Every erosion of a non-empty mask removes pixels, so this terminates.
    while !working.is_empty() {
        for component in connected_components(&working, connectivity) {
            let Some(convexity) = measure.convexity(&component) else {
                continue;
            };
            if convexity <= threshold {
                continue;
            }

            let outline = component.filled(connectivity);
            core.paint(&outline, true);
            working.paint(&component.pixels, false);
            trace!(
                "shrink: froze component at ({}, {}) after {iteration} erosions, convexity {convexity:.3}",
                component.start.x,
                component.start.y
            );
            frozen.push(FrozenRegion {
                iteration,
                convexity,
                start: component.start,
                area: outline.len(),
            });
        }

        working = working.eroded(connectivity, 1);
        iteration += 1;
    }

    debug!(
        "shrink: {} components frozen over {iteration} iterations, core has {} pixels",
        frozen.len(),
        core.count()
    );
    ShrinkMask { mask: core, frozen }
}
