//! Reference watershed splitter.
//!
//! [`EdmWatershed`] floods the Euclidean distance map of the silhouette from
//! its maxima. Pixels where two floods meet become background, leaving
//! one-pixel separator lines between the resulting regions.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;
use log::debug;

use crate::error::{Error, Result};
use crate::mask::{BinaryMask, Connectivity};

/// Splits touching objects of a binary mask along separator lines.
pub trait Watershed {
    /// Return a copy of `mask` with separator lines set to background.
    ///
    /// The result must have the same dimensions as `mask` and must be
    /// deterministic for a given mask and connectivity.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the split cannot be computed.
    fn split(&self, mask: &BinaryMask, connectivity: Connectivity) -> Result<BinaryMask>;
}

/// Marker-controlled watershed on the Euclidean distance map.
#[derive(Debug, Clone, Copy)]
pub struct EdmWatershed {
    /// How far (in pixels of distance) a maximum must rise above the saddle
    /// joining it to a higher one to seed its own region.
    pub tolerance: f32,
}

impl Default for EdmWatershed {
    fn default() -> Self {
        Self { tolerance: 0.5 }
    }
}

const UNLABELLED: u32 = 0;
const LINE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Plateau,
    Claimed,
}

/// Index arithmetic over a row-major pixel grid.
#[derive(Debug, Clone, Copy)]
struct Grid {
    width: u32,
    height: u32,
    connectivity: Connectivity,
}

impl Grid {
    fn len(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    fn neighbors(self, index: usize) -> impl Iterator<Item = usize> {
        let w = self.width as usize;
        #[allow(clippy::cast_possible_truncation)]
        let (x, y) = ((index % w) as u32, (index / w) as u32);
        self.connectivity
            .neighbors(x, y, self.width, self.height)
            .map(move |(nx, ny)| (ny as usize) * w + nx as usize)
    }
}

/// Heap entry: highest distance first, then first-come first-served.
#[derive(Debug, PartialEq)]
struct Queued {
    level: f32,
    seq: u64,
    index: usize,
}

impl Eq for Queued {}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.level
            .total_cmp(&other.level)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Watershed for EdmWatershed {
    fn split(&self, mask: &BinaryMask, connectivity: Connectivity) -> Result<BinaryMask> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::Watershed(format!(
                "maxima tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }

        let (width, height) = mask.dimensions();
        let grid = Grid {
            width,
            height,
            connectivity,
        };
        let edm = distance_map(mask);
        let maxima = find_maxima(&edm, grid, self.tolerance);
        let labels = flood(&edm, grid, &maxima);

        let w = width as usize;
        let split = BinaryMask::from_fn(width, height, |x, y| {
            mask.get(x, y) && labels[(y as usize) * w + x as usize] != LINE
        });
        debug!(
            "watershed: {} maxima, {} line pixels",
            maxima.len(),
            mask.count() - split.count()
        );
        Ok(split)
    }
}

/// Euclidean distance from each foreground pixel to the nearest background
/// pixel, counting the area outside the image as background. Background
/// pixels map to 0.
fn distance_map(mask: &BinaryMask) -> Vec<f32> {
    let (width, height) = mask.dimensions();
    let background = GrayImage::from_fn(width + 2, height + 2, |x, y| {
        let inside = (1..=width).contains(&x) && (1..=height).contains(&y) && mask.get(x - 1, y - 1);
        Luma([if inside { 0 } else { 255 }])
    });
    let squared = euclidean_squared_distance_transform(&background);

    let mut edm = Vec::with_capacity((width as usize) * (height as usize));
    for y in 0..height {
        for x in 0..width {
            #[allow(clippy::cast_possible_truncation)]
            let distance = squared.get_pixel(x + 1, y + 1)[0].sqrt() as f32;
            edm.push(distance);
        }
    }
    edm
}

/// Regional maxima of the distance map that rise more than `tolerance` above
/// every path to a higher pixel. Each maximum is returned as the plateau of
/// pixels at its level, in descending order of level.
fn find_maxima(edm: &[f32], grid: Grid, tolerance: f32) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..grid.len()).filter(|&i| edm[i] > 0.0).collect();
    order.sort_by(|&a, &b| edm[b].total_cmp(&edm[a]).then(a.cmp(&b)));

    let mut marks = vec![Mark::Open; grid.len()];
    let mut stamp = vec![0u32; grid.len()];
    let mut generation = 0u32;
    let mut stack = Vec::new();
    let mut visited = Vec::new();
    let mut maxima = Vec::new();

    for &start in &order {
        if marks[start] != Mark::Open {
            continue;
        }
        let level = edm[start];
        generation += 1;
        stack.clear();
        visited.clear();
        stack.push(start);
        stamp[start] = generation;

        let mut is_maximum = true;
        'flood: while let Some(i) = stack.pop() {
            visited.push(i);
            for j in grid.neighbors(i) {
                if stamp[j] == generation || edm[j] <= 0.0 {
                    continue;
                }
                if edm[j] > level || marks[j] == Mark::Claimed {
                    is_maximum = false;
                    break 'flood;
                }
                if edm[j] >= level - tolerance {
                    stamp[j] = generation;
                    stack.push(j);
                }
            }
        }

        if is_maximum {
            for &i in &visited {
                marks[i] = Mark::Claimed;
            }
            maxima.push(visited.iter().copied().filter(|&i| edm[i] >= level).collect());
        } else {
            for &i in visited.iter().chain(stack.iter()) {
                if edm[i] >= level {
                    marks[i] = Mark::Plateau;
                }
            }
        }
    }

    maxima
}

/// Flood the distance map downwards from the maxima. Returns one label per
/// pixel: `UNLABELLED` for background, `LINE` where floods meet.
fn flood(edm: &[f32], grid: Grid, maxima: &[Vec<usize>]) -> Vec<u32> {
    let mut labels = vec![UNLABELLED; grid.len()];
    let mut queued = vec![false; grid.len()];
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    let mut enqueue = |index: usize, heap: &mut BinaryHeap<Queued>, queued: &mut [bool]| {
        if edm[index] > 0.0 && !queued[index] {
            queued[index] = true;
            heap.push(Queued {
                level: edm[index],
                seq,
                index,
            });
            seq += 1;
        }
    };

    for (label, plateau) in (1u32..).zip(maxima) {
        for &i in plateau {
            labels[i] = label;
            queued[i] = true;
        }
    }
    for plateau in maxima {
        for &i in plateau {
            for j in grid.neighbors(i) {
                enqueue(j, &mut heap, &mut queued);
            }
        }
    }

    while let Some(Queued { index, .. }) = heap.pop() {
        let mut found = UNLABELLED;
        let mut meeting = false;
        for j in grid.neighbors(index) {
            let label = labels[j];
            if label == UNLABELLED || label == LINE {
                continue;
            }
            if found == UNLABELLED {
                found = label;
            } else if found != label {
                meeting = true;
                break;
            }
        }

        if meeting {
            labels[index] = LINE;
            continue;
        }
        labels[index] = found;
        for j in grid.neighbors(index) {
            enqueue(j, &mut heap, &mut queued);
        }
    }

    labels
}
