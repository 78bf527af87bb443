//! Connected components, flood fill and shape convexity.
//!
//! These are the primitives the correction pipeline calls on every stage's
//! mask: labeling comes from `imageproc`, contours and hulls from its
//! `contours` and `geometry` modules.

use std::collections::VecDeque;

use image::{GrayImage, Luma};
use imageproc::contours::{self, BorderType};
use imageproc::geometry;
use imageproc::point::Point;
use imageproc::region_labelling;

use crate::mask::{BinaryMask, Connectivity, BACKGROUND, FOREGROUND};

/// A maximal connected region of foreground pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// First pixel of the component in raster order.
    pub start: Point<u32>,
    /// Every pixel of the component, in raster order.
    pub pixels: Vec<Point<u32>>,
    /// Inclusive bounding box `(min_x, min_y, max_x, max_y)`.
    pub bounds: (u32, u32, u32, u32),
}

impl Component {
    fn seeded(start: Point<u32>) -> Self {
        Self {
            start,
            pixels: vec![start],
            bounds: (start.x, start.y, start.x, start.y),
        }
    }

    fn push(&mut self, p: Point<u32>) {
        let (min_x, min_y, max_x, max_y) = &mut self.bounds;
        *min_x = (*min_x).min(p.x);
        *min_y = (*min_y).min(p.y);
        *max_x = (*max_x).max(p.x);
        *max_y = (*max_y).max(p.y);
        self.pixels.push(p);
    }

    /// Number of pixels.
    #[must_use]
    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    /// The component alone on a canvas with a one-pixel background margin,
    /// plus the canvas origin in image coordinates (may be -1).
    fn canvas(&self) -> (GrayImage, i64, i64) {
        let (min_x, min_y, max_x, max_y) = self.bounds;
        let mut canvas = GrayImage::new(max_x - min_x + 3, max_y - min_y + 3);
        for p in &self.pixels {
            canvas.put_pixel(p.x - min_x + 1, p.y - min_y + 1, Luma([FOREGROUND]));
        }
        (canvas, i64::from(min_x) - 1, i64::from(min_y) - 1)
    }

    /// Outer boundary polygon through the centres of the border pixels, in
    /// image coordinates.
    #[must_use]
    pub fn outer_contour(&self) -> Vec<Point<i32>> {
        let (canvas, ox, oy) = self.canvas();
        #[allow(clippy::cast_possible_truncation)]
        let (ox, oy) = (ox as i32, oy as i32);
        contours::find_contours::<i32>(&canvas)
            .into_iter()
            .find(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .map(|c| {
                c.points
                    .into_iter()
                    .map(|p| Point::new(p.x + ox, p.y + oy))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The region enclosed by the outer contour: the component's pixels plus
    /// any holes inside it.
    #[must_use]
    pub fn filled(&self, connectivity: Connectivity) -> Vec<Point<u32>> {
        let (canvas, ox, oy) = self.canvas();
        let (width, height) = canvas.dimensions();
        let outside = BinaryMask::from_fn(width, height, |x, y| {
            canvas.get_pixel(x, y)[0] == BACKGROUND
        });
        // Background that separates foreground of `connectivity` is connected
        // under the complementary adjacency.
        let reached = flood_fill(&outside, Point::new(0, 0), connectivity.complement());
        let mut exterior = vec![false; (width * height) as usize];
        for p in &reached {
            exterior[(p.y * width + p.x) as usize] = true;
        }

        let mut filled = Vec::new();
        for y in 0..height {
            for x in 0..width {
                if !exterior[(y * width + x) as usize] {
                    // The margin is always exterior, so these never go negative.
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    let p = Point::new((i64::from(x) + ox) as u32, (i64::from(y) + oy) as u32);
                    filled.push(p);
                }
            }
        }
        filled
    }
}

/// Label the foreground of `mask`, returning components in raster order of
/// their start pixels.
#[must_use]
pub fn connected_components(mask: &BinaryMask, connectivity: Connectivity) -> Vec<Component> {
    let labels = region_labelling::connected_components(
        mask.as_gray(),
        connectivity.labelling(),
        Luma([BACKGROUND]),
    );

    let mut slot_of_label: Vec<Option<usize>> = Vec::new();
    let mut components: Vec<Component> = Vec::new();

    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if label >= slot_of_label.len() {
            slot_of_label.resize(label + 1, None);
        }
        let p = Point::new(x, y);
        match slot_of_label[label] {
            Some(slot) => components[slot].push(p),
            None => {
                slot_of_label[label] = Some(components.len());
                components.push(Component::seeded(p));
            }
        }
    }

    components
}

/// All foreground pixels of `mask` reachable from `seed`, in visiting order.
///
/// Returns an empty region when the seed is out of bounds or on background.
#[must_use]
pub fn flood_fill(mask: &BinaryMask, seed: Point<u32>, connectivity: Connectivity) -> Vec<Point<u32>> {
    if !mask.get(seed.x, seed.y) {
        return Vec::new();
    }

    let (width, height) = mask.dimensions();
    let mut visited = vec![false; (width as usize) * (height as usize)];
    let mut queue = VecDeque::from([seed]);
    let mut region = Vec::new();
    visited[(seed.y as usize) * (width as usize) + seed.x as usize] = true;

    while let Some(p) = queue.pop_front() {
        region.push(p);
        for (nx, ny) in connectivity.neighbors(p.x, p.y, width, height) {
            let idx = (ny as usize) * (width as usize) + nx as usize;
            if !visited[idx] && mask.get(nx, ny) {
                visited[idx] = true;
                queue.push_back(Point::new(nx, ny));
            }
        }
    }

    region
}

/// Measures how close a component's shape is to its convex hull.
pub trait ConvexityMeasure {
    /// Convexity in `(0, 1]`, or `None` when the component is too degenerate
    /// to measure (a single pixel, for instance).
    fn convexity(&self, component: &Component) -> Option<f64>;
}

/// Convex hull perimeter divided by contour perimeter.
#[derive(Debug, Clone, Copy, Default)]
pub struct HullPerimeterRatio;

impl ConvexityMeasure for HullPerimeterRatio {
    fn convexity(&self, component: &Component) -> Option<f64> {
        let contour = component.outer_contour();
        let perimeter = geometry::arc_length(&contour, true);
        if perimeter <= f64::EPSILON {
            return None;
        }
        let hull = geometry::convex_hull(contour.as_slice());
        let hull_perimeter = geometry::arc_length(&hull, true);
        Some((hull_perimeter / perimeter).min(1.0))
    }
}

/// Contour area divided by convex hull area (solidity).
#[derive(Debug, Clone, Copy, Default)]
pub struct HullAreaRatio;

impl ConvexityMeasure for HullAreaRatio {
    fn convexity(&self, component: &Component) -> Option<f64> {
        let contour = component.outer_contour();
        let hull = geometry::convex_hull(contour.as_slice());
        let hull_area = polygon_area(&hull);
        if hull_area <= f64::EPSILON {
            return None;
        }
        Some((polygon_area(&contour) / hull_area).min(1.0))
    }
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let area = twice.abs() as f64 / 2.0;
    area
}
