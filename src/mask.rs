//! Binary masks with a fixed internal value convention.
//!
//! Every mask in the pipeline stores foreground as `255` and background as
//! `0`. Source images may use either convention; [`BinaryMask::from_gray`]
//! normalizes them once and [`BinaryMask::to_gray`] restores the caller's
//! convention on the way out.

use image::{imageops, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::point::Point;
use imageproc::region_labelling;

use crate::error::{Error, Result};

/// Stored value of a foreground pixel.
pub const FOREGROUND: u8 = 255;
/// Stored value of a background pixel.
pub const BACKGROUND: u8 = 0;

const OFFSETS_4: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
const OFFSETS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Which value of a source image marks foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Objects are white (255) on a black (0) background.
    #[default]
    BrightForeground,
    /// Objects are black (0) on a white (255) background.
    DarkForeground,
}

impl Polarity {
    /// The source value that marks a foreground pixel.
    #[must_use]
    pub fn foreground_value(self) -> u8 {
        match self {
            Polarity::BrightForeground => FOREGROUND,
            Polarity::DarkForeground => BACKGROUND,
        }
    }

    /// The opposite convention.
    #[must_use]
    pub fn inverted(self) -> Self {
        match self {
            Polarity::BrightForeground => Polarity::DarkForeground,
            Polarity::DarkForeground => Polarity::BrightForeground,
        }
    }
}

/// Pixel adjacency used by labeling, erosion, flooding and flood fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge-sharing neighbors only.
    Four,
    /// Edge- and corner-sharing neighbors.
    #[default]
    Eight,
}

impl Connectivity {
    /// The adjacency under which background regions separate foreground
    /// regions of this connectivity.
    #[must_use]
    pub fn complement(self) -> Self {
        match self {
            Connectivity::Four => Connectivity::Eight,
            Connectivity::Eight => Connectivity::Four,
        }
    }

    /// The adjacency under which the watershed lines separating regions of
    /// this connectivity form connected seams.
    ///
    /// Lines between 8-connected regions are 4-connected, which 8-adjacency
    /// also covers. Lines between 4-connected regions may run diagonally.
    #[must_use]
    pub fn seam(self) -> Self {
        match self {
            Connectivity::Four => self.complement(),
            Connectivity::Eight => Connectivity::Eight,
        }
    }

    pub(crate) fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Connectivity::Four => &OFFSETS_4,
            Connectivity::Eight => &OFFSETS_8,
        }
    }

    /// Erosion norm whose unit ball matches this neighborhood.
    pub(crate) fn norm(self) -> Norm {
        match self {
            Connectivity::Four => Norm::L1,
            Connectivity::Eight => Norm::LInf,
        }
    }

    pub(crate) fn labelling(self) -> region_labelling::Connectivity {
        match self {
            Connectivity::Four => region_labelling::Connectivity::Four,
            Connectivity::Eight => region_labelling::Connectivity::Eight,
        }
    }

    /// In-bounds neighbors of `(x, y)` on a `width` x `height` grid.
    pub(crate) fn neighbors(
        self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> impl Iterator<Item = (u32, u32)> {
        self.offsets().iter().filter_map(move |&(dx, dy)| {
            let nx = x.checked_add_signed(dx)?;
            let ny = y.checked_add_signed(dy)?;
            (nx < width && ny < height).then_some((nx, ny))
        })
    }
}

/// A two-valued image: every pixel is foreground or background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    image: GrayImage,
}

impl BinaryMask {
    /// An all-background mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    /// Build a mask from a predicate that says which pixels are foreground.
    pub fn from_fn(width: u32, height: u32, mut is_foreground: impl FnMut(u32, u32) -> bool) -> Self {
        let image = GrayImage::from_fn(width, height, |x, y| {
            Luma([if is_foreground(x, y) {
                FOREGROUND
            } else {
                BACKGROUND
            }])
        });
        Self { image }
    }

    /// Validate a grayscale image and normalize it to the internal convention.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyImage`] for a zero-sized image and
    /// [`Error::NotBinary`] for the first pixel that is neither 0 nor 255.
    pub fn from_gray(image: &GrayImage, polarity: Polarity) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage { width, height });
        }

        if let Some((x, y, px)) = image
            .enumerate_pixels()
            .find(|(_, _, px)| px[0] != FOREGROUND && px[0] != BACKGROUND)
        {
            return Err(Error::NotBinary { x, y, value: px[0] });
        }

        let fg = polarity.foreground_value();
        Ok(Self::from_fn(width, height, |x, y| {
            image.get_pixel(x, y)[0] == fg
        }))
    }

    /// Render the mask using the given source convention.
    #[must_use]
    pub fn to_gray(&self, polarity: Polarity) -> GrayImage {
        match polarity {
            Polarity::BrightForeground => self.image.clone(),
            Polarity::DarkForeground => {
                let mut out = self.image.clone();
                imageops::invert(&mut out);
                out
            }
        }
    }

    /// The underlying image in the internal convention.
    #[must_use]
    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)` in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Whether `(x, y)` is a foreground pixel. Out-of-bounds pixels are background.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.image.get_pixel(x, y)[0] == FOREGROUND
    }

    /// Set one pixel.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        let value = if foreground { FOREGROUND } else { BACKGROUND };
        self.image.put_pixel(x, y, Luma([value]));
    }

    /// Set every listed pixel to the given value.
    pub fn paint(&mut self, points: &[Point<u32>], foreground: bool) {
        for p in points {
            self.set(p.x, p.y, foreground);
        }
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.image.pixels().filter(|px| px[0] == FOREGROUND).count()
    }

    /// Whether the mask has no foreground pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.pixels().all(|px| px[0] == BACKGROUND)
    }

    /// Foreground pixels in raster order.
    pub fn points(&self) -> impl Iterator<Item = Point<u32>> + '_ {
        self.image
            .enumerate_pixels()
            .filter(|(_, _, px)| px[0] == FOREGROUND)
            .map(|(x, y, _)| Point::new(x, y))
    }

    /// Foreground where exactly one of the two masks is foreground.
    ///
    /// # Panics
    ///
    /// Panics if the masks differ in size.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a != b)
    }

    /// Foreground where both masks are foreground.
    ///
    /// # Panics
    ///
    /// Panics if the masks differ in size.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a && b)
    }

    fn combine(&self, other: &Self, op: impl Fn(bool, bool) -> bool) -> Self {
        assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "masks must share dimensions"
        );
        let (width, height) = self.dimensions();
        Self::from_fn(width, height, |x, y| op(self.get(x, y), other.get(x, y)))
    }

    /// Remove `k` layers of foreground adjacent to background.
    ///
    /// Pixels outside the image count as background, so every step strictly
    /// shrinks a non-empty mask.
    #[must_use]
    pub fn eroded(&self, connectivity: Connectivity, k: u8) -> Self {
        if k == 0 {
            return self.clone();
        }
        let (width, height) = self.dimensions();
        let mut padded = GrayImage::new(width + 2, height + 2);
        imageops::replace(&mut padded, &self.image, 1, 1);
        let eroded = morphology::erode(&padded, connectivity.norm(), k);
        Self {
            image: imageops::crop_imm(&eroded, 1, 1, width, height).to_image(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: u32, x0: u32, y0: u32, side: u32) -> BinaryMask {
        BinaryMask::from_fn(size, size, |x, y| {
            (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y)
        })
    }

    #[test]
    fn from_gray_rejects_intermediate_values() {
        let mut img = GrayImage::new(4, 4);
        img.put_pixel(2, 1, Luma([17]));
        match BinaryMask::from_gray(&img, Polarity::BrightForeground) {
            Err(Error::NotBinary { x, y, value }) => {
                assert_eq!((x, y, value), (2, 1, 17));
            }
            other => panic!("expected NotBinary, got {other:?}"),
        }
    }

    #[test]
    fn from_gray_rejects_empty_image() {
        let img = GrayImage::new(0, 5);
        assert!(matches!(
            BinaryMask::from_gray(&img, Polarity::BrightForeground),
            Err(Error::EmptyImage { .. })
        ));
    }

    #[test]
    fn dark_foreground_is_normalized_and_restored() {
        let mut img = GrayImage::from_pixel(3, 3, Luma([255]));
        img.put_pixel(1, 1, Luma([0]));

        let mask = BinaryMask::from_gray(&img, Polarity::DarkForeground).unwrap();
        assert_eq!(mask.count(), 1);
        assert!(mask.get(1, 1));
        assert_eq!(mask.to_gray(Polarity::DarkForeground), img);
    }

    #[test]
    fn xor_and_and_follow_truth_tables() {
        let a = BinaryMask::from_fn(2, 2, |x, _| x == 0);
        let b = BinaryMask::from_fn(2, 2, |_, y| y == 0);
        let xor = a.xor(&b);
        let and = a.and(&b);
        assert!(!xor.get(0, 0) && xor.get(1, 0) && xor.get(0, 1) && !xor.get(1, 1));
        assert!(and.get(0, 0) && and.count() == 1);
    }

    #[test]
    fn erosion_removes_one_layer_per_step() {
        let mask = square(20, 5, 5, 9);
        assert_eq!(mask.eroded(Connectivity::Eight, 1).count(), 7 * 7);
        assert_eq!(mask.eroded(Connectivity::Eight, 3).count(), 3 * 3);
        assert!(mask.eroded(Connectivity::Eight, 5).is_empty());
    }

    #[test]
    fn erosion_treats_image_border_as_background() {
        let full = BinaryMask::from_fn(6, 6, |_, _| true);
        assert_eq!(full.eroded(Connectivity::Four, 1).count(), 4 * 4);
    }

    #[test]
    fn seams_are_traced_with_eight_adjacency() {
        assert_eq!(Connectivity::Four.seam(), Connectivity::Eight);
        assert_eq!(Connectivity::Eight.seam(), Connectivity::Eight);
    }

    #[test]
    fn neighbors_are_clipped_to_the_grid() {
        let corner: Vec<_> = Connectivity::Eight.neighbors(0, 0, 3, 3).collect();
        assert_eq!(corner.len(), 3);
        let centre: Vec<_> = Connectivity::Four.neighbors(1, 1, 3, 3).collect();
        assert_eq!(centre.len(), 4);
    }
}
