//! Correction pipeline and file/batch drivers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use image::{DynamicImage, GrayImage, ImageFormat};
use log::{debug, info};

use crate::error::{Error, Result};
use crate::mask::{BinaryMask, Connectivity, Polarity};
use crate::region::{connected_components, ConvexityMeasure, HullPerimeterRatio};
use crate::seams::{classify_seams, heal};
use crate::shrink::{build_shrink_mask, ShrinkStrategy};
use crate::watershed::{EdmWatershed, Watershed};

/// Options controlling a correction run.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// How the shrink mask is built.
    pub strategy: ShrinkStrategy,
    /// Pixel adjacency used throughout the pipeline.
    pub connectivity: Connectivity,
    /// Which source value marks foreground.
    pub polarity: Polarity,
    /// Enable verbose logging.
    pub verbose: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

impl ProcessOptions {
    /// Check the numeric parameters before any pixel is touched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCycles`] or [`Error::InvalidThreshold`].
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()
    }
}

/// What a correction run found and changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionReport {
    /// Pixels removed by the watershed.
    pub separator_pixels: usize,
    /// Connected seams introduced by the watershed.
    pub seams: usize,
    /// Seams classified as artifacts and healed.
    pub artifact_seams: usize,
    /// Components frozen by the convexity-driven strategy.
    pub frozen_regions: usize,
}

/// A corrected mask and its report.
#[derive(Debug, Clone)]
pub struct Correction {
    /// The watershed-split mask with artifact seams healed.
    pub mask: BinaryMask,
    /// Counts describing the run.
    pub report: CorrectionReport,
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Counts from the correction, when it ran.
    pub report: Option<CorrectionReport>,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn failed(path: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            report: None,
            message,
        }
    }
}

/// The separation engine holding the watershed and convexity collaborators.
///
/// Create once with [`SeparationEngine::new()`] and reuse for many masks; the
/// engine keeps no state between runs.
#[derive(Debug, Clone, Default)]
pub struct SeparationEngine<W = EdmWatershed, C = HullPerimeterRatio> {
    watershed: W,
    convexity: C,
}

impl SeparationEngine {
    /// An engine using [`EdmWatershed`] and [`HullPerimeterRatio`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<W, C> SeparationEngine<W, C>
where
    W: Watershed,
    C: ConvexityMeasure,
{
    /// An engine using the given collaborators.
    pub fn with_collaborators(watershed: W, convexity: C) -> Self {
        Self {
            watershed,
            convexity,
        }
    }

    /// Run the correction pipeline on a normalized mask.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid options, the watershed's error
    /// if it fails, and [`Error::DimensionMismatch`] if it returns a mask of
    /// the wrong size. No partially corrected mask is ever returned.
    pub fn correct(&self, original: &BinaryMask, opts: &ProcessOptions) -> Result<Correction> {
        opts.validate()?;
        let connectivity = opts.connectivity;

        let shrink = build_shrink_mask(original, opts.strategy, connectivity, &self.convexity);
        let split = self.watershed.split(original, connectivity)?;
        if split.dimensions() != original.dimensions() {
            return Err(Error::DimensionMismatch {
                expected: original.dimensions(),
                found: split.dimensions(),
            });
        }

        let seams = classify_seams(original, &split, &shrink.mask, connectivity);
        let report = CorrectionReport {
            separator_pixels: seams.separators.count(),
            seams: connected_components(&seams.separators, connectivity.seam()).len(),
            artifact_seams: seams.seeds.len(),
            frozen_regions: shrink.frozen.len(),
        };
        let mask = heal(split, &seams.separators, &seams.seeds, connectivity);

        debug!(
            "correct: {} of {} seams healed",
            report.artifact_seams, report.seams
        );
        Ok(Correction { mask, report })
    }

    /// Validate and normalize a grayscale mask, correct it, and render the
    /// result in the same polarity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBinary`] or [`Error::EmptyImage`] for an invalid
    /// mask, plus every error of [`SeparationEngine::correct`].
    pub fn correct_image(
        &self,
        image: &GrayImage,
        opts: &ProcessOptions,
    ) -> Result<(GrayImage, CorrectionReport)> {
        opts.validate()?;
        let mask = BinaryMask::from_gray(image, opts.polarity)?;
        let correction = self.correct(&mask, opts)?;
        Ok((correction.mask.to_gray(opts.polarity), correction.report))
    }

    /// Correct every slice of a stack in order.
    ///
    /// Slices are independent: a failed slice yields an `Err` entry and the
    /// next slice still runs. `cancel` is checked before each slice, so a
    /// cancelled run returns fewer entries than there are slices.
    pub fn correct_stack(
        &self,
        slices: &[GrayImage],
        opts: &ProcessOptions,
        cancel: &AtomicBool,
    ) -> Vec<Result<(GrayImage, CorrectionReport)>> {
        let mut results = Vec::with_capacity(slices.len());
        for (index, slice) in slices.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                info!("stack: cancelled before slice {}/{}", index + 1, slices.len());
                break;
            }
            debug!("stack: slice {}/{}", index + 1, slices.len());
            results.push(self.correct_image(slice, opts));
        }
        results
    }

    /// Process a single mask file: load, correct, save.
    ///
    /// Returns a [`ProcessResult`] indicating success or failure.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path, opts: &ProcessOptions) -> ProcessResult {
        let gray = match image::open(input) {
            Ok(img) => img.to_luma8(),
            Err(e) => return ProcessResult::failed(input, format!("Failed to load: {e}")),
        };

        let (corrected, report) = match self.correct_image(&gray, opts) {
            Ok(out) => out,
            Err(e) => return ProcessResult::failed(input, e.to_string()),
        };

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ProcessResult::failed(
                        input,
                        format!("Failed to create output directory: {e}"),
                    );
                }
            }
        }

        match save_image(&corrected, output) {
            Ok(()) => ProcessResult {
                path: input.to_path_buf(),
                success: true,
                report: Some(report),
                message: format!(
                    "{} of {} seams healed",
                    report.artifact_seams, report.seams
                ),
            },
            Err(e) => ProcessResult::failed(input, format!("Failed to save: {e}")),
        }
    }

    /// Process all supported masks in a directory, treating each file as an
    /// independent slice.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    /// Returns a [`ProcessResult`] for each mask found.
    #[must_use]
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        opts: &ProcessOptions,
    ) -> Vec<ProcessResult>
    where
        W: Sync,
        C: Sync,
    {
        let mut entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failed(
                    input_dir,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };
        entries.sort();

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult::failed(
                    output_dir,
                    format!("Failed to create output directory: {e}"),
                )];
            }
        }

        let process = |input_path: &PathBuf| match input_path.file_name() {
            Some(name) => self.process_file(input_path, &output_dir.join(name), opts),
            None => ProcessResult::failed(input_path, "Path has no file name".to_string()),
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(process).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            entries.iter().map(process).collect()
        }
    }
}

/// Check if a file has a supported (lossless) mask extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "png" | "bmp" | "tif" | "tiff"
        ),
        None => false,
    }
}

/// Save a mask losslessly in the format implied by the path's extension.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for unknown or lossy formats, or an
/// error if writing fails.
pub fn save_image(img: &GrayImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Png | ImageFormat::Bmp | ImageFormat::Tiff => {
            DynamicImage::ImageLuma8(img.clone()).save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"cells.png"` becomes `"cells_separated.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_separated.{ext}"))
}
