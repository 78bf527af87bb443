//! Heal watershed over-segmentation of irregularly shaped binary objects.
//!
//! A distance-transform watershed separates touching objects at narrow
//! necks, but it also cuts single objects at "waists" created by boundary
//! indentations. This crate keeps the genuine cuts and removes the spurious
//! ones: a separator line that crosses the object's shrunken core (material
//! that survives progressive erosion) is painted back as foreground.
//!
//! # Quick Start
//!
//! ```no_run
//! use irregular_watershed::{ProcessOptions, SeparationEngine};
//!
//! let engine = SeparationEngine::new();
//! let mask = image::open("cells.png").unwrap().to_luma8();
//! let (corrected, report) = engine
//!     .correct_image(&mask, &ProcessOptions::default())
//!     .expect("mask must be binary");
//! println!("healed {} of {} seams", report.artifact_seams, report.seams);
//! corrected.save("cells_separated.png").unwrap();
//! ```
//!
//! # Shrink strategies
//!
//! The core is built either by a fixed number of erosions, or per object by
//! eroding until the object's convexity exceeds a threshold, which shrinks
//! objects of different size by proportional amounts.
//!
//! ```no_run
//! use irregular_watershed::{ProcessOptions, ShrinkStrategy};
//!
//! let opts = ProcessOptions {
//!     strategy: ShrinkStrategy::from_params(1, 0.9).unwrap(),
//!     ..ProcessOptions::default()
//! };
//! # let _ = opts;
//! ```

#![deny(missing_docs)]

mod engine;
pub mod error;
pub mod mask;
pub mod region;
pub mod seams;
pub mod shrink;
pub mod watershed;

pub use engine::{
    default_output_path, is_supported_image, save_image, Correction, CorrectionReport,
    ProcessOptions, ProcessResult, SeparationEngine,
};
pub use error::{Error, Result};
pub use imageproc::point::Point;
pub use mask::{BinaryMask, Connectivity, Polarity};
pub use region::{ConvexityMeasure, HullAreaRatio, HullPerimeterRatio};
pub use seams::{classify_seams, heal, SeamClassification};
pub use shrink::{build_shrink_mask, FrozenRegion, ShrinkMask, ShrinkStrategy};
pub use watershed::{EdmWatershed, Watershed};
