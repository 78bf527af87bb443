use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::LevelFilter;

use irregular_watershed::{
    default_output_path, Connectivity, Polarity, ProcessOptions, ProcessResult, SeparationEngine,
    ShrinkStrategy,
};

#[derive(Parser)]
#[command(
    name = "irregular-watershed",
    about = "Watershed-separate binary masks without cutting irregular objects at false necks",
    version,
    after_help = "Simple usage: irregular-watershed <mask.png>  (writes mask_separated.png)\n\n\
                  A convexity threshold above 0 replaces the fixed erosion count with\n\
                  per-object shrinking until each object is convex enough."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input mask file or directory
    input: String,

    /// Output file or directory (default: {name}_separated.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Erosion cycle number (1-255)
    #[arg(short, long, default_value = "1")]
    erosions: u32,

    /// Convexity threshold (0.0-1.0); 0 uses the erosion cycle number
    #[arg(short, long, default_value = "0.0")]
    convexity: f64,

    /// Use 4-connectivity instead of 8-connectivity
    #[arg(long)]
    four_connected: bool,

    /// Objects are black on a white background
    #[arg(long)]
    dark_foreground: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let strategy = match ShrinkStrategy::from_params(cli.erosions, cli.convexity) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let opts = ProcessOptions {
        strategy,
        connectivity: if cli.four_connected {
            Connectivity::Four
        } else {
            Connectivity::Eight
        },
        polarity: if cli.dark_foreground {
            Polarity::DarkForeground
        } else {
            Polarity::BrightForeground
        },
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let engine = SeparationEngine::new();

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    if !opts.quiet {
        match opts.strategy {
            ShrinkStrategy::FixedIterations(k) => {
                eprintln!("Shrink mask: {k} erosion cycle(s)");
            }
            ShrinkStrategy::ConvexityDriven(t) => {
                eprintln!("Shrink mask: per object until convexity > {t:.2}");
            }
        }
        eprintln!();
    }

    let results = if input_path.is_dir() {
        let output_dir = if let Some(o) = &cli.output {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: irregular-watershed <input_dir> -o <output_dir>");
            process::exit(1);
        };
        engine.process_directory(input_path, &output_dir, &opts)
    } else {
        let output_path = match &cli.output {
            Some(o) => PathBuf::from(o),
            None => default_output_path(input_path),
        };
        vec![engine.process_file(input_path, &output_path, &opts)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;
    let mut healed = 0usize;

    for r in &results {
        print_result(r, &opts);
        if r.success {
            success_count += 1;
            healed += r.report.map_or(0, |rep| rep.artifact_seams);
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !opts.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}, Seams healed: {healed}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, opts: &ProcessOptions) {
    if opts.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.success {
        if !opts.quiet {
            eprintln!("[OK] {filename} ({})", result.message);
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if opts.verbose {
        if let Some(report) = &result.report {
            eprintln!(
                "  -> {} separator pixels, {} frozen regions",
                report.separator_pixels, report.frozen_regions
            );
        }
    }
}
