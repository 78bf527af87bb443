//! Correct the watershed split of a single binary mask.
//!
//! Usage:
//! ```sh
//! cargo run --example correct_mask -- input.png output.png [erosions]
//! ```

use std::env;
use std::process;

use irregular_watershed::{ProcessOptions, SeparationEngine, ShrinkStrategy};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output> [erosions]", args[0]);
        process::exit(1);
    }

    let input = &args[1];
    let output = &args[2];
    let erosions = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(1);

    let strategy = ShrinkStrategy::from_params(erosions, 0.0).expect("invalid erosion count");
    let opts = ProcessOptions {
        strategy,
        ..ProcessOptions::default()
    };

    let engine = SeparationEngine::new();
    let result = engine.process_file(input.as_ref(), output.as_ref(), &opts);

    if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
