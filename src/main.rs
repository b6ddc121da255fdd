//! Sly Compiler Binary

use slyc::cli::SlyCli;
use std::process;

fn main() {
    let mut cli = SlyCli::new();

    match cli.run() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Compilation failed: {}", e);
            process::exit(1);
        }
    }
}
