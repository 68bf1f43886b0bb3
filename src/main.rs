//! aab_converter - batch converter for Android package formats.
//!
//! Runs one conversion mode over a file or directory and exits with the
//! batch status code.

use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match aab_converter::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
