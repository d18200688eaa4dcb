//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

/// Print an error in the requested format and exit non-zero.
pub fn handle_error(error: anyhow::Error, json: bool) -> ! {
    if json {
        let payload = serde_json::json!({ "error": format!("{error:#}") });
        println!("{payload}");
    } else {
        eprintln!("{} {error:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
