//! Error display for the CLI.

use bluegreen_core::Error;
use colored::Colorize;

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let Some(core_err) = err.chain().find_map(|cause| cause.downcast_ref::<Error>()) else {
        return;
    };

    let hint = match core_err {
        Error::Network(_) => Some("Check your network connection and --target."),
        Error::UnexpectedStatus { status: 401, .. } => {
            Some("The API rejected the token. Check --token or BLUEGREEN_TOKEN.")
        }
        Error::UnexpectedStatus { status: 404, .. } => {
            Some("The application does not exist on this target.")
        }
        Error::Config(_) => Some("Check the deployment file passed with --config."),
        _ => None,
    };

    if let Some(hint) = hint {
        eprintln!("\n{}", format!("Hint: {}", hint).yellow());
    }
}
