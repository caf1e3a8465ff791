//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use tilevault::catalog::CatalogError;
use tilevault::config::ConfigFileError;
use tilevault::download::{DownloadError, DownloadOutcome};
use tilevault::engine::EngineError;
use tilevault::provider::ProviderError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration file could not be loaded
    Config(ConfigFileError),
    /// Invalid command-line input
    InvalidArgs(String),
    /// Failed to open the tile engine
    Engine(EngineError),
    /// Download could not start
    Download(DownloadError),
    /// Download finished with missing tiles or was interrupted
    Incomplete {
        outcome: DownloadOutcome,
        failed: usize,
        unfinished: usize,
    },
    /// Map catalog operation failed
    Catalog(CatalogError),
    /// Interactive prompt failed
    Prompt(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Download(DownloadError::Provider(ProviderError::NotFound(_))) => {
                eprintln!();
                eprintln!("Run 'tilevault providers' to list available providers.");
            }
            CliError::Incomplete { .. } => {
                eprintln!();
                eprintln!("The map was saved. Run the same download again to fetch the missing tiles.");
            }
            _ => {}
        }

        let code = match self {
            CliError::InvalidArgs(_) => 2,
            CliError::Incomplete {
                outcome: DownloadOutcome::Cancelled,
                ..
            } => 130,
            _ => 1,
        };
        process::exit(code)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::InvalidArgs(msg) => write!(f, "{}", msg),
            CliError::Engine(e) => write!(f, "{}", e),
            CliError::Download(e) => write!(f, "Download failed: {}", e),
            CliError::Incomplete {
                outcome,
                failed,
                unfinished,
            } => write!(
                f,
                "Download {} ({} failed, {} not attempted)",
                outcome, failed, unfinished
            ),
            CliError::Catalog(e) => write!(f, "{}", e),
            CliError::Prompt(msg) => write!(f, "Prompt error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::Download(e) => Some(e),
            CliError::Catalog(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_message() {
        let err = CliError::Incomplete {
            outcome: DownloadOutcome::PartialFailure,
            failed: 3,
            unfinished: 0,
        };
        assert_eq!(
            err.to_string(),
            "Download completed with failures (3 failed, 0 not attempted)"
        );
    }

    #[test]
    fn test_catalog_error_passthrough() {
        let err: CliError = CatalogError::NotFound("Trail".to_string()).into();
        assert_eq!(err.to_string(), "Map not found: Trail");
    }
}
