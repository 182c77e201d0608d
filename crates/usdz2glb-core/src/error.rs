use std::io;
use thiserror::Error;

/// Errors that can occur while driving a Blender conversion
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Blender is not installed at the configured path
    #[error("Blender not found at {0}. Install Blender: <https://www.blender.org/download/>")]
    BlenderNotFound(String),

    /// The source model file does not exist
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    /// Draco compression level must be within the glTF exporter's 0-10 range
    #[error("Draco compression level {0} out of range (expected 0-10)")]
    DracoLevelOutOfRange(u8),

    /// Blender ran but produced no usable output file
    #[error("Conversion failed: {detail}\n--- Blender log (tail) ---\n{log_tail}")]
    ConversionFailed {
        /// Short description of what went wrong
        detail: String,
        /// Last portion of Blender's combined stdout/stderr
        log_tail: String,
    },

    /// Blender did not finish within the configured wall-clock budget
    #[error("Blender timed out after {0} seconds")]
    TimedOut(u64),

    /// Failed to create or persist the temporary control script
    #[error("Temporary script error: {0}")]
    TempFile(String),

    /// I/O error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A specialized Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;
