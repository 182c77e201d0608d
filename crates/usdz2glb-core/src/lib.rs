//! USDZ → GLB conversion by driving Blender in headless batch mode.
//!
//! This crate does not touch the model data itself. It writes a small Python
//! control script to a temporary file, runs
//! `blender --background --python <script> -- <input> <output>`, and then
//! judges success by whether the expected output file appeared. Geometry
//! import, Draco mesh compression, and material export all happen inside
//! Blender.
//!
//! ## System Requirements
//!
//! - **Blender** with USD import support (4.x), expected at the stock macOS
//!   install path unless overridden via [`ConvertOptions::blender_path`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use usdz2glb_core::{convert, ConvertOptions};
//!
//! let report = convert("model.usdz", "model.glb", &ConvertOptions::default())?;
//! println!("{} bytes written", report.size_bytes);
//! # Ok::<(), usdz2glb_core::ConvertError>(())
//! ```

/// Blender process spawning and supervision
pub mod blender;
/// Error types for conversion operations
pub mod error;
/// Generation of the injected Python control script
pub mod script;

pub use blender::{check_blender_available, BlenderRun, DEFAULT_BLENDER_PATH};
pub use error::{ConvertError, Result};
pub use script::{generate_script, ExportSettings, MaterialMode, SUCCESS_SENTINEL};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lines of Blender log kept in failure errors
const LOG_TAIL_LINES: usize = 20;

/// Options controlling a conversion run
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Path to the Blender binary
    pub blender_path: PathBuf,
    /// Wall-clock budget for the Blender process
    pub timeout: Duration,
    /// Leave the generated control script on disk for inspection
    pub keep_script: bool,
    /// glTF exporter settings
    pub export: ExportSettings,
}

impl Default for ConvertOptions {
    #[inline]
    fn default() -> Self {
        Self {
            blender_path: PathBuf::from(DEFAULT_BLENDER_PATH),
            timeout: Duration::from_secs(120),
            keep_script: false,
            export: ExportSettings::default(),
        }
    }
}

/// Outcome of a successful conversion
#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// Path of the written GLB file
    pub output_path: PathBuf,
    /// Size of the written GLB file in bytes
    pub size_bytes: u64,
    /// Version line reported by `blender --version`
    pub blender_version: String,
    /// Wall-clock duration of the Blender run
    pub elapsed: Duration,
}

/// Convert a USDZ file to GLB
///
/// Validates the input, writes the control script to a temporary file,
/// runs Blender in batch mode, and checks that the output file was written.
///
/// # Errors
///
/// Returns errors if:
/// - The input file does not exist (`ConvertError::InputNotFound`)
/// - The export settings are invalid (`ConvertError::DracoLevelOutOfRange`)
/// - Blender is missing (`ConvertError::BlenderNotFound`)
/// - Blender times out (`ConvertError::TimedOut`)
/// - No output file appears, or it is empty (`ConvertError::ConversionFailed`)
#[must_use = "this function returns a conversion report that should be checked"]
pub fn convert<P: AsRef<Path>>(
    input: P,
    output: P,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(ConvertError::InputNotFound(input.display().to_string()));
    }

    let script = generate_script(&options.export)?;
    let blender_version = check_blender_available(&options.blender_path)?;
    debug!(%blender_version, "Blender available");

    // Persist the script up front when asked to keep it, so it survives
    // failed runs too (that is when inspecting it matters).
    let script_file = write_script(&script)?;
    let (script_path, _cleanup) = if options.keep_script {
        let (file, path) = script_file
            .keep()
            .map_err(|e| ConvertError::TempFile(e.to_string()))?;
        drop(file);
        info!(script = %path.display(), "control script kept");
        (path, None)
    } else {
        (script_file.path().to_path_buf(), Some(script_file))
    };

    info!(
        input = %input.display(),
        output = %output.display(),
        "converting USDZ to GLB"
    );

    let run = blender::run_batch(
        &options.blender_path,
        &script_path,
        input,
        output,
        options.timeout,
    )?;

    evaluate_run(output, &run, blender_version)
}

/// Write the control script to a temporary `.py` file
fn write_script(script: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("usdz2glb_")
        .suffix(".py")
        .tempfile()
        .map_err(|e| ConvertError::TempFile(e.to_string()))?;
    file.write_all(script.as_bytes())
        .map_err(|e| ConvertError::TempFile(e.to_string()))?;
    file.flush()
        .map_err(|e| ConvertError::TempFile(e.to_string()))?;
    Ok(file)
}

/// Judge a finished Blender run against the expected output file
///
/// Existence of a non-empty output file wins: Blender sometimes exits
/// nonzero after a successful export (addon warnings on shutdown), and the
/// file on disk is the ground truth either way.
fn evaluate_run(output: &Path, run: &BlenderRun, blender_version: String) -> Result<ConversionReport> {
    if output.exists() {
        let size_bytes = std::fs::metadata(output)?.len();
        if size_bytes == 0 {
            return Err(ConvertError::ConversionFailed {
                detail: format!("output file {} is empty", output.display()),
                log_tail: run.log_tail(LOG_TAIL_LINES),
            });
        }
        if !run.status.success() {
            warn!(code = ?run.status.code(), "Blender exited nonzero but output exists");
        }
        return Ok(ConversionReport {
            output_path: output.to_path_buf(),
            size_bytes,
            blender_version,
            elapsed: run.elapsed,
        });
    }

    let detail = if run.status.success() && run.log.contains(SUCCESS_SENTINEL) {
        format!(
            "Blender reported success but no output file at {}",
            output.display()
        )
    } else {
        format!(
            "Blender exited with {:?} and no output file was written",
            run.status.code()
        )
    };
    Err(ConvertError::ConversionFailed {
        detail,
        log_tail: run.log_tail(LOG_TAIL_LINES),
    })
}
