//! Generation of the Python control script injected into Blender.
//!
//! Blender's batch mode (`--background --python <script> -- <args>`) runs an
//! arbitrary Python script with access to the `bpy` API. The script rendered
//! here clears the scene, imports the USD file named by the first positional
//! argument after `--`, and exports it as GLB to the second.

use crate::error::{ConvertError, Result};
use std::fmt::Write;

/// Printed by the control script once the glTF exporter returns. Checked in
/// Blender's output as a fallback success signal when the exit code lies.
pub const SUCCESS_SENTINEL: &str = "CONVERT_SUCCESS";

/// How the glTF exporter should handle materials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterialMode {
    /// Export full materials (`EXPORT`)
    #[default]
    Export,
    /// Write placeholder material slots only (`PLACEHOLDER`)
    Placeholder,
    /// Strip materials entirely (`NONE`)
    None,
}

impl MaterialMode {
    /// The enum token expected by `bpy.ops.export_scene.gltf`
    #[must_use]
    pub const fn as_bpy_token(self) -> &'static str {
        match self {
            Self::Export => "EXPORT",
            Self::Placeholder => "PLACEHOLDER",
            Self::None => "NONE",
        }
    }
}

/// Settings passed through to the glTF exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportSettings {
    /// Enable Draco mesh compression
    pub draco_compression: bool,
    /// Draco compression level, 0 (fastest) to 10 (smallest)
    pub draco_level: u8,
    /// Material export mode
    pub materials: MaterialMode,
}

impl Default for ExportSettings {
    #[inline]
    fn default() -> Self {
        Self {
            draco_compression: true,
            draco_level: 6,
            materials: MaterialMode::Export,
        }
    }
}

impl ExportSettings {
    /// Validate settings before a script is generated from them
    ///
    /// # Errors
    ///
    /// Returns `ConvertError::DracoLevelOutOfRange` if the Draco level is
    /// above 10 (the glTF exporter rejects anything outside 0-10).
    pub fn validate(&self) -> Result<()> {
        if self.draco_level > 10 {
            return Err(ConvertError::DracoLevelOutOfRange(self.draco_level));
        }
        Ok(())
    }
}

/// Render the Blender control script for the given export settings
///
/// The script takes the input and output paths from `sys.argv` after the
/// `--` separator, so the generated text is independent of the files being
/// converted and never embeds user-supplied paths.
///
/// # Errors
///
/// Returns `ConvertError::DracoLevelOutOfRange` for invalid settings.
pub fn generate_script(settings: &ExportSettings) -> Result<String> {
    settings.validate()?;

    let mut script = String::new();
    script.push_str(
        "import bpy\n\
         import sys\n\
         \n\
         argv = sys.argv\n\
         argv = argv[argv.index(\"--\") + 1:]\n\
         input_file = argv[0]\n\
         output_file = argv[1]\n\
         \n\
         bpy.ops.wm.read_factory_settings(use_empty=True)\n\
         \n\
         bpy.ops.wm.usd_import(filepath=input_file)\n\
         \n\
         bpy.ops.export_scene.gltf(\n\
         \x20   filepath=output_file,\n\
         \x20   export_format='GLB',\n",
    );
    let _ = writeln!(
        script,
        "    export_draco_mesh_compression_enable={},",
        if settings.draco_compression {
            "True"
        } else {
            "False"
        }
    );
    if settings.draco_compression {
        let _ = writeln!(
            script,
            "    export_draco_mesh_compression_level={},",
            settings.draco_level
        );
    }
    let _ = writeln!(
        script,
        "    export_materials='{}'\n)",
        settings.materials.as_bpy_token()
    );
    let _ = writeln!(script, "\nprint(f\"{SUCCESS_SENTINEL}: {{output_file}}\")");

    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ExportSettings::default();
        assert!(settings.draco_compression);
        assert_eq!(settings.draco_level, 6);
        assert_eq!(settings.materials, MaterialMode::Export);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_draco_level_out_of_range() {
        let settings = ExportSettings {
            draco_level: 11,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, ConvertError::DracoLevelOutOfRange(11)));
        assert!(generate_script(&settings).is_err());
    }

    #[test]
    fn test_script_default() {
        let script = generate_script(&ExportSettings::default()).unwrap();

        assert!(script.contains("import bpy"));
        assert!(script.contains("bpy.ops.wm.read_factory_settings(use_empty=True)"));
        assert!(script.contains("bpy.ops.wm.usd_import(filepath=input_file)"));
        assert!(script.contains("export_format='GLB'"));
        assert!(script.contains("export_draco_mesh_compression_enable=True"));
        assert!(script.contains("export_draco_mesh_compression_level=6"));
        assert!(script.contains("export_materials='EXPORT'"));
        assert!(script.contains(SUCCESS_SENTINEL));
    }

    #[test]
    fn test_script_no_draco() {
        let script = generate_script(&ExportSettings {
            draco_compression: false,
            ..Default::default()
        })
        .unwrap();

        assert!(script.contains("export_draco_mesh_compression_enable=False"));
        // Level is meaningless with compression off and must not be emitted
        assert!(!script.contains("export_draco_mesh_compression_level"));
    }

    #[test]
    fn test_script_draco_levels() {
        for level in 0..=10 {
            let script = generate_script(&ExportSettings {
                draco_level: level,
                ..Default::default()
            })
            .unwrap();
            assert!(script.contains(&format!("export_draco_mesh_compression_level={level}")));
        }
    }

    #[test]
    fn test_script_material_modes() {
        for (mode, token) in [
            (MaterialMode::Export, "EXPORT"),
            (MaterialMode::Placeholder, "PLACEHOLDER"),
            (MaterialMode::None, "NONE"),
        ] {
            let script = generate_script(&ExportSettings {
                materials: mode,
                ..Default::default()
            })
            .unwrap();
            assert!(script.contains(&format!("export_materials='{token}'")));
        }
    }

    #[test]
    fn test_script_reads_paths_from_argv() {
        let script = generate_script(&ExportSettings::default()).unwrap();

        // Paths come from argv after "--"; no user path is baked into the text
        assert!(script.contains("argv[argv.index(\"--\") + 1:]"));
        assert!(script.contains("input_file = argv[0]"));
        assert!(script.contains("output_file = argv[1]"));
    }

    #[test]
    fn test_script_is_valid_python_shape() {
        let script = generate_script(&ExportSettings::default()).unwrap();

        // Balanced parens on the exporter call
        let opens = script.matches('(').count();
        let closes = script.matches(')').count();
        assert_eq!(opens, closes);
    }
}
