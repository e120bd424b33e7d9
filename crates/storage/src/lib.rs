use directories::ProjectDirs;
use overlay_model::SessionSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local config directory")]
    NoConfigDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("config schema version {0} is newer than supported ({CONFIG_SCHEMA_VERSION})")]
    UnsupportedVersion(u32),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub rendered_width: f32,
    pub max_image_width: f32,
    pub max_source_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDefaults {
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageDefaults {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeDefaults {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeDefaults {
    pub width: f32,
    pub color: String,
}

/// User-tunable editor settings. Missing fields fall back to the built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub display: DisplayConfig,
    pub text: TextDefaults,
    pub image: ImageDefaults,
    pub shape: ShapeDefaults,
    pub stroke: StrokeDefaults,
}

impl From<&SessionSettings> for EditorConfig {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            display: DisplayConfig {
                rendered_width: settings.rendered_width,
                max_image_width: settings.max_image_width,
                max_source_bytes: settings.max_source_bytes,
            },
            text: TextDefaults {
                x: settings.text_x,
                y: settings.text_y,
                font_size: settings.text_font_size,
                color: settings.text_color.clone(),
            },
            image: ImageDefaults { x: settings.image_x, y: settings.image_y },
            shape: ShapeDefaults {
                x: settings.shape_x,
                y: settings.shape_y,
                width: settings.shape_width,
                height: settings.shape_height,
                fill: settings.shape_fill.clone(),
            },
            stroke: StrokeDefaults {
                width: settings.stroke_width,
                color: settings.stroke_color.clone(),
            },
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

macro_rules! section_default {
    ($section:ident, $field:ident) => {
        impl Default for $section {
            fn default() -> Self {
                EditorConfig::default().$field
            }
        }
    };
}

section_default!(DisplayConfig, display);
section_default!(TextDefaults, text);
section_default!(ImageDefaults, image);
section_default!(ShapeDefaults, shape);
section_default!(StrokeDefaults, stroke);

impl EditorConfig {
    pub fn to_session_settings(&self) -> SessionSettings {
        SessionSettings {
            rendered_width: self.display.rendered_width,
            max_image_width: self.display.max_image_width,
            max_source_bytes: self.display.max_source_bytes,
            text_x: self.text.x,
            text_y: self.text.y,
            text_font_size: self.text.font_size,
            text_color: self.text.color.clone(),
            image_x: self.image.x,
            image_y: self.image.y,
            shape_x: self.shape.x,
            shape_y: self.shape.y,
            shape_width: self.shape.width,
            shape_height: self.shape.height,
            shape_fill: self.shape.fill.clone(),
            stroke_width: self.stroke.width,
            stroke_color: self.stroke.color.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        let positive = [
            ("display.rendered_width", self.display.rendered_width),
            ("display.max_image_width", self.display.max_image_width),
            ("text.font_size", self.text.font_size),
            ("shape.width", self.shape.width),
            ("shape.height", self.shape.height),
            ("stroke.width", self.stroke.width),
        ];

        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(StorageError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if self.display.max_source_bytes == 0 {
            return Err(StorageError::Invalid("display.max_source_bytes must be non-zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u32,
    config: EditorConfig,
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PdfOverlay", "PdfOverlay")
            .ok_or(StorageError::NoConfigDirectory)?;

        Ok(Self { root: dirs.config_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Loads the stored config, or defaults when none has been saved yet.
    pub fn load_config(&self) -> Result<EditorConfig, StorageError> {
        let path = self.config_path();
        if !path.exists() {
            debug!(path = %path.display(), "no stored config, using defaults");
            return Ok(EditorConfig::default());
        }

        load_config_from(&path)
    }

    pub fn save_config(&self, config: &EditorConfig) -> Result<(), StorageError> {
        config.validate()?;
        fs::create_dir_all(&self.root)?;

        let envelope = ConfigEnvelope { version: CONFIG_SCHEMA_VERSION, config: config.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.config_path(), bytes)?;
        Ok(())
    }
}

/// Reads a config file from an explicit path.
///
/// A top-level `version` key marks the versioned envelope this crate writes;
/// anything else is read as a bare config.
pub fn load_config_from(path: &Path) -> Result<EditorConfig, StorageError> {
    let bytes = fs::read(path)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;

    let config = if value.get("version").is_some() {
        let envelope: ConfigEnvelope = serde_json::from_value(value)?;
        if envelope.version > CONFIG_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }
        envelope.config
    } else {
        serde_json::from_value(value)?
    };

    config.validate()?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let mut config = EditorConfig::default();
        config.display.rendered_width = 1024.0;
        config.shape.fill = "#ff0000".to_owned();

        store.save_config(&config).expect("save should succeed");
        let loaded = store.load_config().expect("load should succeed");

        assert_eq!(loaded, config);
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_config().expect("load should succeed");
        assert_eq!(loaded, EditorConfig::default());
    }

    #[test]
    fn defaults_match_session_defaults() {
        assert_eq!(EditorConfig::default().to_session_settings(), SessionSettings::default());
    }

    #[test]
    fn bare_partial_config_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("editor.json");
        fs::write(&path, r##"{ "text": { "font_size": 24 }, "stroke": { "color": "#ff00ff" } }"##)
            .expect("write should succeed");

        let config = load_config_from(&path).expect("load should succeed");

        assert_eq!(config.text.font_size, 24.0);
        assert_eq!(config.text.color, "#1a1ae6");
        assert_eq!(config.stroke.color, "#ff00ff");
        assert_eq!(config.display, DisplayConfig::default());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "version": 99, "config": {} }"#).expect("write should succeed");

        let err = load_config_from(&path).expect_err("future schema should fail");
        assert!(matches!(err, StorageError::UnsupportedVersion(99)));
    }

    #[test]
    fn malformed_envelope_is_an_error_not_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "version": 1, "config": { "text": { "font_size": "huge" } } }"#)
            .expect("write should succeed");

        let err = load_config_from(&path).expect_err("bad field type should fail");
        assert!(matches!(err, StorageError::Serde(_)));
    }

    #[test]
    fn envelope_without_config_uses_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "version": 1, "config": {} }"#).expect("write should succeed");

        assert_eq!(load_config_from(&path).expect("load should succeed"), EditorConfig::default());
    }

    #[test]
    fn non_positive_sizes_are_rejected() {
        let mut config = EditorConfig::default();
        config.display.rendered_width = 0.0;

        let err = config.validate().expect_err("zero width should fail");
        assert!(
            matches!(err, StorageError::Invalid(message) if message.contains("rendered_width"))
        );
    }
}
