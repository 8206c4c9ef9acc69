//! File loading: format detection (RON/JSON/TOML) and deserialization, plus
//! validated runtime configuration.

use std::path::{Path, PathBuf};

use circuitry_spatial::RuntimeConfig;
use serde::de::DeserializeOwned;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading data files.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A configuration value is out of range.
    #[error("invalid config value for {field}: {detail}")]
    InvalidConfig { field: &'static str, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` in the given format. `origin` names the source in
/// error messages.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    origin: &Path,
) -> Result<T, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: origin.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

// ===========================================================================
// Runtime configuration
// ===========================================================================

/// Reject configuration values the runtime would otherwise silently clamp.
pub fn validate_config(config: &RuntimeConfig) -> Result<(), DataLoadError> {
    if config.chunks.chunk_size <= 0 {
        return Err(DataLoadError::InvalidConfig {
            field: "chunks.chunk_size",
            detail: format!("must be positive, got {}", config.chunks.chunk_size),
        });
    }
    if config.circuit.timer_capacity == 0 {
        return Err(DataLoadError::InvalidConfig {
            field: "circuit.timer_capacity",
            detail: "must be at least 1".to_string(),
        });
    }
    if config.circuit.ticks_per_second == 0 {
        return Err(DataLoadError::InvalidConfig {
            field: "circuit.ticks_per_second",
            detail: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Load and validate a runtime configuration file. Missing fields take
/// their defaults.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, DataLoadError> {
    let config: RuntimeConfig = deserialize_file(path)?;
    validate_config(&config)?;
    tracing::debug!(
        path = %path.display(),
        chunk_size = config.chunks.chunk_size,
        timer_capacity = config.circuit.timer_capacity,
        "loaded runtime config"
    );
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
