use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process-wide encoding configuration, resolved once at startup and passed
/// down explicitly. A JSON file can override any field; missing fields keep
/// their defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EncodingOptions {
    /// ffmpeg binary, a bare name resolved via PATH or an absolute path.
    pub ffmpeg_path: String,
    /// Source extensions picked up when walking a directory, lowercase,
    /// without the dot.
    pub extensions: Vec<String>,
    pub default_bitrate_kbps: u32,
    pub min_bitrate_kbps: u32,
    pub max_bitrate_kbps: u32,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            extensions: ["flac", "ape", "m4a", "oga", "wav", "wv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_bitrate_kbps: 192,
            min_bitrate_kbps: 65,
            max_bitrate_kbps: 640,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bitrate '{0}', expected a value like '192k'")]
    InvalidBitrateFormat(String),
    #[error("bitrate {value}k outside the allowed range {min}k-{max}k")]
    BitrateOutOfRange { value: u32, min: u32, max: u32 },
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

impl EncodingOptions {
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                        path: path.to_string(),
                        source,
                    })?;
                serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_string(),
                    source,
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Validate a user-supplied bitrate like `192k` against the configured
    /// range and return the numeric kbps value.
    pub fn parse_bitrate(&self, value: &str) -> Result<u32, ConfigError> {
        let re = Regex::new(r"^(\d+)k$").expect("bitrate regex is valid");
        let caps = re
            .captures(value)
            .ok_or_else(|| ConfigError::InvalidBitrateFormat(value.to_string()))?;
        let kbps: u32 = caps[1]
            .parse()
            .map_err(|_| ConfigError::InvalidBitrateFormat(value.to_string()))?;
        if kbps < self.min_bitrate_kbps || kbps > self.max_bitrate_kbps {
            return Err(ConfigError::BitrateOutOfRange {
                value: kbps,
                min: self.min_bitrate_kbps,
                max: self.max_bitrate_kbps,
            });
        }
        Ok(kbps)
    }

    pub fn recognizes_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }
}
