//! Configuration for the synthesis system.

use std::path::PathBuf;

/// Default size, in bytes, of the arena carved for one system when no
/// explicit size is supplied.
pub const DEFAULT_ARENA_SIZE: usize = 2 * 1024 * 1024;

/// Default frame period, in milliseconds, used by the cepstral smoother
/// when a voice's resource does not override it.
pub const DEFAULT_FRAME_PERIOD_MS: u32 = 4;

/// Configuration for a [`crate::engine::System`].
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Total size of the caller-supplied memory region.
    pub arena_size: usize,
    /// Directories searched for resource files named by voice definitions.
    pub resource_paths: Vec<PathBuf>,
    /// Voice name used by `new_engine` when none is given explicitly.
    pub default_voice: Option<String>,
    /// Override for the cepstral smoother's frame period, in milliseconds.
    pub frame_period_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            arena_size: DEFAULT_ARENA_SIZE,
            resource_paths: Vec::new(),
            default_voice: None,
            frame_period_ms: DEFAULT_FRAME_PERIOD_MS,
        }
    }
}

impl SystemConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arena_size(mut self, size: usize) -> Self {
        self.arena_size = size;
        self
    }

    pub fn with_resource_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.resource_paths.push(path.into());
        self
    }

    pub fn with_resource_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.resource_paths.extend(paths);
        self
    }

    pub fn with_default_voice(mut self, voice: impl Into<String>) -> Self {
        self.default_voice = Some(voice.into());
        self
    }

    pub fn with_frame_period_ms(mut self, ms: u32) -> Self {
        self.frame_period_ms = ms;
        self
    }

    /// Loads a config from JSON, for hosts that prefer a config file over
    /// building one in code.
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        let raw: RawConfig = serde_json::from_str(data)?;
        Ok(Self {
            arena_size: raw.arena_size.unwrap_or(DEFAULT_ARENA_SIZE),
            resource_paths: raw.resource_paths.unwrap_or_default(),
            default_voice: raw.default_voice,
            frame_period_ms: raw.frame_period_ms.unwrap_or(DEFAULT_FRAME_PERIOD_MS),
        })
    }
}

#[derive(serde::Deserialize)]
struct RawConfig {
    arena_size: Option<usize>,
    resource_paths: Option<Vec<PathBuf>>,
    default_voice: Option<String>,
    frame_period_ms: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chains() {
        let cfg = SystemConfig::new()
            .with_arena_size(4096)
            .with_default_voice("en-US")
            .with_frame_period_ms(8);
        assert_eq!(cfg.arena_size, 4096);
        assert_eq!(cfg.default_voice.as_deref(), Some("en-US"));
        assert_eq!(cfg.frame_period_ms, 8);
    }

    #[test]
    fn from_json_fills_defaults() {
        let cfg = SystemConfig::from_json(r#"{"default_voice": "en-US"}"#).unwrap();
        assert_eq!(cfg.arena_size, DEFAULT_ARENA_SIZE);
        assert_eq!(cfg.default_voice.as_deref(), Some("en-US"));
    }
}
