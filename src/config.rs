//! Worker Configuration
//!
//! All policy inputs are injected here at construction time: the version
//! tag that names the current cache generation, the shell-asset list, and
//! the per-namespace entry bounds. Nothing reads configuration from
//! global state.

use crate::error::{Error, Result};

/// Default entry bound for the standard tile namespace
pub const DEFAULT_TILE_BOUND: usize = 2000;

/// Default entry bound for the satellite namespace. Smaller because
/// satellite imagery payloads are larger.
pub const DEFAULT_SATELLITE_BOUND: usize = 800;

/// Default cache generation version tag
pub const DEFAULT_VERSION: &str = "v2";

/// Injected worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Version tag naming the current cache generation
    pub version: String,
    /// Shell assets installed up front; a request classifies as a shell
    /// asset only when its URL equals one of these entries
    pub shell_assets: Vec<String>,
    /// URL prefixes whose subresources also classify as shell assets
    /// (library directories with source maps, images and the like).
    /// Shell misses are fatal when the network is also down, so a bare
    /// origin root is rejected here; unlisted same-origin URLs take the
    /// fallback strategy and degrade quietly instead.
    pub shell_prefixes: Vec<String>,
    /// Cache key of the document served to navigations when the network
    /// is unreachable
    pub root_document: String,
    /// Entry bound for the standard tile namespace
    pub tile_bound: usize,
    /// Entry bound for the satellite tile namespace
    pub satellite_bound: usize,
}

impl WorkerConfig {
    /// Standard configuration for an application served from `origin`:
    /// the origin root and index document plus the map library assets.
    /// The origin root is an exact entry, so it covers the `/` URL
    /// itself without claiming everything under the origin; the library
    /// dist directory is a prefix so its subresources install-match too.
    pub fn for_origin(origin: &str, version: impl Into<String>) -> Self {
        let origin = origin.trim_end_matches('/');
        let root_document = format!("{origin}/index.html");
        Self {
            version: version.into(),
            shell_assets: vec![
                format!("{origin}/"),
                root_document.clone(),
                "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css".to_string(),
                "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js".to_string(),
            ],
            shell_prefixes: vec!["https://unpkg.com/leaflet@1.9.4/dist/".to_string()],
            root_document,
            tile_bound: DEFAULT_TILE_BOUND,
            satellite_bound: DEFAULT_SATELLITE_BOUND,
        }
    }

    /// Check the configuration is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::InvalidConfig("version tag must not be empty".to_string()));
        }
        if self.version.contains(char::is_whitespace) {
            return Err(Error::InvalidConfig(format!(
                "version tag must not contain whitespace: {:?}",
                self.version
            )));
        }
        if self.shell_assets.is_empty() {
            return Err(Error::InvalidConfig("shell asset list must not be empty".to_string()));
        }
        if !self.shell_assets.contains(&self.root_document) {
            return Err(Error::InvalidConfig(format!(
                "root document {} is not in the shell asset list",
                self.root_document
            )));
        }
        for prefix in &self.shell_prefixes {
            if Self::is_bare_origin(prefix) {
                return Err(Error::InvalidConfig(format!(
                    "shell prefix {prefix:?} covers an entire origin; list assets exactly instead"
                )));
            }
        }
        if self.tile_bound == 0 || self.satellite_bound == 0 {
            return Err(Error::InvalidConfig("entry bounds must be nonzero".to_string()));
        }
        Ok(())
    }

    /// True when the prefix has no path beyond the origin root, as in
    /// `https://maps.example/` or `https://maps.example`.
    fn is_bare_origin(prefix: &str) -> bool {
        match prefix.split_once("://") {
            Some((_, rest)) => !rest.trim_end_matches('/').contains('/'),
            None => false,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::for_origin("http://localhost:8000", DEFAULT_VERSION)
    }
}
