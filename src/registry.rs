//! Cache Namespace Registry
//!
//! Maps (role, version) to the identifier a store backend opens. The
//! three identifiers produced for the configured version tag form the
//! current cache generation; activation deletes every namespace outside
//! that set.

use std::fmt;

/// Role a namespace plays within a cache generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheRole {
    /// Application shell: documents, scripts, stylesheets
    Shell,
    /// Standard street-map tiles
    Tile,
    /// Satellite imagery tiles
    Satellite,
}

impl CacheRole {
    /// All roles, in the order install/activate walk them
    pub const ALL: [CacheRole; 3] = [CacheRole::Shell, CacheRole::Tile, CacheRole::Satellite];

    /// Identifier prefix for this role
    pub fn prefix(&self) -> &'static str {
        match self {
            CacheRole::Shell => "app",
            CacheRole::Tile => "tiles",
            CacheRole::Satellite => "satellite",
        }
    }
}

impl fmt::Display for CacheRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Produces namespace identifiers for one cache generation
#[derive(Debug, Clone)]
pub struct NamespaceRegistry {
    version: String,
}

impl NamespaceRegistry {
    /// Create a registry for the given version tag
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    /// Get the version tag
    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Identifier of the namespace a role occupies in this generation
    pub fn namespace(&self, role: CacheRole) -> String {
        format!("{}-{}", role.prefix(), self.version)
    }

    /// The complete namespace set of this generation
    pub fn current_set(&self) -> Vec<String> {
        CacheRole::ALL.iter().map(|r| self.namespace(*r)).collect()
    }

    /// Whether an identifier belongs to this generation
    pub fn is_current(&self, namespace: &str) -> bool {
        CacheRole::ALL.iter().any(|r| self.namespace(*r) == namespace)
    }
}
