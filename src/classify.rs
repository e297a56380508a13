//! Request Classification
//!
//! Pure mapping from an intercepted request to the class that selects its
//! fetch strategy. Rules live in an explicit precedence-ordered table and
//! the first matching rule wins; the table ends with a catch-all row, so
//! classification is total and never fails.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::fetch::FetchRequest;

/// Standard tile URL pattern: subdomains a-c of the OpenStreetMap tile
/// host, numeric zoom/x/y path segments, png payload. Anchored at the
/// scheme so a tile URL embedded in another URL's path does not match;
/// the suffix is left open so a query string after `.png` still does.
static OSM_TILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://[abc]\.tile\.openstreetmap\.org/\d+/\d+/\d+\.png")
        .expect("tile pattern compiles")
});

/// Satellite tile URL pattern: the ArcGIS World Imagery tile service
/// with numeric zoom/row/column segments.
static SATELLITE_TILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https://server\.arcgisonline\.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/\d+/\d+/\d+",
    )
    .expect("satellite pattern compiles")
});

/// Request classes, one per fetch strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// Top-level document load
    Navigation,
    /// Application shell asset
    ShellAsset,
    /// Standard street-map tile
    StandardTile,
    /// Satellite imagery tile
    SatelliteTile,
    /// Anything else
    Fallback,
}

impl RequestClass {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::Navigation => "navigation",
            RequestClass::ShellAsset => "shell_asset",
            RequestClass::StandardTile => "standard_tile",
            RequestClass::SatelliteTile => "satellite_tile",
            RequestClass::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one rule of the classification table matches a request
#[derive(Debug)]
enum Matcher {
    /// The request carries the navigation flag
    NavigationFlag,
    /// URL equals one of the listed entries
    Exact(Vec<String>),
    /// URL starts with one of the listed prefixes
    Prefix(Vec<String>),
    /// URL matches a compiled pattern
    Pattern(&'static Regex),
    /// Matches every request
    Always,
}

impl Matcher {
    fn matches(&self, request: &FetchRequest) -> bool {
        match self {
            Matcher::NavigationFlag => request.is_navigation(),
            Matcher::Exact(entries) => entries.iter().any(|entry| request.url() == entry),
            Matcher::Prefix(prefixes) => prefixes
                .iter()
                .any(|prefix| request.url().starts_with(prefix.as_str())),
            Matcher::Pattern(pattern) => pattern.is_match(request.url()),
            Matcher::Always => true,
        }
    }
}

/// Precedence-ordered classification table
#[derive(Debug)]
pub struct RequestClassifier {
    rules: Vec<(Matcher, RequestClass)>,
}

impl RequestClassifier {
    /// Build the standard table. Shell assets match exactly; shell
    /// prefixes cover subresources under a listed directory (a bare
    /// origin root never belongs in the prefix list, or every
    /// same-origin URL would classify as shell). Precedence: navigation
    /// flag, then shell assets, then the tile patterns, then the
    /// catch-all.
    pub fn new(shell_assets: Vec<String>, shell_prefixes: Vec<String>) -> Self {
        Self {
            rules: vec![
                (Matcher::NavigationFlag, RequestClass::Navigation),
                (Matcher::Exact(shell_assets), RequestClass::ShellAsset),
                (Matcher::Prefix(shell_prefixes), RequestClass::ShellAsset),
                (Matcher::Pattern(&OSM_TILE), RequestClass::StandardTile),
                (Matcher::Pattern(&SATELLITE_TILE), RequestClass::SatelliteTile),
                (Matcher::Always, RequestClass::Fallback),
            ],
        }
    }

    /// Classify a request. First matching rule wins.
    pub fn classify(&self, request: &FetchRequest) -> RequestClass {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matches(request))
            .map(|(_, class)| *class)
            .unwrap_or(RequestClass::Fallback)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RequestClassifier {
        RequestClassifier::new(
            vec![
                "https://maps.example/".to_string(),
                "https://maps.example/index.html".to_string(),
                "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css".to_string(),
                "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js".to_string(),
            ],
            vec!["https://unpkg.com/leaflet@1.9.4/dist/".to_string()],
        )
    }

    #[test]
    fn test_standard_tile_urls() {
        let c = classifier();
        for sub in ["a", "b", "c"] {
            let url = format!("https://{sub}.tile.openstreetmap.org/3/4/5.png");
            assert_eq!(
                c.classify(&FetchRequest::new(url)),
                RequestClass::StandardTile
            );
        }
    }

    #[test]
    fn test_unknown_subdomain_is_not_a_tile() {
        let c = classifier();
        assert_eq!(
            c.classify(&FetchRequest::new("https://d.tile.openstreetmap.org/3/4/5.png")),
            RequestClass::Fallback
        );
    }

    #[test]
    fn test_non_numeric_segments_are_not_a_tile() {
        let c = classifier();
        assert_eq!(
            c.classify(&FetchRequest::new(
                "https://a.tile.openstreetmap.org/z/x/y.png"
            )),
            RequestClass::Fallback
        );
    }

    #[test]
    fn test_query_string_after_png_still_matches() {
        let c = classifier();
        assert_eq!(
            c.classify(&FetchRequest::new(
                "https://a.tile.openstreetmap.org/3/4/5.png?apikey=abc"
            )),
            RequestClass::StandardTile
        );
    }

    #[test]
    fn test_embedded_tile_url_does_not_match() {
        let c = classifier();
        assert_eq!(
            c.classify(&FetchRequest::new(
                "https://evil.example/https://a.tile.openstreetmap.org/3/4/5.png"
            )),
            RequestClass::Fallback
        );
    }

    #[test]
    fn test_satellite_tile_url() {
        let c = classifier();
        assert_eq!(
            c.classify(&FetchRequest::new(
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/7/42/13"
            )),
            RequestClass::SatelliteTile
        );
    }

    #[test]
    fn test_shell_asset_exact_and_prefix() {
        let c = classifier();
        assert_eq!(
            c.classify(&FetchRequest::new(
                "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"
            )),
            RequestClass::ShellAsset
        );
        // The prefix list covers subresources under a listed directory
        assert_eq!(
            c.classify(&FetchRequest::new(
                "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js.map"
            )),
            RequestClass::ShellAsset
        );
    }

    #[test]
    fn test_unlisted_same_origin_url_is_not_a_shell_asset() {
        let c = classifier();
        // The origin root entry matches exactly; it does not pull
        // arbitrary same-origin URLs into the shell class
        assert_eq!(
            c.classify(&FetchRequest::new("https://maps.example/")),
            RequestClass::ShellAsset
        );
        assert_eq!(
            c.classify(&FetchRequest::new("https://maps.example/api/search?q=berlin")),
            RequestClass::Fallback
        );
        assert_eq!(
            c.classify(&FetchRequest::new("https://maps.example/favicon.ico")),
            RequestClass::Fallback
        );
    }

    #[test]
    fn test_navigation_flag_beats_every_url_rule() {
        let c = classifier();
        // Even a tile URL classifies as navigation when the flag is set
        assert_eq!(
            c.classify(&FetchRequest::navigation(
                "https://a.tile.openstreetmap.org/3/4/5.png"
            )),
            RequestClass::Navigation
        );
        assert_eq!(
            c.classify(&FetchRequest::navigation("https://maps.example/index.html")),
            RequestClass::Navigation
        );
    }

    #[test]
    fn test_shell_rule_beats_tile_patterns() {
        // An operator listing a tile server under the shell prefixes wins
        // over the tile rule by table order
        let c = RequestClassifier::new(
            Vec::new(),
            vec!["https://a.tile.openstreetmap.org/".to_string()],
        );
        assert_eq!(
            c.classify(&FetchRequest::new("https://a.tile.openstreetmap.org/3/4/5.png")),
            RequestClass::ShellAsset
        );
    }

    #[test]
    fn test_everything_else_falls_back() {
        let c = classifier();
        for url in [
            "https://api.example/v1/geocode?q=berlin",
            "http://maps.example/",  // scheme mismatch with the listed assets
            "https://a.tile.openstreetmap.org/3/4/5.jpeg",
        ] {
            assert_eq!(c.classify(&FetchRequest::new(url)), RequestClass::Fallback);
        }
    }

    #[test]
    fn test_class_labels_are_stable() {
        assert_eq!(RequestClass::Navigation.as_str(), "navigation");
        assert_eq!(RequestClass::StandardTile.to_string(), "standard_tile");
    }
}
