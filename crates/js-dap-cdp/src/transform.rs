//! Path and source-map translation: external collaborators the script
//! registry and breakpoint manager consume but never implement.
//!
//! Implementing real path remapping (workspace roots, webpack virtual
//! paths, `file://` normalization) and real source-map parsing is outside
//! this core's scope; these traits exist so the core has a stable interface
//! to call. The identity/no-op implementations here make the core runnable
//! standalone and in tests.

use std::future::Future;

/// Translates between a client-visible path and the target URL the runtime
/// reports in CDP. Pure and synchronous: no I/O crosses this boundary.
pub trait PathTransformer: Send + Sync {
    /// Client path (as sent in a DAP `Source`) → target URL as CDP would
    /// report it, or `None` if no target URL can be determined.
    fn to_target_url(&self, client_path: &str) -> Option<String>;

    /// Target URL (as CDP reports it) → client-visible path, or `None` if
    /// the target has no on-disk representation.
    fn to_client_path(&self, target_url: &str) -> Option<String>;
}

/// A resolved `(path, line, column)` triple in either source space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedLocation {
    pub path: String,
    pub line: i64,
    pub column: i64,
}

/// A source discovered inside a script's source map, with its first mapped
/// position in the generated script (used to compute blackbox ranges when
/// only some of a script's authored sources are skipped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoredSource {
    pub path: String,
    pub start_line: i64,
    pub start_column: i64,
}

/// Joins generated scripts with their source maps. Every method is a
/// suspension point: fetching and parsing a source map is I/O.
pub trait SourceMapTransformer: Send + Sync {
    /// Called once per `scriptParsed`; returns the authored sources the
    /// script's source map (if any) exposes.
    fn script_parsed(&self, script_id: &str, source_map_url: Option<&str>) -> impl Future<Output = Vec<AuthoredSource>> + Send;

    /// Generated location → authored location, if the script has a usable
    /// source map and the position maps to one.
    fn map_to_authored(
        &self,
        script_id: &str,
        line: i64,
        column: i64,
    ) -> impl Future<Output = Option<MappedLocation>> + Send;

    /// Authored location → generated location.
    fn map_to_generated(
        &self,
        authored_path: &str,
        line: i64,
        column: i64,
    ) -> impl Future<Output = Option<MappedLocation>> + Send;
}

/// Converts between the client's line/column indexing convention (declared
/// at `initialize` via `linesStartAt1`/`columnsStartAt1`) and CDP's
/// always-zero-based convention.
#[derive(Debug, Clone, Copy)]
pub struct LineColumnTransformer {
    lines_start_at1: bool,
    columns_start_at1: bool,
}

impl LineColumnTransformer {
    #[must_use]
    pub fn new(lines_start_at1: bool, columns_start_at1: bool) -> Self {
        Self { lines_start_at1, columns_start_at1 }
    }

    #[must_use]
    pub fn client_line_to_cdp(&self, line: i64) -> i64 {
        if self.lines_start_at1 { line - 1 } else { line }
    }

    #[must_use]
    pub fn cdp_line_to_client(&self, line: i64) -> i64 {
        if self.lines_start_at1 { line + 1 } else { line }
    }

    #[must_use]
    pub fn client_column_to_cdp(&self, column: i64) -> i64 {
        if self.columns_start_at1 { column - 1 } else { column }
    }

    #[must_use]
    pub fn cdp_column_to_client(&self, column: i64) -> i64 {
        if self.columns_start_at1 { column + 1 } else { column }
    }
}

impl Default for LineColumnTransformer {
    /// DAP's default when the client omits both flags is 1-based.
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// A pass-through [`PathTransformer`]: client paths and target URLs are
/// treated as the same string, after stripping a `file://` prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPathTransformer;

impl PathTransformer for IdentityPathTransformer {
    fn to_target_url(&self, client_path: &str) -> Option<String> {
        Some(format!("file://{}", client_path.trim_start_matches("file://")))
    }

    fn to_client_path(&self, target_url: &str) -> Option<String> {
        target_url.strip_prefix("file://").map(str::to_string)
    }
}

/// A [`SourceMapTransformer`] that reports no authored sources and never
/// maps positions, for runtimes or tests with source maps disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSourceMapTransformer;

impl SourceMapTransformer for NoSourceMapTransformer {
    async fn script_parsed(&self, _script_id: &str, _source_map_url: Option<&str>) -> Vec<AuthoredSource> {
        Vec::new()
    }

    async fn map_to_authored(&self, _script_id: &str, _line: i64, _column: i64) -> Option<MappedLocation> {
        None
    }

    async fn map_to_generated(&self, _authored_path: &str, _line: i64, _column: i64) -> Option<MappedLocation> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_path_transformer_normalizes_file_scheme() {
        let t = IdentityPathTransformer;
        assert_eq!(t.to_target_url("/a/b.js"), Some("file:///a/b.js".to_string()));
        assert_eq!(t.to_client_path("file:///a/b.js"), Some("/a/b.js".to_string()));
        assert_eq!(t.to_client_path("eval://3"), None);
    }

    #[test]
    fn line_column_transformer_defaults_to_one_based() {
        let t = LineColumnTransformer::default();
        assert_eq!(t.client_line_to_cdp(10), 9);
        assert_eq!(t.cdp_line_to_client(9), 10);
    }

    #[test]
    fn line_column_transformer_honors_zero_based_client() {
        let t = LineColumnTransformer::new(false, false);
        assert_eq!(t.client_line_to_cdp(9), 9);
        assert_eq!(t.cdp_column_to_client(4), 4);
    }

    #[tokio::test]
    async fn no_source_map_transformer_never_maps() {
        let t = NoSourceMapTransformer;
        assert!(t.script_parsed("1", None).await.is_empty());
        assert_eq!(t.map_to_authored("1", 0, 0).await, None);
    }
}
