//! Skip-file (blackbox) management: pattern/override matching for whether a
//! source is stepped over, and the positional ranges pushed to CDP for
//! generated scripts with mixed authored skip state.

use js_dap_cdp::{CdpClient, ScriptPosition};
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The source is not part of the current stack; no-op.
    NotInStack,
    /// A generated script with its own authored sources can't be toggled
    /// directly; only its authored sources are.
    NotToggleable,
    Toggled { now_skipped: bool },
}

/// An authored-source interval inside one generated script, in source order,
/// used to compute positional blackbox ranges.
#[derive(Debug, Clone, Copy)]
pub struct AuthoredInterval {
    pub start_line: i64,
    pub start_column: i64,
    pub skipped: bool,
}

/// Two layers of skip state: a pattern list compiled from launch config, and
/// a per-source override map from `toggleSkipFileStatus`. The override
/// always wins.
pub struct SkipFileManager {
    base_patterns: Vec<Regex>,
    added_patterns: HashMap<String, Regex>,
    overrides: HashMap<String, bool>,
    warned_unsupported: bool,
}

impl SkipFileManager {
    #[must_use]
    pub fn new(skip_files: &[String], skip_file_reg_exps: &[String]) -> Self {
        let mut base_patterns = Vec::with_capacity(skip_files.len() + skip_file_reg_exps.len());
        for glob in skip_files {
            match Regex::new(&glob_to_regex(glob)) {
                Ok(re) => base_patterns.push(re),
                Err(err) => tracing::warn!(pattern = %glob, error = %err, "skipping malformed skipFiles glob"),
            }
        }
        for raw in skip_file_reg_exps {
            match Regex::new(raw) {
                Ok(re) => base_patterns.push(re),
                Err(err) => tracing::warn!(pattern = %raw, error = %err, "skipping malformed skipFileRegExp"),
            }
        }
        Self { base_patterns, added_patterns: HashMap::new(), overrides: HashMap::new(), warned_unsupported: false }
    }

    /// The override if present, else `true` if any compiled pattern matches,
    /// else `None` (unknown).
    #[must_use]
    pub fn should_skip_source(&self, path: &str) -> Option<bool> {
        if let Some(skipped) = self.overrides.get(path) {
            return Some(*skipped);
        }
        if self.base_patterns.iter().any(|re| re.is_match(path)) || self.added_patterns.values().any(|re| re.is_match(path)) {
            Some(true)
        } else {
            None
        }
    }

    /// Every pattern currently in force, as CDP expects them: base patterns
    /// from launch config followed by patterns added via toggling.
    #[must_use]
    pub fn cdp_patterns(&self) -> Vec<String> {
        self.base_patterns.iter().map(|re| re.as_str().to_string()).chain(self.added_patterns.values().map(|re| re.as_str().to_string())).collect()
    }

    /// Toggles `path`'s skip state. Only valid for a source currently on the
    /// stack that is not itself a generated script with authored sources.
    ///
    /// Enabling adds a dedicated single-path regex. Disabling removes that
    /// same regex. A path whose skip state comes from a broader base pattern
    /// (a `skipFiles` glob) is recorded in the override map instead, which
    /// `should_skip_source` checks first — `regex` has no lookaround, so a
    /// base glob can't be rewritten in place to exclude one path.
    pub fn toggle(&mut self, path: &str, in_current_stack: bool, is_generated_with_authored_sources: bool) -> ToggleOutcome {
        if !in_current_stack {
            tracing::info!(%path, "ignoring toggleSkipFileStatus for a source not on the current stack");
            return ToggleOutcome::NotInStack;
        }
        if is_generated_with_authored_sources {
            tracing::info!(%path, "ignoring toggleSkipFileStatus for a generated script with authored sources");
            return ToggleOutcome::NotToggleable;
        }

        let now_skipped = !self.should_skip_source(path).unwrap_or(false);
        self.overrides.insert(path.to_string(), now_skipped);

        if now_skipped {
            match Regex::new(&format!("^{}$", regex::escape(path))) {
                Ok(re) => {
                    self.added_patterns.insert(path.to_string(), re);
                }
                Err(err) => tracing::warn!(%path, error = %err, "failed to compile single-path blackbox pattern"),
            }
        } else {
            self.added_patterns.remove(path);
        }

        ToggleOutcome::Toggled { now_skipped }
    }

    /// Pushes the current pattern list to CDP. A rejection only means the
    /// runtime lacks blackbox support; swallow it with a one-time warning
    /// rather than failing the caller's request.
    pub async fn push_patterns(&mut self, cdp: &impl CdpClient) {
        if let Err(err) = cdp.set_blackbox_patterns(&self.cdp_patterns()).await {
            if !self.warned_unsupported {
                tracing::warn!(error = %err, "runtime does not support skipFiles");
                self.warned_unsupported = true;
            }
        }
    }

    /// Computes and pushes positional blackbox ranges for a generated script
    /// whose authored sources have mixed skip state. Clears previous ranges
    /// first; both calls tolerate CDP rejection.
    pub async fn push_blackboxed_ranges(&mut self, cdp: &impl CdpClient, script_id: &str, script_itself_skipped: bool, intervals: &[AuthoredInterval]) {
        let positions = compute_positional_ranges(script_itself_skipped, intervals);

        if let Err(err) = cdp.set_blackboxed_ranges(script_id, &[]).await {
            tracing::debug!(%script_id, error = %err, "clearing blackbox ranges rejected");
        }
        if let Err(err) = cdp.set_blackboxed_ranges(script_id, &positions).await {
            tracing::debug!(%script_id, error = %err, "setting blackbox ranges rejected");
        }
    }
}

/// A synchronous fold over authored-source intervals, in order: each
/// transition in `skipped` flips `in_lib_range` and emits the interval's
/// start position. If the generated script itself is skipped, `{0, 0}` is
/// prepended.
fn compute_positional_ranges(script_itself_skipped: bool, intervals: &[AuthoredInterval]) -> Vec<ScriptPosition> {
    let mut positions = Vec::new();
    if script_itself_skipped {
        positions.push(ScriptPosition { line_number: 0, column_number: 0 });
    }

    let mut in_lib_range = script_itself_skipped;
    for interval in intervals {
        if interval.skipped != in_lib_range {
            positions.push(ScriptPosition { line_number: interval.start_line, column_number: interval.start_column });
            in_lib_range = interval.skipped;
        }
    }
    positions
}

/// Translates a `skipFiles` glob (`**`, `*`, `?`) into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c if "\\.+^$()[]{}|".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}
