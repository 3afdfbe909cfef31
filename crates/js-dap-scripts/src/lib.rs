//! Script registry: indexes every observed script by CDP `scriptId` and by
//! normalized URL, and mints placeholder URLs for scripts the runtime
//! reports without one.

use js_dap_cdp::transform::{AuthoredSource, PathTransformer, SourceMapTransformer};
use js_dap_cdp::ScriptParsedEvent;
use js_dap_handles::HandleTable;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// A script as reported by the runtime. Immutable after first observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub script_id: String,
    pub url: String,
    pub source_map_url: Option<String>,
}

/// A handle payload for a client-visible `sourceReference`: either inlined
/// text or a pointer back to a known script.
#[derive(Debug, Clone)]
pub enum SourceContainer {
    Inline { contents: String, mapped_path: Option<String> },
    Script { script_id: String },
}

/// The outcome of processing one `scriptParsed` event.
#[derive(Debug, Clone)]
pub struct ScriptParseOutcome {
    pub script: Script,
    pub authored_sources: Vec<AuthoredSource>,
}

/// Indexes scripts by id and by URL, and tracks in-flight source-map work
/// so the adapter can join it before announcing itself `initialized`.
pub struct ScriptRegistry {
    by_id: HashMap<String, Script>,
    by_url: HashMap<String, String>,
    sources: HandleTable<SourceContainer>,
    initial_sourcemap_work: TrackedWork,
}

impl ScriptRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_url: HashMap::new(),
            sources: HandleTable::new(),
            initial_sourcemap_work: TrackedWork::new(),
        }
    }

    #[must_use]
    pub fn placeholder_url(script_id: &str) -> String {
        format!("eval://{script_id}")
    }

    #[must_use]
    pub fn is_placeholder_url(url: &str) -> bool {
        url.starts_with("eval://")
    }

    /// The display name that replaces a placeholder-protocol path before a
    /// stack frame reaches the client.
    #[must_use]
    pub fn vm_display_name(script_id: &str) -> String {
        format!("VM{script_id}")
    }

    fn is_extension_url(url: &str) -> bool {
        url.starts_with("extensions::") || url.starts_with("chrome-extension://")
    }

    /// Lower-cases a leading Windows drive letter (`C:\...` / `c:\...`) so
    /// the same file is keyed consistently regardless of how the runtime
    /// cased it.
    fn normalize_windows_drive_letter(url: &str) -> String {
        let bytes = url.as_bytes();
        if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            let mut normalized = url.to_string();
            normalized.replace_range(0..1, &url[0..1].to_ascii_lowercase());
            normalized
        } else {
            url.to_string()
        }
    }

    /// A handle to track in-flight source-map work against; call
    /// [`TrackedWork::begin`] before starting I/O and drop the guard on
    /// completion.
    #[must_use]
    pub fn initial_sourcemap_work(&self) -> &TrackedWork {
        &self.initial_sourcemap_work
    }

    #[must_use]
    pub fn by_id(&self, script_id: &str) -> Option<&Script> {
        self.by_id.get(script_id)
    }

    #[must_use]
    pub fn by_url(&self, url: &str) -> Option<&Script> {
        self.by_url.get(url).and_then(|id| self.by_id.get(id))
    }

    /// Every script currently indexed, for the `.scripts` meta-command.
    pub fn scripts(&self) -> impl Iterator<Item = &Script> {
        self.by_id.values()
    }

    pub fn alloc_source(&mut self, container: SourceContainer) -> i64 {
        self.sources.alloc(container)
    }

    #[must_use]
    pub fn source(&self, handle: i64) -> Option<&SourceContainer> {
        self.sources.get(handle)
    }

    /// Processes one `scriptParsed` event: filters extension scripts,
    /// normalizes the URL, mints a placeholder when the runtime reported
    /// none, indexes the script, and runs it through both transformers.
    /// Returns `None` for scripts that should never be registered.
    pub async fn on_script_parsed(
        &mut self,
        event: ScriptParsedEvent,
        path: &impl PathTransformer,
        sourcemap: &impl SourceMapTransformer,
    ) -> Option<ScriptParseOutcome> {
        if Self::is_extension_url(&event.url) {
            tracing::debug!(script_id = %event.script_id, url = %event.url, "dropping extension script");
            return None;
        }

        let url = if event.url.is_empty() {
            Self::placeholder_url(&event.script_id)
        } else {
            Self::normalize_windows_drive_letter(&event.url)
        };

        let script = Script { script_id: event.script_id.clone(), url: url.clone(), source_map_url: event.source_map_url.clone() };
        self.by_id.insert(script.script_id.clone(), script.clone());
        self.by_url.insert(url.clone(), script.script_id.clone());

        // Target-URL translation happens even though nothing currently
        // consumes the result directly; it validates the script is
        // reachable from the client's path space before sourcemap work
        // begins, matching the registry's role as the join point between
        // CDP identity and client-visible identity.
        let _ = path.to_client_path(&url);

        let authored_sources = {
            let _guard = self.initial_sourcemap_work.begin();
            sourcemap.script_parsed(&script.script_id, script.source_map_url.as_deref()).await
        };

        Some(ScriptParseOutcome { script, authored_sources })
    }

    /// Drops every indexed script and committed URL mapping, as happens on
    /// `Runtime.executionContextsCleared` (e.g. navigation). Source
    /// containers are left untouched: they must survive for the lifetime of
    /// the session.
    pub fn clear_on_execution_context_reset(&mut self) {
        self.by_id.clear();
        self.by_url.clear();
    }
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A join barrier for async work started before some later event (the
/// adapter's `initialized` event, in this core's only user). Each unit of
/// work holds a [`TrackedWorkGuard`] for its duration; [`Self::join`]
/// resolves once every outstanding guard has been dropped.
#[derive(Default)]
pub struct TrackedWork {
    pending: AtomicUsize,
    notify: Notify,
}

impl TrackedWork {
    #[must_use]
    pub fn new() -> Self {
        Self { pending: AtomicUsize::new(0), notify: Notify::new() }
    }

    #[must_use]
    pub fn begin(&self) -> TrackedWorkGuard<'_> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        TrackedWorkGuard { work: self }
    }

    /// Waits until every guard handed out so far has been dropped. Safe to
    /// call even if nothing was ever tracked (resolves immediately).
    pub async fn join(&self) {
        loop {
            let notified = self.notify.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct TrackedWorkGuard<'a> {
    work: &'a TrackedWork,
}

impl Drop for TrackedWorkGuard<'_> {
    fn drop(&mut self) {
        if self.work.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.work.notify.notify_waiters();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use js_dap_cdp::transform::{IdentityPathTransformer, NoSourceMapTransformer};

    fn parsed(script_id: &str, url: &str) -> ScriptParsedEvent {
        ScriptParsedEvent { script_id: script_id.to_string(), url: url.to_string(), source_map_url: None }
    }

    #[tokio::test]
    async fn registers_script_by_id_and_url() {
        let mut registry = ScriptRegistry::new();
        let outcome = registry
            .on_script_parsed(parsed("1", "file:///a/b.js"), &IdentityPathTransformer, &NoSourceMapTransformer)
            .await
            .unwrap();

        assert_eq!(outcome.script.url, "file:///a/b.js");
        assert!(registry.by_id("1").is_some());
        assert!(registry.by_url("file:///a/b.js").is_some());
    }

    #[tokio::test]
    async fn empty_url_gets_placeholder() {
        let mut registry = ScriptRegistry::new();
        let outcome = registry
            .on_script_parsed(parsed("42", ""), &IdentityPathTransformer, &NoSourceMapTransformer)
            .await
            .unwrap();
        assert_eq!(outcome.script.url, "eval://42");
        assert!(ScriptRegistry::is_placeholder_url(&outcome.script.url));
    }

    #[tokio::test]
    async fn extension_scripts_are_dropped() {
        let mut registry = ScriptRegistry::new();
        assert!(
            registry
                .on_script_parsed(parsed("1", "chrome-extension://abc/x.js"), &IdentityPathTransformer, &NoSourceMapTransformer)
                .await
                .is_none()
        );
        assert!(
            registry
                .on_script_parsed(parsed("2", "extensions::foo"), &IdentityPathTransformer, &NoSourceMapTransformer)
                .await
                .is_none()
        );
        assert!(registry.by_id("1").is_none());
    }

    #[tokio::test]
    async fn windows_drive_letter_is_lowercased_for_consistent_keys() {
        let mut registry = ScriptRegistry::new();
        let outcome = registry
            .on_script_parsed(parsed("1", "C:\\project\\app.js"), &IdentityPathTransformer, &NoSourceMapTransformer)
            .await
            .unwrap();
        assert_eq!(outcome.script.url, "c:\\project\\app.js");
    }

    #[test]
    fn vm_display_name_matches_placeholder_convention() {
        assert_eq!(ScriptRegistry::vm_display_name("7"), "VM7");
    }

    #[tokio::test]
    async fn tracked_work_join_waits_for_every_guard() {
        let work = std::sync::Arc::new(TrackedWork::new());
        let guard_a = work.begin();
        let guard_b = work.begin();

        let waiter = {
            let work = work.clone();
            tokio::spawn(async move {
                work.join().await;
            })
        };

        tokio::task::yield_now().await;
        drop(guard_a);
        tokio::task::yield_now().await;
        drop(guard_b);

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn tracked_work_join_resolves_immediately_when_nothing_tracked() {
        let work = TrackedWork::new();
        tokio::time::timeout(std::time::Duration::from_millis(50), work.join()).await.unwrap();
    }
}
