//! Stack, scope, and exception materialization: turns CDP `Debugger.paused`
//! call frames into DAP `StackFrame`/`Scope` records, annotated with
//! skip-file and smart-step presentation hints.

use js_dap_cdp::transform::{LineColumnTransformer, PathTransformer, SourceMapTransformer};
use js_dap_cdp::{CallFrame, RemoteObject};
use js_dap_handles::HandleTable;
use js_dap_protocol::{Scope, Source, SourcePresentationHint, StackFrame};
use js_dap_scripts::ScriptRegistry;
use js_dap_skip::SkipFileManager;
use js_dap_variables::{VariableContainer, VariableRegistry};

/// Registers each CDP call frame behind a per-pause handle so `scopes` and
/// `evaluate` requests can resolve a `frameId` back to its `callFrameId`.
pub struct StackInspector {
    frames: HandleTable<CallFrame>,
}

impl Default for StackInspector {
    fn default() -> Self {
        Self { frames: HandleTable::new() }
    }
}

impl StackInspector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidates every frame handle minted so far. Call once per pause,
    /// before [`Self::build_stack_trace`].
    pub fn reset(&mut self) {
        self.frames.reset();
    }

    #[must_use]
    pub fn call_frame(&self, frame_id: i64) -> Option<&CallFrame> {
        self.frames.get(frame_id)
    }

    /// Builds DAP stack frames from `call_frames`, optionally truncated to
    /// `levels`. Each frame is minted a fresh handle in [`Self::frames`].
    ///
    /// `smart_step_would_skip` asks whether smart-stepping would skip past
    /// this frame's mapped location; it is independent of `skip_files`
    /// matching because it depends on whether the frame maps to an authored
    /// location at all, not on a path pattern.
    pub async fn build_stack_trace(
        &mut self,
        call_frames: &[CallFrame],
        levels: Option<i64>,
        scripts: &ScriptRegistry,
        skip_files: &SkipFileManager,
        smart_step_would_skip: impl Fn(&CallFrame) -> bool,
        path: &impl PathTransformer,
        sourcemap: &impl SourceMapTransformer,
        line_col: &LineColumnTransformer,
    ) -> Vec<StackFrame> {
        if call_frames.is_empty() {
            return Vec::new();
        }

        let truncated: Vec<&CallFrame> = match levels {
            Some(n) if n > 0 => call_frames.iter().take(n as usize).collect(),
            _ => call_frames.iter().collect(),
        };

        let mut stack_frames = Vec::with_capacity(truncated.len());
        for call_frame in truncated {
            let id = self.frames.alloc(call_frame.clone());
            match self.materialize_frame(id, call_frame, scripts, skip_files, &smart_step_would_skip, path, sourcemap, line_col).await {
                Ok(frame) => stack_frames.push(frame),
                Err(()) => {
                    tracing::warn!("recovering malformed call frame as a dummy frame");
                    stack_frames.push(StackFrame { id, name: "Unknown".to_string(), source: None, line: 0, column: 0, presentation_hint: None });
                }
            }
        }
        stack_frames
    }

    #[allow(clippy::too_many_arguments)]
    async fn materialize_frame(
        &self,
        id: i64,
        call_frame: &CallFrame,
        scripts: &ScriptRegistry,
        skip_files: &SkipFileManager,
        smart_step_would_skip: &impl Fn(&CallFrame) -> bool,
        path: &impl PathTransformer,
        sourcemap: &impl SourceMapTransformer,
        line_col: &LineColumnTransformer,
    ) -> Result<StackFrame, ()> {
        let script = scripts.by_id(&call_frame.location.script_id);

        let mut cdp_line = call_frame.location.line_number;
        let mut cdp_column = call_frame.location.column_number.unwrap_or(0);
        let mut target_url = script.map(|s| s.url.clone());

        if let Some(mapped) = sourcemap.map_to_authored(&call_frame.location.script_id, cdp_line, cdp_column).await {
            target_url = Some(mapped.path);
            cdp_line = mapped.line;
            cdp_column = mapped.column;
        }

        let client_path = target_url.as_deref().and_then(|url| path.to_client_path(url));
        let client_line = line_col.cdp_line_to_client(cdp_line);
        let client_column = line_col.cdp_column_to_client(cdp_column);

        let mut origin_suffix = None;
        if let Some(p) = &client_path {
            if skip_files.should_skip_source(p).unwrap_or(false) {
                origin_suffix = Some("(skipped by 'skipFiles')");
            } else if smart_step_would_skip(call_frame) {
                origin_suffix = Some("(skipped by 'smartStep')");
            }
        }

        let mut source = client_path.as_ref().map(|p| Source::from_path(p.clone()));
        if let (Some(suffix), Some(src)) = (origin_suffix, source.take()) {
            source = Some(src.with_origin(suffix).with_presentation_hint(SourcePresentationHint::Deemphasize));
        }

        if let Some(p) = &client_path {
            if ScriptRegistry::is_placeholder_url(p) {
                source = None;
            }
        } else if let Some(url) = &target_url {
            if ScriptRegistry::is_placeholder_url(url) {
                source = None;
            }
        }

        let name = target_url
            .as_deref()
            .filter(|u| ScriptRegistry::is_placeholder_url(u))
            .map(|u| {
                let script_id = u.trim_start_matches("eval://");
                ScriptRegistry::vm_display_name(script_id)
            })
            .unwrap_or_else(|| call_frame.function_name.clone());

        Ok(StackFrame { id, name, source, line: client_line, column: client_column, presentation_hint: None })
    }

    /// Builds the DAP scopes for the top call frame, prepending a synthetic
    /// `Exception` scope when `pinned_exception` is set for this pause.
    pub fn build_scopes(&self, call_frame: &CallFrame, pinned_exception: Option<RemoteObject>, variables: &mut VariableRegistry) -> Vec<Scope> {
        let mut scopes = Vec::with_capacity(call_frame.scope_chain.len() + 1);

        if let Some(exception) = pinned_exception {
            let reference = variables.alloc(VariableContainer::Exception { object: exception });
            scopes.push(Scope { name: "Exception".to_string(), variables_reference: reference, expensive: false, named_variables: None, indexed_variables: None });
        }

        for (index, scope) in call_frame.scope_chain.iter().enumerate() {
            let this = if index == 0 { Some(call_frame.this_object.clone()) } else { None };
            let return_value = if index == 0 { call_frame.return_value.clone() } else { None };
            let reference = variables.alloc(VariableContainer::Scope {
                call_frame_id: call_frame.call_frame_id.clone(),
                scope_number: index as i64,
                object_id: scope.object.object_id.clone(),
                this,
                return_value,
            });
            scopes.push(Scope {
                name: capitalize(&scope.type_),
                variables_reference: reference,
                expensive: scope.type_ == "global",
                named_variables: None,
                indexed_variables: None,
            });
        }

        scopes
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
