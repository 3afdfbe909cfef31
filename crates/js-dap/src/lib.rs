//! Debug adapter façade: wires the handle tables, script registry,
//! breakpoint manager, skip-file manager, stack inspector, variable
//! registry, and evaluator into one DAP-facing surface, and owns the
//! pause/step coordination those components don't know about themselves.
//!
//! This crate defines no CDP transport and no concrete launch mechanics —
//! see [`LaunchTarget`]. Whoever embeds this core owns the socket, decodes
//! raw CDP frames into [`CdpEvent`], and calls [`DebugAdapter::on_cdp_event`]
//! as they arrive.

mod dispatcher;
mod error;

pub use dispatcher::dispatch;
pub use error::DapError;

use js_dap_breakpoint::BreakpointManager;
use js_dap_cdp::transform::{LineColumnTransformer, PathTransformer, SourceMapTransformer};
use js_dap_cdp::{CallFrame, CdpClient, CdpEvent, RemoteObject};
use js_dap_eval::{EvalOutcome, Evaluator};
use js_dap_protocol::{
    Breakpoint, BreakpointEventBody, Capabilities, CompletionItem, CompletionsArguments, CompletionsResponseBody, ContinueArguments,
    ContinueResponseBody, Event, EvaluateArguments, EvaluateResponseBody, InitializeRequestArguments, LaunchRequestArguments, NextArguments,
    OutputEventBody, PauseArguments, RestartFrameArguments, Scope, ScopesArguments, ScopesResponseBody, SetBreakpointsArguments,
    SetBreakpointsResponseBody, SetExceptionBreakpointsArguments, SetVariableArguments, SetVariableResponseBody, SourceArguments,
    SourceResponseBody, StackTraceArguments, StackTraceResponseBody, StepInArguments, StepOutArguments, StoppedEventBody, TerminatedEventBody,
    Thread, ThreadsResponseBody, ToggleSkipFileStatusArguments, VariablesArguments, VariablesResponseBody,
};
use js_dap_scripts::{ScriptRegistry, SourceContainer};
use js_dap_skip::{AuthoredInterval, SkipFileManager, ToggleOutcome};
use js_dap_stack::StackInspector;
use js_dap_variables::{VariableContainer, VariableRegistry};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

pub mod configuration;

/// This core only ever reports a single thread; the debuggee is whatever a
/// single CDP connection's call stack represents.
pub const THREAD_ID: i64 = 1;

/// Launches or attaches the debuggee process the adapter will connect its
/// CDP transport to. Concrete process spawning and port discovery are
/// outside this core's scope — implementations own that, and the façade
/// only needs to know the launch succeeded before it proceeds to `Debugger.enable`.
pub trait LaunchTarget: Send + Sync {
    fn launch(&self, args: &LaunchRequestArguments) -> impl Future<Output = Result<(), DapError>> + Send;
}

/// Maps an internal stop reason onto the text the client displays. Unknown
/// reasons pass through unchanged.
#[must_use]
pub fn localize_stop_reason(reason: &str) -> String {
    match reason {
        "debugger" => "debugger statement".to_string(),
        "frame_entry" => "frame entry".to_string(),
        other => other.to_string(),
    }
}

/// Wires every component crate behind the DAP/CDP boundary and coordinates
/// pausing, stepping, and smart-step skipping across them.
///
/// `C`/`P`/`M` are generic parameters rather than trait objects: every
/// method on [`CdpClient`], [`PathTransformer`], and [`SourceMapTransformer`]
/// returns `impl Future`, which has no object-safe form to box behind
/// `dyn`. A caller embedding this core picks concrete types once at
/// construction.
pub struct DebugAdapter<C, P, M> {
    cdp: C,
    path: P,
    sourcemap: M,
    line_col: LineColumnTransformer,

    scripts: ScriptRegistry,
    breakpoints: Arc<Mutex<BreakpointManager>>,
    skip_files: SkipFileManager,
    stack: StackInspector,
    variables: VariableRegistry,
    evaluator: Evaluator,

    seq: AtomicI64,
    smart_step: bool,
    terminated: bool,
    pinned_exception: Option<RemoteObject>,
    expected_stop_reason: Option<String>,
    step_complete: Option<Arc<Notify>>,
    skipped_steps: u32,
    last_call_frames: Vec<CallFrame>,
    top_frame_id: Option<i64>,
    last_stopped_body: Option<StoppedEventBody>,
    pending_events: Vec<Event>,
}

impl<C, P, M> DebugAdapter<C, P, M>
where
    C: CdpClient,
    P: PathTransformer,
    M: SourceMapTransformer,
{
    pub fn new(cdp: C, path: P, sourcemap: M, skip_files: &[String], skip_file_reg_exps: &[String], smart_step: bool) -> Self {
        Self {
            cdp,
            path,
            sourcemap,
            line_col: LineColumnTransformer::default(),
            scripts: ScriptRegistry::new(),
            breakpoints: Arc::new(Mutex::new(BreakpointManager::new())),
            skip_files: SkipFileManager::new(skip_files, skip_file_reg_exps),
            stack: StackInspector::new(),
            variables: VariableRegistry::new(),
            evaluator: Evaluator::new(),
            seq: AtomicI64::new(1),
            smart_step,
            terminated: false,
            pinned_exception: None,
            expected_stop_reason: None,
            step_complete: None,
            skipped_steps: 0,
            last_call_frames: Vec::new(),
            top_frame_id: None,
            last_stopped_body: None,
            pending_events: Vec::new(),
        }
    }

    /// Events a request handler queued for the caller to flush alongside its
    /// response — currently only `toggleSkipFileStatus`'s re-dispatched
    /// `stopped` event.
    pub fn take_pending_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending_events)
    }

    pub(crate) fn next_seq(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    // -----------------------------------------------------------------
    // initialize / launch / attach / disconnect
    // -----------------------------------------------------------------

    pub fn initialize(&mut self, args: &InitializeRequestArguments) -> Result<Capabilities, DapError> {
        if args.path_format.as_deref().is_some_and(|f| f != "path") {
            return Err(DapError::PathFormatUnsupported);
        }
        self.line_col = LineColumnTransformer::new(args.lines_start_at1, args.columns_start_at1);
        Ok(Capabilities::default_for_adapter())
    }

    pub async fn launch(&mut self, args: &LaunchRequestArguments, target: &impl LaunchTarget) -> Result<(), DapError> {
        target.launch(args).await?;
        self.after_connect(args.stop_on_entry).await
    }

    pub async fn attach(&mut self, args: &js_dap_protocol::AttachRequestArguments) -> Result<(), DapError> {
        if args.port.is_none() {
            return Err(DapError::MissingAttachPort);
        }
        self.after_connect(false).await
    }

    async fn after_connect(&mut self, stop_on_entry: bool) -> Result<(), DapError> {
        self.cdp.debugger_enable().await.map_err(|e| DapError::LaunchFailed(e.to_string()))?;
        self.cdp.runtime_enable().await.map_err(|e| DapError::LaunchFailed(e.to_string()))?;
        self.skip_files.push_patterns(&self.cdp).await;
        if stop_on_entry {
            self.expected_stop_reason = Some("entry".to_string());
        } else {
            self.cdp.resume().await.map_err(|e| DapError::LaunchFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Joined before the client is told `initialized`, so breakpoints set
    /// during configuration land before the debuggee's first statement.
    pub async fn join_initial_sourcemap_work(&self) {
        self.scripts.initial_sourcemap_work().join().await;
    }

    pub async fn disconnect(&mut self, args: &js_dap_protocol::DisconnectArguments) -> Result<(), DapError> {
        if !args.terminate_debuggee {
            let _ = self.cdp.resume().await;
        }
        self.terminated = true;
        Ok(())
    }

    // -----------------------------------------------------------------
    // breakpoints
    // -----------------------------------------------------------------

    pub async fn set_breakpoints(&self, args: &SetBreakpointsArguments) -> Result<SetBreakpointsResponseBody, DapError> {
        let mut breakpoints = self.breakpoints.lock().await;
        Ok(breakpoints.set_breakpoints(args, &self.cdp, &self.scripts, &self.path, &self.sourcemap, self.line_col).await?)
    }

    pub async fn set_exception_breakpoints(&self, args: &SetExceptionBreakpointsArguments) -> Result<(), DapError> {
        let state = if args.filters.iter().any(|f| f == "all") {
            js_dap_cdp::PauseOnExceptionsState::All
        } else if args.filters.iter().any(|f| f == "uncaught") {
            js_dap_cdp::PauseOnExceptionsState::Uncaught
        } else {
            js_dap_cdp::PauseOnExceptionsState::None
        };
        self.cdp.set_pause_on_exceptions(state).await.map_err(|e| DapError::LaunchFailed(e.to_string()))?;
        Ok(())
    }

    pub async fn toggle_skip_file_status(&mut self, args: &ToggleSkipFileStatusArguments) -> Result<(), DapError> {
        let Some(path) = &args.path else { return Ok(()) };
        let frame_script_id = self.last_call_frames.iter().find(|cf| self.path.to_client_path(&cf.url).as_deref() == Some(path.as_str())).map(|cf| cf.location.script_id.clone());
        let in_current_stack = frame_script_id.is_some();
        let is_generated_with_authored_sources = frame_script_id.as_deref().is_some_and(|id| self.evaluator.authored_sources(id).is_some_and(|sources| !sources.is_empty()));

        let ToggleOutcome::Toggled { .. } = self.skip_files.toggle(path, in_current_stack, is_generated_with_authored_sources) else {
            return Ok(());
        };
        self.skip_files.push_patterns(&self.cdp).await;

        if let Some(script_id) = self.evaluator.script_for_authored_path(path).map(str::to_string) {
            self.recompute_positional_blackbox(&script_id).await;
        }

        if in_current_stack {
            if let Some(body) = self.last_stopped_body.clone() {
                self.pending_events.push(Event::new(self.next_seq(), "stopped", body));
            }
        }

        Ok(())
    }

    /// Walks `script_id`'s recorded authored sources in order, deciding each
    /// one's current skip state, and pushes the resulting blackbox ranges.
    async fn recompute_positional_blackbox(&mut self, script_id: &str) {
        let Some(sources) = self.evaluator.authored_sources(script_id) else { return };
        let intervals: Vec<AuthoredInterval> = sources
            .iter()
            .map(|source| AuthoredInterval { start_line: source.start_line, start_column: source.start_column, skipped: self.skip_files.should_skip_source(&source.path).unwrap_or(false) })
            .collect();
        let script_itself_skipped = self.scripts.by_id(script_id).and_then(|script| self.path.to_client_path(&script.url)).is_some_and(|p| self.skip_files.should_skip_source(&p).unwrap_or(false));
        self.skip_files.push_blackboxed_ranges(&self.cdp, script_id, script_itself_skipped, &intervals).await;
    }

    // -----------------------------------------------------------------
    // execution control
    // -----------------------------------------------------------------

    pub async fn continue_(&mut self, args: &ContinueArguments) -> Result<ContinueResponseBody, DapError> {
        let _ = args.thread_id;
        self.arm_step_complete();
        self.cdp.resume().await.map_err(|e| DapError::LaunchFailed(e.to_string()))?;
        self.evaluator.mark_resumed();
        self.disarm_step_complete();
        Ok(ContinueResponseBody { all_threads_continued: true })
    }

    pub async fn next(&mut self, args: &NextArguments) -> Result<(), DapError> {
        let _ = args.thread_id;
        self.expected_stop_reason = Some("step".to_string());
        self.arm_step_complete();
        self.cdp.step_over().await.map_err(|e| DapError::LaunchFailed(e.to_string()))?;
        self.evaluator.mark_resumed();
        self.disarm_step_complete();
        Ok(())
    }

    pub async fn step_in(&mut self, args: &StepInArguments) -> Result<(), DapError> {
        let _ = args.thread_id;
        self.expected_stop_reason = Some("step".to_string());
        self.arm_step_complete();
        self.cdp.step_into().await.map_err(|e| DapError::LaunchFailed(e.to_string()))?;
        self.evaluator.mark_resumed();
        self.disarm_step_complete();
        Ok(())
    }

    pub async fn step_out(&mut self, args: &StepOutArguments) -> Result<(), DapError> {
        let _ = args.thread_id;
        self.expected_stop_reason = Some("step".to_string());
        self.arm_step_complete();
        self.cdp.step_out().await.map_err(|e| DapError::LaunchFailed(e.to_string()))?;
        self.evaluator.mark_resumed();
        self.disarm_step_complete();
        Ok(())
    }

    pub async fn pause(&mut self, args: &PauseArguments) -> Result<(), DapError> {
        let _ = args.thread_id;
        self.expected_stop_reason = Some("user_request".to_string());
        self.cdp.pause().await.map_err(|e| DapError::LaunchFailed(e.to_string()))?;
        Ok(())
    }

    pub async fn restart_frame(&mut self, args: &RestartFrameArguments) -> Result<(), DapError> {
        self.expected_stop_reason = Some("frame_entry".to_string());
        self.arm_step_complete();
        self.evaluator.restart_frame(args.frame_id, &self.stack, &self.cdp).await?;
        self.evaluator.mark_resumed();
        self.disarm_step_complete();
        Ok(())
    }

    fn arm_step_complete(&mut self) {
        self.step_complete = Some(Arc::new(Notify::new()));
    }

    /// Signals the step's own CDP round trip is done. The `Paused` handler
    /// waits on this (bounded to 300ms) before emitting `stopped`, so a
    /// step's response always precedes its stopped event.
    fn disarm_step_complete(&mut self) {
        if let Some(notify) = self.step_complete.take() {
            notify.notify_waiters();
        }
    }

    // -----------------------------------------------------------------
    // stack / scopes / variables
    // -----------------------------------------------------------------

    pub fn threads(&self) -> ThreadsResponseBody {
        ThreadsResponseBody { threads: vec![Thread { id: THREAD_ID, name: "main".to_string() }] }
    }

    pub async fn stack_trace(&mut self, args: &StackTraceArguments) -> Result<StackTraceResponseBody, DapError> {
        let total_frames = self.last_call_frames.len() as i64;
        self.stack.reset();
        let smart_step = self.smart_step;
        let mut would_skip = std::collections::HashMap::new();
        if smart_step {
            for call_frame in &self.last_call_frames {
                let skip = self.sourcemap.map_to_authored(&call_frame.location.script_id, call_frame.location.line_number, call_frame.location.column_number.unwrap_or(0)).await.is_none();
                would_skip.insert(call_frame.call_frame_id.clone(), skip);
            }
        }
        let frames = self
            .stack
            .build_stack_trace(
                &self.last_call_frames,
                args.levels,
                &self.scripts,
                &self.skip_files,
                |cf| *would_skip.get(&cf.call_frame_id).unwrap_or(&false),
                &self.path,
                &self.sourcemap,
                &self.line_col,
            )
            .await;
        self.top_frame_id = frames.first().map(|f| f.id);
        Ok(StackTraceResponseBody { stack_frames: frames, total_frames })
    }

    pub fn scopes(&mut self, args: &ScopesArguments) -> Result<ScopesResponseBody, DapError> {
        let call_frame = self.stack.call_frame(args.frame_id).cloned().ok_or(DapError::StackFrameNotValid)?;
        let pinned = if self.top_frame_id == Some(args.frame_id) { self.pinned_exception.take() } else { None };
        let scopes: Vec<Scope> = self.stack.build_scopes(&call_frame, pinned, &mut self.variables);
        Ok(ScopesResponseBody { scopes })
    }

    pub async fn variables(&mut self, args: &VariablesArguments) -> Result<VariablesResponseBody, DapError> {
        let variables = self.variables.expand(args.variables_reference, args.filter, args.start, args.count, &self.cdp).await?;
        Ok(VariablesResponseBody { variables })
    }

    pub async fn set_variable(&mut self, args: &SetVariableArguments) -> Result<SetVariableResponseBody, DapError> {
        let call_frame_id = match self.variables.get(args.variables_reference) {
            Some(VariableContainer::Scope { call_frame_id, .. }) => call_frame_id.clone(),
            Some(_) => String::new(),
            None => return Err(DapError::SourceRequestIllegalHandle),
        };
        let value = self.evaluator.set_variable(args.variables_reference, &args.name, &args.value, &call_frame_id, &mut self.variables, &self.cdp).await?;
        Ok(SetVariableResponseBody { value, variables_reference: None })
    }

    pub async fn source(&self, args: &SourceArguments) -> Result<SourceResponseBody, DapError> {
        let container = self.scripts.source(args.source_reference).ok_or(DapError::SourceRequestIllegalHandle)?;
        match container {
            SourceContainer::Inline { contents, .. } => Ok(SourceResponseBody { content: contents.clone() }),
            SourceContainer::Script { script_id } => {
                let content = self.cdp.get_script_source(script_id).await.map_err(|_| DapError::RuntimeNotConnected)?;
                Ok(SourceResponseBody { content })
            }
        }
    }

    // -----------------------------------------------------------------
    // evaluate / completions
    // -----------------------------------------------------------------

    pub async fn evaluate(&mut self, args: &EvaluateArguments) -> Result<EvaluateResponseBody, DapError> {
        let outcome = self
            .evaluator
            .evaluate(&args.expression, args.frame_id, args.context.as_deref(), &self.scripts, &self.stack, &mut self.variables, &self.path, &self.cdp)
            .await?;
        Ok(match outcome {
            EvalOutcome::Meta(text) => EvaluateResponseBody { result: text, type_: None, variables_reference: 0, named_variables: None, indexed_variables: None },
            EvalOutcome::Value { value, type_, variables_reference, named_variables, indexed_variables } => {
                EvaluateResponseBody { result: value, type_, variables_reference, named_variables, indexed_variables }
            }
        })
    }

    pub async fn completions(&self, args: &CompletionsArguments) -> Result<CompletionsResponseBody, DapError> {
        let names = self.evaluator.completions(&args.text, args.frame_id, &self.stack, &self.cdp).await?;
        Ok(CompletionsResponseBody { targets: names.into_iter().map(|label| CompletionItem { label }).collect() })
    }

    // -----------------------------------------------------------------
    // CDP event dispatch
    // -----------------------------------------------------------------

    /// Reacts to one inbound CDP event. Returns the DAP events the caller
    /// should forward to the client, in order.
    pub async fn on_cdp_event(&mut self, event: CdpEvent) -> Vec<Event> {
        match event {
            CdpEvent::ScriptParsed(parsed) => self.handle_script_parsed(parsed).await,
            CdpEvent::Paused(paused) => self.handle_paused(paused).await,
            CdpEvent::Resumed => {
                self.evaluator.mark_resumed();
                vec![Event::new(self.next_seq(), "continued", js_dap_protocol::ContinuedEventBody { thread_id: THREAD_ID, all_threads_continued: true })]
            }
            CdpEvent::BreakpointResolved(resolved) => self.handle_breakpoint_resolved(resolved),
            CdpEvent::ConsoleApiCalled(called) => self.handle_console_api_called(called),
            CdpEvent::ExceptionThrown(thrown) => {
                tracing::debug!(text = %thrown.exception_details.text, "uncaught exception reported");
                Vec::new()
            }
            CdpEvent::ExecutionContextsCleared => {
                self.scripts.clear_on_execution_context_reset();
                let mut breakpoints = self.breakpoints.lock().await;
                *breakpoints = BreakpointManager::new();
                Vec::new()
            }
            CdpEvent::InspectorDetached { reason } => self.handle_terminate(reason),
        }
    }

    async fn handle_script_parsed(&mut self, parsed: js_dap_cdp::ScriptParsedEvent) -> Vec<Event> {
        let script_id = parsed.script_id.clone();
        let Some(outcome) = self.scripts.on_script_parsed(parsed, &self.path, &self.sourcemap).await else {
            return Vec::new();
        };
        self.evaluator.record_script_parsed(&script_id, outcome.authored_sources);

        let Some(client_path) = self.path.to_client_path(&outcome.script.url) else {
            return Vec::new();
        };
        let Some(pending) = self.breakpoints.lock().await.take_pending(&client_path) else {
            return Vec::new();
        };
        let args = SetBreakpointsArguments { source: pending.source, breakpoints: pending.breakpoints };
        match self.set_breakpoints(&args).await {
            Ok(body) => body
                .breakpoints
                .into_iter()
                .map(|bp| Event::new(self.next_seq(), "breakpoint", BreakpointEventBody { reason: "changed".to_string(), breakpoint: bp }))
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to replay pending breakpoints after scriptParsed");
                Vec::new()
            }
        }
    }

    fn handle_breakpoint_resolved(&mut self, resolved: js_dap_cdp::BreakpointResolvedEvent) -> Vec<Event> {
        let bp = Breakpoint {
            id: None,
            verified: true,
            message: None,
            source: None,
            line: Some(self.line_col.cdp_line_to_client(resolved.location.line_number)),
            column: resolved.location.column_number.map(|c| self.line_col.cdp_column_to_client(c)),
        };
        vec![Event::new(self.next_seq(), "breakpoint", BreakpointEventBody { reason: "changed".to_string(), breakpoint: bp })]
    }

    fn handle_console_api_called(&mut self, called: js_dap_cdp::ConsoleApiCalledEvent) -> Vec<Event> {
        let reference = if called.args.is_empty() { 0 } else { self.variables.alloc(VariableContainer::LoggedObjects { objects: called.args.clone() }) };
        let rendered: Vec<String> = called.args.iter().map(|o| js_dap_variables::render_remote_object(o, false)).collect();
        let body = OutputEventBody { category: Some(if called.type_ == "error" { "stderr".to_string() } else { "stdout".to_string() }), output: format!("{}\n", rendered.join(" ")), variables_reference: if reference == 0 { None } else { Some(reference) } };
        vec![Event::new(self.next_seq(), "output", body)]
    }

    fn handle_terminate(&mut self, reason: String) -> Vec<Event> {
        if self.terminated {
            return Vec::new();
        }
        tracing::info!(%reason, "CDP connection lost, terminating session");
        self.terminated = true;
        vec![Event::new(self.next_seq(), "terminated", TerminatedEventBody::default())]
    }

    #[must_use]
    pub fn has_terminated(&self) -> bool {
        self.terminated
    }

    async fn handle_paused(&mut self, paused: js_dap_cdp::PausedEvent) -> Vec<Event> {
        self.last_call_frames = paused.call_frames.clone();
        self.stack.reset();
        self.variables.reset();

        let reason = if paused.data.is_some() {
            self.pinned_exception = paused.data.clone();
            "exception".to_string()
        } else if !paused.hit_breakpoints.is_empty() {
            let should_pause = self.breakpoints.lock().await.should_pause_for_hits(&paused.hit_breakpoints);
            if should_pause {
                "breakpoint".to_string()
            } else if let Some(expected) = self.expected_stop_reason.take() {
                // The hit-condition predicate was false, but the pause was
                // also induced by a step/pause request landing on this line -
                // a user action is never silently swallowed.
                expected
            } else {
                let _ = self.cdp.resume().await;
                self.evaluator.mark_resumed();
                return Vec::new();
            }
        } else if let Some(expected) = self.expected_stop_reason.take() {
            expected
        } else {
            "debugger".to_string()
        };

        if self.smart_step && matches!(reason.as_str(), "step" | "frame_entry") {
            if let Some(top) = paused.call_frames.first() {
                let maps_to_authored = self.sourcemap.map_to_authored(&top.location.script_id, top.location.line_number, top.location.column_number.unwrap_or(0)).await.is_some();
                if !maps_to_authored {
                    self.skipped_steps += 1;
                    self.expected_stop_reason = Some(reason);
                    let _ = self.cdp.step_into().await;
                    return Vec::new();
                }
            }
        }
        if self.skipped_steps > 0 {
            tracing::debug!(count = self.skipped_steps, "smart-step skipped steps before stopping");
            self.skipped_steps = 0;
        }

        if let Some(notify) = self.step_complete.take() {
            let _ = tokio::time::timeout(Duration::from_millis(300), notify.notified()).await;
        }

        let body = StoppedEventBody {
            reason: localize_stop_reason(&reason),
            description: None,
            thread_id: Some(THREAD_ID),
            all_threads_stopped: true,
            text: None,
            hit_breakpoint_ids: Vec::new(),
        };
        self.last_stopped_body = Some(body.clone());
        vec![Event::new(self.next_seq(), "stopped", body)]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use js_dap_cdp::transform::{IdentityPathTransformer, NoSourceMapTransformer};
    use js_dap_cdp::{CallArgument, CdpError, EvaluateResult, GetPropertiesResult, Location, PauseOnExceptionsState, SetBreakpointByUrlResult, SetBreakpointResult};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    pub(crate) struct FakeCdp {
        resumed: AtomicUsize,
        stepped_into: AtomicUsize,
        pause_on_exceptions: StdMutex<Vec<PauseOnExceptionsState>>,
    }

    impl CdpClient for FakeCdp {
        async fn debugger_enable(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn runtime_enable(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn resume(&self) -> Result<(), CdpError> {
            self.resumed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn step_over(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn step_into(&self) -> Result<(), CdpError> {
            self.stepped_into.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn step_out(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn pause(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn set_breakpoint(&self, _script_id: &str, _line: i64, _column: Option<i64>, _condition: Option<&str>) -> Result<SetBreakpointResult, CdpError> {
            Ok(SetBreakpointResult { breakpoint_id: "bp-1".to_string(), actual_location: None })
        }
        async fn set_breakpoint_by_url(&self, _url_regex: &str, _line: i64, _column: Option<i64>, _condition: Option<&str>) -> Result<SetBreakpointByUrlResult, CdpError> {
            Ok(SetBreakpointByUrlResult { breakpoint_id: "bp-1".to_string(), locations: Vec::new() })
        }
        async fn remove_breakpoint(&self, _breakpoint_id: &str) -> Result<(), CdpError> {
            Ok(())
        }
        async fn set_pause_on_exceptions(&self, state: PauseOnExceptionsState) -> Result<(), CdpError> {
            self.pause_on_exceptions.lock().unwrap().push(state);
            Ok(())
        }
        async fn set_blackbox_patterns(&self, _patterns: &[String]) -> Result<(), CdpError> {
            Ok(())
        }
        async fn set_blackboxed_ranges(&self, _script_id: &str, _positions: &[js_dap_cdp::ScriptPosition]) -> Result<(), CdpError> {
            Ok(())
        }
        async fn evaluate_on_call_frame(&self, _call_frame_id: &str, _expression: &str, _silent: bool, _generate_preview: bool) -> Result<EvaluateResult, CdpError> {
            Ok(EvaluateResult { result: RemoteObject { type_: "undefined".to_string(), ..Default::default() }, exception_details: None })
        }
        async fn evaluate(&self, _expression: &str, _return_by_value: bool) -> Result<EvaluateResult, CdpError> {
            Ok(EvaluateResult { result: RemoteObject { type_: "undefined".to_string(), ..Default::default() }, exception_details: None })
        }
        async fn set_variable_value(&self, _scope_number: i64, _variable_name: &str, _new_value: CallArgument, _call_frame_id: &str) -> Result<(), CdpError> {
            Ok(())
        }
        async fn restart_frame(&self, _call_frame_id: &str) -> Result<(), CdpError> {
            Ok(())
        }
        async fn get_script_source(&self, _script_id: &str) -> Result<String, CdpError> {
            Ok(String::new())
        }
        async fn get_properties(&self, _object_id: &str, _own_properties: bool, _accessor_properties_only: bool) -> Result<GetPropertiesResult, CdpError> {
            Ok(GetPropertiesResult::default())
        }
        async fn call_function_on(&self, _object_id: &str, _function_declaration: &str, _arguments: Vec<CallArgument>, _return_by_value: bool) -> Result<EvaluateResult, CdpError> {
            Ok(EvaluateResult { result: RemoteObject { type_: "undefined".to_string(), ..Default::default() }, exception_details: None })
        }
        async fn release_object(&self, _object_id: &str) -> Result<(), CdpError> {
            Ok(())
        }
    }

    fn adapter() -> DebugAdapter<FakeCdp, IdentityPathTransformer, NoSourceMapTransformer> {
        DebugAdapter::new(FakeCdp::default(), IdentityPathTransformer, NoSourceMapTransformer, &[], &[], false)
    }

    fn frame(script_id: &str, line: i64) -> CallFrame {
        CallFrame {
            call_frame_id: format!("cf-{script_id}"),
            function_name: "main".to_string(),
            location: Location { script_id: script_id.to_string(), line_number: line, column_number: Some(0) },
            url: "file:///app/a.js".to_string(),
            scope_chain: Vec::new(),
            this_object: RemoteObject { type_: "undefined".to_string(), ..Default::default() },
            return_value: None,
        }
    }

    #[test]
    fn initialize_rejects_non_path_format() {
        let adapter = adapter();
        let args = InitializeRequestArguments { path_format: Some("uri".to_string()), ..Default::default() };
        assert!(matches!(adapter.initialize(&args), Err(DapError::PathFormatUnsupported)));
    }

    #[test]
    fn initialize_returns_full_capabilities() {
        let adapter = adapter();
        let args = InitializeRequestArguments { path_format: Some("path".to_string()), ..Default::default() };
        let caps = adapter.initialize(&args).unwrap();
        assert!(caps.supports_restart_frame);
    }

    #[tokio::test]
    async fn unconditional_breakpoint_hit_always_pauses() {
        let mut adapter = adapter();
        adapter.last_call_frames = vec![frame("1", 4)];
        let paused = js_dap_cdp::PausedEvent { call_frames: adapter.last_call_frames.clone(), reason: "other".to_string(), data: None, hit_breakpoints: vec!["bp-unknown".to_string()] };
        let events = adapter.on_cdp_event(CdpEvent::Paused(paused)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "stopped");
    }

    #[tokio::test]
    async fn exception_pause_pins_the_exception_object() {
        let mut adapter = adapter();
        adapter.last_call_frames = vec![frame("1", 4)];
        let exception = RemoteObject { type_: "object".to_string(), description: Some("Error: boom".to_string()), ..Default::default() };
        let paused = js_dap_cdp::PausedEvent { call_frames: adapter.last_call_frames.clone(), reason: "exception".to_string(), data: Some(exception), hit_breakpoints: Vec::new() };
        let events = adapter.on_cdp_event(CdpEvent::Paused(paused)).await;
        assert_eq!(events.len(), 1);
        assert!(adapter.pinned_exception.is_some());
    }

    #[tokio::test]
    async fn default_reason_is_debugger_and_localizes_to_debugger_statement() {
        let mut adapter = adapter();
        adapter.last_call_frames = vec![frame("1", 4)];
        let paused = js_dap_cdp::PausedEvent { call_frames: adapter.last_call_frames.clone(), reason: "other".to_string(), data: None, hit_breakpoints: Vec::new() };
        let events = adapter.on_cdp_event(CdpEvent::Paused(paused)).await;
        let body: StoppedEventBody = serde_json::from_value(events[0].body.clone().unwrap()).unwrap();
        assert_eq!(body.reason, "debugger statement");
    }

    #[tokio::test]
    async fn inspector_detached_emits_terminated_exactly_once() {
        let mut adapter = adapter();
        let first = adapter.on_cdp_event(CdpEvent::InspectorDetached { reason: "target closed".to_string() }).await;
        let second = adapter.on_cdp_event(CdpEvent::InspectorDetached { reason: "target closed".to_string() }).await;
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert!(adapter.has_terminated());
    }

    #[tokio::test]
    async fn threads_reports_the_single_fixed_thread() {
        let adapter = adapter();
        let body = adapter.threads();
        assert_eq!(body.threads.len(), 1);
        assert_eq!(body.threads[0].id, THREAD_ID);
    }
}
