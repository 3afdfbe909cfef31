//! Expression evaluator: `evaluate`, `setVariable`, `completions`,
//! `restartFrame`, and the `.scripts` meta-command.

use js_dap_cdp::transform::{AuthoredSource, PathTransformer};
use js_dap_cdp::{CdpClient, CdpError};
use js_dap_scripts::ScriptRegistry;
use js_dap_stack::StackInspector;
use js_dap_variables::{is_indexed_prop_name, VariableRegistry, VariablesError};
use std::collections::{BTreeSet, HashMap};
use tokio::time::{sleep_until, Duration, Instant};

const SOURCE_TRUNCATE_LIMIT: usize = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("stack frame is not valid")]
    StackFrameNotValid,
    #[error("{0}")]
    EvaluateFailed(String),
    #[error("variable is not available")]
    ReferenceUnavailable,
    #[error(transparent)]
    Variables(#[from] VariablesError),
    #[error(transparent)]
    Cdp(#[from] CdpError),
}

/// The outcome of an `evaluate` call: either a meta-command's text (to be
/// sent as an `OutputEvent`, with an empty DAP result) or a rendered value.
#[derive(Debug, Clone)]
pub enum EvalOutcome {
    Meta(String),
    Value {
        value: String,
        type_: Option<String>,
        variables_reference: i64,
        named_variables: Option<i64>,
        indexed_variables: Option<i64>,
    },
}

/// Evaluates expressions against the paused debuggee. Tracks authored
/// sources per script (for `.scripts`) and the post-resume settle window.
pub struct Evaluator {
    authored_sources_by_script: HashMap<String, Vec<AuthoredSource>>,
    settle_until: Option<Instant>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    #[must_use]
    pub fn new() -> Self {
        Self { authored_sources_by_script: HashMap::new(), settle_until: None }
    }

    /// Records a script's authored sources (from its source map, if any),
    /// for later display by `.scripts` and for computing positional
    /// blackbox ranges when one of them is toggled.
    pub fn record_script_parsed(&mut self, script_id: &str, authored_sources: Vec<AuthoredSource>) {
        if !authored_sources.is_empty() {
            self.authored_sources_by_script.insert(script_id.to_string(), authored_sources);
        }
    }

    /// The authored sources recorded for `script_id`, in source order.
    #[must_use]
    pub fn authored_sources(&self, script_id: &str) -> Option<&[AuthoredSource]> {
        self.authored_sources_by_script.get(script_id).map(Vec::as_slice)
    }

    /// The generated script whose source map exposes `path` as one of its
    /// authored sources, if any.
    #[must_use]
    pub fn script_for_authored_path(&self, path: &str) -> Option<&str> {
        self.authored_sources_by_script.iter().find(|(_, sources)| sources.iter().any(|s| s.path == path)).map(|(id, _)| id.as_str())
    }

    /// Call once per resume. The next `evaluate` waits out the remaining
    /// 50ms settle window before dispatching; later calls don't wait again
    /// until the next resume.
    pub fn mark_resumed(&mut self) {
        self.settle_until = Some(Instant::now() + Duration::from_millis(50));
    }

    async fn wait_for_settle(&mut self) {
        if let Some(until) = self.settle_until.take() {
            sleep_until(until).await;
        }
    }

    pub async fn evaluate(
        &mut self,
        expression: &str,
        frame_id: Option<i64>,
        context: Option<&str>,
        scripts: &ScriptRegistry,
        stack: &StackInspector,
        variables: &mut VariableRegistry,
        path: &impl PathTransformer,
        cdp: &impl CdpClient,
    ) -> Result<EvalOutcome, EvalError> {
        if let Some(rest) = expression.trim_start().strip_prefix(".scripts") {
            let text = self.run_scripts_meta_command(rest.trim(), scripts, path, cdp).await;
            return Ok(EvalOutcome::Meta(text));
        }

        self.wait_for_settle().await;

        let result = match frame_id {
            Some(id) => {
                let call_frame = stack.call_frame(id).ok_or(EvalError::StackFrameNotValid)?;
                cdp.evaluate_on_call_frame(&call_frame.call_frame_id, expression, true, true).await?
            }
            None => cdp.evaluate(expression, false).await?,
        };

        if let Some(exception) = result.exception_details {
            if context != Some("repl") && exception.text.starts_with("ReferenceError:") {
                return Err(EvalError::ReferenceUnavailable);
            }
            return Err(EvalError::EvaluateFailed(exception.text));
        }

        let (value, type_, variables_reference, named_variables, indexed_variables) = variables.render_as_evaluate_result(result.result);
        Ok(EvalOutcome::Value { value, type_, variables_reference, named_variables, indexed_variables })
    }

    async fn run_scripts_meta_command(&self, arg: &str, scripts: &ScriptRegistry, path: &impl PathTransformer, cdp: &impl CdpClient) -> String {
        if arg.is_empty() {
            return self.list_scripts(scripts, path);
        }

        let Some(script) = scripts.by_url(arg) else {
            tracing::debug!(url = %arg, "no known script for .scripts argument");
            return format!("unknown script: {arg}");
        };

        match cdp.get_script_source(&script.script_id).await {
            Ok(source) => truncate_source(&source),
            Err(err) => format!("failed to fetch source for {arg}: {err}"),
        }
    }

    fn list_scripts(&self, scripts: &ScriptRegistry, path: &impl PathTransformer) -> String {
        let mut lines = Vec::new();
        for script in scripts.scripts() {
            match path.to_client_path(&script.url) {
                Some(client_path) => lines.push(format!("{} ({client_path})", script.url)),
                None => lines.push(script.url.clone()),
            }
            if let Some(authored) = self.authored_sources_by_script.get(&script.script_id) {
                for source in authored {
                    lines.push(format!("  - {}", source.path));
                }
            }
        }
        lines.join("\n")
    }

    /// Evaluates `value_expression` on the active call frame, then commits
    /// it through the variable registry (scope vs property dispatch lives
    /// there).
    pub async fn set_variable(
        &mut self,
        variables_reference: i64,
        name: &str,
        value_expression: &str,
        call_frame_id: &str,
        variables: &mut VariableRegistry,
        cdp: &impl CdpClient,
    ) -> Result<String, EvalError> {
        let evaluated = cdp.evaluate_on_call_frame(call_frame_id, value_expression, true, false).await?;
        if let Some(exception) = evaluated.exception_details {
            return Err(EvalError::EvaluateFailed(exception.text));
        }
        Ok(variables.set_value(variables_reference, name, evaluated.result, cdp).await?)
    }

    /// Completions for `text`: if it has a leading expression before the
    /// last `.`, walk its prototype chain; otherwise flatten the active
    /// frame's scope variable names.
    pub async fn completions(&self, text: &str, frame_id: Option<i64>, stack: &StackInspector, cdp: &impl CdpClient) -> Result<Vec<String>, EvalError> {
        match split_before_last_dot(text) {
            Some(expr) => self.complete_member_access(expr, frame_id, stack, cdp).await,
            None => self.complete_scope_variables(frame_id, stack, cdp).await,
        }
    }

    async fn complete_member_access(&self, expr: &str, frame_id: Option<i64>, stack: &StackInspector, cdp: &impl CdpClient) -> Result<Vec<String>, EvalError> {
        const WALK_PROTOTYPE_CHAIN: &str =
            "(function(x){var a=[];for(var o=x;o!==null&&typeof o!=='undefined';o=o.__proto__){a.push(Object.getOwnPropertyNames(o))};return a})";
        let call_expression = format!("{WALK_PROTOTYPE_CHAIN}({expr})");

        let call_frame_id = frame_id.and_then(|id| stack.call_frame(id)).map(|f| f.call_frame_id.clone());
        let result = match &call_frame_id {
            Some(id) => cdp.evaluate_on_call_frame(id, &call_expression, true, false).await?,
            None => cdp.evaluate(&call_expression, true).await?,
        };

        if let Some(exception) = result.exception_details {
            return Err(EvalError::EvaluateFailed(exception.text));
        }

        let mut names = BTreeSet::new();
        if let Some(serde_json::Value::Array(groups)) = &result.result.value {
            for group in groups {
                let serde_json::Value::Array(items) = group else { continue };
                for item in items {
                    if let serde_json::Value::String(name) = item {
                        if !is_indexed_prop_name(name) {
                            names.insert(name.clone());
                        }
                    }
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    async fn complete_scope_variables(&self, frame_id: Option<i64>, stack: &StackInspector, cdp: &impl CdpClient) -> Result<Vec<String>, EvalError> {
        let Some(call_frame) = frame_id.and_then(|id| stack.call_frame(id)) else {
            return Ok(Vec::new());
        };

        let mut names = BTreeSet::new();
        for scope in &call_frame.scope_chain {
            let Some(object_id) = &scope.object.object_id else { continue };
            let Ok(properties) = cdp.get_properties(object_id, true, false).await else { continue };
            for descriptor in properties.result {
                if !is_indexed_prop_name(&descriptor.name) {
                    names.insert(descriptor.name);
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Restarts `frame_id` and immediately steps in. The caller is
    /// responsible for tagging the next stopped event `frame_entry`.
    pub async fn restart_frame(&self, frame_id: i64, stack: &StackInspector, cdp: &impl CdpClient) -> Result<(), EvalError> {
        let call_frame = stack.call_frame(frame_id).ok_or(EvalError::StackFrameNotValid)?;
        cdp.restart_frame(&call_frame.call_frame_id).await?;
        cdp.step_into().await?;
        Ok(())
    }
}

fn split_before_last_dot(text: &str) -> Option<&str> {
    let idx = text.rfind('.')?;
    let prefix = &text[..idx];
    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

fn truncate_source(source: &str) -> String {
    if source.chars().count() <= SOURCE_TRUNCATE_LIMIT {
        return source.to_string();
    }
    let mut truncated: String = source.chars().take(SOURCE_TRUNCATE_LIMIT).collect();
    truncated.push_str("[⋯]");
    truncated
}
