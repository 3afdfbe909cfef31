//! Breakpoint manager: the `setBreakpoints` contract, pending breakpoints
//! for sources with no resolvable target yet, and hit-condition bookkeeping.
//!
//! CDP has no notion of "stop after the Nth hit" — this manager tracks hit
//! counts itself and tells the pause coordinator whether a breakpoint that
//! fired actually warrants a stop.

use js_dap_cdp::transform::{LineColumnTransformer, PathTransformer, SourceMapTransformer};
use js_dap_cdp::{CdpClient, CdpError};
use js_dap_protocol::{Breakpoint, SetBreakpointsArguments, Source, SourceBreakpoint, SetBreakpointsResponseBody};
use js_dap_scripts::ScriptRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum BreakpointError {
    #[error("source has no path and no resolvable target")]
    NoTargetPath,
    #[error("setBreakpoints timed out")]
    BreakpointsTimeout,
    #[error("invalid hit condition: {0}")]
    InvalidHitCondition(String),
    #[error(transparent)]
    Cdp(#[from] CdpError),
}

/// A breakpoint request held back because its source has no target URL yet
/// (the script hasn't been parsed, or its source map hasn't resolved). Kept
/// so it can be replayed once a later `scriptParsed` makes the path known.
#[derive(Debug, Clone)]
pub struct PendingBreakpoint {
    pub source: Source,
    pub breakpoints: Vec<SourceBreakpoint>,
    pub client_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HitConditionOp {
    Gt,
    Ge,
    Eq,
    Lt,
    Le,
    Mod,
}

/// A compiled DAP `hitCondition` expression: `(>|>=|=|<|<=|%)? \s* [0-9]+`,
/// defaulting to `>=` when the operator is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitConditionPredicate {
    op: HitConditionOp,
    value: u64,
}

impl HitConditionPredicate {
    #[must_use]
    pub fn matches(&self, hit_count: u64) -> bool {
        match self.op {
            HitConditionOp::Gt => hit_count > self.value,
            HitConditionOp::Ge => hit_count >= self.value,
            HitConditionOp::Eq => hit_count == self.value,
            HitConditionOp::Lt => hit_count < self.value,
            HitConditionOp::Le => hit_count <= self.value,
            HitConditionOp::Mod => self.value != 0 && hit_count % self.value == 0,
        }
    }
}

struct HitConditionState {
    predicate: HitConditionPredicate,
    hit_count: u64,
}

#[allow(clippy::unwrap_used)]
static HIT_CONDITION_GRAMMAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(>=|<=|>|<|=|%)?\s*(\d+)\s*$").unwrap());

/// Parses a DAP `hitCondition` string, e.g. `"5"`, `">= 3"`, `"% 2"`.
pub fn parse_hit_condition(expr: &str) -> Result<HitConditionPredicate, BreakpointError> {
    let caps = HIT_CONDITION_GRAMMAR.captures(expr).ok_or_else(|| BreakpointError::InvalidHitCondition(expr.to_string()))?;
    let op = match caps.get(1).map(|m| m.as_str()) {
        None | Some(">=") => HitConditionOp::Ge,
        Some(">") => HitConditionOp::Gt,
        Some("=") => HitConditionOp::Eq,
        Some("<") => HitConditionOp::Lt,
        Some("<=") => HitConditionOp::Le,
        Some("%") => HitConditionOp::Mod,
        Some(_) => unreachable!("grammar only captures the operators matched above"),
    };
    let value: u64 = caps[2].parse().map_err(|_| BreakpointError::InvalidHitCondition(expr.to_string()))?;
    Ok(HitConditionPredicate { op, value })
}

/// Builds the regex CDP's `setBreakpointByUrl` matches the target URL with.
/// Anchored so a substring of another script's URL never matches.
fn derive_url_regex(url: &str) -> String {
    format!("^{}$", regex::escape(url))
}

/// Owns every breakpoint this adapter has asked CDP to install, the
/// pending breakpoints waiting on a target URL, and hit-condition state.
///
/// Holding this behind a single shared lock (an `Arc<tokio::sync::Mutex<_>>`
/// in the façade) for the full duration of [`Self::set_breakpoints`] is what
/// gives the "one `setBreakpoints` operation in flight at a time" guarantee
/// — the async mutex plays the role a serialized promise chain plays in a
/// single-threaded event loop, and unlike a `std::sync::Mutex` it never gets
/// poisoned by an error surfacing out of a held lock.
#[derive(Default)]
pub struct BreakpointManager {
    committed: HashMap<String, Vec<String>>,
    pending: HashMap<String, PendingBreakpoint>,
    hit_conditions: HashMap<String, HitConditionState>,
    next_client_id: i64,
}

impl BreakpointManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_client_id(&mut self) -> i64 {
        self.next_client_id += 1;
        self.next_client_id
    }

    /// A pending breakpoint registered under `authored_path`, if a prior
    /// call could not resolve a target URL for it. Removes it from the
    /// pending set; the caller is expected to replay it through
    /// [`Self::set_breakpoints`] now that a target is known.
    pub fn take_pending(&mut self, authored_path: &str) -> Option<PendingBreakpoint> {
        self.pending.remove(authored_path)
    }

    /// Records hits against already-installed breakpoints and reports
    /// whether any of them actually warrants a stop. A `hit_breakpoint_ids`
    /// entry with no installed hit condition always warrants a stop.
    pub fn should_pause_for_hits(&mut self, hit_breakpoint_ids: &[String]) -> bool {
        let mut should_pause = false;
        for id in hit_breakpoint_ids {
            match self.hit_conditions.get_mut(id) {
                Some(state) => {
                    state.hit_count += 1;
                    if state.predicate.matches(state.hit_count) {
                        should_pause = true;
                    }
                }
                None => should_pause = true,
            }
        }
        should_pause
    }

    /// Implements the DAP `setBreakpoints` request: clears whatever this
    /// target previously had committed, installs the new set, and reports
    /// verification status per breakpoint. Per-breakpoint failures (an
    /// unmapped source position, a rejected CDP condition) return an
    /// unverified entry rather than failing the whole call.
    pub async fn set_breakpoints(
        &mut self,
        args: &SetBreakpointsArguments,
        cdp: &impl CdpClient,
        registry: &ScriptRegistry,
        path: &impl PathTransformer,
        sourcemap: &impl SourceMapTransformer,
        line_col: LineColumnTransformer,
    ) -> Result<SetBreakpointsResponseBody, BreakpointError> {
        let Some(authored_path) = args.source.path.clone() else {
            return Err(BreakpointError::NoTargetPath);
        };

        let representative = sourcemap.map_to_generated(&authored_path, 0, 0).await;
        let has_sourcemap = representative.is_some();
        let candidate_path = representative.map(|m| m.path).unwrap_or_else(|| authored_path.clone());

        let Some(target_url) = path.to_target_url(&candidate_path) else {
            let ids: Vec<i64> = args.breakpoints.iter().map(|_| self.mint_client_id()).collect();
            self.pending.insert(
                authored_path.clone(),
                PendingBreakpoint { source: args.source.clone(), breakpoints: args.breakpoints.clone(), client_ids: ids.clone() },
            );
            return Ok(SetBreakpointsResponseBody {
                breakpoints: ids
                    .into_iter()
                    .map(|id| Breakpoint {
                        id: Some(id),
                        verified: false,
                        message: Some("breakpointIgnoredNoTargetPath".to_string()),
                        source: Some(args.source.clone()),
                        line: None,
                        column: None,
                    })
                    .collect(),
            });
        };

        let operation = self.clear_and_add(&target_url, &authored_path, has_sourcemap, &args.breakpoints, &args.source, cdp, registry, sourcemap, line_col);
        match tokio::time::timeout(std::time::Duration::from_millis(3000), operation).await {
            Err(_elapsed) => Err(BreakpointError::BreakpointsTimeout),
            Ok(breakpoints) => Ok(SetBreakpointsResponseBody { breakpoints }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn clear_and_add(
        &mut self,
        target_url: &str,
        authored_path: &str,
        has_sourcemap: bool,
        breakpoints: &[SourceBreakpoint],
        source: &Source,
        cdp: &impl CdpClient,
        registry: &ScriptRegistry,
        sourcemap: &impl SourceMapTransformer,
        line_col: LineColumnTransformer,
    ) -> Vec<Breakpoint> {
        if let Some(old_ids) = self.committed.remove(target_url) {
            for id in old_ids {
                self.hit_conditions.remove(&id);
                if let Err(err) = cdp.remove_breakpoint(&id).await {
                    tracing::warn!(breakpoint_id = %id, error = %err, "failed to remove stale breakpoint");
                }
            }
        }

        let is_placeholder = ScriptRegistry::is_placeholder_url(target_url);
        let mut new_ids = Vec::with_capacity(breakpoints.len());
        let mut results = Vec::with_capacity(breakpoints.len());

        for sb in breakpoints {
            let client_id = self.mint_client_id();
            let cdp_line = line_col.client_line_to_cdp(sb.line);
            let cdp_column = sb.column.map(|c| line_col.client_column_to_cdp(c));

            let (add_line, add_column) = if has_sourcemap {
                match sourcemap.map_to_generated(authored_path, cdp_line, cdp_column.unwrap_or(0)).await {
                    Some(mapped) => (mapped.line, Some(mapped.column)),
                    None => {
                        results.push(Breakpoint {
                            id: Some(client_id),
                            verified: false,
                            message: Some("breakpointIgnoredNoMapping".to_string()),
                            source: Some(source.clone()),
                            line: Some(sb.line),
                            column: sb.column,
                        });
                        continue;
                    }
                }
            } else {
                (cdp_line, cdp_column)
            };

            let hit_predicate = match &sb.hit_condition {
                Some(raw) => match parse_hit_condition(raw) {
                    Ok(predicate) => Some(predicate),
                    Err(err) => {
                        results.push(Breakpoint {
                            id: Some(client_id),
                            verified: false,
                            message: Some(err.to_string()),
                            source: Some(source.clone()),
                            line: Some(sb.line),
                            column: sb.column,
                        });
                        continue;
                    }
                },
                None => None,
            };

            let add_result = if is_placeholder {
                match registry.by_url(target_url) {
                    Some(script) => cdp
                        .set_breakpoint(&script.script_id, add_line, add_column, sb.condition.as_deref())
                        .await
                        .map(|r| (r.breakpoint_id, r.actual_location)),
                    None => Err(CdpError::Protocol("no script registered for placeholder url".to_string())),
                }
            } else {
                let url_regex = derive_url_regex(target_url);
                cdp.set_breakpoint_by_url(&url_regex, add_line, add_column, sb.condition.as_deref())
                    .await
                    .map(|r| (r.breakpoint_id, r.locations.into_iter().next()))
            };

            match add_result {
                Ok((breakpoint_id, location)) => {
                    new_ids.push(breakpoint_id.clone());
                    if let Some(predicate) = hit_predicate {
                        self.hit_conditions.insert(breakpoint_id.clone(), HitConditionState { predicate, hit_count: 0 });
                    }
                    let (line, column) = match &location {
                        Some(loc) => (Some(line_col.cdp_line_to_client(loc.line_number)), loc.column_number.map(|c| line_col.cdp_column_to_client(c))),
                        None => (Some(sb.line), sb.column),
                    };
                    results.push(Breakpoint { id: Some(client_id), verified: true, message: None, source: Some(source.clone()), line, column });
                }
                Err(err) => {
                    results.push(Breakpoint {
                        id: Some(client_id),
                        verified: false,
                        message: Some(err.to_string()),
                        source: Some(source.clone()),
                        line: Some(sb.line),
                        column: sb.column,
                    });
                }
            }
        }

        self.committed.insert(target_url.to_string(), new_ids);
        results
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use js_dap_cdp::transform::{IdentityPathTransformer, NoSourceMapTransformer};
    use js_dap_cdp::{CallArgument, EvaluateResult, GetPropertiesResult, PauseOnExceptionsState, ScriptPosition, SetBreakpointByUrlResult, SetBreakpointResult};
    use std::sync::Mutex;

    #[test]
    fn hit_condition_defaults_to_greater_or_equal() {
        let p = parse_hit_condition("5").unwrap();
        assert!(!p.matches(4));
        assert!(p.matches(5));
        assert!(p.matches(6));
    }

    #[test]
    fn hit_condition_parses_every_operator() {
        assert!(parse_hit_condition("> 2").unwrap().matches(3));
        assert!(!parse_hit_condition("> 2").unwrap().matches(2));
        assert!(parse_hit_condition("= 2").unwrap().matches(2));
        assert!(!parse_hit_condition("= 2").unwrap().matches(3));
        assert!(parse_hit_condition("<= 2").unwrap().matches(2));
        assert!(parse_hit_condition("< 2").unwrap().matches(1));
        assert!(parse_hit_condition("% 3").unwrap().matches(6));
        assert!(!parse_hit_condition("% 3").unwrap().matches(5));
    }

    #[test]
    fn hit_condition_rejects_garbage() {
        assert!(parse_hit_condition("banana").is_err());
        assert!(parse_hit_condition("").is_err());
    }

    #[test]
    fn url_regex_is_anchored_and_escaped() {
        let re = derive_url_regex("http://localhost/app.js");
        let compiled = Regex::new(&re).unwrap();
        assert!(compiled.is_match("http://localhost/app.js"));
        assert!(!compiled.is_match("http://localhost/app.js.map"));
    }

    #[derive(Default)]
    struct FakeCdp {
        next_breakpoint_id: Mutex<u32>,
        removed: Mutex<Vec<String>>,
    }

    impl CdpClient for FakeCdp {
        async fn debugger_enable(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn runtime_enable(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn resume(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn step_over(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn step_into(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn step_out(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn pause(&self) -> Result<(), CdpError> {
            Ok(())
        }
        async fn set_breakpoint(&self, script_id: &str, line: i64, column: Option<i64>, _condition: Option<&str>) -> Result<SetBreakpointResult, CdpError> {
            let mut next = self.next_breakpoint_id.lock().unwrap();
            *next += 1;
            Ok(SetBreakpointResult {
                breakpoint_id: format!("bp-{next}"),
                actual_location: Some(js_dap_cdp::Location { script_id: script_id.to_string(), line_number: line, column_number: column }),
            })
        }
        async fn set_breakpoint_by_url(&self, _url_regex: &str, line: i64, column: Option<i64>, _condition: Option<&str>) -> Result<SetBreakpointByUrlResult, CdpError> {
            let mut next = self.next_breakpoint_id.lock().unwrap();
            *next += 1;
            Ok(SetBreakpointByUrlResult {
                breakpoint_id: format!("bp-{next}"),
                locations: vec![js_dap_cdp::Location { script_id: "1".to_string(), line_number: line, column_number: column }],
            })
        }
        async fn remove_breakpoint(&self, breakpoint_id: &str) -> Result<(), CdpError> {
            self.removed.lock().unwrap().push(breakpoint_id.to_string());
            Ok(())
        }
        async fn set_pause_on_exceptions(&self, _state: PauseOnExceptionsState) -> Result<(), CdpError> {
            Ok(())
        }
        async fn set_blackbox_patterns(&self, _patterns: &[String]) -> Result<(), CdpError> {
            Ok(())
        }
        async fn set_blackboxed_ranges(&self, _script_id: &str, _positions: &[ScriptPosition]) -> Result<(), CdpError> {
            Ok(())
        }
        async fn evaluate_on_call_frame(&self, _call_frame_id: &str, _expression: &str, _silent: bool, _generate_preview: bool) -> Result<EvaluateResult, CdpError> {
            unreachable!("not exercised by breakpoint manager tests")
        }
        async fn evaluate(&self, _expression: &str, _return_by_value: bool) -> Result<EvaluateResult, CdpError> {
            unreachable!("not exercised by breakpoint manager tests")
        }
        async fn set_variable_value(&self, _scope_number: i64, _variable_name: &str, _new_value: CallArgument, _call_frame_id: &str) -> Result<(), CdpError> {
            unreachable!("not exercised by breakpoint manager tests")
        }
        async fn restart_frame(&self, _call_frame_id: &str) -> Result<(), CdpError> {
            unreachable!("not exercised by breakpoint manager tests")
        }
        async fn get_script_source(&self, _script_id: &str) -> Result<String, CdpError> {
            unreachable!("not exercised by breakpoint manager tests")
        }
        async fn get_properties(&self, _object_id: &str, _own_properties: bool, _accessor_properties_only: bool) -> Result<GetPropertiesResult, CdpError> {
            unreachable!("not exercised by breakpoint manager tests")
        }
        async fn call_function_on(&self, _object_id: &str, _function_declaration: &str, _arguments: Vec<CallArgument>, _return_by_value: bool) -> Result<EvaluateResult, CdpError> {
            unreachable!("not exercised by breakpoint manager tests")
        }
        async fn release_object(&self, _object_id: &str) -> Result<(), CdpError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn unresolvable_target_registers_pending_and_returns_unverified() {
        let mut mgr = BreakpointManager::new();
        let cdp = FakeCdp::default();
        let registry = ScriptRegistry::new();
        let args = SetBreakpointsArguments {
            source: Source::from_path("/app/src/index.ts"),
            breakpoints: vec![SourceBreakpoint { line: 10, column: None, condition: None, hit_condition: None, log_message: None }],
        };

        struct NoTarget;
        impl PathTransformer for NoTarget {
            fn to_target_url(&self, _client_path: &str) -> Option<String> {
                None
            }
            fn to_client_path(&self, _target_url: &str) -> Option<String> {
                None
            }
        }

        let body = mgr
            .set_breakpoints(&args, &cdp, &registry, &NoTarget, &NoSourceMapTransformer, LineColumnTransformer::default())
            .await
            .unwrap();
        assert!(!body.breakpoints[0].verified);
        assert_eq!(body.breakpoints[0].message.as_deref(), Some("breakpointIgnoredNoTargetPath"));
        assert!(mgr.take_pending("/app/src/index.ts").is_some());
    }

    #[tokio::test]
    async fn resolvable_target_installs_and_verifies() {
        let mut mgr = BreakpointManager::new();
        let cdp = FakeCdp::default();
        let registry = ScriptRegistry::new();
        let args = SetBreakpointsArguments {
            source: Source::from_path("/app/src/index.js"),
            breakpoints: vec![SourceBreakpoint { line: 10, column: None, condition: None, hit_condition: Some("3".to_string()), log_message: None }],
        };

        let body = mgr
            .set_breakpoints(&args, &cdp, &registry, &IdentityPathTransformer, &NoSourceMapTransformer, LineColumnTransformer::default())
            .await
            .unwrap();
        assert!(body.breakpoints[0].verified);
        assert_eq!(body.breakpoints[0].line, Some(10));
    }

    #[tokio::test]
    async fn re_setting_breakpoints_removes_the_previous_set_one_at_a_time() {
        let mut mgr = BreakpointManager::new();
        let cdp = FakeCdp::default();
        let registry = ScriptRegistry::new();
        let args = SetBreakpointsArguments {
            source: Source::from_path("/app/src/index.js"),
            breakpoints: vec![
                SourceBreakpoint { line: 10, column: None, condition: None, hit_condition: None, log_message: None },
                SourceBreakpoint { line: 20, column: None, condition: None, hit_condition: None, log_message: None },
            ],
        };
        mgr.set_breakpoints(&args, &cdp, &registry, &IdentityPathTransformer, &NoSourceMapTransformer, LineColumnTransformer::default())
            .await
            .unwrap();

        let second = SetBreakpointsArguments { source: args.source.clone(), breakpoints: vec![] };
        mgr.set_breakpoints(&second, &cdp, &registry, &IdentityPathTransformer, &NoSourceMapTransformer, LineColumnTransformer::default())
            .await
            .unwrap();

        assert_eq!(cdp.removed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_pause_for_hits_respects_installed_predicate() {
        let mut mgr = BreakpointManager::new();
        let cdp = FakeCdp::default();
        let registry = ScriptRegistry::new();
        let args = SetBreakpointsArguments {
            source: Source::from_path("/app/src/index.js"),
            breakpoints: vec![SourceBreakpoint { line: 10, column: None, condition: None, hit_condition: Some("% 2".to_string()), log_message: None }],
        };
        mgr.set_breakpoints(&args, &cdp, &registry, &IdentityPathTransformer, &NoSourceMapTransformer, LineColumnTransformer::default())
            .await
            .unwrap();

        assert!(!mgr.should_pause_for_hits(&["bp-1".to_string()]));
        assert!(mgr.should_pause_for_hits(&["bp-1".to_string()]));
    }

    #[tokio::test]
    async fn unknown_hit_ids_always_warrant_a_stop() {
        let mut mgr = BreakpointManager::new();
        assert!(mgr.should_pause_for_hits(&["never-installed".to_string()]));
    }
}
