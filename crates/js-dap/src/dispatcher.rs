//! Command routing: turns a [`Request`] into the corresponding [`DebugAdapter`]
//! call and a [`Response`]. Every handler here does the same three things -
//! parse `request.arguments` into the typed argument struct, call the
//! matching adapter method, and fold the `Result` into a success or failure
//! response. Unknown commands fail instead of panicking; a client sending one
//! is a protocol violation, not a reason to tear down the session.

use crate::{DapError, DebugAdapter, LaunchTarget};
use js_dap_cdp::CdpClient;
use js_dap_cdp::transform::{PathTransformer, SourceMapTransformer};
use js_dap_protocol::{
    AttachRequestArguments, CompletionsArguments, ContinueArguments, DisconnectArguments,
    EvaluateArguments, InitializeRequestArguments, LaunchRequestArguments, NextArguments,
    PauseArguments, Request, Response, RestartFrameArguments, ScopesArguments,
    SetBreakpointsArguments, SetExceptionBreakpointsArguments, SetVariableArguments,
    SourceArguments, StackTraceArguments, StepInArguments, StepOutArguments,
    ToggleSkipFileStatusArguments, VariablesArguments,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

fn parse_args<T: DeserializeOwned + Default>(arguments: Option<Value>) -> Result<T, DapError> {
    match arguments {
        Some(value) => serde_json::from_value(value)
            .map_err(|err| DapError::EvaluateFailed(format!("invalid arguments: {err}"))),
        None => Ok(T::default()),
    }
}

fn require_args<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, DapError> {
    let value = arguments
        .ok_or_else(|| DapError::EvaluateFailed("missing arguments".to_string()))?;
    serde_json::from_value(value)
        .map_err(|err| DapError::EvaluateFailed(format!("invalid arguments: {err}")))
}

/// Route one request to the adapter and build its response. The response's
/// own `seq` is drawn from the adapter's shared counter, the same one
/// `on_cdp_event`-derived events use, so the client sees one monotonically
/// increasing sequence across responses and events as the protocol expects.
pub async fn dispatch<C, P, M>(
    adapter: &mut DebugAdapter<C, P, M>,
    target: &impl LaunchTarget,
    request: Request,
) -> Response
where
    C: CdpClient,
    P: PathTransformer,
    M: SourceMapTransformer,
{
    let request_seq = request.seq;
    let command = request.command.clone();
    let result = dispatch_inner(adapter, target, request).await;
    let seq = adapter.next_seq();
    match result {
        Ok(body) => Response::success(seq, request_seq, command, body),
        Err(err) => Response::failure(seq, request_seq, command, err.to_string()),
    }
}

async fn dispatch_inner<C, P, M>(
    adapter: &mut DebugAdapter<C, P, M>,
    target: &impl LaunchTarget,
    request: Request,
) -> Result<Value, DapError>
where
    C: CdpClient,
    P: PathTransformer,
    M: SourceMapTransformer,
{
    let Request { command, arguments, .. } = request;
    match command.as_str() {
        "initialize" => {
            let args: InitializeRequestArguments = parse_args(arguments)?;
            to_value(adapter.initialize(&args)?)
        }
        "launch" => {
            let args: LaunchRequestArguments = parse_args(arguments)?;
            adapter.launch(&args, target).await?;
            Ok(Value::Null)
        }
        "attach" => {
            let args: AttachRequestArguments = parse_args(arguments)?;
            adapter.attach(&args).await?;
            Ok(Value::Null)
        }
        "disconnect" => {
            let args: DisconnectArguments = parse_args(arguments)?;
            adapter.disconnect(&args).await?;
            Ok(Value::Null)
        }
        "terminate" => {
            let args = DisconnectArguments { terminate_debuggee: true, restart: false };
            adapter.disconnect(&args).await?;
            Ok(Value::Null)
        }
        "configurationDone" => Ok(Value::Null),
        "setBreakpoints" => {
            let args: SetBreakpointsArguments = require_args(arguments)?;
            to_value(adapter.set_breakpoints(&args).await?)
        }
        "setExceptionBreakpoints" => {
            let args: SetExceptionBreakpointsArguments = parse_args(arguments)?;
            adapter.set_exception_breakpoints(&args).await?;
            Ok(Value::Null)
        }
        "toggleSkipFileStatus" => {
            let args: ToggleSkipFileStatusArguments = require_args(arguments)?;
            adapter.toggle_skip_file_status(&args).await?;
            Ok(Value::Null)
        }
        "continue" => {
            let args: ContinueArguments = require_args(arguments)?;
            to_value(adapter.continue_(&args).await?)
        }
        "next" => {
            let args: NextArguments = require_args(arguments)?;
            adapter.next(&args).await?;
            Ok(Value::Null)
        }
        "stepIn" => {
            let args: StepInArguments = require_args(arguments)?;
            adapter.step_in(&args).await?;
            Ok(Value::Null)
        }
        "stepOut" => {
            let args: StepOutArguments = require_args(arguments)?;
            adapter.step_out(&args).await?;
            Ok(Value::Null)
        }
        "pause" => {
            let args: PauseArguments = require_args(arguments)?;
            adapter.pause(&args).await?;
            Ok(Value::Null)
        }
        "restartFrame" => {
            let args: RestartFrameArguments = require_args(arguments)?;
            adapter.restart_frame(&args).await?;
            Ok(Value::Null)
        }
        "threads" => to_value(adapter.threads()),
        "stackTrace" => {
            let args: StackTraceArguments = require_args(arguments)?;
            to_value(adapter.stack_trace(&args).await?)
        }
        "scopes" => {
            let args: ScopesArguments = require_args(arguments)?;
            to_value(adapter.scopes(&args)?)
        }
        "variables" => {
            let args: VariablesArguments = require_args(arguments)?;
            to_value(adapter.variables(&args).await?)
        }
        "setVariable" => {
            let args: SetVariableArguments = require_args(arguments)?;
            to_value(adapter.set_variable(&args).await?)
        }
        "source" => {
            let args: SourceArguments = require_args(arguments)?;
            to_value(adapter.source(&args).await?)
        }
        "evaluate" => {
            let args: EvaluateArguments = require_args(arguments)?;
            to_value(adapter.evaluate(&args).await?)
        }
        "completions" => {
            let args: CompletionsArguments = require_args(arguments)?;
            to_value(adapter.completions(&args).await?)
        }
        other => Err(DapError::EvaluateFailed(format!("unknown command: {other}"))),
    }
}

fn to_value(body: impl serde::Serialize) -> Result<Value, DapError> {
    serde_json::to_value(body)
        .map_err(|err| DapError::EvaluateFailed(format!("failed to serialize response: {err}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::FakeCdp;
    use js_dap_cdp::transform::{IdentityPathTransformer, NoSourceMapTransformer};
    use serde_json::json;

    struct NullTarget;
    impl LaunchTarget for NullTarget {
        async fn launch(&self, _args: &LaunchRequestArguments) -> Result<(), DapError> {
            Ok(())
        }
    }

    fn new_adapter() -> DebugAdapter<FakeCdp, IdentityPathTransformer, NoSourceMapTransformer> {
        DebugAdapter::new(FakeCdp::default(), IdentityPathTransformer, NoSourceMapTransformer, &[], &[], false)
    }

    #[tokio::test]
    async fn unknown_command_fails_instead_of_panicking() {
        let mut adapter = new_adapter();
        let request = Request { seq: 1, command: "bogus".to_string(), arguments: None };
        let response = dispatch(&mut adapter, &NullTarget, request).await;
        assert!(!response.success);
    }

    #[tokio::test]
    async fn initialize_round_trips_through_json_arguments() {
        let mut adapter = new_adapter();
        let request = Request {
            seq: 1,
            command: "initialize".to_string(),
            arguments: Some(json!({ "adapterId": "js-dap", "pathFormat": "path" })),
        };
        let response = dispatch(&mut adapter, &NullTarget, request).await;
        assert!(response.success);
        assert!(response.body.is_some());
    }

    #[tokio::test]
    async fn threads_ignores_absent_arguments() {
        let mut adapter = new_adapter();
        let request = Request { seq: 2, command: "threads".to_string(), arguments: None };
        let response = dispatch(&mut adapter, &NullTarget, request).await;
        assert!(response.success);
    }
}
