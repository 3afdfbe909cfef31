//! The adapter-level error surface. Every error kind a request handler can
//! fail with, including the ones that originate deeper in the stack and are
//! folded in here so `handle_request` has one place to turn an error into a
//! DAP failure response.

use js_dap_breakpoint::BreakpointError;
use js_dap_eval::EvalError;
use js_dap_variables::VariablesError;

#[derive(Debug, thiserror::Error)]
pub enum DapError {
    #[error("initialize requires pathFormat = \"path\"")]
    PathFormatUnsupported,
    #[error("attach requires a port")]
    MissingAttachPort,
    #[error("stack frame is not valid")]
    StackFrameNotValid,
    #[error("the runtime is not connected")]
    RuntimeNotConnected,
    #[error("sourceReference does not point at a live source")]
    SourceRequestIllegalHandle,
    #[error("setValue is not supported for this variable")]
    SetValueNotSupported,
    #[error("{0}")]
    EvaluateFailed(String),
    #[error("breakpoint ignored: no mapping for this position")]
    BreakpointIgnoredNoMapping,
    #[error("breakpoint ignored: no target path")]
    BreakpointIgnoredNoTargetPath,
    #[error("setBreakpoints timed out")]
    BreakpointsTimeout,
    #[error("invalid hit condition: {0}")]
    InvalidHitCondition(String),
    #[error("variable is not available")]
    ReferenceUnavailable,
    #[error("launch failed: {0}")]
    LaunchFailed(String),
}

impl From<BreakpointError> for DapError {
    fn from(err: BreakpointError) -> Self {
        match err {
            BreakpointError::NoTargetPath => Self::BreakpointIgnoredNoTargetPath,
            BreakpointError::BreakpointsTimeout => Self::BreakpointsTimeout,
            BreakpointError::InvalidHitCondition(expr) => Self::InvalidHitCondition(expr),
            BreakpointError::Cdp(_) => Self::RuntimeNotConnected,
        }
    }
}

impl From<VariablesError> for DapError {
    fn from(err: VariablesError) -> Self {
        match err {
            VariablesError::InvalidHandle => Self::SourceRequestIllegalHandle,
            VariablesError::SetValueNotSupported => Self::SetValueNotSupported,
            VariablesError::Cdp(_) => Self::RuntimeNotConnected,
        }
    }
}

impl From<EvalError> for DapError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::StackFrameNotValid => Self::StackFrameNotValid,
            EvalError::EvaluateFailed(msg) => Self::EvaluateFailed(msg),
            EvalError::ReferenceUnavailable => Self::ReferenceUnavailable,
            EvalError::Variables(inner) => inner.into(),
            EvalError::Cdp(_) => Self::RuntimeNotConnected,
        }
    }
}
