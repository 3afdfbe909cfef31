//! Chrome DevTools Protocol types and the external collaborator interfaces.
//!
//! This crate defines no CDP transport. The WebSocket connection, message
//! framing, and request/response correlation are owned by whoever embeds
//! this adapter core; this crate only specifies the shape of what flows
//! across that boundary: [`CdpClient`] for outbound commands, [`CdpEvent`]
//! for inbound events, and the [`PathTransformer`] / [`SourceMapTransformer`]
//! interfaces the script registry and breakpoint manager consume.

use serde::{Deserialize, Serialize};
use std::future::Future;

pub mod transform;
pub use transform::{IdentityPathTransformer, LineColumnTransformer, NoSourceMapTransformer, PathTransformer, SourceMapTransformer};

/// Errors a `CdpClient` implementation reports back to the core.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CdpError {
    #[error("CDP connection is not open")]
    NotConnected,
    #[error("CDP command failed: {0}")]
    Protocol(String),
    #[error("CDP command timed out")]
    Timeout,
}

// ---------------------------------------------------------------------
// Shared value types
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<ObjectPreview>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPreview {
    #[serde(default)]
    pub overflow: bool,
    #[serde(default)]
    pub properties: Vec<PropertyPreview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPreview {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl CallArgument {
    #[must_use]
    pub fn from_remote_object(object: &RemoteObject) -> Self {
        match &object.object_id {
            Some(id) => Self { value: None, object_id: Some(id.clone()) },
            None => Self { value: object.value.clone(), object_id: None },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<RemoteObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<RemoteObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<RemoteObject>,
    #[serde(default = "default_true")]
    pub enumerable: bool,
    #[serde(default)]
    pub is_own: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub script_id: String,
    pub line_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptPosition {
    pub line_number: i64,
    pub column_number: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(rename = "type")]
    pub type_: String,
    pub object: RemoteObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    pub call_frame_id: String,
    pub function_name: String,
    pub location: Location,
    pub url: String,
    pub scope_chain: Vec<Scope>,
    #[serde(rename = "this")]
    pub this_object: RemoteObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<RemoteObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub exception_id: i64,
    pub text: String,
    pub line_number: i64,
    pub column_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteObject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOnExceptionsState {
    All,
    Uncaught,
    None,
}

impl PauseOnExceptionsState {
    #[must_use]
    pub fn as_cdp_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Uncaught => "uncaught",
            Self::None => "none",
        }
    }
}

// ---------------------------------------------------------------------
// Command results
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointResult {
    pub breakpoint_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_location: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlResult {
    pub breakpoint_id: String,
    #[serde(default)]
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertiesResult {
    pub result: Vec<PropertyDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    pub result: RemoteObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

// ---------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedEvent {
    pub script_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedEvent {
    pub call_frames: Vec<CallFrame>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RemoteObject>,
    #[serde(default)]
    pub hit_breakpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointResolvedEvent {
    pub breakpoint_id: String,
    pub location: Location,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleApiCalledEvent {
    #[serde(rename = "type")]
    pub type_: String,
    pub args: Vec<RemoteObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionThrownEvent {
    pub exception_details: ExceptionDetails,
}

/// Every inbound CDP event the core reacts to. The transport owner decodes
/// raw CDP JSON into one of these and calls the façade's event handler.
#[derive(Debug, Clone)]
pub enum CdpEvent {
    ScriptParsed(ScriptParsedEvent),
    Paused(PausedEvent),
    Resumed,
    BreakpointResolved(BreakpointResolvedEvent),
    ConsoleApiCalled(ConsoleApiCalledEvent),
    ExceptionThrown(ExceptionThrownEvent),
    ExecutionContextsCleared,
    InspectorDetached { reason: String },
}

// ---------------------------------------------------------------------
// Outbound command surface
// ---------------------------------------------------------------------

/// The outbound half of the CDP boundary: every command the core issues
/// against the debuggee's `Debugger` and `Runtime` domains.
///
/// Implementations own the WebSocket, framing and request/response
/// correlation; this trait only names the commands this core needs.
pub trait CdpClient: Send + Sync {
    fn debugger_enable(&self) -> impl Future<Output = Result<(), CdpError>> + Send;
    fn runtime_enable(&self) -> impl Future<Output = Result<(), CdpError>> + Send;

    fn resume(&self) -> impl Future<Output = Result<(), CdpError>> + Send;
    fn step_over(&self) -> impl Future<Output = Result<(), CdpError>> + Send;
    fn step_into(&self) -> impl Future<Output = Result<(), CdpError>> + Send;
    fn step_out(&self) -> impl Future<Output = Result<(), CdpError>> + Send;
    fn pause(&self) -> impl Future<Output = Result<(), CdpError>> + Send;

    fn set_breakpoint(
        &self,
        script_id: &str,
        line: i64,
        column: Option<i64>,
        condition: Option<&str>,
    ) -> impl Future<Output = Result<SetBreakpointResult, CdpError>> + Send;

    fn set_breakpoint_by_url(
        &self,
        url_regex: &str,
        line: i64,
        column: Option<i64>,
        condition: Option<&str>,
    ) -> impl Future<Output = Result<SetBreakpointByUrlResult, CdpError>> + Send;

    fn remove_breakpoint(&self, breakpoint_id: &str) -> impl Future<Output = Result<(), CdpError>> + Send;

    fn set_pause_on_exceptions(&self, state: PauseOnExceptionsState) -> impl Future<Output = Result<(), CdpError>> + Send;

    fn set_blackbox_patterns(&self, patterns: &[String]) -> impl Future<Output = Result<(), CdpError>> + Send;

    fn set_blackboxed_ranges(
        &self,
        script_id: &str,
        positions: &[ScriptPosition],
    ) -> impl Future<Output = Result<(), CdpError>> + Send;

    fn evaluate_on_call_frame(
        &self,
        call_frame_id: &str,
        expression: &str,
        silent: bool,
        generate_preview: bool,
    ) -> impl Future<Output = Result<EvaluateResult, CdpError>> + Send;

    fn evaluate(&self, expression: &str, return_by_value: bool) -> impl Future<Output = Result<EvaluateResult, CdpError>> + Send;

    fn set_variable_value(
        &self,
        scope_number: i64,
        variable_name: &str,
        new_value: CallArgument,
        call_frame_id: &str,
    ) -> impl Future<Output = Result<(), CdpError>> + Send;

    fn restart_frame(&self, call_frame_id: &str) -> impl Future<Output = Result<(), CdpError>> + Send;

    fn get_script_source(&self, script_id: &str) -> impl Future<Output = Result<String, CdpError>> + Send;

    fn get_properties(
        &self,
        object_id: &str,
        own_properties: bool,
        accessor_properties_only: bool,
    ) -> impl Future<Output = Result<GetPropertiesResult, CdpError>> + Send;

    fn call_function_on(
        &self,
        object_id: &str,
        function_declaration: &str,
        arguments: Vec<CallArgument>,
        return_by_value: bool,
    ) -> impl Future<Output = Result<EvaluateResult, CdpError>> + Send;

    fn release_object(&self, object_id: &str) -> impl Future<Output = Result<(), CdpError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_argument_prefers_object_id_over_value() {
        let obj = RemoteObject {
            type_: "object".to_string(),
            object_id: Some("oid-1".to_string()),
            value: Some(serde_json::json!({"x": 1})),
            ..Default::default()
        };
        let arg = CallArgument::from_remote_object(&obj);
        assert_eq!(arg.object_id.as_deref(), Some("oid-1"));
        assert!(arg.value.is_none());
    }

    #[test]
    fn call_argument_falls_back_to_value_for_primitives() {
        let obj = RemoteObject { type_: "number".to_string(), value: Some(serde_json::json!(42)), ..Default::default() };
        let arg = CallArgument::from_remote_object(&obj);
        assert_eq!(arg.value, Some(serde_json::json!(42)));
        assert!(arg.object_id.is_none());
    }

    #[test]
    fn pause_on_exceptions_state_serializes_to_cdp_strings() {
        assert_eq!(PauseOnExceptionsState::All.as_cdp_str(), "all");
        assert_eq!(PauseOnExceptionsState::Uncaught.as_cdp_str(), "uncaught");
        assert_eq!(PauseOnExceptionsState::None.as_cdp_str(), "none");
    }
}
