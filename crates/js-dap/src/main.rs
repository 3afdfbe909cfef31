//! Debug adapter entry point.
//!
//! This binary wires the façade to a transport (stdio or socket) and a CDP
//! connection. Actual CDP transport and launch mechanics live outside this
//! core - [`NullCdpClient`] and [`NullLaunchTarget`] are stand-ins so the
//! binary links and runs end to end; an embedder replaces them with a real
//! CDP socket and a real process/launch implementation.

use clap::Parser;
use js_dap::configuration::{DapConfig, DapMode, DapServer};
use js_dap::{DapError, DebugAdapter, LaunchTarget};
use js_dap_cdp::transform::{IdentityPathTransformer, NoSourceMapTransformer};
use js_dap_cdp::{
    CallArgument, CdpClient, CdpError, EvaluateResult, GetPropertiesResult, PauseOnExceptionsState,
    ScriptPosition, SetBreakpointByUrlResult, SetBreakpointResult,
};
use js_dap_protocol::LaunchRequestArguments;
use std::io;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

/// `js-dap`: debug adapter core for Node-style JavaScript runtimes speaking CDP.
#[derive(Parser, Debug)]
#[command(name = "js-dap", version, about, long_about = None)]
struct Args {
    /// Use stdio for communication (default).
    #[arg(long, default_value_t = true)]
    stdio: bool,

    /// Use a TCP socket for communication instead of stdio.
    #[arg(long, conflicts_with = "stdio")]
    socket: bool,

    /// Port to listen on (socket mode only).
    #[arg(long, default_value_t = 9229)]
    port: u16,

    /// Logging level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Workspace root used to resolve relative paths.
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    /// Enable smart-stepping over code with no source map mapping.
    #[arg(long, default_value_t = true)]
    smart_step: bool,
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

/// A [`CdpClient`] that has no runtime to talk to. Every call fails with
/// [`CdpError::NotConnected`], which the façade already turns into
/// `DapError::RuntimeNotConnected` at the handler boundary.
#[derive(Debug, Default)]
struct NullCdpClient;

impl CdpClient for NullCdpClient {
    async fn debugger_enable(&self) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn runtime_enable(&self) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn resume(&self) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn step_over(&self) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn step_into(&self) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn step_out(&self) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn pause(&self) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn set_breakpoint(
        &self,
        _script_id: &str,
        _line: i64,
        _column: Option<i64>,
        _condition: Option<&str>,
    ) -> Result<SetBreakpointResult, CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn set_breakpoint_by_url(
        &self,
        _url_regex: &str,
        _line: i64,
        _column: Option<i64>,
        _condition: Option<&str>,
    ) -> Result<SetBreakpointByUrlResult, CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn remove_breakpoint(&self, _breakpoint_id: &str) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn set_pause_on_exceptions(&self, _state: PauseOnExceptionsState) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn set_blackbox_patterns(&self, _patterns: &[String]) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn set_blackboxed_ranges(
        &self,
        _script_id: &str,
        _positions: &[ScriptPosition],
    ) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn evaluate_on_call_frame(
        &self,
        _call_frame_id: &str,
        _expression: &str,
        _silent: bool,
        _generate_preview: bool,
    ) -> Result<EvaluateResult, CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn evaluate(&self, _expression: &str, _return_by_value: bool) -> Result<EvaluateResult, CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn set_variable_value(
        &self,
        _scope_number: i64,
        _variable_name: &str,
        _new_value: CallArgument,
        _call_frame_id: &str,
    ) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn restart_frame(&self, _call_frame_id: &str) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn get_script_source(&self, _script_id: &str) -> Result<String, CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn get_properties(
        &self,
        _object_id: &str,
        _own_properties: bool,
        _accessor_properties_only: bool,
    ) -> Result<GetPropertiesResult, CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn call_function_on(
        &self,
        _object_id: &str,
        _function_declaration: &str,
        _arguments: Vec<CallArgument>,
        _return_by_value: bool,
    ) -> Result<EvaluateResult, CdpError> {
        Err(CdpError::NotConnected)
    }
    async fn release_object(&self, _object_id: &str) -> Result<(), CdpError> {
        Err(CdpError::NotConnected)
    }
}

/// A [`LaunchTarget`] that refuses every launch. Concrete launch mechanics
/// (spawning `node`, wiring its inspector socket) are the embedder's job.
struct NullLaunchTarget;

impl LaunchTarget for NullLaunchTarget {
    async fn launch(&self, _args: &LaunchRequestArguments) -> Result<(), DapError> {
        Err(DapError::LaunchFailed(
            "this build has no CDP transport wired up; launch is not implemented".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);
    tracing::info!("js-dap: debug adapter core starting");

    let mode = if args.socket { DapMode::Socket } else { DapMode::Stdio };
    let config = DapConfig { log_level: args.log_level.clone(), mode, workspace_root: args.workspace_root };

    let adapter = DebugAdapter::new(
        NullCdpClient,
        IdentityPathTransformer,
        NoSourceMapTransformer,
        &[],
        &[],
        args.smart_step,
    );
    let server = DapServer::new(config, adapter);
    let target = NullLaunchTarget;

    // No CDP transport is wired in this build, so no events will ever arrive
    // on this channel - keep the sender alive so `recv` simply waits instead
    // of observing a closed channel.
    let (_cdp_tx, cdp_rx) = mpsc::channel(32);

    match mode {
        DapMode::Socket => {
            tracing::info!(port = args.port, "starting DAP server on socket");
            server.run_socket(args.port, &target, cdp_rx).await
        }
        DapMode::Stdio => {
            tracing::info!("starting DAP server on stdio");
            server.run(&target, cdp_rx).await
        }
    }
}
