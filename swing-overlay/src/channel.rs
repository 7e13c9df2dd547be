//! Method-call dispatch onto the overlay worker
//!
//! Commands arrive as a method name plus a JSON argument map, the shape used
//! by host applications embedding the compositor.

use crate::worker::{JobTicket, OverlayWorker};
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use swing_core::OverlayRequest;
use tracing::{info, warn};

/// Failure reported back to a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ChannelError {
    pub code: String,
    pub message: String,
}

impl ChannelError {
    pub const INVALID_ARGS: &'static str = "invalid_args";
    pub const NOT_IMPLEMENTED: &'static str = "not_implemented";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_ARGS, message)
    }

    pub fn not_implemented(method: &str) -> Self {
        Self::new(Self::NOT_IMPLEMENTED, format!("unknown method {method:?}"))
    }
}

impl From<&Error> for ChannelError {
    fn from(error: &Error) -> Self {
        Self::new(error.code(), error.to_string())
    }
}

/// Arguments of `processVideo`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessVideoArgs {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub attach_avatar: Option<bool>,
    pub avatar_path: Option<String>,
    pub attach_caption: Option<bool>,
    pub caption: Option<String>,
}

impl ProcessVideoArgs {
    /// Builds the request, rejecting missing or blank paths
    pub fn into_request(self) -> Result<OverlayRequest, ChannelError> {
        let required = |value: Option<String>, name: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ChannelError::invalid_args(format!("{name} is required")))
        };
        let input = required(self.input_path, "inputPath")?;
        let output = required(self.output_path, "outputPath")?;

        Ok(OverlayRequest {
            input_path: PathBuf::from(input),
            output_path: PathBuf::from(output),
            attach_avatar: self.attach_avatar.unwrap_or(false),
            avatar_path: self.avatar_path.map(PathBuf::from),
            attach_caption: self.attach_caption.unwrap_or(false),
            caption_text: self.caption.unwrap_or_default(),
        })
    }
}

/// A parsed method call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ProcessVideo(OverlayRequest),
}

impl Command {
    pub const PROCESS_VIDEO: &'static str = "processVideo";

    pub fn parse(method: &str, args: Value) -> Result<Self, ChannelError> {
        match method {
            Self::PROCESS_VIDEO => {
                let args = match args {
                    Value::Null => ProcessVideoArgs::default(),
                    Value::Object(_) => serde_json::from_value::<ProcessVideoArgs>(args)
                        .map_err(|e| ChannelError::invalid_args(e.to_string()))?,
                    other => {
                        return Err(ChannelError::invalid_args(format!(
                            "arguments must be an object, got {other}"
                        )))
                    }
                };
                Ok(Command::ProcessVideo(args.into_request()?))
            }
            other => Err(ChannelError::not_implemented(other)),
        }
    }
}

/// Result of a call, as sent back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Reply {
    Success { path: String },
    Failure { code: String, message: String },
}

impl Reply {
    pub fn success(path: impl Into<String>) -> Self {
        Reply::Success { path: path.into() }
    }

    pub fn failure(error: ChannelError) -> Self {
        Reply::Failure {
            code: error.code,
            message: error.message,
        }
    }

    pub fn from_result(result: &crate::Result<PathBuf>) -> Self {
        match result {
            Ok(path) => Self::success(path.display().to_string()),
            Err(e) => Self::failure(ChannelError::from(e)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success { .. })
    }

    pub fn to_json(&self) -> Value {
        // a derived Serialize over strings cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Dispatches method calls onto an [`OverlayWorker`]
pub struct OverlayChannel {
    worker: OverlayWorker,
}

impl OverlayChannel {
    pub fn new(worker: OverlayWorker) -> Self {
        Self { worker }
    }

    /// Validates a call and queues its work
    pub fn handle(&self, method: &str, args: Value) -> Result<JobTicket, ChannelError> {
        let command = Command::parse(method, args).map_err(|e| {
            warn!(method, code = %e.code, message = %e.message, "Rejected call");
            e
        })?;
        match command {
            Command::ProcessVideo(request) => {
                info!(
                    input = %request.input_path.display(),
                    output = %request.output_path.display(),
                    avatar = request.attach_avatar,
                    caption = request.attach_caption,
                    "Overlay request received"
                );
                Ok(self.worker.submit(request))
            }
        }
    }

    /// Handles a call and waits for its reply
    pub fn call(&self, method: &str, args: Value) -> Reply {
        match self.handle(method, args) {
            Ok(ticket) => Reply::from_result(&ticket.wait()),
            Err(e) => Reply::failure(e),
        }
    }
}
