//! Typed request/response calls over a channel to a worker node.
//!
//! A caller sends a [`RemoteCall`] through a [`VirtualChannel`]; the worker
//! dispatches it by name through its [`CallRegistry`] and answers with the
//! call's `Output` or a [`RemoteError`]. Payloads travel as JSON so that only
//! serializable data crosses the boundary.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A request that can be executed on a worker node.
pub trait RemoteCall: Serialize + DeserializeOwned {
    /// Name the worker dispatches on.
    const NAME: &'static str;

    type Output: Serialize + DeserializeOwned;
}

/// Serialized call as it travels over the wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CallEnvelope {
    pub name: String,
    pub payload: Value,
}

/// Category of a remote failure.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// The call ran on the worker and failed with an I/O-class error.
    Io,
    /// The worker has no handler for the call.
    UnknownCall,
    /// The request or reply could not be (de)serialized.
    Codec,
    /// The channel itself failed.
    Transport,
}

impl RemoteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::UnknownCall => "unknown_call",
            Self::Codec => "codec",
            Self::Transport => "transport",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the worker side, with the worker's cause flattened to
/// text so it survives the hop.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    fn codec(err: serde_json::Error) -> Self {
        Self::new(RemoteErrorKind::Codec, "failed to encode remote call").with_cause(err)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.message, cause),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Request/response link to a worker node.
pub trait VirtualChannel: Send + Sync {
    fn call_raw(&self, envelope: CallEnvelope) -> Result<Value, RemoteError>;
}

/// Execute `call` on the other side of `channel`.
pub fn call<C: RemoteCall>(channel: &dyn VirtualChannel, call: &C) -> Result<C::Output, RemoteError> {
    let envelope = CallEnvelope {
        name: C::NAME.to_string(),
        payload: serde_json::to_value(call).map_err(RemoteError::codec)?,
    };
    let reply = channel.call_raw(envelope)?;
    serde_json::from_value(reply).map_err(RemoteError::codec)
}

type Handler = Box<dyn Fn(Value) -> Result<Value, RemoteError> + Send + Sync>;

/// Worker-side table of call handlers.
#[derive(Default)]
pub struct CallRegistry {
    handlers: HashMap<String, Handler>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handler for `C`, replacing any previous one.
    pub fn register<C, F>(&mut self, handler: F)
    where
        C: RemoteCall + 'static,
        F: Fn(C) -> Result<C::Output, RemoteError> + Send + Sync + 'static,
    {
        let erased: Handler = Box::new(move |payload| {
            let call: C = serde_json::from_value(payload).map_err(RemoteError::codec)?;
            let output = handler(call)?;
            serde_json::to_value(output).map_err(RemoteError::codec)
        });
        self.handlers.insert(C::NAME.to_string(), erased);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn dispatch(&self, envelope: CallEnvelope) -> Result<Value, RemoteError> {
        let handler = self.handlers.get(&envelope.name).ok_or_else(|| {
            RemoteError::new(
                RemoteErrorKind::UnknownCall,
                format!("no handler registered for {}", envelope.name),
            )
        })?;
        handler(envelope.payload)
    }
}

impl fmt::Debug for CallRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("CallRegistry").field("calls", &names).finish()
    }
}

/// Channel to a worker living in this process.
///
/// The envelope and the reply are pushed through JSON bytes, so anything that
/// would not survive a real wire fails here as well.
#[derive(Clone, Debug)]
pub struct LoopbackChannel {
    registry: Arc<CallRegistry>,
}

#[derive(Serialize, Deserialize)]
enum Reply {
    Ok(Value),
    Err(RemoteError),
}

impl LoopbackChannel {
    pub fn new(registry: CallRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    fn transport_err(err: serde_json::Error) -> RemoteError {
        RemoteError::new(RemoteErrorKind::Transport, "loopback frame corrupted").with_cause(err)
    }
}

impl VirtualChannel for LoopbackChannel {
    fn call_raw(&self, envelope: CallEnvelope) -> Result<Value, RemoteError> {
        let request = serde_json::to_vec(&envelope).map_err(Self::transport_err)?;
        let received: CallEnvelope =
            serde_json::from_slice(&request).map_err(Self::transport_err)?;

        let reply = match self.registry.dispatch(received) {
            Ok(value) => Reply::Ok(value),
            Err(err) => Reply::Err(err),
        };
        let frame = serde_json::to_vec(&reply).map_err(Self::transport_err)?;

        match serde_json::from_slice(&frame).map_err(Self::transport_err)? {
            Reply::Ok(value) => Ok(value),
            Reply::Err(err) => Err(err),
        }
    }
}
