use crate::remote::VirtualChannel;
use std::fmt;
use std::sync::Arc;

/// Execution environment a launcher is created for.
#[derive(Clone)]
pub struct NodeContext {
    name: String,
    unix: bool,
    channel: Option<Arc<dyn VirtualChannel>>,
}

impl NodeContext {
    /// The node this process runs on.
    pub fn local() -> Self {
        Self {
            name: "local".to_string(),
            unix: cfg!(unix),
            channel: None,
        }
    }

    /// A worker reached through `channel`.
    pub fn remote(name: impl Into<String>, unix: bool, channel: Arc<dyn VirtualChannel>) -> Self {
        Self {
            name: name.into(),
            unix,
            channel: Some(channel),
        }
    }

    /// Override the native execution model.
    pub fn with_unix(mut self, unix: bool) -> Self {
        self.unix = unix;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the node's native execution model is Unix-like.
    pub fn is_unix(&self) -> bool {
        self.unix
    }

    pub fn channel(&self) -> Option<&Arc<dyn VirtualChannel>> {
        self.channel.as_ref()
    }
}

impl fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("name", &self.name)
            .field("unix", &self.unix)
            .field("remote", &self.channel.is_some())
            .finish()
    }
}
