use anyhow::Context;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a global subscriber for the decorator's `cygpath::*` events.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Fails when a
/// global subscriber is already installed.
pub fn init(json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json {
        registry
            .with(tracing_subscriber::fmt::layer().with_ansi(false).json())
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_thread_ids(false)
                    .with_ansi(atty::is(atty::Stream::Stdout)),
            )
            .try_init()
    };
    installed.context("failed to install tracing subscriber")
}
