//! Process-wide tracer context.
//!
//! Built once when the agent loads and shared by reference with every
//! notification. After construction only the lifecycle phase, the identity
//! counter and the transport connection change, each behind its own
//! synchronization point.

use log::info;

use crate::config::AgentOptions;
use crate::dispatch::Lifecycle;
use crate::registry::IdentityRegistry;
use crate::trace::EmptyTraces;
use crate::transport::Transport;

pub struct TracerState {
    pub options: AgentOptions,
    pub registry: IdentityRegistry,
    pub empty_traces: EmptyTraces,
    pub transport: Transport,
    pub lifecycle: Lifecycle,
}

impl TracerState {
    /// Install logging and connect to the configured collector.
    ///
    /// A failed connection is logged and leaves the tracer running with
    /// every event dropped.
    #[must_use]
    pub fn start(options: AgentOptions) -> Self {
        // The embedding process may already own the global logger.
        let _ = env_logger::try_init();

        let addr = options.collector_addr();
        info!(
            "objtrace v{} starting: collector {addr}, {} frames per trace",
            env!("CARGO_PKG_VERSION"),
            options.max_frames
        );
        let transport = Transport::connect(&addr, options.send_timeout);
        Self::with_transport(options, transport)
    }

    /// Build the context around an existing transport.
    #[must_use]
    pub fn with_transport(options: AgentOptions, transport: Transport) -> Self {
        Self {
            options,
            registry: IdentityRegistry::new(),
            empty_traces: EmptyTraces::new(),
            transport,
            lifecycle: Lifecycle::new(),
        }
    }
}
