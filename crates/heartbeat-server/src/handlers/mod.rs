//! Request handlers for control commands, diagnostic data and disconnects.

pub mod command;
pub mod diagnostic;
pub mod disconnect;

use std::sync::Arc;

pub use command::{CommandProcessor, SessionState};
pub use diagnostic::{DiagnosticHandler, NON_REGISTERED_CLIENT};
pub use disconnect::DisconnectHandler;

use crate::config::ServerConfig;
use crate::probe::ReachabilityProbe;
use crate::registry::SessionRegistry;
use crate::transport::ChannelTransport;

/// The three handlers a connection dispatches into.
pub struct Handlers {
    pub command: CommandProcessor,
    pub diagnostic: DiagnosticHandler,
    pub disconnect: DisconnectHandler,
}

impl Handlers {
    pub fn new(
        config: &ServerConfig,
        registry: Arc<SessionRegistry>,
        transport: Arc<dyn ChannelTransport>,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> Self {
        Self {
            command: CommandProcessor::new(Arc::clone(&registry), Arc::clone(&transport)),
            diagnostic: DiagnosticHandler::new(
                Arc::clone(&registry),
                transport,
                probe,
                config.middleware_address.clone(),
                config.diagnostic_timeout(),
            ),
            disconnect: DisconnectHandler::new(registry),
        }
    }
}
