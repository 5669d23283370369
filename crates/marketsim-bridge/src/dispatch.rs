//! Translation of validated viewer requests into lifecycle actions and
//! wire commands.
//!
//! Every inbound request kind is handled by one `match` in
//! [`Dispatcher::handle`]. Only `start_simulation` and `stop_simulation`
//! touch the supervisor; everything else is encoded and queued on the
//! command channel whether or not a simulation is running.

use std::sync::Arc;
use std::time::Duration;

use marketsim_protocol::{ClientRequest, Command};
use tracing::{info, warn};

use crate::channel::CommandChannel;
use crate::error::BridgeError;
use crate::supervisor::Supervisor;

/// Routes requests to the supervisor and the command channel.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    supervisor: Arc<Supervisor>,
    commands: CommandChannel,
    stop_grace: Duration,
}

impl Dispatcher {
    /// Create a dispatcher. `stop_grace` is the pause between sending
    /// `STOP` and terminating the process.
    pub const fn new(
        supervisor: Arc<Supervisor>,
        commands: CommandChannel,
        stop_grace: Duration,
    ) -> Self {
        Self {
            supervisor,
            commands,
            stop_grace,
        }
    }

    /// The supervisor this dispatcher drives.
    pub const fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Parse a JSON envelope and handle it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidRequest`] for text that does not
    /// validate, otherwise whatever [`Dispatcher::handle`] returns.
    pub async fn handle_text(&self, text: &str) -> Result<(), BridgeError> {
        let request = ClientRequest::parse(text)?;
        self.handle(request).await
    }

    /// Carry out one request.
    ///
    /// `start_simulation` returns only after the settle interval, with
    /// `START` queued behind the launch. `stop_simulation` sends `STOP`,
    /// waits out the grace period and then terminates the process.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::BinaryNotFound`] or [`BridgeError::Spawn`]
    /// if a launch fails, and [`BridgeError::Channel`] if the command
    /// channel has shut down.
    pub async fn handle(&self, request: ClientRequest) -> Result<(), BridgeError> {
        match request {
            ClientRequest::StartSimulation { mode, config } => {
                let status = self.supervisor.start(mode.as_deref()).await?;
                self.commands.send(&Command::Start(config)).await?;
                info!(
                    mode = status.mode.as_deref().unwrap_or_default(),
                    pid = status.pid,
                    makers = config.makers,
                    fundamental = config.fundamental,
                    momentum = config.momentum,
                    noise = config.noise,
                    "simulation started"
                );
            }
            ClientRequest::StopSimulation => {
                if let Err(e) = self.commands.send(&Command::Stop).await {
                    warn!(error = %e, "could not queue STOP, terminating anyway");
                }
                tokio::time::sleep(self.stop_grace).await;
                self.supervisor.stop().await;
                info!("simulation stopped");
            }
            ClientRequest::PauseSimulation
            | ClientRequest::ResumeSimulation
            | ClientRequest::PlaceOrder { .. }
            | ClientRequest::SetScenario(_) => {
                self.commands.send(&request.command()).await?;
            }
        }
        Ok(())
    }
}
