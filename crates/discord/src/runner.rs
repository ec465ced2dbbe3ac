use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::interactions::Interaction;
use crate::router::InteractionRouter;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway connect failed: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("gateway write failed: {0}")]
    Send(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
    /// The platform refused the session; retrying with the same settings cannot help.
    #[error("gateway rejected the session: {0}")]
    Rejected(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts tolerated before the runner gives up.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay: Duration::from_millis(250), max_delay: Duration::from_secs(5) }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `retry` (zero-based), doubling up to `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1 << retry.min(16)).min(self.max_delay)
    }
}

/// Source of interactions pushed by the platform.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    fn name(&self) -> &'static str;
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream ended cleanly.
    async fn next_interaction(&self) -> Result<Option<Interaction>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Why a session stopped pumping.
#[derive(Debug)]
struct SessionEnd {
    error: TransportError,
    /// The session connected before failing, so the retry budget starts over.
    established: bool,
}

/// Keeps a [`GatewayTransport`] connected and hands every interaction to the
/// router on its own task.
pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    router: Arc<InteractionRouter>,
    reconnect_policy: ReconnectPolicy,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        router: Arc<InteractionRouter>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, router, reconnect_policy }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Runs until the stream ends cleanly, the platform rejects the session,
    /// or `max_retries` consecutive attempts fail. None of these crash the process.
    pub async fn start(&self) -> Result<()> {
        let mut failures = 0_u32;
        loop {
            let end = match self.run_session(failures).await {
                Ok(()) => return Ok(()),
                Err(end) => end,
            };

            if let TransportError::Rejected(reason) = &end.error {
                error!(
                    event_name = "gateway.session.rejected",
                    transport = self.transport.name(),
                    reason = %reason,
                    "gateway refused the bot; not reconnecting"
                );
                return Ok(());
            }

            failures = if end.established { 0 } else { failures + 1 };
            warn!(
                event_name = "gateway.session.lost",
                transport = self.transport.name(),
                failures,
                max_retries = self.reconnect_policy.max_retries,
                established = end.established,
                error = %end.error,
                "gateway connection lost"
            );

            if failures > self.reconnect_policy.max_retries {
                warn!(
                    event_name = "gateway.session.exhausted",
                    transport = self.transport.name(),
                    max_retries = self.reconnect_policy.max_retries,
                    "gateway retries exhausted; continuing process without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(failures.saturating_sub(1));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn run_session(&self, failures: u32) -> Result<(), SessionEnd> {
        info!(transport = self.transport.name(), failures, "opening gateway connection");
        self.transport.connect().await.map_err(|error| SessionEnd { error, established: false })?;
        info!(event_name = "gateway.session.connected", transport = self.transport.name(), "gateway connected");

        let mut handlers = JoinSet::new();
        let pumped = self.pump(&mut handlers).await;
        while let Some(joined) = handlers.join_next().await {
            if let Err(join_error) = joined {
                error!(error = %join_error, "interaction handler panicked");
            }
        }

        match pumped {
            Ok(()) => {
                info!(transport = self.transport.name(), "gateway stream closed");
                self.transport
                    .disconnect()
                    .await
                    .map_err(|error| SessionEnd { error, established: true })
            }
            Err(error) => Err(SessionEnd { error, established: true }),
        }
    }

    async fn pump(&self, handlers: &mut JoinSet<()>) -> Result<(), TransportError> {
        while let Some(interaction) = self.transport.next_interaction().await? {
            debug!(
                event_name = "ingress.interaction.received",
                interaction_id = %interaction.id,
                correlation_id = %interaction.id,
                channel_id = %interaction.channel_id,
                "received interaction"
            );

            let router = Arc::clone(&self.router);
            handlers.spawn(async move {
                if let Err(route_error) = router.route(&interaction).await {
                    error!(
                        event_name = "ingress.interaction.failed",
                        interaction_id = %interaction.id,
                        correlation_id = %interaction.id,
                        channel_id = %interaction.channel_id,
                        actor_id = %interaction.member.user_id,
                        error = %route_error,
                        "interaction handling failed"
                    );
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use ticketdesk_core::config::PanelConfig;
    use ticketdesk_store::TicketRepository;
    use tokio::sync::Mutex;

    use super::{GatewayRunner, GatewayTransport, ReconnectPolicy, TransportError};
    use crate::gateway::InteractionResponse;
    use crate::interactions::Interaction;
    use crate::router::InteractionRouter;
    use crate::testing::{component_in, harness, member, Harness, RecordingGateway};

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        interactions: VecDeque<Result<Option<Interaction>, TransportError>>,
        connect_attempts: usize,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            interactions: Vec<Result<Option<Interaction>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    interactions: interactions.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_interaction(&self) -> Result<Option<Interaction>, TransportError> {
            self.state.lock().await.interactions.pop_front().unwrap_or(Ok(None))
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.state.lock().await.disconnect_calls += 1;
            Ok(())
        }
    }

    fn runner(harness: &Harness, transport: Arc<ScriptedTransport>, max_retries: u32) -> GatewayRunner {
        let router = InteractionRouter::new(
            harness.gateway.clone(),
            harness.controller.clone(),
            PanelConfig::default(),
        );
        GatewayRunner::new(
            transport,
            Arc::new(router),
            ReconnectPolicy { max_retries, base_delay: Duration::ZERO, max_delay: Duration::ZERO },
        )
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let harness = harness(RecordingGateway::with_guild());
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![
                Ok(Some(component_in("C-panel", "service_select", &["SynthX"], member("U-1", "alice")))),
                Ok(None),
            ],
        ));

        runner(&harness, transport.clone(), 2).start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.disconnect_calls().await, 1);
        assert_eq!(harness.store.len().await.expect("len"), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let harness = harness(RecordingGateway::with_guild());
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        runner(&harness, transport.clone(), 2).start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn handler_errors_do_not_stop_the_loop() {
        let harness = harness(RecordingGateway::with_guild());
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(component_in("C-panel", "service_select", &["Gold"], member("U-1", "alice")))),
                Ok(Some(component_in("C-panel", "service_select", &["SynthX"], member("U-2", "bob")))),
                Ok(None),
            ],
        ));

        runner(&harness, transport.clone(), 0).start().await.expect("runner");

        assert_eq!(harness.store.len().await.expect("len"), 1);
        let responses = harness.gateway.responses();
        assert_eq!(responses.len(), 2);
        assert!(responses.contains(&InteractionResponse::ephemeral_text(
            "An error occurred: unknown service `Gold`"
        )));
    }

    #[tokio::test]
    async fn established_sessions_reset_the_retry_budget() {
        let harness = harness(RecordingGateway::with_guild());
        let dropped = || -> Result<Option<Interaction>, TransportError> {
            Err(TransportError::Receive("connection reset".to_owned()))
        };
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(()), Ok(()), Ok(()), Ok(())],
            vec![dropped(), dropped(), dropped(), Ok(None)],
        ));

        runner(&harness, transport.clone(), 1).start().await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 4);
        assert_eq!(transport.disconnect_calls().await, 1);
    }

    #[tokio::test]
    async fn rejected_sessions_stop_the_runner() {
        let harness = harness(RecordingGateway::with_guild());
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Rejected("4004 authentication failed".to_owned())), Ok(())],
            vec![],
        ));

        runner(&harness, transport.clone(), 5).start().await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(250));
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(40), Duration::from_millis(1_000));
    }
}
