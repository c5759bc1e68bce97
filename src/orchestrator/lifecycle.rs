//! Connection lifecycles.
//!
//! Each lifecycle is a linear sequence of awaited hops. Handshakes and
//! teardowns for one participant fan out across endpoints as separate tasks
//! joined before the participant's status changes.
//!
//! Every public lifecycle runs in its own spawned task and the caller only
//! awaits its handle. A caller that stops waiting never leaves a pair
//! half-opened.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::config::OrchestratorConfig;
use super::error::{OrchestratorError, OrchestratorResult};
use super::locks::{PairGuard, PairLocks};
use super::events::{
    AnimationKind, Delivery, EventIdGenerator, LifecycleKind, LifecycleNotice, OrchestratorEvent,
    PacketAnimation, TranscriptEntry,
};
use crate::core::{
    Address, ClientStatus, ClientStatusLookup, ConnectionKey, EndpointId, GeneratorError,
    MessageRouter, ParticipantId, ParticipantStatus, ResponseGenerator,
};
use crate::protocol::{Packet, PacketType, ProtocolEngine, ProtocolStats};

/// How the first SYN of a handshake is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opening {
    Handshake,
    Reconnect,
}

/// Reporting snapshot of the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorSnapshot {
    /// Configured endpoints.
    pub endpoints: Vec<EndpointId>,
    /// Engine statistics.
    pub stats: ProtocolStats,
}

struct Inner<G, D, R> {
    config: OrchestratorConfig,
    engine: ProtocolEngine,
    generator: G,
    directory: D,
    router: R,
    events: broadcast::Sender<OrchestratorEvent>,
    event_ids: EventIdGenerator,
    pair_locks: Arc<PairLocks>,
}

/// Runs handshake, data, and teardown lifecycles.
///
/// Generic over the three collaborators: `G` generates replies, `D` owns
/// participant status, `R` picks the endpoint for a message. Cloning is
/// cheap and shares all state.
pub struct Orchestrator<G, D, R> {
    inner: Arc<Inner<G, D, R>>,
}

impl<G, D, R> Clone for Orchestrator<G, D, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G, D, R> Orchestrator<G, D, R>
where
    G: ResponseGenerator,
    D: ClientStatusLookup,
    R: MessageRouter,
{
    /// Create an orchestrator.
    pub fn new(config: OrchestratorConfig, generator: G, directory: D, router: R) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let engine = ProtocolEngine::with_config(config.engine.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                engine,
                generator,
                directory,
                router,
                events,
                event_ids: EventIdGenerator::new(),
                pair_locks: PairLocks::new(),
            }),
        }
    }

    /// Subscribe to outbound events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.inner.events.subscribe()
    }

    /// The protocol engine.
    pub fn engine(&self) -> &ProtocolEngine {
        &self.inner.engine
    }

    /// The configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// The client status collaborator.
    pub fn directory(&self) -> &D {
        &self.inner.directory
    }

    /// The response generator.
    pub fn generator(&self) -> &G {
        &self.inner.generator
    }

    /// Pairs with a lifecycle running or waiting for its turn.
    pub fn active_pairs(&self) -> usize {
        self.inner.pair_locks.len()
    }

    /// Reporting snapshot.
    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            endpoints: self.inner.config.endpoints.clone(),
            stats: self.inner.engine.stats(),
        }
    }

    // -------------------------------------------------------------------------
    // Participant lifecycles
    // -------------------------------------------------------------------------

    /// Connect a newly registered participant to every endpoint.
    ///
    /// Emits `client_registered` followed by `client_connected`.
    pub async fn register(&self, participant: &ParticipantId) -> OrchestratorResult<usize> {
        let participant = participant.clone();
        self.detached(move |this| async move { this.run_register(&participant).await })
            .await
    }

    /// Handshake with every endpoint, concurrently.
    ///
    /// The participant is marked connected only once every handshake has
    /// completed. Returns the number of handshakes.
    pub async fn connect(&self, participant: &ParticipantId) -> OrchestratorResult<usize> {
        let participant = participant.clone();
        self.detached(move |this| async move { this.run_connect(&participant).await })
            .await
    }

    /// Re-run the handshake with every endpoint, opening with a reconnection
    /// SYN. Returns the number of handshakes.
    pub async fn reconnect(&self, participant: &ParticipantId) -> OrchestratorResult<usize> {
        let participant = participant.clone();
        self.detached(move |this| async move { this.run_reconnect(&participant).await })
            .await
    }

    /// Tear down every established connection of `participant`, concurrently.
    ///
    /// Pairs without an established connection are skipped. Returns the
    /// number of teardowns executed, which may be zero.
    pub async fn disconnect(&self, participant: &ParticipantId) -> OrchestratorResult<usize> {
        let participant = participant.clone();
        self.detached(move |this| async move { this.run_disconnect(&participant).await })
            .await
    }

    /// Deliver `message` from `participant` to the endpoint the router picks
    /// and bring the reply back.
    ///
    /// Runs handshake, data send, response generation, and delivery in
    /// order, holding the pair for the whole cycle. A failed or late reply
    /// is replaced by a fallback; it does not fail the cycle.
    pub async fn send_message(
        &self,
        participant: &ParticipantId,
        message: &str,
    ) -> OrchestratorResult<Delivery> {
        let participant = participant.clone();
        let message = message.to_string();
        self.detached(move |this| async move { this.run_data_cycle(&participant, &message).await })
            .await
    }

    /// Run `lifecycle` on its own task and wait for it. Dropping the returned
    /// future detaches the task without aborting it.
    async fn detached<T, F, Fut>(&self, lifecycle: F) -> OrchestratorResult<T>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = OrchestratorResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(lifecycle(self.clone()))
            .await
            .map_err(|e| OrchestratorError::TaskFailed(e.to_string()))?
    }

    // -------------------------------------------------------------------------
    // Spawned bodies
    // -------------------------------------------------------------------------

    async fn run_register(&self, participant: &ParticipantId) -> OrchestratorResult<usize> {
        let client = self.lookup(participant).await?;
        let completed = self.open_all(participant, Opening::Handshake).await?;
        self.inner
            .directory
            .set_status(participant, ParticipantStatus::Connected)
            .await;
        self.notify(LifecycleKind::ClientRegistered, participant, &client);
        self.notify(LifecycleKind::ClientConnected, participant, &client);
        Ok(completed)
    }

    async fn run_connect(&self, participant: &ParticipantId) -> OrchestratorResult<usize> {
        let client = self.lookup(participant).await?;
        let completed = self.open_all(participant, Opening::Handshake).await?;
        self.inner
            .directory
            .set_status(participant, ParticipantStatus::Connected)
            .await;
        self.notify(LifecycleKind::ClientConnected, participant, &client);
        Ok(completed)
    }

    async fn run_reconnect(&self, participant: &ParticipantId) -> OrchestratorResult<usize> {
        let client = self.lookup(participant).await?;
        let completed = self.open_all(participant, Opening::Reconnect).await?;
        self.inner
            .directory
            .set_status(participant, ParticipantStatus::Connected)
            .await;
        self.notify(LifecycleKind::ClientReconnected, participant, &client);
        Ok(completed)
    }

    async fn run_disconnect(&self, participant: &ParticipantId) -> OrchestratorResult<usize> {
        let client = self.lookup(participant).await?;
        let endpoints = self.inner.engine.established_endpoints(participant);
        info!(
            participant = %participant,
            endpoints = endpoints.len(),
            "disconnection started"
        );

        let mut tasks = JoinSet::new();
        for endpoint in endpoints {
            let this = self.clone();
            let participant = participant.clone();
            tasks.spawn(async move { this.teardown(&participant, &endpoint).await });
        }
        let executed = join_all(tasks)
            .await?
            .into_iter()
            .filter(|torn_down| *torn_down)
            .count();

        self.inner
            .directory
            .set_status(participant, ParticipantStatus::Disconnected)
            .await;
        self.notify(LifecycleKind::ClientDisconnectedManual, participant, &client);
        info!(participant = %participant, executed, "disconnection completed");
        Ok(executed)
    }

    async fn run_data_cycle(
        &self,
        participant: &ParticipantId,
        message: &str,
    ) -> OrchestratorResult<Delivery> {
        let client = self.lookup(participant).await?;
        if client.status != ParticipantStatus::Connected {
            warn!(participant = %participant, "message rejected: participant offline");
            return Err(OrchestratorError::ParticipantOffline(participant.clone()));
        }

        let endpoint = self.inner.router.route(message);
        info!(participant = %participant, endpoint = %endpoint, "data cycle started");

        let _pair = self.lock_pair(participant, &endpoint).await;
        self.handshake(participant, &endpoint, Opening::Handshake)
            .await?;

        if !self.inner.engine.can_send_data(participant, &endpoint) {
            warn!(
                participant = %participant,
                endpoint = %endpoint,
                "data rejected: not established"
            );
            return Err(OrchestratorError::NotEstablished {
                participant: participant.clone(),
                endpoint,
            });
        }

        self.send_data(participant, &endpoint, message).await;
        let (response, fallback) = self.generate(participant, &endpoint, message).await;
        self.emit(OrchestratorEvent::Transcript(TranscriptEntry {
            participant_id: participant.clone(),
            endpoint: endpoint.clone(),
            message: message.to_string(),
            response: response.clone(),
        }));

        let delivery = self
            .deliver(participant, &endpoint, response, fallback)
            .await;
        info!(
            participant = %participant,
            endpoint = %endpoint,
            fallback,
            "data cycle completed"
        );
        Ok(delivery)
    }

    // -------------------------------------------------------------------------
    // Per-pair steps
    // -------------------------------------------------------------------------

    async fn open_all(
        &self,
        participant: &ParticipantId,
        opening: Opening,
    ) -> OrchestratorResult<usize> {
        let endpoints = self.inner.config.endpoints.clone();
        info!(
            participant = %participant,
            endpoints = endpoints.len(),
            ?opening,
            "handshakes started"
        );

        let mut tasks = JoinSet::new();
        for endpoint in endpoints {
            let this = self.clone();
            let participant = participant.clone();
            tasks.spawn(async move {
                let _pair = this.lock_pair(&participant, &endpoint).await;
                this.handshake(&participant, &endpoint, opening).await
            });
        }
        let completed = join_all(tasks).await?.len();

        info!(participant = %participant, completed, "handshakes completed");
        Ok(completed)
    }

    /// SYN, SYN-ACK, ACK, each relayed through the router. Caller holds the
    /// pair lock.
    async fn handshake(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
        opening: Opening,
    ) -> OrchestratorResult<()> {
        let engine = &self.inner.engine;
        let delay = self.inner.config.handshake_hop_delay;
        let client = Address::from(participant);
        let agent = Address::from(endpoint);

        let syn = match opening {
            Opening::Handshake => engine.initiate_handshake(participant, endpoint),
            Opening::Reconnect => engine.initiate_reconnection(participant, endpoint),
        };
        let syn_sequence = syn.sequence();
        self.animate(syn, AnimationKind::Syn, participant);

        tokio::time::sleep(delay).await;
        let relayed = engine.relay(
            Address::Router,
            agent.clone(),
            PacketType::Syn,
            json!("Routing to agent"),
        );
        self.animate(relayed, AnimationKind::Syn, participant);

        tokio::time::sleep(delay).await;
        let syn_ack = engine.complete_handshake(participant, endpoint, syn_sequence)?;
        let syn_ack_sequence = syn_ack.sequence();
        self.animate(syn_ack, AnimationKind::SynAck, participant);

        tokio::time::sleep(delay).await;
        let relayed = engine.relay(
            Address::Router,
            client,
            PacketType::SynAck,
            json!("Handshake in progress"),
        );
        self.animate(relayed, AnimationKind::SynAck, participant);

        tokio::time::sleep(delay).await;
        let ack = engine.finalize_handshake(participant, endpoint, syn_ack_sequence)?;
        self.animate(ack, AnimationKind::Ack, participant);

        tokio::time::sleep(delay).await;
        let relayed = engine.relay(
            Address::Router,
            agent,
            PacketType::Ack,
            json!("Handshake complete"),
        );
        self.animate(relayed, AnimationKind::Ack, participant);

        debug!(participant = %participant, endpoint = %endpoint, "handshake completed");
        Ok(())
    }

    /// FIN, FIN-ACK, ACK, each relayed through the router. Returns `false`
    /// without emitting anything if the pair is no longer established.
    async fn teardown(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
    ) -> OrchestratorResult<bool> {
        let _pair = self.lock_pair(participant, endpoint).await;
        let engine = &self.inner.engine;
        if !engine.can_send_data(participant, endpoint) {
            debug!(
                participant = %participant,
                endpoint = %endpoint,
                "teardown skipped: not established"
            );
            return Ok(false);
        }

        let delay = self.inner.config.handshake_hop_delay;
        let client = Address::from(participant);
        let agent = Address::from(endpoint);

        let fin = engine.initiate_disconnection(participant, endpoint)?;
        let fin_sequence = fin.sequence();
        self.animate(fin, AnimationKind::Fin, participant);

        tokio::time::sleep(delay).await;
        let relayed = engine.relay(
            Address::Router,
            agent.clone(),
            PacketType::Fin,
            json!("Disconnection request"),
        );
        self.animate(relayed, AnimationKind::Fin, participant);

        tokio::time::sleep(delay).await;
        let fin_ack = engine.acknowledge_disconnection(participant, endpoint, fin_sequence)?;
        let fin_ack_sequence = fin_ack.sequence();
        self.animate(fin_ack, AnimationKind::FinAck, participant);

        tokio::time::sleep(delay).await;
        let relayed = engine.relay(
            Address::Router,
            client,
            PacketType::FinAck,
            json!("Disconnection acknowledged"),
        );
        self.animate(relayed, AnimationKind::FinAck, participant);

        tokio::time::sleep(delay).await;
        let ack = engine.complete_disconnection(participant, endpoint, fin_ack_sequence)?;
        self.animate(ack, AnimationKind::Ack, participant);

        tokio::time::sleep(delay).await;
        let relayed = engine.relay(
            Address::Router,
            agent,
            PacketType::Ack,
            json!("Disconnection complete"),
        );
        self.animate(relayed, AnimationKind::Ack, participant);

        debug!(participant = %participant, endpoint = %endpoint, "teardown completed");
        Ok(true)
    }

    async fn send_data(&self, participant: &ParticipantId, endpoint: &EndpointId, message: &str) {
        let engine = &self.inner.engine;
        let outbound = engine.relay(
            Address::from(participant),
            Address::Router,
            PacketType::Data,
            json!(message),
        );
        self.animate(outbound, AnimationKind::DataSend, participant);

        tokio::time::sleep(self.inner.config.data_hop_delay).await;
        let relayed = engine.relay(
            Address::Router,
            Address::from(endpoint),
            PacketType::Data,
            json!(message),
        );
        self.animate(relayed, AnimationKind::DataSend, participant);
    }

    /// Ask the generator, bounded by the response timeout. Returns the reply
    /// and whether it is the fallback.
    async fn generate(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
        message: &str,
    ) -> (String, bool) {
        let answer = self.inner.generator.answer(endpoint, message, participant);
        let outcome = match tokio::time::timeout(self.inner.config.response_timeout, answer).await {
            Ok(result) => result,
            Err(_) => Err(GeneratorError::Timeout),
        };

        match outcome {
            Ok(response) => (response, false),
            Err(err) => {
                warn!(
                    participant = %participant,
                    endpoint = %endpoint,
                    error = %err,
                    "response generation failed, using fallback"
                );
                (fallback_response(endpoint, message), true)
            }
        }
    }

    async fn deliver(
        &self,
        participant: &ParticipantId,
        endpoint: &EndpointId,
        response: String,
        fallback: bool,
    ) -> Delivery {
        let engine = &self.inner.engine;
        let inbound = engine.relay(
            Address::from(endpoint),
            Address::Router,
            PacketType::Data,
            json!(response),
        );
        self.animate(inbound, AnimationKind::DataReceive, participant);

        tokio::time::sleep(self.inner.config.data_hop_delay).await;
        let relayed = engine.relay(
            Address::Router,
            Address::from(participant),
            PacketType::Data,
            json!(response),
        );
        self.animate(relayed, AnimationKind::DataReceive, participant);

        let delivery = Delivery {
            participant_id: participant.clone(),
            endpoint: endpoint.clone(),
            response,
            fallback,
        };
        self.emit(OrchestratorEvent::Delivery(delivery.clone()));
        delivery
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    async fn lookup(&self, participant: &ParticipantId) -> OrchestratorResult<ClientStatus> {
        match self.inner.directory.get(participant).await {
            Some(client) => Ok(client),
            None => {
                warn!(participant = %participant, "request rejected: unknown participant");
                Err(OrchestratorError::ParticipantUnknown(participant.clone()))
            }
        }
    }

    async fn lock_pair(&self, participant: &ParticipantId, endpoint: &EndpointId) -> PairGuard {
        let key = ConnectionKey::new(participant.clone(), endpoint.clone());
        self.inner.pair_locks.acquire(key).await
    }

    fn animate(&self, packet: Packet, kind: AnimationKind, participant: &ParticipantId) {
        let event = PacketAnimation {
            id: self.inner.event_ids.next_id(),
            from: packet.source().clone(),
            to: packet.destination().clone(),
            packet,
            kind,
            participant_id: participant.clone(),
        };
        self.emit(OrchestratorEvent::PacketAnimation(event));
    }

    fn notify(&self, kind: LifecycleKind, participant: &ParticipantId, client: &ClientStatus) {
        self.emit(OrchestratorEvent::Lifecycle(LifecycleNotice {
            kind,
            participant_id: participant.clone(),
            name: client.display_name.clone(),
        }));
    }

    fn emit(&self, event: OrchestratorEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

/// Reply used when response generation fails or times out.
pub fn fallback_response(endpoint: &EndpointId, message: &str) -> String {
    format!(
        "The {endpoint} endpoint could not answer right now. \
         Your message \"{message}\" was received; please try again in a moment."
    )
}

/// Wait for every task; the first error wins, but only after all finished.
async fn join_all<T: 'static>(
    mut tasks: JoinSet<OrchestratorResult<T>>,
) -> OrchestratorResult<Vec<T>> {
    let mut outputs = Vec::with_capacity(tasks.len());
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(|e| OrchestratorError::TaskFailed(e.to_string()));
        match result.and_then(|inner| inner) {
            Ok(output) => outputs.push(output),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(outputs),
    }
}
