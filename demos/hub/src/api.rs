//! HTTP API.
//!
//! Thin handlers over the orchestrator and the participant registry. Each
//! lifecycle request waits for the lifecycle to finish before answering.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use thk_protocol::ThkError;
use thk_protocol::prelude::*;

/// The orchestrator wired with the in-process collaborators.
pub type Hub = Orchestrator<CannedResponder, ParticipantRegistry, KeywordRouter>;

/// Build a hub from an orchestrator configuration.
pub fn hub(config: OrchestratorConfig) -> Hub {
    Orchestrator::new(
        config,
        CannedResponder::with_default_scripts(),
        ParticipantRegistry::new(),
        KeywordRouter::default(),
    )
}

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Library error.
    #[error(transparent)]
    Thk(#[from] ThkError),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self::Thk(err.into())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self::Thk(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Thk(ThkError::Registry(RegistryError::EmptyName)) => StatusCode::BAD_REQUEST,
            Self::Thk(ThkError::Registry(RegistryError::UnknownParticipant(_)))
            | Self::Thk(ThkError::Orchestrator(OrchestratorError::ParticipantUnknown(_))) => {
                StatusCode::NOT_FOUND
            }
            Self::Thk(ThkError::Orchestrator(
                OrchestratorError::ParticipantOffline(_) | OrchestratorError::NotEstablished { .. },
            )) => StatusCode::CONFLICT,
            Self::Thk(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Always "ok" while serving.
    pub status: &'static str,
    /// Protocol name.
    pub protocol: &'static str,
    /// Protocol version.
    pub version: &'static str,
    /// Configured endpoints.
    pub endpoints: Vec<EndpointId>,
}

/// Body of `POST /api/clients`.
#[derive(Debug, Deserialize)]
pub struct NewClient {
    /// Display name.
    pub name: String,
}

/// Body of `POST /api/clients/{id}/messages`.
#[derive(Debug, Deserialize)]
pub struct NewMessage {
    /// Message text.
    pub message: String,
}

/// Result of a connect, disconnect, or reconnect.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleReply {
    /// Participant.
    pub participant_id: ParticipantId,
    /// Handshakes or teardowns executed.
    pub completed: usize,
}

/// Body of `GET /api/stats`.
#[derive(Debug, Serialize)]
pub struct StatsReply {
    /// Registered participants.
    pub clients: Vec<Participant>,
    /// Orchestrator snapshot.
    #[serde(flatten)]
    pub snapshot: OrchestratorSnapshot,
}

async fn health(State(hub): State<Hub>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        protocol: PROTOCOL_NAME,
        version: PROTOCOL_VERSION,
        endpoints: hub.config().endpoints.clone(),
    })
}

async fn list_clients(State(hub): State<Hub>) -> Json<Vec<Participant>> {
    Json(hub.directory().list().await)
}

async fn add_client(
    State(hub): State<Hub>,
    Json(body): Json<NewClient>,
) -> Result<(StatusCode, Json<Participant>), ApiError> {
    let participant = hub.directory().add_manual(&body.name).await?;
    hub.register(&participant.id).await?;
    let participant = hub
        .directory()
        .participant(&participant.id)
        .await
        .ok_or_else(|| RegistryError::UnknownParticipant(participant.id.clone()))?;
    Ok((StatusCode::CREATED, Json(participant)))
}

async fn remove_client(
    State(hub): State<Hub>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<Participant>, ApiError> {
    // Tear down first so no records outlive the participant.
    if hub.directory().participant(&id).await.is_some() {
        hub.disconnect(&id).await?;
    }
    let removed = hub.directory().remove(&id).await?;
    hub.generator().forget(&id).await;
    info!(participant = %id, "client removed");
    Ok(Json(removed))
}

async fn connect(
    State(hub): State<Hub>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<LifecycleReply>, ApiError> {
    let completed = hub.connect(&id).await?;
    Ok(Json(LifecycleReply {
        participant_id: id,
        completed,
    }))
}

async fn disconnect(
    State(hub): State<Hub>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<LifecycleReply>, ApiError> {
    let completed = hub.disconnect(&id).await?;
    Ok(Json(LifecycleReply {
        participant_id: id,
        completed,
    }))
}

async fn reconnect(
    State(hub): State<Hub>,
    Path(id): Path<ParticipantId>,
) -> Result<Json<LifecycleReply>, ApiError> {
    let completed = hub.reconnect(&id).await?;
    Ok(Json(LifecycleReply {
        participant_id: id,
        completed,
    }))
}

async fn send_message(
    State(hub): State<Hub>,
    Path(id): Path<ParticipantId>,
    Json(body): Json<NewMessage>,
) -> Result<Json<Delivery>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }
    let delivery = hub.send_message(&id, &body.message).await?;
    hub.directory().touch(&id).await?;
    Ok(Json(delivery))
}

async fn stats(State(hub): State<Hub>) -> Json<StatsReply> {
    Json(StatsReply {
        clients: hub.directory().list().await,
        snapshot: hub.snapshot(),
    })
}

/// The API routes.
pub fn router(hub: Hub) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/clients", get(list_clients).post(add_client))
        .route("/api/clients/{id}", delete(remove_client))
        .route("/api/clients/{id}/connect", post(connect))
        .route("/api/clients/{id}/disconnect", post(disconnect))
        .route("/api/clients/{id}/reconnect", post(reconnect))
        .route("/api/clients/{id}/messages", post(send_message))
        .route("/api/stats", get(stats))
        .with_state(hub)
}

/// Serve the API until the listener fails.
pub async fn serve(bind_addr: SocketAddr, hub: Hub) -> Result<(), ThkError> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "hub listening");
    axum::serve(listener, router(hub)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_hub() -> Hub {
        hub(OrchestratorBuilder::new()
            .handshake_hop_delay(Duration::ZERO)
            .data_hop_delay(Duration::ZERO)
            .build())
    }

    #[tokio::test]
    async fn test_health() {
        let Json(status) = health(State(fast_hub())).await;
        assert_eq!(status.status, "ok");
        assert_eq!(status.protocol, "THK");
        assert_eq!(status.endpoints.len(), 3);
    }

    #[tokio::test]
    async fn test_add_client_registers_and_connects() {
        let hub = fast_hub();
        let (code, Json(client)) = add_client(
            State(hub.clone()),
            Json(NewClient {
                name: "Alice".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(code, StatusCode::CREATED);
        assert_eq!(client.id, ParticipantId::from("manual_1"));
        assert_eq!(client.status, ParticipantStatus::Connected);
        assert_eq!(hub.engine().stats().established, 3);

        let Json(all) = list_clients(State(hub)).await;
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_name_is_bad_request() {
        let err = add_client(State(fast_hub()), Json(NewClient { name: " ".into() }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_message_and_remove() {
        let hub = fast_hub();
        let (_, Json(client)) = add_client(
            State(hub.clone()),
            Json(NewClient { name: "Bob".into() }),
        )
        .await
        .unwrap();

        let Json(delivery) = send_message(
            State(hub.clone()),
            Path(client.id.clone()),
            Json(NewMessage {
                message: "find me a hotel".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(delivery.endpoint, EndpointId::from("travel"));

        assert_eq!(hub.generator().conversation(&client.id).await.len(), 2);

        let Json(removed) = remove_client(State(hub.clone()), Path(client.id.clone()))
            .await
            .unwrap();
        assert_eq!(removed.id, client.id);
        assert!(hub.engine().registry().is_empty());
        assert!(hub.generator().conversation(&client.id).await.is_empty());
        assert_eq!(hub.active_pairs(), 0);

        let err = remove_client(State(hub), Path(client.id)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_message_records_activity() {
        let hub = fast_hub();
        let (_, Json(client)) = add_client(
            State(hub.clone()),
            Json(NewClient { name: "Erin".into() }),
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        send_message(
            State(hub.clone()),
            Path(client.id.clone()),
            Json(NewMessage {
                message: "any good pizza nearby".into(),
            }),
        )
        .await
        .unwrap();
        let after = hub.directory().participant(&client.id).await.unwrap();
        assert!(after.last_activity > client.last_activity);
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let hub = fast_hub();
        let err = connect(State(hub.clone()), Path("ghost".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let participant = hub.directory().add_manual("Carol").await.unwrap();
        let err = send_message(
            State(hub.clone()),
            Path(participant.id.clone()),
            Json(NewMessage { message: "hi".into() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = send_message(
            State(hub),
            Path(participant.id),
            Json(NewMessage { message: "".into() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_lists_clients() {
        let hub = fast_hub();
        hub.directory().add_manual("Dana").await.unwrap();
        let Json(reply) = stats(State(hub)).await;
        assert_eq!(reply.clients.len(), 1);
        assert_eq!(reply.snapshot.stats.total_connections, 0);
        let json = serde_json::to_value(&reply).unwrap();
        assert!(json.get("endpoints").is_some());
        assert_eq!(json["stats"]["totalConnections"], 0);
        assert!(json["stats"].get("total_connections").is_none());
    }

    #[tokio::test]
    async fn test_router_builds() {
        let _ = router(fast_hub());
    }
}
