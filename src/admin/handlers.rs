use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::config::ServerConfig;
use crate::error::Error;
use crate::load_balancer::{Algorithm, RoutingContext};
use crate::registry::ServerId;
use crate::routing::{HealthReport, RouteDecision, ServerView};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NoHealthyServers => StatusCode::SERVICE_UNAVAILABLE,
            Error::UnknownAlgorithm(_) | Error::InvalidWeight { .. } | Error::InvalidAddress(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::DuplicateServer(_) => StatusCode::CONFLICT,
            Error::UnknownServer(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub algorithm: Algorithm,
    pub adaptive: bool,
    pub passive_health: bool,
    pub servers: usize,
    pub healthy: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlgorithmStatus {
    pub algorithm: Algorithm,
    pub adaptive: bool,
}

#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub client: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub server_id: String,
    pub latency_ms: f64,
    pub success: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let balancer = &state.balancer;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        algorithm: balancer.current_algorithm(),
        adaptive: balancer.is_adaptive(),
        passive_health: balancer.passive_health(),
        servers: balancer.registry().len(),
        healthy: balancer.registry().healthy_count(),
    })
}

pub async fn get_health(State(state): State<AdminState>) -> Json<HealthReport> {
    Json(state.balancer.health_report())
}

pub async fn list_servers(State(state): State<AdminState>) -> Json<Vec<ServerView>> {
    Json(state.balancer.server_views())
}

pub async fn add_server(
    State(state): State<AdminState>,
    Json(server): Json<ServerConfig>,
) -> Result<StatusCode, Error> {
    state.balancer.register(
        server.id.as_str(),
        server.host,
        server.port,
        server.weight,
        server.health_check_path,
    )?;
    Ok(StatusCode::CREATED)
}

pub async fn remove_server(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, Error> {
    state.balancer.deregister(&ServerId::new(id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_algorithm(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<AlgorithmStatus>, Error> {
    let algorithm = state.balancer.set_algorithm(&name)?;
    Ok(Json(AlgorithmStatus {
        algorithm,
        adaptive: state.balancer.is_adaptive(),
    }))
}

pub async fn set_adaptive(
    State(state): State<AdminState>,
    Path(mode): Path<String>,
) -> Result<Json<AlgorithmStatus>, (StatusCode, Json<ErrorBody>)> {
    let enabled = match mode.as_str() {
        "on" | "true" => true,
        "off" | "false" => false,
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: format!("expected 'on' or 'off', got '{}'", other),
                }),
            ))
        }
    };
    state.balancer.set_adaptive(enabled);
    Ok(Json(AlgorithmStatus {
        algorithm: state.balancer.current_algorithm(),
        adaptive: state.balancer.is_adaptive(),
    }))
}

pub async fn route(
    State(state): State<AdminState>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<RouteDecision>, Error> {
    let ctx = match query.client {
        Some(client) => RoutingContext::with_client(client),
        None => RoutingContext::new(),
    };
    state.balancer.route(&ctx).map(Json)
}

pub async fn report_outcome(
    State(state): State<AdminState>,
    Json(report): Json<OutcomeReport>,
) -> Result<StatusCode, Error> {
    let id = ServerId::new(report.server_id);
    if !state.balancer.registry().contains(&id) {
        return Err(Error::UnknownServer(id));
    }
    state
        .balancer
        .report_outcome(&id, report.latency_ms, report.success);
    Ok(StatusCode::NO_CONTENT)
}
