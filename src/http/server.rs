use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;

use crate::{
    config::{GameConfig, HttpConfig},
    game::GameMode,
    http::error::ApiError,
    music::MusicSourceKind,
    registry::{SessionRegistry, SessionSettings},
};

/// Request/response endpoints for the session lifecycle. Game play itself
/// happens on the player channel.
pub struct HttpServer {
    registry: Arc<SessionRegistry>,
    defaults: GameConfig,
    pub config: HttpConfig,
}

impl HttpServer {
    pub fn new(registry: Arc<SessionRegistry>, defaults: GameConfig, config: HttpConfig) -> Self {
        Self {
            registry,
            defaults,
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        info!("http server listening on {addr}");
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let result = rouille::router!(request,
            (POST) (/create) => { self.handle_create(request) },
            (GET) (/sessions) => { self.handle_list() },
            (GET) (/sessions/{id: String}) => { self.handle_status(&id) },
            (POST) (/join) => { self.handle_join(request) },
            (POST) (/start) => { self.handle_start(request) },
            (POST) (/authenticate) => { self.handle_authenticate(request) },
            _ => Ok(Response::empty_404())
        );
        let response = result.unwrap_or_else(ApiError::into_response);

        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn handle_create(&self, request: &Request) -> Result<Response, ApiError> {
        let body: CreateRequest = json_body(request)?;

        let mode = match body.mode.as_deref() {
            Some(mode) => mode.parse::<GameMode>().map_err(ApiError::BadRequest)?,
            None => self.defaults.default_mode,
        };
        let source = match body.source.as_deref() {
            Some(source) => source.parse::<MusicSourceKind>()?,
            None => MusicSourceKind::Mock,
        };
        let settings = SessionSettings {
            target_count: body
                .target_count
                .unwrap_or(self.defaults.default_target_count),
            mode,
            source,
            access_token: body.access_token,
        };

        self.registry.create_session(&body.session_id, settings)?;
        let status = self.registry.status(body.session_id.trim())?;
        Ok(Response::json(&status).with_status_code(201))
    }

    fn handle_list(&self) -> Result<Response, ApiError> {
        Ok(Response::json(&SessionList {
            sessions: self.registry.list_joinable(),
        }))
    }

    fn handle_status(&self, session_id: &str) -> Result<Response, ApiError> {
        Ok(Response::json(&self.registry.status(session_id)?))
    }

    fn handle_join(&self, request: &Request) -> Result<Response, ApiError> {
        let body: JoinRequest = json_body(request)?;
        self.registry
            .join_session(&body.session_id, &body.player_name)?;
        Ok(Response::json(&self.registry.status(&body.session_id)?))
    }

    fn handle_start(&self, request: &Request) -> Result<Response, ApiError> {
        let body: SessionRequest = json_body(request)?;
        let notified = self.registry.start_session(&body.session_id)?;
        Ok(Response::json(&StartResponse {
            session_id: body.session_id,
            notified,
        }))
    }

    fn handle_authenticate(&self, request: &Request) -> Result<Response, ApiError> {
        let body: AuthenticateRequest = json_body(request)?;
        self.registry
            .authenticate(&body.session_id, &body.access_token)?;
        Ok(Response::empty_204())
    }
}

fn json_body<T: DeserializeOwned>(request: &Request) -> Result<T, ApiError> {
    rouille::input::json_input(request)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    session_id: String,
    target_count: Option<usize>,
    mode: Option<String>,
    source: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JoinRequest {
    session_id: String,
    player_name: String,
}

#[derive(Debug, Deserialize)]
struct SessionRequest {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct AuthenticateRequest {
    session_id: String,
    access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionList {
    pub sessions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
    pub notified: Vec<String>,
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
