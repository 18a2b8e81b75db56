//! The `/api/chat` endpoint.

use std::sync::Arc;

use agent_studio_composio::ComposioBroker;
use agent_studio_core::tool::ToolBroker;
use agent_studio_core::{ChatTurn, ModelClient, Orchestrator, OrchestratorOptions, sink};
use agent_studio_model::ModelMessage;
use agent_studio_openai_model::OpenAIProvider;
use agent_studio_protocol::{ChatMessage, ChatRequest, Role, normalize_toolkits};
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::error::ApiError;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Shared state of the HTTP handlers.
///
/// The model and the broker are optional: a server without credentials
/// still starts and answers chat requests with a configuration error.
#[derive(Clone)]
pub struct AppState {
    model: Option<ModelClient>,
    broker: Option<Arc<dyn ToolBroker>>,
    options: OrchestratorOptions,
    stream_buffer: usize,
}

impl AppState {
    /// Creates a state without a model and a broker.
    pub fn new(options: OrchestratorOptions, stream_buffer: usize) -> Self {
        Self {
            model: None,
            broker: None,
            options,
            stream_buffer,
        }
    }

    /// Sets the model used by every turn.
    #[inline]
    pub fn with_model(mut self, model: ModelClient) -> Self {
        self.model = Some(model);
        self
    }

    /// Sets the tool broker used by every turn.
    #[inline]
    pub fn with_broker(mut self, broker: Arc<dyn ToolBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Creates the state described by a server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        let options = OrchestratorOptions {
            system_prompt: config.system_prompt.clone(),
            progress_style: config.progress_style,
        };
        let client = reqwest::Client::new();
        let mut state = Self::new(options, config.stream_buffer);
        if let Some(openai) = &config.openai {
            let provider = OpenAIProvider::with_client(client.clone(), openai.clone());
            state = state.with_model(ModelClient::new(provider));
        }
        if let Some(composio) = &config.composio {
            let broker = ComposioBroker::with_client(client, composio.clone());
            state = state.with_broker(Arc::new(broker));
        }
        state
    }
}

/// Builds the HTTP routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::BadRequest(format!("invalid request body: {err}")))?;
    if request.user_id.is_empty() {
        return Err(ApiError::BadRequest("Missing userId".to_owned()));
    }
    let broker = state
        .broker
        .clone()
        .ok_or(ApiError::NotConfigured("COMPOSIO_API_KEY"))?;
    let model = state
        .model
        .clone()
        .ok_or(ApiError::NotConfigured("OPENAI_API_KEY"))?;

    let toolkits = normalize_toolkits(&request.toolkits);
    info!(
        user_id = request.user_id.as_str(),
        messages = request.messages.len(),
        ?toolkits,
        "chat request"
    );
    let tools = if toolkits.is_empty() {
        vec![]
    } else {
        broker
            .list_tools(&request.user_id, &toolkits)
            .await
            .map_err(|err| {
                error!("failed to list tools: {err}");
                ApiError::Upstream(format!("failed to list tools: {}", err.reason()))
            })?
    };

    let turn = ChatTurn {
        messages: request.messages.into_iter().map(model_message).collect(),
        user_id: request.user_id,
        tools,
    };
    let span = info_span!("chat turn", user_id = turn.user_id.as_str());
    let orchestrator = Orchestrator::new(model, broker, state.options.clone());
    let (sink, stream) = sink::channel(state.stream_buffer);
    tokio::spawn(
        async move {
            // Failures are already reported on the stream.
            _ = orchestrator.run(turn, sink).await;
        }
        .instrument(span),
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

fn model_message(message: ChatMessage) -> ModelMessage {
    match message.role {
        Role::User => ModelMessage::User(message.content),
        Role::Assistant => ModelMessage::assistant(message.content),
        Role::System => ModelMessage::System(message.content),
    }
}
