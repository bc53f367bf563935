use crate::assistant::{ Assistant, ProxyError };
use crate::cli::Args;
use crate::config::content::SiteContent;
use crate::mail::Mailer;
use crate::models::chat::{ ChatErrorBody, ChatReply, ChatRequest };
use crate::models::contact::{ ContactError, ContactSubmission, ContactSuccess };
use crate::stream;
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    body::{ Body, Bytes },
    extract::{ Request, State },
    http::{ header, HeaderName, StatusCode },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
};
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{ Any, CorsLayer };
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;
use log::{ info, warn, error };

type ApiRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct AppState {
    assistant: Arc<Assistant>,
    mailer: Arc<dyn Mailer>,
    content: Arc<SiteContent>,
    greeting: String,
    limiter: Option<Arc<ApiRateLimiter>>,
}

impl AppState {
    pub fn new(
        assistant: Assistant,
        mailer: Arc<dyn Mailer>,
        content: SiteContent,
        greeting: String,
        rate_limit_per_second: u32
    ) -> Self {
        let limiter = NonZeroU32::new(rate_limit_per_second).map(|rate| {
            Arc::new(RateLimiter::direct(Quota::per_second(rate)))
        });
        if limiter.is_none() {
            warn!("API rate limiting disabled.");
        }
        Self {
            assistant: Arc::new(assistant),
            mailer,
            content: Arc::new(content),
            greeting,
            limiter,
        }
    }
}

#[derive(Serialize)]
struct ContentResponse<'a> {
    greeting: &'a str,
    #[serde(flatten)]
    content: &'a SiteContent,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
    mailer: &'static str,
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/contact", post(contact_handler))
        .route("/api/content", get(content_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(api)
        .route("/health", get(health_handler))
        // Cors needs a `Default` response body, so the limit wraps it.
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(max_body_bytes)).layer(cors))
        .with_state(state)
}

pub async fn start_http_server(
    args: &Args,
    state: AppState
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = args.server_addr
        .parse::<SocketAddr>()
        .map_err(|e| format!("Invalid server address '{}': {}", args.server_addr, e))?;
    let app = router(state, args.max_body_bytes);

    if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                // axum-server may pull in more than one rustls backend; pin ring.
                let _ = rustls::crypto::ring::default_provider().install_default();
                info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
                let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    cert_path,
                    key_path
                ).await?;
                info!("HTTPS server listening on: https://{}", addr);
                axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        let listener = tokio::net::TcpListener
            ::bind(addr).await
            .map_err(|e| format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e))?;
        info!("HTTP server listening on: http://{}", addr);
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            warn!("Rate limit exceeded for {} {}", req.method(), req.uri().path());
            return chat_error(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
                "Please wait a moment before trying again."
            );
        }
    }
    next.run(req).await
}

fn chat_error(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(ChatErrorBody {
            error: error.to_string(),
            message: message.to_string(),
        }),
    ).into_response()
}

async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let req: ChatRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            warn!("[{}] rejected chat request: {}", request_id, e);
            return chat_error(StatusCode::BAD_REQUEST, "Invalid chat request", &e.to_string());
        }
    };
    info!("[{}] chat request with {} history messages", request_id, req.history.len());

    let assistant = &state.assistant;
    if assistant.settings().stream {
        match assistant.stream_reply(&request_id, &req).await {
            Ok(encoded) =>
                (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, stream::CONTENT_TYPE),
                        (HeaderName::from_static(stream::PROTOCOL_HEADER), stream::PROTOCOL_VERSION),
                    ],
                    Body::from_stream(encoded),
                ).into_response(),
            Err(e) => proxy_error_response(assistant, e),
        }
    } else {
        match assistant.reply(&request_id, &req).await {
            Ok(message) => (StatusCode::OK, Json(ChatReply { message })).into_response(),
            Err(e) => proxy_error_response(assistant, e),
        }
    }
}

fn proxy_error_response(assistant: &Assistant, err: ProxyError) -> Response {
    match err {
        ProxyError::InvalidRequest(detail) => {
            chat_error(StatusCode::BAD_REQUEST, "Invalid chat request", &detail)
        }
        ProxyError::Upstream(_) =>
            chat_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process chat request",
                &assistant.settings().error_message
            ),
    }
}

async fn contact_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let submission: ContactSubmission = match serde_json::from_slice(&body) {
        Ok(submission) => submission,
        Err(e) => {
            warn!("Rejected contact request body: {}", e);
            return contact_error(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    if !submission.is_complete() {
        return contact_error(StatusCode::BAD_REQUEST, "All fields are required");
    }

    match state.mailer.send(&submission).await {
        Ok(()) =>
            (
                StatusCode::OK,
                Json(ContactSuccess {
                    success: true,
                    message: "Message sent successfully".into(),
                }),
            ).into_response(),
        Err(e) => {
            error!("Contact relay via {} failed: {}", state.mailer.name(), e);
            contact_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send message")
        }
    }
}

fn contact_error(status: StatusCode, error: &str) -> Response {
    (status, Json(ContactError { error: error.to_string() })).into_response()
}

async fn content_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(ContentResponse {
        greeting: &state.greeting,
        content: &state.content,
    }).into_response()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        model: state.assistant.model(),
        mailer: state.mailer.name(),
    })
}
