pub mod routes;
pub mod sessions;

use crate::{
    config::{Config, SessionLimits, UploadLimits},
    error::{AlchemistError, Result},
    gemini::AlchemistClient,
};
use actix_web::{http::StatusCode, middleware, web, App, HttpResponse, HttpServer, ResponseError};
use serde_json::json;

pub use sessions::SessionStore;

pub struct AppState {
    pub client: AlchemistClient,
    pub sessions: SessionStore,
    pub limits: UploadLimits,
}

impl AppState {
    pub fn new(client: AlchemistClient, limits: UploadLimits, sessions: SessionLimits) -> Self {
        Self {
            client,
            sessions: SessionStore::with_limits(sessions),
            limits,
        }
    }
}

impl ResponseError for AlchemistError {
    fn status_code(&self) -> StatusCode {
        match self {
            AlchemistError::MissingInput(_) | AlchemistError::InvalidImage(_) => {
                StatusCode::BAD_REQUEST
            }
            AlchemistError::NotFound(_) => StatusCode::NOT_FOUND,
            AlchemistError::Busy => StatusCode::CONFLICT,
            AlchemistError::ModelResponse(_) | AlchemistError::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            AlchemistError::Config(_)
            | AlchemistError::Serialization(_)
            | AlchemistError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

/// Body limits sized for one raw upload, or two base64 images in JSON.
pub fn configure(cfg: &mut web::ServiceConfig, limits: UploadLimits) {
    let raw_limit = limits.max_image_bytes + 64 * 1024;
    let json_limit = limits.max_image_bytes / 3 * 4 * 2 + 64 * 1024;

    cfg.app_data(web::PayloadConfig::new(raw_limit))
        .app_data(web::JsonConfig::default().limit(json_limit))
        .route("/", web::get().to(routes::index))
        .route("/health", web::get().to(routes::health))
        .service(
            web::scope("/api")
                .route("/sessions", web::post().to(routes::create_session))
                .route("/sessions/{id}", web::get().to(routes::get_session))
                .route("/sessions/{id}", web::delete().to(routes::close_session))
                .route(
                    "/sessions/{id}/images/{slot}",
                    web::put().to(routes::upload_image),
                )
                .route(
                    "/sessions/{id}/images/{slot}",
                    web::delete().to(routes::clear_image),
                )
                .route("/sessions/{id}/transfer", web::post().to(routes::transfer))
                .route("/sessions/{id}/download", web::get().to(routes::download))
                .route("/style-transfer", web::post().to(routes::style_transfer))
                .route(
                    "/style-suggestions",
                    web::post().to(routes::style_suggestions),
                ),
        );
}

pub async fn run(config: Config) -> Result<()> {
    let client = AlchemistClient::new(&config.gemini)?;
    let limits = config.limits;
    let state = web::Data::new(AppState::new(client, limits, config.sessions));
    let address = config.bind_address();

    let sweeper = state.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(sweeper.sessions.limits().sweep_interval());
        loop {
            interval.tick().await;
            let removed = sweeper.sessions.sweep_idle();
            if removed > 0 {
                log::info!("Expired {} idle form session(s)", removed);
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::new("%r %s %b bytes %Dms"))
            .configure(|cfg| configure(cfg, limits))
    })
    .bind(&address)
    .map_err(|e| AlchemistError::Server(format!("Failed to bind {}: {}", address, e)))?
    .run()
    .await
    .map_err(|e| AlchemistError::Server(e.to_string()))
}
