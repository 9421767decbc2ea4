use crate::{
    error::{AlchemistError, Result},
    form::{FormController, FormView, Notification, SubmitTicket},
    models::{ImageDataUri, StyleTransferRequest, SuggestionRequest},
    server::AppState,
    uploader::{ImageSlot, ImageUploader, SelectedFile},
};
use actix_web::{
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    web, HttpRequest, HttpResponse, ResponseError,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../../static/index.html");
const FILE_NAME_HEADER: &str = "x-file-name";
const CANCELLED_MESSAGE: &str = "style transfer was cancelled";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub form: FormView,
    pub notifications: Vec<Notification>,
}

fn session_reply(status: StatusCode, id: Uuid, form: &mut FormController) -> HttpResponse {
    HttpResponse::build(status).json(SessionResponse {
        id,
        form: form.view(),
        notifications: form.take_notifications(),
    })
}

fn parse_slot(raw: &str) -> Result<ImageSlot> {
    raw.parse()
}

pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn create_session(state: web::Data<AppState>) -> Result<HttpResponse> {
    let id = state.sessions.create();
    state
        .sessions
        .with_form(id, |form| Ok(session_reply(StatusCode::CREATED, id, form)))
}

pub async fn get_session(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    state
        .sessions
        .with_form(id, |form| Ok(session_reply(StatusCode::OK, id, form)))
}

pub async fn close_session(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    state.sessions.remove(path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}

/// Raw image bytes in the body, typed by `Content-Type`.
pub async fn upload_image(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let (id, slot) = path.into_inner();
    let slot = parse_slot(&slot)?;

    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let file = SelectedFile::new(
        header(FILE_NAME_HEADER).unwrap_or_else(|| format!("{}-image", slot)),
        header(CONTENT_TYPE.as_str()).unwrap_or_default(),
        body.to_vec(),
    );

    state.sessions.with_form(id, |form| {
        {
            let mut uploader = ImageUploader::new(
                slot,
                state.limits,
                |file: Option<&SelectedFile>, uri: Option<&ImageDataUri>| {
                    form.handle_upload(slot, file, uri)
                },
            );
            uploader.select(file)?;
        }
        Ok(session_reply(StatusCode::OK, id, form))
    })
}

pub async fn clear_image(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse> {
    let (id, slot) = path.into_inner();
    let slot = parse_slot(&slot)?;

    state.sessions.with_form(id, |form| {
        ImageUploader::new(
            slot,
            state.limits,
            |file: Option<&SelectedFile>, uri: Option<&ImageDataUri>| {
                form.handle_upload(slot, file, uri)
            },
        )
        .clear();
        Ok(session_reply(StatusCode::OK, id, form))
    })
}

/// Settles a submission as cancelled if the handler is dropped while the
/// model call is still running.
struct InFlightSubmit {
    state: web::Data<AppState>,
    id: Uuid,
    ticket: SubmitTicket,
    armed: bool,
}

impl InFlightSubmit {
    fn new(state: web::Data<AppState>, id: Uuid, ticket: SubmitTicket) -> Self {
        Self {
            state,
            id,
            ticket,
            armed: true,
        }
    }

    fn complete(mut self) -> SubmitTicket {
        self.armed = false;
        self.ticket
    }
}

impl Drop for InFlightSubmit {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::warn!("Style transfer for session {} was cancelled", self.id);
        let ticket = self.ticket;
        let _ = self.state.sessions.with_form(self.id, |form| {
            form.finish_submit(
                ticket,
                Err(AlchemistError::Transport(CANCELLED_MESSAGE.to_string())),
            )
        });
    }
}

/// One submit cycle; the session lock is released while the model runs.
pub async fn transfer(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let id = path.into_inner();

    let begun = state.sessions.with_form(id, |form| Ok(form.begin_submit()))?;
    let (ticket, request) = match begun {
        Ok(submission) => submission,
        Err(AlchemistError::Busy) => return Err(AlchemistError::Busy),
        Err(err) => {
            return state
                .sessions
                .with_form(id, |form| Ok(session_reply(err.status_code(), id, form)))
        }
    };

    let in_flight = InFlightSubmit::new(state.clone(), id, ticket);
    let outcome = state.client.style().transfer(request).await;
    let ticket = in_flight.complete();

    state.sessions.with_form(id, |form| {
        let status = match form.finish_submit(ticket, outcome) {
            Ok(()) => StatusCode::OK,
            Err(err) => err.status_code(),
        };
        Ok(session_reply(status, id, form))
    })
}

pub async fn download(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let file = state
        .sessions
        .with_form(id, |form| form.download())?
        .ok_or_else(|| AlchemistError::NotFound("no stylized image yet".into()))?;

    Ok(HttpResponse::Ok()
        .content_type(file.mime_type)
        .insert_header((
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.file_name),
        ))
        .body(file.bytes))
}

pub async fn style_transfer(
    state: web::Data<AppState>,
    request: web::Json<StyleTransferRequest>,
) -> Result<HttpResponse> {
    let response = state.client.style().transfer(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn style_suggestions(
    state: web::Data<AppState>,
    request: web::Json<SuggestionRequest>,
) -> Result<HttpResponse> {
    let response = state
        .client
        .suggestions()
        .suggest(request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}
