//! Protected article form.
//!
//! Renders a form whose fields are locked by a `_Token` digest bound to the
//! visitor's session, and verifies submissions against it.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use rand::RngCore;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::form::{Form, FormElement, SubmittedData, TokenContext, Verification};
use crate::state::AppState;
use crate::theme::html_escape;

/// Path the article form is served from and posts to.
pub const ARTICLE_ADD_PATH: &str = "/articles/add";

/// Session key for the identifier that binds form tokens to a session.
const FORM_SESSION_KEY: &str = "form_session_id";

/// The article form definition.
pub fn article_form() -> Form {
    Form::new("article_add")
        .action(ARTICLE_ADD_PATH)
        .title("New article")
        .element(
            "Article.title",
            FormElement::textfield()
                .title("Title")
                .required()
                .max_length(200),
        )
        .element(
            "Article.body",
            FormElement::textarea(8).title("Body").weight(1),
        )
        .element(
            "Article.tags",
            FormElement::checkboxes(vec![
                ("news".to_string(), "News".to_string()),
                ("rust".to_string(), "Rust".to_string()),
            ])
            .title("Tags")
            .weight(2),
        )
        .element(
            "Article.notes",
            FormElement::textarea(3)
                .title("Editor notes")
                .unlocked()
                .weight(3),
        )
        .element("Article.status", FormElement::hidden("draft"))
        .element("save", FormElement::submit("Save").named().weight(10))
}

/// Get the form session identifier, creating one on first use.
async fn form_session_id(session: &Session) -> AppResult<String> {
    let existing: Option<String> = session
        .get(FORM_SESSION_KEY)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read session: {e}"))?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let id = hex::encode(bytes);
    session
        .insert(FORM_SESSION_KEY, &id)
        .await
        .map_err(|e| anyhow::anyhow!("failed to store form session: {e}"))?;
    Ok(id)
}

/// GET /articles/add
async fn add_form(State(state): State<AppState>, session: Session) -> AppResult<Html<String>> {
    let session_id = form_session_id(&session).await?;
    let ctx = TokenContext::new(ARTICLE_ADD_PATH, session_id).debug(state.config().debug);
    let rendered = state.form_builder().render(&article_form(), &ctx)?;

    Ok(Html(format!(
        "<!DOCTYPE html><html><head><title>{}</title></head><body>{}</body></html>",
        html_escape("New article"),
        rendered.html
    )))
}

/// POST /articles/add
async fn add_submit(
    State(state): State<AppState>,
    session: Session,
    body: String,
) -> AppResult<(StatusCode, String)> {
    let session_id: Option<String> = session
        .get(FORM_SESSION_KEY)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read session: {e}"))?;
    let Some(session_id) = session_id else {
        return Err(AppError::BadRequest("form session expired".to_string()));
    };

    let data = SubmittedData::from_urlencoded(&body);
    match state
        .guard()
        .verify_detailed(&data, ARTICLE_ADD_PATH, &session_id)
    {
        Verification::Valid => {
            info!(fields = data.pairs().len(), "article submission accepted");
            Ok((StatusCode::OK, "saved".to_string()))
        }
        Verification::Rejected(reasons) => {
            warn!(?reasons, "article submission rejected");
            Err(AppError::BadRequest("form token mismatch".to_string()))
        }
    }
}

/// Create the article router.
pub fn router() -> Router<AppState> {
    Router::new().route(ARTICLE_ADD_PATH, get(add_form).post(add_submit))
}
