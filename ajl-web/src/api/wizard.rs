//! Journey submission wizard sessions
//!
//! Each draft belongs to the session that opened it; other sessions get 404
//! for its id. A draft is dropped once it is submitted, discarded or left
//! idle for too long.

use ajl_common::db::claims;
use ajl_common::db::journeys::{submit_journey, SubmittedJourney};
use ajl_common::wizard::evidence::MAX_EVIDENCE_BYTES;
use ajl_common::wizard::{
    DraftPatch, FileAttachment, PrivacyChecks, StepField, SubmissionWizard, ValidationErrors,
    WizardSnapshot, WizardStatus, MAX_STEPS, MIN_STEPS,
};
use ajl_common::{RouteId, WorkshopEvent};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{delete, patch, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::caller::Caller;
use crate::error::{ApiError, ApiResult};
use crate::{AppState, WizardSession};

/// Room for the largest accepted image plus request overhead
const UPLOAD_BODY_LIMIT: usize = MAX_EVIDENCE_BYTES + 1024 * 1024;

#[derive(Serialize)]
struct WizardView<'a> {
    id: Uuid,
    #[serde(flatten)]
    snapshot: WizardSnapshot<'a>,
}

fn view(id: Uuid, wizard: &SubmissionWizard) -> ApiResult<Json<Value>> {
    serde_json::to_value(WizardView {
        id,
        snapshot: wizard.snapshot(),
    })
    .map(Json)
    .map_err(|e| ApiError::Internal(format!("Could not serialize wizard: {}", e)))
}

fn draft_not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Draft {}", id))
}

/// Lock the caller's draft `id`
async fn open_draft(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
    write: bool,
) -> ApiResult<OwnedMutexGuard<WizardSession>> {
    if write {
        caller.require_write(RouteId::Wizard)?;
    } else {
        caller.require_view(RouteId::Wizard)?;
    }
    let identity = caller.identity()?;

    let draft = state.wizards.get(&id).await.ok_or_else(|| draft_not_found(id))?;
    if draft.owner != identity.session_id {
        return Err(draft_not_found(id));
    }
    let mut session = draft.session.lock_owned().await;
    session.touch();
    Ok(session)
}

fn ensure_open(session: &WizardSession) -> ApiResult<()> {
    match session.wizard.status() {
        WizardStatus::Submitted { .. } => {
            Err(ApiError::Conflict("This journey has already been submitted".to_string()))
        }
        _ => Ok(()),
    }
}

/// Refuse a link to a claim that is not stored (any more)
async fn check_linked_claim(state: &AppState, claim_id: Option<&str>) -> ApiResult<()> {
    let Some(claim_id) = claim_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(());
    };
    if claims::claim_exists(&state.db, claim_id).await? {
        return Ok(());
    }
    let mut errors = ValidationErrors::new();
    errors.insert(
        "linkedClaimId",
        "That claim is no longer listed. Pick another or leave the journey unlinked.",
    );
    Err(ApiError::Validation(errors))
}

/// POST /api/wizard
///
/// A session has one draft at a time; asking again returns the open one.
pub async fn create_draft(State(state): State<AppState>, caller: Caller) -> ApiResult<(StatusCode, Json<Value>)> {
    caller.require_write(RouteId::Wizard)?;
    let identity = caller.identity()?;

    let (id, session, created) = state
        .wizards
        .open_for(identity.session_id, || SubmissionWizard::for_identity(identity))
        .await;
    let mut session = session.lock().await;
    session.touch();
    let body = view(id, &session.wizard)?;

    if created {
        info!(draft = %id, session = %identity.session_id, "Draft opened");
        Ok((StatusCode::CREATED, body))
    } else {
        debug!(draft = %id, session = %identity.session_id, "Draft resumed");
        Ok((StatusCode::OK, body))
    }
}

/// GET /api/wizard/:id
pub async fn get_draft(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let session = open_draft(&state, &caller, id, false).await?;
    view(id, &session.wizard)
}

/// PUT /api/wizard/:id
pub async fn edit_draft(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(patch): Json<DraftPatch>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    check_linked_claim(&state, patch.linked_claim_id.as_deref()).await?;
    session.wizard.edit(patch)?;
    view(id, &session.wizard)
}

/// DELETE /api/wizard/:id
pub async fn discard_draft(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let session = open_draft(&state, &caller, id, false).await?;
    drop(session);
    state.wizards.remove(&id).await;
    info!(draft = %id, "Draft discarded");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/wizard/:id/next
///
/// Answers 200 either way; a blocked step comes back with its errors filled in.
pub async fn next_step(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    session.wizard.go_next();
    view(id, &session.wizard)
}

/// POST /api/wizard/:id/back
pub async fn previous_step(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    session.wizard.go_back();
    view(id, &session.wizard)
}

/// POST /api/wizard/:id/steps
pub async fn add_step(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    ensure_open(&session)?;
    if !session.wizard.add_step() {
        return Err(ApiError::BadRequest(format!("A journey has at most {} steps.", MAX_STEPS)));
    }
    view(id, &session.wizard)
}

/// DELETE /api/wizard/:id/steps/:idx
pub async fn remove_step(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, idx)): Path<(Uuid, usize)>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    ensure_open(&session)?;
    if !session.wizard.remove_step(idx) {
        return Err(ApiError::BadRequest(format!(
            "A journey needs at least {} steps.",
            MIN_STEPS
        )));
    }
    view(id, &session.wizard)
}

#[derive(Debug, Deserialize)]
pub struct StepEdit {
    pub field: StepField,
    pub value: String,
}

/// PATCH /api/wizard/:id/steps/:idx
pub async fn update_step(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, idx)): Path<(Uuid, usize)>,
    Json(edit): Json<StepEdit>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    ensure_open(&session)?;
    if !session.wizard.update_step(idx, edit.field, edit.value) {
        return Err(ApiError::NotFound(format!("Step {}", idx)));
    }
    view(id, &session.wizard)
}

/// POST /api/wizard/:id/privacy
pub async fn accept_privacy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(checks): Json<PrivacyChecks>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    ensure_open(&session)?;
    session.wizard.accept_privacy_gate(checks)?;
    view(id, &session.wizard)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewEvidenceRequest {
    Url { url: String, caption: String },
    File { caption: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceAdded {
    pub evidence_id: String,
    pub wizard: Value,
}

/// POST /api/wizard/:id/evidence
pub async fn add_evidence(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(request): Json<NewEvidenceRequest>,
) -> ApiResult<(StatusCode, Json<EvidenceAdded>)> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    let evidence_id = match request {
        NewEvidenceRequest::Url { url, caption } => session.wizard.add_url_evidence(&url, &caption)?,
        NewEvidenceRequest::File { caption } => session.wizard.request_file_evidence(&caption)?,
    };
    let Json(wizard) = view(id, &session.wizard)?;
    Ok((StatusCode::CREATED, Json(EvidenceAdded { evidence_id, wizard })))
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub filename: Option<String>,
}

/// PUT /api/wizard/:id/evidence/:eid/file
///
/// The raw request body is the image; its type comes from `Content-Type`.
pub async fn attach_file(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, evidence_id)): Path<(Uuid, String)>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let file_name = query.filename.unwrap_or_else(|| "upload".to_string());
    let attachment = FileAttachment::new(file_name, content_type, body.to_vec())?;
    session.wizard.attach_file(&evidence_id, attachment)?;
    view(id, &session.wizard)
}

#[derive(Debug, Deserialize)]
pub struct EvidenceEdit {
    pub caption: Option<String>,
    pub url: Option<String>,
}

/// PATCH /api/wizard/:id/evidence/:eid
pub async fn edit_evidence(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, evidence_id)): Path<(Uuid, String)>,
    Json(edit): Json<EvidenceEdit>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    if let Some(caption) = edit.caption {
        session.wizard.update_caption(&evidence_id, &caption)?;
    }
    if let Some(url) = edit.url {
        session.wizard.update_evidence_url(&evidence_id, &url)?;
    }
    view(id, &session.wizard)
}

/// DELETE /api/wizard/:id/evidence/:eid
pub async fn remove_evidence(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, evidence_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    session.wizard.remove_evidence(&evidence_id)?;
    view(id, &session.wizard)
}

/// POST /api/wizard/:id/guidance
pub async fn add_guidance(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    ensure_open(&session)?;
    session.wizard.add_guidance_url()?;
    view(id, &session.wizard)
}

#[derive(Debug, Deserialize)]
pub struct GuidanceEdit {
    pub url: String,
}

/// PUT /api/wizard/:id/guidance/:idx
pub async fn update_guidance(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, idx)): Path<(Uuid, usize)>,
    Json(edit): Json<GuidanceEdit>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    ensure_open(&session)?;
    if !session.wizard.update_guidance_url(idx, &edit.url)? {
        return Err(ApiError::NotFound(format!("Guidance URL {}", idx)));
    }
    view(id, &session.wizard)
}

/// DELETE /api/wizard/:id/guidance/:idx
pub async fn remove_guidance(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, idx)): Path<(Uuid, usize)>,
) -> ApiResult<Json<Value>> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    ensure_open(&session)?;
    if !session.wizard.remove_guidance_url(idx)? {
        return Err(ApiError::BadRequest(
            "Keep at least one guidance URL field.".to_string(),
        ));
    }
    view(id, &session.wizard)
}

/// POST /api/wizard/:id/submit
///
/// Validation failures come back as 422 with the wizard moved to the first
/// failing step. A storage failure keeps the draft for another attempt.
pub async fn submit_draft(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<SubmittedJourney>)> {
    let mut session = open_draft(&state, &caller, id, true).await?;
    let identity = caller.identity()?;

    let plan = session
        .wizard
        .prepare_submission(identity, &state.settings.journey_code_prefix, Utc::now())?;
    check_linked_claim(&state, plan.journey.claimed_statement_id.as_deref()).await?;

    match submit_journey(&state.db, &state.object_store, &plan).await {
        Ok(submitted) => {
            session.wizard.mark_submitted(&submitted.id, &submitted.journey_code);
            drop(session);
            state.wizards.remove(&id).await;

            state.event_bus.emit_lossy(WorkshopEvent::JourneySubmitted {
                journey_id: submitted.id.clone(),
                journey_code: submitted.journey_code.clone(),
                group_id: plan.journey.group_id.clone(),
                timestamp: Utc::now(),
            });
            Ok((StatusCode::CREATED, Json(submitted)))
        }
        Err(e) => {
            error!(draft = %id, "Journey submission failed: {}", e);
            let message = format!("Could not submit journey: {}", e);
            session.wizard.mark_failed(message.clone());
            Err(ApiError::Internal(message))
        }
    }
}

pub fn wizard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/wizard", post(create_draft))
        .route(
            "/api/wizard/:id",
            put(edit_draft).get(get_draft).delete(discard_draft),
        )
        .route("/api/wizard/:id/next", post(next_step))
        .route("/api/wizard/:id/back", post(previous_step))
        .route("/api/wizard/:id/steps", post(add_step))
        .route("/api/wizard/:id/steps/:idx", delete(remove_step).patch(update_step))
        .route("/api/wizard/:id/privacy", post(accept_privacy))
        .route("/api/wizard/:id/evidence", post(add_evidence))
        .route(
            "/api/wizard/:id/evidence/:eid",
            patch(edit_evidence).delete(remove_evidence),
        )
        .route(
            "/api/wizard/:id/evidence/:eid/file",
            put(attach_file).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/wizard/:id/guidance", post(add_guidance))
        .route(
            "/api/wizard/:id/guidance/:idx",
            put(update_guidance).delete(remove_guidance),
        )
        .route("/api/wizard/:id/submit", post(submit_draft))
}
