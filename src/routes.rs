//! HTTP routes
//!
//! Handlers only translate between JSON and the lifecycle/accounts calls.
//! Role gating happens in the extractors: a handler taking [`Agent`] cannot
//! run for a contractor's token.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::{Agent, Contractor, Session};
use crate::error::Result;
use crate::models::{
    Application, ApplicationView, ApplyRequest, ApprovalOutcome, CreateJobRequest,
    CreateWorkPlanRequest, Invoice, Job, JobSearch, LoginRequest, RegisterRequest,
    SubmitInvoiceRequest, TokenResponse, UpdateInvoiceStatusRequest, UpdateWorkPlanRequest,
    User, WorkPlan,
};
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/jobs", post(post_job).get(list_open_jobs))
        .route("/jobs/agent/me", get(list_agent_jobs))
        .route("/jobs/assigned/me", get(list_assigned_jobs))
        .route("/jobs/:id", get(get_job))
        .route("/applications/apply/:job_id", post(submit_application))
        .route("/applications/job/:job_id", get(list_applications_for_job))
        .route("/applications/me", get(list_my_applications))
        .route("/applications/approve/:id", post(approve_application))
        .route("/applications/reject/:id", post(reject_application))
        .route(
            "/work-plans/:job_id",
            post(create_work_plan)
                .patch(update_work_plan)
                .get(get_work_plan),
        )
        .route(
            "/work-plans/agent-view/:job_id",
            get(get_work_plan_for_agent),
        )
        .route("/invoices/me", get(list_my_invoices))
        .route("/invoices/:id", post(submit_invoice))
        .route("/invoices/:id/status", patch(update_invoice_status))
        .route("/invoices/job/:job_id", get(get_job_invoice))
        .route("/invoices/job/:job_id/me", get(get_my_invoice_for_job))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// Accounts

async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<User>> {
    Ok(Json(state.accounts.register(request).await?))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    Ok(Json(
        state
            .accounts
            .login(request.user_id, request.password)
            .await?,
    ))
}

async fn me(State(state): State<Arc<AppState>>, session: Session) -> Result<Json<User>> {
    Ok(Json(state.accounts.me(&session).await?))
}

// Jobs

async fn post_job(
    State(state): State<Arc<AppState>>,
    agent: Agent,
    Json(request): Json<CreateJobRequest>,
) -> Result<Json<Job>> {
    Ok(Json(state.lifecycle.post_job(&agent, request).await?))
}

async fn list_open_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobSearch>,
) -> Result<Json<Vec<Job>>> {
    let search = query.search.as_deref().filter(|s| !s.is_empty());
    Ok(Json(state.lifecycle.list_open_jobs(search).await?))
}

async fn list_agent_jobs(
    State(state): State<Arc<AppState>>,
    agent: Agent,
) -> Result<Json<Vec<Job>>> {
    Ok(Json(state.lifecycle.list_agent_jobs(&agent).await?))
}

async fn list_assigned_jobs(
    State(state): State<Arc<AppState>>,
    contractor: Contractor,
) -> Result<Json<Vec<Job>>> {
    Ok(Json(state.lifecycle.list_assigned_jobs(&contractor).await?))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>> {
    Ok(Json(state.lifecycle.get_job(id).await?))
}

// Applications

async fn submit_application(
    State(state): State<Arc<AppState>>,
    contractor: Contractor,
    Path(job_id): Path<Uuid>,
    Json(request): Json<ApplyRequest>,
) -> Result<Json<Application>> {
    Ok(Json(
        state
            .lifecycle
            .submit_application(&contractor, job_id, request)
            .await?,
    ))
}

async fn list_applications_for_job(
    State(state): State<Arc<AppState>>,
    agent: Agent,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<ApplicationView>>> {
    Ok(Json(
        state
            .lifecycle
            .list_applications_for_job(&agent, job_id)
            .await?,
    ))
}

async fn list_my_applications(
    State(state): State<Arc<AppState>>,
    contractor: Contractor,
) -> Result<Json<Vec<Application>>> {
    Ok(Json(
        state.lifecycle.list_my_applications(&contractor).await?,
    ))
}

async fn approve_application(
    State(state): State<Arc<AppState>>,
    agent: Agent,
    Path(id): Path<Uuid>,
) -> Result<Json<ApprovalOutcome>> {
    Ok(Json(state.lifecycle.approve_application(&agent, id).await?))
}

async fn reject_application(
    State(state): State<Arc<AppState>>,
    agent: Agent,
    Path(id): Path<Uuid>,
) -> Result<Json<Application>> {
    Ok(Json(state.lifecycle.reject_application(&agent, id).await?))
}

// Work plans

async fn create_work_plan(
    State(state): State<Arc<AppState>>,
    contractor: Contractor,
    Path(job_id): Path<Uuid>,
    Json(request): Json<CreateWorkPlanRequest>,
) -> Result<Json<WorkPlan>> {
    Ok(Json(
        state
            .lifecycle
            .create_work_plan(&contractor, job_id, request)
            .await?,
    ))
}

async fn update_work_plan(
    State(state): State<Arc<AppState>>,
    contractor: Contractor,
    Path(job_id): Path<Uuid>,
    Json(patch): Json<UpdateWorkPlanRequest>,
) -> Result<Json<WorkPlan>> {
    Ok(Json(
        state
            .lifecycle
            .update_work_plan(&contractor, job_id, patch)
            .await?,
    ))
}

async fn get_work_plan(
    State(state): State<Arc<AppState>>,
    contractor: Contractor,
    Path(job_id): Path<Uuid>,
) -> Result<Json<WorkPlan>> {
    Ok(Json(
        state.lifecycle.get_work_plan(&contractor, job_id).await?,
    ))
}

async fn get_work_plan_for_agent(
    State(state): State<Arc<AppState>>,
    agent: Agent,
    Path(job_id): Path<Uuid>,
) -> Result<Json<WorkPlan>> {
    Ok(Json(
        state
            .lifecycle
            .get_work_plan_for_agent(&agent, job_id)
            .await?,
    ))
}

// Invoices

async fn submit_invoice(
    State(state): State<Arc<AppState>>,
    contractor: Contractor,
    Path(job_id): Path<Uuid>,
    Json(request): Json<SubmitInvoiceRequest>,
) -> Result<Json<Invoice>> {
    Ok(Json(
        state
            .lifecycle
            .submit_invoice(&contractor, job_id, request)
            .await?,
    ))
}

async fn update_invoice_status(
    State(state): State<Arc<AppState>>,
    agent: Agent,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<UpdateInvoiceStatusRequest>,
) -> Result<Json<Invoice>> {
    Ok(Json(
        state
            .lifecycle
            .update_invoice_status(&agent, invoice_id, request.status)
            .await?,
    ))
}

async fn get_job_invoice(
    State(state): State<Arc<AppState>>,
    agent: Agent,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Invoice>> {
    Ok(Json(state.lifecycle.get_job_invoice(&agent, job_id).await?))
}

async fn get_my_invoice_for_job(
    State(state): State<Arc<AppState>>,
    contractor: Contractor,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Invoice>> {
    Ok(Json(
        state
            .lifecycle
            .get_my_invoice_for_job(&contractor, job_id)
            .await?,
    ))
}

async fn list_my_invoices(
    State(state): State<Arc<AppState>>,
    contractor: Contractor,
) -> Result<Json<Vec<Invoice>>> {
    Ok(Json(state.lifecycle.list_my_invoices(&contractor).await?))
}
