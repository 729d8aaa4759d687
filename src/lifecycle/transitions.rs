//! Guards and state transitions that need no storage
//!
//! The manager loads rows, asks these functions whether the caller may act
//! and what the rows should become, then writes the result in one commit.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::auth::{Agent, Contractor};
use crate::error::{AppError, Result};
use crate::models::{
    Application, ApplicationStatus, InvoiceStatus, Job, JobStatus, UpdateWorkPlanRequest,
    WorkPlan,
};

pub const MAX_TITLE_LEN: usize = 200;

/// The agent must own the job
pub fn ensure_job_owner(job: &Job, agent: &Agent) -> Result<()> {
    if job.agent_id != agent.id() {
        return Err(AppError::Forbidden(
            "Not authorized for this job".to_string(),
        ));
    }
    Ok(())
}

/// The contractor must be the one the job was assigned to
pub fn ensure_assigned_contractor(job: &Job, contractor: &Contractor) -> Result<()> {
    if job.assigned_contractor_id != Some(contractor.id()) {
        return Err(AppError::Forbidden(
            "Not assigned to this job".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_job_status(job: &Job, expected: JobStatus, message: &str) -> Result<()> {
    if job.status != expected {
        return Err(AppError::InvalidState(format!(
            "{} (job is {})",
            message,
            job.status.as_str()
        )));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::BadRequest("Title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::BadRequest(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

/// Money amounts must be finite and non-negative
pub fn validate_amount(amount: f64, field: &str) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::BadRequest(format!(
            "{} must be a non-negative number",
            field
        )));
    }
    Ok(())
}

/// A plan may not end before it starts; open-ended ranges are fine
pub fn validate_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::BadRequest(format!(
                "end_date {} is before start_date {}",
                end, start
            )));
        }
    }
    Ok(())
}

/// Status changes produced by approving one application of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPlan {
    pub approve: Uuid,
    pub reject: Vec<Uuid>,
}

impl ApprovalPlan {
    /// The target wins regardless of submission order. Every other application
    /// that is not already rejected or withdrawn becomes REJECTED.
    pub fn compute(target: &Application, applications: &[Application]) -> Result<Self> {
        if target.status != ApplicationStatus::Submitted {
            return Err(AppError::InvalidState(format!(
                "Only submitted applications can be approved (application is {})",
                target.status.as_str()
            )));
        }

        let reject = applications
            .iter()
            .filter(|a| a.id != target.id && a.job_id == target.job_id)
            .filter(|a| !a.status.is_terminal())
            .map(|a| a.id)
            .collect();

        Ok(Self {
            approve: target.id,
            reject,
        })
    }
}

/// Overwrite only the fields present in `patch`
pub fn apply_work_plan_patch(plan: &mut WorkPlan, patch: UpdateWorkPlanRequest) -> Result<()> {
    if let Some(status) = patch.status {
        if !plan.status.can_advance_to(status) {
            return Err(AppError::InvalidState(format!(
                "Work plan cannot move from {} to {}",
                plan.status.as_str(),
                status.as_str()
            )));
        }
    }
    validate_date_range(
        patch.start_date.or(plan.start_date),
        patch.end_date.or(plan.end_date),
    )?;

    if let Some(description) = patch.plan_description {
        plan.plan_description = Some(description);
    }
    if let Some(start) = patch.start_date {
        plan.start_date = Some(start);
    }
    if let Some(end) = patch.end_date {
        plan.end_date = Some(end);
    }
    if let Some(status) = patch.status {
        plan.status = status;
    }
    plan.updated_at = Utc::now();

    Ok(())
}

pub fn ensure_invoice_transition(current: InvoiceStatus, next: InvoiceStatus) -> Result<()> {
    if !current.can_advance_to(next) {
        return Err(AppError::InvalidState(format!(
            "Invoice cannot move from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }
    Ok(())
}
