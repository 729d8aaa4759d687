//! Job lifecycle manager
//!
//! Each operation runs in one store transaction: caller relationship first,
//! then state preconditions, then writes, then a single commit. Any guard
//! failure returns before the commit and the transaction rolls back on drop.

use chrono::Utc;
use uuid::Uuid;

use super::transitions::{
    apply_work_plan_patch, ensure_assigned_contractor, ensure_invoice_transition,
    ensure_job_owner, ensure_job_status, validate_amount, validate_date_range, validate_title,
    ApprovalPlan,
};
use crate::auth::{Agent, Contractor};
use crate::error::{AppError, Result};
use crate::models::{
    Application, ApplicationStatus, ApplicationView, ApplyRequest, ApprovalOutcome,
    CreateJobRequest, CreateWorkPlanRequest, Invoice, InvoiceStatus, Job, JobStatus,
    SubmitInvoiceRequest, UpdateWorkPlanRequest, WorkPlan, WorkPlanStatus,
};
use crate::store::{Store, StoreTx};

/// Stateless rule engine over the record store
#[derive(Clone)]
pub struct LifecycleManager {
    store: Store,
}

impl LifecycleManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    // Jobs

    pub async fn post_job(&self, agent: &Agent, request: CreateJobRequest) -> Result<Job> {
        validate_title(&request.title)?;
        if let Some(budget) = request.budget {
            validate_amount(budget, "budget")?;
        }

        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            title: request.title,
            description: request.description,
            budget: request.budget,
            status: JobStatus::Open,
            agent_id: agent.id(),
            assigned_contractor_id: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin_write().await?;
        tx.insert_job(&job).await?;
        tx.commit().await?;

        tracing::info!(job_id = %job.id, agent_id = %agent.id(), "Job posted");
        Ok(job)
    }

    pub async fn list_open_jobs(&self, search: Option<&str>) -> Result<Vec<Job>> {
        let mut tx = self.store.begin().await?;
        tx.list_open_jobs(search).await
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        let mut tx = self.store.begin().await?;
        load_job(&mut tx, job_id).await
    }

    pub async fn list_agent_jobs(&self, agent: &Agent) -> Result<Vec<Job>> {
        let mut tx = self.store.begin().await?;
        tx.list_jobs_for_agent(agent.id()).await
    }

    pub async fn list_assigned_jobs(&self, contractor: &Contractor) -> Result<Vec<Job>> {
        let mut tx = self.store.begin().await?;
        tx.list_jobs_assigned_to(contractor.id()).await
    }

    // Applications

    pub async fn submit_application(
        &self,
        contractor: &Contractor,
        job_id: Uuid,
        request: ApplyRequest,
    ) -> Result<Application> {
        validate_amount(request.proposed_cost, "proposed_cost")?;

        let mut tx = self.store.begin_write().await?;
        let job = load_job(&mut tx, job_id).await?;
        ensure_job_status(&job, JobStatus::Open, "Job not open")?;

        if tx.has_submitted_application(job_id, contractor.id()).await? {
            return Err(AppError::DuplicateApplication(
                "Already applied to this job".to_string(),
            ));
        }

        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            job_id,
            contractor_id: contractor.id(),
            proposed_cost: request.proposed_cost,
            status: ApplicationStatus::Submitted,
            created_at: now,
            updated_at: now,
        };
        tx.insert_application(&application).await?;
        tx.commit().await?;

        tracing::info!(
            application_id = %application.id,
            job_id = %job_id,
            contractor_id = %contractor.id(),
            "Application submitted"
        );
        Ok(application)
    }

    /// Approve one application: it becomes APPROVED, its live siblings become
    /// REJECTED, and the job moves OPEN -> ASSIGNED, all in one commit.
    pub async fn approve_application(
        &self,
        agent: &Agent,
        application_id: Uuid,
    ) -> Result<ApprovalOutcome> {
        let mut tx = self.store.begin_write().await?;
        let application = load_application(&mut tx, application_id).await?;
        let job = load_job(&mut tx, application.job_id).await?;

        ensure_job_owner(&job, agent)?;
        ensure_job_status(&job, JobStatus::Open, "Job not open for approval")?;

        let siblings = tx.list_applications_for_job(job.id).await?;
        let plan = ApprovalPlan::compute(&application, &siblings)?;

        if !tx.assign_open_job(job.id, application.contractor_id).await? {
            return Err(AppError::InvalidState(
                "Job not open for approval".to_string(),
            ));
        }
        tx.set_application_status(plan.approve, ApplicationStatus::Approved)
            .await?;
        for id in &plan.reject {
            tx.set_application_status(*id, ApplicationStatus::Rejected)
                .await?;
        }

        let application = load_application(&mut tx, application_id).await?;
        let job = load_job(&mut tx, job.id).await?;
        tx.commit().await?;

        tracing::info!(
            application_id = %application.id,
            job_id = %job.id,
            contractor_id = %application.contractor_id,
            rejected = plan.reject.len(),
            "Application approved, job assigned"
        );

        Ok(ApprovalOutcome {
            application,
            job,
            rejected_application_ids: plan.reject,
        })
    }

    /// Reject an application. No job-status guard: stale or even approved
    /// applications can be rejected.
    pub async fn reject_application(
        &self,
        agent: &Agent,
        application_id: Uuid,
    ) -> Result<Application> {
        let mut tx = self.store.begin_write().await?;
        let application = load_application(&mut tx, application_id).await?;
        let job = load_job(&mut tx, application.job_id).await?;
        ensure_job_owner(&job, agent)?;

        if application.status == ApplicationStatus::Approved {
            tracing::warn!(
                application_id = %application_id,
                job_id = %job.id,
                "Rejecting an approved application; job assignment is left unchanged"
            );
        }

        tx.set_application_status(application_id, ApplicationStatus::Rejected)
            .await?;
        let application = load_application(&mut tx, application_id).await?;
        tx.commit().await?;

        tracing::info!(application_id = %application_id, "Application rejected");
        Ok(application)
    }

    /// Applications for a job the agent owns. A job owned by someone else is
    /// reported as not found so its existence does not leak.
    pub async fn list_applications_for_job(
        &self,
        agent: &Agent,
        job_id: Uuid,
    ) -> Result<Vec<ApplicationView>> {
        let mut tx = self.store.begin().await?;
        owned_job(&mut tx, agent, job_id, "Job not found or not owned by agent").await?;

        let applications = tx.list_applications_for_job(job_id).await?;
        let mut views = Vec::with_capacity(applications.len());
        for application in applications {
            let contractor = tx.find_user(application.contractor_id).await?;
            views.push(ApplicationView {
                application,
                contractor,
            });
        }
        Ok(views)
    }

    pub async fn list_my_applications(&self, contractor: &Contractor) -> Result<Vec<Application>> {
        let mut tx = self.store.begin().await?;
        tx.list_applications_for_contractor(contractor.id()).await
    }

    // Work plans

    pub async fn create_work_plan(
        &self,
        contractor: &Contractor,
        job_id: Uuid,
        request: CreateWorkPlanRequest,
    ) -> Result<WorkPlan> {
        validate_date_range(request.start_date, request.end_date)?;

        let mut tx = self.store.begin_write().await?;
        let job = load_job(&mut tx, job_id).await?;
        ensure_assigned_contractor(&job, contractor)?;
        ensure_job_status(&job, JobStatus::Assigned, "Job not assigned")?;

        if tx.find_work_plan_for_job(job_id).await?.is_some() {
            return Err(AppError::AlreadyExists(
                "Work plan already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let plan = WorkPlan {
            id: Uuid::new_v4(),
            job_id,
            contractor_id: contractor.id(),
            plan_description: Some(request.plan_description),
            start_date: request.start_date,
            end_date: request.end_date,
            status: request.status.unwrap_or(WorkPlanStatus::NotStarted),
            created_at: now,
            updated_at: now,
        };
        tx.insert_work_plan(&plan).await?;
        tx.commit().await?;

        tracing::info!(work_plan_id = %plan.id, job_id = %job_id, "Work plan created");
        Ok(plan)
    }

    pub async fn update_work_plan(
        &self,
        contractor: &Contractor,
        job_id: Uuid,
        patch: UpdateWorkPlanRequest,
    ) -> Result<WorkPlan> {
        let mut tx = self.store.begin_write().await?;
        let mut plan = load_work_plan(&mut tx, job_id).await?;
        let job = load_job(&mut tx, job_id).await?;
        ensure_assigned_contractor(&job, contractor)?;

        let previous = plan.status;
        apply_work_plan_patch(&mut plan, patch)?;
        tx.save_work_plan(&plan).await?;
        tx.commit().await?;

        if previous != plan.status {
            tracing::info!(
                job_id = %job_id,
                from = previous.as_str(),
                to = plan.status.as_str(),
                "Work plan status changed"
            );
        }
        Ok(plan)
    }

    pub async fn get_work_plan(&self, contractor: &Contractor, job_id: Uuid) -> Result<WorkPlan> {
        let mut tx = self.store.begin().await?;
        let plan = load_work_plan(&mut tx, job_id).await?;
        let job = load_job(&mut tx, job_id).await?;
        ensure_assigned_contractor(&job, contractor)?;
        Ok(plan)
    }

    pub async fn get_work_plan_for_agent(&self, agent: &Agent, job_id: Uuid) -> Result<WorkPlan> {
        let mut tx = self.store.begin().await?;
        owned_job(&mut tx, agent, job_id, "Work plan not found").await?;
        load_work_plan(&mut tx, job_id).await
    }

    // Invoices

    /// Submit the invoice for a job whose work plan is complete. Invoicing
    /// marks the job COMPLETED immediately, independent of payment.
    pub async fn submit_invoice(
        &self,
        contractor: &Contractor,
        job_id: Uuid,
        request: SubmitInvoiceRequest,
    ) -> Result<Invoice> {
        validate_amount(request.amount, "amount")?;

        let mut tx = self.store.begin_write().await?;
        let job = load_job(&mut tx, job_id).await?;
        ensure_assigned_contractor(&job, contractor)?;

        match tx.find_work_plan_for_job(job_id).await? {
            None => {
                return Err(AppError::InvalidState(
                    "Work plan required before invoicing".to_string(),
                ))
            }
            Some(plan) if plan.status != WorkPlanStatus::Completed => {
                return Err(AppError::InvalidState(
                    "Work plan must be completed before invoicing".to_string(),
                ))
            }
            Some(_) => {}
        }

        if tx.find_invoice_for_job(job_id).await?.is_some() {
            return Err(AppError::AlreadyExists(
                "Invoice already submitted".to_string(),
            ));
        }

        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            job_id,
            contractor_id: contractor.id(),
            amount: request.amount,
            status: InvoiceStatus::Submitted,
            created_at: now,
            updated_at: now,
        };
        tx.insert_invoice(&invoice).await?;
        tx.set_job_status(job_id, JobStatus::Completed).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            job_id = %job_id,
            amount = invoice.amount,
            "Invoice submitted, job completed"
        );
        Ok(invoice)
    }

    /// Move an invoice forward. Setting PAID also marks the job COMPLETED;
    /// repeating either write is harmless.
    pub async fn update_invoice_status(
        &self,
        agent: &Agent,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Invoice> {
        let mut tx = self.store.begin_write().await?;
        let invoice = tx
            .find_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))?;
        let job = load_job(&mut tx, invoice.job_id).await?;
        ensure_job_owner(&job, agent)?;
        ensure_invoice_transition(invoice.status, status)?;

        tx.set_invoice_status(invoice_id, status).await?;
        if status == InvoiceStatus::Paid {
            tx.set_job_status(job.id, JobStatus::Completed).await?;
        }

        let invoice = tx
            .find_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            status = status.as_str(),
            "Invoice status updated"
        );
        Ok(invoice)
    }

    pub async fn get_job_invoice(&self, agent: &Agent, job_id: Uuid) -> Result<Invoice> {
        let mut tx = self.store.begin().await?;
        owned_job(&mut tx, agent, job_id, "Invoice not found").await?;
        tx.find_invoice_for_job(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))
    }

    pub async fn get_my_invoice_for_job(
        &self,
        contractor: &Contractor,
        job_id: Uuid,
    ) -> Result<Invoice> {
        let mut tx = self.store.begin().await?;
        tx.find_invoice_for_job(job_id)
            .await?
            .filter(|invoice| invoice.contractor_id == contractor.id())
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))
    }

    pub async fn list_my_invoices(&self, contractor: &Contractor) -> Result<Vec<Invoice>> {
        let mut tx = self.store.begin().await?;
        tx.list_invoices_for_contractor(contractor.id()).await
    }
}

async fn load_job(tx: &mut StoreTx, job_id: Uuid) -> Result<Job> {
    tx.find_job(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
}

async fn load_application(tx: &mut StoreTx, application_id: Uuid) -> Result<Application> {
    tx.find_application(application_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {} not found", application_id)))
}

async fn load_work_plan(tx: &mut StoreTx, job_id: Uuid) -> Result<WorkPlan> {
    tx.find_work_plan_for_job(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Work plan not found".to_string()))
}

/// The job, if it exists and the agent owns it; otherwise NotFound with `missing`
async fn owned_job(tx: &mut StoreTx, agent: &Agent, job_id: Uuid, missing: &str) -> Result<Job> {
    tx.find_job(job_id)
        .await?
        .filter(|job| job.agent_id == agent.id())
        .ok_or_else(|| AppError::NotFound(missing.to_string()))
}
