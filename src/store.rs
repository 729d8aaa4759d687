//! Database store for the marketplace tables
//!
//! Every lifecycle operation runs inside a single [`StoreTx`]. Read-only
//! operations use [`Store::begin`]; operations that write use
//! [`Store::begin_write`], which takes SQLite's write lock before the first
//! read so competing writers queue instead of interleaving.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Application, ApplicationStatus, Invoice, InvoiceStatus, Job, JobStatus, User, WorkPlan,
};

/// Schema migrations shipped with the crate
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open a pool against `database_url`, creating the database file if needed
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Start a transaction for reads. Dropping it without commit rolls back.
    pub async fn begin(&self) -> Result<StoreTx> {
        let tx = self.pool.begin().await?;
        Ok(StoreTx { tx })
    }

    /// Start a transaction that holds the database write lock from its first statement
    pub async fn begin_write(&self) -> Result<StoreTx> {
        let mut tx = self.pool.begin().await?;

        // A no-op UPDATE still opens a write transaction in SQLite.
        sqlx::query("UPDATE jobs SET id = id WHERE 0")
            .execute(&mut *tx)
            .await?;

        Ok(StoreTx { tx })
    }
}

/// One unit of work against the store
pub struct StoreTx {
    tx: Transaction<'static, Sqlite>,
}

const USER_COLUMNS: &str =
    "id, name, role, password_hash, email, contact_number, skills, education, created_at";
const JOB_COLUMNS: &str =
    "id, title, description, budget, status, agent_id, assigned_contractor_id, created_at, updated_at";
const APPLICATION_COLUMNS: &str =
    "id, job_id, contractor_id, proposed_cost, status, created_at, updated_at";
const WORK_PLAN_COLUMNS: &str = "id, job_id, contractor_id, plan_description, start_date, end_date, status, created_at, updated_at";
const INVOICE_COLUMNS: &str =
    "id, job_id, contractor_id, amount, status, created_at, updated_at";

impl StoreTx {
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    // User operations

    pub async fn insert_user(&mut self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, role, password_hash, email, contact_number, skills, education, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.contact_number)
        .bind(&user.skills)
        .bind(&user.education)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            on_unique_violation(e, || {
                AppError::AlreadyExists("A user with this email already exists".to_string())
            })
        })?;

        Ok(())
    }

    pub async fn find_user(&mut self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(User::try_from)
            .transpose()
    }

    // Job operations

    pub async fn insert_job(&mut self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, title, description, budget, status, agent_id, assigned_contractor_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(&job.title)
        .bind(&job.description)
        .bind(job.budget)
        .bind(job.status.as_str())
        .bind(job.agent_id.to_string())
        .bind(job.assigned_contractor_id.map(|u| u.to_string()))
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    pub async fn find_job(&mut self, id: Uuid) -> Result<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?");
        sqlx::query_as::<_, JobRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    /// Open jobs, optionally narrowed to titles containing `search` (ASCII case-insensitive)
    pub async fn list_open_jobs(&mut self, search: Option<&str>) -> Result<Vec<Job>> {
        let rows = match search.filter(|s| !s.is_empty()) {
            Some(search) => {
                let sql = format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ? AND title LIKE ? ESCAPE '\\' ORDER BY created_at ASC, rowid ASC"
                );
                sqlx::query_as::<_, JobRow>(&sql)
                    .bind(JobStatus::Open.as_str())
                    .bind(like_pattern(search))
                    .fetch_all(&mut *self.tx)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ? ORDER BY created_at ASC, rowid ASC"
                );
                sqlx::query_as::<_, JobRow>(&sql)
                    .bind(JobStatus::Open.as_str())
                    .fetch_all(&mut *self.tx)
                    .await?
            }
        };

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn list_jobs_for_agent(&mut self, agent_id: Uuid) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE agent_id = ? ORDER BY created_at ASC, rowid ASC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(agent_id.to_string())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Jobs assigned to a contractor that are still assigned or already completed
    pub async fn list_jobs_assigned_to(&mut self, contractor_id: Uuid) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE assigned_contractor_id = ? AND status IN (?, ?) ORDER BY created_at ASC, rowid ASC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(contractor_id.to_string())
            .bind(JobStatus::Assigned.as_str())
            .bind(JobStatus::Completed.as_str())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Compare-and-swap OPEN -> ASSIGNED. Returns false when the job was no longer open.
    pub async fn assign_open_job(&mut self, job_id: Uuid, contractor_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = ?, assigned_contractor_id = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(JobStatus::Assigned.as_str())
        .bind(contractor_id.to_string())
        .bind(Utc::now())
        .bind(job_id.to_string())
        .bind(JobStatus::Open.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_job_status(&mut self, job_id: Uuid, status: JobStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs SET status = ?, updated_at = ? WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(job_id.to_string())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    // Application operations

    pub async fn insert_application(&mut self, application: &Application) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO applications (id, job_id, contractor_id, proposed_cost, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(application.id.to_string())
        .bind(application.job_id.to_string())
        .bind(application.contractor_id.to_string())
        .bind(application.proposed_cost)
        .bind(application.status.as_str())
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            on_unique_violation(e, || {
                AppError::DuplicateApplication("Already applied to this job".to_string())
            })
        })?;

        Ok(())
    }

    pub async fn find_application(&mut self, id: Uuid) -> Result<Option<Application>> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?");
        sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Application::try_from)
            .transpose()
    }

    pub async fn list_applications_for_job(&mut self, job_id: Uuid) -> Result<Vec<Application>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE job_id = ? ORDER BY created_at ASC, rowid ASC"
        );
        let rows = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(job_id.to_string())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn list_applications_for_contractor(
        &mut self,
        contractor_id: Uuid,
    ) -> Result<Vec<Application>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE contractor_id = ? ORDER BY created_at ASC, rowid ASC"
        );
        let rows = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(contractor_id.to_string())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Whether the contractor has a SUBMITTED application for the job
    pub async fn has_submitted_application(
        &mut self,
        job_id: Uuid,
        contractor_id: Uuid,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM applications
            WHERE job_id = ? AND contractor_id = ? AND status = ?
            "#,
        )
        .bind(job_id.to_string())
        .bind(contractor_id.to_string())
        .bind(ApplicationStatus::Submitted.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count > 0)
    }

    pub async fn set_application_status(
        &mut self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE applications SET status = ?, updated_at = ? WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    // Work plan operations

    pub async fn insert_work_plan(&mut self, plan: &WorkPlan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO work_plans (id, job_id, contractor_id, plan_description, start_date, end_date, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(plan.id.to_string())
        .bind(plan.job_id.to_string())
        .bind(plan.contractor_id.to_string())
        .bind(&plan.plan_description)
        .bind(plan.start_date)
        .bind(plan.end_date)
        .bind(plan.status.as_str())
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            on_unique_violation(e, || {
                AppError::AlreadyExists("Work plan already exists".to_string())
            })
        })?;

        Ok(())
    }

    pub async fn find_work_plan_for_job(&mut self, job_id: Uuid) -> Result<Option<WorkPlan>> {
        let sql = format!("SELECT {WORK_PLAN_COLUMNS} FROM work_plans WHERE job_id = ?");
        sqlx::query_as::<_, WorkPlanRow>(&sql)
            .bind(job_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(WorkPlan::try_from)
            .transpose()
    }

    /// Persist the mutable fields of a work plan
    pub async fn save_work_plan(&mut self, plan: &WorkPlan) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE work_plans
            SET plan_description = ?, start_date = ?, end_date = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&plan.plan_description)
        .bind(plan.start_date)
        .bind(plan.end_date)
        .bind(plan.status.as_str())
        .bind(plan.updated_at)
        .bind(plan.id.to_string())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    // Invoice operations

    pub async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (id, job_id, contractor_id, amount, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(invoice.id.to_string())
        .bind(invoice.job_id.to_string())
        .bind(invoice.contractor_id.to_string())
        .bind(invoice.amount)
        .bind(invoice.status.as_str())
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            on_unique_violation(e, || {
                AppError::AlreadyExists("Invoice already submitted".to_string())
            })
        })?;

        Ok(())
    }

    pub async fn find_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?");
        sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Invoice::try_from)
            .transpose()
    }

    pub async fn find_invoice_for_job(&mut self, job_id: Uuid) -> Result<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE job_id = ?");
        sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(job_id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Invoice::try_from)
            .transpose()
    }

    pub async fn list_invoices_for_contractor(
        &mut self,
        contractor_id: Uuid,
    ) -> Result<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE contractor_id = ? ORDER BY created_at ASC, rowid ASC"
        );
        let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(contractor_id.to_string())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn set_invoice_status(&mut self, id: Uuid, status: InvoiceStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE invoices SET status = ?, updated_at = ? WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }
}

fn on_unique_violation(err: sqlx::Error, conflict: impl FnOnce() -> AppError) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => conflict(),
        _ => AppError::Database(err),
    }
}

/// Substring LIKE pattern with `%`, `_` and `\` in the search text matched literally
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::Internal(format!("Invalid {} UUID: {}", field, e)))
}

fn parse_optional_uuid(value: Option<String>, field: &str) -> Result<Option<Uuid>> {
    value.map(|s| parse_uuid(&s, field)).transpose()
}

fn parse_column<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse().map_err(AppError::Internal)
}

// Internal row types for sqlx

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    role: String,
    password_hash: String,
    email: Option<String>,
    contact_number: Option<String>,
    skills: Option<String>,
    education: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id, "user id")?,
            name: row.name,
            role: parse_column(&row.role)?,
            password_hash: row.password_hash,
            email: row.email,
            contact_number: row.contact_number,
            skills: row.skills,
            education: row.education,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    title: String,
    description: Option<String>,
    budget: Option<f64>,
    status: String,
    agent_id: String,
    assigned_contractor_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = AppError;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(Job {
            id: parse_uuid(&row.id, "job id")?,
            title: row.title,
            description: row.description,
            budget: row.budget,
            status: parse_column(&row.status)?,
            agent_id: parse_uuid(&row.agent_id, "agent_id")?,
            assigned_contractor_id: parse_optional_uuid(
                row.assigned_contractor_id,
                "assigned_contractor_id",
            )?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: String,
    job_id: String,
    contractor_id: String,
    proposed_cost: f64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = AppError;

    fn try_from(row: ApplicationRow) -> Result<Self> {
        Ok(Application {
            id: parse_uuid(&row.id, "application id")?,
            job_id: parse_uuid(&row.job_id, "job_id")?,
            contractor_id: parse_uuid(&row.contractor_id, "contractor_id")?,
            proposed_cost: row.proposed_cost,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WorkPlanRow {
    id: String,
    job_id: String,
    contractor_id: String,
    plan_description: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WorkPlanRow> for WorkPlan {
    type Error = AppError;

    fn try_from(row: WorkPlanRow) -> Result<Self> {
        Ok(WorkPlan {
            id: parse_uuid(&row.id, "work plan id")?,
            job_id: parse_uuid(&row.job_id, "job_id")?,
            contractor_id: parse_uuid(&row.contractor_id, "contractor_id")?,
            plan_description: row.plan_description,
            start_date: row.start_date,
            end_date: row.end_date,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    job_id: String,
    contractor_id: String,
    amount: f64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self> {
        Ok(Invoice {
            id: parse_uuid(&row.id, "invoice id")?,
            job_id: parse_uuid(&row.job_id, "job_id")?,
            contractor_id: parse_uuid(&row.contractor_id, "contractor_id")?,
            amount: row.amount,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
