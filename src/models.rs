//! Data models for users, jobs, applications, work plans and invoices

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marketplace role, fixed when the user registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Agent,
    Contractor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "AGENT",
            Role::Contractor => "CONTRACTOR",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AGENT" => Ok(Role::Agent),
            "CONTRACTOR" => Ok(Role::Contractor),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Open,
    Assigned,
    Completed,
    /// Reserved; no operation cancels a job yet
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Open => "OPEN",
            JobStatus::Assigned => "ASSIGNED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(JobStatus::Open),
            "ASSIGNED" => Ok(JobStatus::Assigned),
            "COMPLETED" => Ok(JobStatus::Completed),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Submitted,
    Approved,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
        }
    }

    /// Rejected and withdrawn applications never change again on their own
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(ApplicationStatus::Submitted),
            "APPROVED" => Ok(ApplicationStatus::Approved),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            "WITHDRAWN" => Ok(ApplicationStatus::Withdrawn),
            _ => Err(format!("Invalid application status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkPlanStatus {
    NotStarted = 0,
    InProgress = 1,
    Completed = 2,
}

impl WorkPlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkPlanStatus::NotStarted => "NOT_STARTED",
            WorkPlanStatus::InProgress => "IN_PROGRESS",
            WorkPlanStatus::Completed => "COMPLETED",
        }
    }

    /// Forward moves and re-applying the current status are allowed
    pub fn can_advance_to(&self, next: WorkPlanStatus) -> bool {
        next >= *self
    }
}

impl std::str::FromStr for WorkPlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_STARTED" => Ok(WorkPlanStatus::NotStarted),
            "IN_PROGRESS" => Ok(WorkPlanStatus::InProgress),
            "COMPLETED" => Ok(WorkPlanStatus::Completed),
            _ => Err(format!("Invalid work plan status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Submitted = 0,
    Approved = 1,
    Paid = 2,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Submitted => "SUBMITTED",
            InvoiceStatus::Approved => "APPROVED",
            InvoiceStatus::Paid => "PAID",
        }
    }

    pub fn can_advance_to(&self, next: InvoiceStatus) -> bool {
        next >= *self
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(InvoiceStatus::Submitted),
            "APPROVED" => Ok(InvoiceStatus::Approved),
            "PAID" => Ok(InvoiceStatus::Paid),
            _ => Err(format!("Invalid invoice status: {}", s)),
        }
    }
}

/// A registered marketplace user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    /// Credential digest; never leaves the server
    #[serde(skip)]
    pub password_hash: String,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub skills: Option<String>,
    pub education: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub budget: Option<f64>,
    pub status: JobStatus,
    pub agent_id: Uuid,
    pub assigned_contractor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub contractor_id: Uuid,
    pub proposed_cost: f64,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An application as the job's agent sees it, with the applicant's profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub contractor: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkPlan {
    pub id: Uuid,
    pub job_id: Uuid,
    pub contractor_id: Uuid,
    pub plan_description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: WorkPlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub job_id: Uuid,
    pub contractor_id: Uuid,
    pub amount: f64,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of approving an application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub application: Application,
    pub job: Job,
    /// Sibling applications moved to REJECTED by this approval
    pub rejected_application_ids: Vec<Uuid>,
}

// Requests

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub role: Role,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub skills: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub user_id: Uuid,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
}

/// Query string for the open-jobs listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSearch {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub proposed_cost: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateWorkPlanRequest {
    pub plan_description: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Initial status; NOT_STARTED when absent
    #[serde(default)]
    pub status: Option<WorkPlanStatus>,
}

/// Partial work plan update: absent fields keep their stored values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWorkPlanRequest {
    #[serde(default)]
    pub plan_description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<WorkPlanStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitInvoiceRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInvoiceStatusRequest {
    pub status: InvoiceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        assert_eq!("AGENT".parse::<Role>().unwrap(), Role::Agent);
        assert_eq!(Role::Contractor.as_str(), "CONTRACTOR");
        assert_eq!("ASSIGNED".parse::<JobStatus>().unwrap(), JobStatus::Assigned);
        assert_eq!(JobStatus::Cancelled.as_str(), "CANCELLED");
        assert_eq!(
            "WITHDRAWN".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Withdrawn
        );
        assert_eq!(
            "IN_PROGRESS".parse::<WorkPlanStatus>().unwrap(),
            WorkPlanStatus::InProgress
        );
        assert_eq!("PAID".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Paid);
    }

    #[test]
    fn test_invalid_status_strings() {
        assert!("agent".parse::<Role>().is_err());
        assert!("open".parse::<JobStatus>().is_err());
        assert!("PENDING".parse::<ApplicationStatus>().is_err());
        assert!("DONE".parse::<WorkPlanStatus>().is_err());
        assert!("".parse::<InvoiceStatus>().is_err());
    }

    #[test]
    fn test_work_plan_status_moves_forward_only() {
        use WorkPlanStatus::*;
        assert!(NotStarted.can_advance_to(InProgress));
        assert!(NotStarted.can_advance_to(Completed));
        assert!(InProgress.can_advance_to(InProgress));
        assert!(!Completed.can_advance_to(InProgress));
        assert!(!InProgress.can_advance_to(NotStarted));
    }

    #[test]
    fn test_invoice_status_moves_forward_only() {
        use InvoiceStatus::*;
        assert!(Submitted.can_advance_to(Paid));
        assert!(Approved.can_advance_to(Paid));
        assert!(Paid.can_advance_to(Paid));
        assert!(!Paid.can_advance_to(Approved));
        assert!(!Approved.can_advance_to(Submitted));
    }

    #[test]
    fn test_application_terminal_statuses() {
        assert!(!ApplicationStatus::Submitted.is_terminal());
        assert!(!ApplicationStatus::Approved.is_terminal());
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(ApplicationStatus::Withdrawn.is_terminal());
    }

    #[test]
    fn test_wire_format_is_upper_case() {
        let json = serde_json::to_string(&WorkPlanStatus::NotStarted).unwrap();
        assert_eq!(json, "\"NOT_STARTED\"");

        let role: Role = serde_json::from_str("\"CONTRACTOR\"").unwrap();
        assert_eq!(role, Role::Contractor);
    }

    #[test]
    fn test_user_never_serializes_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            role: Role::Agent,
            password_hash: "salt:hash".to_string(),
            email: None,
            contact_number: None,
            skills: None,
            education: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("salt:hash"));
    }

    #[test]
    fn test_update_work_plan_request_absent_fields() {
        let patch: UpdateWorkPlanRequest =
            serde_json::from_str(r#"{"status":"COMPLETED"}"#).unwrap();
        assert_eq!(patch.status, Some(WorkPlanStatus::Completed));
        assert!(patch.plan_description.is_none());
        assert!(patch.start_date.is_none());
        assert!(patch.end_date.is_none());
    }
}
