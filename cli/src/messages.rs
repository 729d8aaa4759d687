//! Request and response bodies of the Gigboard HTTP API
//!
//! These types mirror the server's models. Some fields are not printed by the
//! CLI but are part of the wire format.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Agent,
    Contractor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Open,
    Assigned,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Submitted,
    Approved,
    Rejected,
    Withdrawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkPlanStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Submitted,
    Approved,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
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

/// An application with the applicant's profile, as listed for the job's agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub contractor: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub application: Application,
    pub job: Job,
    pub rejected_application_ids: Vec<Uuid>,
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

// Requests

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub role: Role,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub user_id: Uuid,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateJobRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyRequest {
    pub proposed_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateWorkPlanRequest {
    pub plan_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkPlanStatus>,
}

/// Only the fields that are set are sent, so the server keeps the rest
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateWorkPlanRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkPlanStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitInvoiceRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateInvoiceStatusRequest {
    pub status: InvoiceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update_omits_absent_fields() {
        let patch = UpdateWorkPlanRequest {
            status: Some(WorkPlanStatus::Completed),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "COMPLETED" }));
    }

    #[test]
    fn test_application_view_is_flattened() {
        let json = serde_json::json!({
            "id": "7f9c0c4e-3a57-4c8e-9a55-0b6c1f6d8e01",
            "job_id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
            "contractor_id": "6ba7b810-9dad-11d1-80b4-00c04fd430c8",
            "proposed_cost": 120.5,
            "status": "SUBMITTED",
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z",
            "contractor": null
        });
        let view: ApplicationView = serde_json::from_value(json).unwrap();
        assert_eq!(view.application.status, ApplicationStatus::Submitted);
        assert!(view.contractor.is_none());
    }
}
