//! HTTP client for the Gigboard server

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::messages::{
    Application, ApplicationView, ApplyRequest, ApprovalOutcome, CreateJobRequest,
    CreateWorkPlanRequest, Invoice, InvoiceStatus, Job, LoginRequest, RegisterRequest,
    SubmitInvoiceRequest, TokenResponse, UpdateInvoiceStatusRequest, UpdateWorkPlanRequest,
    User, WorkPlan,
};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("This command requires a token; run `login` and pass --token")]
    MissingToken,
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Client for the Gigboard HTTP API
pub struct GigboardClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl GigboardClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(path)?;
        Ok(self.client.request(method, url))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::MissingToken)?;
        Ok(self.request(method, path)?.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            tracing::debug!("Request failed: {} - {}", status, message);
            return Err(ClientError::Api { status, message });
        }

        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.authed(Method::GET, path)?).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.authed(Method::POST, path)?.json(body)).await
    }

    async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.authed(Method::PATCH, path)?.json(body)).await
    }

    // Accounts

    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        self.send(self.request(Method::POST, "/auth/register")?.json(request))
            .await
    }

    pub async fn login(&self, user_id: Uuid, password: String) -> Result<TokenResponse> {
        let body = LoginRequest { user_id, password };
        self.send(self.request(Method::POST, "/auth/login")?.json(&body))
            .await
    }

    pub async fn me(&self) -> Result<User> {
        self.get("/auth/me").await
    }

    // Jobs

    pub async fn list_open_jobs(&self, search: Option<&str>) -> Result<Vec<Job>> {
        let mut request = self.request(Method::GET, "/jobs")?;
        if let Some(search) = search {
            request = request.query(&[("search", search)]);
        }
        self.send(request).await
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        self.send(self.request(Method::GET, &format!("/jobs/{}", job_id))?)
            .await
    }

    pub async fn post_job(&self, request: &CreateJobRequest) -> Result<Job> {
        self.post("/jobs", request).await
    }

    pub async fn my_posted_jobs(&self) -> Result<Vec<Job>> {
        self.get("/jobs/agent/me").await
    }

    pub async fn my_assigned_jobs(&self) -> Result<Vec<Job>> {
        self.get("/jobs/assigned/me").await
    }

    // Applications

    pub async fn apply(&self, job_id: Uuid, proposed_cost: f64) -> Result<Application> {
        self.post(
            &format!("/applications/apply/{}", job_id),
            &ApplyRequest { proposed_cost },
        )
        .await
    }

    pub async fn applications_for_job(&self, job_id: Uuid) -> Result<Vec<ApplicationView>> {
        self.get(&format!("/applications/job/{}", job_id)).await
    }

    pub async fn my_applications(&self) -> Result<Vec<Application>> {
        self.get("/applications/me").await
    }

    pub async fn approve(&self, application_id: Uuid) -> Result<ApprovalOutcome> {
        self.send(self.authed(
            Method::POST,
            &format!("/applications/approve/{}", application_id),
        )?)
        .await
    }

    pub async fn reject(&self, application_id: Uuid) -> Result<Application> {
        self.send(self.authed(
            Method::POST,
            &format!("/applications/reject/{}", application_id),
        )?)
        .await
    }

    // Work plans

    pub async fn create_plan(
        &self,
        job_id: Uuid,
        request: &CreateWorkPlanRequest,
    ) -> Result<WorkPlan> {
        self.post(&format!("/work-plans/{}", job_id), request).await
    }

    pub async fn update_plan(
        &self,
        job_id: Uuid,
        request: &UpdateWorkPlanRequest,
    ) -> Result<WorkPlan> {
        self.patch(&format!("/work-plans/{}", job_id), request)
            .await
    }

    pub async fn get_plan(&self, job_id: Uuid) -> Result<WorkPlan> {
        self.get(&format!("/work-plans/{}", job_id)).await
    }

    pub async fn get_plan_as_agent(&self, job_id: Uuid) -> Result<WorkPlan> {
        self.get(&format!("/work-plans/agent-view/{}", job_id)).await
    }

    // Invoices

    pub async fn submit_invoice(&self, job_id: Uuid, amount: f64) -> Result<Invoice> {
        self.post(
            &format!("/invoices/{}", job_id),
            &SubmitInvoiceRequest { amount },
        )
        .await
    }

    pub async fn set_invoice_status(
        &self,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Invoice> {
        self.patch(
            &format!("/invoices/{}/status", invoice_id),
            &UpdateInvoiceStatusRequest { status },
        )
        .await
    }

    pub async fn invoice_for_job(&self, job_id: Uuid) -> Result<Invoice> {
        self.get(&format!("/invoices/job/{}", job_id)).await
    }

    pub async fn my_invoice_for_job(&self, job_id: Uuid) -> Result<Invoice> {
        self.get(&format!("/invoices/job/{}/me", job_id)).await
    }

    pub async fn my_invoices(&self) -> Result<Vec<Invoice>> {
        self.get("/invoices/me").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{JobStatus, WorkPlanStatus};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job_json(id: Uuid, title: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": title,
            "description": null,
            "budget": 250.0,
            "status": "OPEN",
            "agent_id": Uuid::new_v4(),
            "assigned_contractor_id": null,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_list_open_jobs_passes_search() {
        let mock_server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/jobs"))
            .and(query_param("search", "roof"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([job_json(id, "Fix roof")])),
            )
            .mount(&mock_server)
            .await;

        let client = GigboardClient::new(&mock_server.uri(), None).unwrap();
        let jobs = client.list_open_jobs(Some("roof")).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
        assert_eq!(jobs[0].status, JobStatus::Open);
    }

    #[tokio::test]
    async fn test_authed_requests_send_bearer_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/jobs/agent/me"))
            .and(header("authorization", "Bearer tok123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let client =
            GigboardClient::new(&mock_server.uri(), Some("tok123".to_string())).unwrap();
        assert!(client.my_posted_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_sending() {
        let client = GigboardClient::new("http://127.0.0.1:9", None).unwrap();
        assert!(matches!(
            client.my_invoices().await,
            Err(ClientError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn test_server_error_carries_status_and_text() {
        let mock_server = MockServer::start().await;
        let app_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path(format!("/applications/approve/{}", app_id)))
            .respond_with(
                ResponseTemplate::new(409).set_body_string("Job not open for approval"),
            )
            .mount(&mock_server)
            .await;

        let client = GigboardClient::new(&mock_server.uri(), Some("t".to_string())).unwrap();
        match client.approve(app_id).await {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, StatusCode::CONFLICT);
                assert_eq!(message, "Job not open for approval");
            }
            other => panic!("expected API error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_update_plan_sends_only_set_fields() {
        let mock_server = MockServer::start().await;
        let job_id = Uuid::new_v4();

        Mock::given(method("PATCH"))
            .and(path(format!("/work-plans/{}", job_id)))
            .and(body_json(serde_json::json!({ "status": "COMPLETED" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": Uuid::new_v4(),
                "job_id": job_id,
                "contractor_id": Uuid::new_v4(),
                "plan_description": "Replace shingles",
                "start_date": "2024-05-01",
                "end_date": null,
                "status": "COMPLETED",
                "created_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-02T10:00:00Z"
            })))
            .mount(&mock_server)
            .await;

        let client = GigboardClient::new(&mock_server.uri(), Some("t".to_string())).unwrap();
        let plan = client
            .update_plan(
                job_id,
                &UpdateWorkPlanRequest {
                    status: Some(WorkPlanStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(plan.status, WorkPlanStatus::Completed);
        assert_eq!(plan.plan_description.as_deref(), Some("Replace shingles"));
    }

    #[tokio::test]
    async fn test_login_returns_token() {
        let mock_server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(serde_json::json!({
                "user_id": user_id,
                "password": "password"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "jwt",
                "token_type": "bearer"
            })))
            .mount(&mock_server)
            .await;

        let client = GigboardClient::new(&mock_server.uri(), None).unwrap();
        let token = client
            .login(user_id, "password".to_string())
            .await
            .unwrap();
        assert_eq!(token.access_token, "jwt");
    }
}
