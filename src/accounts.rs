//! User registration, login and profile lookup

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::{CredentialVerifier, Session, SessionIssuer};
use crate::error::{AppError, Result};
use crate::models::{RegisterRequest, TokenResponse, User};
use crate::store::Store;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NAME_LEN: usize = 100;

#[derive(Clone)]
pub struct Accounts {
    store: Store,
    credentials: Arc<dyn CredentialVerifier>,
    sessions: Arc<dyn SessionIssuer>,
}

impl Accounts {
    pub fn new(
        store: Store,
        credentials: Arc<dyn CredentialVerifier>,
        sessions: Arc<dyn SessionIssuer>,
    ) -> Self {
        Self {
            store,
            credentials,
            sessions,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        let name = request.name.trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::BadRequest(format!(
                "Name must be between 1 and {} characters",
                MAX_NAME_LEN
            )));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let credentials = Arc::clone(&self.credentials);
        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))??;

        let user = User {
            id: Uuid::new_v4(),
            name,
            role: request.role,
            password_hash,
            email: request.email.filter(|e| !e.trim().is_empty()),
            contact_number: request.contact_number,
            skills: request.skills,
            education: request.education,
            created_at: Utc::now(),
        };

        let mut tx = self.store.begin_write().await?;
        tx.insert_user(&user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User registered");
        Ok(user)
    }

    pub async fn login(&self, user_id: Uuid, password: String) -> Result<TokenResponse> {
        let user = self.find(user_id).await?;
        if user.password_hash.is_empty() {
            return Err(AppError::BadRequest(
                "User has no password set".to_string(),
            ));
        }

        let credentials = Arc::clone(&self.credentials);
        let digest = user.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || credentials.verify(&password, &digest))
                .await
                .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?;

        if !verified {
            tracing::warn!(user_id = %user_id, "Rejected login with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let access_token = self.sessions.issue(&Session::new(user.id, user.role))?;
        tracing::debug!(user_id = %user_id, "Session issued");

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
        })
    }

    pub async fn me(&self, session: &Session) -> Result<User> {
        self.find(session.user_id).await
    }

    async fn find(&self, user_id: Uuid) -> Result<User> {
        let mut tx = self.store.begin().await?;
        tx.find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtSessionIssuer, Pbkdf2Verifier};
    use crate::models::Role;
    use crate::store::MIGRATOR;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn accounts() -> (Accounts, Arc<dyn SessionIssuer>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();

        let sessions: Arc<dyn SessionIssuer> = Arc::new(JwtSessionIssuer::new(
            "test-secret",
            chrono::Duration::minutes(5),
        ));
        let accounts = Accounts::new(
            Store::new(pool),
            Arc::new(Pbkdf2Verifier::with_iterations(1_000)),
            Arc::clone(&sessions),
        );
        (accounts, sessions)
    }

    fn request(name: &str, role: Role, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            role,
            password: password.to_string(),
            email: None,
            contact_number: None,
            skills: None,
            education: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (accounts, sessions) = accounts().await;
        let user = accounts
            .register(request("Ada", Role::Agent, "secret1"))
            .await
            .unwrap();
        assert_ne!(user.password_hash, "secret1");

        let token = accounts
            .login(user.id, "secret1".to_string())
            .await
            .unwrap();
        assert_eq!(token.token_type, "bearer");

        let session = sessions.recover(&token.access_token).unwrap();
        assert_eq!(session, Session::new(user.id, Role::Agent));

        let me = accounts.me(&session).await.unwrap();
        assert_eq!(me.name, "Ada");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (accounts, _) = accounts().await;

        assert!(matches!(
            accounts.register(request("Ada", Role::Agent, "12345")).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            accounts.register(request("  ", Role::Agent, "123456")).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            accounts
                .register(request(&"n".repeat(MAX_NAME_LEN + 1), Role::Agent, "123456"))
                .await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let (accounts, _) = accounts().await;
        let mut first = request("Ada", Role::Agent, "secret1");
        first.email = Some("ada@example.com".to_string());
        let mut second = request("Bob", Role::Contractor, "secret2");
        second.email = Some("ada@example.com".to_string());

        accounts.register(first).await.unwrap();
        assert!(matches!(
            accounts.register(second).await,
            Err(AppError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (accounts, _) = accounts().await;
        let user = accounts
            .register(request("Cy", Role::Contractor, "secret1"))
            .await
            .unwrap();

        assert!(matches!(
            accounts.login(user.id, "wrong-pw".to_string()).await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.login(Uuid::new_v4(), "secret1".to_string()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
