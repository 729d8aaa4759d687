//! Authentication and role capabilities
//!
//! A verified [`Session`] is the only way to obtain an [`Agent`] or a
//! [`Contractor`]. Lifecycle operations take one of those by reference, so the
//! role a caller needs is checked once, where the session is turned into a
//! capability, and never again inside the operation.

pub mod extract;
pub mod password;
pub mod session;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Role;

pub use password::Pbkdf2Verifier;
pub use session::JwtSessionIssuer;

/// Hashes and verifies user credentials
pub trait CredentialVerifier: Send + Sync {
    /// Produce a salted digest suitable for storage
    fn hash(&self, password: &str) -> Result<String>;

    /// Check a password against a stored digest. Malformed digests never verify.
    fn verify(&self, password: &str, digest: &str) -> bool;
}

/// Issues bearer tokens for sessions and recovers sessions from them
pub trait SessionIssuer: Send + Sync {
    fn issue(&self, session: &Session) -> Result<String>;

    /// Fails with [`AppError::InvalidToken`] for anything not issued by us or expired
    fn recover(&self, token: &str) -> Result<Session>;
}

/// An authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn agent(&self) -> Result<Agent> {
        match self.role {
            Role::Agent => Ok(Agent { id: self.user_id }),
            Role::Contractor => Err(AppError::Forbidden(
                "This action requires the AGENT role".to_string(),
            )),
        }
    }

    pub fn contractor(&self) -> Result<Contractor> {
        match self.role {
            Role::Contractor => Ok(Contractor { id: self.user_id }),
            Role::Agent => Err(AppError::Forbidden(
                "This action requires the CONTRACTOR role".to_string(),
            )),
        }
    }
}

/// Capability held by a caller proven to have the AGENT role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Agent {
    id: Uuid,
}

impl Agent {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Capability held by a caller proven to have the CONTRACTOR role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contractor {
    id: Uuid,
}

impl Contractor {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_session_yields_agent_only() {
        let session = Session::new(Uuid::new_v4(), Role::Agent);
        assert_eq!(session.agent().unwrap().id(), session.user_id);
        assert!(matches!(session.contractor(), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_contractor_session_yields_contractor_only() {
        let session = Session::new(Uuid::new_v4(), Role::Contractor);
        assert_eq!(session.contractor().unwrap().id(), session.user_id);
        assert!(matches!(session.agent(), Err(AppError::Forbidden(_))));
    }
}
