//! Explicit login session.
//!
//! Established by the host application at login and passed to every
//! component at construction. There is no ambient "current user" lookup:
//! when the session ends, everything holding it is torn down with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The authenticated user's stable identifier.
    pub user_id: UserId,
    /// Bearer token for the remote store, when the deployment requires one.
    pub access_token: Option<String>,
    /// When this session was established.
    pub established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            access_token: None,
            established_at: Utc::now(),
        }
    }

    pub fn with_access_token(user_id: UserId, access_token: impl Into<String>) -> Self {
        Self {
            user_id,
            access_token: Some(access_token.into()),
            established_at: Utc::now(),
        }
    }
}
