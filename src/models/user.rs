use serde::{Deserialize, Serialize};

/// Authenticated user identity, as returned by `GET /api/profile/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}
