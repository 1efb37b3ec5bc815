use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::User;

/// Author entity - the blogging profile wrapping a login identity.
///
/// Each user owns at most one author record, created the first time the user
/// publishes a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Author {
    /// Build the author profile for a user that has none yet.
    pub fn for_user(user: &User) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: user.username.clone(),
            email: user.email.clone(),
            user_id: user.id,
            created_at: Utc::now(),
        }
    }

    /// Whether this author is linked to the given identity.
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}
