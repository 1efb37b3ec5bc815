use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comment entity - a reply attached to a post.
///
/// Anonymous comments carry no `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub user_id: Option<Uuid>,
    pub created: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: Uuid, content: String, user_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id,
            content,
            user_id,
            created: Utc::now(),
        }
    }
}
