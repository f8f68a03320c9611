use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub api_token: String,
    pub join_time: DateTime<Utc>,
}

impl User {
    pub fn new(user_id: i64, username: String, email: String, api_token: String, join_time: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username,
            email,
            api_token,
            join_time,
        }
    }
}
