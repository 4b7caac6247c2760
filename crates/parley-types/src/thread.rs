use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted conversation between a user persona and a bot persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub config: ThreadConfig,
}

impl Thread {
    pub fn new(title: impl Into<String>, config: ThreadConfig) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            created_at: now,
            updated_at: now,
            config,
        }
    }
}

/// Persona and rules applied to every turn of a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub bot_name: String,
    pub rules: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_ref: Option<String>,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            bot_name: "Assistant".to_string(),
            rules: String::new(),
            user_name: "User".to_string(),
            profile_picture_ref: None,
        }
    }
}

impl ThreadConfig {
    pub fn new(bot_name: impl Into<String>, rules: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            rules: rules.into(),
            ..Self::default()
        }
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    pub fn with_profile_picture(mut self, media_ref: impl Into<String>) -> Self {
        self.profile_picture_ref = Some(media_ref.into());
        self
    }
}
