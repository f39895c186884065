use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Storage partition a user record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserPartition {
    Teachers,
    Students,
    Admin,
}

impl UserPartition {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserPartition::Teachers => "teachers",
            UserPartition::Students => "students",
            UserPartition::Admin => "admin",
        }
    }
}

/// Role tag carried in reminder payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Teacher,
    Student,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
            UserRole::Admin => "admin",
        }
    }

    pub fn partition(&self) -> UserPartition {
        match self {
            UserRole::Teacher => UserPartition::Teachers,
            UserRole::Admin => UserPartition::Admin,
            UserRole::Student => UserPartition::Students,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserRecord {
    pub partition: String,
    pub id: String,
    pub name: Option<String>,
    /// Raw JSON as written by the app: a single token string or an array.
    pub fcm_token: Option<String>,
    pub created_at: NaiveDateTime,
}

impl UserRecord {
    pub fn push_tokens(&self) -> Vec<String> {
        parse_push_tokens(self.fcm_token.as_deref())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenField {
    One(String),
    Many(Vec<serde_json::Value>),
}

/// Decode the stored token field into an ordered list of distinct, non-empty
/// tokens. Text that is not JSON at all is taken as one bare token.
pub fn parse_push_tokens(raw: Option<&str>) -> Vec<String> {
    let raw = match raw.map(str::trim) {
        Some(v) if !v.is_empty() && v != "null" => v,
        _ => return Vec::new(),
    };

    let candidates: Vec<String> = match serde_json::from_str::<TokenField>(raw) {
        Ok(TokenField::One(token)) => vec![token],
        Ok(TokenField::Many(values)) => values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Err(_) if raw.starts_with('[') || raw.starts_with('{') => Vec::new(),
        Err(_) => vec![raw.to_string()],
    };

    let mut tokens: Vec<String> = Vec::with_capacity(candidates.len());
    for token in candidates {
        let token = token.trim();
        if !token.is_empty() && !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}
