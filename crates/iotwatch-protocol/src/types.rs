//! REST payloads exchanged with the IoTWatch backend.
//!
//! Field names follow the backend's JSON: auth payloads are camelCase,
//! reading history rows are snake_case (they mirror database columns).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A user account as returned by the profile and auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(
        default,
        rename = "createdAt",
        alias = "created_at",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Passwords must never reach a log line.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /api/auth/register`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl Registration {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: name.into(),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

/// Successful login or registration: a bearer token plus the account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One page of a paged listing.
///
/// This object shape is the only accepted history format; a bare JSON
/// array is rejected by the API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

impl<T> Page<T> {
    /// Current page number, 1-based.
    pub fn page(&self) -> u32 {
        self.current_page.unwrap_or(1).max(1)
    }

    /// Total number of pages, at least 1.
    pub fn page_count(&self) -> u32 {
        self.total_pages.unwrap_or(1).max(1)
    }

    pub fn has_previous(&self) -> bool {
        self.page() > 1
    }

    pub fn has_next(&self) -> bool {
        self.page() < self.page_count()
    }
}

/// A stored reading that crossed a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub id: u64,
    pub temperature: f64,
    #[serde(default)]
    pub threshold_value: Option<f64>,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// An alert threshold configured by the user.
///
/// Fields the client doesn't model are kept in `extra` so an update
/// round-trips them unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub id: u64,
    #[serde(alias = "threshold_value")]
    pub value: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for creating or replacing a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewThreshold {
    pub value: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewThreshold {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            extra: Map::new(),
        }
    }

    /// Adds an extra backend field (e.g. `"description"`).
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("a@b.com", "secret1");
        let printed = format!("{creds:?}");
        assert!(printed.contains("a@b.com"));
        assert!(!printed.contains("secret1"));
    }

    #[test]
    fn test_auth_response_debug_redacts_token() {
        let response: AuthResponse = serde_json::from_str(
            r#"{"token":"T-secret","user":{"id":1,"name":"A","email":"a@b.com"}}"#,
        )
        .unwrap();
        assert_eq!(response.token, "T-secret");
        assert!(!format!("{response:?}").contains("T-secret"));
    }

    #[test]
    fn test_profile_accepts_snake_case_created_at() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id":3,"name":"C","email":"c@d.com","created_at":"2024-05-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(profile.created_at.is_some());
    }

    #[test]
    fn test_page_defaults_when_counts_missing() {
        let page: Page<ReadingRecord> = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert_eq!(page.page(), 1);
        assert_eq!(page.page_count(), 1);
        assert!(!page.has_next());
        assert!(!page.has_previous());
    }

    #[test]
    fn test_page_navigation_flags() {
        let page: Page<ReadingRecord> = serde_json::from_str(
            r#"{"data":[{"id":1,"temperature":31.5,"threshold_value":30,"recorded_at":"2025-01-01T00:00:00Z"}],
                "currentPage":2,"totalPages":3}"#,
        )
        .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].threshold_value, Some(30.0));
        assert!(page.has_previous());
        assert!(page.has_next());
    }

    #[test]
    fn test_threshold_keeps_unknown_fields() {
        let threshold: Threshold =
            serde_json::from_str(r#"{"id":4,"value":28.5,"label":"greenhouse"}"#).unwrap();
        assert_eq!(threshold.extra.get("label"), Some(&Value::from("greenhouse")));

        let back = serde_json::to_value(&threshold).unwrap();
        assert_eq!(back["label"], "greenhouse");
    }

    #[test]
    fn test_new_threshold_with_field_serializes_flat() {
        let body = NewThreshold::new(30.0).with_field("description", "too hot");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["value"], 30.0);
        assert_eq!(json["description"], "too hot");
    }
}
