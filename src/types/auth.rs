use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User record as returned by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl AuthUser {
    /// Metadata `username`, else the email's local part, else `User`.
    pub fn display_name(&self) -> String {
        if let Some(name) = self
            .user_metadata
            .get("username")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("User")
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: AuthUser,
}

/// Sign-up either signs the user in right away or waits for email confirmation.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    Session(Session),
    ConfirmationRequired(AuthUser),
}

/// Fields accepted by the auth service's user update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}
