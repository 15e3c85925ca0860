use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_signed_in: DateTime<Utc>,
}

/// Profile handed over by the external identity provider after a successful
/// sign-in. Absent fields leave the stored values untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProfile {
    pub open_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub login_method: Option<String>,
}

impl User {
    pub fn new(id: i64, profile: IdentityProfile, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id,
            open_id: profile.open_id,
            name: profile.name,
            email: profile.email,
            login_method: profile.login_method,
            role,
            created_at: now,
            updated_at: now,
            last_signed_in: now,
        }
    }

    /// Applies a repeat sign-in: copies supplied profile fields and bumps
    /// `last_signed_in`.
    pub fn apply_sign_in(&mut self, profile: IdentityProfile, role: Option<Role>) {
        let now = Utc::now();
        if let Some(name) = profile.name {
            self.name = Some(name);
        }
        if let Some(email) = profile.email {
            self.email = Some(email);
        }
        if let Some(login_method) = profile.login_method {
            self.login_method = Some(login_method);
        }
        if let Some(role) = role {
            self.role = role;
        }
        self.last_signed_in = now;
        self.updated_at = now;
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignInResponse {
    pub token: String,
    pub user: User,
}
