use serde::{Deserialize, Serialize};

/// Privilege tier attached to a user and embedded in session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::User => "User",
            Role::Guest => "Guest",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Admin" => Some(Role::Admin),
            "User" => Some(Role::User),
            "Guest" => Some(Role::Guest),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Full user row, password hash included. Never serialized to clients;
/// only login verification sees this shape.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile_picture: Option<String>,
    pub profile_info: Option<String>,
    pub created_at: String,
}

/// Credential-stripped projection handed to everything past login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPublic {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub profile_picture: Option<String>,
    pub profile_info: Option<String>,
    pub created_at: String,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        UserPublic {
            user_id: user.user_id,
            username: user.username,
            email: user.email,
            role: user.role,
            profile_picture: user.profile_picture,
            profile_info: user.profile_info,
            created_at: user.created_at,
        }
    }
}

/// Directed follow edge, unique per (follower, following) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: i64,
    pub following_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub post_id: i64,
    pub user_id: i64,
    pub filename: String,
    pub continent: String,
    pub country: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub start_date: String,
    pub end_date: String,
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub like_id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub created_at: String,
}
