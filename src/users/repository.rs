use rusqlite::{params, params_from_iter, Row, ToSql};

use crate::db::models::{Role, User, UserPublic};
use crate::error::{constraint_error, AppError, AppResult};
use crate::state::DbPool;

const USER_COLUMNS: &str =
    "user_id, username, email, password_hash, role, profile_picture, profile_info, created_at";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Already bcrypt-hashed at the handler edge.
    pub password_hash: String,
}

/// Typed patch for user updates. Every field is optional; an entirely empty
/// patch is rejected. Replaces the upstream allow-list filtering with an
/// explicit structure.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub profile_picture: Option<String>,
    pub profile_info: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.profile_picture.is_none()
            && self.profile_info.is_none()
    }
}

fn map_user(row: &Row) -> rusqlite::Result<User> {
    let role_str: String = row.get(4)?;
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: Role::from_str(&role_str).unwrap_or(Role::Guest),
        profile_picture: row.get(5)?,
        profile_info: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn user_row(pool: &DbPool, where_clause: &str, param: &dyn ToSql) -> AppResult<User> {
    let conn = pool.get()?;
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, where_clause);
    conn.query_row(&sql, params![param], map_user)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
            other => AppError::Database(other),
        })
}

pub fn find_by_id(pool: &DbPool, user_id: i64) -> AppResult<UserPublic> {
    user_row(pool, "user_id = ?1", &user_id).map(UserPublic::from)
}

/// Full row with the credential, for login verification only.
pub fn find_by_username(pool: &DbPool, username: &str) -> AppResult<User> {
    user_row(pool, "username = ?1", &username)
}

pub fn find_by_email(pool: &DbPool, email: &str) -> AppResult<User> {
    user_row(pool, "email = ?1", &email)
}

pub fn list_all(pool: &DbPool) -> AppResult<Vec<UserPublic>> {
    let conn = pool.get()?;
    let sql = format!("SELECT {} FROM users ORDER BY user_id", USER_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map([], map_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users.into_iter().map(UserPublic::from).collect())
}

pub fn create(pool: &DbPool, user: &NewUser) -> AppResult<UserPublic> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        params![user.username, user.email, user.password_hash],
    )
    .map_err(|e| constraint_error(e, "Username or email already in use"))?;

    let user_id = conn.last_insert_rowid();
    drop(conn);
    find_by_id(pool, user_id)
}

pub fn update(pool: &DbPool, user_id: i64, patch: &UserPatch) -> AppResult<UserPublic> {
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(ref username) = patch.username {
        sets.push("username = ?");
        values.push(Box::new(username.clone()));
    }
    if let Some(ref email) = patch.email {
        sets.push("email = ?");
        values.push(Box::new(email.clone()));
    }
    if let Some(ref hash) = patch.password_hash {
        sets.push("password_hash = ?");
        values.push(Box::new(hash.clone()));
    }
    if let Some(role) = patch.role {
        sets.push("role = ?");
        values.push(Box::new(role.as_str()));
    }
    if let Some(ref picture) = patch.profile_picture {
        sets.push("profile_picture = ?");
        values.push(Box::new(picture.clone()));
    }
    if let Some(ref info) = patch.profile_info {
        sets.push("profile_info = ?");
        values.push(Box::new(info.clone()));
    }
    values.push(Box::new(user_id));

    let conn = pool.get()?;
    let sql = format!(
        "UPDATE users SET {} WHERE user_id = ?",
        sets.join(", ")
    );
    let affected = conn
        .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))
        .map_err(|e| constraint_error(e, "Username or email already in use"))?;

    if affected == 0 {
        return Err(AppError::NotFound);
    }
    drop(conn);
    find_by_id(pool, user_id)
}

/// Removes an account and everything attached to it as one atomic unit:
/// the user's activity on other posts, the dependents of the user's own
/// posts, the posts, and finally the user row. Follow edges go with the
/// user row via the schema's cascade.
pub fn delete(pool: &DbPool, user_id: i64) -> AppResult<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM likes WHERE user_id = ?1", params![user_id])?;
    tx.execute("DELETE FROM comments WHERE user_id = ?1", params![user_id])?;
    tx.execute("DELETE FROM ratings WHERE user_id = ?1", params![user_id])?;

    for table in ["likes", "comments", "ratings", "post_tags"] {
        let sql = format!(
            "DELETE FROM {} WHERE post_id IN (SELECT post_id FROM posts WHERE user_id = ?1)",
            table
        );
        tx.execute(&sql, params![user_id])?;
    }
    tx.execute("DELETE FROM posts WHERE user_id = ?1", params![user_id])?;

    let affected = tx.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
    if affected == 0 {
        // Dropping the transaction rolls everything back.
        return Err(AppError::NotFound);
    }
    tx.commit()?;
    Ok(())
}
