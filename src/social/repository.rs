use rusqlite::params;

use crate::db::models::Follow;
use crate::error::{constraint_error, AppError, AppResult};
use crate::state::DbPool;

pub fn list_followers(pool: &DbPool, user_id: i64) -> AppResult<Vec<Follow>> {
    let conn = pool.get()?;
    let mut stmt =
        conn.prepare("SELECT follower_id, following_id FROM follows WHERE following_id = ?1")?;
    let edges = stmt
        .query_map(params![user_id], |row| {
            Ok(Follow {
                follower_id: row.get(0)?,
                following_id: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}

pub fn list_followings(pool: &DbPool, user_id: i64) -> AppResult<Vec<Follow>> {
    let conn = pool.get()?;
    let mut stmt =
        conn.prepare("SELECT follower_id, following_id FROM follows WHERE follower_id = ?1")?;
    let edges = stmt
        .query_map(params![user_id], |row| {
            Ok(Follow {
                follower_id: row.get(0)?,
                following_id: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(edges)
}

/// Counts aggregate over the edge set on every call; there is no stored
/// counter to drift out of sync.
pub fn count_followers(pool: &DbPool, user_id: i64) -> AppResult<i64> {
    let conn = pool.get()?;
    let count = conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE following_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_followings(pool: &DbPool, user_id: i64) -> AppResult<i64> {
    let conn = pool.get()?;
    let count = conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// The pre-check gives a clean error message for the common case; the
/// composite primary key on follows is what actually serializes two
/// concurrent identical requests.
pub fn follow(pool: &DbPool, follower_id: i64, following_id: i64) -> AppResult<()> {
    if follower_id == following_id {
        return Err(AppError::BadRequest(
            "Cannot follow yourself".to_string(),
        ));
    }

    let conn = pool.get()?;
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE follower_id = ?1 AND following_id = ?2",
        params![follower_id, following_id],
        |row| row.get(0),
    )?;
    if exists {
        return Err(AppError::Conflict(
            "Already following this user".to_string(),
        ));
    }

    conn.execute(
        "INSERT INTO follows (follower_id, following_id) VALUES (?1, ?2)",
        params![follower_id, following_id],
    )
    .map_err(|e| constraint_error(e, "Already following this user"))?;
    Ok(())
}

pub fn unfollow(pool: &DbPool, follower_id: i64, following_id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    let affected = conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
        params![follower_id, following_id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}
