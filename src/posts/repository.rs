use rusqlite::{params, Row};

use crate::auth::Claims;
use crate::db::models::Post;
use crate::error::{constraint_error, AppError, AppResult};
use crate::state::DbPool;
use crate::storage::ArtifactStore;

const POST_COLUMNS: &str = "post_id, user_id, filename, continent, country, city, latitude, \
     longitude, start_date, end_date, description, created_at";

#[derive(Debug, Clone)]
pub struct NewPost {
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
}

/// Typed patch for post updates; all fields optional, empty patch rejected.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub country: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.city.is_none() && self.description.is_none()
    }
}

fn map_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        post_id: row.get(0)?,
        user_id: row.get(1)?,
        filename: row.get(2)?,
        continent: row.get(3)?,
        country: row.get(4)?,
        city: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        start_date: row.get(8)?,
        end_date: row.get(9)?,
        description: row.get(10)?,
        created_at: row.get(11)?,
    })
}

pub fn find_by_id(pool: &DbPool, post_id: i64) -> AppResult<Post> {
    let conn = pool.get()?;
    let sql = format!("SELECT {} FROM posts WHERE post_id = ?1", POST_COLUMNS);
    conn.query_row(&sql, params![post_id], map_post)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
            other => AppError::Database(other),
        })
}

pub fn list(pool: &DbPool, page: Option<i64>, limit: Option<i64>) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;
    match limit {
        Some(limit) => {
            // Saturate so an absurd page number yields an empty result
            // instead of an arithmetic overflow.
            let offset = (page.unwrap_or(1).max(1) - 1).saturating_mul(limit);
            let sql = format!(
                "SELECT {} FROM posts ORDER BY created_at DESC, post_id DESC LIMIT ?1 OFFSET ?2",
                POST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let posts = stmt
                .query_map(params![limit, offset], map_post)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(posts)
        }
        None => {
            let sql = format!(
                "SELECT {} FROM posts ORDER BY created_at DESC, post_id DESC",
                POST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let posts = stmt
                .query_map([], map_post)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(posts)
        }
    }
}

pub fn list_by_user(pool: &DbPool, user_id: i64) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {} FROM posts WHERE user_id = ?1 ORDER BY created_at DESC, post_id DESC",
        POST_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params![user_id], map_post)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn most_liked(pool: &DbPool) -> AppResult<Post> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {} FROM posts WHERE post_id = (
            SELECT post_id FROM likes
            GROUP BY post_id
            ORDER BY COUNT(*) DESC
            LIMIT 1
        )",
        POST_COLUMNS
    );
    conn.query_row(&sql, [], map_post).map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
        other => AppError::Database(other),
    })
}

pub fn create(pool: &DbPool, post: &NewPost) -> AppResult<Post> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO posts (user_id, filename, continent, country, city, latitude, longitude, start_date, end_date, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            post.user_id,
            post.filename,
            post.continent,
            post.country,
            post.city,
            post.latitude,
            post.longitude,
            post.start_date,
            post.end_date,
            post.description
        ],
    )
    .map_err(|e| constraint_error(e, "Post already exists"))?;

    let post_id = conn.last_insert_rowid();
    drop(conn);
    find_by_id(pool, post_id)
}

/// Ownership-scoped update: plain users can only touch their own rows,
/// Admin updates any row. Zero affected rows reports NotFound without
/// revealing whether the post exists under someone else's ownership.
pub fn update(pool: &DbPool, post_id: i64, patch: &PostPatch, claims: &Claims) -> AppResult<Post> {
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(ref country) = patch.country {
        sets.push("country = ?");
        values.push(Box::new(country.clone()));
    }
    if let Some(ref city) = patch.city {
        sets.push("city = ?");
        values.push(Box::new(city.clone()));
    }
    if let Some(ref description) = patch.description {
        sets.push("description = ?");
        values.push(Box::new(description.clone()));
    }
    values.push(Box::new(post_id));

    let sql = if claims.role.is_admin() {
        format!("UPDATE posts SET {} WHERE post_id = ?", sets.join(", "))
    } else {
        values.push(Box::new(claims.sub));
        format!(
            "UPDATE posts SET {} WHERE post_id = ? AND user_id = ?",
            sets.join(", ")
        )
    };

    let conn = pool.get()?;
    let affected = conn.execute(
        &sql,
        rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
    )?;
    if affected == 0 {
        return Err(AppError::NotFoundOrForbidden);
    }
    drop(conn);
    find_by_id(pool, post_id)
}

/// Deletes a post and its dependents as one atomic unit, then makes a
/// best-effort call to the upload server for the file artifact.
///
/// Ordering inside the transaction is fixed (likes, comments, ratings,
/// post_tags, then the post row) so failures are reproducible. A zero-row
/// post delete means the post is gone or the requester does not own it;
/// the transaction rolls back and the two cases are reported identically.
/// The artifact call runs only after commit: its failure is logged and
/// swallowed, never propagated, because the database is already the
/// committed source of truth.
pub async fn delete(
    pool: &DbPool,
    store: &dyn ArtifactStore,
    post_id: i64,
    claims: &Claims,
    bearer_token: &str,
) -> AppResult<()> {
    // Early exit before any transaction is opened.
    let post = find_by_id(pool, post_id)?;

    {
        let mut conn = pool.get()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM likes WHERE post_id = ?1", params![post_id])?;
        tx.execute("DELETE FROM comments WHERE post_id = ?1", params![post_id])?;
        tx.execute("DELETE FROM ratings WHERE post_id = ?1", params![post_id])?;
        tx.execute("DELETE FROM post_tags WHERE post_id = ?1", params![post_id])?;

        let affected = if claims.role.is_admin() {
            tx.execute("DELETE FROM posts WHERE post_id = ?1", params![post_id])?
        } else {
            tx.execute(
                "DELETE FROM posts WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, claims.sub],
            )?
        };

        if affected == 0 {
            // Dropping the transaction rolls back the dependent deletes.
            return Err(AppError::NotFoundOrForbidden);
        }

        tx.commit()?;
    }

    if let Err(e) = store.delete_artifact(&post.filename, bearer_token).await {
        tracing::warn!(
            "Artifact removal failed for {} (post {}): {}",
            post.filename,
            post_id,
            e
        );
    }

    Ok(())
}

// -- Likes --

pub fn like(pool: &DbPool, post_id: i64, user_id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO likes (post_id, user_id) VALUES (?1, ?2)",
        params![post_id, user_id],
    )
    .map_err(|e| constraint_error(e, "Already liked this post"))?;
    Ok(())
}

pub fn unlike(pool: &DbPool, post_id: i64, user_id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    let affected = conn.execute(
        "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub fn count_likes(pool: &DbPool, post_id: i64) -> AppResult<i64> {
    let conn = pool.get()?;
    let count = conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::Role;
    use crate::storage::StorageError;
    use crate::users::repository::{create as create_user, NewUser};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OkStore;

    #[async_trait]
    impl ArtifactStore for OkStore {
        async fn delete_artifact(&self, _: &str, _: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    struct FailingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactStore for FailingStore {
        async fn delete_artifact(&self, _: &str, _: &str) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Status(500))
        }
    }

    fn pool_with_users(count: usize) -> DbPool {
        let pool = db::create_test_pool();
        db::run_migrations(&pool).unwrap();
        for i in 1..=count {
            create_user(
                &pool,
                &NewUser {
                    username: format!("user{}", i),
                    email: format!("user{}@example.com", i),
                    password_hash: "h".to_string(),
                },
            )
            .unwrap();
        }
        pool
    }

    fn sample_post(user_id: i64) -> NewPost {
        NewPost {
            user_id,
            filename: "trip.jpg".to_string(),
            continent: "Europe".to_string(),
            country: "Finland".to_string(),
            city: "Helsinki".to_string(),
            latitude: Some(60.17),
            longitude: Some(24.94),
            start_date: "2024-06-01".to_string(),
            end_date: "2024-06-10".to_string(),
            description: "Midsummer".to_string(),
        }
    }

    fn claims(sub: i64, role: Role) -> Claims {
        Claims { sub, role }
    }

    fn seed_dependents(pool: &DbPool, post_id: i64) {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO likes (post_id, user_id) VALUES (?1, 1), (?1, 2)",
            params![post_id],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO comments (post_id, user_id, comment_text) VALUES (?1, 2, 'nice')",
            params![post_id],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO ratings (post_id, user_id, rating_value) VALUES (?1, 2, 5)",
            params![post_id],
        )
        .unwrap();
        conn.execute("INSERT INTO tags (tag_name) VALUES ('beach')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO post_tags (post_id, tag_id) VALUES (?1, 1)",
            params![post_id],
        )
        .unwrap();
    }

    fn table_count(pool: &DbPool, table: &str, post_id: i64) -> i64 {
        let conn = pool.get().unwrap();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE post_id = ?1", table),
            params![post_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn create_and_fetch() {
        let pool = pool_with_users(1);
        let post = create(&pool, &sample_post(1)).unwrap();
        assert_eq!(post.city, "Helsinki");
        let fetched = find_by_id(&pool, post.post_id).unwrap();
        assert_eq!(fetched.user_id, 1);
    }

    #[test]
    fn list_paginates() {
        let pool = pool_with_users(1);
        for _ in 0..5 {
            create(&pool, &sample_post(1)).unwrap();
        }
        assert_eq!(list(&pool, None, None).unwrap().len(), 5);
        assert_eq!(list(&pool, Some(1), Some(2)).unwrap().len(), 2);
        assert_eq!(list(&pool, Some(3), Some(2)).unwrap().len(), 1);
        assert!(list(&pool, Some(i64::MAX), Some(2)).unwrap().is_empty());
    }

    #[test]
    fn update_scoped_to_owner() {
        let pool = pool_with_users(2);
        let post = create(&pool, &sample_post(1)).unwrap();
        let patch = PostPatch {
            description: Some("updated".to_string()),
            ..Default::default()
        };

        // Non-owner non-admin cannot update
        let result = update(&pool, post.post_id, &patch, &claims(2, Role::User));
        assert!(matches!(result, Err(AppError::NotFoundOrForbidden)));

        // Owner can
        let updated = update(&pool, post.post_id, &patch, &claims(1, Role::User)).unwrap();
        assert_eq!(updated.description, "updated");

        // Admin can regardless of ownership
        let patch = PostPatch {
            city: Some("Espoo".to_string()),
            ..Default::default()
        };
        let updated = update(&pool, post.post_id, &patch, &claims(2, Role::Admin)).unwrap();
        assert_eq!(updated.city, "Espoo");
    }

    #[test]
    fn update_with_empty_patch_is_rejected() {
        let pool = pool_with_users(1);
        let post = create(&pool, &sample_post(1)).unwrap();
        let result = update(
            &pool,
            post.post_id,
            &PostPatch::default(),
            &claims(1, Role::User),
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn delete_removes_post_and_all_dependents() {
        let pool = pool_with_users(2);
        let post = create(&pool, &sample_post(1)).unwrap();
        seed_dependents(&pool, post.post_id);

        delete(&pool, &OkStore, post.post_id, &claims(1, Role::User), "t")
            .await
            .unwrap();

        assert!(matches!(
            find_by_id(&pool, post.post_id),
            Err(AppError::NotFound)
        ));
        for table in ["likes", "comments", "ratings", "post_tags"] {
            assert_eq!(table_count(&pool, table, post.post_id), 0, "{}", table);
        }
    }

    #[tokio::test]
    async fn delete_by_non_owner_rolls_back_dependents() {
        let pool = pool_with_users(2);
        let post = create(&pool, &sample_post(1)).unwrap();
        seed_dependents(&pool, post.post_id);

        let result = delete(&pool, &OkStore, post.post_id, &claims(2, Role::User), "t").await;
        assert!(matches!(result, Err(AppError::NotFoundOrForbidden)));

        // Dependents survive the aborted transaction
        assert_eq!(table_count(&pool, "likes", post.post_id), 2);
        assert_eq!(table_count(&pool, "comments", post.post_id), 1);
        assert_eq!(table_count(&pool, "ratings", post.post_id), 1);
        assert_eq!(table_count(&pool, "post_tags", post.post_id), 1);
        assert!(find_by_id(&pool, post.post_id).is_ok());
    }

    #[tokio::test]
    async fn admin_deletes_regardless_of_ownership() {
        let pool = pool_with_users(2);
        let post = create(&pool, &sample_post(1)).unwrap();
        seed_dependents(&pool, post.post_id);

        delete(&pool, &OkStore, post.post_id, &claims(2, Role::Admin), "t")
            .await
            .unwrap();

        assert!(matches!(
            find_by_id(&pool, post.post_id),
            Err(AppError::NotFound)
        ));
        for table in ["likes", "comments", "ratings", "post_tags"] {
            assert_eq!(table_count(&pool, table, post.post_id), 0, "{}", table);
        }
    }

    #[tokio::test]
    async fn artifact_failure_does_not_fail_delete() {
        let pool = pool_with_users(1);
        let post = create(&pool, &sample_post(1)).unwrap();

        let store = FailingStore {
            calls: AtomicUsize::new(0),
        };
        delete(&pool, &store, post.post_id, &claims(1, Role::User), "t")
            .await
            .unwrap();

        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            find_by_id(&pool, post.post_id),
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_missing_post_skips_artifact_call() {
        let pool = pool_with_users(1);
        let store = FailingStore {
            calls: AtomicUsize::new(0),
        };
        let result = delete(&pool, &store, 999, &claims(1, Role::User), "t").await;
        assert!(matches!(result, Err(AppError::NotFound)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn like_twice_is_conflict() {
        let pool = pool_with_users(2);
        let post = create(&pool, &sample_post(1)).unwrap();
        like(&pool, post.post_id, 2).unwrap();
        assert!(matches!(
            like(&pool, post.post_id, 2),
            Err(AppError::Conflict(_))
        ));
        assert_eq!(count_likes(&pool, post.post_id).unwrap(), 1);
    }

    #[test]
    fn unlike_without_like_is_not_found() {
        let pool = pool_with_users(2);
        let post = create(&pool, &sample_post(1)).unwrap();
        assert!(matches!(
            unlike(&pool, post.post_id, 2),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn most_liked_picks_highest() {
        let pool = pool_with_users(3);
        let a = create(&pool, &sample_post(1)).unwrap();
        let b = create(&pool, &sample_post(1)).unwrap();
        like(&pool, a.post_id, 2).unwrap();
        like(&pool, b.post_id, 2).unwrap();
        like(&pool, b.post_id, 3).unwrap();

        assert_eq!(most_liked(&pool).unwrap().post_id, b.post_id);
    }

    #[test]
    fn most_liked_with_no_likes_is_not_found() {
        let pool = pool_with_users(1);
        create(&pool, &sample_post(1)).unwrap();
        assert!(matches!(most_liked(&pool), Err(AppError::NotFound)));
    }
}
