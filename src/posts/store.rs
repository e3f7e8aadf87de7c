use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

/// A single chirp. Immutable once inserted; never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// Fixed page size for every list read. No cursors.
pub const PAGE_SIZE: i64 = 100;

pub(crate) fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub async fn insert(
    db_pool: &SqlitePool,
    author_id: &str,
    content: &str,
) -> Result<Post, sqlx::Error> {
    let post = Post {
        id: Uuid::now_v7().to_string(),
        author_id: author_id.to_owned(),
        content: content.to_owned(),
        created_at: now_millis(),
    };

    sqlx::query("INSERT INTO posts (id,author_id,content,created_at) VALUES (?,?,?,?)")
        .bind(&post.id)
        .bind(&post.author_id)
        .bind(&post.content)
        .bind(post.created_at)
        .execute(db_pool)
        .await?;

    Ok(post)
}

pub async fn recent(db_pool: &SqlitePool) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id,author_id,content,created_at FROM posts ORDER BY created_at DESC LIMIT ?",
    )
    .bind(PAGE_SIZE)
    .fetch_all(db_pool)
    .await
}

pub async fn by_author(db_pool: &SqlitePool, author_id: &str) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id,author_id,content,created_at FROM posts WHERE author_id=? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(author_id)
    .bind(PAGE_SIZE)
    .fetch_all(db_pool)
    .await
}

pub async fn by_id(db_pool: &SqlitePool, id: &str) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as("SELECT id,author_id,content,created_at FROM posts WHERE id=?")
        .bind(id)
        .fetch_optional(db_pool)
        .await
}

pub async fn latest(db_pool: &SqlitePool) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id,author_id,content,created_at FROM posts ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_optional(db_pool)
    .await
}


#[cfg(test)]
mod tests {
    use super::{testing::*, *};

    #[tokio::test]
    async fn insert_then_read_back_by_id() {
        let pool = test_pool().await;

        let created = insert(&pool, "user_1", "🦀").await.unwrap();
        let fetched = by_id(&pool, &created.id).await.unwrap();

        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn by_id_misses_on_unknown_id() {
        let pool = test_pool().await;

        assert_eq!(by_id(&pool, "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn recent_is_newest_first() {
        let pool = test_pool().await;
        insert_at(&pool, "a", "user_1", "🌊", 1_000).await;
        insert_at(&pool, "b", "user_2", "🔥", 3_000).await;
        insert_at(&pool, "c", "user_1", "🌑", 2_000).await;

        let posts = recent(&pool).await.unwrap();
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();

        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[tokio::test]
    async fn recent_caps_at_page_size() {
        let pool = test_pool().await;
        for n in 0..105 {
            insert_at(&pool, &format!("id{n}"), "user_1", "🦀", n).await;
        }

        let posts = recent(&pool).await.unwrap();

        assert_eq!(posts.len(), PAGE_SIZE as usize);
        // The five oldest fall off, not the five newest.
        assert_eq!(posts[0].id, "id104");
        assert_eq!(posts.last().unwrap().id, "id5");
    }

    #[tokio::test]
    async fn by_author_filters_and_sorts() {
        let pool = test_pool().await;
        insert_at(&pool, "a", "user_1", "🌊", 1_000).await;
        insert_at(&pool, "b", "user_2", "🔥", 2_000).await;
        insert_at(&pool, "c", "user_1", "🌑", 3_000).await;

        let posts = by_author(&pool, "user_1").await.unwrap();
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();

        assert_eq!(ids, ["c", "a"]);
    }

    #[tokio::test]
    async fn latest_is_none_on_empty_table() {
        let pool = test_pool().await;

        assert_eq!(latest(&pool).await.unwrap(), None);
    }

    #[tokio::test]
    async fn latest_returns_the_newest_post() {
        let pool = test_pool().await;
        insert_at(&pool, "a", "user_1", "🌊", 1_000).await;
        insert_at(&pool, "b", "user_2", "🔥", 2_000).await;

        let post = latest(&pool).await.unwrap().unwrap();

        assert_eq!(post.id, "b");
    }
}
