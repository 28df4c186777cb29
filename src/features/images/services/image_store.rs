//! Moderation store: the persisted record of every submission.
//!
//! Every state change is a single statement. Approval is conditioned on the
//! row still being `pending`, so a second approval of the same row matches
//! nothing instead of overwriting the first one.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::core::error::{is_foreign_key_violation, is_unique_violation, AppError, Result};
use crate::features::images::models::{Image, ImageStatus};

const IMAGE_COLUMNS: &str =
    "id, filename, original_name, uploader_id, category_id, status, created_at, approved_at";

pub struct ImageStore {
    pool: SqlitePool,
}

impl ImageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a new pending submission
    pub async fn insert(
        &self,
        filename: &str,
        original_name: &str,
        uploader_id: i64,
        category_id: Option<i64>,
    ) -> Result<Image> {
        let sql = format!(
            "INSERT INTO images (filename, original_name, uploader_id, category_id, status, created_at) \
             VALUES (?, ?, ?, ?, 'pending', ?) RETURNING {}",
            IMAGE_COLUMNS
        );

        sqlx::query_as::<_, Image>(&sql)
            .bind(filename)
            .bind(original_name)
            .bind(uploader_id)
            .bind(category_id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Internal(format!("Duplicate stored name: {}", filename))
                } else {
                    AppError::Database(e)
                }
            })
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Image>> {
        let sql = format!("SELECT {} FROM images WHERE id = ?", IMAGE_COLUMNS);
        let image = sqlx::query_as::<_, Image>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(image)
    }

    /// Approve a pending row. Returns the number of rows changed (0 or 1).
    pub async fn transition_to_approved(
        &self,
        id: i64,
        category_id: i64,
        approved_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE images
            SET status = 'approved', category_id = ?, approved_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(category_id)
        .bind(approved_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| unknown_category(e, category_id))?;

        Ok(result.rows_affected())
    }

    /// Approve whichever of `ids` still exist and are pending; the rest are skipped.
    pub async fn bulk_transition_to_approved(
        &self,
        ids: &[i64],
        category_id: i64,
        approved_at: DateTime<Utc>,
    ) -> Result<u64> {
        let ids = dedup(ids);
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE images SET status = 'approved', category_id = ");
        query
            .push_bind(category_id)
            .push(", approved_at = ")
            .push_bind(approved_at)
            .push(" WHERE status = 'pending' AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| unknown_category(e, category_id))?;
        Ok(result.rows_affected())
    }

    /// Delete a row and hand back its stored name
    pub async fn remove(&self, id: i64) -> Result<Option<String>> {
        let filename =
            sqlx::query_scalar::<_, String>("DELETE FROM images WHERE id = ? RETURNING filename")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(filename)
    }

    /// Delete every existing row in `ids`, returning the stored names of the deleted rows
    pub async fn bulk_remove(&self, ids: &[i64]) -> Result<Vec<String>> {
        let ids = dedup(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM images WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") RETURNING filename");

        let filenames = query
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await?;
        Ok(filenames)
    }

    /// Number of submissions pointing at a category
    pub async fn count_referencing(&self, category_id: i64) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM images WHERE category_id = ?")
                .bind(category_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Approved images, newest approval first
    pub async fn list_approved(
        &self,
        category_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Image>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM images", IMAGE_COLUMNS));
        push_approved_filter(&mut query, category_id);
        query
            .push(" ORDER BY approved_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let images = query.build_query_as::<Image>().fetch_all(&self.pool).await?;
        Ok(images)
    }

    pub async fn count_approved(&self, category_id: Option<i64>) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM images");
        push_approved_filter(&mut query, category_id);

        let count = query.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// The approved image at a position of the stable id ordering
    pub async fn approved_at_position(
        &self,
        category_id: Option<i64>,
        position: i64,
    ) -> Result<Option<Image>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM images", IMAGE_COLUMNS));
        push_approved_filter(&mut query, category_id);
        query.push(" ORDER BY id LIMIT 1 OFFSET ").push_bind(position);

        let image = query
            .build_query_as::<Image>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(image)
    }

    /// Every image (optionally one status), newest upload first
    pub async fn list_all(
        &self,
        status: Option<ImageStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Image>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM images", IMAGE_COLUMNS));
        push_status_filter(&mut query, status);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let images = query.build_query_as::<Image>().fetch_all(&self.pool).await?;
        Ok(images)
    }

    pub async fn count(&self, status: Option<ImageStatus>) -> Result<i64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM images");
        push_status_filter(&mut query, status);

        let count = query.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// The moderation queue, oldest upload first
    pub async fn list_pending(&self) -> Result<Vec<Image>> {
        let sql = format!(
            "SELECT {} FROM images WHERE status = 'pending' ORDER BY created_at ASC, id ASC",
            IMAGE_COLUMNS
        );
        let images = sqlx::query_as::<_, Image>(&sql)
            .fetch_all(&self.pool)
            .await?;
        debug!("Pending queue holds {} images", images.len());
        Ok(images)
    }
}

fn push_approved_filter(query: &mut QueryBuilder<'_, Sqlite>, category_id: Option<i64>) {
    query.push(" WHERE status = 'approved'");
    if let Some(category_id) = category_id {
        query.push(" AND category_id = ").push_bind(category_id);
    }
}

fn push_status_filter(query: &mut QueryBuilder<'_, Sqlite>, status: Option<ImageStatus>) {
    if let Some(status) = status {
        query.push(" WHERE status = ").push_bind(status.as_str());
    }
}

/// Drop repeated ids, keeping first occurrence order
fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// A category deleted after the caller checked it surfaces as a FK violation
fn unknown_category(err: sqlx::Error, category_id: i64) -> AppError {
    if is_foreign_key_violation(&err) {
        AppError::Validation(format!("Category {} does not exist", category_id))
    } else {
        AppError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::{create_test_user, test_pool};
    use chrono::{Duration, TimeZone};

    struct Fixture {
        store: ImageStore,
        pool: SqlitePool,
        user: i64,
    }

    impl Fixture {
        async fn new() -> Self {
            let pool = test_pool().await;
            let user = create_test_user(&pool, "uploader").await;
            Self {
                store: ImageStore::new(pool.clone()),
                pool,
                user,
            }
        }

        async fn pending(&self, n: usize) -> Vec<i64> {
            let mut ids = Vec::with_capacity(n);
            for i in 0..n {
                let image = self
                    .store
                    .insert(&format!("{i:032x}.webp"), &format!("pic{i}.png"), self.user, None)
                    .await
                    .unwrap();
                ids.push(image.id);
            }
            ids
        }
    }

    fn at_minute(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    #[tokio::test]
    async fn test_insert_creates_pending_row() {
        let fx = Fixture::new().await;
        let image = fx
            .store
            .insert("a.webp", "../../etc/passwd.png", fx.user, Some(2))
            .await
            .unwrap();

        assert_eq!(image.status, ImageStatus::Pending);
        assert_eq!(image.category_id, Some(2));
        assert!(image.approved_at.is_none());
        assert_eq!(image.original_name, "../../etc/passwd.png");

        let found = fx.store.find_by_id(image.id).await.unwrap().unwrap();
        assert_eq!(found.filename, "a.webp");
    }

    #[tokio::test]
    async fn test_duplicate_stored_name_is_a_server_fault() {
        let fx = Fixture::new().await;
        fx.store.insert("same.webp", "a.png", fx.user, None).await.unwrap();
        let err = fx
            .store
            .insert("same.webp", "b.png", fx.user, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_approved_rows_carry_category_and_timestamp() {
        let fx = Fixture::new().await;
        let ids = fx.pending(1).await;

        let changed = fx
            .store
            .transition_to_approved(ids[0], 3, at_minute(5))
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let image = fx.store.find_by_id(ids[0]).await.unwrap().unwrap();
        assert_eq!(image.status, ImageStatus::Approved);
        assert_eq!(image.category_id, Some(3));
        assert_eq!(image.approved_at, Some(at_minute(5)));
    }

    #[tokio::test]
    async fn test_concurrent_double_approval_changes_one_row() {
        let fx = Fixture::new().await;
        let ids = fx.pending(1).await;

        let (first, second) = tokio::join!(
            fx.store.transition_to_approved(ids[0], 1, at_minute(1)),
            fx.store.transition_to_approved(ids[0], 2, at_minute(2)),
        );
        let mut outcomes = vec![first.unwrap(), second.unwrap()];
        outcomes.sort();
        assert_eq!(outcomes, vec![0, 1]);

        // A later approval never overwrites the first one
        let image = fx.store.find_by_id(ids[0]).await.unwrap().unwrap();
        let expected = if image.category_id == Some(1) {
            at_minute(1)
        } else {
            at_minute(2)
        };
        assert_eq!(image.approved_at, Some(expected));
        assert_eq!(
            fx.store
                .transition_to_approved(ids[0], 4, at_minute(9))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_bulk_approve_skips_missing_and_processed_rows() {
        let fx = Fixture::new().await;
        let ids = fx.pending(3).await;
        fx.store
            .transition_to_approved(ids[0], 1, at_minute(0))
            .await
            .unwrap();

        let changed = fx
            .store
            .bulk_transition_to_approved(&[ids[0], ids[1], ids[2], ids[2], 9999], 2, at_minute(1))
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let first = fx.store.find_by_id(ids[0]).await.unwrap().unwrap();
        assert_eq!(first.category_id, Some(1));
        assert_eq!(
            fx.store.bulk_transition_to_approved(&[], 2, at_minute(2)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_approval_into_missing_category_is_a_validation_error() {
        let fx = Fixture::new().await;
        let ids = fx.pending(2).await;

        let err = fx
            .store
            .transition_to_approved(ids[0], 9999, at_minute(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = fx
            .store
            .bulk_transition_to_approved(&ids, 9999, at_minute(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let image = fx.store.find_by_id(ids[0]).await.unwrap().unwrap();
        assert_eq!(image.status, ImageStatus::Pending);
    }

    #[tokio::test]
    async fn test_remove_returns_filename() {
        let fx = Fixture::new().await;
        let ids = fx.pending(1).await;

        let filename = fx.store.remove(ids[0]).await.unwrap();
        assert_eq!(filename.as_deref(), Some(format!("{:032x}.webp", 0).as_str()));
        assert!(fx.store.find_by_id(ids[0]).await.unwrap().is_none());
        assert!(fx.store.remove(ids[0]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bulk_remove_returns_removed_filenames() {
        let fx = Fixture::new().await;
        let ids = fx.pending(3).await;

        let mut removed = fx
            .store
            .bulk_remove(&[ids[0], ids[2], 4242])
            .await
            .unwrap();
        removed.sort();
        assert_eq!(removed, vec![format!("{:032x}.webp", 0), format!("{:032x}.webp", 2)]);
        assert_eq!(fx.store.count(None).await.unwrap(), 1);
        assert!(fx.store.bulk_remove(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_page_of_approved_images() {
        let fx = Fixture::new().await;
        let ids = fx.pending(25).await;
        for (i, id) in ids.iter().enumerate() {
            fx.store
                .transition_to_approved(*id, 1, at_minute(i as i64))
                .await
                .unwrap();
        }

        let page = fx.store.list_approved(None, 10, 10).await.unwrap();
        assert_eq!(page.len(), 10);
        // Newest approval first: items 11..=20 are ids[14] down to ids[5]
        let expected: Vec<i64> = ids[5..15].iter().rev().copied().collect();
        let got: Vec<i64> = page.iter().map(|i| i.id).collect();
        assert_eq!(got, expected);
        assert_eq!(fx.store.count_approved(None).await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_category_filter_and_counts() {
        let fx = Fixture::new().await;
        let ids = fx.pending(4).await;
        fx.store.transition_to_approved(ids[0], 1, at_minute(0)).await.unwrap();
        fx.store.transition_to_approved(ids[1], 2, at_minute(1)).await.unwrap();
        fx.store.transition_to_approved(ids[2], 2, at_minute(2)).await.unwrap();

        assert_eq!(fx.store.count_approved(Some(2)).await.unwrap(), 2);
        assert_eq!(fx.store.count_approved(Some(5)).await.unwrap(), 0);
        assert_eq!(fx.store.count(Some(ImageStatus::Pending)).await.unwrap(), 1);
        assert_eq!(fx.store.count(Some(ImageStatus::Approved)).await.unwrap(), 3);
        assert_eq!(fx.store.count_referencing(2).await.unwrap(), 2);
        assert_eq!(fx.store.count_referencing(4).await.unwrap(), 0);

        let third = fx.store.approved_at_position(Some(2), 1).await.unwrap().unwrap();
        assert_eq!(third.id, ids[2]);
        assert!(fx.store.approved_at_position(Some(2), 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_queue_is_oldest_first() {
        let fx = Fixture::new().await;
        let ids = fx.pending(3).await;
        fx.store.transition_to_approved(ids[1], 1, at_minute(0)).await.unwrap();

        let queue: Vec<i64> = fx
            .store
            .list_pending()
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(queue, vec![ids[0], ids[2]]);

        let all: Vec<i64> = fx
            .store
            .list_all(None, 10, 0)
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(all.len(), 3);
        let pending_only = fx
            .store
            .list_all(Some(ImageStatus::Pending), 10, 0)
            .await
            .unwrap();
        assert!(pending_only.iter().all(|i| i.status == ImageStatus::Pending));
    }

    #[tokio::test]
    async fn test_schema_rejects_inconsistent_rows() {
        let fx = Fixture::new().await;
        let result = sqlx::query(
            "INSERT INTO images (filename, original_name, uploader_id, status, created_at) \
             VALUES ('x.webp', 'x.png', ?, 'approved', ?)",
        )
        .bind(fx.user)
        .bind(Utc::now())
        .execute(&fx.pool)
        .await;
        assert!(result.is_err());
    }
}
