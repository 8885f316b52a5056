use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, section_id_from_str, ser, u32_from_i64, user_id_from_str};
use crate::repository::{ProgressRepository, StorageError};
use training_core::model::{SectionProgress, UserId};

fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<SectionProgress, StorageError> {
    let user_id = user_id_from_str(row.try_get::<String, _>("user_id").map_err(ser)?)?;
    let section_id = section_id_from_str(row.try_get::<String, _>("section_id").map_err(ser)?)?;
    let section_title: String = row.try_get("section_title").map_err(ser)?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;
    let reading_time_seconds = u32_from_i64(
        "reading_time_seconds",
        row.try_get::<i64, _>("reading_time_seconds").map_err(ser)?,
    )?;

    Ok(SectionProgress::new(
        user_id,
        section_id,
        section_title,
        completed_at,
        reading_time_seconds,
    ))
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn list_progress(&self, user_id: &UserId) -> Result<Vec<SectionProgress>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, section_id, section_title, completed_at, reading_time_seconds
                FROM section_progress
                WHERE user_id = ?1
                ORDER BY section_id
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }

    async fn upsert_progress(&self, progress: &SectionProgress) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO section_progress (
                    user_id, section_id, section_title, completed_at, reading_time_seconds
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(user_id, section_id) DO UPDATE SET
                    section_title = excluded.section_title,
                    completed_at = excluded.completed_at,
                    reading_time_seconds = excluded.reading_time_seconds
            ",
        )
        .bind(progress.user_id.as_str())
        .bind(progress.section_id.as_str())
        .bind(&progress.section_title)
        .bind(progress.completed_at)
        .bind(i64::from(progress.reading_time_seconds))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn delete_progress(&self, user_id: &UserId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM section_progress WHERE user_id = ?1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
