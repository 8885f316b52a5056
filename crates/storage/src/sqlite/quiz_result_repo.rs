use chrono::Utc;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, quiz_type_from_str, ser, u32_from_i64, user_id_from_str};
use crate::repository::{QuizResultRecord, QuizResultRepository, StorageError};
use training_core::model::{Answer, UserId};

fn map_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuizResultRecord, StorageError> {
    let user_id = user_id_from_str(row.try_get::<String, _>("user_id").map_err(ser)?)?;
    let quiz_type = quiz_type_from_str(row.try_get::<String, _>("quiz_type").map_err(ser)?)?;
    let answers: Vec<Answer> =
        serde_json::from_str(&row.try_get::<String, _>("answers").map_err(ser)?).map_err(ser)?;
    let score = u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?;
    let max_score = u32_from_i64("max_score", row.try_get::<i64, _>("max_score").map_err(ser)?)?;
    let total_questions = u32_from_i64(
        "total_questions",
        row.try_get::<i64, _>("total_questions").map_err(ser)?,
    )?;
    let correct_answers = u32_from_i64(
        "correct_answers",
        row.try_get::<i64, _>("correct_answers").map_err(ser)?,
    )?;
    let duration_seconds = u32_from_i64(
        "duration_seconds",
        row.try_get::<i64, _>("duration_seconds").map_err(ser)?,
    )?;
    let started_at = row.try_get("started_at").map_err(ser)?;

    Ok(QuizResultRecord {
        user_id,
        quiz_type,
        answers,
        score,
        max_score,
        total_questions,
        correct_answers,
        duration_seconds,
        started_at,
    })
}

#[async_trait::async_trait]
impl QuizResultRepository for SqliteRepository {
    async fn save_result(&self, result: &QuizResultRecord) -> Result<(), StorageError> {
        let answers = serde_json::to_string(&result.answers).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO quiz_results (
                    user_id, quiz_type, answers, score, max_score,
                    total_questions, correct_answers, duration_seconds,
                    started_at, saved_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(result.user_id.as_str())
        .bind(result.quiz_type.as_str())
        .bind(answers)
        .bind(i64::from(result.score))
        .bind(i64::from(result.max_score))
        .bind(i64::from(result.total_questions))
        .bind(i64::from(result.correct_answers))
        .bind(i64::from(result.duration_seconds))
        .bind(result.started_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_results(&self, user_id: &UserId) -> Result<Vec<QuizResultRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, quiz_type, answers, score, max_score,
                       total_questions, correct_answers, duration_seconds, started_at
                FROM quiz_results
                WHERE user_id = ?1
                ORDER BY saved_at DESC, id DESC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row(&row)?);
        }
        Ok(out)
    }
}
