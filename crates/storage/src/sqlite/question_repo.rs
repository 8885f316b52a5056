use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, keys_from_json, keys_to_json, question_id_from_i64, question_id_to_i64,
    quiz_type_from_str, ser, u32_from_i64,
};
use crate::repository::{QuestionRepository, QuestionSelector, StorageError};
use training_core::model::{Question, ScopeId};

fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let prompt: String = row.try_get("prompt").map_err(ser)?;
    let points = u32_from_i64("points", row.try_get::<i64, _>("points").map_err(ser)?)?;
    let correct_answer =
        keys_from_json(&row.try_get::<String, _>("correct_answer").map_err(ser)?)?;
    let quiz_type = quiz_type_from_str(row.try_get::<String, _>("quiz_type").map_err(ser)?)?;

    Ok(Question::new(id, prompt, points, correct_answer, quiz_type))
}

impl SqliteRepository {
    /// Insert one question at the given position, optionally scoped.
    ///
    /// Question authoring is an admin concern outside this library; this
    /// inherent method exists for seeding and integration tests.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    pub async fn insert_question(
        &self,
        scope: Option<ScopeId>,
        position: u32,
        question: &Question,
    ) -> Result<(), StorageError> {
        let scope_id = scope
            .map(|s| {
                i64::try_from(s.value())
                    .map_err(|_| StorageError::Serialization("scope id overflow".into()))
            })
            .transpose()?;

        sqlx::query(
            r"
                INSERT INTO questions (
                    id, prompt, points, correct_answer, quiz_type, scope_id, position
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(question_id_to_i64(question.id())?)
        .bind(question.prompt())
        .bind(i64::from(question.points()))
        .bind(keys_to_json(question.correct_answer())?)
        .bind(question.quiz_type().as_str())
        .bind(scope_id)
        .bind(i64::from(position))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn list_questions(
        &self,
        selector: &QuestionSelector,
    ) -> Result<Vec<Question>, StorageError> {
        let rows = match selector {
            QuestionSelector::ByQuizType(quiz_type) => {
                sqlx::query(
                    r"
                        SELECT id, prompt, points, correct_answer, quiz_type
                        FROM questions
                        WHERE quiz_type = ?1
                        ORDER BY position, id
                    ",
                )
                .bind(quiz_type.as_str())
                .fetch_all(&self.pool)
                .await
            }
            QuestionSelector::ByScope(scope_id) => {
                let scope = i64::try_from(scope_id.value())
                    .map_err(|_| StorageError::Serialization("scope id overflow".into()))?;
                sqlx::query(
                    r"
                        SELECT id, prompt, points, correct_answer, quiz_type
                        FROM questions
                        WHERE scope_id = ?1
                        ORDER BY position, id
                    ",
                )
                .bind(scope)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?);
        }
        Ok(out)
    }
}
