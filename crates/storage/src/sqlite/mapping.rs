use std::collections::BTreeSet;

use crate::repository::StorageError;
use training_core::model::{QuestionId, QuizType, SectionId, UserId};

pub(super) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(super) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(super) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(super) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    u64::try_from(v)
        .map(QuestionId::new)
        .map_err(|_| StorageError::Serialization(format!("invalid question id: {v}")))
}

pub(super) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("question id overflow".into()))
}

pub(super) fn user_id_from_str(raw: String) -> Result<UserId, StorageError> {
    UserId::new(raw).map_err(ser)
}

pub(super) fn section_id_from_str(raw: String) -> Result<SectionId, StorageError> {
    SectionId::new(raw).map_err(ser)
}

pub(super) fn quiz_type_from_str(raw: String) -> Result<QuizType, StorageError> {
    QuizType::new(raw).map_err(ser)
}

/// Option-key sets cross the SQLite boundary as JSON arrays.
pub(super) fn keys_to_json(keys: &BTreeSet<String>) -> Result<String, StorageError> {
    serde_json::to_string(keys).map_err(ser)
}

pub(super) fn keys_from_json(raw: &str) -> Result<BTreeSet<String>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}
