use thiserror::Error;

use crate::model::IdError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
}
