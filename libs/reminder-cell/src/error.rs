use thiserror::Error;

use identity_cell::IdentityError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Could not resolve contact: {0}")]
    Identity(#[from] IdentityError),
}

impl From<ReminderError> for AppError {
    fn from(err: ReminderError) -> Self {
        AppError::Database(err.to_string())
    }
}
