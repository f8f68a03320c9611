use rideshare_lib::{page::PageError, ride::RideFormError, rules::SignupDenial};
use thiserror::Error;

pub mod database;
mod data_manager;

pub use data_manager::*;

pub const DEFAULT_DATABASE_PATH: &str = "data/rideshare.db";

#[derive(Debug, Error)]
pub enum DataManagerError {
    #[error("database error: {0}")]
    Database(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("only the driver may change this ride")]
    PermissionDenied,
    #[error("signup refused: {0}")]
    SignupDenied(SignupDenial),
    #[error("invalid ride: {0}")]
    InvalidRide(#[from] RideFormError),
    #[error("username {0:?} is already taken")]
    UsernameTaken(String),
}
