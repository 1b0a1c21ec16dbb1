//! Error types for Sendpace

use thiserror::Error;

/// Main error type for Sendpace
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No eligible profiles available in this group")]
    NoEligibleProfiles,

    #[error("Profile is not available: {0}")]
    ProfileUnavailable(String),

    #[error("Scheduling conflict, retry exhausted")]
    SchedulingRace,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Sendpace
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::Transport(_) => 502,
            Error::Validation(_) => 422,
            Error::NotFound(_) => 404,
            Error::NoEligibleProfiles => 409,
            Error::ProfileUnavailable(_) => 409,
            Error::SchedulingRace => 503,
            Error::Internal(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::NoEligibleProfiles => "NO_ELIGIBLE_PROFILES",
            Error::ProfileUnavailable(_) => "PROFILE_UNAVAILABLE",
            Error::SchedulingRace => "SCHEDULING_RACE",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::NoEligibleProfiles.status_code(), 409);
        assert_eq!(Error::NotFound("group".into()).status_code(), 404);
        assert_eq!(Error::Validation("bad".into()).status_code(), 422);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NoEligibleProfiles.code(), "NO_ELIGIBLE_PROFILES");
        assert_eq!(Error::SchedulingRace.code(), "SCHEDULING_RACE");
    }
}
