//! The error kinds raised by the demand model.
//!
//! Errors are propagated as [`anyhow::Error`]s with context attached. Where callers need to know
//! which kind of failure occurred, they can recover a [`DemandError`] with
//! [`anyhow::Error::downcast_ref`].
use thiserror::Error;

/// A failure of the demand model which callers may want to distinguish
#[derive(Debug, Error, PartialEq)]
pub enum DemandError {
    /// Invalid or inconsistent input data
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Both fuel switches and service switches were declared for the same enduse
    #[error("Both fuel switches and service switches are declared for enduse {0}")]
    ConflictingSwitches(String),
    /// No starting parameters produced an acceptable sigmoid fit
    #[error("Sigmoid fit failed for enduse {enduse}, technology {technology}")]
    FitFailure {
        /// The enduse of the switch
        enduse: String,
        /// The technology whose diffusion curve could not be fitted
        technology: String,
    },
    /// A weather station has too many missing values to be used
    #[error("Weather station {station} is unusable: {missing} values missing (limit: {limit})")]
    WeatherUnusable {
        /// The station ID
        station: String,
        /// Number of missing hourly values
        missing: usize,
        /// Maximum number of missing values allowed
        limit: usize,
    },
    /// There are no (usable) weather stations
    #[error("No usable weather stations available")]
    NoStations,
    /// No load profile has been registered for a key
    #[error("No load profile for enduse {enduse}, sector {sector}, technology {technology}")]
    ProfileMissing {
        /// The enduse
        enduse: String,
        /// The sector
        sector: String,
        /// The technology
        technology: String,
    },
    /// A conservation law was violated
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DemandError {
    /// Create a [`DemandError::Configuration`] from a message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a [`DemandError::Internal`] from a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Get the [`DemandError`] at the root of an error chain, if there is one
pub fn demand_error(err: &anyhow::Error) -> Option<&DemandError> {
    err.chain().find_map(|cause| cause.downcast_ref::<DemandError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result, bail};

    fn fail() -> Result<()> {
        bail!(DemandError::ConflictingSwitches("rs_space_heating".into()))
    }

    #[test]
    fn test_demand_error_survives_context() {
        let err = fail().context("Region GBR").unwrap_err();
        assert_eq!(
            demand_error(&err),
            Some(&DemandError::ConflictingSwitches(
                "rs_space_heating".into()
            ))
        );
    }

    #[test]
    fn test_display() {
        let err = DemandError::WeatherUnusable {
            station: "st1".into(),
            missing: 200,
            limit: 100,
        };
        assert_eq!(
            err.to_string(),
            "Weather station st1 is unusable: 200 values missing (limit: 100)"
        );
    }
}
