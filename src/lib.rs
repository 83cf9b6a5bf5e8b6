//! Hourly energy demand decomposition.
//!
//! Yearly fuel consumption per region, sector and enduse is projected to a simulation year and
//! broken down into hourly demand per fueltype, accounting for weather, technology stock, fuel and
//! service switches and the diffusion of new technologies.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod assumptions;
pub mod calendar;
pub mod cli;
pub mod decompose;
pub mod degree_days;
pub mod diffusion;
pub mod enduse;
pub mod error;
pub mod fueltype;
pub mod id;
pub mod input;
pub mod load_profile;
pub mod log;
pub mod model;
pub mod output;
pub mod region;
pub mod results;
pub mod scenario;
pub mod settings;
pub mod sigmoid_fit;
pub mod simulation;
pub mod switch;
pub mod technology;
pub mod weather;

#[cfg(test)]
mod fixture;

/// Get the folder in which program configuration files are stored
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("energy_demand");

    path
}
