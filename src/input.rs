//! Common routines for handling input data.
use crate::model::Model;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;

pub mod enduse;
use enduse::read_enduses;
pub mod fueltype;
use fueltype::read_fueltypes;
pub mod load_profile;
use load_profile::read_load_profiles;
pub mod region;
use region::read_regions;
pub mod scenario;
use scenario::{read_fuel_prices, read_scenario_drivers};
pub mod switch;
use switch::read_switches;
pub mod technology;
use technology::read_technologies;
pub mod weather;
use weather::{read_stations, read_temperatures};

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<impl Iterator<Item = T>> {
    let vec = read_csv_internal(file_path)?;
    ensure!(
        !vec.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file which may be absent or empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<impl Iterator<Item = T>> {
    if !file_path.exists() {
        return Ok(Vec::new().into_iter());
    }

    Ok(read_csv_internal(file_path)?.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Deserialize::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value is not between 0 and 1"))?;
    }

    Ok(value)
}

/// Format an error message to include the file path
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Check whether an iterator contains values that are sorted and unique
pub fn is_sorted_and_unique<T, I>(iter: I) -> bool
where
    T: PartialOrd + Clone,
    I: IntoIterator<Item = T>,
{
    iter.into_iter().tuple_windows().all(|(a, b)| a < b)
}

/// Split a semicolon-separated list, ignoring whitespace and empty entries
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Read a model from the specified directory.
///
/// Everything is validated here, before any region is simulated, including fitting the diffusion
/// curves of switched technologies.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The static model data or an error.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let assumptions = crate::assumptions::Assumptions::from_path(model_dir)?;
    let fueltypes = read_fueltypes(model_dir)?;
    let technologies = read_technologies(model_dir, &fueltypes, assumptions.end_yr)?;
    let mut enduses = read_enduses(model_dir, &fueltypes, &technologies)?;
    let switches = read_switches(
        model_dir,
        &fueltypes,
        &mut enduses,
        &technologies,
        assumptions.base_yr,
    )?;
    let regions = read_regions(model_dir, &fueltypes, &enduses)?;
    let stations = read_stations(model_dir)?;
    let temperatures = read_temperatures(model_dir, &stations, &assumptions)?;
    let drivers = read_scenario_drivers(model_dir, &regions)?;
    let prices = read_fuel_prices(model_dir, &fueltypes)?;
    let (profile_assignments, profile_inputs) = read_load_profiles(model_dir, &enduses)?;

    Model::new(
        model_dir.to_path_buf(),
        assumptions,
        fueltypes,
        regions,
        enduses,
        technologies,
        switches,
        stations,
        temperatures,
        drivers,
        prices,
        profile_assignments,
        profile_inputs,
    )
}
