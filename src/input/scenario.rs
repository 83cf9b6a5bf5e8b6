//! Code for reading scenario drivers and fuel prices from CSV files.
use super::*;
use crate::error::DemandError;
use crate::fueltype::FuelTypeLookup;
use crate::region::{RegionID, RegionMap};
use crate::scenario::{FuelPrices, ScenarioDrivers};
use serde::Deserialize;

const SCENARIO_DRIVERS_FILE_NAME: &str = "scenario_drivers.csv";
const FUEL_PRICES_FILE_NAME: &str = "fuel_prices.csv";

#[derive(Deserialize, PartialEq, Debug)]
struct ScenarioDriverRaw {
    region: String,
    year: u32,
    driver: String,
    value: f64,
}

#[derive(Deserialize, PartialEq, Debug)]
struct FuelPriceRaw {
    fueltype: String,
    year: u32,
    price: f64,
}

/// Read scenario drivers from the model directory, if provided.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `regions` - All regions
pub fn read_scenario_drivers(model_dir: &Path, regions: &RegionMap) -> Result<ScenarioDrivers> {
    let file_path = model_dir.join(SCENARIO_DRIVERS_FILE_NAME);
    let drivers_csv = read_csv_optional(&file_path)?;
    read_scenario_drivers_from_iter(drivers_csv, regions).with_context(|| input_err_msg(&file_path))
}

fn read_scenario_drivers_from_iter<I>(iter: I, regions: &RegionMap) -> Result<ScenarioDrivers>
where
    I: Iterator<Item = ScenarioDriverRaw>,
{
    let mut drivers = ScenarioDrivers::default();
    for raw in iter {
        ensure!(
            regions.contains_key(raw.region.as_str()),
            DemandError::configuration(format!("Unknown region: {}", raw.region))
        );
        drivers.insert(
            RegionID::from(raw.region.as_str()),
            raw.year,
            raw.driver.trim(),
            raw.value,
        )?;
    }

    Ok(drivers)
}

/// Read fuel prices from the model directory, if provided.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `fueltypes` - The fueltype lookup
pub fn read_fuel_prices(model_dir: &Path, fueltypes: &FuelTypeLookup) -> Result<FuelPrices> {
    let file_path = model_dir.join(FUEL_PRICES_FILE_NAME);
    let prices_csv = read_csv_optional(&file_path)?;
    read_fuel_prices_from_iter(prices_csv, fueltypes).with_context(|| input_err_msg(&file_path))
}

fn read_fuel_prices_from_iter<I>(iter: I, fueltypes: &FuelTypeLookup) -> Result<FuelPrices>
where
    I: Iterator<Item = FuelPriceRaw>,
{
    let mut prices = FuelPrices::default();
    for raw in iter {
        prices.insert(fueltypes.get_by_name(&raw.fueltype)?, raw.year, raw.price)?;
    }

    Ok(prices)
}
