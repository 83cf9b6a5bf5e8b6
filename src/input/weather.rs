//! Code for reading weather stations and their hourly temperatures.
use super::*;
use crate::assumptions::Assumptions;
use crate::error::{DemandError, demand_error};
use crate::id::HasID;
use crate::weather::{StationMap, TemperatureStore, WeatherStation, clean_temperatures};
use anyhow::bail;
use log::{debug, warn};
use std::path::PathBuf;

const STATIONS_FILE_NAME: &str = "stations.csv";

/// The folder containing one temperature file per (station, year)
const TEMPERATURES_DIR_NAME: &str = "temperatures";

/// Read weather stations from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn read_stations(model_dir: &Path) -> Result<StationMap> {
    let file_path = model_dir.join(STATIONS_FILE_NAME);
    let stations_csv = read_csv(&file_path)?;
    read_stations_from_iter(stations_csv).with_context(|| input_err_msg(&file_path))
}

fn read_stations_from_iter<I>(iter: I) -> Result<StationMap>
where
    I: Iterator<Item = WeatherStation>,
{
    let mut stations = StationMap::new();
    for station in iter {
        let id = station.get_id().clone();
        ensure!(
            (-180.0..=180.0).contains(&station.longitude)
                && (-90.0..=90.0).contains(&station.latitude),
            DemandError::configuration(format!("Invalid coordinates for station {id}"))
        );
        ensure!(
            stations.insert(id.clone(), station).is_none(),
            "Duplicate weather station: {id}"
        );
    }

    Ok(stations)
}

/// Path to the temperature file for a (station, year)
fn temperature_file_path(model_dir: &Path, station: &WeatherStation, year: u32) -> PathBuf {
    model_dir
        .join(TEMPERATURES_DIR_NAME)
        .join(format!("{}_{year}.csv", station.id))
}

/// Read raw hourly temperatures: one row per day, 24 columns, no header.
///
/// Empty fields are treated as missing.
fn read_temperature_rows(file_path: &Path) -> Result<Vec<Vec<Option<f64>>>> {
    let rows = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(file_path)?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())?;

    Ok(rows)
}

/// Read and clean temperatures for all stations in the base year and simulated years.
///
/// Files which are absent are skipped, as are stations with too many missing values. At least one
/// station must have usable base-year temperatures.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `stations` - All weather stations
/// * `assumptions` - Model assumptions
pub fn read_temperatures(
    model_dir: &Path,
    stations: &StationMap,
    assumptions: &Assumptions,
) -> Result<TemperatureStore> {
    let years = std::iter::once(assumptions.base_yr)
        .chain(assumptions.iter_years())
        .unique()
        .collect_vec();

    let mut store = TemperatureStore::default();
    for station in stations.values() {
        for &year in &years {
            let file_path = temperature_file_path(model_dir, station, year);
            if !file_path.exists() {
                debug!("No temperatures for station {} in {year}", station.id);
                continue;
            }

            let rows =
                read_temperature_rows(&file_path).with_context(|| input_err_msg(&file_path))?;
            match clean_temperatures(&station.id, year, rows, assumptions.crit_missing_values) {
                Ok(grid) => store.insert(station.id.clone(), year, grid),
                Err(err)
                    if matches!(
                        demand_error(&err),
                        Some(DemandError::WeatherUnusable { .. })
                    ) =>
                {
                    warn!("Skipping temperatures in {}: {err}", file_path.display());
                    store.mark_unusable(station.id.clone(), year);
                }
                Err(err) => return Err(err.context(input_err_msg(&file_path))),
            }
        }
    }

    if !stations
        .keys()
        .any(|station| store.get(station, assumptions.base_yr).is_some())
    {
        bail!(DemandError::NoStations);
    }

    Ok(store)
}
