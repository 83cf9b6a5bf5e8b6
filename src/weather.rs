//! Weather stations and the hourly temperatures used to drive heating and cooling demand.
//!
//! Each region is linked to its nearest usable weather station. Temperatures are held as cleaned
//! (365, 24) grids, one per (station, year).
use crate::assumptions::ClimateChange;
use crate::calendar::{DAYS_IN_YEAR, HOURS_IN_DAY, LEAP_DAY_INDEX, is_leap_year, month_of_day};
use crate::diffusion::linear_diffusion;
use crate::error::DemandError;
use crate::id::{define_id_getter, define_id_type};
use anyhow::{Result, bail, ensure};
use indexmap::IndexMap;
use log::debug;
use ndarray::Array2;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

define_id_type! {StationID}

/// Mean radius of the Earth (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A (365, 24) grid of hourly temperatures (°C)
pub type TemperatureGrid = Array2<f64>;

/// A map of [`WeatherStation`]s, keyed by station ID
pub type StationMap = IndexMap<StationID, WeatherStation>;

/// A weather station for which hourly temperatures are available
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherStation {
    /// Unique identifier for the station
    pub id: StationID,
    /// Longitude (degrees)
    pub longitude: f64,
    /// Latitude (degrees)
    pub latitude: f64,
}
define_id_getter! {WeatherStation, StationID}

/// Great-circle distance between two points in km, using the haversine formula
pub fn great_circle_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Get station IDs sorted by distance from the given point, nearest first.
///
/// Stations at the same distance are ordered by ID.
pub fn stations_by_distance(
    longitude: f64,
    latitude: f64,
    stations: &StationMap,
) -> Vec<&StationID> {
    let mut by_distance: Vec<_> = stations
        .values()
        .map(|station| {
            let distance =
                great_circle_distance(longitude, latitude, station.longitude, station.latitude);
            (distance, &station.id)
        })
        .collect();
    by_distance.sort_by(|(d1, id1), (d2, id2)| d1.total_cmp(d2).then_with(|| id1.cmp(id2)));

    by_distance.into_iter().map(|(_, id)| id).collect()
}

/// Get the ID of the station nearest to the given point
pub fn nearest_station(longitude: f64, latitude: f64, stations: &StationMap) -> Result<StationID> {
    match stations_by_distance(longitude, latitude, stations).first() {
        Some(id) => Ok((*id).clone()),
        None => bail!(DemandError::NoStations),
    }
}

/// Fill gaps in an hourly series by linear interpolation between the nearest valid values.
///
/// Gaps at either end of the series take the value of the nearest valid hour.
fn interpolate_gaps(values: &[Option<f64>]) -> Vec<f64> {
    let valid: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(idx, value)| value.map(|v| (idx, v)))
        .collect();

    let mut filled = Vec::with_capacity(values.len());
    let mut next = 0; // index into `valid` of the first valid hour at or after `idx`
    for (idx, value) in values.iter().enumerate() {
        while next < valid.len() && valid[next].0 < idx {
            next += 1;
        }

        if let Some(value) = value {
            filled.push(*value);
            continue;
        }

        let before = next.checked_sub(1).map(|i| valid[i]);
        let after = valid.get(next).copied();
        let value = match (before, after) {
            (Some((i0, v0)), Some((i1, v1))) => {
                let frac = (idx - i0) as f64 / (i1 - i0) as f64;
                v0 + (v1 - v0) * frac
            }
            _ => before.or(after).map_or(f64::NAN, |(_, v)| v),
        };
        filled.push(value);
    }

    filled
}

/// Convert raw daily rows of hourly temperatures into a cleaned [`TemperatureGrid`].
///
/// In a leap year, 29 February is dropped. Missing values are filled by linear interpolation of
/// adjacent hours, unless more than `crit_missing_values` are missing, in which case the station
/// is unusable.
///
/// # Arguments
///
/// * `station` - The station the data belongs to
/// * `year` - The year of the data
/// * `rows` - One row of 24 values per day, with `None` for missing values
/// * `crit_missing_values` - Maximum number of missing values allowed
pub fn clean_temperatures(
    station: &StationID,
    year: u32,
    mut rows: Vec<Vec<Option<f64>>>,
    crit_missing_values: usize,
) -> Result<TemperatureGrid> {
    if is_leap_year(year) && rows.len() == DAYS_IN_YEAR + 1 {
        rows.remove(LEAP_DAY_INDEX);
    }
    ensure!(
        rows.len() == DAYS_IN_YEAR,
        "Expected temperatures for {DAYS_IN_YEAR} days, found {}",
        rows.len()
    );
    for (day, row) in rows.iter().enumerate() {
        ensure!(
            row.len() == HOURS_IN_DAY,
            "Expected {HOURS_IN_DAY} hourly values for day {day}, found {}",
            row.len()
        );
    }

    let hourly: Vec<Option<f64>> = rows
        .into_iter()
        .flatten()
        .map(|value| value.filter(|v| v.is_finite()))
        .collect();
    let missing = hourly.iter().filter(|value| value.is_none()).count();
    if missing > crit_missing_values || missing == hourly.len() {
        bail!(DemandError::WeatherUnusable {
            station: station.to_string(),
            missing,
            limit: crit_missing_values,
        });
    }
    if missing > 0 {
        debug!("Interpolating {missing} missing temperatures for station {station} in {year}");
    }

    Ok(Array2::from_shape_vec(
        (DAYS_IN_YEAR, HOURS_IN_DAY),
        interpolate_gaps(&hourly),
    )?)
}

/// Add a monthly temperature offset, diffused linearly from zero in the base year to its full
/// value in `yr_until_changed` and held constant thereafter
pub fn climate_shift(
    temperatures: &TemperatureGrid,
    base_yr: u32,
    curr_yr: u32,
    climate_change: &ClimateChange,
) -> TemperatureGrid {
    let fraction = linear_diffusion(base_yr, curr_yr, climate_change.yr_until_changed);
    let mut shifted = temperatures.clone();
    for (day, mut row) in shifted.rows_mut().into_iter().enumerate() {
        let delta = climate_change.monthly_delta[month_of_day(day)] * fraction;
        row += delta;
    }

    shifted
}

/// Cleaned temperature grids for each (station, year) for which usable data was found.
///
/// A (station, year) whose file was present but had too many missing values is recorded as
/// unusable, as distinct from one with no file at all.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TemperatureStore {
    grids: HashMap<(StationID, u32), TemperatureGrid>,
    unusable: HashSet<(StationID, u32)>,
}

impl TemperatureStore {
    /// Add the temperatures for a (station, year)
    pub fn insert(&mut self, station: StationID, year: u32, grid: TemperatureGrid) {
        self.grids.insert((station, year), grid);
    }

    /// Get the temperatures for a (station, year), if present
    pub fn get(&self, station: &StationID, year: u32) -> Option<&TemperatureGrid> {
        self.grids.get(&(station.clone(), year))
    }

    /// Record that the temperatures for a (station, year) could not be used
    pub fn mark_unusable(&mut self, station: StationID, year: u32) {
        self.unusable.insert((station, year));
    }

    /// Whether the temperatures for a (station, year) were rejected as unusable
    pub fn is_unusable(&self, station: &StationID, year: u32) -> bool {
        self.unusable.contains(&(station.clone(), year))
    }
}

/// The temperatures used for a region in one year
#[derive(Debug, Clone, PartialEq)]
pub struct RegionWeather {
    /// The station the region is linked to
    pub station: StationID,
    /// Base-year temperatures
    pub temp_by: TemperatureGrid,
    /// Current-year temperatures, including any climate change shift
    pub temp_cy: TemperatureGrid,
}

/// Links regions to weather stations and provides their temperatures
pub struct WeatherResolver<'a> {
    stations: &'a StationMap,
    temperatures: &'a TemperatureStore,
    climate_change: Option<&'a ClimateChange>,
    base_yr: u32,
}

impl<'a> WeatherResolver<'a> {
    /// Create a new [`WeatherResolver`]
    pub fn new(
        stations: &'a StationMap,
        temperatures: &'a TemperatureStore,
        climate_change: Option<&'a ClimateChange>,
        base_yr: u32,
    ) -> Self {
        Self {
            stations,
            temperatures,
            climate_change,
            base_yr,
        }
    }

    /// Get temperatures for a location in the given year.
    ///
    /// The nearest station with usable base-year data is used, unless its current-year data was
    /// rejected as unusable, in which case the next nearest station is tried. If there is no
    /// current-year file at all, the base-year temperatures are reused.
    pub fn resolve(&self, longitude: f64, latitude: f64, curr_yr: u32) -> Result<RegionWeather> {
        for station in stations_by_distance(longitude, latitude, self.stations) {
            let Some(temp_by) = self.temperatures.get(station, self.base_yr) else {
                debug!("Skipping station {station}: no usable temperatures for {}", self.base_yr);
                continue;
            };
            if self.temperatures.is_unusable(station, curr_yr) {
                debug!("Skipping station {station}: temperatures for {curr_yr} are unusable");
                continue;
            }

            let temp_cy = self.temperatures.get(station, curr_yr).unwrap_or(temp_by);
            let temp_cy = match self.climate_change {
                Some(climate_change) => {
                    climate_shift(temp_cy, self.base_yr, curr_yr, climate_change)
                }
                None => temp_cy.clone(),
            };

            return Ok(RegionWeather {
                station: station.clone(),
                temp_by: temp_by.clone(),
                temp_cy,
            });
        }

        bail!(DemandError::NoStations)
    }
}
