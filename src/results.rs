//! The results of decomposing each enduse's demand.
use crate::calendar::{DAYS_IN_YEAR, HOURS_IN_DAY};
use crate::enduse::{EnduseID, SectorID};
use crate::error::DemandError;
use crate::fueltype::FuelTypeLookup;
use crate::region::RegionID;
use anyhow::{Result, ensure};
use float_cmp::approx_eq;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{Array1, Array2, Array3, Axis};

/// Relative tolerance when checking hourly fuel against yearly fuel
const CONSERVATION_TOLERANCE: f64 = 1e-5;

/// Whether two yearly fuel totals agree within [`CONSERVATION_TOLERANCE`]
fn fuel_conserved(actual: f64, expected: f64) -> bool {
    approx_eq!(
        f64,
        actual,
        expected,
        epsilon = CONSERVATION_TOLERANCE * expected.abs().max(1.0)
    )
}

/// Identifies the result for one enduse of one sector in one region and year
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultKey {
    /// The region
    pub region: RegionID,
    /// The simulated year
    pub year: u32,
    /// The sector
    pub sector: SectorID,
    /// The enduse
    pub enduse: EnduseID,
}

/// The decomposed demand of one enduse
#[derive(Debug, Clone, PartialEq)]
pub struct EnduseResult {
    /// Fuel in every hour, shape (F, 365, 24)
    pub fuel_yh: Array3<f64>,
    /// Yearly fuel the hourly fuel must add up to, shape (F)
    pub fuel_y_expected: Array1<f64>,
    /// Fuel on every day, shape (F, 365)
    pub fuel_yd: Array2<f64>,
    /// Fuel in each hour of the peak day, shape (F, 24)
    pub fuel_peak_dh: Array2<f64>,
    /// Fuel in the peak hour, shape (F)
    pub fuel_peak_h: Array1<f64>,
    /// The peak day
    pub peak_day: usize,
}

impl EnduseResult {
    /// Create a result from hourly fuel, the yearly fuel it should add up to and the fuel on the
    /// peak day
    pub fn new(
        fuel_yh: Array3<f64>,
        fuel_y_expected: Array1<f64>,
        fuel_peak_dh: Array2<f64>,
        peak_day: usize,
    ) -> Self {
        let fuel_yd = fuel_yh.sum_axis(Axis(2));
        let fuel_peak_h = fuel_peak_dh.map_axis(Axis(1), |hours| {
            hours.iter().copied().fold(0.0, f64::max)
        });

        Self {
            fuel_yh,
            fuel_y_expected,
            fuel_yd,
            fuel_peak_dh,
            fuel_peak_h,
            peak_day,
        }
    }

    /// Yearly fuel, by fueltype
    pub fn fuel_y(&self) -> Array1<f64> {
        self.fuel_yd.sum_axis(Axis(1))
    }

    /// Check that the hourly fuel adds up to the expected yearly fuel for every fueltype
    pub fn check_conservation(&self) -> Result<()> {
        let fuel_y = self.fuel_y();
        for (idx, (actual, expected)) in fuel_y.iter().zip(&self.fuel_y_expected).enumerate() {
            ensure!(
                fuel_conserved(*actual, *expected),
                DemandError::internal(format!(
                    "Hourly fuel of fueltype {idx} sums to {actual}, but yearly fuel is {expected}"
                ))
            );
        }

        Ok(())
    }
}

/// A flat, append-only store of results
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResultStore {
    results: IndexMap<ResultKey, EnduseResult>,
}

impl ResultStore {
    /// Add a result. Each key may only be added once.
    pub fn insert(&mut self, key: ResultKey, result: EnduseResult) -> Result<()> {
        ensure!(
            !self.results.contains_key(&key),
            DemandError::internal(format!(
                "Result for region {}, year {}, sector {}, enduse {} already stored",
                key.region, key.year, key.sector, key.enduse
            ))
        );
        self.results.insert(key, result);

        Ok(())
    }

    /// Add all results from another store
    pub fn extend(&mut self, other: ResultStore) -> Result<()> {
        for (key, result) in other.results {
            self.insert(key, result)?;
        }

        Ok(())
    }

    /// Get a result
    pub fn get(&self, key: &ResultKey) -> Option<&EnduseResult> {
        self.results.get(key)
    }

    /// Iterate over all results
    pub fn iter(&self) -> impl Iterator<Item = (&ResultKey, &EnduseResult)> {
        self.results.iter()
    }

    /// Iterate over the results for a year
    pub fn iter_year(&self, year: u32) -> impl Iterator<Item = (&ResultKey, &EnduseResult)> {
        self.results.iter().filter(move |(key, _)| key.year == year)
    }

    /// Hourly fuel of a region in a year, summed over sectors and enduses
    pub fn region_fuel_yh(
        &self,
        region: &RegionID,
        year: u32,
        num_fueltypes: usize,
    ) -> Array3<f64> {
        self.iter_year(year)
            .filter(|(key, _)| key.region == *region)
            .fold(
                Array3::zeros((num_fueltypes, DAYS_IN_YEAR, HOURS_IN_DAY)),
                |acc, (_, result)| acc + &result.fuel_yh,
            )
    }

    /// Yearly fuel over all regions, sectors and enduses in a year, by fueltype
    pub fn national_fuel_y(&self, year: u32, num_fueltypes: usize) -> Array1<f64> {
        self.iter_year(year)
            .fold(Array1::zeros(num_fueltypes), |acc, (_, result)| {
                acc + &result.fuel_y_expected
            })
    }

    /// Check that the hourly fuel of every region adds up to the national yearly fuel
    pub fn check_national_fuel(&self, year: u32, fueltypes: &FuelTypeLookup) -> Result<()> {
        let national = self.national_fuel_y(year, fueltypes.len());
        let regions = self.iter_year(year).map(|(key, _)| &key.region).unique();
        let hourly_total = regions
            .map(|region| {
                self.region_fuel_yh(region, year, fueltypes.len())
                    .sum_axis(Axis(2))
                    .sum_axis(Axis(1))
            })
            .fold(fueltypes.zeros(), |acc, fuel| acc + fuel);

        for (fueltype, name) in fueltypes.iter() {
            let expected = national[fueltype.index()];
            let actual = hourly_total[fueltype.index()];
            ensure!(
                fuel_conserved(actual, expected),
                DemandError::internal(format!(
                    "Hourly fuel of fueltype {name} in {year} sums to {actual}, but national fuel \
                     is {expected}"
                ))
            );
        }

        Ok(())
    }

    /// The number of results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether there are no results
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
