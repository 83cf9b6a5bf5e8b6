//! Scenario data which scales demand over time: named drivers and fuel prices.
use crate::diffusion::safe_div;
use crate::error::DemandError;
use crate::fueltype::FuelType;
use crate::region::RegionID;
use anyhow::{Result, ensure};
use ndarray::Array1;
use std::collections::HashMap;

/// Named per-(region, year) scenario values (e.g. population, floor area, GVA)
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScenarioDrivers {
    values: HashMap<(RegionID, u32, String), f64>,
}

impl ScenarioDrivers {
    /// Add a value. Each (region, year, driver) may only be given once.
    pub fn insert(&mut self, region: RegionID, year: u32, driver: &str, value: f64) -> Result<()> {
        ensure!(
            value.is_finite() && value >= 0.0,
            DemandError::configuration(format!(
                "Scenario driver {driver} for region {region}, year {year} must be a \
                 non-negative number"
            ))
        );
        let key = (region, year, driver.to_string());
        ensure!(
            !self.values.contains_key(&key),
            DemandError::configuration(format!(
                "Duplicate scenario driver {driver} for region {}, year {year}",
                key.0
            ))
        );
        self.values.insert(key, value);

        Ok(())
    }

    /// Get one value
    pub fn get(&self, region: &RegionID, year: u32, driver: &str) -> Option<f64> {
        self.values
            .get(&(region.clone(), year, driver.to_string()))
            .copied()
    }

    /// The product of the given drivers' values
    fn product(&self, region: &RegionID, year: u32, drivers: &[String]) -> Result<f64> {
        drivers.iter().try_fold(1.0, |acc, driver| -> Result<f64> {
            let value = self.get(region, year, driver).ok_or_else(|| {
                DemandError::configuration(format!(
                    "No value for scenario driver {driver} in region {region}, year {year}"
                ))
            })?;
            Ok(acc * value)
        })
    }

    /// Ratio of the combined driver value in the current year to that in the base year.
    ///
    /// An enduse without drivers is not scaled (ratio of one).
    pub fn driver_ratio(
        &self,
        region: &RegionID,
        drivers: &[String],
        base_yr: u32,
        curr_yr: u32,
    ) -> Result<f64> {
        if drivers.is_empty() || curr_yr == base_yr {
            return Ok(1.0);
        }

        let driver_by = self.product(region, base_yr, drivers)?;
        let driver_cy = self.product(region, curr_yr, drivers)?;
        Ok(safe_div(driver_cy, driver_by))
    }

    /// Whether there are no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fuel prices per (fueltype, year)
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FuelPrices {
    prices: HashMap<(FuelType, u32), f64>,
}

impl FuelPrices {
    /// Add a price. Each (fueltype, year) may only be given once.
    pub fn insert(&mut self, fueltype: FuelType, year: u32, price: f64) -> Result<()> {
        ensure!(
            price.is_finite() && price >= 0.0,
            DemandError::configuration(format!(
                "Price of fueltype {fueltype} in year {year} must be a non-negative number"
            ))
        );
        ensure!(
            self.prices.insert((fueltype, year), price).is_none(),
            DemandError::configuration(format!(
                "Duplicate price for fueltype {fueltype} in year {year}"
            ))
        );

        Ok(())
    }

    /// Prices in the base year and in the current year, by fueltype.
    ///
    /// Where no current-year price is given, the base-year price is used. Fueltypes without a
    /// base-year price have a price of zero in both years, so their demand does not respond to
    /// price.
    pub fn prices(
        &self,
        base_yr: u32,
        curr_yr: u32,
        num_fueltypes: usize,
    ) -> (Array1<f64>, Array1<f64>) {
        let price_by = Array1::from_shape_fn(num_fueltypes, |idx| {
            self.prices
                .get(&(FuelType(idx), base_yr))
                .copied()
                .unwrap_or(0.0)
        });
        let price_cy = Array1::from_shape_fn(num_fueltypes, |idx| {
            self.prices
                .get(&(FuelType(idx), curr_yr))
                .copied()
                .unwrap_or(price_by[idx])
        });

        (price_by, price_cy)
    }

    /// Whether there are no prices
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
