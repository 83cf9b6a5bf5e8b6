//! Defines the [`Assumptions`] struct, which represents the contents of `model.toml`.
//!
//! The assumptions are read once and are immutable thereafter. Each stage of the model takes only
//! the parts it needs.
use crate::diffusion::{DiffusionMethod, SigmoidShape};
use crate::enduse::{EnduseID, SectorID};
use crate::input::{input_err_msg, is_sorted_and_unique, read_toml};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const MODEL_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_heat_pump_slope, f64, -0.08);
define_param_default!(default_crit_missing_values, usize, 100);
define_param_default!(default_heating_base_temp, f64, 15.5);
define_param_default!(default_cooling_base_temp, f64, 21.0);

/// Base temperatures for calculating degree days in one sector (°C)
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
pub struct BaseTemperatures {
    /// Heating base temperature in the base year
    #[serde(default = "default_heating_base_temp")]
    pub heating_by: f64,
    /// Heating base temperature in the end year
    #[serde(default = "default_heating_base_temp")]
    pub heating_ey: f64,
    /// Cooling base temperature in the base year
    #[serde(default = "default_cooling_base_temp")]
    pub cooling_by: f64,
    /// Cooling base temperature in the end year
    #[serde(default = "default_cooling_base_temp")]
    pub cooling_ey: f64,
}

impl Default for BaseTemperatures {
    fn default() -> Self {
        Self {
            heating_by: default_heating_base_temp(),
            heating_ey: default_heating_base_temp(),
            cooling_by: default_cooling_base_temp(),
            cooling_ey: default_cooling_base_temp(),
        }
    }
}

/// A monthly temperature offset phased in linearly from the base year
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ClimateChange {
    /// Temperature change for each month once fully realised (°C)
    pub monthly_delta: [f64; 12],
    /// The year in which the full change is reached
    pub yr_until_changed: u32,
}

/// Penetration and savings of smart meters
#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct SmartMeterAssumptions {
    /// Penetration in the base year
    #[serde(default)]
    pub p_by: f64,
    /// Penetration in the end year
    #[serde(default)]
    pub p_ey: f64,
    /// Fraction of an enduse's demand saved at full penetration, by enduse
    #[serde(default)]
    pub savings: IndexMap<String, f64>,
}

/// Change in overall efficiency of enduses, independent of technologies
#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct EfficiencyDrift {
    /// How the change is phased in
    #[serde(default)]
    pub method: DiffusionMethod,
    /// The end-year demand multiplier for each enduse (1 = no change)
    #[serde(default)]
    pub targets: IndexMap<String, f64>,
}

/// Represents the contents of the model file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Assumptions {
    /// The base year, for which fuel data is provided
    pub base_yr: u32,
    /// The end year of the scenario
    pub end_yr: u32,
    /// The years to simulate, in increasing order, starting with the base year
    pub simulated_yrs: Vec<u32>,
    /// Base temperatures for each sector
    #[serde(default)]
    pub t_base: IndexMap<String, BaseTemperatures>,
    /// Shape of the sigmoid used for generic diffusion between base and end year
    #[serde(default)]
    pub diffusion: SigmoidShape,
    /// Optional climate change scenario
    #[serde(default)]
    pub climate_change: Option<ClimateChange>,
    /// Smart meter assumptions
    #[serde(default)]
    pub smart_meter: SmartMeterAssumptions,
    /// Enduse efficiency drift
    #[serde(default)]
    pub efficiency_drift: EfficiencyDrift,
    /// Price elasticity of demand for each enduse
    #[serde(default, rename = "elasticity")]
    pub elasticities: IndexMap<String, f64>,
    /// Change of heat pump efficiency per degree of temperature difference
    #[serde(default = "default_heat_pump_slope")]
    pub heat_pump_slope: f64,
    /// Maximum number of missing hourly values for a weather station to be usable
    #[serde(default = "default_crit_missing_values")]
    pub crit_missing_values: usize,
}

/// Check that the `simulated_yrs` parameter is valid
fn check_simulated_years(years: &[u32], base_yr: u32, end_yr: u32) -> Result<()> {
    ensure!(!years.is_empty(), "`simulated_yrs` is empty");
    ensure!(
        is_sorted_and_unique(years),
        "`simulated_yrs` must be composed of unique values in order"
    );
    ensure!(
        years[0] == base_yr,
        "The first simulated year must be the base year ({base_yr})"
    );
    ensure!(
        years.iter().all(|year| *year <= end_yr),
        "Simulated years cannot be after the end year ({end_yr})"
    );

    Ok(())
}

/// Check that a value is a proportion
fn check_proportion(value: f64, name: &str) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&value),
        "{name} must be between 0 and 1"
    );

    Ok(())
}

impl Assumptions {
    /// Create assumptions with default values, simulating only the base year
    pub fn new(base_yr: u32, end_yr: u32) -> Self {
        Self {
            base_yr,
            end_yr,
            simulated_yrs: vec![base_yr],
            t_base: IndexMap::new(),
            diffusion: SigmoidShape::default(),
            climate_change: None,
            smart_meter: SmartMeterAssumptions::default(),
            efficiency_drift: EfficiencyDrift::default(),
            elasticities: IndexMap::new(),
            heat_pump_slope: default_heat_pump_slope(),
            crit_missing_values: default_crit_missing_values(),
        }
    }

    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as an [`Assumptions`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Assumptions> {
        let file_path = model_dir.as_ref().join(MODEL_FILE_NAME);
        let assumptions: Assumptions = read_toml(&file_path)?;

        assumptions
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(assumptions)
    }

    /// Validate parameters after reading in file
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.base_yr < self.end_yr,
            "base_yr must be before end_yr"
        );
        check_simulated_years(&self.simulated_yrs, self.base_yr, self.end_yr)?;

        check_proportion(self.smart_meter.p_by, "smart_meter.p_by")?;
        check_proportion(self.smart_meter.p_ey, "smart_meter.p_ey")?;
        for (enduse, savings) in &self.smart_meter.savings {
            check_proportion(*savings, &format!("Smart meter savings for {enduse}"))?;
        }

        for (enduse, target) in &self.efficiency_drift.targets {
            ensure!(
                target.is_finite() && *target >= 0.0,
                "Efficiency drift target for {enduse} must be a non-negative number"
            );
        }

        for (enduse, elasticity) in &self.elasticities {
            ensure!(
                elasticity.is_finite(),
                "Price elasticity for {enduse} must be finite"
            );
        }

        if let Some(climate_change) = &self.climate_change {
            ensure!(
                climate_change.yr_until_changed > self.base_yr,
                "climate_change.yr_until_changed must be after the base year"
            );
            ensure!(
                climate_change.monthly_delta.iter().all(|d| d.is_finite()),
                "climate_change.monthly_delta must be finite"
            );
        }

        ensure!(
            self.heat_pump_slope.is_finite(),
            "heat_pump_slope must be finite"
        );

        Ok(())
    }

    /// Iterate over the years to simulate
    pub fn iter_years(&self) -> impl Iterator<Item = u32> + '_ {
        self.simulated_yrs.iter().copied()
    }

    /// Base temperatures for the given sector, falling back to default values
    pub fn base_temperatures(&self, sector: &SectorID) -> BaseTemperatures {
        self.t_base
            .get(&*sector.0)
            .copied()
            .unwrap_or_default()
    }

    /// Fraction of demand saved by smart meters at full penetration, if any
    pub fn smart_meter_savings(&self, enduse: &EnduseID) -> Option<f64> {
        self.smart_meter.savings.get(&*enduse.0).copied()
    }

    /// End-year efficiency drift multiplier for the given enduse, if any
    pub fn efficiency_target(&self, enduse: &EnduseID) -> Option<f64> {
        self.efficiency_drift.targets.get(&*enduse.0).copied()
    }

    /// Price elasticity for the given enduse, if any
    pub fn elasticity(&self, enduse: &EnduseID) -> Option<f64> {
        self.elasticities.get(&*enduse.0).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[rstest]
    #[case(&[2015], true)]
    #[case(&[2015, 2020, 2050], true)]
    #[case(&[], false)]
    #[case(&[2020], false)] // doesn't start with base year
    #[case(&[2015, 2015], false)]
    #[case(&[2015, 2060], false)] // after end year
    fn test_check_simulated_years(#[case] years: &[u32], #[case] valid: bool) {
        assert_eq!(check_simulated_years(years, 2015, 2050).is_ok(), valid);
    }

    #[test]
    fn test_assumptions_from_path() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_FILE_NAME)).unwrap();
            writeln!(
                file,
                "base_yr = 2015
end_yr = 2050
simulated_yrs = [2015, 2030]

[t_base.residential]
heating_by = 15.5
heating_ey = 14.5

[smart_meter]
p_by = 0.1
p_ey = 0.9
savings = {{ rs_cooking = 0.03 }}

[efficiency_drift]
method = \"linear\"
targets = {{ rs_lighting = 0.8 }}"
            )
            .unwrap();
        }

        let assumptions = Assumptions::from_path(dir.path()).unwrap();
        assert_eq!(assumptions.simulated_yrs, [2015, 2030]);
        assert_eq!(
            assumptions.base_temperatures(&"residential".into()).heating_ey,
            14.5
        );
        assert_eq!(
            assumptions.base_temperatures(&"service".into()),
            BaseTemperatures::default()
        );
        assert_eq!(
            assumptions.smart_meter_savings(&"rs_cooking".into()),
            Some(0.03)
        );
        assert_eq!(
            assumptions.efficiency_drift.method,
            DiffusionMethod::Linear
        );
        assert_eq!(
            assumptions.efficiency_target(&"rs_lighting".into()),
            Some(0.8)
        );
        assert_eq!(assumptions.heat_pump_slope, -0.08);
    }

    #[test]
    fn test_validate_smart_meter() {
        let mut assumptions = Assumptions::new(2015, 2050);
        assumptions.smart_meter.p_ey = 1.5;
        assert_error!(assumptions.validate(), "smart_meter.p_ey must be between 0 and 1");
    }

    #[test]
    fn test_validate_climate_change() {
        let mut assumptions = Assumptions::new(2015, 2050);
        assumptions.climate_change = Some(ClimateChange {
            monthly_delta: [1.0; 12],
            yr_until_changed: 2015,
        });
        assert!(assumptions.validate().is_err());
    }
}
