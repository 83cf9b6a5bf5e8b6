//! The technologies of one region, with their efficiencies for the current simulation year.
use super::{
    EffGrid, Technology, TechnologyID, TechnologyKind, TechnologyMap, TechnologyType,
    constant_eff_grid, heat_pump_efficiency,
};
use crate::calendar::{DAYS_IN_YEAR, HOURS_IN_DAY};
use crate::diffusion::SigmoidShape;
use crate::error::DemandError;
use crate::fueltype::FuelType;
use crate::weather::TemperatureGrid;
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use ndarray::{Array3, Axis, Zip};

/// Everything about a region and year which affects technology efficiencies
#[derive(Debug, Clone, Copy)]
pub struct StockConditions<'a> {
    /// Base-year temperatures
    pub temp_by: &'a TemperatureGrid,
    /// Current-year temperatures
    pub temp_cy: &'a TemperatureGrid,
    /// Heating base temperature in the base year
    pub t_base_by: f64,
    /// Heating base temperature in the current year
    pub t_base_cy: f64,
    /// The base year
    pub base_yr: u32,
    /// The current year
    pub curr_yr: u32,
    /// Shape of sigmoid efficiency diffusion
    pub diffusion: &'a SigmoidShape,
    /// Heat pump efficiency slope
    pub heat_pump_slope: f64,
    /// The number of fueltypes
    pub num_fueltypes: usize,
}

/// A technology bound to a region and year
#[derive(Debug, Clone, PartialEq)]
pub struct TechnologyInstance {
    /// The technology's ID
    pub id: TechnologyID,
    /// Base-year efficiency in every hour
    pub eff_by: EffGrid,
    /// Current-year efficiency in every hour
    pub eff_cy: EffGrid,
    /// Share of the technology's fuel of each fueltype in every hour, shape (F, 365, 24).
    ///
    /// The shares sum to one over fueltypes in every hour.
    pub fuel_type_share_yh: Array3<f64>,
}

/// Which year's efficiency to calculate
#[derive(Debug, Clone, Copy, PartialEq)]
enum Period {
    Base,
    Current,
}

impl StockConditions<'_> {
    fn year(&self, period: Period) -> u32 {
        match period {
            Period::Base => self.base_yr,
            Period::Current => self.curr_yr,
        }
    }

    fn temperatures(&self, period: Period) -> &TemperatureGrid {
        match period {
            Period::Base => self.temp_by,
            Period::Current => self.temp_cy,
        }
    }

    fn t_base(&self, period: Period) -> f64 {
        match period {
            Period::Base => self.t_base_by,
            Period::Current => self.t_base_cy,
        }
    }
}

/// Hourly efficiency of a single-fueltype technology
fn single_efficiency(
    technology: &Technology,
    tech_type: TechnologyType,
    conditions: &StockConditions,
    period: Period,
) -> EffGrid {
    let nominal = technology.nominal_efficiency(
        conditions.base_yr,
        conditions.year(period),
        conditions.diffusion,
    );

    match tech_type {
        TechnologyType::Constant => constant_eff_grid(nominal),
        TechnologyType::HeatPump => heat_pump_efficiency(
            nominal,
            conditions.temperatures(period),
            conditions.t_base(period),
            conditions.heat_pump_slope,
        ),
    }
}

/// Look up one of the component technologies of a hybrid
fn hybrid_component<'a>(
    technologies: &'a TechnologyMap,
    hybrid: &TechnologyID,
    id: &TechnologyID,
) -> Result<(&'a Technology, FuelType, TechnologyType)> {
    let Some(technology) = technologies.get(id) else {
        bail!(DemandError::configuration(format!(
            "Hybrid technology {hybrid} references unknown technology {id}"
        )));
    };
    match technology.kind {
        TechnologyKind::Single {
            fueltype,
            tech_type,
        } => Ok((technology, fueltype, tech_type)),
        TechnologyKind::Hybrid(_) => bail!(DemandError::configuration(format!(
            "Hybrid technology {hybrid} cannot be composed of another hybrid ({id})"
        ))),
    }
}

/// Create the [`TechnologyInstance`] for a technology
fn build_instance(
    technologies: &TechnologyMap,
    technology: &Technology,
    conditions: &StockConditions,
) -> Result<TechnologyInstance> {
    let mut fuel_type_share_yh =
        Array3::zeros((conditions.num_fueltypes, DAYS_IN_YEAR, HOURS_IN_DAY));

    let (eff_by, eff_cy) = match &technology.kind {
        TechnologyKind::Single {
            fueltype,
            tech_type,
        } => {
            fuel_type_share_yh
                .index_axis_mut(Axis(0), fueltype.index())
                .fill(1.0);
            (
                single_efficiency(technology, *tech_type, conditions, Period::Base),
                single_efficiency(technology, *tech_type, conditions, Period::Current),
            )
        }
        TechnologyKind::Hybrid(hybrid) => {
            let (low, low_fueltype, low_type) =
                hybrid_component(technologies, &technology.id, &hybrid.tech_low)?;
            let (high, high_fueltype, high_type) =
                hybrid_component(technologies, &technology.id, &hybrid.tech_high)?;

            let [eff_by, eff_cy] = [Period::Base, Period::Current].map(|period| {
                let mut eff = single_efficiency(low, low_type, conditions, period);
                let eff_high = single_efficiency(high, high_type, conditions, period);
                Zip::from(&mut eff)
                    .and(conditions.temperatures(period))
                    .and(&eff_high)
                    .for_each(|eff, &temp, &eff_high| {
                        if temp >= hybrid.cutoff_temp {
                            *eff = eff_high;
                        }
                    });
                eff
            });

            for ((day, hour), temp) in conditions.temp_cy.indexed_iter() {
                let fueltype = if *temp < hybrid.cutoff_temp {
                    low_fueltype
                } else {
                    high_fueltype
                };
                fuel_type_share_yh[[fueltype.index(), day, hour]] = 1.0;
            }

            (eff_by, eff_cy)
        }
    };

    Ok(TechnologyInstance {
        id: technology.id.clone(),
        eff_by,
        eff_cy,
        fuel_type_share_yh,
    })
}

/// The technologies of a region for the current year
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TechnologyStock {
    instances: IndexMap<TechnologyID, TechnologyInstance>,
}

impl TechnologyStock {
    /// Build instances for the given technologies.
    ///
    /// # Arguments
    ///
    /// * `technologies` - All technologies in the model
    /// * `ids` - The technologies used in the region
    /// * `conditions` - The region's weather and the simulation year
    pub fn build<'a, I>(
        technologies: &TechnologyMap,
        ids: I,
        conditions: &StockConditions,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = &'a TechnologyID>,
    {
        let mut instances = IndexMap::new();
        for id in ids {
            if instances.contains_key(id) {
                continue;
            }

            let Some(technology) = technologies.get(id) else {
                bail!(DemandError::configuration(format!(
                    "Unknown technology: {id}"
                )));
            };
            let instance = build_instance(technologies, technology, conditions)
                .with_context(|| format!("Could not build technology {id}"))?;
            instances.insert(id.clone(), instance);
        }

        Ok(Self { instances })
    }

    /// Get the instance for a technology
    pub fn get(&self, id: &TechnologyID) -> Result<&TechnologyInstance> {
        match self.instances.get(id) {
            Some(instance) => Ok(instance),
            None => bail!(DemandError::internal(format!(
                "Technology {id} is not in the stock"
            ))),
        }
    }

    /// Iterate over the instances
    pub fn iter(&self) -> impl Iterator<Item = &TechnologyInstance> {
        self.instances.values()
    }

    /// The number of technologies in the stock
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the stock is empty
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
