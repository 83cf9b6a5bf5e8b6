//! Technologies convert fuel into service (e.g. heat) with a given efficiency.
//!
//! A technology's nominal efficiency changes between the base year and `year_eff_ey`. How the
//! efficiency varies within a year depends on the technology's class:
//!
//! * Constant technologies have the same efficiency in every hour.
//! * Heat pumps have an efficiency which falls linearly as the outside temperature drops below the
//!   heating base temperature.
//! * Hybrid technologies use one of two other technologies in each hour, depending on whether the
//!   temperature is below a cut-off.
use crate::calendar::{DAYS_IN_YEAR, HOURS_IN_DAY};
use crate::diffusion::{DiffusionMethod, SigmoidShape, diffusion_fraction, interpolate};
use crate::fueltype::FuelType;
use crate::id::{define_id_getter, define_id_type};
use crate::weather::TemperatureGrid;
use indexmap::IndexMap;
use ndarray::Array2;
use serde_string_enum::DeserializeLabeledStringEnum;

pub mod stock;

define_id_type! {TechnologyID}

/// A map of [`Technology`]s, keyed by technology ID
pub type TechnologyMap = IndexMap<TechnologyID, Technology>;

/// An efficiency for every hour of the year, shape (365, 24)
pub type EffGrid = Array2<f64>;

/// The temperature difference at which a heat pump's efficiency equals its nominal efficiency (K)
pub const HEAT_PUMP_REFERENCE_DELTA: f64 = 10.0;

/// The lowest efficiency a temperature-dependent technology can have
pub const MIN_EFFICIENCY: f64 = 0.001;

/// The technology name used for profiles of enduses without technologies
pub const PLACEHOLDER_TECHNOLOGY: &str = "placeholder";

/// How a technology's efficiency depends on the weather
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TechnologyType {
    /// The efficiency is the same in every hour
    #[default]
    #[string = "constant"]
    Constant,
    /// The efficiency depends on the difference between the base temperature and the outside
    /// temperature
    #[string = "heat_pump"]
    HeatPump,
}

/// A technology which switches between two other technologies depending on the temperature
#[derive(Debug, Clone, PartialEq)]
pub struct HybridTechnology {
    /// The technology used when the temperature is below the cut-off
    pub tech_low: TechnologyID,
    /// The technology used otherwise
    pub tech_high: TechnologyID,
    /// The cut-off temperature (°C)
    pub cutoff_temp: f64,
}

/// Whether a technology uses a single fueltype or is a hybrid
#[derive(Debug, Clone, PartialEq)]
pub enum TechnologyKind {
    /// A technology using one fueltype
    Single {
        /// The fueltype used
        fueltype: FuelType,
        /// How the efficiency depends on the weather
        tech_type: TechnologyType,
    },
    /// A hybrid of two single-fueltype technologies
    Hybrid(HybridTechnology),
}

/// A technology which converts fuel into service
#[derive(Debug, Clone, PartialEq)]
pub struct Technology {
    /// Unique identifier (e.g. "boiler_gas")
    pub id: TechnologyID,
    /// Single fueltype or hybrid
    pub kind: TechnologyKind,
    /// Nominal efficiency in the base year
    pub eff_by: f64,
    /// Nominal efficiency reached in `year_eff_ey`
    pub eff_ey: f64,
    /// The year in which `eff_ey` is reached
    pub year_eff_ey: u32,
    /// Fraction of the efficiency improvement which is realised
    pub eff_achieved: f64,
    /// How the efficiency moves from `eff_by` to `eff_ey`
    pub diff_method: DiffusionMethod,
    /// First year the technology is available
    pub market_entry: u32,
}
define_id_getter! {Technology, TechnologyID}

impl Technology {
    /// The technology's fueltype, unless it is a hybrid
    pub fn fueltype(&self) -> Option<FuelType> {
        match &self.kind {
            TechnologyKind::Single { fueltype, .. } => Some(*fueltype),
            TechnologyKind::Hybrid(_) => None,
        }
    }

    /// Nominal efficiency in `curr_yr`.
    ///
    /// Only the `eff_achieved` fraction of the change from `eff_by` is realised.
    pub fn nominal_efficiency(&self, base_yr: u32, curr_yr: u32, shape: &SigmoidShape) -> f64 {
        let fraction = diffusion_fraction(
            self.diff_method,
            base_yr,
            curr_yr,
            self.year_eff_ey,
            shape,
        );
        interpolate(self.eff_by, self.eff_ey, fraction * self.eff_achieved)
    }
}

/// Create an [`EffGrid`] with the same efficiency in every hour
pub fn constant_eff_grid(efficiency: f64) -> EffGrid {
    Array2::from_elem((DAYS_IN_YEAR, HOURS_IN_DAY), efficiency)
}

/// Hourly efficiency of a heat pump.
///
/// The efficiency is `slope * delta + intercept`, where `delta = max(0, t_base - T)`. The
/// intercept is chosen so that the efficiency equals `nominal` when `delta` is
/// [`HEAT_PUMP_REFERENCE_DELTA`].
pub fn heat_pump_efficiency(
    nominal: f64,
    temperatures: &TemperatureGrid,
    t_base: f64,
    slope: f64,
) -> EffGrid {
    let intercept = nominal - slope * HEAT_PUMP_REFERENCE_DELTA;
    temperatures.map(|t| {
        let delta = (t_base - t).max(0.0);
        (slope * delta + intercept).max(MIN_EFFICIENCY)
    })
}
