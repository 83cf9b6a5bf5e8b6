//! Heating and cooling degree days and the daily service shapes derived from them.
use crate::assumptions::BaseTemperatures;
use crate::diffusion::{SigmoidShape, interpolate, safe_div, sigmoid_diffusion};
use crate::enduse::EnduseKind;
use crate::weather::{RegionWeather, TemperatureGrid};
use ndarray::{Array1, Axis};

/// Heating degree days for each day: the daily mean of `max(0, t_base - T)`
pub fn hdd_by_day(temperatures: &TemperatureGrid, t_base: f64) -> Array1<f64> {
    temperatures
        .map(|t| (t_base - t).max(0.0))
        .mean_axis(Axis(1))
        .unwrap_or_default()
}

/// Cooling degree days for each day: the daily mean of `max(0, T - t_base)`
pub fn cdd_by_day(temperatures: &TemperatureGrid, t_base: f64) -> Array1<f64> {
    temperatures
        .map(|t| (t - t_base).max(0.0))
        .mean_axis(Axis(1))
        .unwrap_or_default()
}

/// The base temperature for the current year, diffused along a sigmoid from its base-year to its
/// end-year value
pub fn t_base_cy(
    t_base_by: f64,
    t_base_ey: f64,
    base_yr: u32,
    curr_yr: u32,
    end_yr: u32,
    shape: &SigmoidShape,
) -> f64 {
    let fraction = sigmoid_diffusion(base_yr, curr_yr, end_yr, shape);
    interpolate(t_base_by, t_base_ey, fraction)
}

/// Normalise degree days into a daily shape which sums to one (or is all zero)
pub fn yd_shape(degree_days: &Array1<f64>) -> Array1<f64> {
    let total = degree_days.sum();
    degree_days.map(|dd| safe_div(*dd, total))
}

/// Ratio of current-year to base-year degree days (zero if there are no base-year degree days)
pub fn climate_correction_factor(dd_cy: &Array1<f64>, dd_by: &Array1<f64>) -> f64 {
    safe_div(dd_cy.sum(), dd_by.sum())
}

/// Share of yearly degree days falling on the day with the most degree days
pub fn peak_yd_factor(degree_days: &Array1<f64>) -> f64 {
    let max = degree_days.iter().copied().fold(0.0, f64::max);
    safe_div(max, degree_days.sum())
}

/// Index of the day with the largest value. Ties go to the earliest day.
pub fn peak_day(values: &Array1<f64>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_value), (day, value)| {
            if *value > best_value {
                (day, *value)
            } else {
                (best, best_value)
            }
        })
        .0
}

/// Degree days for one (region, sector) in the base and current years
#[derive(Debug, Clone, PartialEq)]
pub struct DegreeDays {
    /// Base-year HDD
    pub hdd_by: Array1<f64>,
    /// Current-year HDD
    pub hdd_cy: Array1<f64>,
    /// Base-year CDD
    pub cdd_by: Array1<f64>,
    /// Current-year CDD
    pub cdd_cy: Array1<f64>,
    /// Heating base temperature used for the base year
    pub t_base_heating_by: f64,
    /// Heating base temperature used for the current year
    pub t_base_heating_cy: f64,
}

impl DegreeDays {
    /// Calculate degree days for a region's weather.
    ///
    /// Base-year degree days use the base-year base temperatures; current-year degree days use
    /// base temperatures diffused towards their end-year values.
    pub fn new(
        weather: &RegionWeather,
        t_base: &BaseTemperatures,
        base_yr: u32,
        curr_yr: u32,
        end_yr: u32,
        shape: &SigmoidShape,
    ) -> Self {
        let t_heating_cy = t_base_cy(
            t_base.heating_by,
            t_base.heating_ey,
            base_yr,
            curr_yr,
            end_yr,
            shape,
        );
        let t_cooling_cy = t_base_cy(
            t_base.cooling_by,
            t_base.cooling_ey,
            base_yr,
            curr_yr,
            end_yr,
            shape,
        );

        Self {
            hdd_by: hdd_by_day(&weather.temp_by, t_base.heating_by),
            hdd_cy: hdd_by_day(&weather.temp_cy, t_heating_cy),
            cdd_by: cdd_by_day(&weather.temp_by, t_base.cooling_by),
            cdd_cy: cdd_by_day(&weather.temp_cy, t_cooling_cy),
            t_base_heating_by: t_base.heating_by,
            t_base_heating_cy: t_heating_cy,
        }
    }

    /// Current-year degree days relevant to an enduse kind, if it is temperature driven
    pub fn for_kind(&self, kind: EnduseKind) -> Option<&Array1<f64>> {
        match kind {
            EnduseKind::SpaceHeating => Some(&self.hdd_cy),
            EnduseKind::Cooling => Some(&self.cdd_cy),
            EnduseKind::Other => None,
        }
    }

    /// Heating climate correction factor (`f_heat_y`)
    pub fn f_heat_y(&self) -> f64 {
        climate_correction_factor(&self.hdd_cy, &self.hdd_by)
    }

    /// Cooling climate correction factor (`f_cool_y`)
    pub fn f_cool_y(&self) -> f64 {
        climate_correction_factor(&self.cdd_cy, &self.cdd_by)
    }

    /// The climate correction factor for an enduse kind (1 for enduses independent of weather)
    pub fn correction_factor(&self, kind: EnduseKind) -> f64 {
        match kind {
            EnduseKind::SpaceHeating => self.f_heat_y(),
            EnduseKind::Cooling => self.f_cool_y(),
            EnduseKind::Other => 1.0,
        }
    }
}
