//! Fitting of sigmoid diffusion curves to switch targets.
//!
//! For each technology whose service share grows because of a switch, a logistic curve
//! `y(x) = L / (1 + exp(-k * ((x - 2000) - x0)))` is fitted through its base-year share and its
//! target share in the switch year. The curves are fitted once, to national service, and then used
//! for every region and year.
use crate::diffusion::safe_div;
use crate::enduse::EnduseID;
use crate::error::DemandError;
use crate::switch::{EnduseSwitches, ServiceByFueltype, SwitchTable, service_by_technology};
use crate::technology::{TechnologyID, TechnologyMap};
use anyhow::{Context, Result, bail};
use argmin::core::{CostFunction, Executor, State};
use argmin::solver::neldermead::NelderMead;
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Starting values tried for both the midpoint and the steepness
pub const FIT_START_VALUES: [f64; 8] = [0.001, 0.01, 0.1, 1.0, 10.0, 50.0, 100.0, 200.0];

/// Shares of zero are replaced by this value, as are shares within this distance of `L`
pub const MIN_SHARE: f64 = 0.001;

/// Maximum difference between the fitted curve and each fit point
pub const FIT_TOLERANCE: f64 = 0.02;

/// Fitted parameters must lie strictly between zero and this value
const PARAM_BOUND: f64 = 200.0;

/// Years are measured from this year on the curve's x axis
const YEAR_OFFSET: f64 = 2000.0;

/// Convergence tolerance for the standard deviation of costs in the Nelder-Mead simplex
const SD_TOLERANCE: f64 = 1e-20;

/// Maximum number of Nelder-Mead iterations per starting point
const MAX_ITERS: u64 = 5000;

/// Parameters of a logistic diffusion curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidParams {
    /// Saturation level
    pub l: f64,
    /// Midpoint, in years after 2000
    pub midpoint: f64,
    /// Steepness
    pub steepness: f64,
}

impl SigmoidParams {
    /// Evaluate the curve for a year
    pub fn evaluate(&self, year: f64) -> f64 {
        self.l / (1.0 + (-self.steepness * ((year - YEAR_OFFSET) - self.midpoint)).exp())
    }
}

/// How a technology's service share develops over time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Diffusion {
    /// Along a fitted sigmoid curve
    Sigmoid(SigmoidParams),
    /// The target share applies from the base year onwards
    Complete {
        /// The target share
        share: f64,
    },
}

impl Diffusion {
    /// The service share in the given year
    pub fn share_at(&self, year: u32) -> f64 {
        match self {
            Diffusion::Sigmoid(params) => params.evaluate(f64::from(year)),
            Diffusion::Complete { share } => *share,
        }
    }
}

/// Fitted diffusions, keyed by (enduse, technology)
pub type DiffusionMap = BTreeMap<(EnduseID, TechnologyID), Diffusion>;

/// Sum of squared differences between a sigmoid and a set of points
struct SigmoidCost {
    points: [(f64, f64); 2],
    l: f64,
}

impl SigmoidCost {
    fn params(&self, param: &[f64]) -> SigmoidParams {
        SigmoidParams {
            l: self.l,
            midpoint: param[0],
            steepness: param[1],
        }
    }
}

impl CostFunction for SigmoidCost {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let params = self.params(param);
        Ok(self
            .points
            .iter()
            .map(|(x, y)| (params.evaluate(*x) - y).powi(2))
            .sum())
    }
}

/// Build the initial simplex around a starting point by perturbing each parameter by 5%
fn initial_simplex(start: [f64; 2]) -> Vec<Vec<f64>> {
    let step = |value: f64| if value == 0.0 { 0.00025 } else { 0.05 * value };
    vec![
        start.to_vec(),
        vec![start[0] + step(start[0]), start[1]],
        vec![start[0], start[1] + step(start[1])],
    ]
}

/// Whether fitted parameters are acceptable
fn is_acceptable(params: &SigmoidParams, start: [f64; 2], points: &[(f64, f64); 2]) -> bool {
    let in_bounds = |value: f64| value > 0.0 && value < PARAM_BOUND;
    in_bounds(params.midpoint)
        && in_bounds(params.steepness)
        && params.midpoint != start[0]
        && params.steepness != start[1]
        && points
            .iter()
            .all(|(x, y)| (params.evaluate(*x) - y).abs() <= FIT_TOLERANCE)
}

/// Fit the midpoint and steepness from a single starting point
fn fit_from_start(
    points: [(f64, f64); 2],
    l: f64,
    start: [f64; 2],
) -> Result<Option<SigmoidParams>> {
    let cost = SigmoidCost { points, l };
    let solver = NelderMead::new(initial_simplex(start)).with_sd_tolerance(SD_TOLERANCE)?;
    let result = Executor::new(cost, solver)
        .configure(|state| state.max_iters(MAX_ITERS))
        .run()?;

    let Some(best) = result.state().get_best_param() else {
        return Ok(None);
    };
    let params = SigmoidParams {
        l,
        midpoint: best[0],
        steepness: best[1],
    };

    Ok(is_acceptable(&params, start, &points).then_some(params))
}

/// Fit a sigmoid with saturation level `l` through two points (year, share).
///
/// Each combination of [`FIT_START_VALUES`] is tried as a starting point until an acceptable fit
/// is found. Returns `None` if no starting point gives an acceptable fit.
pub fn fit_sigmoid(points: [(f64, f64); 2], l: f64) -> Result<Option<SigmoidParams>> {
    for midpoint in FIT_START_VALUES {
        for steepness in FIT_START_VALUES {
            if let Some(params) = fit_from_start(points, l, [midpoint, steepness])? {
                return Ok(Some(params));
            }
        }
    }

    Ok(None)
}

/// The shares and years a technology's diffusion must pass through
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusionTarget {
    /// Share of service in the base year
    pub share_by: f64,
    /// Share of service in the switch year
    pub share_target: f64,
    /// The maximum share which can be reached
    pub l: f64,
    /// The base year
    pub base_yr: u32,
    /// The year the technology becomes available
    pub market_entry: u32,
    /// The year in which the target share is reached
    pub switch_yr: u32,
}

/// Fit the diffusion of one technology in one enduse.
///
/// # Returns
///
/// * `None` if the technology's share does not grow
/// * [`Diffusion::Complete`] if the target is reached by the first fit year
/// * [`Diffusion::Sigmoid`] with fitted parameters otherwise
///
/// Fails with [`DemandError::FitFailure`] if no acceptable fit is found.
pub fn fit_technology_diffusion(
    enduse: &EnduseID,
    technology: &TechnologyID,
    target: &DiffusionTarget,
) -> Result<Option<Diffusion>> {
    if target.share_target <= target.share_by {
        return Ok(None);
    }

    let (first_yr, first_share) = if target.market_entry > target.base_yr {
        (target.market_entry, MIN_SHARE)
    } else {
        (target.base_yr, target.share_by.max(MIN_SHARE))
    };
    let end_share = target.share_target.min(target.l - MIN_SHARE);
    if target.switch_yr <= first_yr || end_share <= first_share {
        return Ok(Some(Diffusion::Complete {
            share: target.share_target,
        }));
    }

    let points = [
        (f64::from(first_yr), first_share),
        (f64::from(target.switch_yr), end_share),
    ];
    match fit_sigmoid(points, target.l)? {
        Some(params) => {
            debug!(
                "Fitted diffusion of {technology} in {enduse}: L = {}, midpoint = {}, \
                 steepness = {}",
                params.l, params.midpoint, params.steepness
            );
            Ok(Some(Diffusion::Sigmoid(params)))
        }
        None => bail!(DemandError::FitFailure {
            enduse: enduse.to_string(),
            technology: technology.to_string(),
        }),
    }
}

/// Get the year from which a technology is available
fn market_entry(technologies: &TechnologyMap, technology: &TechnologyID) -> Result<u32> {
    match technologies.get(technology) {
        Some(technology) => Ok(technology.market_entry),
        None => bail!(DemandError::configuration(format!(
            "Switch references unknown technology {technology}"
        ))),
    }
}

/// Fit diffusions for the switches of one enduse
fn fit_enduse(
    enduse: &EnduseID,
    enduse_switches: &EnduseSwitches,
    service_by: &ServiceByFueltype,
    technologies: &TechnologyMap,
    base_yr: u32,
    diffusions: &mut DiffusionMap,
) -> Result<()> {
    let tech_by = service_by_technology(service_by);
    let total: f64 = tech_by.values().sum();
    if total <= 0.0 {
        warn!("Enduse {enduse} has switches but no base-year service; switches are ignored");
        return Ok(());
    }
    let share_of = |technology: &TechnologyID| {
        safe_div(tech_by.get(technology).copied().unwrap_or(0.0), total)
    };

    let mut targets = Vec::new();
    match enduse_switches {
        EnduseSwitches::Service(switches) => {
            for switch in switches {
                targets.push((
                    &switch.technology,
                    DiffusionTarget {
                        share_by: share_of(&switch.technology),
                        share_target: switch.target_share,
                        l: switch.max_share,
                        base_yr,
                        market_entry: market_entry(technologies, &switch.technology)?,
                        switch_yr: switch.switch_yr,
                    },
                ));
            }
        }
        EnduseSwitches::Fuel(_) => {
            let fueltype_share = |switch_fueltype| {
                let service: f64 = service_by
                    .iter()
                    .filter(|((fueltype, _), _)| *fueltype == switch_fueltype)
                    .map(|(_, service)| service)
                    .sum();
                safe_div(service, total)
            };

            for (technology, switches) in enduse_switches.fuel_switches_by_technology() {
                let share_by = share_of(technology);
                let switched: f64 = switches
                    .iter()
                    .map(|s| s.share_switched * fueltype_share(s.fueltype_replaced))
                    .sum();
                let max_switched: f64 = switches
                    .iter()
                    .map(|s| s.max_theoretical_switch * fueltype_share(s.fueltype_replaced))
                    .sum();
                let switch_yr = switches.iter().map(|s| s.switch_yr).max().unwrap_or(base_yr);

                targets.push((
                    technology,
                    DiffusionTarget {
                        share_by,
                        share_target: (share_by + switched).min(1.0),
                        l: (share_by + max_switched).min(1.0),
                        base_yr,
                        market_entry: market_entry(technologies, technology)?,
                        switch_yr,
                    },
                ));
            }
        }
    }

    for (technology, target) in targets {
        if let Some(diffusion) = fit_technology_diffusion(enduse, technology, &target)? {
            diffusions.insert((enduse.clone(), technology.clone()), diffusion);
        } else {
            debug!("No diffusion needed for {technology} in {enduse}: its share does not grow");
        }
    }

    Ok(())
}

/// Fit diffusions for all switches.
///
/// # Arguments
///
/// * `switches` - All declared switches
/// * `service_by` - National base-year service for each enduse
/// * `technologies` - All technologies
/// * `base_yr` - The base year
pub fn fit_switch_diffusions(
    switches: &SwitchTable,
    service_by: &IndexMap<EnduseID, ServiceByFueltype>,
    technologies: &TechnologyMap,
    base_yr: u32,
) -> Result<DiffusionMap> {
    let empty = ServiceByFueltype::new();
    let mut diffusions = DiffusionMap::new();
    for (enduse, enduse_switches) in switches.iter() {
        let service = service_by.get(enduse).unwrap_or(&empty);
        fit_enduse(enduse, enduse_switches, service, technologies, base_yr, &mut diffusions)
            .with_context(|| format!("Could not fit diffusions for enduse {enduse}"))?;
    }

    Ok(diffusions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::demand_error;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn target(share_by: f64, share_target: f64, l: f64, switch_yr: u32) -> DiffusionTarget {
        DiffusionTarget {
            share_by,
            share_target,
            l,
            base_yr: 2015,
            market_entry: 2015,
            switch_yr,
        }
    }

    #[test]
    fn test_evaluate() {
        let params = SigmoidParams {
            l: 0.8,
            midpoint: 25.0,
            steepness: 0.5,
        };
        assert_approx_eq!(f64, params.evaluate(2025.0), 0.4);
        assert!(params.evaluate(2100.0) <= 0.8);
    }

    #[rstest]
    #[case(0.0, 0.5, 0.5, 2035)]
    #[case(0.1, 0.6, 1.0, 2050)]
    #[case(0.3, 0.9, 1.0, 2030)]
    fn test_fit_passes_through_points(
        #[case] share_by: f64,
        #[case] share_target: f64,
        #[case] l: f64,
        #[case] switch_yr: u32,
    ) {
        let target = target(share_by, share_target, l, switch_yr);
        let diffusion =
            fit_technology_diffusion(&"heating".into(), &"heat_pump".into(), &target)
                .unwrap()
                .unwrap();
        let Diffusion::Sigmoid(params) = diffusion else {
            panic!("Expected a sigmoid fit");
        };

        assert!(params.l <= l);
        assert!((params.evaluate(2015.0) - share_by).abs() <= FIT_TOLERANCE);
        assert!((params.evaluate(f64::from(switch_yr)) - share_target).abs() <= FIT_TOLERANCE);
    }

    #[test]
    fn test_fit_midway() {
        // A share of zero rising to 0.5 (the maximum) is halfway at the midpoint
        let target = target(0.0, 0.5, 0.5, 2035);
        let diffusion =
            fit_technology_diffusion(&"heating".into(), &"b".into(), &target)
                .unwrap()
                .unwrap();
        assert_approx_eq!(f64, diffusion.share_at(2025), 0.25, epsilon = 0.02);
    }

    #[test]
    fn test_no_increase() {
        let target = target(0.5, 0.4, 1.0, 2035);
        assert_eq!(
            fit_technology_diffusion(&"heating".into(), &"a".into(), &target).unwrap(),
            None
        );
    }

    #[test]
    fn test_switch_in_base_year_is_complete() {
        let target = target(0.0, 1.0, 1.0, 2015);
        assert_eq!(
            fit_technology_diffusion(&"heating".into(), &"a".into(), &target).unwrap(),
            Some(Diffusion::Complete { share: 1.0 })
        );
    }

    #[test]
    fn test_market_entry_first_point() {
        let target = DiffusionTarget {
            market_entry: 2020,
            ..target(0.2, 0.6, 1.0, 2040)
        };
        let Some(Diffusion::Sigmoid(params)) =
            fit_technology_diffusion(&"heating".into(), &"a".into(), &target).unwrap()
        else {
            panic!("Expected a sigmoid fit");
        };
        assert!(params.evaluate(2020.0) <= MIN_SHARE + FIT_TOLERANCE);
    }

    #[test]
    fn test_fit_failure() {
        // The switch year is so far away that the midpoint cannot be within bounds
        let target = target(0.0, 0.5, 1.0, 2500);
        let err =
            fit_technology_diffusion(&"heating".into(), &"a".into(), &target).unwrap_err();
        assert_eq!(
            demand_error(&err),
            Some(&DemandError::FitFailure {
                enduse: "heating".into(),
                technology: "a".into(),
            })
        );
    }
}
