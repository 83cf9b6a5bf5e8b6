//! Decomposition of an enduse's yearly fuel into hourly fuel per fueltype.
//!
//! Each enduse's base-year fuel passes through a cascade of scaling steps (climate, smart meters,
//! efficiency drift, scenario drivers and price elasticity). The result is then distributed over
//! the hours of the year, either directly with the enduse's load profile or, for enduses with
//! technologies, by converting fuel to service, applying switches and converting back to fuel.
use crate::assumptions::{Assumptions, SmartMeterAssumptions};
use crate::calendar::{DAYS_IN_YEAR, HOURS_IN_DAY};
use crate::degree_days::{DegreeDays, peak_day, peak_yd_factor};
use crate::diffusion::{SigmoidShape, diffusion_fraction, interpolate, safe_div, sigmoid_diffusion};
use crate::enduse::{Enduse, EnduseKind, SectorID};
use crate::error::DemandError;
use crate::fueltype::FuelType;
use crate::load_profile::LoadProfileStock;
use crate::region::RegionID;
use crate::results::EnduseResult;
use crate::scenario::{FuelPrices, ScenarioDrivers};
use crate::sigmoid_fit::DiffusionMap;
use crate::switch::{ServiceByFueltype, SwitchTable, apply_switches};
use crate::technology::stock::TechnologyStock;
use crate::technology::{PLACEHOLDER_TECHNOLOGY, TechnologyID};
use anyhow::{Result, ensure};
use float_cmp::approx_eq;
use log::debug;
use ndarray::{Array1, Array2, Array3, Axis, Zip};

/// Relative tolerance for service conservation through switches
const SERVICE_TOLERANCE: f64 = 1e-6;

/// Everything needed to decompose the enduses of one sector in one region and year
#[derive(Clone, Copy)]
pub struct EnduseContext<'a> {
    /// The region
    pub region: &'a RegionID,
    /// The sector
    pub sector: &'a SectorID,
    /// The simulated year
    pub curr_yr: u32,
    /// Model assumptions
    pub assumptions: &'a Assumptions,
    /// The region's degree days for the sector
    pub degree_days: &'a DegreeDays,
    /// The region's technologies
    pub technologies: &'a TechnologyStock,
    /// The region's load profiles
    pub profiles: &'a LoadProfileStock,
    /// Switches for all enduses
    pub switches: &'a SwitchTable,
    /// Fitted diffusion curves for switched technologies
    pub diffusions: &'a DiffusionMap,
    /// Scenario driver values
    pub drivers: &'a ScenarioDrivers,
    /// Fuel prices
    pub prices: &'a FuelPrices,
}

/// Scale fuel by the climate correction factor for the enduse's kind
pub fn apply_climate_correction(
    fuel: &mut Array1<f64>,
    kind: EnduseKind,
    degree_days: &DegreeDays,
) {
    *fuel *= degree_days.correction_factor(kind);
}

/// Smart meter penetration in `curr_yr`
pub fn smart_meter_penetration(
    smart_meter: &SmartMeterAssumptions,
    base_yr: u32,
    curr_yr: u32,
    end_yr: u32,
    shape: &SigmoidShape,
) -> f64 {
    let fraction = sigmoid_diffusion(base_yr, curr_yr, end_yr, shape);
    interpolate(smart_meter.p_by, smart_meter.p_ey, fraction)
}

/// Reduce fuel by the savings from additional smart meters installed since the base year
pub fn apply_smart_meter_savings(fuel: &mut Array1<f64>, savings: f64, p_by: f64, p_cy: f64) {
    *fuel *= (1.0 - (p_cy - p_by) * savings).max(0.0);
}

/// Scale fuel by the fraction of the enduse's efficiency drift realised so far
pub fn apply_efficiency_drift(fuel: &mut Array1<f64>, target: f64, fraction: f64) {
    let delta = (target - 1.0) * fraction;
    *fuel *= (1.0 + delta).max(0.0);
}

/// Apply a linear price elasticity to each fueltype's fuel.
///
/// Fueltypes whose base-year price is zero do not respond to price.
pub fn apply_price_elasticity(
    fuel: &mut Array1<f64>,
    elasticity: f64,
    price_by: &Array1<f64>,
    price_cy: &Array1<f64>,
) {
    Zip::from(fuel)
        .and(price_by)
        .and(price_cy)
        .for_each(|fuel, &by, &cy| {
            let factor = 1.0 - elasticity * safe_div(by - cy, by);
            *fuel = (*fuel * factor).max(0.0);
        });
}

/// Apply the scaling cascade to an enduse's base-year fuel
pub fn apply_cascade(
    ctx: &EnduseContext,
    enduse: &Enduse,
    fuel_by: &Array1<f64>,
) -> Result<Array1<f64>> {
    let assumptions = ctx.assumptions;
    let (base_yr, curr_yr, end_yr) = (assumptions.base_yr, ctx.curr_yr, assumptions.end_yr);
    let mut fuel = fuel_by.clone();

    apply_climate_correction(&mut fuel, enduse.kind, ctx.degree_days);

    if let Some(savings) = assumptions.smart_meter_savings(&enduse.id) {
        let smart_meter = &assumptions.smart_meter;
        let p_cy = smart_meter_penetration(
            smart_meter,
            base_yr,
            curr_yr,
            end_yr,
            &assumptions.diffusion,
        );
        apply_smart_meter_savings(&mut fuel, savings, smart_meter.p_by, p_cy);
    }

    if let Some(target) = assumptions.efficiency_target(&enduse.id) {
        let fraction = diffusion_fraction(
            assumptions.efficiency_drift.method,
            base_yr,
            curr_yr,
            end_yr,
            &assumptions.diffusion,
        );
        apply_efficiency_drift(&mut fuel, target, fraction);
    }

    let ratio = ctx
        .drivers
        .driver_ratio(ctx.region, &enduse.drivers, base_yr, curr_yr)?;
    fuel *= ratio;

    if let Some(elasticity) = assumptions.elasticity(&enduse.id) {
        let (price_by, price_cy) = ctx.prices.prices(base_yr, curr_yr, fuel.len());
        apply_price_elasticity(&mut fuel, elasticity, &price_by, &price_cy);
    }

    Ok(fuel)
}

/// Check that base-year fuel is usable
fn check_fuel(fuel_by: &Array1<f64>) -> Result<()> {
    ensure!(
        fuel_by.iter().all(|fuel| fuel.is_finite() && *fuel >= 0.0),
        DemandError::configuration("Fuel must be finite and non-negative")
    );

    Ok(())
}

/// Decompose the yearly fuel of one enduse into hourly fuel per fueltype.
///
/// # Arguments
///
/// * `ctx` - The region, sector and year, with the data they need
/// * `enduse` - The enduse to decompose
/// * `fuel_by` - Base-year fuel, by fueltype
pub fn decompose_enduse(
    ctx: &EnduseContext,
    enduse: &Enduse,
    fuel_by: &Array1<f64>,
) -> Result<EnduseResult> {
    check_fuel(fuel_by)?;
    let fuel = apply_cascade(ctx, enduse, fuel_by)?;
    debug!(
        "Decomposing enduse {} (sector {}, region {}, year {}): {:.6} before cascade, {:.6} after",
        enduse.id,
        ctx.sector,
        ctx.region,
        ctx.curr_yr,
        fuel_by.sum(),
        fuel.sum()
    );

    if enduse.has_technologies() {
        decompose_with_technologies(ctx, enduse, &fuel)
    } else {
        decompose_without_technologies(ctx, enduse, &fuel)
    }
}

/// Degree days which determine the peak day, if the enduse is temperature driven
fn peak_degree_days<'a>(ctx: &EnduseContext<'a>, kind: EnduseKind) -> Option<&'a Array1<f64>> {
    ctx.degree_days
        .for_kind(kind)
        .filter(|degree_days| degree_days.sum() > 0.0)
}

/// Distribute fuel using the enduse's own load profile
fn decompose_without_technologies(
    ctx: &EnduseContext,
    enduse: &Enduse,
    fuel: &Array1<f64>,
) -> Result<EnduseResult> {
    let placeholder = TechnologyID::new(PLACEHOLDER_TECHNOLOGY);
    let profile = ctx
        .profiles
        .get_profile(&enduse.id, ctx.sector, &placeholder)?;

    let num_fueltypes = fuel.len();
    let fuel_yh = Array3::from_shape_fn(
        (num_fueltypes, DAYS_IN_YEAR, HOURS_IN_DAY),
        |(fueltype, day, hour)| {
            fuel[fueltype] * profile.shape_yd[day] * profile.shape_y_dh[[day, hour]]
        },
    );

    let (yd_factor, peak_day) = match peak_degree_days(ctx, enduse.kind) {
        Some(degree_days) => (peak_yd_factor(degree_days), peak_day(degree_days)),
        None => (
            profile.shape_yd.iter().copied().fold(0.0, f64::max),
            peak_day(&profile.shape_yd),
        ),
    };
    let fuel_peak_dh = Array2::from_shape_fn((num_fueltypes, HOURS_IN_DAY), |(fueltype, hour)| {
        fuel[fueltype] * yd_factor * profile.shape_peak_dh[hour]
    });

    let result = EnduseResult::new(fuel_yh, fuel.clone(), fuel_peak_dh, peak_day);
    result.check_conservation()?;

    Ok(result)
}

/// Check that every fueltype with fuel has technologies to use it
fn check_fueltype_shares(enduse: &Enduse, fuel: &Array1<f64>) -> Result<()> {
    for (idx, value) in fuel.iter().enumerate() {
        let fueltype = FuelType(idx);
        ensure!(
            *value <= 0.0
                || enduse
                    .fuel_tech_shares
                    .keys()
                    .any(|(share_fueltype, _)| *share_fueltype == fueltype),
            DemandError::configuration(format!(
                "Enduse {} has fuel of fueltype {fueltype} but no technology shares for it",
                enduse.id
            ))
        );
    }

    Ok(())
}

/// Distribute fuel by converting it to service, applying switches and converting it back to fuel
/// with each technology's current-year efficiency
fn decompose_with_technologies(
    ctx: &EnduseContext,
    enduse: &Enduse,
    fuel: &Array1<f64>,
) -> Result<EnduseResult> {
    check_fueltype_shares(enduse, fuel)?;
    let num_fueltypes = fuel.len();

    // Base-year service per technology, with each technology's hourly service shape
    let mut service_by = ServiceByFueltype::new();
    let mut service_shapes = Vec::with_capacity(enduse.technologies.len());
    for technology in &enduse.technologies {
        let profile = ctx
            .profiles
            .get_profile(&enduse.id, ctx.sector, technology)?;
        let instance = ctx.technologies.get(technology)?;
        let mut service_shape = &profile.shape_yh * &instance.eff_by;
        let service_shape_total = service_shape.sum();
        for (fueltype, share) in enduse.shares_for_technology(technology) {
            *service_by.entry((fueltype, technology.clone())).or_default() +=
                share * fuel[fueltype.index()] * service_shape_total;
        }

        service_shape.mapv_inplace(|service| safe_div(service, service_shape_total));
        service_shapes.push(service_shape);
    }

    // Current-year service per technology
    let service_cy = apply_switches(
        &enduse.id,
        &service_by,
        ctx.diffusions,
        ctx.switches.get(&enduse.id),
        ctx.curr_yr,
    );
    let total_by: f64 = service_by.values().sum();
    let total_cy: f64 = service_cy.values().sum();
    ensure!(
        approx_eq!(f64, total_cy, total_by, epsilon = SERVICE_TOLERANCE * total_by.max(1.0)),
        DemandError::internal(format!(
            "Service not conserved by switches for enduse {} (before: {total_by}, after: \
             {total_cy})",
            enduse.id
        ))
    );

    // Convert service back to fuel
    let mut fuel_yh = Array3::<f64>::zeros((num_fueltypes, DAYS_IN_YEAR, HOURS_IN_DAY));
    let mut fuel_y_expected = Array1::<f64>::zeros(num_fueltypes);
    let mut fuel_by_tech = Vec::with_capacity(enduse.technologies.len());
    for (technology, service_shape) in enduse.technologies.iter().zip(service_shapes) {
        let instance = ctx.technologies.get(technology)?;
        let service_cy_t = service_shape * service_cy.get(technology).copied().unwrap_or(0.0);
        let fuel_cy_t = Zip::from(&service_cy_t)
            .and(&instance.eff_cy)
            .map_collect(|&service, &eff| safe_div(service, eff));

        let mut tech_fuel_by_type = 0.0;
        for ((mut fuel_f, shares_f), expected_f) in fuel_yh
            .outer_iter_mut()
            .zip(instance.fuel_type_share_yh.outer_iter())
            .zip(fuel_y_expected.iter_mut())
        {
            Zip::from(&mut fuel_f)
                .and(&shares_f)
                .and(&fuel_cy_t)
                .for_each(|out, &share, &fuel| *out += share * fuel);
            let fuel_tf = (&shares_f * &fuel_cy_t).sum();
            *expected_f += fuel_tf;
            tech_fuel_by_type += fuel_tf;
        }

        // Fueltype shares of every hour form a partition of the technology's fuel
        let tech_fuel = fuel_cy_t.sum();
        ensure!(
            approx_eq!(
                f64,
                tech_fuel_by_type,
                tech_fuel,
                epsilon = SERVICE_TOLERANCE * tech_fuel.max(1.0)
            ),
            DemandError::internal(format!(
                "Fueltype shares of technology {technology} do not cover all of its fuel \
                 ({tech_fuel_by_type} of {tech_fuel})"
            ))
        );
        fuel_by_tech.push((technology, fuel_cy_t));
    }

    let peak_day = match peak_degree_days(ctx, enduse.kind) {
        Some(degree_days) => peak_day(degree_days),
        None => peak_day(&fuel_yh.sum_axis(Axis(0)).sum_axis(Axis(1))),
    };

    let mut fuel_peak_dh = Array2::<f64>::zeros((num_fueltypes, HOURS_IN_DAY));
    for (technology, fuel_cy_t) in &fuel_by_tech {
        let profile = ctx
            .profiles
            .get_profile(&enduse.id, ctx.sector, technology)?;
        let instance = ctx.technologies.get(technology)?;
        let day_total = fuel_cy_t.row(peak_day).sum();
        let shares_peak = instance.fuel_type_share_yh.index_axis(Axis(1), peak_day);

        Zip::from(&mut fuel_peak_dh)
            .and(&shares_peak)
            .and_broadcast(&profile.shape_peak_dh)
            .for_each(|out, &share, &shape| *out += day_total * shape * share);
    }

    let result = EnduseResult::new(fuel_yh, fuel_y_expected, fuel_peak_dh, peak_day);
    result.check_conservation()?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::demand_error;
    use crate::fixture::{DecomposeFixture, flat_shape_yd, flat_shape_yh};
    use crate::sigmoid_fit::Diffusion;
    use crate::switch::ServiceSwitch;
    use float_cmp::assert_approx_eq;
    use ndarray::array;
    use rstest::rstest;

    /// A fixture where the boiler runs evenly over the year and the heat pump only on day 0
    fn day_zero_heat_pump_fixture() -> DecomposeFixture {
        let mut fixture = DecomposeFixture::new(2015);
        let mut heat_pump_yd = Array1::zeros(DAYS_IN_YEAR);
        heat_pump_yd[0] = 1.0;
        let mut heat_pump_yh = Array2::zeros((DAYS_IN_YEAR, HOURS_IN_DAY));
        heat_pump_yh.row_mut(0).fill(1.0 / 24.0);
        fixture.build_heating_profiles(
            (flat_shape_yd(), flat_shape_yh()),
            (heat_pump_yd, heat_pump_yh),
        );
        fixture
    }

    /// Declare service switches to the given shares, reached from the base year onwards
    fn set_service_targets(fixture: &mut DecomposeFixture, boiler: f64, heat_pump: f64) {
        let enduse = fixture.boiler_and_heat_pump_enduse().id;
        let switch = |technology: &str, target_share| ServiceSwitch {
            enduse: enduse.clone(),
            technology: technology.into(),
            target_share,
            max_share: 1.0,
            switch_yr: 2015,
        };
        fixture.switches = SwitchTable::new(
            vec![switch("boiler_gas", boiler), switch("heat_pump", heat_pump)],
            Vec::new(),
        )
        .unwrap();
        fixture.diffusions.insert(
            (enduse.clone(), "boiler_gas".into()),
            Diffusion::Complete { share: boiler },
        );
    }

    #[test]
    fn test_apply_smart_meter_savings() {
        let mut fuel = array![0.0, 100.0];
        apply_smart_meter_savings(&mut fuel, 0.1, 0.0, 1.0);
        assert_approx_eq!(f64, fuel[1], 90.0);
    }

    #[rstest]
    #[case(0.5, 1.0, 50.0)]
    #[case(0.5, 0.5, 75.0)]
    #[case(1.2, 1.0, 120.0)]
    #[case(-1.0, 1.0, 0.0)]
    fn test_apply_efficiency_drift(
        #[case] target: f64,
        #[case] fraction: f64,
        #[case] expected: f64,
    ) {
        let mut fuel = array![100.0];
        apply_efficiency_drift(&mut fuel, target, fraction);
        assert_approx_eq!(f64, fuel[0], expected);
    }

    #[test]
    fn test_apply_price_elasticity() {
        let mut fuel = array![100.0, 100.0, 100.0];
        let price_by = array![1.0, 1.0, 0.0];
        let price_cy = array![1.5, 100.0, 2.0];
        apply_price_elasticity(&mut fuel, -0.2, &price_by, &price_cy);

        // 1 - (-0.2) * (-0.5) = 0.9
        assert_approx_eq!(f64, fuel[0], 90.0);
        // Clamped at zero
        assert_eq!(fuel[1], 0.0);
        // No base-year price
        assert_eq!(fuel[2], 100.0);
    }

    #[test]
    fn test_identity_without_technologies() {
        let fixture = DecomposeFixture::new(2015);
        let enduse = Enduse {
            id: "rs_lighting".into(),
            ..Default::default()
        };
        let fuel_by = array![0.0, 100.0, 0.0];
        let result = decompose_enduse(&fixture.context(2015), &enduse, &fuel_by).unwrap();

        assert_approx_eq!(f64, result.fuel_yh.sum(), 100.0, epsilon = 1e-9);
        assert_approx_eq!(f64, result.fuel_yh[[1, 0, 0]], 100.0 / 8760.0);
        assert_eq!(result.fuel_yh.index_axis(Axis(0), 0).sum(), 0.0);
        for (fuel_yd, fuel_dh) in result
            .fuel_yd
            .iter()
            .zip(result.fuel_yh.sum_axis(Axis(2)).iter())
        {
            assert_approx_eq!(f64, *fuel_yd, *fuel_dh);
        }
    }

    #[test]
    fn test_identity_with_technologies() {
        let fixture = DecomposeFixture::new(2015);
        let enduse = fixture.heating_enduse(EnduseKind::Other);
        let fuel_by = array![0.0, 100.0, 0.0];
        let result = decompose_enduse(&fixture.context(2015), &enduse, &fuel_by).unwrap();

        assert_approx_eq!(f64, result.fuel_yh.sum(), 100.0, epsilon = 1e-9);
        assert_approx_eq!(f64, result.fuel_y()[1], 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_peak_day_from_hdd() {
        let mut fixture = DecomposeFixture::new(2015);
        let mut hdd = Array1::ones(DAYS_IN_YEAR);
        hdd[42] = 100.0;
        fixture.set_hdd(hdd);
        let enduse = fixture.heating_enduse(EnduseKind::SpaceHeating);
        let fuel_by = array![0.0, 365.0, 0.0];
        let result = decompose_enduse(&fixture.context(2015), &enduse, &fuel_by).unwrap();

        assert_eq!(result.peak_day, 42);
        let peak_day_total = result.fuel_peak_dh.row(1).sum();
        assert_approx_eq!(f64, peak_day_total, 100.0 / 464.0 * 365.0, epsilon = 1e-9);
        assert_approx_eq!(f64, result.fuel_peak_h[1], peak_day_total / 24.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_shares() {
        let fixture = DecomposeFixture::new(2015);
        let enduse = fixture.heating_enduse(EnduseKind::Other);
        let fuel_by = array![5.0, 100.0, 0.0];
        let err = decompose_enduse(&fixture.context(2015), &enduse, &fuel_by).unwrap_err();
        assert!(matches!(
            demand_error(&err),
            Some(DemandError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_profile() {
        let fixture = DecomposeFixture::new(2015);
        let enduse = Enduse {
            id: "rs_cooking".into(),
            ..Default::default()
        };
        let err = decompose_enduse(&fixture.context(2015), &enduse, &array![0.0, 1.0, 0.0])
            .unwrap_err();
        assert!(matches!(
            demand_error(&err),
            Some(DemandError::ProfileMissing { .. })
        ));
    }

    #[test]
    fn test_negative_fuel() {
        let fixture = DecomposeFixture::new(2015);
        let enduse = Enduse {
            id: "rs_lighting".into(),
            ..Default::default()
        };
        let fuel = array![0.0, -1.0, 0.0];
        assert!(decompose_enduse(&fixture.context(2015), &enduse, &fuel).is_err());
    }

    #[test]
    fn test_flat_shapes_sum_to_one() {
        assert_approx_eq!(f64, flat_shape_yd().sum(), 1.0, epsilon = 1e-12);
        assert_approx_eq!(f64, flat_shape_yh().sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_technologies_keep_own_profiles() {
        let fixture = day_zero_heat_pump_fixture();
        let enduse = fixture.boiler_and_heat_pump_enduse();
        let fuel_by = array![0.0, 100.0, 100.0];
        let result = decompose_enduse(&fixture.context(2015), &enduse, &fuel_by).unwrap();

        assert_approx_eq!(f64, result.fuel_yh[[1, 100, 5]], 100.0 / 8760.0, epsilon = 1e-12);
        assert_approx_eq!(f64, result.fuel_yh[[2, 0, 5]], 100.0 / 24.0, epsilon = 1e-9);
        assert_eq!(result.fuel_yh[[2, 100, 5]], 0.0);
        assert_approx_eq!(f64, result.fuel_yh.sum(), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_switch_to_base_year_shares_changes_nothing() {
        let mut fixture = day_zero_heat_pump_fixture();
        let enduse = fixture.boiler_and_heat_pump_enduse();
        let fuel_by = array![0.0, 100.0, 100.0];
        let without_switch = decompose_enduse(&fixture.context(2015), &enduse, &fuel_by).unwrap();

        // Service: 0.9 * 100 from the boiler and 3.0 * 100 from the heat pump
        set_service_targets(&mut fixture, 90.0 / 390.0, 300.0 / 390.0);
        let with_switch = decompose_enduse(&fixture.context(2015), &enduse, &fuel_by).unwrap();

        for (a, b) in with_switch.fuel_yh.iter().zip(&without_switch.fuel_yh) {
            assert_approx_eq!(f64, *a, *b, epsilon = 1e-9);
        }
        assert_eq!(with_switch.peak_day, without_switch.peak_day);
    }

    #[test]
    fn test_switch_scales_each_technology_profile() {
        let mut fixture = day_zero_heat_pump_fixture();
        let enduse = fixture.boiler_and_heat_pump_enduse();
        set_service_targets(&mut fixture, 0.5, 0.5);
        let fuel_by = array![0.0, 100.0, 100.0];
        let result = decompose_enduse(&fixture.context(2015), &enduse, &fuel_by).unwrap();

        // 390 units of service split evenly, converted back with each technology's efficiency
        let gas = 195.0 / 0.9;
        let electricity = 195.0 / 3.0;
        assert_approx_eq!(f64, result.fuel_yh[[1, 0, 5]], gas / 8760.0, epsilon = 1e-9);
        assert_approx_eq!(f64, result.fuel_yh[[1, 100, 5]], gas / 8760.0, epsilon = 1e-9);
        assert_approx_eq!(f64, result.fuel_yh[[2, 0, 5]], electricity / 24.0, epsilon = 1e-9);
        assert_eq!(result.fuel_yh.index_axis(Axis(1), 100).row(2).sum(), 0.0);
        assert_approx_eq!(f64, result.fuel_y()[1], gas, epsilon = 1e-6);
        assert_approx_eq!(f64, result.fuel_y()[2], electricity, epsilon = 1e-6);
        assert_approx_eq!(f64, result.fuel_y_expected[2], electricity, epsilon = 1e-6);
    }
}
