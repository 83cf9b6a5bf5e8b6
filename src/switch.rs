//! Scenario switches move service from one technology (or fueltype) to another over time.
//!
//! An enduse may have either service switches or fuel switches, but not both. Switches are applied
//! to yearly service totals by [`apply_switches`], which knows nothing about sectors or regions.
use crate::diffusion::safe_div;
use crate::enduse::EnduseID;
use crate::error::DemandError;
use crate::fueltype::FuelType;
use crate::sigmoid_fit::DiffusionMap;
use crate::technology::TechnologyID;
use anyhow::{Result, bail, ensure};
use float_cmp::approx_eq;
use indexmap::IndexMap;
use itertools::Itertools;
use log::warn;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tolerance for checking that service switch targets sum to one
const TARGET_SUM_TOLERANCE: f64 = 1e-6;

/// Service which cannot be moved is ignored below this amount
const SERVICE_EPSILON: f64 = 1e-12;

/// Yearly service per (fueltype, technology)
pub type ServiceByFueltype = BTreeMap<(FuelType, TechnologyID), f64>;

/// Yearly service per technology
pub type ServiceByTechnology = BTreeMap<TechnologyID, f64>;

/// A declared end-year share of an enduse's service for one technology
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSwitch {
    /// The enduse
    pub enduse: EnduseID,
    /// The technology
    pub technology: TechnologyID,
    /// The share of the enduse's service provided by the technology in `switch_yr`
    pub target_share: f64,
    /// The maximum share the technology could reach
    pub max_share: f64,
    /// The year by which the target share is reached
    pub switch_yr: u32,
}

/// A declared replacement of one fueltype's service by a technology
#[derive(Debug, Clone, PartialEq)]
pub struct FuelSwitch {
    /// The enduse
    pub enduse: EnduseID,
    /// The fueltype whose service is replaced
    pub fueltype_replaced: FuelType,
    /// The technology installed in its place
    pub technology_install: TechnologyID,
    /// The year by which the switch is complete
    pub switch_yr: u32,
    /// Share of the fueltype's service which is switched by `switch_yr`
    pub share_switched: f64,
    /// The maximum share of the fueltype's service which could ever be switched
    pub max_theoretical_switch: f64,
}

/// The switches declared for one enduse
#[derive(Debug, Clone, PartialEq)]
pub enum EnduseSwitches {
    /// Target shares of service per technology
    Service(Vec<ServiceSwitch>),
    /// Replacement of fueltypes by technologies
    Fuel(Vec<FuelSwitch>),
}

impl EnduseSwitches {
    /// Get the fuel switches grouped by the technology they install, in order of technology
    pub fn fuel_switches_by_technology(&self) -> BTreeMap<&TechnologyID, Vec<&FuelSwitch>> {
        let mut grouped: BTreeMap<_, Vec<_>> = BTreeMap::new();
        if let EnduseSwitches::Fuel(switches) = self {
            for switch in switches {
                grouped
                    .entry(&switch.technology_install)
                    .or_default()
                    .push(switch);
            }
        }

        grouped
    }

    /// The technologies these switches install or sets targets for
    pub fn technologies(&self) -> Vec<TechnologyID> {
        match self {
            EnduseSwitches::Service(switches) => switches
                .iter()
                .map(|switch| switch.technology.clone())
                .collect(),
            EnduseSwitches::Fuel(switches) => switches
                .iter()
                .map(|switch| switch.technology_install.clone())
                .unique()
                .collect(),
        }
    }
}

/// The switches declared for all enduses
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SwitchTable {
    by_enduse: IndexMap<EnduseID, EnduseSwitches>,
}

/// Check a single service switch
fn check_service_switch(switch: &ServiceSwitch) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&switch.max_share),
        "max_share must be between 0 and 1"
    );
    ensure!(
        switch.target_share >= 0.0 && switch.target_share <= switch.max_share,
        "target_share must be between 0 and max_share"
    );

    Ok(())
}

/// Check a single fuel switch
fn check_fuel_switch(switch: &FuelSwitch) -> Result<()> {
    ensure!(
        switch.share_switched > 0.0 && switch.share_switched <= 1.0,
        "share_switched must be greater than 0 and at most 1"
    );
    ensure!(
        switch.max_theoretical_switch >= switch.share_switched
            && switch.max_theoretical_switch <= 1.0,
        "max_theoretical_switch must be between share_switched and 1"
    );

    Ok(())
}

impl SwitchTable {
    /// Create a new [`SwitchTable`], checking that the switches are consistent.
    ///
    /// # Returns
    ///
    /// The table or an error if:
    /// - any enduse has both service and fuel switches
    /// - the service switch targets of an enduse do not sum to one
    /// - more than all of a fueltype's service is switched for an enduse
    pub fn new(
        service_switches: Vec<ServiceSwitch>,
        fuel_switches: Vec<FuelSwitch>,
    ) -> Result<Self> {
        let service_enduses: HashSet<_> = service_switches.iter().map(|s| &s.enduse).collect();
        for switch in &fuel_switches {
            if service_enduses.contains(&switch.enduse) {
                bail!(DemandError::ConflictingSwitches(switch.enduse.to_string()));
            }
        }

        let mut service_by_enduse: IndexMap<EnduseID, Vec<ServiceSwitch>> = IndexMap::new();
        for switch in service_switches {
            check_service_switch(&switch).map_err(|err| {
                DemandError::configuration(format!(
                    "Invalid service switch for enduse {}, technology {}: {err}",
                    switch.enduse, switch.technology
                ))
            })?;
            service_by_enduse
                .entry(switch.enduse.clone())
                .or_default()
                .push(switch);
        }

        let mut fuel_by_enduse: IndexMap<EnduseID, Vec<FuelSwitch>> = IndexMap::new();
        for switch in fuel_switches {
            check_fuel_switch(&switch).map_err(|err| {
                DemandError::configuration(format!(
                    "Invalid fuel switch for enduse {}, technology {}: {err}",
                    switch.enduse, switch.technology_install
                ))
            })?;
            fuel_by_enduse
                .entry(switch.enduse.clone())
                .or_default()
                .push(switch);
        }

        let by_enduse = service_by_enduse
            .into_iter()
            .map(|(enduse, switches)| (enduse, EnduseSwitches::Service(switches)))
            .chain(
                fuel_by_enduse
                    .into_iter()
                    .map(|(enduse, switches)| (enduse, EnduseSwitches::Fuel(switches))),
            )
            .collect();

        let table = Self { by_enduse };
        table.check_totals()?;

        Ok(table)
    }

    /// Check the sums of shares over each enduse and fueltype
    fn check_totals(&self) -> Result<()> {
        for (enduse, enduse_switches) in &self.by_enduse {
            match enduse_switches {
                EnduseSwitches::Service(switches) => {
                    let mut seen = HashSet::new();
                    for switch in switches {
                        ensure!(
                            seen.insert(&switch.technology),
                            DemandError::configuration(format!(
                                "More than one service switch for enduse {enduse}, technology {}",
                                switch.technology
                            ))
                        );
                    }

                    let total: f64 = switches.iter().map(|s| s.target_share).sum();
                    ensure!(
                        approx_eq!(f64, total, 1.0, epsilon = TARGET_SUM_TOLERANCE),
                        DemandError::configuration(format!(
                            "Service switch targets for enduse {enduse} must sum to one \
                             (sum: {total})"
                        ))
                    );
                }
                EnduseSwitches::Fuel(switches) => {
                    let mut by_fueltype: HashMap<FuelType, f64> = HashMap::new();
                    for switch in switches {
                        *by_fueltype.entry(switch.fueltype_replaced).or_default() +=
                            switch.share_switched;
                    }
                    for (fueltype, total) in by_fueltype {
                        ensure!(
                            total <= 1.0 + TARGET_SUM_TOLERANCE,
                            DemandError::configuration(format!(
                                "More than all service of fueltype {fueltype} is switched for \
                                 enduse {enduse}"
                            ))
                        );
                    }

                    for (technology, switches) in enduse_switches.fuel_switches_by_technology() {
                        ensure!(
                            switches.iter().map(|s| s.switch_yr).all_equal(),
                            DemandError::configuration(format!(
                                "Fuel switches installing {technology} for enduse {enduse} must \
                                 have the same switch_yr"
                            ))
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Get the switches for an enduse, if any
    pub fn get(&self, enduse: &EnduseID) -> Option<&EnduseSwitches> {
        self.by_enduse.get(enduse)
    }

    /// Iterate over enduses with switches
    pub fn iter(&self) -> impl Iterator<Item = (&EnduseID, &EnduseSwitches)> {
        self.by_enduse.iter()
    }

    /// Whether no switches are declared
    pub fn is_empty(&self) -> bool {
        self.by_enduse.is_empty()
    }
}

/// Sum service over fueltypes for each technology
pub fn service_by_technology(service: &ServiceByFueltype) -> ServiceByTechnology {
    let mut totals = ServiceByTechnology::new();
    for ((_, technology), value) in service {
        *totals.entry(technology.clone()).or_default() += value;
    }

    totals
}

/// Apply service switches to base-year shares of service
fn apply_service_switch(
    enduse: &EnduseID,
    switches: &[ServiceSwitch],
    service_by: &ServiceByTechnology,
    diffusions: &DiffusionMap,
    curr_yr: u32,
) -> ServiceByTechnology {
    let total: f64 = service_by.values().sum();
    if total <= 0.0 {
        return service_by.clone();
    }

    let share_by: BTreeMap<_, _> = service_by
        .iter()
        .map(|(tech, service)| (tech, service / total))
        .collect();
    let targets: HashMap<_, _> = switches
        .iter()
        .map(|switch| (&switch.technology, switch.target_share))
        .collect();

    // Technologies whose share grows
    let mut increases = BTreeMap::new();
    for (tech, p_by) in &share_by {
        if let Some(diffusion) = diffusions.get(&(enduse.clone(), (*tech).clone())) {
            let p_cy = diffusion.share_at(curr_yr).max(*p_by);
            increases.insert(*tech, p_cy - p_by);
        }
    }

    // Technologies whose share shrinks. Undeclared technologies have a target of zero.
    let decreasing: Vec<_> = share_by
        .iter()
        .filter(|(tech, p_by)| {
            !increases.contains_key(*tech)
                && targets.get(**tech).copied().unwrap_or(0.0) < **p_by
        })
        .map(|(tech, p_by)| (*tech, *p_by))
        .collect();
    let available: f64 = decreasing.iter().map(|(_, p_by)| p_by).sum();

    let mut increase: f64 = increases.values().sum();
    if increase > available + SERVICE_EPSILON {
        warn!(
            "Service switch for enduse {enduse} requires more service than declining technologies \
             provide; scaling down increases"
        );
        let scale = safe_div(available, increase);
        for delta in increases.values_mut() {
            *delta *= scale;
        }
        increase = available;
    }

    let mut share_cy: BTreeMap<_, _> = share_by.clone();
    for (tech, delta) in &increases {
        *share_cy.entry(*tech).or_default() += delta;
    }
    for (tech, p_by) in &decreasing {
        share_cy.insert(*tech, p_by - increase * safe_div(*p_by, available));
    }

    share_cy
        .into_iter()
        .map(|(tech, share)| (tech.clone(), share.max(0.0) * total))
        .collect()
}

/// Apply fuel switches to base-year service
fn apply_fuel_switch(
    enduse: &EnduseID,
    enduse_switches: &EnduseSwitches,
    service_by: &ServiceByFueltype,
    diffusions: &DiffusionMap,
    curr_yr: u32,
) -> ServiceByTechnology {
    let tech_by = service_by_technology(service_by);
    let total: f64 = tech_by.values().sum();
    let mut service_cy = tech_by.clone();
    if total <= 0.0 {
        return service_cy;
    }

    // Service of each (fueltype, technology) which has not yet been switched
    let mut remaining = service_by.clone();

    for (installed, switches) in enduse_switches.fuel_switches_by_technology() {
        let Some(diffusion) = diffusions.get(&(enduse.clone(), installed.clone())) else {
            continue;
        };

        let installed_by = tech_by.get(installed).copied().unwrap_or(0.0);
        let increment = (diffusion.share_at(curr_yr) * total - installed_by).max(0.0);
        if increment <= SERVICE_EPSILON {
            continue;
        }

        let weight_total: f64 = switches.iter().map(|s| s.share_switched).sum();
        let mut moved = 0.0;
        for switch in switches {
            let allocation = increment * safe_div(switch.share_switched, weight_total);
            let pool: Vec<_> = remaining
                .iter()
                .filter(|((fueltype, tech), service)| {
                    *fueltype == switch.fueltype_replaced && tech != installed && **service > 0.0
                })
                .map(|(key, service)| (key.clone(), *service))
                .collect();
            let pool_total: f64 = pool.iter().map(|(_, service)| service).sum();
            let taken = allocation.min(pool_total);

            for ((fueltype, tech), service) in pool {
                let removed = taken * safe_div(service, pool_total);
                *remaining.entry((fueltype, tech.clone())).or_default() -= removed;
                *service_cy.entry(tech).or_default() -= removed;
            }
            moved += taken;
        }

        if moved + SERVICE_EPSILON < increment {
            warn!(
                "Not enough service to switch to {installed} for enduse {enduse}: \
                 {moved} of {increment} moved"
            );
        }
        *service_cy.entry(installed.clone()).or_default() += moved;
    }

    service_cy
        .into_iter()
        .map(|(tech, service)| (tech, service.max(0.0)))
        .collect()
}

/// Apply an enduse's switches to its base-year service.
///
/// # Arguments
///
/// * `enduse` - The enduse
/// * `service_by` - Yearly base-year service per (fueltype, technology)
/// * `diffusions` - Fitted diffusion curves for the switched technologies
/// * `enduse_switches` - The enduse's switches, if any
/// * `curr_yr` - The current year
///
/// # Returns
///
/// Current-year yearly service per technology. The total over technologies is the same as in the
/// base year. Without switches, each technology keeps its base-year service.
pub fn apply_switches(
    enduse: &EnduseID,
    service_by: &ServiceByFueltype,
    diffusions: &DiffusionMap,
    enduse_switches: Option<&EnduseSwitches>,
    curr_yr: u32,
) -> ServiceByTechnology {
    match enduse_switches {
        None => service_by_technology(service_by),
        Some(EnduseSwitches::Service(switches)) => {
            let mut tech_by = service_by_technology(service_by);
            for switch in switches {
                tech_by.entry(switch.technology.clone()).or_default();
            }
            apply_service_switch(enduse, switches, &tech_by, diffusions, curr_yr)
        }
        Some(enduse_switches @ EnduseSwitches::Fuel(_)) => {
            apply_fuel_switch(enduse, enduse_switches, service_by, diffusions, curr_yr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::demand_error;
    use crate::sigmoid_fit::Diffusion;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn service_switch(technology: &str, target_share: f64) -> ServiceSwitch {
        ServiceSwitch {
            enduse: "heating".into(),
            technology: technology.into(),
            target_share,
            max_share: 1.0,
            switch_yr: 2050,
        }
    }

    fn fuel_switch(fueltype: usize, technology: &str, share_switched: f64) -> FuelSwitch {
        FuelSwitch {
            enduse: "heating".into(),
            fueltype_replaced: FuelType(fueltype),
            technology_install: technology.into(),
            switch_yr: 2050,
            share_switched,
            max_theoretical_switch: 1.0,
        }
    }

    fn complete(enduse: &str, technology: &str, share: f64) -> DiffusionMap {
        DiffusionMap::from([(
            (enduse.into(), technology.into()),
            Diffusion::Complete { share },
        )])
    }

    #[test]
    fn test_conflicting_switches() {
        let err = SwitchTable::new(
            vec![service_switch("a", 1.0)],
            vec![fuel_switch(1, "b", 0.5)],
        )
        .unwrap_err();
        assert_eq!(
            demand_error(&err),
            Some(&DemandError::ConflictingSwitches("heating".into()))
        );
    }

    #[rstest]
    #[case(vec![service_switch("a", 0.5), service_switch("b", 0.5)], true)]
    #[case(vec![service_switch("a", 0.5), service_switch("b", 0.4)], false)]
    #[case(vec![service_switch("a", 0.5), service_switch("a", 0.5)], false)]
    fn test_service_switch_targets(#[case] switches: Vec<ServiceSwitch>, #[case] valid: bool) {
        assert_eq!(SwitchTable::new(switches, Vec::new()).is_ok(), valid);
    }

    #[test]
    fn test_fuel_switch_total_too_high() {
        let switches = vec![fuel_switch(1, "a", 0.6), fuel_switch(1, "b", 0.6)];
        assert!(SwitchTable::new(Vec::new(), switches).is_err());
    }

    #[test]
    fn test_apply_switches_identity() {
        let service_by = ServiceByFueltype::from([
            ((FuelType(1), "boiler_gas".into()), 80.0),
            ((FuelType(2), "heat_pump".into()), 20.0),
        ]);
        let service_cy = apply_switches(
            &"heating".into(),
            &service_by,
            &DiffusionMap::new(),
            None,
            2030,
        );
        assert_eq!(service_cy, service_by_technology(&service_by));
    }

    #[test]
    fn test_apply_service_switch() {
        let service_by = ServiceByFueltype::from([
            ((FuelType(1), "a".into()), 75.0),
            ((FuelType(3), "c".into()), 25.0),
        ]);
        let enduse_switches = EnduseSwitches::Service(vec![
            service_switch("a", 0.5),
            service_switch("b", 0.5),
            service_switch("c", 0.0),
        ]);
        let diffusions = complete("heating", "b", 0.5);

        let service_cy = apply_switches(
            &"heating".into(),
            &service_by,
            &diffusions,
            Some(&enduse_switches),
            2050,
        );
        assert_approx_eq!(f64, service_cy[&TechnologyID::new("b")], 50.0);

        // The increase is taken from a and c in proportion to their base-year shares
        assert_approx_eq!(f64, service_cy[&TechnologyID::new("a")], 37.5);
        assert_approx_eq!(f64, service_cy[&TechnologyID::new("c")], 12.5);
        assert_approx_eq!(f64, service_cy.values().sum::<f64>(), 100.0);
    }

    #[test]
    fn test_apply_fuel_switch() {
        let service_by = ServiceByFueltype::from([
            ((FuelType(1), "boiler_gas".into()), 60.0),
            ((FuelType(1), "fire_gas".into()), 20.0),
            ((FuelType(3), "boiler_oil".into()), 20.0),
        ]);
        let enduse_switches = EnduseSwitches::Fuel(vec![fuel_switch(1, "heat_pump", 0.5)]);
        let diffusions = complete("heating", "heat_pump", 0.4);

        let service_cy = apply_switches(
            &"heating".into(),
            &service_by,
            &diffusions,
            Some(&enduse_switches),
            2050,
        );
        assert_approx_eq!(f64, service_cy[&TechnologyID::new("heat_pump")], 40.0);
        assert_approx_eq!(f64, service_cy[&TechnologyID::new("boiler_gas")], 30.0);
        assert_approx_eq!(f64, service_cy[&TechnologyID::new("fire_gas")], 10.0);
        assert_approx_eq!(f64, service_cy[&TechnologyID::new("boiler_oil")], 20.0);
    }

    #[test]
    fn test_apply_fuel_switch_capped() {
        let service_by = ServiceByFueltype::from([
            ((FuelType(1), "boiler_gas".into()), 10.0),
            ((FuelType(3), "boiler_oil".into()), 90.0),
        ]);
        let enduse_switches = EnduseSwitches::Fuel(vec![fuel_switch(1, "heat_pump", 1.0)]);
        let diffusions = complete("heating", "heat_pump", 0.5);

        let service_cy = apply_switches(
            &"heating".into(),
            &service_by,
            &diffusions,
            Some(&enduse_switches),
            2050,
        );
        assert_approx_eq!(f64, service_cy[&TechnologyID::new("heat_pump")], 10.0);
        assert_eq!(service_cy[&TechnologyID::new("boiler_gas")], 0.0);
        assert_approx_eq!(f64, service_cy.values().sum::<f64>(), 100.0);
    }
}
