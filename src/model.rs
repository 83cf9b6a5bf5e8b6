//! The static data of a demand model, as read from a model directory.
use crate::assumptions::Assumptions;
use crate::enduse::{EnduseID, EnduseMap};
use crate::fueltype::FuelTypeLookup;
use crate::load_profile::{ProfileAssignment, ProfileInput};
use crate::region::RegionMap;
use crate::scenario::{FuelPrices, ScenarioDrivers};
use crate::sigmoid_fit::{DiffusionMap, fit_switch_diffusions};
use crate::switch::{ServiceByFueltype, SwitchTable};
use crate::technology::TechnologyMap;
use crate::weather::{StationMap, TemperatureStore};
use anyhow::Result;
use indexmap::IndexMap;
use log::debug;
use std::path::PathBuf;

/// Model definition
#[derive(Debug)]
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model file
    pub assumptions: Assumptions,
    /// The fueltypes, in the order of fuel arrays
    pub fueltypes: FuelTypeLookup,
    /// Regions with their base-year fuels
    pub regions: RegionMap,
    /// Enduses with their base-year technology shares
    pub enduses: EnduseMap,
    /// All technologies
    pub technologies: TechnologyMap,
    /// Service and fuel switches, by enduse
    pub switches: SwitchTable,
    /// Fitted diffusion curves of switched technologies
    pub diffusions: DiffusionMap,
    /// Weather stations
    pub stations: StationMap,
    /// Cleaned temperatures of each station
    pub temperatures: TemperatureStore,
    /// Scenario drivers
    pub drivers: ScenarioDrivers,
    /// Fuel prices
    pub prices: FuelPrices,
    /// Which load profiles apply to which enduses, sectors and technologies
    pub profile_assignments: Vec<ProfileAssignment>,
    /// Load profiles, keyed by name
    pub profile_inputs: IndexMap<String, ProfileInput>,
}

impl Model {
    /// Assemble a model, fitting the diffusion curves of any switched technologies.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model_path: PathBuf,
        assumptions: Assumptions,
        fueltypes: FuelTypeLookup,
        regions: RegionMap,
        enduses: EnduseMap,
        technologies: TechnologyMap,
        switches: SwitchTable,
        stations: StationMap,
        temperatures: TemperatureStore,
        drivers: ScenarioDrivers,
        prices: FuelPrices,
        profile_assignments: Vec<ProfileAssignment>,
        profile_inputs: IndexMap<String, ProfileInput>,
    ) -> Result<Self> {
        let service_by = national_service_by(
            &switches,
            &regions,
            &enduses,
            &technologies,
            fueltypes.len(),
        );
        let diffusions =
            fit_switch_diffusions(&switches, &service_by, &technologies, assumptions.base_yr)?;
        debug!("Fitted {} technology diffusion curves", diffusions.len());

        Ok(Self {
            model_path,
            assumptions,
            fueltypes,
            regions,
            enduses,
            technologies,
            switches,
            diffusions,
            stations,
            temperatures,
            drivers,
            prices,
            profile_assignments,
            profile_inputs,
        })
    }

    /// The number of fueltypes
    pub fn num_fueltypes(&self) -> usize {
        self.fueltypes.len()
    }
}

/// National base-year service of each switched enduse, by (fueltype, technology).
///
/// Service is fuel multiplied by the technology's base-year efficiency, summed over all regions
/// and sectors.
fn national_service_by(
    switches: &SwitchTable,
    regions: &RegionMap,
    enduses: &EnduseMap,
    technologies: &TechnologyMap,
    num_fueltypes: usize,
) -> IndexMap<EnduseID, ServiceByFueltype> {
    let mut service_by = IndexMap::new();
    for (id, _) in switches.iter() {
        let Some(enduse) = enduses.get(id) else {
            continue;
        };

        let mut service = ServiceByFueltype::new();
        for region in regions.values() {
            let fuel = region.enduse_fuel(id, num_fueltypes);
            for ((fueltype, technology), share) in &enduse.fuel_tech_shares {
                let Some(tech) = technologies.get(technology) else {
                    continue;
                };
                *service.entry((*fueltype, technology.clone())).or_default() +=
                    fuel[fueltype.index()] * share * tech.eff_by;
            }
        }
        service_by.insert(id.clone(), service);
    }

    service_by
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enduse::Enduse;
    use crate::fixture::constant_technology;
    use crate::fueltype::FuelType;
    use crate::region::Region;
    use crate::switch::ServiceSwitch;
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use ndarray::array;

    #[test]
    fn test_national_service_by() {
        let technologies: TechnologyMap = indexmap! {
            "boiler_gas".into() => constant_technology("boiler_gas", 0, 0.5),
            "heat_pump".into() => constant_technology("heat_pump", 1, 2.0),
        };
        let mut enduse = Enduse {
            id: "heating".into(),
            ..Default::default()
        };
        enduse
            .fuel_tech_shares
            .insert((FuelType(0), "boiler_gas".into()), 1.0);
        enduse
            .fuel_tech_shares
            .insert((FuelType(1), "heat_pump".into()), 1.0);
        let enduses = indexmap! { enduse.id.clone() => enduse };
        let region = |id: &str, gas: f64| Region {
            id: id.into(),
            longitude: 0.0,
            latitude: 50.0,
            fuels: indexmap! { ("residential".into(), "heating".into()) => array![gas, 10.0] },
        };
        let regions = indexmap! {
            "a".into() => region("a", 100.0),
            "b".into() => region("b", 60.0),
        };
        let switches = SwitchTable::new(
            vec![ServiceSwitch {
                enduse: "heating".into(),
                technology: "heat_pump".into(),
                target_share: 1.0,
                max_share: 1.0,
                switch_yr: 2050,
            }],
            Vec::new(),
        )
        .unwrap();

        let service = national_service_by(&switches, &regions, &enduses, &technologies, 2);
        let service = &service["heating"];
        assert_approx_eq!(f64, service[&(FuelType(0), "boiler_gas".into())], 80.0);
        assert_approx_eq!(f64, service[&(FuelType(1), "heat_pump".into())], 40.0);
    }
}
