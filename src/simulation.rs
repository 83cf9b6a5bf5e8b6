//! Functionality for running the demand decomposition over all years and regions.
use crate::decompose::{EnduseContext, decompose_enduse};
use crate::degree_days::DegreeDays;
use crate::enduse::SectorID;
use crate::load_profile::build_region_profiles;
use crate::model::Model;
use crate::region::Region;
use crate::results::{ResultKey, ResultStore};
use crate::technology::stock::{StockConditions, TechnologyStock};
use crate::weather::WeatherResolver;
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{error, info};

/// Run the simulation.
///
/// Years are simulated in order. If a region fails, the error is logged and the remaining regions
/// are still simulated, but the run as a whole then fails.
///
/// # Arguments:
///
/// * `model` - The model to run
///
/// # Returns
///
/// The results for every (region, year, sector, enduse) or an error.
pub fn run(model: &Model) -> Result<ResultStore> {
    let mut results = ResultStore::default();
    let mut failed = Vec::new();
    for year in model.assumptions.iter_years() {
        info!("Simulating year {year}");

        for region in model.regions.values() {
            info!("Simulating region {} in {year}", region.id);
            match simulate_region(model, region, year) {
                Ok(region_results) => results.extend(region_results)?,
                Err(err) => {
                    error!("Simulation failed for region {} in {year}: {err:?}", region.id);
                    failed.push(format!("{} ({year})", region.id));
                }
            }
        }

        if failed.is_empty() {
            results.check_national_fuel(year, &model.fueltypes)?;
        }
    }

    if !failed.is_empty() {
        bail!(
            "Simulation failed for {} region(s): {}",
            failed.len(),
            failed.join(", ")
        );
    }

    Ok(results)
}

/// Decompose the fuel of every (sector, enduse) in a region for one year
pub fn simulate_region(model: &Model, region: &Region, year: u32) -> Result<ResultStore> {
    let assumptions = &model.assumptions;
    let resolver = WeatherResolver::new(
        &model.stations,
        &model.temperatures,
        assumptions.climate_change.as_ref(),
        assumptions.base_yr,
    );
    let weather = resolver.resolve(region.longitude, region.latitude, year)?;

    let sectors = region.fuels.keys().map(|(sector, _)| sector).unique();
    let degree_days: IndexMap<SectorID, DegreeDays> = sectors
        .map(|sector| {
            let dd = DegreeDays::new(
                &weather,
                &assumptions.base_temperatures(sector),
                assumptions.base_yr,
                year,
                assumptions.end_yr,
                &assumptions.diffusion,
            );
            (sector.clone(), dd)
        })
        .collect();

    let profiles = build_region_profiles(
        &model.profile_assignments,
        &model.profile_inputs,
        &model.enduses,
        &degree_days,
    )?;

    let mut results = ResultStore::default();
    let mut stocks: IndexMap<&SectorID, TechnologyStock> = IndexMap::new();
    for ((sector, enduse_id), fuel_by) in &region.fuels {
        let enduse = &model.enduses[enduse_id];
        let sector_dd = &degree_days[sector];

        // Heat pump efficiencies depend on the sector's heating base temperature
        if !stocks.contains_key(sector) {
            let conditions = StockConditions {
                temp_by: &weather.temp_by,
                temp_cy: &weather.temp_cy,
                t_base_by: sector_dd.t_base_heating_by,
                t_base_cy: sector_dd.t_base_heating_cy,
                base_yr: assumptions.base_yr,
                curr_yr: year,
                diffusion: &assumptions.diffusion,
                heat_pump_slope: assumptions.heat_pump_slope,
                num_fueltypes: model.num_fueltypes(),
            };
            let ids = region
                .fuels
                .keys()
                .filter(|(s, _)| s == sector)
                .flat_map(|(_, id)| &model.enduses[id].technologies);
            let stock = TechnologyStock::build(&model.technologies, ids, &conditions)?;
            stocks.insert(sector, stock);
        }

        let ctx = EnduseContext {
            region: &region.id,
            sector,
            curr_yr: year,
            assumptions,
            degree_days: sector_dd,
            technologies: &stocks[sector],
            profiles: &profiles,
            switches: &model.switches,
            diffusions: &model.diffusions,
            drivers: &model.drivers,
            prices: &model.prices,
        };
        let result = decompose_enduse(&ctx, enduse, fuel_by)
            .with_context(|| format!("Could not decompose enduse {enduse_id} (sector {sector})"))?;

        let key = ResultKey {
            region: region.id.clone(),
            year,
            sector: sector.clone(),
            enduse: enduse_id.clone(),
        };
        results.insert(key, result)?;
    }

    Ok(results)
}
