//! Code for reading enduses and their base-year technology shares from CSV files.
use super::*;
use crate::enduse::{Enduse, EnduseID, EnduseKind, EnduseMap};
use crate::error::DemandError;
use crate::fueltype::{FuelType, FuelTypeLookup};
use crate::technology::{TechnologyID, TechnologyKind, TechnologyMap};
use anyhow::bail;
use float_cmp::approx_eq;
use serde::Deserialize;
use std::collections::BTreeMap;

const ENDUSES_FILE_NAME: &str = "enduses.csv";
const FUEL_TECH_SHARES_FILE_NAME: &str = "fuel_tech_shares.csv";

/// Tolerance for checking that the technology shares of a fueltype sum to one
const SHARE_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Deserialize, PartialEq, Debug)]
struct EnduseRaw {
    id: String,
    #[serde(default)]
    kind: EnduseKind,
    #[serde(default)]
    drivers: String,
}

#[derive(Deserialize, PartialEq, Debug)]
struct FuelTechShareRaw {
    enduse: String,
    fueltype: String,
    technology: String,
    #[serde(deserialize_with = "deserialise_proportion")]
    share: f64,
}

/// Read enduses and their base-year fuel shares per technology.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `fueltypes` - The fueltype lookup
/// * `technologies` - All technologies
///
/// # Returns
///
/// The enduses, keyed by ID, or an error.
pub fn read_enduses(
    model_dir: &Path,
    fueltypes: &FuelTypeLookup,
    technologies: &TechnologyMap,
) -> Result<EnduseMap> {
    let file_path = model_dir.join(ENDUSES_FILE_NAME);
    let enduses_csv = read_csv(&file_path)?;
    let mut enduses =
        read_enduses_from_iter(enduses_csv).with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(FUEL_TECH_SHARES_FILE_NAME);
    let shares_csv = read_csv_optional(&file_path)?;
    read_fuel_tech_shares_from_iter(shares_csv, &mut enduses, fueltypes, technologies)
        .with_context(|| input_err_msg(&file_path))?;

    Ok(enduses)
}

fn read_enduses_from_iter<I>(iter: I) -> Result<EnduseMap>
where
    I: Iterator<Item = EnduseRaw>,
{
    let mut enduses = EnduseMap::new();
    for raw in iter {
        let id = EnduseID::from(raw.id.as_str());
        let enduse = Enduse {
            id: id.clone(),
            kind: raw.kind,
            drivers: parse_list(&raw.drivers),
            ..Default::default()
        };
        ensure!(
            enduses.insert(id.clone(), enduse).is_none(),
            "Duplicate enduse: {id}"
        );
    }

    Ok(enduses)
}

/// The fueltypes a technology may take a share of
fn allowed_fueltypes(technologies: &TechnologyMap, id: &TechnologyID) -> Result<Vec<FuelType>> {
    let Some(technology) = technologies.get(id) else {
        bail!(DemandError::configuration(format!("Unknown technology: {id}")));
    };

    Ok(match &technology.kind {
        TechnologyKind::Single { fueltype, .. } => vec![*fueltype],
        TechnologyKind::Hybrid(hybrid) => [&hybrid.tech_low, &hybrid.tech_high]
            .into_iter()
            .filter_map(|component| technologies.get(component)?.fueltype())
            .collect(),
    })
}

fn read_fuel_tech_shares_from_iter<I>(
    iter: I,
    enduses: &mut EnduseMap,
    fueltypes: &FuelTypeLookup,
    technologies: &TechnologyMap,
) -> Result<()>
where
    I: Iterator<Item = FuelTechShareRaw>,
{
    for raw in iter {
        let Some(enduse) = enduses.get_mut(raw.enduse.as_str()) else {
            bail!(DemandError::configuration(format!(
                "Unknown enduse: {}",
                raw.enduse
            )));
        };
        let fueltype = fueltypes.get_by_name(&raw.fueltype)?;
        let technology = TechnologyID::from(raw.technology.as_str());
        ensure!(
            allowed_fueltypes(technologies, &technology)?.contains(&fueltype),
            DemandError::configuration(format!(
                "Technology {technology} cannot use fueltype {}",
                raw.fueltype
            ))
        );

        ensure!(
            enduse
                .fuel_tech_shares
                .insert((fueltype, technology.clone()), raw.share)
                .is_none(),
            "Duplicate share for enduse {}, fueltype {}, technology {technology}",
            raw.enduse,
            raw.fueltype
        );
        enduse.add_technologies([technology]);
    }

    for enduse in enduses.values() {
        check_share_sums(enduse, fueltypes)?;
    }

    Ok(())
}

/// Check that the shares of each fueltype of an enduse sum to one
fn check_share_sums(enduse: &Enduse, fueltypes: &FuelTypeLookup) -> Result<()> {
    let mut sums = BTreeMap::new();
    for ((fueltype, _), share) in &enduse.fuel_tech_shares {
        *sums.entry(*fueltype).or_insert(0.0) += share;
    }

    for (fueltype, sum) in sums {
        ensure!(
            approx_eq!(f64, sum, 1.0, epsilon = SHARE_SUM_TOLERANCE),
            DemandError::configuration(format!(
                "Technology shares for enduse {}, fueltype {} sum to {sum} instead of 1",
                enduse.id,
                fueltypes.name(fueltype)
            ))
        );
    }

    Ok(())
}
