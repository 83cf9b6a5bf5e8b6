//! Code for reading technologies from CSV files.
use super::*;
use crate::diffusion::DiffusionMethod;
use crate::error::DemandError;
use crate::fueltype::FuelTypeLookup;
use crate::technology::{
    HybridTechnology, Technology, TechnologyID, TechnologyKind, TechnologyMap, TechnologyType,
};
use anyhow::bail;
use indexmap::IndexMap;
use serde::Deserialize;

const TECHNOLOGIES_FILE_NAME: &str = "technologies.csv";
const HYBRID_TECHNOLOGIES_FILE_NAME: &str = "hybrid_technologies.csv";

/// The fueltype given for hybrid technologies in the technologies file
const HYBRID_FUELTYPE: &str = "hybrid";

#[derive(Deserialize, PartialEq, Debug)]
struct TechnologyRaw {
    id: String,
    fueltype: String,
    #[serde(default)]
    tech_type: TechnologyType,
    eff_by: f64,
    eff_ey: f64,
    year_eff_ey: u32,
    #[serde(deserialize_with = "deserialise_proportion")]
    eff_achieved: f64,
    diff_method: DiffusionMethod,
    market_entry: u32,
}

#[derive(Deserialize, PartialEq, Debug)]
struct HybridTechnologyRaw {
    id: String,
    tech_low: String,
    tech_high: String,
    cutoff_temp: f64,
}

/// Read technologies from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `fueltypes` - The fueltype lookup
/// * `end_yr` - The last year of the scenario
///
/// # Returns
///
/// The technologies, keyed by ID, or an error.
pub fn read_technologies(
    model_dir: &Path,
    fueltypes: &FuelTypeLookup,
    end_yr: u32,
) -> Result<TechnologyMap> {
    let hybrid_file_path = model_dir.join(HYBRID_TECHNOLOGIES_FILE_NAME);
    let hybrids_csv = read_csv_optional(&hybrid_file_path)?;
    let hybrids = read_hybrids_from_iter(hybrids_csv)
        .with_context(|| input_err_msg(&hybrid_file_path))?;

    let file_path = model_dir.join(TECHNOLOGIES_FILE_NAME);
    let technologies_csv = read_csv(&file_path)?;
    read_technologies_from_iter(technologies_csv, hybrids, fueltypes, end_yr)
        .with_context(|| input_err_msg(&file_path))
}

fn read_hybrids_from_iter<I>(iter: I) -> Result<IndexMap<String, HybridTechnologyRaw>>
where
    I: Iterator<Item = HybridTechnologyRaw>,
{
    let mut hybrids = IndexMap::new();
    for hybrid in iter {
        ensure!(
            hybrid.cutoff_temp.is_finite(),
            "Cut-off temperature for hybrid technology {} must be finite",
            hybrid.id
        );
        let id = hybrid.id.clone();
        ensure!(
            hybrids.insert(id.clone(), hybrid).is_none(),
            "Duplicate hybrid technology: {id}"
        );
    }

    Ok(hybrids)
}

fn read_technologies_from_iter<I>(
    iter: I,
    mut hybrids: IndexMap<String, HybridTechnologyRaw>,
    fueltypes: &FuelTypeLookup,
    end_yr: u32,
) -> Result<TechnologyMap>
where
    I: Iterator<Item = TechnologyRaw>,
{
    let mut technologies = TechnologyMap::new();
    for raw in iter {
        let id = TechnologyID::from(raw.id.as_str());
        ensure!(
            raw.eff_by.is_finite()
                && raw.eff_by > 0.0
                && raw.eff_ey.is_finite()
                && raw.eff_ey > 0.0,
            DemandError::configuration(format!(
                "Efficiencies of technology {id} must be positive numbers"
            ))
        );
        ensure!(
            raw.market_entry <= end_yr,
            DemandError::configuration(format!(
                "Market entry of technology {id} is after the end year ({end_yr})"
            ))
        );

        let kind = if raw.fueltype == HYBRID_FUELTYPE {
            let Some(hybrid) = hybrids.shift_remove(&raw.id) else {
                bail!(DemandError::configuration(format!(
                    "Hybrid technology {id} is not defined in {HYBRID_TECHNOLOGIES_FILE_NAME}"
                )));
            };
            TechnologyKind::Hybrid(HybridTechnology {
                tech_low: hybrid.tech_low.as_str().into(),
                tech_high: hybrid.tech_high.as_str().into(),
                cutoff_temp: hybrid.cutoff_temp,
            })
        } else {
            TechnologyKind::Single {
                fueltype: fueltypes.get_by_name(&raw.fueltype)?,
                tech_type: raw.tech_type,
            }
        };

        let technology = Technology {
            id: id.clone(),
            kind,
            eff_by: raw.eff_by,
            eff_ey: raw.eff_ey,
            year_eff_ey: raw.year_eff_ey,
            eff_achieved: raw.eff_achieved,
            diff_method: raw.diff_method,
            market_entry: raw.market_entry,
        };
        ensure!(
            technologies.insert(id.clone(), technology).is_none(),
            "Duplicate technology: {id}"
        );
    }

    if let Some(id) = hybrids.keys().next() {
        bail!(DemandError::configuration(format!(
            "Hybrid technology {id} must have the fueltype \"{HYBRID_FUELTYPE}\" in \
             {TECHNOLOGIES_FILE_NAME}"
        )));
    }
    check_hybrid_components(&technologies)?;

    Ok(technologies)
}

/// Check that hybrid technologies are composed of known, single-fueltype technologies
fn check_hybrid_components(technologies: &TechnologyMap) -> Result<()> {
    for technology in technologies.values() {
        let TechnologyKind::Hybrid(hybrid) = &technology.kind else {
            continue;
        };

        for component in [&hybrid.tech_low, &hybrid.tech_high] {
            match technologies.get(component).map(|tech| &tech.kind) {
                Some(TechnologyKind::Single { .. }) => {}
                Some(TechnologyKind::Hybrid(_)) => bail!(DemandError::configuration(format!(
                    "Hybrid technology {} cannot be composed of another hybrid ({component})",
                    technology.id
                ))),
                None => bail!(DemandError::configuration(format!(
                    "Hybrid technology {} references unknown technology {component}",
                    technology.id
                ))),
            }
        }
    }

    Ok(())
}
