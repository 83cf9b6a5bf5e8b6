//! Code for reading load profiles and their assignments to enduses.
use super::*;
use crate::calendar::{DAYS_IN_YEAR, HOURS_IN_DAY};
use crate::enduse::{EnduseMap, SectorID};
use crate::error::DemandError;
use crate::load_profile::{ProfileAssignment, ProfileInput};
use crate::technology::{PLACEHOLDER_TECHNOLOGY, TechnologyID};
use anyhow::bail;
use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use serde::Deserialize;

const LOAD_PROFILES_FILE_NAME: &str = "load_profiles.csv";

/// The folder containing one file of hourly values per profile
const LOAD_PROFILES_DIR_NAME: &str = "load_profiles";

/// Suffix of the optional file giving the peak-day shape of a profile
const PEAK_SUFFIX: &str = "_peak";

#[derive(Deserialize, PartialEq, Debug)]
struct ProfileAssignmentRaw {
    profile: String,
    enduse: String,
    sectors: String,
    #[serde(default)]
    technologies: String,
}

#[derive(Deserialize, PartialEq, Debug)]
struct HourlyValueRaw {
    day: usize,
    hour: usize,
    value: f64,
}

#[derive(Deserialize, PartialEq, Debug)]
struct PeakValueRaw {
    hour: usize,
    value: f64,
}

/// Read load profile assignments and the profiles they refer to.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `enduses` - All enduses
///
/// # Returns
///
/// The assignments and the profiles read from file, keyed by name.
pub fn read_load_profiles(
    model_dir: &Path,
    enduses: &EnduseMap,
) -> Result<(Vec<ProfileAssignment>, IndexMap<String, ProfileInput>)> {
    let file_path = model_dir.join(LOAD_PROFILES_FILE_NAME);
    let assignments_csv = read_csv(&file_path)?;
    let assignments = read_assignments_from_iter(assignments_csv, enduses)
        .with_context(|| input_err_msg(&file_path))?;

    let mut inputs = IndexMap::new();
    for name in assignments.iter().map(|a| &a.profile).unique() {
        let input = read_profile_input(&model_dir.join(LOAD_PROFILES_DIR_NAME), name)?;
        inputs.insert(name.clone(), input);
    }

    Ok((assignments, inputs))
}

fn read_assignments_from_iter<I>(iter: I, enduses: &EnduseMap) -> Result<Vec<ProfileAssignment>>
where
    I: Iterator<Item = ProfileAssignmentRaw>,
{
    iter.map(|raw| -> Result<_> {
        let Some(enduse) = enduses.get(raw.enduse.as_str()) else {
            bail!(DemandError::configuration(format!(
                "Load profile {} assigned to unknown enduse {}",
                raw.profile, raw.enduse
            )));
        };
        let sectors = parse_list(&raw.sectors);
        ensure!(
            !sectors.is_empty(),
            DemandError::configuration(format!(
                "Load profile {} must be assigned to at least one sector",
                raw.profile
            ))
        );

        let technologies = parse_list(&raw.technologies)
            .into_iter()
            .map(TechnologyID::from)
            .collect_vec();
        for technology in &technologies {
            ensure!(
                enduse.technologies.contains(technology)
                    || (!enduse.has_technologies() && &*technology.0 == PLACEHOLDER_TECHNOLOGY),
                DemandError::configuration(format!(
                    "Load profile {} assigned to technology {technology}, which is not used by \
                     enduse {}",
                    raw.profile, raw.enduse
                ))
            );
        }

        Ok(ProfileAssignment {
            profile: raw.profile,
            enduse: enduse.id.clone(),
            sectors: sectors.into_iter().map(SectorID::from).collect(),
            technologies,
        })
    })
    .try_collect()
}

/// Read the hourly values of a profile, and its peak-day shape if there is one
fn read_profile_input(profiles_dir: &Path, name: &str) -> Result<ProfileInput> {
    let file_path = profiles_dir.join(format!("{name}.csv"));
    let values_csv = read_csv(&file_path)?;
    let values =
        read_hourly_values_from_iter(values_csv).with_context(|| input_err_msg(&file_path))?;

    let peak_file_path = profiles_dir.join(format!("{name}{PEAK_SUFFIX}.csv"));
    let peak_dh = if peak_file_path.exists() {
        let peak_csv = read_csv(&peak_file_path)?;
        Some(read_peak_values_from_iter(peak_csv).with_context(|| input_err_msg(&peak_file_path))?)
    } else {
        None
    };

    ProfileInput::from_hourly(&values, peak_dh)
        .with_context(|| format!("Invalid load profile {name}"))
}

fn read_hourly_values_from_iter<I>(iter: I) -> Result<Array2<f64>>
where
    I: Iterator<Item = HourlyValueRaw>,
{
    let mut values = Array2::from_elem((DAYS_IN_YEAR, HOURS_IN_DAY), f64::NAN);
    for raw in iter {
        ensure!(
            raw.day < DAYS_IN_YEAR && raw.hour < HOURS_IN_DAY,
            "Invalid timestep: day {}, hour {}",
            raw.day,
            raw.hour
        );
        let value = &mut values[[raw.day, raw.hour]];
        ensure!(
            value.is_nan(),
            "Duplicate value for day {}, hour {}",
            raw.day,
            raw.hour
        );
        *value = raw.value;
    }
    ensure!(
        values.iter().all(|v| !v.is_nan()),
        "A value must be given for every hour of the year"
    );

    Ok(values)
}

fn read_peak_values_from_iter<I>(iter: I) -> Result<Array1<f64>>
where
    I: Iterator<Item = PeakValueRaw>,
{
    let mut values = Array1::from_elem(HOURS_IN_DAY, f64::NAN);
    for raw in iter {
        ensure!(raw.hour < HOURS_IN_DAY, "Invalid hour: {}", raw.hour);
        ensure!(values[raw.hour].is_nan(), "Duplicate value for hour {}", raw.hour);
        values[raw.hour] = raw.value;
    }
    ensure!(
        values.iter().all(|v| !v.is_nan()),
        "A value must be given for every hour of the peak day"
    );

    Ok(values)
}
