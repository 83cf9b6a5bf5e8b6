//! Load profiles describe how yearly demand is distributed over days and hours.
//!
//! A [`LoadProfileStock`] belongs to one region and maps each (enduse, sector, technology) to
//! exactly one [`LoadProfile`].
use crate::calendar::{DAYS_IN_YEAR, HOURS_IN_DAY};
use crate::degree_days::{DegreeDays, peak_day, yd_shape};
use crate::diffusion::safe_div;
use crate::enduse::{EnduseID, EnduseMap, SectorID};
use crate::error::DemandError;
use crate::technology::{PLACEHOLDER_TECHNOLOGY, TechnologyID};
use anyhow::{Context, Result, bail, ensure};
use float_cmp::approx_eq;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayViewD, Axis};
use std::collections::HashMap;

/// Tolerance for checking that a shape sums to one
const SHAPE_SUM_TOLERANCE: f64 = 1e-9;

/// The key for looking up a load profile
pub type ProfileKey = (EnduseID, SectorID, TechnologyID);

/// Which representation of a load profile to retrieve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    /// Share of yearly demand on each day, shape (365)
    Yd,
    /// Share of yearly demand in each hour, shape (365, 24)
    Yh,
    /// Share of each day's demand in each hour, shape (365, 24)
    YDh,
    /// Share of the peak day's demand in each hour, shape (24)
    PeakDh,
}

/// A normalised load profile
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfile {
    /// Identifier assigned by the stock
    pub id: usize,
    /// Share of yearly demand on each day
    pub shape_yd: Array1<f64>,
    /// Share of yearly demand in each hour. Sums to one.
    pub shape_yh: Array2<f64>,
    /// Share of each day's demand in each hour. Each row sums to one, or to zero for days without
    /// demand.
    pub shape_y_dh: Array2<f64>,
    /// Share of the peak day's demand in each hour
    pub shape_peak_dh: Array1<f64>,
}

/// Normalise each row of an array so that it sums to one. Rows summing to zero are left as zero.
pub fn row_normalise(shape: &Array2<f64>) -> Array2<f64> {
    let mut normalised = shape.clone();
    for mut row in normalised.rows_mut() {
        let total = row.sum();
        row.mapv_inplace(|value| safe_div(value, total));
    }

    normalised
}

/// Combine a daily shape with per-day hourly shapes into a yearly hourly shape.
///
/// If `peak` is given, the hourly shape of the peak day is replaced by the given shape.
pub fn compose_shape_yh(
    shape_yd: &Array1<f64>,
    shape_y_dh: &Array2<f64>,
    peak: Option<(usize, &Array1<f64>)>,
) -> Array2<f64> {
    let mut shape_yh = shape_y_dh * &shape_yd.view().insert_axis(Axis(1));
    if let Some((day, peak_dh)) = peak {
        shape_yh.row_mut(day).assign(&(peak_dh * shape_yd[day]));
    }

    shape_yh
}

/// Check that a shape has only finite, non-negative values and sums to one
fn check_shape_sum(values: ArrayViewD<f64>, name: &str) -> Result<()> {
    ensure!(
        values.iter().all(|v| v.is_finite() && *v >= 0.0),
        "{name} must contain only finite, non-negative values"
    );
    let total = values.sum();
    ensure!(
        approx_eq!(f64, total, 1.0, epsilon = SHAPE_SUM_TOLERANCE),
        "{name} must sum to one (sum: {total})"
    );

    Ok(())
}

/// The load profiles of one region
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadProfileStock {
    profiles: Vec<LoadProfile>,
    index: HashMap<ProfileKey, usize>,
}

impl LoadProfileStock {
    /// Add a profile which applies to every combination of the given technologies, enduses and
    /// sectors.
    ///
    /// # Returns
    ///
    /// The ID of the new profile or an error if the shapes are invalid or any of the keys already
    /// has a profile.
    pub fn add(
        &mut self,
        technologies: &[TechnologyID],
        enduses: &[EnduseID],
        sectors: &[SectorID],
        shape_yd: Array1<f64>,
        shape_yh: Array2<f64>,
        shape_peak_dh: Array1<f64>,
    ) -> Result<usize> {
        ensure!(
            shape_yd.len() == DAYS_IN_YEAR,
            "shape_yd must have {DAYS_IN_YEAR} values"
        );
        ensure!(
            shape_yh.dim() == (DAYS_IN_YEAR, HOURS_IN_DAY),
            "shape_yh must have shape ({DAYS_IN_YEAR}, {HOURS_IN_DAY})"
        );
        ensure!(
            shape_peak_dh.len() == HOURS_IN_DAY,
            "shape_peak_dh must have {HOURS_IN_DAY} values"
        );
        check_shape_sum(shape_yd.view().into_dyn(), "shape_yd")?;
        check_shape_sum(shape_yh.view().into_dyn(), "shape_yh")?;
        check_shape_sum(shape_peak_dh.view().into_dyn(), "shape_peak_dh")?;

        let keys = enduses
            .iter()
            .cartesian_product(sectors)
            .cartesian_product(technologies)
            .map(|((enduse, sector), technology)| {
                (enduse.clone(), sector.clone(), technology.clone())
            })
            .collect_vec();
        for key in &keys {
            let (enduse, sector, technology) = key;
            ensure!(
                !self.index.contains_key(key),
                DemandError::configuration(format!(
                    "More than one load profile for enduse {enduse}, sector {sector}, \
                     technology {technology}"
                ))
            );
        }

        let id = self.profiles.len();
        self.index.extend(keys.into_iter().map(|key| (key, id)));

        let shape_y_dh = row_normalise(&shape_yh);
        self.profiles.push(LoadProfile {
            id,
            shape_yd,
            shape_yh,
            shape_y_dh,
            shape_peak_dh,
        });

        Ok(id)
    }

    /// Get the profile for an (enduse, sector, technology)
    pub fn get_profile(
        &self,
        enduse: &EnduseID,
        sector: &SectorID,
        technology: &TechnologyID,
    ) -> Result<&LoadProfile> {
        let key = (enduse.clone(), sector.clone(), technology.clone());
        match self.index.get(&key) {
            Some(id) => Ok(&self.profiles[*id]),
            None => bail!(DemandError::ProfileMissing {
                enduse: enduse.to_string(),
                sector: sector.to_string(),
                technology: technology.to_string(),
            }),
        }
    }

    /// Get one representation of the profile for an (enduse, sector, technology)
    pub fn get(
        &self,
        enduse: &EnduseID,
        sector: &SectorID,
        technology: &TechnologyID,
        kind: ProfileKind,
    ) -> Result<ArrayViewD<'_, f64>> {
        let profile = self.get_profile(enduse, sector, technology)?;
        let shape = match kind {
            ProfileKind::Yd => profile.shape_yd.view().into_dyn(),
            ProfileKind::Yh => profile.shape_yh.view().into_dyn(),
            ProfileKind::YDh => profile.shape_y_dh.view().into_dyn(),
            ProfileKind::PeakDh => profile.shape_peak_dh.view().into_dyn(),
        };

        Ok(shape)
    }

    /// The number of profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether there are no profiles
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// A load profile as read from file, before being fitted to a region's weather
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileInput {
    /// Share of each day's demand in each hour, shape (365, 24)
    pub shape_y_dh: Array2<f64>,
    /// Share of yearly demand on each day, shape (365)
    pub shape_yd: Array1<f64>,
    /// Share of the peak day's demand in each hour, shape (24)
    pub shape_peak_dh: Array1<f64>,
}

impl ProfileInput {
    /// Create a [`ProfileInput`] from yearly hourly values (any units).
    ///
    /// If no peak-day shape is given, the hourly shape of the day with the highest demand is used.
    pub fn from_hourly(values: &Array2<f64>, peak_dh: Option<Array1<f64>>) -> Result<Self> {
        ensure!(
            values.dim() == (DAYS_IN_YEAR, HOURS_IN_DAY),
            "Expected hourly values with shape ({DAYS_IN_YEAR}, {HOURS_IN_DAY})"
        );
        ensure!(
            values.iter().all(|v| v.is_finite() && *v >= 0.0),
            "Load profile values must be finite and non-negative"
        );
        let total = values.sum();
        ensure!(total > 0.0, "Load profile values cannot all be zero");

        let shape_y_dh = row_normalise(values);
        let shape_yd = values.sum_axis(Axis(1)) / total;
        let shape_peak_dh = match peak_dh {
            Some(peak_dh) => {
                ensure!(
                    peak_dh.len() == HOURS_IN_DAY,
                    "Expected {HOURS_IN_DAY} values for the peak day"
                );
                let peak_total = peak_dh.sum();
                ensure!(
                    peak_dh.iter().all(|v| v.is_finite() && *v >= 0.0) && peak_total > 0.0,
                    "Peak day values must be non-negative and not all zero"
                );
                peak_dh / peak_total
            }
            None => shape_y_dh.row(peak_day(&shape_yd)).to_owned(),
        };

        Ok(Self {
            shape_y_dh,
            shape_yd,
            shape_peak_dh,
        })
    }
}

/// Declares which (enduse, sectors, technologies) a profile applies to
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileAssignment {
    /// Name of the profile
    pub profile: String,
    /// The enduse
    pub enduse: EnduseID,
    /// The sectors
    pub sectors: Vec<SectorID>,
    /// The technologies. If empty, the profile applies to all of the enduse's technologies.
    pub technologies: Vec<TechnologyID>,
}

/// The technologies a profile assignment applies to
fn assigned_technologies(assignment: &ProfileAssignment, enduses: &EnduseMap) -> Vec<TechnologyID> {
    if !assignment.technologies.is_empty() {
        return assignment.technologies.clone();
    }

    match enduses.get(&assignment.enduse) {
        Some(enduse) if enduse.has_technologies() => enduse.technologies.clone(),
        _ => vec![TechnologyID::new(PLACEHOLDER_TECHNOLOGY)],
    }
}

/// Build the load profile stock of a region.
///
/// Profiles of temperature-driven enduses take their daily shape from the sector's current-year
/// degree days, with the peak-day shape inserted on the day with most degree days. Other profiles
/// are used as read from file.
///
/// # Arguments
///
/// * `assignments` - Which profiles apply to which enduses, sectors and technologies
/// * `inputs` - Profiles read from file, keyed by name
/// * `enduses` - All enduses
/// * `degree_days` - The region's degree days for each sector
pub fn build_region_profiles(
    assignments: &[ProfileAssignment],
    inputs: &IndexMap<String, ProfileInput>,
    enduses: &EnduseMap,
    degree_days: &IndexMap<SectorID, DegreeDays>,
) -> Result<LoadProfileStock> {
    let mut stock = LoadProfileStock::default();
    for assignment in assignments {
        let input = inputs
            .get(&assignment.profile)
            .with_context(|| format!("Unknown load profile: {}", assignment.profile))?;
        let kind = enduses
            .get(&assignment.enduse)
            .map(|enduse| enduse.kind)
            .unwrap_or_default();
        let technologies = assigned_technologies(assignment, enduses);

        for sector in &assignment.sectors {
            let dd_cy = degree_days
                .get(sector)
                .and_then(|dd| dd.for_kind(kind))
                .filter(|dd| dd.sum() > 0.0);

            let (shape_yd, shape_yh) = match dd_cy {
                Some(dd) => {
                    let shape_yd = yd_shape(dd);
                    let peak = (peak_day(dd), &input.shape_peak_dh);
                    let shape_yh = compose_shape_yh(&shape_yd, &input.shape_y_dh, Some(peak));
                    (shape_yd, shape_yh)
                }
                None => {
                    let shape_yh = compose_shape_yh(&input.shape_yd, &input.shape_y_dh, None);
                    (input.shape_yd.clone(), shape_yh)
                }
            };

            stock
                .add(
                    &technologies,
                    std::slice::from_ref(&assignment.enduse),
                    std::slice::from_ref(sector),
                    shape_yd,
                    shape_yh,
                    input.shape_peak_dh.clone(),
                )
                .with_context(|| {
                    format!(
                        "Invalid load profile {} for enduse {}, sector {sector}",
                        assignment.profile, assignment.enduse
                    )
                })?;
        }
    }

    Ok(stock)
}
