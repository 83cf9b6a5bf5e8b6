//! The module responsible for writing output data to disk.
use crate::calendar::timestep_label;
use crate::enduse::{EnduseID, SectorID};
use crate::fueltype::FuelTypeLookup;
use crate::region::RegionID;
use crate::results::ResultStore;
use anyhow::{Context, Result, ensure};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "energy_demand_results";

/// The output file name for peak-hour demand
const PEAK_H_FILE_NAME: &str = "peak_h.csv";

/// The units of all fuel values in output files
const FUEL_UNITS: &str = "GWh";

/// Get the default output directory for the model specified at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory.
///
/// If the directory already exists and is not empty, its contents are deleted if `allow_overwrite`
/// is true, otherwise an error is returned.
///
/// # Returns
///
/// Whether an existing, non-empty directory was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if output_dir.is_dir() {
        if fs::read_dir(output_dir)?.next().is_none() {
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder {} already exists and is not empty. Use the --overwrite option to \
             replace its contents.",
            output_dir.display()
        );
        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in an hourly fuel CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct FuelRow {
    region: RegionID,
    timestep: String,
    value: f64,
    units: String,
}

/// Represents a row in the peak-hour CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct PeakRow {
    year: u32,
    region: RegionID,
    sector: SectorID,
    enduse: EnduseID,
    fueltype: String,
    peak_day: usize,
    peak_h: f64,
}

/// The file name for the hourly fuel of one fueltype in one year
fn fuel_yh_file_name(fueltype: &str, year: u32) -> String {
    format!("fuel_yh_{fueltype}_{year}.csv")
}

/// Write the hourly fuel of each region to one CSV file per fueltype for the given year
pub fn write_fuel_yh<'a, I>(
    output_path: &Path,
    fueltypes: &FuelTypeLookup,
    regions: I,
    results: &ResultStore,
    year: u32,
) -> Result<()>
where
    I: IntoIterator<Item = &'a RegionID>,
{
    let region_fuels = regions
        .into_iter()
        .map(|region| (region, results.region_fuel_yh(region, year, fueltypes.len())))
        .collect::<Vec<_>>();

    for (fueltype, name) in fueltypes.iter() {
        let file_path = output_path.join(fuel_yh_file_name(name, year));
        let mut writer = csv::Writer::from_path(&file_path)?;
        for (region, fuel_yh) in &region_fuels {
            let fuel = fuel_yh.index_axis(Axis(0), fueltype.index());
            for ((day, hour), value) in fuel.indexed_iter() {
                let row = FuelRow {
                    region: (*region).clone(),
                    timestep: timestep_label(day, hour),
                    value: *value,
                    units: FUEL_UNITS.into(),
                };
                writer.serialize(row)?;
            }
        }
        writer
            .flush()
            .with_context(|| format!("Could not write {}", file_path.display()))?;
    }

    Ok(())
}

/// Write the peak-hour demand of every result to a CSV file.
///
/// Fueltypes without demand on the peak day are omitted.
pub fn write_peaks(
    output_path: &Path,
    fueltypes: &FuelTypeLookup,
    results: &ResultStore,
) -> Result<()> {
    let file_path = output_path.join(PEAK_H_FILE_NAME);
    let mut writer = csv::Writer::from_path(&file_path)?;
    for (key, result) in results.iter() {
        for (fueltype, name) in fueltypes.iter() {
            let peak_h = result.fuel_peak_h[fueltype.index()];
            if peak_h == 0.0 {
                continue;
            }

            writer.serialize(PeakRow {
                year: key.year,
                region: key.region.clone(),
                sector: key.sector.clone(),
                enduse: key.enduse.clone(),
                fueltype: name.into(),
                peak_day: result.peak_day,
                peak_h,
            })?;
        }
    }
    writer
        .flush()
        .with_context(|| format!("Could not write {}", file_path.display()))?;

    Ok(())
}

/// Write all results to CSV files
///
/// # Arguments
///
/// * `output_path` - Folder where files will be saved
/// * `fueltypes` - The fueltype lookup
/// * `regions` - The regions, in the order in which they are written
/// * `years` - The simulated years
/// * `results` - The results to write
pub fn write_results<'a, I>(
    output_path: &Path,
    fueltypes: &FuelTypeLookup,
    regions: I,
    years: &[u32],
    results: &ResultStore,
) -> Result<()>
where
    I: IntoIterator<Item = &'a RegionID> + Clone,
{
    for &year in years {
        write_fuel_yh(output_path, fueltypes, regions.clone(), results, year)?;
    }
    write_peaks(output_path, fueltypes, results)
}
