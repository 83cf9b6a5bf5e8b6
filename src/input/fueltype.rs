//! Code for reading the fueltype lookup from a CSV file.
use super::*;
use crate::fueltype::FuelTypeLookup;
use log::info;
use serde::Deserialize;

const FUELTYPES_FILE_NAME: &str = "fueltypes.csv";

#[derive(Deserialize, PartialEq, Debug)]
struct FuelTypeRaw {
    name: String,
}

/// Read the fueltypes from the model directory.
///
/// Fueltypes are assigned IDs in the order they appear in the file. If there is no fueltypes file,
/// the default fueltypes are used.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn read_fueltypes(model_dir: &Path) -> Result<FuelTypeLookup> {
    let file_path = model_dir.join(FUELTYPES_FILE_NAME);
    if !file_path.exists() {
        info!("No fueltypes file provided; using default fueltypes");
        return Ok(FuelTypeLookup::default());
    }

    let fueltypes_csv = read_csv::<FuelTypeRaw>(&file_path)?;
    FuelTypeLookup::new(fueltypes_csv.map(|raw| raw.name))
        .with_context(|| input_err_msg(&file_path))
}
