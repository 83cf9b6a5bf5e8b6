//! Common code for writing model directories in integration tests.
use energy_demand::calendar::{DAYS_IN_YEAR, HOURS_IN_DAY};
use energy_demand::input::load_model;
use energy_demand::model::Model;
use energy_demand::results::{EnduseResult, ResultKey};
use energy_demand::simulation::simulate_region;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

/// The single region of every test model
pub const REGION: &str = "GBR";

/// The single weather station of every test model
pub const STATION: &str = "station1";

/// The sector used by every test model
pub const SECTOR: &str = "residential";

/// A model directory in a temporary folder.
///
/// Every model has one region and one weather station at the same location.
pub struct TestModel {
    dir: TempDir,
}

// Not every test file uses every helper
#[allow(dead_code)]
impl TestModel {
    /// Create a model directory with the given `model.toml` contents
    pub fn new(model_toml: &str) -> Self {
        let model = Self {
            dir: tempdir().unwrap(),
        };
        model.write("model.toml", model_toml);
        model.write("regions.csv", &format!("id,longitude,latitude\n{REGION},-1.5,52.5\n"));
        model.write("stations.csv", &format!("id,longitude,latitude\n{STATION},-1.4,52.4\n"));
        model
    }

    /// Path to the model directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file into the model directory
    pub fn write(&self, file_name: &str, contents: &str) {
        let file_path = self.path().join(file_name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(file_path, contents).unwrap();
    }

    /// Write the station's hourly temperatures for a year
    pub fn write_temperatures<F>(&self, year: u32, temperature: F)
    where
        F: Fn(usize, usize) -> f64,
    {
        let mut contents = String::new();
        for day in 0..DAYS_IN_YEAR {
            let row = (0..HOURS_IN_DAY)
                .map(|hour| temperature(day, hour).to_string())
                .collect::<Vec<_>>()
                .join(",");
            writeln!(contents, "{row}").unwrap();
        }
        self.write(&format!("temperatures/{STATION}_{year}.csv"), &contents);
    }

    /// Write a load profile with the same value in every hour
    pub fn write_flat_profile(&self, name: &str) {
        self.write_profile(name, |_, _| 1.0);
    }

    /// Write a load profile with the given value for each (day, hour)
    pub fn write_profile<F>(&self, name: &str, value: F)
    where
        F: Fn(usize, usize) -> f64,
    {
        let mut contents = "day,hour,value\n".to_string();
        for day in 0..DAYS_IN_YEAR {
            for hour in 0..HOURS_IN_DAY {
                writeln!(contents, "{day},{hour},{}", value(day, hour)).unwrap();
            }
        }
        self.write(&format!("load_profiles/{name}.csv"), &contents);
    }

    /// Load the model
    pub fn load(&self) -> Model {
        load_model(self.path()).unwrap()
    }
}

/// Simulate the model's only region and get the result for one enduse
#[allow(dead_code)]
pub fn simulate_enduse(model: &Model, year: u32, enduse: &str) -> EnduseResult {
    let region = &model.regions[REGION];
    let results = simulate_region(model, region, year).unwrap();
    let key = ResultKey {
        region: REGION.into(),
        year,
        sector: SECTOR.into(),
        enduse: enduse.into(),
    };
    results.get(&key).unwrap().clone()
}
