//! Fueltypes are identified internally by dense integer IDs.
//!
//! Conversion between fueltype names and IDs only happens when reading input files and writing
//! output files.
use crate::error::DemandError;
use anyhow::{Result, bail, ensure};
use indexmap::IndexSet;
use ndarray::Array1;

/// The fueltypes used when no fueltypes file is provided
pub const DEFAULT_FUELTYPES: [&str; 8] = [
    "solid_fuel",
    "gas",
    "electricity",
    "oil",
    "heat_sold",
    "biomass",
    "hydrogen",
    "heat",
];

/// A dense fueltype ID (0..N-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub struct FuelType(pub usize);

impl FuelType {
    /// The fueltype's index into fuel arrays
    pub fn index(self) -> usize {
        self.0
    }
}

/// The lookup between fueltype names and IDs
#[derive(Debug, Clone, PartialEq)]
pub struct FuelTypeLookup {
    names: IndexSet<String>,
}

impl Default for FuelTypeLookup {
    fn default() -> Self {
        Self {
            names: DEFAULT_FUELTYPES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl FuelTypeLookup {
    /// Create a new lookup. IDs are assigned in iteration order.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = IndexSet::new();
        for name in names {
            let name = name.into();
            ensure!(!name.trim().is_empty(), "Fueltype names cannot be empty");
            ensure!(set.insert(name.clone()), "Duplicate fueltype: {name}");
        }
        ensure!(!set.is_empty(), "At least one fueltype must be defined");

        Ok(Self { names: set })
    }

    /// The number of fueltypes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no fueltypes
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Look up a fueltype by name
    pub fn get_by_name(&self, name: &str) -> Result<FuelType> {
        match self.names.get_index_of(name) {
            Some(idx) => Ok(FuelType(idx)),
            None => bail!(DemandError::configuration(format!(
                "Unknown fueltype: {name}"
            ))),
        }
    }

    /// Get the name of a fueltype
    pub fn name(&self, fueltype: FuelType) -> &str {
        &self.names[fueltype.index()]
    }

    /// Iterate over all fueltypes with their names
    pub fn iter(&self) -> impl Iterator<Item = (FuelType, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (FuelType(idx), name.as_str()))
    }

    /// An array of zeros with one element per fueltype
    pub fn zeros(&self) -> Array1<f64> {
        Array1::zeros(self.len())
    }
}
