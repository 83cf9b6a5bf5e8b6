//! Regions represent the sub-national areas for which demand is decomposed.
use crate::enduse::{EnduseID, SectorID};
use crate::id::{define_id_getter, define_id_type};
use indexmap::IndexMap;
use ndarray::Array1;

define_id_type! {RegionID}

/// A map of [`Region`]s, keyed by region ID
pub type RegionMap = IndexMap<RegionID, Region>;

/// Base-year fuel for each (sector, enduse) in a region, one element per fueltype (GWh/year)
pub type RegionFuels = IndexMap<(SectorID, EnduseID), Array1<f64>>;

/// Represents a region with its location and base-year fuel demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// A unique identifier for a region (e.g. "E06000001").
    pub id: RegionID,
    /// Longitude of the region's centroid (degrees)
    pub longitude: f64,
    /// Latitude of the region's centroid (degrees)
    pub latitude: f64,
    /// Base-year fuels by (sector, enduse)
    pub fuels: RegionFuels,
}
define_id_getter! {Region, RegionID}

impl Region {
    /// Total base-year fuel of the region, by fueltype
    pub fn total_fuel(&self, num_fueltypes: usize) -> Array1<f64> {
        self.fuels
            .values()
            .fold(Array1::zeros(num_fueltypes), |acc, fuel| acc + fuel)
    }

    /// Base-year fuel of one enduse summed over sectors, by fueltype
    pub fn enduse_fuel(&self, enduse: &EnduseID, num_fueltypes: usize) -> Array1<f64> {
        self.fuels
            .iter()
            .filter(|((_, id), _)| id == enduse)
            .fold(Array1::zeros(num_fueltypes), |acc, (_, fuel)| acc + fuel)
    }
}
