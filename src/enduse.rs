//! Enduses are demand categories (e.g. space heating, cooking) within a sector.
use crate::fueltype::FuelType;
use crate::id::{define_id_getter, define_id_type};
use crate::technology::TechnologyID;
use indexmap::IndexMap;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::collections::BTreeMap;

define_id_type! {EnduseID}
define_id_type! {SectorID}

/// A map of [`Enduse`]s, keyed by enduse ID
pub type EnduseMap = IndexMap<EnduseID, Enduse>;

/// Base-year shares of each fueltype's fuel used by each technology
pub type FuelTechShares = BTreeMap<(FuelType, TechnologyID), f64>;

/// How an enduse responds to the weather
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnduseKind {
    /// Demand driven by heating degree days
    #[string = "space_heating"]
    SpaceHeating,
    /// Demand driven by cooling degree days
    #[string = "cooling"]
    Cooling,
    /// Demand independent of the weather
    #[default]
    #[string = "other"]
    Other,
}

impl EnduseKind {
    /// Whether demand for this enduse depends on degree days
    pub fn is_temperature_driven(self) -> bool {
        self != EnduseKind::Other
    }
}

/// A demand category
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Enduse {
    /// Unique identifier for the enduse (e.g. "rs_space_heating")
    pub id: EnduseID,
    /// How the enduse responds to the weather
    pub kind: EnduseKind,
    /// Names of the scenario drivers which scale this enduse's demand
    pub drivers: Vec<String>,
    /// Base-year fuel shares per (fueltype, technology)
    pub fuel_tech_shares: FuelTechShares,
    /// All technologies involved in this enduse, including those only installed by switches.
    ///
    /// Sorted by name, which fixes the order in which technologies are summed.
    pub technologies: Vec<TechnologyID>,
}
define_id_getter! {Enduse, EnduseID}

impl Default for EnduseID {
    fn default() -> Self {
        EnduseID::new("")
    }
}

impl Enduse {
    /// Whether any technologies are defined for this enduse
    pub fn has_technologies(&self) -> bool {
        !self.technologies.is_empty()
    }

    /// Iterate over the base-year shares of the given technology, by fueltype
    pub fn shares_for_technology<'a>(
        &'a self,
        technology: &'a TechnologyID,
    ) -> impl Iterator<Item = (FuelType, f64)> + 'a {
        self.fuel_tech_shares
            .iter()
            .filter(move |((_, tech), _)| tech == technology)
            .map(|((fueltype, _), share)| (*fueltype, *share))
    }

    /// Add technologies to the enduse's technology list, keeping it sorted and unique
    pub fn add_technologies<I>(&mut self, technologies: I)
    where
        I: IntoIterator<Item = TechnologyID>,
    {
        self.technologies.extend(technologies);
        self.technologies.sort();
        self.technologies.dedup();
    }
}
