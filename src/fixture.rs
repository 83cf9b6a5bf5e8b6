//! Fixtures for tests

use crate::assumptions::Assumptions;
use crate::calendar::{DAYS_IN_YEAR, HOURS_IN_DAY};
use crate::decompose::EnduseContext;
use crate::degree_days::{DegreeDays, peak_day, yd_shape};
use crate::diffusion::{DiffusionMethod, SigmoidShape};
use crate::enduse::{Enduse, EnduseKind, SectorID};
use crate::fueltype::FuelType;
use crate::load_profile::{LoadProfileStock, ProfileInput, compose_shape_yh};
use crate::region::RegionID;
use crate::scenario::{FuelPrices, ScenarioDrivers};
use crate::sigmoid_fit::DiffusionMap;
use crate::switch::SwitchTable;
use crate::technology::stock::{StockConditions, TechnologyStock};
use crate::technology::{
    PLACEHOLDER_TECHNOLOGY, Technology, TechnologyKind, TechnologyMap, TechnologyType,
};
use crate::weather::TemperatureGrid;
use indexmap::indexmap;
use ndarray::{Array1, Array2};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// The same share of yearly demand on every day
#[fixture]
pub fn flat_shape_yd() -> Array1<f64> {
    Array1::from_elem(DAYS_IN_YEAR, 1.0 / 365.0)
}

/// The same share of yearly demand in every hour
#[fixture]
pub fn flat_shape_yh() -> Array2<f64> {
    Array2::from_elem((DAYS_IN_YEAR, HOURS_IN_DAY), 1.0 / 8760.0)
}

#[fixture]
pub fn flat_profile_input() -> ProfileInput {
    ProfileInput {
        shape_y_dh: Array2::from_elem((DAYS_IN_YEAR, HOURS_IN_DAY), 1.0 / 24.0),
        shape_yd: flat_shape_yd(),
        shape_peak_dh: Array1::from_elem(HOURS_IN_DAY, 1.0 / 24.0),
    }
}

/// A technology with one fueltype and a constant efficiency
pub fn constant_technology(id: &str, fueltype: usize, eff: f64) -> Technology {
    Technology {
        id: id.into(),
        kind: TechnologyKind::Single {
            fueltype: FuelType(fueltype),
            tech_type: TechnologyType::Constant,
        },
        eff_by: eff,
        eff_ey: eff,
        year_eff_ey: 2050,
        eff_achieved: 1.0,
        diff_method: DiffusionMethod::Linear,
        market_entry: 2015,
    }
}

/// The heating enduse used by [`DecomposeFixture`]
const HEATING_ENDUSE: &str = "rs_space_heating";

/// Owned data for decomposing enduses in one region with three fueltypes.
///
/// The heating enduse has a gas boiler (fueltype 1) and an electric heat pump (fueltype 2) with
/// flat load profiles. "rs_lighting" has a flat profile and no technologies.
pub struct DecomposeFixture {
    pub region: RegionID,
    pub sector: SectorID,
    pub assumptions: Assumptions,
    pub degree_days: DegreeDays,
    pub technologies: TechnologyMap,
    pub stock: TechnologyStock,
    pub profiles: LoadProfileStock,
    pub switches: SwitchTable,
    pub diffusions: DiffusionMap,
    pub drivers: ScenarioDrivers,
    pub prices: FuelPrices,
}

impl DecomposeFixture {
    pub fn new(curr_yr: u32) -> Self {
        let technologies = indexmap! {
            "boiler_gas".into() => constant_technology("boiler_gas", 1, 0.9),
            "heat_pump".into() => constant_technology("heat_pump", 2, 3.0),
        };
        let temperatures: TemperatureGrid =
            Array2::from_elem((DAYS_IN_YEAR, HOURS_IN_DAY), 5.5);
        let shape = SigmoidShape::default();
        let conditions = StockConditions {
            temp_by: &temperatures,
            temp_cy: &temperatures,
            t_base_by: 15.5,
            t_base_cy: 15.5,
            base_yr: 2015,
            curr_yr,
            diffusion: &shape,
            heat_pump_slope: -0.08,
            num_fueltypes: 3,
        };
        let stock = TechnologyStock::build(&technologies, technologies.keys(), &conditions)
            .unwrap();

        let mut fixture = Self {
            region: "GBR".into(),
            sector: "residential".into(),
            assumptions: Assumptions::new(2015, 2050),
            degree_days: DegreeDays {
                hdd_by: Array1::from_elem(DAYS_IN_YEAR, 10.0),
                hdd_cy: Array1::from_elem(DAYS_IN_YEAR, 10.0),
                cdd_by: Array1::zeros(DAYS_IN_YEAR),
                cdd_cy: Array1::zeros(DAYS_IN_YEAR),
                t_base_heating_by: 15.5,
                t_base_heating_cy: 15.5,
            },
            technologies,
            stock,
            profiles: LoadProfileStock::default(),
            switches: SwitchTable::default(),
            diffusions: DiffusionMap::new(),
            drivers: ScenarioDrivers::default(),
            prices: FuelPrices::default(),
        };
        fixture.build_profiles(flat_shape_yd(), flat_shape_yh());
        fixture
    }

    /// Replace the load profiles of the heating technologies
    fn build_profiles(&mut self, heating_yd: Array1<f64>, heating_yh: Array2<f64>) {
        self.build_heating_profiles(
            (heating_yd.clone(), heating_yh.clone()),
            (heating_yd, heating_yh),
        );
    }

    /// Give the boiler and the heat pump their own (yd, yh) load profiles
    pub fn build_heating_profiles(
        &mut self,
        boiler: (Array1<f64>, Array2<f64>),
        heat_pump: (Array1<f64>, Array2<f64>),
    ) {
        let sectors = [self.sector.clone()];
        let peak_dh = || Array1::from_elem(HOURS_IN_DAY, 1.0 / 24.0);
        let mut profiles = LoadProfileStock::default();
        let shapes = [("boiler_gas", boiler), ("heat_pump", heat_pump)];
        for (technology, (shape_yd, shape_yh)) in shapes {
            profiles
                .add(
                    &[technology.into()],
                    &[HEATING_ENDUSE.into()],
                    &sectors,
                    shape_yd,
                    shape_yh,
                    peak_dh(),
                )
                .unwrap();
        }
        profiles
            .add(
                &[PLACEHOLDER_TECHNOLOGY.into()],
                &["rs_lighting".into(), HEATING_ENDUSE.into()],
                &sectors,
                flat_shape_yd(),
                flat_shape_yh(),
                peak_dh(),
            )
            .unwrap();
        self.profiles = profiles;
    }

    /// Set base-year and current-year HDD, with heating profiles following them
    pub fn set_hdd(&mut self, hdd: Array1<f64>) {
        let shape_yd = yd_shape(&hdd);
        let peak_dh = Array1::from_elem(HOURS_IN_DAY, 1.0 / 24.0);
        let shape_y_dh = Array2::from_elem((DAYS_IN_YEAR, HOURS_IN_DAY), 1.0 / 24.0);
        let shape_yh = compose_shape_yh(&shape_yd, &shape_y_dh, Some((peak_day(&hdd), &peak_dh)));
        self.degree_days.hdd_by = hdd.clone();
        self.degree_days.hdd_cy = hdd;
        self.build_profiles(shape_yd, shape_yh);
    }

    /// A heating enduse where all gas is used by the boiler
    pub fn heating_enduse(&self, kind: EnduseKind) -> Enduse {
        let mut enduse = Enduse {
            id: HEATING_ENDUSE.into(),
            kind,
            ..Default::default()
        };
        enduse
            .fuel_tech_shares
            .insert((FuelType(1), "boiler_gas".into()), 1.0);
        enduse.add_technologies(["boiler_gas".into()]);
        enduse
    }

    /// A heating enduse where gas is used by the boiler and electricity by the heat pump
    pub fn boiler_and_heat_pump_enduse(&self) -> Enduse {
        let mut enduse = self.heating_enduse(EnduseKind::Other);
        enduse
            .fuel_tech_shares
            .insert((FuelType(2), "heat_pump".into()), 1.0);
        enduse.add_technologies(["heat_pump".into()]);
        enduse
    }

    /// The context for decomposing the fixture's enduses
    pub fn context(&self, curr_yr: u32) -> EnduseContext<'_> {
        EnduseContext {
            region: &self.region,
            sector: &self.sector,
            curr_yr,
            assumptions: &self.assumptions,
            degree_days: &self.degree_days,
            technologies: &self.stock,
            profiles: &self.profiles,
            switches: &self.switches,
            diffusions: &self.diffusions,
            drivers: &self.drivers,
            prices: &self.prices,
        }
    }
}
