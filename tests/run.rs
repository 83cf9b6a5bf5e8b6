//! Integration tests for running a whole model.
use energy_demand::cli::{RunOpts, handle_run_command};
use energy_demand::error::{DemandError, demand_error};
use energy_demand::input::load_model;
use energy_demand::settings::Settings;
use energy_demand::simulation;
use float_cmp::assert_approx_eq;
use tempfile::tempdir;

mod common;
use common::TestModel;

/// A model with a lighting enduse and a gas-boiler heating enduse, simulated in two years
fn two_enduse_model() -> TestModel {
    let model = TestModel::new("base_yr = 2015\nend_yr = 2050\nsimulated_yrs = [2015, 2020]\n");
    model.write(
        "technologies.csv",
        "id,fueltype,tech_type,eff_by,eff_ey,year_eff_ey,eff_achieved,diff_method,market_entry
gas_boiler,gas,constant,0.85,0.95,2050,1.0,linear,2000
heat_pump,electricity,heat_pump,3.0,3.5,2050,1.0,sigmoid,2010
",
    );
    model.write(
        "enduses.csv",
        "id,kind,drivers\nrs_lighting,other,\nrs_space_heating,space_heating,\n",
    );
    model.write(
        "fuel_tech_shares.csv",
        "enduse,fueltype,technology,share\nrs_space_heating,gas,gas_boiler,1.0\n",
    );
    model.write(
        "fuels.csv",
        "region,sector,enduse,fueltype,value
GBR,residential,rs_lighting,electricity,40.0
GBR,residential,rs_space_heating,gas,200.0
",
    );
    model.write(
        "load_profiles.csv",
        "profile,enduse,sectors,technologies
flat,rs_lighting,residential,
flat,rs_space_heating,residential,gas_boiler;heat_pump
",
    );
    model.write_flat_profile("flat");
    model.write_temperatures(2015, |day, hour| 5.0 + (day % 30) as f64 + (hour % 6) as f64);
    model.write_temperatures(2020, |day, hour| 6.0 + (day % 30) as f64 + (hour % 6) as f64);
    model
}

#[test]
fn test_run() {
    let model = two_enduse_model();
    model.write(
        "fuel_switches.csv",
        "enduse,fueltype_replaced,technology_install,switch_yr,share_switched,max_theoretical_switch
rs_space_heating,gas,heat_pump,2040,0.6,0.8
",
    );
    let model = model.load();
    let results = simulation::run(&model).unwrap();

    // Two enduses in two years
    assert_eq!(results.len(), 4);

    // Lighting has no technologies, so its fuel only changes with the cascade
    for year in [2015, 2020] {
        let fuel = results.national_fuel_y(year, model.num_fueltypes());
        assert_approx_eq!(f64, fuel[2], 40.0, epsilon = 1e-6);
    }

    // Heat pumps only have a minimal share in the base year
    let fuel = results.national_fuel_y(2015, model.num_fueltypes());
    assert_approx_eq!(f64, fuel[1], 200.0, epsilon = 0.5);

    // More gas has been switched to heat pumps by 2020
    let fuel_2020 = results.national_fuel_y(2020, model.num_fueltypes());
    assert!(fuel_2020[2] - 40.0 > fuel[2] - 40.0);
}

#[test]
fn test_conflicting_switches() {
    let model = two_enduse_model();
    model.write(
        "fuel_switches.csv",
        "enduse,fueltype_replaced,technology_install,switch_yr,share_switched,max_theoretical_switch
rs_space_heating,gas,heat_pump,2040,0.6,0.8
",
    );
    model.write(
        "service_switches.csv",
        "enduse,technology,target_share,max_share,switch_yr
rs_space_heating,heat_pump,1.0,1.0,2040
",
    );

    let err = load_model(model.path()).unwrap_err();
    assert_eq!(
        demand_error(&err),
        Some(&DemandError::ConflictingSwitches("rs_space_heating".into()))
    );
}

#[test]
fn test_no_usable_stations() {
    let model = two_enduse_model();

    // Every value missing
    model.write_temperatures(2015, |_, _| f64::NAN);

    let err = load_model(model.path()).unwrap_err();
    assert_eq!(demand_error(&err), Some(&DemandError::NoStations));
}

#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("ENERGY_DEMAND_LOG_LEVEL", "off") };

    let model = two_enduse_model();
    let output_dir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(output_dir.path().to_path_buf()),
        overwrite: false,
    };
    handle_run_command(model.path(), &opts, Some(Settings::default())).unwrap();

    let output_path = output_dir.path();
    for file_name in [
        "fuel_yh_gas_2015.csv",
        "fuel_yh_electricity_2020.csv",
        "peak_h.csv",
        "metadata.toml",
    ] {
        assert!(output_path.join(file_name).is_file(), "Missing {file_name}");
    }

    // The hourly rows add up to the yearly fuel
    let total: f64 = csv::Reader::from_path(output_path.join("fuel_yh_electricity_2015.csv"))
        .unwrap()
        .records()
        .map(|record| record.unwrap()[2].parse::<f64>().unwrap())
        .sum();
    assert_approx_eq!(f64, total, 40.0, epsilon = 1e-6);
}
