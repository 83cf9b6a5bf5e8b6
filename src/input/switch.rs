//! Code for reading service and fuel switches from CSV files.
use super::*;
use crate::enduse::{EnduseID, EnduseMap};
use crate::error::DemandError;
use crate::fueltype::FuelTypeLookup;
use crate::switch::{FuelSwitch, ServiceSwitch, SwitchTable};
use crate::technology::{TechnologyID, TechnologyMap};
use serde::Deserialize;

const SERVICE_SWITCHES_FILE_NAME: &str = "service_switches.csv";
const FUEL_SWITCHES_FILE_NAME: &str = "fuel_switches.csv";

#[derive(Deserialize, PartialEq, Debug)]
struct ServiceSwitchRaw {
    enduse: String,
    technology: String,
    target_share: f64,
    max_share: f64,
    switch_yr: u32,
}

#[derive(Deserialize, PartialEq, Debug)]
struct FuelSwitchRaw {
    enduse: String,
    fueltype_replaced: String,
    technology_install: String,
    switch_yr: u32,
    share_switched: f64,
    max_theoretical_switch: f64,
}

/// Check the enduse, technology and year of a switch
fn check_switch_refs(
    enduse: &str,
    technology: &str,
    switch_yr: u32,
    enduses: &EnduseMap,
    technologies: &TechnologyMap,
    base_yr: u32,
) -> Result<(EnduseID, TechnologyID)> {
    ensure!(
        enduses.contains_key(enduse),
        DemandError::configuration(format!("Switch for unknown enduse {enduse}"))
    );
    ensure!(
        technologies.contains_key(technology),
        DemandError::configuration(format!(
            "Switch for enduse {enduse} references unknown technology {technology}"
        ))
    );
    ensure!(
        switch_yr >= base_yr,
        DemandError::configuration(format!(
            "Switch for enduse {enduse}, technology {technology} is before the base year \
             ({base_yr})"
        ))
    );

    Ok((enduse.into(), technology.into()))
}

/// Read service and fuel switches.
///
/// The technologies installed by switches are added to their enduses.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `fueltypes` - The fueltype lookup
/// * `enduses` - All enduses
/// * `technologies` - All technologies
/// * `base_yr` - The base year
pub fn read_switches(
    model_dir: &Path,
    fueltypes: &FuelTypeLookup,
    enduses: &mut EnduseMap,
    technologies: &TechnologyMap,
    base_yr: u32,
) -> Result<SwitchTable> {
    let file_path = model_dir.join(SERVICE_SWITCHES_FILE_NAME);
    let service_csv = read_csv_optional(&file_path)?;
    let service_switches =
        read_service_switches_from_iter(service_csv, enduses, technologies, base_yr)
            .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(FUEL_SWITCHES_FILE_NAME);
    let fuel_csv = read_csv_optional(&file_path)?;
    let fuel_switches =
        read_fuel_switches_from_iter(fuel_csv, fueltypes, enduses, technologies, base_yr)
            .with_context(|| input_err_msg(&file_path))?;

    let table = SwitchTable::new(service_switches, fuel_switches)?;
    for (enduse, enduse_switches) in table.iter() {
        if let Some(enduse) = enduses.get_mut(enduse) {
            enduse.add_technologies(enduse_switches.technologies());
        }
    }

    Ok(table)
}

fn read_service_switches_from_iter<I>(
    iter: I,
    enduses: &EnduseMap,
    technologies: &TechnologyMap,
    base_yr: u32,
) -> Result<Vec<ServiceSwitch>>
where
    I: Iterator<Item = ServiceSwitchRaw>,
{
    iter.map(|raw| -> Result<_> {
        let (enduse, technology) = check_switch_refs(
            &raw.enduse,
            &raw.technology,
            raw.switch_yr,
            enduses,
            technologies,
            base_yr,
        )?;

        Ok(ServiceSwitch {
            enduse,
            technology,
            target_share: raw.target_share,
            max_share: raw.max_share,
            switch_yr: raw.switch_yr,
        })
    })
    .try_collect()
}

fn read_fuel_switches_from_iter<I>(
    iter: I,
    fueltypes: &FuelTypeLookup,
    enduses: &EnduseMap,
    technologies: &TechnologyMap,
    base_yr: u32,
) -> Result<Vec<FuelSwitch>>
where
    I: Iterator<Item = FuelSwitchRaw>,
{
    iter.map(|raw| -> Result<_> {
        let (enduse, technology_install) = check_switch_refs(
            &raw.enduse,
            &raw.technology_install,
            raw.switch_yr,
            enduses,
            technologies,
            base_yr,
        )?;

        Ok(FuelSwitch {
            enduse,
            fueltype_replaced: fueltypes.get_by_name(&raw.fueltype_replaced)?,
            technology_install,
            switch_yr: raw.switch_yr,
            share_switched: raw.share_switched,
            max_theoretical_switch: raw.max_theoretical_switch,
        })
    })
    .try_collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enduse::Enduse;
    use crate::error::demand_error;
    use crate::fixture::constant_technology;
    use crate::switch::EnduseSwitches;
    use indexmap::indexmap;
    use rstest::{fixture, rstest};
    use std::fs::File;
    use std::io::Write;
    use std::iter;
    use tempfile::tempdir;

    #[fixture]
    fn technologies() -> TechnologyMap {
        indexmap! {
            "boiler_gas".into() => constant_technology("boiler_gas", 1, 0.9),
            "heat_pump".into() => constant_technology("heat_pump", 2, 3.0),
        }
    }

    #[fixture]
    fn enduses() -> EnduseMap {
        let mut enduse = Enduse {
            id: "rs_space_heating".into(),
            ..Default::default()
        };
        enduse.add_technologies(["boiler_gas".into()]);
        indexmap! { enduse.id.clone() => enduse }
    }

    fn service_raw(technology: &str, target_share: f64, switch_yr: u32) -> ServiceSwitchRaw {
        ServiceSwitchRaw {
            enduse: "rs_space_heating".into(),
            technology: technology.into(),
            target_share,
            max_share: 1.0,
            switch_yr,
        }
    }

    #[rstest]
    fn test_read_switches_fuel(mut enduses: EnduseMap, technologies: TechnologyMap) {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(FUEL_SWITCHES_FILE_NAME)).unwrap();
            writeln!(
                file,
                "enduse,fueltype_replaced,technology_install,switch_yr,share_switched,max_theoretical_switch
rs_space_heating,gas,heat_pump,2030,0.5,0.8"
            )
            .unwrap();
        }

        let table = read_switches(
            dir.path(),
            &FuelTypeLookup::default(),
            &mut enduses,
            &technologies,
            2015,
        )
        .unwrap();
        assert!(matches!(
            table.get(&"rs_space_heating".into()),
            Some(EnduseSwitches::Fuel(switches)) if switches.len() == 1
        ));
        assert_eq!(
            enduses["rs_space_heating"].technologies,
            [TechnologyID::new("boiler_gas"), "heat_pump".into()]
        );
    }

    #[rstest]
    fn test_read_switches_conflicting(mut enduses: EnduseMap, technologies: TechnologyMap) {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SERVICE_SWITCHES_FILE_NAME)).unwrap();
            writeln!(
                file,
                "enduse,technology,target_share,max_share,switch_yr
rs_space_heating,heat_pump,1.0,1.0,2030"
            )
            .unwrap();
            let mut file = File::create(dir.path().join(FUEL_SWITCHES_FILE_NAME)).unwrap();
            writeln!(
                file,
                "enduse,fueltype_replaced,technology_install,switch_yr,share_switched,max_theoretical_switch
rs_space_heating,gas,heat_pump,2030,0.5,0.8"
            )
            .unwrap();
        }

        let err = read_switches(
            dir.path(),
            &FuelTypeLookup::default(),
            &mut enduses,
            &technologies,
            2015,
        )
        .unwrap_err();
        assert!(matches!(
            demand_error(&err),
            Some(DemandError::ConflictingSwitches(_))
        ));
    }

    #[rstest]
    #[case::unknown_technology(service_raw("boiler_oil", 1.0, 2030))]
    #[case::before_base_year(service_raw("heat_pump", 1.0, 2010))]
    fn test_read_service_switches_invalid(
        enduses: EnduseMap,
        technologies: TechnologyMap,
        #[case] raw: ServiceSwitchRaw,
    ) {
        let err = read_service_switches_from_iter(iter::once(raw), &enduses, &technologies, 2015)
            .unwrap_err();
        assert!(matches!(
            demand_error(&err),
            Some(DemandError::Configuration(_))
        ));
    }

    #[rstest]
    fn test_read_service_switches_valid(enduses: EnduseMap, technologies: TechnologyMap) {
        let switches = read_service_switches_from_iter(
            [service_raw("boiler_gas", 0.4, 2030), service_raw("heat_pump", 0.6, 2030)].into_iter(),
            &enduses,
            &technologies,
            2015,
        )
        .unwrap();
        assert_eq!(switches.len(), 2);
        assert_eq!(switches[1].technology, "heat_pump".into());
    }
}
