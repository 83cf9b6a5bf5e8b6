//! Code for reading regions and their base-year fuels from CSV files.
use super::*;
use crate::enduse::{EnduseMap, SectorID};
use crate::error::DemandError;
use crate::fueltype::FuelTypeLookup;
use crate::region::{Region, RegionFuels, RegionID, RegionMap};
use anyhow::bail;
use ndarray::Array1;
use serde::Deserialize;

const REGIONS_FILE_NAME: &str = "regions.csv";
const FUELS_FILE_NAME: &str = "fuels.csv";

#[derive(Deserialize, PartialEq, Debug)]
struct RegionRaw {
    id: String,
    longitude: f64,
    latitude: f64,
}

#[derive(Deserialize, PartialEq, Debug)]
struct FuelRaw {
    region: String,
    sector: String,
    enduse: String,
    fueltype: String,
    value: f64,
}

/// Read regions and their base-year fuels from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `fueltypes` - The fueltype lookup
/// * `enduses` - All enduses
///
/// # Returns
///
/// The regions, keyed by ID, or an error.
pub fn read_regions(
    model_dir: &Path,
    fueltypes: &FuelTypeLookup,
    enduses: &EnduseMap,
) -> Result<RegionMap> {
    let file_path = model_dir.join(REGIONS_FILE_NAME);
    let regions_csv = read_csv(&file_path)?;
    let mut regions =
        read_regions_from_iter(regions_csv).with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(FUELS_FILE_NAME);
    let fuels_csv = read_csv(&file_path)?;
    read_fuels_from_iter(fuels_csv, &mut regions, fueltypes, enduses)
        .with_context(|| input_err_msg(&file_path))?;

    Ok(regions)
}

fn read_regions_from_iter<I>(iter: I) -> Result<RegionMap>
where
    I: Iterator<Item = RegionRaw>,
{
    let mut regions = RegionMap::new();
    for raw in iter {
        let id = RegionID::from(raw.id.as_str());
        ensure!(
            (-180.0..=180.0).contains(&raw.longitude) && (-90.0..=90.0).contains(&raw.latitude),
            DemandError::configuration(format!("Invalid coordinates for region {id}"))
        );

        let region = Region {
            id: id.clone(),
            longitude: raw.longitude,
            latitude: raw.latitude,
            fuels: RegionFuels::new(),
        };
        ensure!(
            regions.insert(id.clone(), region).is_none(),
            "Duplicate region: {id}"
        );
    }

    Ok(regions)
}

fn read_fuels_from_iter<I>(
    iter: I,
    regions: &mut RegionMap,
    fueltypes: &FuelTypeLookup,
    enduses: &EnduseMap,
) -> Result<()>
where
    I: Iterator<Item = FuelRaw>,
{
    for raw in iter {
        let Some(region) = regions.get_mut(raw.region.as_str()) else {
            bail!(DemandError::configuration(format!(
                "Unknown region: {}",
                raw.region
            )));
        };
        let Some(enduse) = enduses.get(raw.enduse.as_str()) else {
            bail!(DemandError::configuration(format!(
                "Unknown enduse: {}",
                raw.enduse
            )));
        };
        let fueltype = fueltypes.get_by_name(&raw.fueltype)?;
        ensure!(
            raw.value.is_finite() && raw.value >= 0.0,
            DemandError::configuration(format!(
                "Fuel for region {}, enduse {} must be a non-negative number",
                raw.region, raw.enduse
            ))
        );

        // Fuel of an enduse with technologies must be assigned to some technology
        ensure!(
            raw.value == 0.0
                || !enduse.has_technologies()
                || enduse.fuel_tech_shares.keys().any(|(f, _)| *f == fueltype),
            DemandError::configuration(format!(
                "Enduse {} has fuel of fueltype {} but no technology shares for it",
                raw.enduse, raw.fueltype
            ))
        );

        let key = (SectorID::from(raw.sector.as_str()), enduse.id.clone());
        let fuel = region
            .fuels
            .entry(key)
            .or_insert_with(|| Array1::zeros(fueltypes.len()));
        ensure!(
            fuel[fueltype.index()] == 0.0,
            "Duplicate fuel for region {}, sector {}, enduse {}, fueltype {}",
            raw.region,
            raw.sector,
            raw.enduse,
            raw.fueltype
        );
        fuel[fueltype.index()] = raw.value;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enduse::Enduse;
    use crate::error::demand_error;
    use indexmap::indexmap;
    use ndarray::array;
    use rstest::{fixture, rstest};
    use std::fs::File;
    use std::io::Write;
    use std::iter;
    use tempfile::tempdir;

    #[fixture]
    fn enduses() -> EnduseMap {
        let mut heating = Enduse {
            id: "rs_space_heating".into(),
            ..Default::default()
        };
        heating
            .fuel_tech_shares
            .insert((crate::fueltype::FuelType(1), "boiler_gas".into()), 1.0);
        heating.add_technologies(["boiler_gas".into()]);
        let lighting = Enduse {
            id: "rs_lighting".into(),
            ..Default::default()
        };

        indexmap! {
            heating.id.clone() => heating,
            lighting.id.clone() => lighting,
        }
    }

    #[fixture]
    fn regions() -> RegionMap {
        read_regions_from_iter(iter::once(RegionRaw {
            id: "GBR".into(),
            longitude: -1.5,
            latitude: 52.0,
        }))
        .unwrap()
    }

    fn fuel(enduse: &str, fueltype: &str, value: f64) -> FuelRaw {
        FuelRaw {
            region: "GBR".into(),
            sector: "residential".into(),
            enduse: enduse.into(),
            fueltype: fueltype.into(),
            value,
        }
    }

    #[rstest]
    fn test_read_regions(enduses: EnduseMap) {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(REGIONS_FILE_NAME)).unwrap();
            writeln!(file, "id,longitude,latitude\nGBR,-1.5,52.0\nIRL,-8.0,53.0").unwrap();
            let mut file = File::create(dir.path().join(FUELS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "region,sector,enduse,fueltype,value
GBR,residential,rs_space_heating,gas,100.0
GBR,residential,rs_lighting,electricity,20.0
GBR,residential,rs_lighting,gas,5.0"
            )
            .unwrap();
        }

        let regions = read_regions(dir.path(), &FuelTypeLookup::default(), &enduses).unwrap();
        assert_eq!(regions.len(), 2);
        let gbr = &regions["GBR"];
        assert_eq!(
            gbr.fuels[&("residential".into(), "rs_lighting".into())],
            array![0.0, 5.0, 20.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
        assert!(regions["IRL"].fuels.is_empty());
    }

    #[rstest]
    #[case::negative(fuel("rs_lighting", "gas", -1.0))]
    #[case::unknown_enduse(fuel("rs_cooking", "gas", 1.0))]
    #[case::no_shares(fuel("rs_space_heating", "electricity", 1.0))]
    fn test_read_fuels_invalid(
        enduses: EnduseMap,
        mut regions: RegionMap,
        #[case] raw: FuelRaw,
    ) {
        let err = read_fuels_from_iter(
            iter::once(raw),
            &mut regions,
            &FuelTypeLookup::default(),
            &enduses,
        )
        .unwrap_err();
        assert!(matches!(
            demand_error(&err),
            Some(DemandError::Configuration(_))
        ));
    }

    #[rstest]
    fn test_read_fuels_zero_without_shares(enduses: EnduseMap, mut regions: RegionMap) {
        read_fuels_from_iter(
            iter::once(fuel("rs_space_heating", "electricity", 0.0)),
            &mut regions,
            &FuelTypeLookup::default(),
            &enduses,
        )
        .unwrap();
    }

    #[test]
    fn test_read_regions_invalid_coordinates() {
        assert!(
            read_regions_from_iter(iter::once(RegionRaw {
                id: "GBR".into(),
                longitude: 200.0,
                latitude: 52.0,
            }))
            .is_err()
        );
    }
}
