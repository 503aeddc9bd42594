// Static stop catalog built from the bundled STIB stops table
use crate::sat_models::{Result, SATError, StopRecord};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const ID_COLUMN: &str = "ID";
const NAME_COLUMN: &str = "Name";
const COORDINATES_COLUMN: &str = "Coordinates";

/// Immutable mapping from stop names to their boarding posts.
///
/// Stops keep the order in which their name first appears in the source
/// table. Every point identifier belongs to exactly one stop.
#[derive(Debug, Clone, Default)]
pub struct StopCatalog {
    stops: Vec<StopRecord>,
    by_name: HashMap<String, usize>,
    by_point: HashMap<String, usize>,
}

impl StopCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SATError::File(format!("Failed to open stop catalog {:?}: {}", path, e))
        })?;
        let catalog = Self::from_reader(file)?;
        info!("Loaded {} stops from {:?}", catalog.len(), path);
        Ok(catalog)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let id_col = Self::column(&headers, ID_COLUMN)?;
        let name_col = Self::column(&headers, NAME_COLUMN)?;
        let coords_col = Self::column(&headers, COORDINATES_COLUMN)?;

        let mut catalog = StopCatalog::default();
        let mut skipped = 0usize;

        for result in rdr.records() {
            let record = result?;
            let id = record.get(id_col).unwrap_or("");
            let name = record.get(name_col).unwrap_or("");
            let coords = record.get(coords_col).unwrap_or("");

            if id.is_empty() || name.is_empty() || coords.is_empty() {
                skipped += 1;
                continue;
            }
            if !id.chars().all(|c| c.is_ascii_digit()) {
                skipped += 1;
                continue;
            }

            let coordinates = parse_coordinates(coords).ok_or_else(|| {
                SATError::InvalidCoordinates {
                    name: name.to_string(),
                    value: coords.to_string(),
                }
            })?;

            catalog.insert(name, id, coordinates)?;
        }

        debug!("Stop catalog: {} rows skipped", skipped);
        Ok(catalog)
    }

    fn column(headers: &StringRecord, name: &str) -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SATError::Parse(format!("Stop catalog is missing the {:?} column", name)))
    }

    fn insert(&mut self, name: &str, point_id: &str, coordinates: (f64, f64)) -> Result<()> {
        if let Some(&owner) = self.by_point.get(point_id) {
            let owner_name = &self.stops[owner].name;
            if owner_name == name {
                return Ok(());
            }
            return Err(SATError::DuplicatePoint {
                point_id: point_id.to_string(),
                first: owner_name.clone(),
                second: name.to_string(),
            });
        }

        let index = match self.by_name.get(name) {
            Some(&index) => index,
            None => {
                self.stops.push(StopRecord {
                    name: name.to_string(),
                    point_ids: Vec::new(),
                    coordinates: Vec::new(),
                });
                self.by_name.insert(name.to_string(), self.stops.len() - 1);
                self.stops.len() - 1
            }
        };

        let stop = &mut self.stops[index];
        stop.point_ids.push(point_id.to_string());
        stop.coordinates.push(coordinates);
        self.by_point.insert(point_id.to_string(), index);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&StopRecord> {
        self.by_name.get(name).map(|&i| &self.stops[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Name of the stop owning `point_id`, if the catalog knows it.
    pub fn stop_for_point(&self, point_id: &str) -> Option<&str> {
        self.by_point.get(point_id).map(|&i| self.stops[i].name.as_str())
    }

    /// Point identifiers of the given stops, in selection order.
    pub fn point_ids_for(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .filter_map(|name| self.get(name))
            .flat_map(|stop| stop.point_ids.iter().cloned())
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stops.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// Parses `"lat,lon"`.
fn parse_coordinates(value: &str) -> Option<(f64, f64)> {
    let mut parts = value.split(',');
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    let lon = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((lat, lon))
}
