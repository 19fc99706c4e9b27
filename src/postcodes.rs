//! Postcode to coordinates lookup, loaded once from a CSV file

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::location::Point;

#[derive(Debug, Deserialize)]
struct Record {
    postcode: String,
    latitude: String,
    longitude: String,
}

/// Static table of postcodes
#[derive(Debug, Default)]
pub struct Postcodes {
    coordinates: HashMap<String, Point>,
}

impl Postcodes {
    /// Load postcodes from a CSV file with `postcode,latitude,longitude` columns
    ///
    /// # Errors
    ///
    /// Will return `Err` when the file can not be read or has malformed rows
    pub fn from_path(path: &Path) -> csv::Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        Self::from_csv(reader)
    }

    /// Load postcodes from any CSV source
    ///
    /// # Errors
    ///
    /// Will return `Err` on malformed rows
    pub fn from_reader<R: Read>(reader: R) -> csv::Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        Self::from_csv(reader)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> csv::Result<Self> {
        let mut coordinates = HashMap::new();

        for record in reader.deserialize::<Record>() {
            let record = record?;

            coordinates.insert(
                normalize(&record.postcode),
                Point {
                    latitude: record.latitude,
                    longitude: record.longitude,
                },
            );
        }

        tracing::info!("Loaded {} postcodes", coordinates.len());

        Ok(Self { coordinates })
    }

    /// Coordinates of a postcode, formatting does not matter
    pub fn lookup(&self, code: &str) -> Option<Point> {
        self.coordinates.get(&normalize(code)).cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.coordinates.contains_key(&normalize(code))
    }
}

/// Lowercase without any whitespace, `E14 9ED` becomes `e149ed`
pub fn normalize(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn london() -> Postcodes {
        Postcodes::from_path(Path::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/london_postcodes.csv"
        )))
        .unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("E14 9ED"), "e149ed");
        assert_eq!(normalize(" e149ed "), "e149ed");
        assert_eq!(normalize("e14 9 ed"), "e149ed");
        assert_eq!(normalize("N16\t8RP"), "n168rp");
    }

    #[test]
    fn test_contains() {
        let postcodes = london();

        assert!(postcodes.contains("e149ed"));
        assert!(postcodes.contains(" e149ed "));
        assert!(postcodes.contains("e14 9 ed"));
        assert!(postcodes.contains("E14 9ED"));
        assert!(!postcodes.contains("zz999zz"));
    }

    #[test]
    fn test_lookup() {
        let postcodes = london();

        let point = postcodes.lookup("n168rp").unwrap();

        assert_eq!(point.latitude, "51.556324");
        assert_eq!(point.longitude, "-0.080866");

        assert_eq!(postcodes.lookup("zz999zz"), None);
    }

    #[test]
    fn test_from_reader() {
        let data = "postcode,latitude,longitude\nAB1 2CD, 1.5 , -2.5\n";

        let postcodes = Postcodes::from_reader(data.as_bytes()).unwrap();

        assert!(!postcodes.contains("e149ed"));
        assert_eq!(postcodes.lookup("ab12cd"), Some(Point::new(1.5, -2.5)));
    }

    #[test]
    fn test_malformed_rows() {
        let data = "postcode,latitude,longitude\nAB1 2CD,1.5\n";

        assert!(Postcodes::from_reader(data.as_bytes()).is_err());
    }
}
