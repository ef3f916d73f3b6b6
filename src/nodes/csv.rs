//! Coordinate extraction from uploaded node CSVs.
//!
//! The only CSV contract the core honors: a header with
//! `latitude`/`longitude` or `lat`/`lon` columns (case-insensitive), comma or
//! semicolon separated. Rows with missing or unparseable coordinates are
//! skipped.

use tracing::debug;

use crate::error::{AoiError, Result};

const LAT_HEADERS: &[&str] = &["latitude", "lat"];
const LON_HEADERS: &[&str] = &["longitude", "lon", "lng"];

/// Extract `(lat, lon)` pairs from CSV bytes, preserving row order.
pub fn extract_coordinates(data: &[u8]) -> Result<Vec<(f64, f64)>> {
    match parse_with_delimiter(data, b',') {
        Ok(points) => Ok(points),
        // Semicolon-separated exports show up as one giant column.
        Err(_) => parse_with_delimiter(data, b';'),
    }
}

fn parse_with_delimiter(data: &[u8], delimiter: u8) -> Result<Vec<(f64, f64)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| AoiError::InvalidNodeUpload(format!("unreadable CSV header: {e}")))?
        .clone();

    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
    };
    let (lat_col, lon_col) = match (find(LAT_HEADERS), find(LON_HEADERS)) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(AoiError::InvalidNodeUpload(
                "CSV must contain latitude/longitude or lat/lon columns".into(),
            ))
        }
    };

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record =
            record.map_err(|e| AoiError::InvalidNodeUpload(format!("unreadable CSV row: {e}")))?;
        let parsed = record
            .get(lat_col)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .zip(record.get(lon_col).and_then(|v| v.trim().parse::<f64>().ok()));
        match parsed {
            Some((lat, lon)) if lat.is_finite() && lon.is_finite() => points.push((lat, lon)),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, kept = points.len(), "dropped rows without coordinates");
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_separated() {
        let csv = "id,latitude,longitude\n1,46.8,8.2\n2,47.0,8.5\n";
        let points = extract_coordinates(csv.as_bytes()).unwrap();
        assert_eq!(points, vec![(46.8, 8.2), (47.0, 8.5)]);
    }

    #[test]
    fn test_semicolon_and_short_headers() {
        let csv = "lat;lon;label\n-22.9;-43.2;rio\n";
        let points = extract_coordinates(csv.as_bytes()).unwrap();
        assert_eq!(points, vec![(-22.9, -43.2)]);
    }

    #[test]
    fn test_bad_rows_skipped() {
        let csv = "lat,lon\n46.8,8.2\nnot-a-number,8.3\n47.1,\n";
        let points = extract_coordinates(csv.as_bytes()).unwrap();
        assert_eq!(points, vec![(46.8, 8.2)]);
    }

    #[test]
    fn test_missing_columns_rejected() {
        let csv = "x,y\n1.0,2.0\n";
        assert!(matches!(
            extract_coordinates(csv.as_bytes()),
            Err(AoiError::InvalidNodeUpload(_))
        ));
    }
}
