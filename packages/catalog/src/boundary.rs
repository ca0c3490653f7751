//! Boundary `GeoJSON` download and simplification.
//!
//! Boundary documents are passed to the query engine opaquely, but very
//! complex multi-part boundaries can push the request URL past what the
//! remote API accepts. [`largest_single_part`] is an optional pre-processing
//! step that keeps only the largest part of a `MultiPolygon` boundary,
//! typically shrinking the serialized geometry by an order of magnitude for
//! coastal and island cities.

use geo::{Area, MultiPolygon, Polygon};
use geojson::{Feature, GeoJson, Geometry};

use crate::{CatalogError, CityInfo};

/// Downloads a city's boundary `GeoJSON` document.
///
/// # Errors
///
/// Returns [`CatalogError`] if the request fails or the body is not JSON.
pub async fn fetch_boundary(
    client: &reqwest::Client,
    city: &CityInfo,
) -> Result<serde_json::Value, CatalogError> {
    log::debug!("Downloading boundary for {city} from {}", city.raw_url());
    let body = client
        .get(city.raw_url())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(body)
}

/// Reduces a `MultiPolygon` boundary to its largest single part.
///
/// Returns a bare feature holding the largest constituent polygon by
/// unsigned area. Properties are dropped; the query engine only needs the
/// geometry. Documents whose geometry is not a `MultiPolygon` (or that have
/// a single part) are returned unchanged.
///
/// # Errors
///
/// Returns [`CatalogError::Conversion`] if the document is not valid
/// `GeoJSON` or its coordinates cannot be interpreted.
pub fn largest_single_part(
    boundary: &serde_json::Value,
) -> Result<serde_json::Value, CatalogError> {
    let document =
        GeoJson::from_json_value(boundary.clone()).map_err(|e| CatalogError::Conversion {
            message: format!("boundary is not valid GeoJSON: {e}"),
        })?;

    let Some(geometry) = first_geometry(&document) else {
        return Ok(boundary.clone());
    };
    if !matches!(geometry.value, geojson::Value::MultiPolygon(_)) {
        return Ok(boundary.clone());
    }

    let multi: MultiPolygon<f64> =
        geometry
            .value
            .clone()
            .try_into()
            .map_err(|e| CatalogError::Conversion {
                message: format!("cannot read MultiPolygon coordinates: {e}"),
            })?;

    if multi.0.len() <= 1 {
        return Ok(boundary.clone());
    }

    let Some(largest) = multi
        .0
        .iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
    else {
        return Ok(boundary.clone());
    };

    log::debug!(
        "Reduced {}-part boundary to its largest part",
        multi.0.len()
    );

    let feature = Feature {
        bbox: None,
        geometry: Some(Geometry::new(polygon_value(largest))),
        id: None,
        properties: None,
        foreign_members: None,
    };

    Ok(serde_json::to_value(GeoJson::Feature(feature))?)
}

/// The first geometry in a `GeoJSON` document, however it is wrapped.
fn first_geometry(document: &GeoJson) -> Option<&Geometry> {
    match document {
        GeoJson::Geometry(geometry) => Some(geometry),
        GeoJson::Feature(feature) => feature.geometry.as_ref(),
        GeoJson::FeatureCollection(collection) => {
            collection.features.iter().find_map(|f| f.geometry.as_ref())
        }
    }
}

fn polygon_value(polygon: &Polygon<f64>) -> geojson::Value {
    geojson::Value::from(polygon)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn square(origin: f64, size: f64) -> serde_json::Value {
        json!([[
            [origin, origin],
            [origin + size, origin],
            [origin + size, origin + size],
            [origin, origin + size],
            [origin, origin]
        ]])
    }

    #[test]
    fn keeps_largest_part_of_multipolygon() {
        let boundary = json!({
            "type": "Feature",
            "properties": {"name": "island city"},
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [square(0.0, 1.0), square(10.0, 5.0)]
            }
        });

        let reduced = largest_single_part(&boundary).unwrap();
        assert_eq!(reduced["geometry"]["type"], "Polygon");

        let ring = reduced["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring[0], json!([10.0, 10.0]));
    }

    #[test]
    fn single_part_boundary_passes_through() {
        let boundary = json!({
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Polygon", "coordinates": square(0.0, 1.0)}
        });
        assert_eq!(largest_single_part(&boundary).unwrap(), boundary);
    }

    #[test]
    fn feature_collection_geometry_is_found() {
        let boundary = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [square(0.0, 2.0), square(5.0, 1.0)]
                }
            }]
        });

        let reduced = largest_single_part(&boundary).unwrap();
        assert_eq!(reduced["geometry"]["type"], "Polygon");
        let ring = reduced["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring[0], json!([0.0, 0.0]));
    }

    #[test]
    fn invalid_document_is_rejected() {
        let err = largest_single_part(&json!({"type": "Nope"})).unwrap_err();
        assert!(matches!(err, CatalogError::Conversion { .. }));
    }
}
