//! GeoJSON polygon layers: local catchments, lake footprints, watersheds

use crate::error::{Error, Result};
use crate::io::tables::normalize_id;
use crate::vector::PolygonFeature;
use geo_types::{Geometry, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Read a polygon layer from a GeoJSON file, keyed by `id_property`.
pub fn read_polygons<P: AsRef<Path>>(path: P, id_property: &str) -> Result<HashMap<String, MultiPolygon<f64>>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    read_polygons_from_str(&text, id_property)
}

/// Parse a polygon layer from GeoJSON text, keyed by `id_property`.
///
/// Features sharing an id are merged into one multi-part polygon. Features
/// without an id, without geometry, or with non-areal geometry are skipped
/// with a warning.
pub fn read_polygons_from_str(text: &str, id_property: &str) -> Result<HashMap<String, MultiPolygon<f64>>> {
    let geojson: GeoJson = text.parse()?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err(Error::Data(
                "expected a Feature or FeatureCollection, found a bare geometry".to_string(),
            ))
        }
    };

    let mut polygons: HashMap<String, MultiPolygon<f64>> = HashMap::new();
    let mut skipped = 0_usize;

    for feature in features {
        let Some(id) = feature.property(id_property).and_then(json_id) else {
            skipped += 1;
            continue;
        };
        let Some(geometry) = feature.geometry else {
            warn!("feature '{}' has no geometry, skipped", id);
            skipped += 1;
            continue;
        };
        let parts = match Geometry::<f64>::try_from(geometry)? {
            Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            Geometry::MultiPolygon(mp) => mp,
            _ => {
                warn!("feature '{}' is not a polygon, skipped", id);
                skipped += 1;
                continue;
            }
        };
        polygons
            .entry(id)
            .or_insert_with(|| MultiPolygon::new(vec![]))
            .0
            .extend(parts.0);
    }

    if skipped > 0 {
        warn!("{} features without a usable '{}' id or polygon were skipped", skipped, id_property);
    }
    debug!("read {} polygons keyed by '{}'", polygons.len(), id_property);
    Ok(polygons)
}

fn json_id(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => normalize_id(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().and_then(|f| normalize_id(&format!("{:.1}", f)))
            }
        }
        _ => None,
    }
}

/// Serialize polygon features as a GeoJSON FeatureCollection.
pub fn write_polygons_to_string(features: &[PolygonFeature]) -> String {
    let features = features
        .iter()
        .map(|f| {
            let properties: JsonObject = f
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(Value::from(&f.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    GeoJson::from(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
    .to_string()
}

/// Write polygon features to a GeoJSON file.
pub fn write_polygons<P: AsRef<Path>>(path: P, features: &[PolygonFeature]) -> Result<()> {
    std::fs::write(path.as_ref(), write_polygons_to_string(features))?;
    Ok(())
}
