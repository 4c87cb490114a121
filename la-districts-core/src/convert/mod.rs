//! ArcGIS REST feature-query JSON to GeoJSON (RFC 7946) conversion.

pub mod geometry;

use std::fs;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::error::ConversionError;
use geometry::{Crs, GeometryReader};

pub fn arcgis_to_geojson(response: &Map<String, Value>) -> Result<Value, ConversionError> {
    let features = match response.get("features") {
        None => return Err(ConversionError::NoFeatures),
        Some(Value::Array(features)) => features,
        Some(_) => return Err(ConversionError::FeaturesNotArray),
    };

    let reader = GeometryReader {
        crs: spatial_reference(response)?,
        has_z: response.get("hasZ").and_then(Value::as_bool).unwrap_or(false),
    };
    let id_field = response.get("objectIdFieldName").and_then(Value::as_str);

    let mut out = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let feature = feature.as_object().ok_or_else(|| ConversionError::MalformedGeometry {
            index,
            reason: "feature is not an object".to_string(),
        })?;

        let properties = match feature.get("attributes") {
            Some(Value::Object(attrs)) => Value::Object(attrs.clone()),
            _ => Value::Object(Map::new()),
        };
        let geometry = reader
            .convert(feature.get("geometry").unwrap_or(&Value::Null))
            .map_err(|reason| ConversionError::MalformedGeometry { index, reason })?;

        let mut converted = Map::new();
        converted.insert("type".into(), "Feature".into());
        if let Some(id) = id_field.and_then(|f| properties.get(f)).filter(|v| v.is_number()) {
            converted.insert("id".into(), id.clone());
        }
        converted.insert("properties".into(), properties);
        converted.insert("geometry".into(), geometry);
        out.push(Value::Object(converted));
    }

    Ok(json!({ "type": "FeatureCollection", "features": out }))
}

fn spatial_reference(response: &Map<String, Value>) -> Result<Crs, ConversionError> {
    let Some(sr) = response.get("spatialReference") else {
        return Ok(Crs::Wgs84);
    };
    let wkid = sr
        .get("latestWkid")
        .and_then(Value::as_i64)
        .or_else(|| sr.get("wkid").and_then(Value::as_i64));
    match wkid {
        None => Ok(Crs::Wgs84),
        Some(wkid) => {
            Crs::from_wkid(wkid).ok_or(ConversionError::UnsupportedSpatialReference(wkid))
        }
    }
}

pub fn write_geojson(collection: &Value, path: &Path) -> Result<(), ConversionError> {
    let text = serde_json::to_string_pretty(collection)?;
    fs::write(path, text)?;
    Ok(())
}
