//! Converting between GeoJSON features and outlet requests and records.
//!
//! An input feature is the polygon of an outlet's most downstream unit catchment, with the
//! properties `id`, `lat`, `lng`, `basin` and optionally `single` (defaults to `false`).

use geo::MultiPolygon;
use geojson::{Feature, Geometry};
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use thiserror::Error;

use crate::batch::{OutletRecord, OutletRequest};

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("feature {index} has no id")]
    MissingId { index: usize },

    #[error("outlet {id} has no usable `{key}` property")]
    MissingProperty { id: String, key: &'static str },

    #[error("outlet {id} has basin code {basin}, which does not fit in 32 bits")]
    BasinOutOfRange { id: String, basin: u64 },

    #[error("outlet {id} has no polygon geometry")]
    NotAPolygon { id: String },

    #[error("outlet {id} has an invalid geometry: {source}")]
    Geometry {
        id: String,
        #[source]
        source: geojson::Error,
    },
}

fn number(feature: &Feature, id: &str, key: &'static str) -> Result<f64, FeatureError> {
    feature
        .property(key)
        .and_then(JsonValue::as_f64)
        .ok_or_else(|| FeatureError::MissingProperty { id: id.to_string(), key })
}

/// Builds the request for feature number `index` of the input collection.
pub fn to_request(index: usize, feature: Feature) -> Result<OutletRequest, FeatureError> {
    let id = match feature.property("id") {
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => return Err(FeatureError::MissingId { index }),
    };
    let lat = number(&feature, &id, "lat")?;
    let lng = number(&feature, &id, "lng")?;
    let basin = feature
        .property("basin")
        .and_then(JsonValue::as_u64)
        .ok_or_else(|| FeatureError::MissingProperty { id: id.clone(), key: "basin" })?;
    let basin = u32::try_from(basin).map_err(|_| FeatureError::BasinOutOfRange { id: id.clone(), basin })?;
    let is_single_catchment = feature.property("single").and_then(JsonValue::as_bool).unwrap_or(false);

    let Some(geometry) = feature.geometry else {
        return Err(FeatureError::NotAPolygon { id });
    };
    let catchment = match geo::Geometry::<f64>::try_from(geometry) {
        Ok(geo::Geometry::Polygon(p)) => MultiPolygon::new(vec![p]),
        Ok(geo::Geometry::MultiPolygon(mp)) => mp,
        Ok(_) => return Err(FeatureError::NotAPolygon { id }),
        Err(source) => return Err(FeatureError::Geometry { id, source }),
    };

    Ok(OutletRequest { id, basin, lat, lng, catchment, is_single_catchment })
}

/// The output feature for one outlet; unresolved outlets have no geometry and an `error` property.
pub fn to_feature(record: OutletRecord) -> Feature {
    let mut properties = JsonMap::new();
    properties.insert("id".to_string(), json!(record.id));
    properties.insert("lat".to_string(), json!(record.lat));
    properties.insert("lng".to_string(), json!(record.lng));
    if let Some(error) = &record.error {
        properties.insert("error".to_string(), json!(error.to_string()));
    }
    Feature {
        bbox: None,
        geometry: record.polygon.as_ref().map(|p| Geometry::new(geojson::Value::from(p))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
