//! # Property JSON Bridge
//!
//! Translates between [`PropertyMap`]s and wire JSON. The bridge is the only
//! place where untrusted JSON meets the property system, so it enforces two
//! rules the rest of the engine relies on:
//!
//! - a stored property's kind never changes, whatever the client sent
//! - an update either applies completely or not at all; the first bad entry
//!   rejects the payload before any property is touched
//!
//! Unknown names and read-only properties are dropped silently, which lets
//! clients round-trip a full property object back unchanged.

use cajal_common::{EnumProperty, Property, PropertyError, PropertyMap, PropertyResult, PropertyValue};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::json_schema::{JsonSchema, JsonType};

// ============================================================================
// Map -> JSON
// ============================================================================

/// Serialize every property of `map` into one JSON object.
pub fn to_json(map: &PropertyMap) -> Value {
    let mut object = Map::new();
    for property in map.iter() {
        object.insert(property.name().to_string(), value_to_json(property.value()));
    }
    Value::Object(object)
}

/// The JSON form of a single value. Enums serialize as their current name.
pub fn value_to_json(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Bool(v) => Value::Bool(*v),
        PropertyValue::Int(v) => Value::from(*v),
        PropertyValue::Double(v) => Value::from(*v),
        PropertyValue::String(v) => Value::String(v.clone()),
        PropertyValue::Enum(v) => Value::String(v.current().unwrap_or("").to_string()),
        PropertyValue::Vec2i(v) => Value::from(v.to_vec()),
        PropertyValue::Vec2d(v) => Value::from(v.to_vec()),
        PropertyValue::Vec3i(v) => Value::from(v.to_vec()),
        PropertyValue::Vec3d(v) => Value::from(v.to_vec()),
        PropertyValue::Vec4d(v) => Value::from(v.to_vec()),
    }
}

// ============================================================================
// JSON -> Map
// ============================================================================

/// Apply a JSON object onto `map`, kind-checked entry by entry.
///
/// Every entry is validated against its stored property before anything is
/// written, so a failing payload leaves the map exactly as it was.
pub fn update_from_json(map: &mut PropertyMap, json: &Value) -> PropertyResult<()> {
    let Some(object) = json.as_object() else {
        return Err(PropertyError::ConversionFailed(format!(
            "property update payload must be an object, got {}",
            JsonType::of(json)
        )));
    };

    let mut staged = Vec::with_capacity(object.len());
    for (name, value) in object {
        let Some(property) = map.find(name) else {
            debug!(%name, "ignoring unknown property");
            continue;
        };
        if property.read_only {
            debug!(%name, "ignoring read-only property");
            continue;
        }
        staged.push((name.clone(), coerce(property, value)?));
    }
    for (name, value) in staged {
        map.update(&name, &value)?;
    }
    Ok(())
}

/// Build the value for one property from its JSON form, at the stored kind.
fn coerce(property: &Property, json: &Value) -> PropertyResult<PropertyValue> {
    let value = match property.value() {
        PropertyValue::Bool(_) => {
            PropertyValue::Bool(json.as_bool().ok_or_else(|| shape_error(property, json))?)
        }
        PropertyValue::Int(_) => PropertyValue::Int(expect_i32(property, json)?),
        PropertyValue::Double(_) => {
            PropertyValue::Double(json.as_f64().ok_or_else(|| shape_error(property, json))?)
        }
        PropertyValue::String(_) => PropertyValue::String(
            json.as_str()
                .ok_or_else(|| shape_error(property, json))?
                .to_string(),
        ),
        PropertyValue::Enum(current) => {
            let values = current.values().to_vec();
            if let Some(name) = json.as_str() {
                PropertyValue::Enum(EnumProperty::from_name(values, name)?)
            } else if json.is_i64() || json.is_u64() {
                let index = expect_i32(property, json)?;
                PropertyValue::Enum(EnumProperty::from_index(values, index)?)
            } else {
                return Err(shape_error(property, json));
            }
        }
        PropertyValue::Vec2i(_) => PropertyValue::Vec2i(expect_i32_array(property, json)?),
        PropertyValue::Vec2d(_) => PropertyValue::Vec2d(expect_f64_array(property, json)?),
        PropertyValue::Vec3i(_) => PropertyValue::Vec3i(expect_i32_array(property, json)?),
        PropertyValue::Vec3d(_) => PropertyValue::Vec3d(expect_f64_array(property, json)?),
        PropertyValue::Vec4d(_) => PropertyValue::Vec4d(expect_f64_array(property, json)?),
    };
    Ok(value)
}

fn expect_i32(property: &Property, json: &Value) -> PropertyResult<i32> {
    json.as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| shape_error(property, json))
}

fn expect_i32_array<const N: usize>(property: &Property, json: &Value) -> PropertyResult<[i32; N]> {
    let elements = expect_elements::<N>(property, json)?;
    let mut out = [0i32; N];
    for (slot, element) in out.iter_mut().zip(elements) {
        *slot = expect_i32(property, element)?;
    }
    Ok(out)
}

fn expect_f64_array<const N: usize>(property: &Property, json: &Value) -> PropertyResult<[f64; N]> {
    let elements = expect_elements::<N>(property, json)?;
    let mut out = [0f64; N];
    for (slot, element) in out.iter_mut().zip(elements) {
        *slot = element.as_f64().ok_or_else(|| shape_error(property, json))?;
    }
    Ok(out)
}

fn expect_elements<'a, const N: usize>(
    property: &Property,
    json: &'a Value,
) -> PropertyResult<&'a [Value]> {
    match json.as_array() {
        Some(elements) if elements.len() == N => Ok(elements),
        _ => Err(shape_error(property, json)),
    }
}

fn shape_error(property: &Property, json: &Value) -> PropertyError {
    PropertyError::ConversionFailed(format!(
        "property '{}' expects a {} value, got {}",
        property.name(),
        property.kind().as_str(),
        JsonType::of(json)
    ))
}

// ============================================================================
// Map -> Schema
// ============================================================================

/// Describe `map` as an object schema, one child schema per property.
pub fn schema(map: &PropertyMap, title: &str) -> JsonSchema {
    let mut properties = BTreeMap::new();
    for property in map.iter() {
        properties.insert(property.name().to_string(), property_schema(property));
    }
    JsonSchema {
        title: Some(title.to_string()),
        kind: Some(JsonType::Object),
        properties,
        ..JsonSchema::default()
    }
}

fn property_schema(property: &Property) -> JsonSchema {
    let mut schema = match property.value() {
        PropertyValue::Bool(_) => JsonSchema::typed(JsonType::Boolean),
        PropertyValue::Int(_) => JsonSchema::typed(JsonType::Integer),
        PropertyValue::Double(_) => JsonSchema::typed(JsonType::Number),
        PropertyValue::String(_) => JsonSchema::typed(JsonType::String),
        PropertyValue::Enum(e) => JsonSchema {
            kind: Some(JsonType::String),
            enum_values: e.values().to_vec(),
            ..JsonSchema::default()
        },
        PropertyValue::Vec2i(_) | PropertyValue::Vec3i(_) => {
            JsonSchema::array_of(JsonSchema::typed(JsonType::Integer))
        }
        PropertyValue::Vec2d(_) | PropertyValue::Vec3d(_) | PropertyValue::Vec4d(_) => {
            JsonSchema::array_of(JsonSchema::typed(JsonType::Number))
        }
    };
    schema.title = Some(property.label.clone());
    if !property.description.is_empty() {
        schema.description = Some(property.description.clone());
    }
    schema.minimum = property.min;
    schema.maximum = property.max;
    schema.read_only = property.read_only;
    schema
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loader_properties() -> PropertyMap {
        let mut map = PropertyMap::new();
        map.add(Property::new("radius", 1.0).with_limits(0.0, 10.0))
            .unwrap();
        map.add(Property::new("segments", 16)).unwrap();
        map.add(Property::new("name", "soma".to_string())).unwrap();
        map.add(Property::new("visible", true)).unwrap();
        map.add(Property::new("offset", [0.0, 0.0, 0.0])).unwrap();
        map.add(Property::new(
            "shading",
            EnumProperty::new(vec!["none".to_string(), "electron".to_string()]),
        ))
        .unwrap();
        map.add(
            Property::new("format", "binary".to_string())
                .with_description("On-disk encoding")
                .read_only(),
        )
        .unwrap();
        map
    }

    #[test]
    fn test_json_round_trip_restores_every_value() {
        let mut source = loader_properties();
        source.update("radius", &PropertyValue::Double(2.5)).unwrap();
        source
            .update("shading", &PropertyValue::Int(1))
            .unwrap();

        let mut target = loader_properties();
        update_from_json(&mut target, &to_json(&source)).unwrap();

        assert_eq!(target.value::<f64>("radius").unwrap(), 2.5);
        assert_eq!(target.value::<i32>("segments").unwrap(), 16);
        assert_eq!(
            target.value::<EnumProperty>("shading").unwrap().current(),
            Some("electron")
        );
        assert_eq!(target.value::<[f64; 3]>("offset").unwrap(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_update_preserves_stored_kinds() {
        let mut map = loader_properties();
        // JSON integers land in double-typed slots without changing the kind
        update_from_json(&mut map, &json!({"radius": 3})).unwrap();
        let radius = map.find("radius").unwrap();
        assert_eq!(radius.kind(), cajal_common::PropertyType::Double);
        assert_eq!(radius.get::<f64>(), 3.0);

        // the reverse is rejected: a fraction cannot land in an int slot
        let err = update_from_json(&mut map, &json!({"segments": 2.5})).unwrap_err();
        assert!(matches!(err, PropertyError::ConversionFailed(_)));
        assert_eq!(map.value::<i32>("segments").unwrap(), 16);
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let mut map = loader_properties();
        update_from_json(&mut map, &json!({"radius": 4.0, "no_such": "thing"})).unwrap();
        assert_eq!(map.value::<f64>("radius").unwrap(), 4.0);
        assert!(!map.has("no_such"));
    }

    #[test]
    fn test_read_only_properties_are_skipped() {
        let mut map = loader_properties();
        update_from_json(&mut map, &json!({"format": "ascii"})).unwrap();
        assert_eq!(map.value::<String>("format").unwrap(), "binary");
    }

    #[test]
    fn test_failing_entry_leaves_map_untouched() {
        let mut map = loader_properties();
        // "radius" sorts before "shading"; without staging it would apply first
        let err = update_from_json(&mut map, &json!({"radius": 9.0, "shading": "bogus"}));
        assert!(err.is_err());
        assert_eq!(map.value::<f64>("radius").unwrap(), 1.0);
        assert_eq!(
            map.value::<EnumProperty>("shading").unwrap().current(),
            Some("none")
        );
    }

    #[test]
    fn test_enum_updates_by_name_or_index() {
        let mut map = loader_properties();
        update_from_json(&mut map, &json!({"shading": "electron"})).unwrap();
        assert_eq!(map.value::<EnumProperty>("shading").unwrap().index(), 1);

        update_from_json(&mut map, &json!({"shading": 0})).unwrap();
        assert_eq!(
            map.value::<EnumProperty>("shading").unwrap().current(),
            Some("none")
        );

        assert!(update_from_json(&mut map, &json!({"shading": 7})).is_err());
        assert!(update_from_json(&mut map, &json!({"shading": true})).is_err());
    }

    #[test]
    fn test_vector_length_is_enforced() {
        let mut map = loader_properties();
        let err = update_from_json(&mut map, &json!({"offset": [1.0, 2.0]}));
        assert!(err.is_err());
        update_from_json(&mut map, &json!({"offset": [1.0, 2.0, 3.0]})).unwrap();
        assert_eq!(map.value::<[f64; 3]>("offset").unwrap(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        let mut map = loader_properties();
        assert!(update_from_json(&mut map, &json!([1, 2, 3])).is_err());
        assert!(update_from_json(&mut map, &json!("radius=2")).is_err());
    }

    #[test]
    fn test_schema_describes_kinds_limits_and_flags() {
        let described = serde_json::to_value(schema(&loader_properties(), "sphere-loader")).unwrap();

        assert_eq!(described["title"], json!("sphere-loader"));
        assert_eq!(described["type"], json!("object"));
        assert_eq!(described["properties"]["radius"]["type"], json!("number"));
        assert_eq!(described["properties"]["radius"]["minimum"], json!(0.0));
        assert_eq!(described["properties"]["radius"]["maximum"], json!(10.0));
        assert_eq!(described["properties"]["segments"]["type"], json!("integer"));
        assert_eq!(described["properties"]["visible"]["type"], json!("boolean"));
        assert_eq!(
            described["properties"]["shading"]["enum"],
            json!(["none", "electron"])
        );
        assert_eq!(
            described["properties"]["offset"]["items"]["type"],
            json!("number")
        );
        assert_eq!(described["properties"]["format"]["readOnly"], json!(true));
        assert_eq!(
            described["properties"]["format"]["description"],
            json!("On-disk encoding")
        );
    }
}
