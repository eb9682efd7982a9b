//! # Value Conversion
//!
//! Checked conversions between [`PropertyValue`] kinds. Conversions always
//! write into a pre-typed destination slot: the destination keeps its kind
//! (and, for enums, its allowed-name list) and only its value is overwritten.
//! Unknown pairs are an error value at the call site, never a panic.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::any::{PropertyData, PropertyType, PropertyValue};
use crate::error::{PropertyError, PropertyResult};

/// Converts `from` into the pre-typed slot `to`.
pub type ConverterFn = fn(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()>;

/// Conversion table keyed by the ordered (source, destination) type pair.
pub struct ConverterRegistry {
    converters: HashMap<(PropertyType, PropertyType), ConverterFn>,
}

impl ConverterRegistry {
    /// A registry with no conversions. Same-kind copies still succeed.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// The built-in table: int <-> double <-> string, int/string <-> enum.
    pub fn standard() -> Self {
        let mut r = Self::empty();
        r.register(PropertyType::Int, PropertyType::Double, int_to_double);
        r.register(PropertyType::Double, PropertyType::Int, double_to_int);
        r.register(PropertyType::Int, PropertyType::String, int_to_string);
        r.register(PropertyType::String, PropertyType::Int, string_to_int);
        r.register(PropertyType::Double, PropertyType::String, double_to_string);
        r.register(PropertyType::String, PropertyType::Double, string_to_double);
        r.register(PropertyType::Int, PropertyType::Enum, int_to_enum);
        r.register(PropertyType::Enum, PropertyType::Int, enum_to_int);
        r.register(PropertyType::String, PropertyType::Enum, string_to_enum);
        r.register(PropertyType::Enum, PropertyType::String, enum_to_string);
        r
    }

    /// Later registrations for the same pair replace earlier ones.
    pub fn register(&mut self, from: PropertyType, to: PropertyType, f: ConverterFn) {
        self.converters.insert((from, to), f);
    }

    pub fn can_convert(&self, from: PropertyType, to: PropertyType) -> bool {
        from == to || self.converters.contains_key(&(from, to))
    }

    /// Copy or convert `from` into `to`. `to` keeps its kind.
    pub fn convert(&self, from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
        if from.kind() == to.kind() {
            *to = from.clone();
            return Ok(());
        }
        let f = self
            .converters
            .get(&(from.kind(), to.kind()))
            .ok_or(PropertyError::NoConverter {
                from: from.kind(),
                to: to.kind(),
            })?;
        f(from, to)
    }

    /// Convert `from` into the kind of `seed` and extract the result.
    ///
    /// The seed supplies the destination kind and, for enums, the allowed
    /// names the converted value is checked against.
    pub fn convert_to<T: PropertyData>(&self, from: &PropertyValue, seed: T) -> PropertyResult<T> {
        let mut slot = seed.into_value();
        self.convert(from, &mut slot)?;
        Ok(slot.get::<T>())
    }
}

/// The process-wide registry with the standard table, built on first use.
pub fn converters() -> &'static ConverterRegistry {
    static CONVERTERS: LazyLock<ConverterRegistry> = LazyLock::new(ConverterRegistry::standard);
    &CONVERTERS
}

// ============================================================================
// Built-in Converters
// ============================================================================

fn mismatch(what: &str) -> PropertyError {
    PropertyError::ConversionFailed(format!("converter applied to wrong kinds: {what}"))
}

fn int_to_double(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
    match (from, to) {
        (PropertyValue::Int(v), PropertyValue::Double(out)) => {
            *out = f64::from(*v);
            Ok(())
        }
        _ => Err(mismatch("int -> double")),
    }
}

fn double_to_int(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
    match (from, to) {
        (PropertyValue::Double(v), PropertyValue::Int(out)) => {
            *out = *v as i32;
            Ok(())
        }
        _ => Err(mismatch("double -> int")),
    }
}

fn int_to_string(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
    match (from, to) {
        (PropertyValue::Int(v), PropertyValue::String(out)) => {
            *out = v.to_string();
            Ok(())
        }
        _ => Err(mismatch("int -> string")),
    }
}

fn string_to_int(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
    match (from, to) {
        (PropertyValue::String(v), PropertyValue::Int(out)) => {
            *out = v
                .parse()
                .map_err(|_| PropertyError::ConversionFailed(format!("'{v}' is not an int")))?;
            Ok(())
        }
        _ => Err(mismatch("string -> int")),
    }
}

fn double_to_string(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
    match (from, to) {
        (PropertyValue::Double(v), PropertyValue::String(out)) => {
            *out = v.to_string();
            Ok(())
        }
        _ => Err(mismatch("double -> string")),
    }
}

fn string_to_double(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
    match (from, to) {
        (PropertyValue::String(v), PropertyValue::Double(out)) => {
            *out = v
                .parse()
                .map_err(|_| PropertyError::ConversionFailed(format!("'{v}' is not a double")))?;
            Ok(())
        }
        _ => Err(mismatch("string -> double")),
    }
}

fn int_to_enum(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
    match (from, to) {
        (PropertyValue::Int(v), PropertyValue::Enum(out)) => out.set_index(*v),
        _ => Err(mismatch("int -> enum")),
    }
}

fn enum_to_int(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
    match (from, to) {
        (PropertyValue::Enum(v), PropertyValue::Int(out)) => {
            *out = v.index();
            Ok(())
        }
        _ => Err(mismatch("enum -> int")),
    }
}

fn string_to_enum(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
    match (from, to) {
        (PropertyValue::String(v), PropertyValue::Enum(out)) => out.set_from_name(v),
        _ => Err(mismatch("string -> enum")),
    }
}

fn enum_to_string(from: &PropertyValue, to: &mut PropertyValue) -> PropertyResult<()> {
    match (from, to) {
        (PropertyValue::Enum(v), PropertyValue::String(out)) => {
            *out = v.current().unwrap_or("").to_string();
            Ok(())
        }
        _ => Err(mismatch("enum -> string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any::EnumProperty;

    fn shading_enum() -> EnumProperty {
        EnumProperty::new(vec![
            "none".to_string(),
            "diffuse".to_string(),
            "electron".to_string(),
        ])
    }

    #[test]
    fn test_same_kind_copies_without_converter() {
        let r = ConverterRegistry::empty();
        let mut to = PropertyValue::Int(0);
        r.convert(&PropertyValue::Int(42), &mut to).unwrap();
        assert_eq!(to, PropertyValue::Int(42));
    }

    #[test]
    fn test_int_double_round_trip() {
        let r = ConverterRegistry::standard();
        let mut d = PropertyValue::Double(0.0);
        r.convert(&PropertyValue::Int(3), &mut d).unwrap();
        assert_eq!(d, PropertyValue::Double(3.0));

        let mut i = PropertyValue::Int(0);
        r.convert(&PropertyValue::Double(7.9), &mut i).unwrap();
        assert_eq!(i, PropertyValue::Int(7));
    }

    #[test]
    fn test_unparseable_string_fails_loudly() {
        let r = ConverterRegistry::standard();
        let mut i = PropertyValue::Int(5);
        let err = r
            .convert(&PropertyValue::String("abc".to_string()), &mut i)
            .unwrap_err();
        assert!(matches!(err, PropertyError::ConversionFailed(_)));
        // failed conversion leaves the destination untouched
        assert_eq!(i, PropertyValue::Int(5));
    }

    #[test]
    fn test_missing_pair_is_an_error_value() {
        let r = ConverterRegistry::standard();
        let mut b = PropertyValue::Bool(false);
        let err = r.convert(&PropertyValue::Int(1), &mut b).unwrap_err();
        assert!(matches!(err, PropertyError::NoConverter { .. }));
    }

    #[test]
    fn test_enum_destination_keeps_its_name_list() {
        let r = ConverterRegistry::standard();
        let mut e = PropertyValue::Enum(shading_enum());
        r.convert(&PropertyValue::Int(2), &mut e).unwrap();
        let e = e.get::<EnumProperty>();
        assert_eq!(e.current(), Some("electron"));
        assert_eq!(e.values().len(), 3);
    }

    #[test]
    fn test_int_to_enum_out_of_range_fails() {
        let r = ConverterRegistry::standard();
        let mut e = PropertyValue::Enum(shading_enum());
        assert!(r.convert(&PropertyValue::Int(3), &mut e).is_err());
    }

    #[test]
    fn test_string_to_enum_by_name() {
        let r = ConverterRegistry::standard();
        let e = r
            .convert_to(
                &PropertyValue::String("diffuse".to_string()),
                shading_enum(),
            )
            .unwrap();
        assert_eq!(e.index(), 1);
    }

    #[test]
    fn test_global_registry_has_standard_table() {
        assert!(converters().can_convert(PropertyType::Int, PropertyType::Double));
        assert!(!converters().can_convert(PropertyType::Bool, PropertyType::Vec3d));
    }
}
