//! # Runtime-Typed Values
//!
//! The dynamic value layer under the property system. C-side callers of the
//! engine (network payloads, loader options, UI panels) deal in values whose
//! types are only known at runtime; [`PropertyValue`] is the closed set of
//! types the engine accepts, and [`PropertyData`] maps Rust types onto it.

use crate::error::{PropertyError, PropertyResult};

// ============================================================================
// Type Tags
// ============================================================================

/// Discriminant of a [`PropertyValue`]. Used as the key space of the
/// conversion registry and in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Bool,
    Int,
    Double,
    String,
    Enum,
    Vec2i,
    Vec2d,
    Vec3i,
    Vec3d,
    Vec4d,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Bool => "bool",
            PropertyType::Int => "int",
            PropertyType::Double => "double",
            PropertyType::String => "string",
            PropertyType::Enum => "enum",
            PropertyType::Vec2i => "vec2i",
            PropertyType::Vec2d => "vec2d",
            PropertyType::Vec3i => "vec3i",
            PropertyType::Vec3d => "vec3d",
            PropertyType::Vec4d => "vec4d",
        }
    }
}

// ============================================================================
// Enum Values
// ============================================================================

/// A value restricted to a list of allowed names.
///
/// Invariant: `index` is `-1` exactly when `values` is empty, otherwise it is
/// a valid index into `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumProperty {
    index: i32,
    values: Vec<String>,
}

impl EnumProperty {
    /// Selects the first name, or nothing if `values` is empty.
    pub fn new(values: Vec<String>) -> Self {
        let index = if values.is_empty() { -1 } else { 0 };
        Self { index, values }
    }

    /// Fails if `name` is not in `values`.
    pub fn from_name(values: Vec<String>, name: &str) -> PropertyResult<Self> {
        let index = values
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| PropertyError::InvalidEnumValue(name.to_string()))?;
        Ok(Self {
            index: index as i32,
            values,
        })
    }

    /// Fails if `index` is out of range.
    pub fn from_index(values: Vec<String>, index: i32) -> PropertyResult<Self> {
        let mut e = Self::new(values);
        e.set_index(index)?;
        Ok(e)
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    /// The selected name. `None` only for an empty value list.
    pub fn current(&self) -> Option<&str> {
        self.values.get(self.index as usize).map(String::as_str)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn set_index(&mut self, index: i32) -> PropertyResult<()> {
        if index < 0 || index as usize >= self.values.len() {
            return Err(PropertyError::InvalidEnumValue(format!(
                "index {index} out of range (0..{})",
                self.values.len()
            )));
        }
        self.index = index;
        Ok(())
    }

    pub fn set_from_name(&mut self, name: &str) -> PropertyResult<()> {
        let index = self
            .values
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| PropertyError::InvalidEnumValue(name.to_string()))?;
        self.index = index as i32;
        Ok(())
    }
}

// ============================================================================
// Value Union
// ============================================================================

/// A single runtime-typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    Enum(EnumProperty),
    Vec2i([i32; 2]),
    Vec2d([f64; 2]),
    Vec3i([i32; 3]),
    Vec3d([f64; 3]),
    Vec4d([f64; 4]),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyType {
        match self {
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::Int(_) => PropertyType::Int,
            PropertyValue::Double(_) => PropertyType::Double,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Enum(_) => PropertyType::Enum,
            PropertyValue::Vec2i(_) => PropertyType::Vec2i,
            PropertyValue::Vec2d(_) => PropertyType::Vec2d,
            PropertyValue::Vec3i(_) => PropertyType::Vec3i,
            PropertyValue::Vec3d(_) => PropertyType::Vec3d,
            PropertyValue::Vec4d(_) => PropertyType::Vec4d,
        }
    }

    /// Whether this value currently holds a `T`.
    pub fn holds<T: PropertyData>(&self) -> bool {
        self.kind() == T::property_type()
    }

    /// Checked extraction.
    pub fn try_get<T: PropertyData>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// Extraction for callers that know the stored type.
    ///
    /// # Panics
    /// Panics if the stored type is not `T`; use [`PropertyValue::try_get`]
    /// when the type is not statically known.
    pub fn get<T: PropertyData>(&self) -> T {
        match T::from_value(self) {
            Some(v) => v,
            None => panic!(
                "property value is {:?}, not {:?}",
                self.kind(),
                T::property_type()
            ),
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Double(v) => write!(f, "{v}"),
            PropertyValue::String(v) => write!(f, "{v}"),
            PropertyValue::Enum(v) => write!(f, "{}", v.current().unwrap_or("")),
            PropertyValue::Vec2i(v) => write!(f, "{v:?}"),
            PropertyValue::Vec2d(v) => write!(f, "{v:?}"),
            PropertyValue::Vec3i(v) => write!(f, "{v:?}"),
            PropertyValue::Vec3d(v) => write!(f, "{v:?}"),
            PropertyValue::Vec4d(v) => write!(f, "{v:?}"),
        }
    }
}

// ============================================================================
// Rust Type Mapping
// ============================================================================

/// Rust types that map onto exactly one [`PropertyValue`] variant.
pub trait PropertyData: Clone {
    fn property_type() -> PropertyType;
    fn into_value(self) -> PropertyValue;
    fn from_value(value: &PropertyValue) -> Option<Self>;
}

macro_rules! impl_property_data {
    ($ty:ty, $variant:ident, $kind:ident) => {
        impl PropertyData for $ty {
            fn property_type() -> PropertyType {
                PropertyType::$kind
            }

            fn into_value(self) -> PropertyValue {
                PropertyValue::$variant(self)
            }

            fn from_value(value: &PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_property_data!(bool, Bool, Bool);
impl_property_data!(i32, Int, Int);
impl_property_data!(f64, Double, Double);
impl_property_data!(String, String, String);
impl_property_data!(EnumProperty, Enum, Enum);
impl_property_data!([i32; 2], Vec2i, Vec2i);
impl_property_data!([f64; 2], Vec2d, Vec2d);
impl_property_data!([i32; 3], Vec3i, Vec3i);
impl_property_data!([f64; 3], Vec3d, Vec3d);
impl_property_data!([f64; 4], Vec4d, Vec4d);
