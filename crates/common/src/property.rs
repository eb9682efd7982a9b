//! # Property System
//!
//! Named, ordered collections of runtime-typed values. PropertyMaps carry
//! loader options, material extensions and renderer settings across the
//! network boundary, so every mutation path is checked: stored types never
//! change silently and impossible conversions surface as errors.

use std::sync::Arc;

use crate::any::{PropertyData, PropertyType, PropertyValue};
use crate::conversion::{converters, ConverterRegistry};
use crate::error::{PropertyError, PropertyResult};

/// Callback fired after a property value changed.
pub type ModifiedCallback = Arc<dyn Fn(&Property) + Send + Sync>;

// ============================================================================
// Property
// ============================================================================

/// A single named value with UI metadata and an optional modified callback.
#[derive(Clone)]
pub struct Property {
    name: String,
    /// Human-readable label for UI panels.
    pub label: String,
    /// One-line description for UI panels and schema output.
    pub description: String,
    /// Numeric range hint, exposed in generated schemas.
    pub min: Option<f64>,
    /// Numeric range hint, exposed in generated schemas.
    pub max: Option<f64>,
    /// Read-only properties are skipped by the network update path.
    pub read_only: bool,
    value: PropertyValue,
    on_modified: Option<ModifiedCallback>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl PropertyData) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            description: String::new(),
            min: None,
            max: None,
            read_only: false,
            value: value.into_value(),
            on_modified: None,
            name,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_limits(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyType {
        self.value.kind()
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn try_get<T: PropertyData>(&self) -> Option<T> {
        self.value.try_get()
    }

    /// See [`PropertyValue::get`] for the panic contract.
    pub fn get<T: PropertyData>(&self) -> T {
        self.value.get()
    }

    /// Replace the value with one of the same kind.
    pub fn set<T: PropertyData>(&mut self, value: T) -> PropertyResult<()> {
        if T::property_type() != self.value.kind() {
            return Err(PropertyError::TypeMismatch {
                name: self.name.clone(),
                stored: self.value.kind(),
                incoming: T::property_type(),
            });
        }
        self.value = value.into_value();
        self.notify();
        Ok(())
    }

    /// Copy `from` into this property, converting if the kinds differ.
    ///
    /// The stored kind never changes: on success the value is overwritten in
    /// place, on failure the property is untouched.
    pub fn copy_value(&mut self, from: &PropertyValue) -> PropertyResult<()> {
        self.copy_value_with(from, converters())
    }

    /// [`Property::copy_value`] against a caller-supplied registry.
    pub fn copy_value_with(
        &mut self,
        from: &PropertyValue,
        registry: &ConverterRegistry,
    ) -> PropertyResult<()> {
        registry.convert(from, &mut self.value)?;
        self.notify();
        Ok(())
    }

    /// Register the modified callback. A second registration replaces the
    /// first; callbacks do not accumulate.
    pub fn on_modified(&mut self, callback: ModifiedCallback) {
        self.on_modified = Some(callback);
    }

    fn notify(&self) {
        if let Some(cb) = self.on_modified.clone() {
            cb(self);
        }
    }
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("read_only", &self.read_only)
            .finish()
    }
}

// ============================================================================
// PropertyMap
// ============================================================================

/// Ordered collection of properties, unique by name.
///
/// Lookup is linear; maps stay small (tens of entries) and iteration order is
/// part of the contract, so a vector beats a hash map here.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    properties: Vec<Property>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `property`, or replace the value of an existing property with
    /// the same name. Replacement requires the exact same kind.
    pub fn add(&mut self, property: Property) -> PropertyResult<()> {
        match self.find_mut(property.name()) {
            Some(existing) => {
                if existing.kind() != property.kind() {
                    return Err(PropertyError::TypeMismatch {
                        name: property.name().to_string(),
                        stored: existing.kind(),
                        incoming: property.kind(),
                    });
                }
                existing.copy_value(property.value())
            }
            None => {
                self.properties.push(property);
                Ok(())
            }
        }
    }

    /// Update an existing property, converting if needed. Unknown names are
    /// a no-op; impossible conversions are an error, never a silent drop.
    pub fn update(&mut self, name: &str, value: &PropertyValue) -> PropertyResult<()> {
        match self.find_mut(name) {
            Some(p) => p.copy_value(value),
            None => Ok(()),
        }
    }

    /// Fold `other` into this map: existing names are converted in place,
    /// new names are appended (preserving `other`'s order).
    pub fn merge(&mut self, other: &PropertyMap) -> PropertyResult<()> {
        for incoming in other.iter() {
            match self.find_mut(incoming.name()) {
                Some(p) => p.copy_value(incoming.value())?,
                None => self.properties.push(incoming.clone()),
            }
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name() == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Exact-kind read. Missing names and kind mismatches are errors.
    pub fn value<T: PropertyData>(&self, name: &str) -> PropertyResult<T> {
        let p = self
            .find(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        p.try_get().ok_or(PropertyError::TypeMismatch {
            name: name.to_string(),
            stored: p.kind(),
            incoming: T::property_type(),
        })
    }

    /// Converting read with a fallback.
    ///
    /// Returns `default` only when `name` is missing entirely. When the name
    /// exists, the stored value is converted to the kind of `default`; a
    /// failing or unregistered conversion is an error, not the default.
    pub fn value_or<T: PropertyData>(&self, name: &str, default: T) -> PropertyResult<T> {
        match self.find(name) {
            Some(p) => converters().convert_to(p.value(), default),
            None => Ok(default),
        }
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.properties.iter_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name())
    }
}
