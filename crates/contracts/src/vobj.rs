//! VObj types: user-declared tracked object classes
//!
//! A VObj type binds a detector class name to a set of derived properties.
//! Types are built with [`VObjBuilder`] and shared as `Arc<VObjType>` so that
//! property references and predicates can point back at their owner.

use std::fmt;
use std::sync::Arc;

use crate::property::{is_builtin, is_synthetic};
use crate::PropertyDescriptor;

/// One tracked object type
#[derive(Debug, Clone)]
pub struct VObjType {
    name: String,
    class_name: String,
    detector: Option<String>,
    properties: Vec<PropertyDescriptor>,
}

impl VObjType {
    /// Start declaring a VObj type named `name` whose detections carry `class_name`
    pub fn builder(name: impl Into<String>, class_name: impl Into<String>) -> VObjBuilder {
        VObjBuilder {
            name: name.into(),
            class_name: class_name.into(),
            detector: None,
            properties: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Detector requested by this type, if any
    pub fn detector(&self) -> Option<&str> {
        self.detector.as_deref()
    }

    /// Derived properties in declaration order
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Position of a derived property in declaration order
    pub fn declaration_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name() == name)
    }

    /// Whether `name` resolves to a built-in, synthetic or declared property
    pub fn knows(&self, name: &str) -> bool {
        is_builtin(name) || is_synthetic(name) || self.property(name).is_some()
    }

    /// Reference one of this type's properties
    pub fn prop(self: &Arc<Self>, name: impl Into<String>) -> PropertyRef {
        PropertyRef {
            vobj: Arc::clone(self),
            name: name.into(),
        }
    }
}

/// Builder for [`VObjType`]
#[derive(Debug)]
pub struct VObjBuilder {
    name: String,
    class_name: String,
    detector: Option<String>,
    properties: Vec<PropertyDescriptor>,
}

impl VObjBuilder {
    pub fn detector(mut self, name: impl Into<String>) -> Self {
        self.detector = Some(name.into());
        self
    }

    /// Take over every property (and the detector, if unset) of `parent`
    pub fn inherit(mut self, parent: &VObjType) -> Self {
        if self.detector.is_none() {
            self.detector = parent.detector.clone();
        }
        for property in &parent.properties {
            self = self.property(property.clone());
        }
        self
    }

    /// Declare a property; a later declaration with the same name replaces the earlier one
    pub fn property(mut self, descriptor: PropertyDescriptor) -> Self {
        match self
            .properties
            .iter_mut()
            .find(|p| p.name() == descriptor.name())
        {
            Some(existing) => *existing = descriptor,
            None => self.properties.push(descriptor),
        }
        self
    }

    pub fn build(self) -> Arc<VObjType> {
        Arc::new(VObjType {
            name: self.name,
            class_name: self.class_name,
            detector: self.detector,
            properties: self.properties,
        })
    }
}

/// Reference to a property on a specific VObj type
#[derive(Clone)]
pub struct PropertyRef {
    vobj: Arc<VObjType>,
    name: String,
}

impl PropertyRef {
    pub fn vobj(&self) -> &Arc<VObjType> {
        &self.vobj
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this points at a built-in field
    pub fn is_builtin(&self) -> bool {
        is_builtin(&self.name)
    }
}

impl fmt::Debug for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.vobj.name(), self.name)
    }
}
