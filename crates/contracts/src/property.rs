//! Property declarations
//!
//! A `PropertyDescriptor` names one derived property, the dependencies it
//! reads (each with a history window) and the function computing it.
//! Descriptors are built once, at VObj-type definition time, and are
//! immutable afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{
    ObjectRecord, Value, VideoMetadata, FIELD_CLASS_ID, FIELD_SCORE, FIELD_TLBR, FIELD_TRACK_ID,
};

/// Synthetic dependency: the frame cropped to the object's box
pub const DEP_IMAGE: &str = "image";
/// Synthetic dependency: current frame id
pub const DEP_FRAME_ID: &str = "frame_id";

/// Fields written by the detector and tracker, never projected
pub const BUILTIN_PROPERTIES: [&str; 4] = [FIELD_TLBR, FIELD_SCORE, FIELD_CLASS_ID, FIELD_TRACK_ID];

/// Whether `name` is a built-in field
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_PROPERTIES.contains(&name)
}

/// Whether `name` is supplied by the frame rather than by the object record
pub fn is_synthetic(name: &str) -> bool {
    name == DEP_IMAGE || name == DEP_FRAME_ID || VideoMetadata::KEYS.contains(&name)
}

/// Signature of a property function
pub type PropertyFn = Arc<dyn Fn(&PropertyInputs<'_>) -> Value + Send + Sync>;

/// One dependency as handed to a property function
#[derive(Debug, Clone)]
pub enum Input {
    /// Window 0: the current-frame value
    Current(Value),
    /// Window k: the trailing k+1 values, oldest first, current last
    Window(Vec<Value>),
}

/// Arguments of one property function call
#[derive(Debug)]
pub struct PropertyInputs<'a> {
    values: HashMap<String, Input>,
    snapshot: &'a [ObjectRecord],
}

impl<'a> PropertyInputs<'a> {
    pub fn new(snapshot: &'a [ObjectRecord]) -> Self {
        Self {
            values: HashMap::new(),
            snapshot,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, input: Input) {
        self.values.insert(name.into(), input);
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.values.get(name)
    }

    /// Current-frame value of a dependency (last element of a window)
    pub fn current(&self, name: &str) -> Option<&Value> {
        match self.values.get(name)? {
            Input::Current(v) => Some(v),
            Input::Window(values) => values.last(),
        }
    }

    /// Trailing values of a windowed dependency, oldest first
    pub fn window(&self, name: &str) -> Option<&[Value]> {
        match self.values.get(name)? {
            Input::Window(values) => Some(values),
            Input::Current(_) => None,
        }
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.current(name).and_then(Value::as_f64)
    }

    pub fn bbox(&self, name: &str) -> Option<[f64; 4]> {
        self.current(name).and_then(Value::as_bbox)
    }

    /// Read-only view of every object of the same class in this frame
    pub fn snapshot(&self) -> &[ObjectRecord] {
        self.snapshot
    }
}

/// Declaration of one derived property
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: String,
    dependencies: Vec<(String, usize)>,
    func: PropertyFn,
    default: Value,
}

impl PropertyDescriptor {
    /// Start declaring a property
    pub fn builder(name: impl Into<String>) -> PropertyBuilder {
        PropertyBuilder {
            name: name.into(),
            dependencies: Vec::new(),
            default: Value::Null,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dependencies in declaration order, with their window length
    pub fn dependencies(&self) -> &[(String, usize)] {
        &self.dependencies
    }

    pub fn window(&self, dependency: &str) -> Option<usize> {
        self.dependencies
            .iter()
            .find(|(name, _)| name == dependency)
            .map(|(_, window)| *window)
    }

    /// Needs more than the current frame's values
    pub fn is_stateful(&self) -> bool {
        self.dependencies.iter().any(|(_, window)| *window > 0)
    }

    /// Reads its own past values
    pub fn is_self_dependent(&self) -> bool {
        self.window(&self.name).is_some()
    }

    /// Largest window over all dependencies
    pub fn max_window(&self) -> usize {
        self.dependencies
            .iter()
            .map(|(_, window)| *window)
            .max()
            .unwrap_or(0)
    }

    /// Value used for self-dependent slots when history is missing
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Invoke the property function
    pub fn call(&self, inputs: &PropertyInputs<'_>) -> Value {
        (self.func)(inputs)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

/// Declarative builder for [`PropertyDescriptor`]
#[derive(Debug)]
pub struct PropertyBuilder {
    name: String,
    dependencies: Vec<(String, usize)>,
    default: Value,
}

impl PropertyBuilder {
    /// Depend on a value with the given history window (0 = current frame only).
    ///
    /// Declaring the same dependency twice keeps the larger window.
    pub fn depends_on(mut self, dependency: impl Into<String>, window: usize) -> Self {
        let dependency = dependency.into();
        match self.dependencies.iter_mut().find(|(n, _)| *n == dependency) {
            Some((_, w)) => *w = (*w).max(window),
            None => self.dependencies.push((dependency, window)),
        }
        self
    }

    /// Depend on the current-frame value only
    pub fn input(self, dependency: impl Into<String>) -> Self {
        self.depends_on(dependency, 0)
    }

    /// Depend on this property's own previous `window` values
    pub fn own_history(self, window: usize) -> Self {
        let name = self.name.clone();
        self.depends_on(name, window)
    }

    /// Value used for self-dependent slots when history is missing (default `Null`)
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = value;
        self
    }

    /// Finish with the property function
    pub fn compute<F>(self, func: F) -> PropertyDescriptor
    where
        F: Fn(&PropertyInputs<'_>) -> Value + Send + Sync + 'static,
    {
        PropertyDescriptor {
            name: self.name,
            dependencies: self.dependencies,
            func: Arc::new(func),
            default: self.default,
        }
    }
}
