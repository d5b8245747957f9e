//! Dynamically typed property values
//!
//! Every field of an `ObjectRecord` (built-in or derived) is a `Value`.
//! `Value::Invalid` is the InvalidProperty sentinel: "could not be computed
//! this frame". It is distinct from `Value::Null`, which is a legitimate
//! result a property function may return.

use std::cmp::Ordering;
use std::sync::Arc;

use image::RgbImage;

/// A property value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Legitimate "no value"
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Bounding box as (x1, y1, x2, y2): top-left and bottom-right corners in pixels
    BBox([f64; 4]),
    List(Vec<Value>),
    /// Pixel crop, produced for the synthetic `image` dependency
    Image(Arc<RgbImage>),
    /// InvalidProperty sentinel
    Invalid,
}

impl Value {
    #[inline]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view, accepting both integer and float values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Box view; a four-element numeric list is accepted as well
    pub fn as_bbox(&self) -> Option<[f64; 4]> {
        match self {
            Value::BBox(b) => Some(*b),
            Value::List(items) if items.len() == 4 => {
                let mut out = [0.0; 4];
                for (slot, item) in out.iter_mut().zip(items) {
                    *slot = item.as_f64()?;
                }
                Some(out)
            }
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&RgbImage> {
        match self {
            Value::Image(img) => Some(img),
            _ => None,
        }
    }

    /// Equality used by predicates.
    ///
    /// Returns `None` when either side is invalid or the kinds cannot be compared.
    pub fn loose_eq(&self, other: &Value) -> Option<bool> {
        if self.is_invalid() || other.is_invalid() {
            return None;
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return Some(a == b);
        }
        match (self, other) {
            (Value::Null, Value::Null) => Some(true),
            (Value::Null, _) | (_, Value::Null) => Some(false),
            (Value::Bool(a), Value::Bool(b)) => Some(a == b),
            (Value::Text(a), Value::Text(b)) => Some(a == b),
            (Value::BBox(a), Value::BBox(b)) => Some(a == b),
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !x.loose_eq(y)? {
                        return Some(false);
                    }
                }
                Some(true)
            }
            (Value::Image(a), Value::Image(b)) => Some(Arc::ptr_eq(a, b)),
            _ => None,
        }
    }

    /// Ordering used by predicates: numbers, strings and booleans only.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// JSON rendering for output records.
    ///
    /// Images are summarized by their dimensions; non-finite floats become null.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null | Value::Invalid => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::Int(v) => Json::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Text(v) => Json::String(v.clone()),
            Value::BBox(b) => Json::Array(
                b.iter()
                    .map(|v| Value::Float(*v).to_json())
                    .collect(),
            ),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Image(img) => serde_json::json!({
                "width": img.width(),
                "height": img.height(),
            }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Invalid, Value::Invalid) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            _ => self.loose_eq(other).unwrap_or(false),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<[f64; 4]> for Value {
    fn from(v: [f64; 4]) -> Self {
        Value::BBox(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
