//! Predicate expression tree
//!
//! Predicates are evaluated per object with three-valued logic: a leaf that
//! reads a missing or invalid property is *unknown*, `And`/`Or`/`Not` follow
//! Kleene rules, and an unknown result at the root counts as `false`.

use std::fmt;
use std::ops;
use std::sync::Arc;

use crate::{ObjectRecord, PropertyRef, VObjType, Value};

/// User comparison function for [`Predicate::Compare`]
pub type CompareFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Leaf operand: a property of the object under test or a literal
#[derive(Clone)]
pub enum Operand {
    Property(PropertyRef),
    Literal(Value),
}

impl Operand {
    fn resolve<'a>(&'a self, record: &'a ObjectRecord) -> Option<&'a Value> {
        let value = match self {
            Operand::Property(p) => record.get(p.name())?,
            Operand::Literal(v) => v,
        };
        (!value.is_invalid()).then_some(value)
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Property(p) => write!(f, "{p:?}"),
            Operand::Literal(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<PropertyRef> for Operand {
    fn from(p: PropertyRef) -> Self {
        Operand::Property(p)
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Literal(v)
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Literal(Value::Float(v))
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Literal(Value::Int(v))
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Operand::Literal(Value::Bool(v))
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Literal(Value::from(v))
    }
}

/// Boolean expression over one VObj's properties
#[derive(Clone)]
pub enum Predicate {
    /// Object belongs to the VObj type's class
    IsInstance(Arc<VObjType>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    Equal(Operand, Operand),
    /// Left operand strictly greater than right
    GreaterThan(Operand, Operand),
    /// User function applied to one property value
    Compare(PropertyRef, CompareFn),
}

impl Predicate {
    pub fn is_instance(vobj: &Arc<VObjType>) -> Self {
        Predicate::IsInstance(Arc::clone(vobj))
    }

    pub fn and(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn negate(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    pub fn equal(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        Predicate::Equal(lhs.into(), rhs.into())
    }

    pub fn greater_than(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        Predicate::GreaterThan(lhs.into(), rhs.into())
    }

    pub fn compare<F>(property: PropertyRef, func: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Predicate::Compare(property, Arc::new(func))
    }

    /// Evaluate against one object of class `class_name`.
    ///
    /// Missing or invalid properties never raise; they make the result `false`.
    pub fn evaluate(&self, class_name: &str, record: &ObjectRecord) -> bool {
        self.eval3(class_name, record).unwrap_or(false)
    }

    fn eval3(&self, class_name: &str, record: &ObjectRecord) -> Option<bool> {
        match self {
            Predicate::IsInstance(vobj) => Some(vobj.class_name() == class_name),
            Predicate::And(a, b) => match (a.eval3(class_name, record), b.eval3(class_name, record)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Predicate::Or(a, b) => match (a.eval3(class_name, record), b.eval3(class_name, record)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Predicate::Not(inner) => inner.eval3(class_name, record).map(|v| !v),
            Predicate::Equal(a, b) => a.resolve(record)?.loose_eq(b.resolve(record)?),
            Predicate::GreaterThan(a, b) => a
                .resolve(record)?
                .compare(b.resolve(record)?)
                .map(|ord| ord.is_gt()),
            Predicate::Compare(p, func) => {
                let value = record.get(p.name()).filter(|v| !v.is_invalid())?;
                Some(func(value))
            }
        }
    }

    /// Every property reference in the tree, in walk order (may repeat)
    pub fn property_refs(&self) -> Vec<&PropertyRef> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a PropertyRef>) {
        match self {
            Predicate::IsInstance(_) => {}
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_refs(out);
                b.collect_refs(out);
            }
            Predicate::Not(inner) => inner.collect_refs(out),
            Predicate::Equal(a, b) | Predicate::GreaterThan(a, b) => {
                for op in [a, b] {
                    if let Operand::Property(p) = op {
                        out.push(p);
                    }
                }
            }
            Predicate::Compare(p, _) => out.push(p),
        }
    }

    /// Every VObj type the tree mentions, deduplicated by name
    pub fn vobj_types(&self) -> Vec<Arc<VObjType>> {
        let mut out: Vec<Arc<VObjType>> = Vec::new();
        let mut add = |vobj: &Arc<VObjType>| {
            if !out.iter().any(|v| v.name() == vobj.name()) {
                out.push(Arc::clone(vobj));
            }
        };
        self.walk(&mut |node: &Predicate| {
            if let Predicate::IsInstance(vobj) = node {
                add(vobj);
            }
        });
        for p in self.property_refs() {
            add(p.vobj());
        }
        out
    }

    fn walk(&self, visit: &mut impl FnMut(&Predicate)) {
        visit(self);
        match self {
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.walk(visit);
                b.walk(visit);
            }
            Predicate::Not(inner) => inner.walk(visit),
            _ => {}
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::IsInstance(vobj) => write!(f, "IsInstance({})", vobj.name()),
            Predicate::And(a, b) => write!(f, "({a:?} & {b:?})"),
            Predicate::Or(a, b) => write!(f, "({a:?} | {b:?})"),
            Predicate::Not(inner) => write!(f, "!{inner:?}"),
            Predicate::Equal(a, b) => write!(f, "{a:?} == {b:?}"),
            Predicate::GreaterThan(a, b) => write!(f, "{a:?} > {b:?}"),
            Predicate::Compare(p, _) => write!(f, "{p:?}.cmp(<fn>)"),
        }
    }
}

impl ops::BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        Predicate::and(self, rhs)
    }
}

impl ops::BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        Predicate::or(self, rhs)
    }
}

impl ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        Predicate::negate(self)
    }
}

/// Comparison constructors on property references
impl PropertyRef {
    pub fn gt(&self, rhs: impl Into<Operand>) -> Predicate {
        Predicate::greater_than(self.clone(), rhs)
    }

    pub fn lt(&self, rhs: impl Into<Operand>) -> Predicate {
        Predicate::GreaterThan(rhs.into(), Operand::Property(self.clone()))
    }

    pub fn ge(&self, rhs: impl Into<Operand>) -> Predicate {
        let rhs = rhs.into();
        Predicate::equal(self.clone(), rhs.clone()) | Predicate::greater_than(self.clone(), rhs)
    }

    pub fn le(&self, rhs: impl Into<Operand>) -> Predicate {
        let rhs = rhs.into();
        Predicate::equal(self.clone(), rhs.clone()) | self.lt(rhs)
    }

    pub fn equals(&self, rhs: impl Into<Operand>) -> Predicate {
        Predicate::equal(self.clone(), rhs)
    }

    pub fn not_equals(&self, rhs: impl Into<Operand>) -> Predicate {
        !Predicate::equal(self.clone(), rhs)
    }

    pub fn satisfies<F>(&self, func: F) -> Predicate
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Predicate::compare(self.clone(), func)
    }
}
