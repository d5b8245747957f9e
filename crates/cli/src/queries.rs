//! Built-in queries selectable with `run --query`.

use contracts::{Predicate, QuerySpec, VObjType};
use executor::properties::{self, Continuing};

/// Person speed above this (box heights per second) counts as fast
const FAST_PERSON_SPEED: f64 = 1.0;

/// Car speed above this counts as moving
const MOVING_CAR_SPEED: f64 = 0.5;

/// A person slower than this is idle
const IDLE_SPEED: f64 = 0.1;

/// Seconds a person must stay idle before being reported
const IDLE_DURATION_S: f64 = 2.0;

/// A named query factory
#[derive(Debug)]
pub struct BuiltinQuery {
    pub name: &'static str,
    pub description: &'static str,
    build: fn(&[String]) -> QuerySpec,
}

impl BuiltinQuery {
    /// Build a fresh query; stateful properties start empty
    pub fn build(&self, class_names: &[String]) -> QuerySpec {
        (self.build)(class_names)
    }
}

pub const BUILTIN_QUERIES: &[BuiltinQuery] = &[
    BuiltinQuery {
        name: "all_objects",
        description: "Every tracked object of the first configured class",
        build: all_objects,
    },
    BuiltinQuery {
        name: "fast_person",
        description: "People moving faster than one body height per second",
        build: fast_person,
    },
    BuiltinQuery {
        name: "moving_car",
        description: "Cars in motion, with their heading",
        build: moving_car,
    },
    BuiltinQuery {
        name: "idle_person",
        description: "People standing still for at least two seconds",
        build: idle_person,
    },
];

pub fn find(name: &str) -> Option<&'static BuiltinQuery> {
    BUILTIN_QUERIES.iter().find(|q| q.name == name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTIN_QUERIES.iter().map(|q| q.name)
}

fn all_objects(class_names: &[String]) -> QuerySpec {
    let class_name = class_names.first().map_or("person", String::as_str);
    let object = VObjType::builder("Object", class_name)
        .property(properties::center())
        .build();
    QuerySpec::new(
        "all_objects",
        Predicate::is_instance(&object),
        vec![
            object.prop("track_id"),
            object.prop("tlbr"),
            object.prop("score"),
            object.prop("center"),
        ],
    )
}

fn fast_person(_: &[String]) -> QuerySpec {
    let person = VObjType::builder("Person", "person")
        .property(properties::bbox_velocity())
        .build();
    QuerySpec::new(
        "fast_person",
        person.prop("bbox_velocity").gt(FAST_PERSON_SPEED),
        vec![
            person.prop("track_id"),
            person.prop("tlbr"),
            person.prop("bbox_velocity"),
        ],
    )
}

fn moving_car(_: &[String]) -> QuerySpec {
    let car = VObjType::builder("Car", "car")
        .property(properties::bbox_velocity())
        .property(properties::direction(3))
        .build();
    QuerySpec::new(
        "moving_car",
        car.prop("bbox_velocity").gt(MOVING_CAR_SPEED),
        vec![
            car.prop("track_id"),
            car.prop("tlbr"),
            car.prop("bbox_velocity"),
            car.prop("direction"),
        ],
    )
}

fn idle_person(_: &[String]) -> QuerySpec {
    let [idle_state, idle, idle_periods] = Continuing::new(IDLE_DURATION_S).into_properties(
        "idle",
        "bbox_velocity",
        |speed| speed.as_f64().is_some_and(|s| s < IDLE_SPEED),
    );
    let person = VObjType::builder("Person", "person")
        .property(properties::bbox_velocity())
        .property(idle_state)
        .property(idle)
        .property(idle_periods)
        .build();
    QuerySpec::new(
        "idle_person",
        person.prop("idle").equals(true),
        vec![
            person.prop("track_id"),
            person.prop("tlbr"),
            person.prop("idle_periods"),
        ],
    )
}
