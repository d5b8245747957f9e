//! Query compilation.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use contracts::{
    is_builtin, is_synthetic, PropertyDescriptor, Query, VObjType, FIELD_TLBR, FIELD_TRACK_ID,
};
use tracing::{debug, instrument};

use crate::graph::DependencyGraph;
use crate::plan::{OutputSpec, Plan, ProjectorSpec, Stage, DEFAULT_FILTER_INDEX};
use crate::PlanError;

/// Fields reported when a query names no output
const DEFAULT_OUTPUT_FIELDS: [&str; 2] = [FIELD_TRACK_ID, FIELD_TLBR];

/// Compiles queries into stage lists.
///
/// A planner holds no state between compilations; two plans compiled by the
/// same planner share nothing at run time.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    filter_index: usize,
}

impl Planner {
    pub fn new() -> Self {
        Self {
            filter_index: DEFAULT_FILTER_INDEX,
        }
    }

    /// Compile `query` into a plan.
    ///
    /// # Errors
    /// Any [`PlanError`]; nothing is returned on failure.
    #[instrument(level = "debug", name = "planner_compile", skip(self, query), fields(query = query.name()))]
    pub fn compile(&self, query: &dyn Query) -> Result<Plan, PlanError> {
        let constraint = query.frame_constraint();
        let output = query.frame_output();

        let vobj = single_vobj(&constraint.vobj_types())?;
        for r in &output {
            if r.vobj().name() != vobj.name() {
                return Err(PlanError::MultipleVObjTypes {
                    found: vec![vobj.name().to_string(), r.vobj().name().to_string()],
                });
            }
        }

        let predicate_roots = resolve_refs(&vobj, constraint.property_refs().into_iter().map(|r| r.name()))?;
        let output_roots = resolve_refs(&vobj, output.iter().map(|r| r.name()))?;

        let predicate_set = dependency_closure(&vobj, &predicate_roots)?;
        let output_set: Vec<&str> = dependency_closure(&vobj, &output_roots)?
            .into_iter()
            .filter(|name| !predicate_set.contains(name))
            .collect();

        let predicate_order = sorted(&vobj, &predicate_set)?;
        let output_order = sorted(&vobj, &output_set)?;

        let planned: Vec<&PropertyDescriptor> = predicate_order
            .iter()
            .chain(&output_order)
            .filter_map(|name| vobj.property(name))
            .collect();
        let required_hist_len = required_history(&planned);
        let self_dependent: BTreeSet<String> = planned
            .iter()
            .filter(|d| d.is_self_dependent())
            .map(|d| d.name().to_string())
            .collect();

        let class_name = vobj.class_name().to_string();
        let projector = |name: &String| -> Option<Stage> {
            let descriptor = vobj.property(name)?;
            Some(Stage::Project(ProjectorSpec {
                descriptor: descriptor.clone(),
                class_name: class_name.clone(),
                filter_index: self.filter_index,
                history_len: descriptor.max_window(),
                self_dependent: self_dependent.contains(name),
            }))
        };

        let mut stages = Vec::with_capacity(predicate_order.len() + output_order.len() + 3);
        stages.push(Stage::ClassFilter {
            class_name: class_name.clone(),
            filter_index: self.filter_index,
        });
        stages.extend(predicate_order.iter().filter_map(&projector));
        stages.push(Stage::PredicateFilter {
            predicate: constraint,
            class_name: class_name.clone(),
            filter_index: self.filter_index,
        });
        stages.extend(output_order.iter().filter_map(&projector));

        let mut fields: Vec<String> = Vec::new();
        for r in &output {
            if !fields.iter().any(|f| f == r.name()) {
                fields.push(r.name().to_string());
            }
        }
        if fields.is_empty() {
            fields = DEFAULT_OUTPUT_FIELDS.iter().map(|f| f.to_string()).collect();
        }
        stages.push(Stage::OutputFormat(OutputSpec {
            vobj_name: vobj.name().to_string(),
            class_name: class_name.clone(),
            filter_index: self.filter_index,
            fields,
        }));

        debug!(
            vobj = vobj.name(),
            stages = stages.len(),
            projected = planned.len(),
            "plan compiled"
        );

        Ok(Plan {
            query_name: query.name().to_string(),
            vobj,
            stages,
            required_hist_len,
            self_dependent,
        })
    }
}

fn single_vobj(found: &[Arc<VObjType>]) -> Result<Arc<VObjType>, PlanError> {
    match found {
        [] => Err(PlanError::NoVObjType),
        [only] => Ok(Arc::clone(only)),
        many => Err(PlanError::MultipleVObjTypes {
            found: many.iter().map(|v| v.name().to_string()).collect(),
        }),
    }
}

/// Check every referenced name; return the derived ones, deduplicated in order
fn resolve_refs<'a>(
    vobj: &VObjType,
    names: impl Iterator<Item = &'a str>,
) -> Result<Vec<&'a str>, PlanError> {
    let mut derived = Vec::new();
    for name in names {
        if !vobj.knows(name) {
            return Err(PlanError::unknown_property(vobj.name(), name));
        }
        if vobj.property(name).is_some() && !derived.contains(&name) {
            derived.push(name);
        }
    }
    Ok(derived)
}

/// Derived properties reachable from `roots`, roots included
fn dependency_closure<'v>(vobj: &'v VObjType, roots: &[&str]) -> Result<Vec<&'v str>, PlanError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    let mut stack: Vec<&'v str> = roots
        .iter()
        .filter_map(|r| vobj.property(r).map(PropertyDescriptor::name))
        .collect();

    while let Some(name) = stack.pop() {
        if !seen.insert(name) {
            continue;
        }
        out.push(name);
        let Some(descriptor) = vobj.property(name) else {
            continue;
        };
        for (dep, _) in descriptor.dependencies() {
            if dep == name || is_builtin(dep) || is_synthetic(dep) {
                continue;
            }
            match vobj.property(dep) {
                Some(d) => stack.push(d.name()),
                None => return Err(PlanError::unknown_dependency(name, dep.as_str())),
            }
        }
    }
    Ok(out)
}

/// Topological order of `names`, ties broken by declaration order
fn sorted(vobj: &VObjType, names: &[&str]) -> Result<Vec<String>, PlanError> {
    let mut descriptors: Vec<&PropertyDescriptor> =
        names.iter().filter_map(|n| vobj.property(n)).collect();
    descriptors.sort_by_key(|d| vobj.declaration_index(d.name()));
    DependencyGraph::build(&descriptors).topological_order()
}

/// Largest window each dependency is read with, over all planned properties
fn required_history(planned: &[&PropertyDescriptor]) -> BTreeMap<String, usize> {
    let mut out: BTreeMap<String, usize> = BTreeMap::new();
    for descriptor in planned {
        for (dep, window) in descriptor.dependencies() {
            let slot = out.entry(dep.clone()).or_default();
            *slot = (*slot).max(*window);
        }
    }
    out
}
