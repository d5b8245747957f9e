//! `info` command implementation.

use executor::DetectorRegistry;
use planner::Planner;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::InfoArgs;
use crate::error::{CliError, Result};
use crate::queries::BUILTIN_QUERIES;

/// Class table used to preview `all_objects`
const PREVIEW_CLASSES: &[&str] = &["person"];

#[derive(Serialize)]
struct EngineInfo {
    version: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    queries: Vec<QueryInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    detectors: Vec<String>,
}

#[derive(Serialize)]
struct QueryInfo {
    name: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vobj: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!("Collecting engine info");

    // Without a selector, show everything
    let show_all = !args.queries && !args.detectors;
    let info = build_info(args.queries || show_all, args.detectors || show_all);

    if args.json {
        let json = serde_json::to_string_pretty(&info)
            .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to serialize info: {e}")))?;
        println!("{json}");
    } else {
        print_info(&info);
    }
    Ok(())
}

fn build_info(queries: bool, detectors: bool) -> EngineInfo {
    let class_names: Vec<String> = PREVIEW_CLASSES.iter().map(|c| c.to_string()).collect();
    let planner = Planner::new();

    let queries = if queries {
        BUILTIN_QUERIES
            .iter()
            .map(|q| match planner.compile(&q.build(&class_names)) {
                Ok(plan) => QueryInfo {
                    name: q.name,
                    description: q.description,
                    vobj: Some(plan.vobj().name().to_string()),
                    class_name: Some(plan.class_name().to_string()),
                    properties: plan
                        .projected_properties()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    plan: Some(plan.to_string()),
                },
                Err(e) => {
                    warn!(query = q.name, error = %e, "Built-in query does not compile");
                    QueryInfo {
                        name: q.name,
                        description: q.description,
                        vobj: None,
                        class_name: None,
                        properties: Vec::new(),
                        plan: None,
                    }
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    let detectors = if detectors {
        DetectorRegistry::with_builtins()
            .names()
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    EngineInfo {
        version: env!("CARGO_PKG_VERSION"),
        queries,
        detectors,
    }
}

fn print_info(info: &EngineInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    vidquery {:<33}║", info.version);
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    if !info.queries.is_empty() {
        println!("🔎 Queries ({})", info.queries.len());
        for (i, query) in info.queries.iter().enumerate() {
            let is_last = i == info.queries.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let child_prefix = if is_last { "   " } else { "│  " };

            println!("   {} {}: {}", prefix, query.name, query.description);
            match (&query.vobj, &query.class_name) {
                (Some(vobj), Some(class_name)) => {
                    println!("   {}  ├─ VObj: {} (class '{}')", child_prefix, vobj, class_name);
                    println!(
                        "   {}  └─ Projected: {}",
                        child_prefix,
                        if query.properties.is_empty() {
                            "(none)".to_string()
                        } else {
                            query.properties.join(" -> ")
                        }
                    );
                }
                _ => println!("   {}  └─ (does not compile)", child_prefix),
            }
        }
    }

    if !info.detectors.is_empty() {
        println!("\n🧩 Detectors ({})", info.detectors.len());
        for (i, name) in info.detectors.iter().enumerate() {
            let prefix = if i == info.detectors.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            println!("   {prefix} {name}");
        }
    }

    println!();
}
