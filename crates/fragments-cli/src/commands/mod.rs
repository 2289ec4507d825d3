//! CLI commands implementation

use anyhow::{Context, Result};
use fragments_core::{
    fragments_from_json, fragments_from_toml, Fragment, FragmentsConfig, MachineInfo, PackPlan,
};
use fragments_packer::{dependency, Packer, PackerRegistry};
use std::path::{Path, PathBuf};
use tracing::info;

/// Dependency graph output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GraphFormat {
    /// Graphviz DOT
    Dot,
    /// One `fragment -> dependency` edge per line
    Edges,
}

/// Pack fragments and optionally write the plan
pub async fn pack(
    registry: &PackerRegistry,
    config: Option<PathBuf>,
    fragments: PathBuf,
    packer: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config.as_deref()).await?;
    if let Some(name) = packer {
        config.cluster.packer = name;
    }
    let fragments = load_fragments(&fragments).await?;

    let plan = pack_plan(&config, registry, &fragments)?;
    print_machines(&plan.machine_info(&config.cluster.domain_name));

    if let Some(path) = output {
        tokio::fs::write(&path, plan.to_json()?)
            .await
            .with_context(|| format!("Failed to write plan to {}", path.display()))?;
        info!(path = %path.display(), plan = %plan.id, "Plan written");
        println!("\nPlan {} written to {}", plan.id, path.display());
    }

    Ok(())
}

/// Verify fragment dependencies
pub async fn verify(fragments: PathBuf) -> Result<()> {
    let fragments = load_fragments(&fragments).await?;
    dependency::validate_dependencies(&fragments)?;
    println!("Verified {} fragments", fragments.len());
    Ok(())
}

/// Print the dependency graph
pub async fn graph(fragments: PathBuf, format: GraphFormat) -> Result<()> {
    let fragments = load_fragments(&fragments).await?;
    print!("{}", render_graph(&fragments, format));
    Ok(())
}

/// Show machine information from a saved plan
pub async fn info(registry: &PackerRegistry, config: Option<PathBuf>, plan: PathBuf) -> Result<()> {
    let config = load_config(config.as_deref()).await?;
    let content = tokio::fs::read_to_string(&plan)
        .await
        .with_context(|| format!("Failed to read plan {}", plan.display()))?;
    let plan = PackPlan::from_json(&content)?;

    println!("Plan: {}", plan.id);
    println!("  Created: {}", plan.created_at);
    println!("  Basename: {}", plan.basename);
    println!("  Packer: {}", plan.packer);
    println!();

    let packer = Packer::from_plan(plan, &config, registry)?;
    print_machines(&packer.machine_info());
    Ok(())
}

/// List registered packers
pub fn packers(registry: &PackerRegistry) {
    for name in registry.names() {
        println!("{}", name);
    }
}

/// Run a pack and capture the result as a plan
fn pack_plan(
    config: &FragmentsConfig,
    registry: &PackerRegistry,
    fragments: &[Fragment],
) -> Result<PackPlan> {
    let mut packer = Packer::new(config, registry)?;
    packer.pack(fragments)?;
    packer.verify_dependencies()?;
    Ok(packer.plan())
}

fn render_graph(fragments: &[Fragment], format: GraphFormat) -> String {
    let graph = dependency::dependency_graph(fragments);
    match format {
        GraphFormat::Dot => dependency::dependency_graph_dot(&graph),
        GraphFormat::Edges => dependency::dependency_edges(&graph)
            .into_iter()
            .map(|(from, to)| format!("{} -> {}\n", from, to))
            .collect(),
    }
}

async fn load_config(path: Option<&Path>) -> Result<FragmentsConfig> {
    match path {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            Ok(FragmentsConfig::from_toml(&content)?)
        }
        None => Ok(FragmentsConfig::default()),
    }
}

async fn load_fragments(path: &Path) -> Result<Vec<Fragment>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read fragments {}", path.display()))?;

    let fragments = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => fragments_from_toml(&content)?,
        _ => fragments_from_json(&content)?,
    };
    info!(path = %path.display(), fragments = fragments.len(), "Loaded fragments");
    Ok(fragments)
}

fn print_machines(machines: &[MachineInfo]) {
    if machines.is_empty() {
        println!("No machines packed");
        return;
    }

    println!(
        "{:<24} {:<12} {:<14} {:<8} {:<30}",
        "NAME", "FLAVOR", "ENVIRONMENT", "MEMORY", "FRAGMENTS"
    );
    println!("{}", "-".repeat(90));
    for machine in machines {
        println!(
            "{:<24} {:<12} {:<14} {:>6}% {:<30}",
            machine.name,
            machine.flavor.name,
            machine.environment,
            machine.memory_used_percent,
            machine.fragments.join(",")
        );
    }
}
