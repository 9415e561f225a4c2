//! Subcommand implementations.

pub mod check;
pub mod config_cmd;
pub mod lines;
pub mod resolve;
pub mod sections;

use linefit_config::{ConfigDocument, LineFittingSet, ResolverSettings};
use linefit_resolver::{Resolver, SectionResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Settings from `--config`, or the default location.
pub fn load_settings(path: Option<&Path>) -> Result<ResolverSettings, Box<dyn std::error::Error>> {
    let settings = match path {
        Some(p) => ResolverSettings::load_from(p),
        None => ResolverSettings::load(),
    }
    .map_err(|e| format!("Failed to load settings: {e}"))?;
    Ok(settings)
}

pub fn load_document(file: &Path) -> Result<ConfigDocument, Box<dyn std::error::Error>> {
    Ok(ConfigDocument::load(file)?)
}

/// Resolve every section of `set` on blocking tasks, at most `workers` at
/// a time. Results come back in set order.
pub async fn resolve_parallel(
    resolver: &Resolver,
    set: LineFittingSet,
    workers: usize,
) -> Result<Vec<(String, SectionResult)>, Box<dyn std::error::Error>> {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for (idx, section) in set.sections.into_iter().enumerate() {
        let permit = permits.clone().acquire_owned().await?;
        let resolver = resolver.clone();
        let defaults = Arc::clone(&set.defaults);
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = resolver.resolve_section(&section.name, &defaults, &section.entries);
            (idx, section.name, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        results.push(joined?);
    }
    results.sort_by_key(|(idx, _, _)| *idx);
    Ok(results
        .into_iter()
        .map(|(_, name, result)| (name, result))
        .collect())
}
