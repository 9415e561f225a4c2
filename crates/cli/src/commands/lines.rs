//! `linefit lines`: List the lines a section fits.

use super::{load_document, load_settings};
use linefit_config::ConfigDocument;
use linefit_resolver::{FeatureKind, FitModel, Resolver};
use std::path::Path;

pub async fn run(
    settings_path: Option<&Path>,
    file: &Path,
    section: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(settings_path)?;
    let document = load_document(file)?;
    let recombination = settings.recombination_species.clone();
    let resolver = Resolver::new(settings);

    match resolve_one(&resolver, &document, section)? {
        Ok(model) => {
            println!("🔭 [{section}] {} feature(s)", model.features.len());
            for row in describe(&model, &recombination) {
                println!("   {row}");
            }
            Ok(())
        }
        Err(errors) => {
            for err in &errors.errors {
                println!("   ❌ {err}");
            }
            std::process::exit(1);
        }
    }
}

fn resolve_one(
    resolver: &Resolver,
    document: &ConfigDocument,
    section: &str,
) -> Result<linefit_resolver::SectionResult, Box<dyn std::error::Error>> {
    let settings = resolver.settings();
    let own = document
        .section(section)
        .ok_or_else(|| format!("no section [{section}]"))?;
    let defaults = document
        .section(&settings.default_section)
        .filter(|d| d.name != section)
        .map(|d| d.entries.as_slice())
        .unwrap_or_default();
    Ok(resolver.resolve_section(section, defaults, &own.entries))
}

/// One row per fitted line, grouped by feature.
fn describe(model: &FitModel, recombination: &[String]) -> Vec<String> {
    let mut rows = Vec::new();
    for feature in &model.features {
        let kind = match feature.kind {
            FeatureKind::Single => "single",
            FeatureKind::Merged => "merged",
            FeatureKind::Blended => "blended",
        };
        for line in &feature.members {
            let mut row = format!(
                "{:<18} {:<16} {:>10.2}  {kind:<7} {}",
                line.to_string(),
                line.transition_label(recombination),
                line.rest_wavelength(),
                feature.id
            );
            if let Some(tie) = model.ties.iter().find(|t| &t.follower == line) {
                row.push_str(&format!("  kinem -> {}", tie.leader));
            }
            rows.push(row);
        }
    }
    rows
}
