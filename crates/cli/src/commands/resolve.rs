//! `linefit resolve`: Resolve line-fitting sections into fit models.

use super::{load_document, load_settings, resolve_parallel};
use linefit_config::{ConfigDocument, LineFittingSet, OutputFormat, ResolverSettings};
use linefit_resolver::{FitModel, ModelSet, Resolver, SectionResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Options of one `resolve` invocation.
pub struct Request {
    pub file: PathBuf,
    pub sections: Vec<String>,
    pub objects: Vec<String>,
    pub objects_from: Option<String>,
    pub format: Option<String>,
    pub output: Option<PathBuf>,
    pub recipe: bool,
}

pub async fn run(
    settings_path: Option<&Path>,
    request: Request,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(settings_path)?;
    let format = match &request.format {
        Some(f) => f.parse::<OutputFormat>()?,
        None => settings.output_format,
    };
    let document = load_document(&request.file)?;
    let set = select(&document, &settings, &request)?;
    if set.sections.is_empty() {
        return Err(format!("no line-fitting sections in {}", request.file.display()).into());
    }

    let workers = settings.effective_workers();
    let resolver = Resolver::new(settings);
    info!(sections = set.sections.len(), workers, "Resolving");
    let results = resolve_parallel(&resolver, set, workers).await?;

    let failed = report_failures(&results);
    let models: Vec<FitModel> = results.into_iter().filter_map(|(_, r)| r.ok()).collect();

    let rendered = if request.recipe {
        models
            .iter()
            .map(FitModel::render_recipe)
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        render(&models, format)?
    };

    match &request.output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            eprintln!("   ✅ Wrote {} model(s) to {}", models.len(), path.display());
        }
        None => println!("{rendered}"),
    }

    if failed > 0 {
        eprintln!("   ❌ {failed} section(s) failed");
        std::process::exit(1);
    }
    Ok(())
}

/// The sections a request asks for.
fn select(
    document: &ConfigDocument,
    settings: &ResolverSettings,
    request: &Request,
) -> Result<LineFittingSet, Box<dyn std::error::Error>> {
    let objects = match &request.objects_from {
        Some(spec) => {
            let (section, key) = spec
                .split_once('.')
                .ok_or_else(|| format!("--objects-from expects <section>.<key>, got '{spec}'"))?;
            document
                .list(section, key)
                .ok_or_else(|| format!("no '{key}' in section [{section}]"))?
        }
        None => request.objects.clone(),
    };

    let mut set = if objects.is_empty() {
        document.line_fitting(settings)
    } else {
        document.line_fitting_for(settings, &objects)
    };

    if !request.sections.is_empty() {
        for wanted in &request.sections {
            if !set.sections.iter().any(|s| &s.name == wanted) {
                return Err(format!("no line-fitting section [{wanted}]").into());
            }
        }
        set.sections.retain(|s| request.sections.contains(&s.name));
    }
    Ok(set)
}

fn render(models: &[FitModel], format: OutputFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(models)?,
        OutputFormat::Toml => ModelSet::new(models.to_vec()).to_toml()?,
    })
}

/// Print every section error to stderr; returns the failed section count.
fn report_failures(results: &[(String, SectionResult)]) -> usize {
    let mut failed = 0;
    for (_, result) in results {
        if let Err(errors) = result {
            failed += 1;
            for err in &errors.errors {
                eprintln!("   ❌ {err}");
            }
        }
    }
    failed
}
