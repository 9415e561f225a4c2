//! `linefit check`: Validate every line-fitting section of a document.

use super::{load_document, load_settings, resolve_parallel};
use linefit_resolver::{Resolver, Role, SectionResult};
use std::path::Path;

pub async fn run(settings_path: Option<&Path>, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Checking {}...", file.display());

    let settings = load_settings(settings_path)?;
    let document = match load_document(file) {
        Ok(doc) => doc,
        Err(e) => {
            println!("   ❌ {e}");
            return Err(e);
        }
    };

    let set = document.line_fitting(&settings);
    if set.sections.is_empty() {
        println!("   ⚠️  No sections ending in '{}'", settings.section_suffix);
        return Ok(());
    }
    if set.defaults.is_empty() {
        println!("   ⚠️  No [{}] section; nothing is inherited", settings.default_section);
    }

    let workers = settings.effective_workers();
    let results = resolve_parallel(&Resolver::new(settings), set, workers).await?;
    let failed = summarize(&results);

    println!();
    if failed == 0 {
        println!("   ✅ All {} section(s) resolved", results.len());
        Ok(())
    } else {
        println!("   ❌ {failed} of {} section(s) failed", results.len());
        std::process::exit(1);
    }
}

/// One status line per section (errors indented below); returns the
/// number of failures.
fn summarize(results: &[(String, SectionResult)]) -> usize {
    let mut failed = 0;
    for (name, result) in results {
        match result {
            Ok(model) => println!(
                "   ✅ [{name}] {} parameters ({} free, {} fixed, {} derived)",
                model.parameters.len(),
                model.count(Role::Free),
                model.count(Role::Fixed),
                model.count(Role::Derived)
            ),
            Err(errors) => {
                failed += 1;
                println!("   ❌ [{name}] {} error(s)", errors.len());
                for err in &errors.errors {
                    println!("        {} ({}): {}", err.key, err.kind.name(), err.kind);
                }
            }
        }
    }
    failed
}
