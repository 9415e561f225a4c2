//! `linefit sections`: List the line-fitting sections of a document.

use super::{load_document, load_settings};
use linefit_config::{LineFittingSet, RawEntry};
use std::path::Path;

pub async fn run(settings_path: Option<&Path>, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(settings_path)?;
    let document = load_document(file)?;
    let set = document.line_fitting(&settings);

    println!("📋 Line-fitting sections in {}", file.display());
    println!(
        "   [{}]: {} default entries",
        settings.default_section,
        set.defaults.len()
    );
    for row in rows(&set) {
        println!(
            "   [{}]: {} own, {} overriding, {} inherited",
            row.name, row.own, row.overriding, row.inherited
        );
    }
    Ok(())
}

struct Row<'a> {
    name: &'a str,
    own: usize,
    /// Own entries that replace a default.
    overriding: usize,
    /// Defaults the section does not replace.
    inherited: usize,
}

fn rows(set: &LineFittingSet) -> Vec<Row<'_>> {
    let replaces = |own: &[RawEntry], key: &str| own.iter().any(|e| e.key == key);
    set.sections
        .iter()
        .map(|s| {
            let overriding = set
                .defaults
                .iter()
                .filter(|d| replaces(&s.entries, &d.key))
                .count();
            Row {
                name: &s.name,
                own: s.entries.len(),
                overriding,
                inherited: set.defaults.len() - overriding,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use linefit_config::{ConfigDocument, ResolverSettings};

    #[test]
    fn counts_inherited_entries() {
        let doc = ConfigDocument::parse(
            "[default_line_fitting]\nA1_100A_amp = value:1\nB1_200A_amp = value:2\n\n\
             [x_line_fitting]\nA1_100A_amp = value:5\nC1_300A_amp = min:0\n",
        )
        .unwrap();
        let set = doc.line_fitting(&ResolverSettings::default());
        let rows = rows(&set);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "x_line_fitting");
        assert_eq!((rows[0].own, rows[0].overriding, rows[0].inherited), (2, 1, 1));
    }
}
