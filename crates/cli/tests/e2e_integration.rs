//! End-to-end integration tests for the linefit resolver.
//!
//! These tests exercise the full pipeline from configuration text to fit
//! models, including default inheritance, groups, kinematic ties,
//! expression graphs, per-section error collection and model evaluation.

use linefit_config::{ConfigDocument, ResolverSettings};
use linefit_core::LineIdentifier;
use linefit_resolver::{
    Bound, ErrorKind, FeatureKind, FitModel, ModelSet, Origin, Resolver, Role, SectionErrors,
};

// ── Fixture ──────────────────────────────────────────────────────────────

const OBSERVATIONS: &str = r#"
[data_location]
data_folder = ../sample_data
results_folder = ../sample_data/results

[sample_data]
object_list = gp030321, gp101157, gp121903
; redshifts measured from Halpha
z_array = 0.16465, 0.14334, 0.19531

[default_line_fitting]
O2_3726A_m = O2_3726A-O2_3729A
O3_5007A_b = O3_5007A-O3_5007A_w1
O3_5007A_w1_sigma = expr:>2.0*O3_5007A_sigma
H1_6563A_b = H1_6563A-N2_6584A-N2_6548A
N2_6548A_amp = expr:N2_6584A_amp/2.94
N2_6548A_kinem = N2_6584A
S2_6716A_b = S2_6716A-S2_6731A

[gp030321_line_fitting]
H1_3712A_kinem = H1_3734A
H1_3734A_amp = value:1
H1_3734A_sigma = min:0.5,max:3.0

[gp101157_line_fitting]
H1_6563A_b = H1_6563A-N2_6584A
O3_4959A_amp = expr:O3_5007A_amp/2.98
O3_4959A_center = value:4958.91,vary:False

[gp121903_line_fitting]
He1_5876A_kinem = N2_9999A

[SHOC579_line_fitting]
O3_4959A_kinem = O3_5007A
O3_5007A_kinem = O3_4959A
"#;

fn resolve_all() -> Vec<(String, Result<FitModel, SectionErrors>)> {
    let doc = ConfigDocument::parse(OBSERVATIONS).unwrap();
    Resolver::default().resolve_document(&doc)
}

fn model(name: &str) -> FitModel {
    resolve_all()
        .into_iter()
        .find(|(n, _)| n == name)
        .and_then(|(_, r)| r.ok())
        .unwrap_or_else(|| panic!("{name} did not resolve"))
}

fn errors(name: &str) -> SectionErrors {
    resolve_all()
        .into_iter()
        .find(|(n, _)| n == name)
        .and_then(|(_, r)| r.err())
        .unwrap_or_else(|| panic!("{name} resolved unexpectedly"))
}

// ── Document handling ────────────────────────────────────────────────────

#[test]
fn e2e_sections_resolve_independently() {
    let results = resolve_all();
    let summary: Vec<(&str, bool)> = results
        .iter()
        .map(|(n, r)| (n.as_str(), r.is_ok()))
        .collect();
    assert_eq!(
        summary,
        [
            ("gp030321_line_fitting", true),
            ("gp101157_line_fitting", true),
            ("gp121903_line_fitting", false),
            ("SHOC579_line_fitting", false),
        ]
    );
}

#[test]
fn e2e_resolution_is_deterministic() {
    let first = resolve_all();
    let second = resolve_all();
    assert_eq!(first, second);

    let a = model("gp101157_line_fitting").to_json().unwrap();
    let b = model("gp101157_line_fitting").to_json().unwrap();
    assert_eq!(a, b);
}

#[test]
fn e2e_document_loaded_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("obs.cfg");
    std::fs::write(&path, OBSERVATIONS).unwrap();

    let doc = ConfigDocument::load(&path).unwrap();
    assert_eq!(
        doc.list("sample_data", "object_list").unwrap(),
        ["gp030321", "gp101157", "gp121903"]
    );
    let from_file = Resolver::default().resolve_document(&doc);
    assert_eq!(from_file, resolve_all());
}

// ── Inheritance ──────────────────────────────────────────────────────────

#[test]
fn e2e_default_entries_inherited_unmodified() {
    let m = model("gp030321_line_fitting");
    assert_eq!(m.entry("O2_3726A_m"), Some("O2_3726A-O2_3729A"));
    assert_eq!(m.entry("S2_6716A_b"), Some("S2_6716A-S2_6731A"));
    assert_eq!(m.entry("N2_6548A_kinem"), Some("N2_6584A"));
    assert_eq!(m.entry("H1_3712A_kinem"), Some("H1_3734A"));
}

#[test]
fn e2e_override_replaces_entry_entirely() {
    let m = model("gp101157_line_fitting");
    assert_eq!(m.entry("H1_6563A_b"), Some("H1_6563A-N2_6584A"));

    let halpha = m.features.iter().find(|f| f.id == "H1_6563A").unwrap();
    assert_eq!(halpha.members.len(), 2);

    // N2_6548A left the group but keeps its inherited tie and ratio.
    let n2 = m.parameter("N2_6548A_amp").unwrap();
    assert_eq!(n2.group, None);
    assert_eq!(n2.role, Role::Derived);
    assert_eq!(n2.feature, "N2_6548A");
}

// ── Groups ───────────────────────────────────────────────────────────────

#[test]
fn e2e_blended_group_has_independent_profiles() {
    let m = model("gp030321_line_fitting");
    let s2 = m.features.iter().find(|f| f.id == "S2_6716A").unwrap();
    assert_eq!(s2.kind, FeatureKind::Blended);
    assert_eq!(s2.profiles, 2);
    assert_eq!(s2.window, [6716.0, 6731.0]);

    for name in ["S2_6716A_amp", "S2_6731A_amp", "S2_6731A_sigma"] {
        let p = m.parameter(name).unwrap();
        assert_eq!(p.role, Role::Free, "{name}");
        assert_eq!(p.group.as_deref(), Some("S2_6716A"));
    }
    // Continuum belongs to the window, carried by the primary.
    assert!(m.parameter("S2_6716A_cont_slope").is_some());
    assert!(m.parameter("S2_6731A_cont_slope").is_none());
}

#[test]
fn e2e_merged_group_collapses_to_one_profile() {
    let m = model("gp030321_line_fitting");
    let o2 = m.features.iter().find(|f| f.id == "O2_3726A").unwrap();
    assert_eq!(o2.kind, FeatureKind::Merged);
    assert_eq!(o2.profiles, 1);

    let sigma = m.parameter("O2_3729A_sigma").unwrap();
    assert_eq!(sigma.role, Role::Derived);
    assert_eq!(sigma.origin, Origin::Group);
    assert_eq!(sigma.tied_to, ["O2_3726A_sigma"]);
}

// ── Ties and expressions ─────────────────────────────────────────────────

#[test]
fn e2e_kinematic_follower_equals_leader_at_every_evaluation() {
    let m = model("gp030321_line_fitting");
    for param in ["center", "sigma"] {
        let p = m.parameter(&format!("H1_3712A_{param}")).unwrap();
        assert_eq!(p.role, Role::Derived);
        assert_eq!(p.origin, Origin::Kinematic);
        assert_eq!(p.tied_to, [format!("H1_3734A_{param}")]);
    }

    let eval = m.evaluator().unwrap();
    let free = eval.free_names().len();
    let position = |name: &str| m.parameters.iter().position(|p| p.name == name).unwrap();
    for seed in [0.1, 1.0, 7.25, 6563.0] {
        let values: Vec<f64> = (0..free).map(|i| seed * (i + 1) as f64).collect();
        let all = eval.evaluate(&values).unwrap();
        assert_eq!(all[position("H1_3712A_center")], all[position("H1_3734A_center")]);
        assert_eq!(all[position("H1_3712A_sigma")], all[position("H1_3734A_sigma")]);
    }
}

#[test]
fn e2e_inequality_is_a_free_parameter_with_floor() {
    let m = model("gp030321_line_fitting");
    let p = m.parameter("O3_5007A_w1_sigma").unwrap();
    assert_eq!(p.role, Role::Free);
    assert_eq!(p.rank, 0);
    let floor = p.inequality.as_ref().unwrap();
    assert_eq!(floor.bound, Bound::Floor);
    assert_eq!(floor.references, ["O3_5007A_sigma"]);

    let eval = m.evaluator().unwrap();
    let names = eval.free_names();
    let values: Vec<f64> = names
        .iter()
        .map(|n| match *n {
            "O3_5007A_sigma" => 2.0,
            "O3_5007A_w1_sigma" => 3.0,
            _ => 1.0,
        })
        .collect();
    let all = eval.evaluate(&values).unwrap();
    let penalties = eval.penalties(&all).unwrap();
    assert_eq!(penalties.len(), 1);
    assert_eq!(penalties[0].parameter, "O3_5007A_w1_sigma");
    assert_eq!(penalties[0].violation, 1.0);
}

#[test]
fn e2e_parameter_table_order() {
    let m = model("gp101157_line_fitting");
    let first_derived = m
        .parameters
        .iter()
        .position(|p| p.role == Role::Derived)
        .unwrap();
    assert!(m.parameters[..first_derived]
        .iter()
        .all(|p| p.role != Role::Derived));
    assert!(m.parameters[first_derived..]
        .iter()
        .all(|p| p.role == Role::Derived));
    // Ranks never decrease among derived parameters.
    assert!(m.parameters[first_derived..]
        .windows(2)
        .all(|w| w[0].rank <= w[1].rank));

    let o3 = m.parameter("O3_4959A_amp").unwrap();
    assert_eq!(o3.expr.as_deref(), Some("O3_5007A_amp/2.98"));
    let center = m.parameter("O3_4959A_center").unwrap();
    assert_eq!(center.role, Role::Fixed);
    assert_eq!(center.initial, Some(4958.91));
}

// ── Errors ───────────────────────────────────────────────────────────────

#[test]
fn e2e_dangling_kinematic_leader() {
    let errs = errors("gp121903_line_fitting");
    let dangling: Vec<_> = errs.of_kind("dangling_reference").collect();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].section, "gp121903_line_fitting");
    assert_eq!(dangling[0].key, "He1_5876A_kinem");
    assert!(dangling[0].kind.to_string().contains("N2_9999A"));
}

#[test]
fn e2e_mutual_kinematic_ties_are_a_cycle() {
    let errs = errors("SHOC579_line_fitting");
    let cycles: Vec<_> = errs
        .errors
        .iter()
        .filter_map(|e| match &e.kind {
            ErrorKind::ConstraintCycle(labels) => Some(labels),
            _ => None,
        })
        .collect();
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].iter().any(|l| l == "O3_4959A"));
    assert!(cycles[0].iter().any(|l| l == "O3_5007A"));
}

#[test]
fn e2e_every_error_in_a_section_is_reported() {
    let doc = ConfigDocument::parse(
        "[bad_line_fitting]\n\
         O3_5007A_amp = expr:O3_4959A_amp\n\
         O3_4959A_amp = expr:O3_5007A_amp\n\
         H1_6563A_sigma = width:3\n\
         O3A_center = value:1\n",
    )
    .unwrap();
    let results = Resolver::default().resolve_document(&doc);
    let errs = results[0].1.as_ref().unwrap_err();
    assert_eq!(errs.of_kind("constraint_cycle").count(), 1);
    assert_eq!(errs.of_kind("unknown_value_grammar").count(), 1);
    assert_eq!(errs.of_kind("malformed_identifier").count(), 1);
    assert!(errs.errors.iter().all(|e| e.section == "bad_line_fitting"));
}

// ── Round trip ───────────────────────────────────────────────────────────

#[test]
fn e2e_rendered_recipe_resolves_to_same_model() {
    let resolver = Resolver::default();
    for (name, result) in resolve_all() {
        let Ok(m) = result else { continue };
        let text = m.render_recipe();
        let doc = ConfigDocument::parse(&text).unwrap();
        let section = doc.section(&name).unwrap();
        let again = resolver.resolve_section(&name, &[], &section.entries).unwrap();
        assert_eq!(again, m, "{name}");
    }
}

#[test]
fn e2e_model_serializes_to_json_and_back() {
    let m = model("gp101157_line_fitting");
    let back: FitModel = serde_json::from_str(&m.to_json().unwrap()).unwrap();
    assert_eq!(back, m);
}

#[test]
fn e2e_two_sections_stay_separate_in_toml() {
    let models: Vec<FitModel> = resolve_all()
        .into_iter()
        .filter_map(|(_, r)| r.ok())
        .collect();
    let sections: Vec<&str> = models.iter().map(|m| m.section.as_str()).collect();
    assert_eq!(sections, ["gp030321_line_fitting", "gp101157_line_fitting"]);

    let text = ModelSet::new(models.clone()).to_toml().unwrap();
    let back: ModelSet = toml::from_str(&text).unwrap();
    assert_eq!(back.models.len(), 2);
    assert_eq!(back.models[0].section, "gp030321_line_fitting");
    assert_eq!(back.models[1].section, "gp101157_line_fitting");
    for (parsed, original) in back.models.iter().zip(&models) {
        assert_eq!(parsed.parameters.len(), original.parameters.len());
        assert_eq!(parsed, original);
    }
}

// ── Settings ─────────────────────────────────────────────────────────────

#[test]
fn e2e_known_lines_from_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "known_lines = [\"N2_9999A\"]\noutput_format = \"toml\"\n").unwrap();

    let settings = ResolverSettings::load_from(&path).unwrap();
    let resolver = Resolver::new(settings);
    assert_eq!(
        resolver.known_lines(),
        [LineIdentifier::parse("N2_9999A").unwrap()]
    );

    let doc = ConfigDocument::parse(OBSERVATIONS).unwrap();
    let results = resolver.resolve_document(&doc);
    let gp121903 = results
        .iter()
        .find(|(n, _)| n == "gp121903_line_fitting")
        .unwrap();
    let m = gp121903.1.as_ref().unwrap();
    assert!(m.ties.iter().any(|t| t.leader.to_string() == "N2_9999A"));
    assert!(m.to_toml().unwrap().contains("[[parameters]]"));
}
