//! Section construction: inheritance, parameter nodes and graph resolution.
//!
//! A [`Section`] is built once from the default entries and the section's
//! own entries. Building runs every validation pass and collects all
//! failures; a section that comes back `Ok` is fully resolved and
//! immutable.

use crate::error::{ErrorKind, SectionErrors};
use crate::graph::ConstraintGraph;
use crate::groups::{self, ComponentGroup, Feature};
use crate::recipe::{EntryBody, RecipeEntry};
use linefit_config::RawEntry;
use linefit_core::{
    Comparison, Constraint, Expr, GroupKind, LineIdentifier, ParamName, ParamRef, TiedExpr,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Where a node's constraint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// No entry mentions the parameter.
    Default,
    /// A parameter override entry.
    Entry,
    /// Collapsed into a merged group's primary.
    Group,
    /// Follows a kinematic leader.
    Kinematic,
}

/// One fit parameter of one line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterNode {
    pub target: ParamRef,
    pub constraint: Constraint,
    /// Initial value hint.
    pub value: Option<f64>,
    pub origin: Origin,
    /// Entry that set the constraint.
    pub key: Option<String>,
    /// Index into [`Section::features`].
    pub feature: usize,
}

impl ParameterNode {
    fn free(target: ParamRef, feature: usize) -> Self {
        Self {
            target,
            constraint: Constraint::Free,
            value: None,
            origin: Origin::Default,
            key: None,
            feature,
        }
    }

    fn tie_to(&mut self, source: ParamRef, origin: Origin, key: &str) {
        self.constraint = Constraint::Tied(TiedExpr {
            comparison: Comparison::Equal,
            expr: Expr::Ref(source),
        });
        self.origin = origin;
        self.key = Some(key.to_string());
    }

    /// Key used when reporting errors about this node.
    fn blame(&self) -> String {
        self.key
            .clone()
            .unwrap_or_else(|| self.target.to_string())
    }
}

/// `follower` moves with `leader`'s center and sigma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinematicTie {
    pub follower: LineIdentifier,
    pub leader: LineIdentifier,
    pub key: String,
}

/// A resolved line-fitting section.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    /// Classified entries after inheritance, in overlay order.
    pub entries: Vec<RecipeEntry>,
    pub groups: Vec<ComponentGroup>,
    pub features: Vec<Feature>,
    /// Declared lines in declaration order.
    pub lines: Vec<LineIdentifier>,
    /// Parameter nodes in declaration order.
    pub nodes: Vec<ParameterNode>,
    pub ties: Vec<KinematicTie>,
    index: HashMap<ParamRef, usize>,
    graph: ConstraintGraph,
    order: Vec<usize>,
    ranks: Vec<usize>,
}

impl Section {
    /// Build and resolve a section.
    ///
    /// `defaults` are the shared entries of the defaults section; `own`
    /// entries replace defaults with the same key. `known` lines may be
    /// referenced without being declared in the section.
    pub fn build(
        name: &str,
        defaults: &[RawEntry],
        own: &[RawEntry],
        known: &[LineIdentifier],
    ) -> Result<Self, SectionErrors> {
        let mut errors = SectionErrors::new(name);

        for key in duplicate_keys(defaults).into_iter().chain(duplicate_keys(own)) {
            errors.push(key, ErrorKind::DuplicateKey);
        }

        let mut entries = Vec::new();
        for raw in overlay(defaults, own) {
            match RecipeEntry::classify(&raw.key, &raw.value) {
                Ok(entry) => entries.push(entry),
                Err(kind) => errors.push(raw.key.trim(), kind),
            }
        }

        let (groups, group_errors) = groups::build(&entries);
        for (key, kind) in group_errors {
            errors.push(key, kind);
        }

        let lines = declared_lines(&entries, known);
        let (features, line_feature) = features(&lines, &groups);

        // Nodes in declaration order: line order, then parameter order.
        let mut nodes = Vec::new();
        let mut index = HashMap::new();
        for (li, line) in lines.iter().enumerate() {
            let feature = line_feature[li];
            let primary = features[feature].primary == *line;
            for param in ParamName::ALL {
                if param.is_continuum() && !primary {
                    continue;
                }
                let target = ParamRef::new(line.clone(), param);
                index.insert(target.clone(), nodes.len());
                nodes.push(ParameterNode::free(target, feature));
            }
        }

        let mut builder = NodeBuilder {
            nodes,
            index,
            lines: &lines,
            errors: &mut errors,
        };
        builder.collapse_merged(&groups);
        builder.apply_overrides(&entries);
        let ties = builder.apply_ties(&entries);
        builder.check_references();
        let NodeBuilder { nodes, index, .. } = builder;

        let mut graph = ConstraintGraph::new(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            let Some(tied) = node.constraint.tied() else {
                continue;
            };
            if tied.comparison.is_inequality() {
                continue;
            }
            for reference in tied.expr.references() {
                if let Some(&parent) = index.get(reference) {
                    graph.add_edge(parent, i);
                }
            }
        }

        for cycle in kinematic_cycles(&lines, &ties) {
            let key = ties
                .iter()
                .find(|t| t.follower == cycle[0])
                .map_or_else(|| cycle[0].to_string(), |t| t.key.clone());
            errors.push(
                key,
                ErrorKind::ConstraintCycle(cycle.iter().map(ToString::to_string).collect()),
            );
        }

        let order = match graph.topological_order() {
            Ok(order) => order,
            Err(cycles) => {
                for cycle in cycles {
                    // Pure kinematic loops are reported per line above.
                    if cycle.iter().all(|&i| nodes[i].origin == Origin::Kinematic) {
                        continue;
                    }
                    errors.push(
                        nodes[cycle[0]].blame(),
                        ErrorKind::ConstraintCycle(
                            cycle.iter().map(|&i| nodes[i].target.to_string()).collect(),
                        ),
                    );
                }
                Vec::new()
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let ranks = graph.ranks(&order, |i| nodes[i].constraint.is_equality_tie());

        debug!(
            section = %name,
            entries = entries.len(),
            lines = lines.len(),
            nodes = nodes.len(),
            edges = graph.edge_count(),
            "Section resolved"
        );

        Ok(Self {
            name: name.to_string(),
            entries,
            groups,
            features,
            lines,
            nodes,
            ties,
            index,
            graph,
            order,
            ranks,
        })
    }

    pub fn node(&self, target: &ParamRef) -> Option<&ParameterNode> {
        self.index.get(target).map(|&i| &self.nodes[i])
    }

    /// Index of `target` in [`Section::nodes`].
    pub fn node_index(&self, target: &ParamRef) -> Option<usize> {
        self.index.get(target).copied()
    }

    /// Node indices, every node after the nodes it is computed from.
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    /// Topological rank of a node (0 for nodes fit directly).
    pub fn rank(&self, node: usize) -> usize {
        self.ranks[node]
    }

    /// Nodes `node` is computed from.
    pub fn dependencies(&self, node: usize) -> &[usize] {
        self.graph.parents(node)
    }

    pub fn group_of(&self, line: &LineIdentifier) -> Option<&ComponentGroup> {
        self.groups.iter().find(|g| g.members.contains(line))
    }
}

/// Keys appearing more than once, each reported once.
fn duplicate_keys(entries: &[RawEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut out = Vec::new();
    for entry in entries {
        let key = entry.key.trim();
        if !seen.insert(key) && reported.insert(key) {
            out.push(key.to_string());
        }
    }
    out
}

/// Shallow one-level inheritance: a default keeps its position and takes
/// the section's value when overridden; section-only keys follow in order.
pub fn overlay(defaults: &[RawEntry], own: &[RawEntry]) -> Vec<RawEntry> {
    let mut merged: Vec<RawEntry> = Vec::with_capacity(defaults.len() + own.len());
    let mut position: HashMap<String, usize> = HashMap::new();
    for entry in defaults.iter().chain(own) {
        let key = entry.key.trim().to_string();
        match position.get(&key) {
            Some(&i) => merged[i] = entry.clone(),
            None => {
                position.insert(key, merged.len());
                merged.push(entry.clone());
            }
        }
    }
    merged
}

/// Lines the section declares, in first-mention order, followed by known
/// external lines that entries reference.
fn declared_lines(entries: &[RecipeEntry], known: &[LineIdentifier]) -> Vec<LineIdentifier> {
    let mut lines: Vec<LineIdentifier> = Vec::new();
    let mut seen: HashSet<LineIdentifier> = HashSet::new();
    let mut declare = |line: &LineIdentifier, lines: &mut Vec<LineIdentifier>| {
        if seen.insert(line.clone()) {
            lines.push(line.clone());
        }
    };

    for entry in entries {
        match &entry.body {
            EntryBody::Group { members, .. } => {
                for member in members {
                    declare(member, &mut lines);
                }
            }
            EntryBody::Kinematic { follower, .. } => declare(follower, &mut lines),
            EntryBody::Param { target, .. } => declare(&target.line, &mut lines),
        }
    }

    for entry in entries {
        let referenced: Vec<&LineIdentifier> = match &entry.body {
            EntryBody::Kinematic { leader, .. } => vec![leader],
            EntryBody::Param { recipe, .. } => recipe
                .constraint
                .tied()
                .map(|t| t.expr.references().into_iter().map(|r| &r.line).collect())
                .unwrap_or_default(),
            EntryBody::Group { .. } => Vec::new(),
        };
        for line in referenced {
            if known.contains(line) {
                declare(line, &mut lines);
            }
        }
    }

    lines
}

/// Fit windows ordered by first line appearance, and each line's window.
fn features(lines: &[LineIdentifier], groups: &[ComponentGroup]) -> (Vec<Feature>, Vec<usize>) {
    let mut features = Vec::new();
    let mut group_feature: HashMap<usize, usize> = HashMap::new();
    let mut line_feature = Vec::with_capacity(lines.len());

    for line in lines {
        let group = groups.iter().position(|g| g.members.contains(line));
        let feature = match group {
            Some(g) => *group_feature.entry(g).or_insert_with(|| {
                features.push(Feature::from_group(&groups[g]));
                features.len() - 1
            }),
            None => {
                features.push(Feature::single(line));
                features.len() - 1
            }
        };
        line_feature.push(feature);
    }

    (features, line_feature)
}

/// Loops in the follower → leader relation, each starting at its
/// earliest-declared line.
fn kinematic_cycles(lines: &[LineIdentifier], ties: &[KinematicTie]) -> Vec<Vec<LineIdentifier>> {
    let leader_of: HashMap<&LineIdentifier, &LineIdentifier> =
        ties.iter().map(|t| (&t.follower, &t.leader)).collect();
    let decl = |line: &LineIdentifier| lines.iter().position(|l| l == line).unwrap_or(usize::MAX);

    let mut done: HashSet<&LineIdentifier> = HashSet::new();
    let mut cycles = Vec::new();
    for start in lines {
        let mut path: Vec<&LineIdentifier> = Vec::new();
        let mut cur = start;
        while !done.contains(cur) {
            if let Some(at) = path.iter().position(|l| *l == cur) {
                let mut cycle: Vec<LineIdentifier> =
                    path[at..].iter().map(|l| (*l).clone()).collect();
                if let Some(first) = (0..cycle.len()).min_by_key(|&i| decl(&cycle[i])) {
                    cycle.rotate_left(first);
                }
                cycles.push(cycle);
                break;
            }
            path.push(cur);
            match leader_of.get(cur) {
                Some(&next) => cur = next,
                None => break,
            }
        }
        done.extend(path);
    }
    cycles
}

/// Applies entries to the freshly created nodes.
struct NodeBuilder<'a> {
    nodes: Vec<ParameterNode>,
    index: HashMap<ParamRef, usize>,
    lines: &'a [LineIdentifier],
    errors: &'a mut SectionErrors,
}

impl NodeBuilder<'_> {
    /// Secondary members of a merged group share the primary's profile.
    fn collapse_merged(&mut self, groups: &[ComponentGroup]) {
        for group in groups.iter().filter(|g| g.kind == GroupKind::Merged) {
            let primary = group.primary();
            for member in &group.members[1..] {
                for param in ParamName::PROFILE {
                    let target = ParamRef::new(member.clone(), param);
                    if let Some(&i) = self.index.get(&target) {
                        self.nodes[i].tie_to(
                            ParamRef::new(primary.clone(), param),
                            Origin::Group,
                            &group.key,
                        );
                    }
                }
            }
        }
    }

    fn apply_overrides(&mut self, entries: &[RecipeEntry]) {
        for entry in entries {
            let EntryBody::Param { target, recipe } = &entry.body else {
                continue;
            };
            let Some(&i) = self.index.get(target) else {
                self.errors.push(
                    &entry.key,
                    ErrorKind::DanglingReference(format!(
                        "{target} does not exist; continuum parameters belong to the primary line of a group"
                    )),
                );
                continue;
            };
            let node = &mut self.nodes[i];
            if node.origin == Origin::Group {
                self.errors.push(
                    &entry.key,
                    ErrorKind::ConflictingConstraint(format!(
                        "{target} is collapsed into its merged group by '{}'",
                        node.blame()
                    )),
                );
                continue;
            }
            node.constraint = recipe.constraint.clone();
            node.value = recipe.value;
            node.origin = Origin::Entry;
            node.key = Some(entry.key.clone());
        }
    }

    fn apply_ties(&mut self, entries: &[RecipeEntry]) -> Vec<KinematicTie> {
        let mut ties = Vec::new();
        for entry in entries {
            let EntryBody::Kinematic { follower, leader } = &entry.body else {
                continue;
            };
            if !self.lines.contains(leader) {
                self.errors.push(
                    &entry.key,
                    ErrorKind::DanglingReference(format!("kinematic leader {leader} is not declared")),
                );
                continue;
            }

            let mut targets = Vec::new();
            for param in ParamName::KINEMATIC {
                let Some(&i) = self.index.get(&ParamRef::new(follower.clone(), param)) else {
                    continue;
                };
                let node = &self.nodes[i];
                if matches!(node.origin, Origin::Entry | Origin::Group) {
                    self.errors.push(
                        &entry.key,
                        ErrorKind::ConflictingConstraint(format!(
                            "{} is already constrained by '{}'",
                            node.target,
                            node.blame()
                        )),
                    );
                } else {
                    targets.push((i, param));
                }
            }
            if targets.len() != ParamName::KINEMATIC.len() {
                continue;
            }

            for (i, param) in targets {
                self.nodes[i].tie_to(
                    ParamRef::new(leader.clone(), param),
                    Origin::Kinematic,
                    &entry.key,
                );
            }
            ties.push(KinematicTie {
                follower: follower.clone(),
                leader: leader.clone(),
                key: entry.key.clone(),
            });
        }
        ties
    }

    /// Every expression reference must name an existing node.
    fn check_references(&mut self) {
        for node in &self.nodes {
            if node.origin != Origin::Entry {
                continue;
            }
            let Some(tied) = node.constraint.tied() else {
                continue;
            };
            for reference in tied.expr.references() {
                if self.index.contains_key(reference) {
                    continue;
                }
                let detail = if self.lines.contains(&reference.line) {
                    format!("{reference} does not exist on {}", reference.line)
                } else {
                    format!("{reference} names undeclared line {}", reference.line)
                };
                self.errors
                    .push(node.blame(), ErrorKind::DanglingReference(detail));
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
