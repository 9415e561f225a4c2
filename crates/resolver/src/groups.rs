//! Component groups and fit windows.

use crate::error::ErrorKind;
use crate::recipe::{EntryBody, RecipeEntry};
use linefit_core::{GroupKind, LineIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lines declared together by one `_m` / `_b` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentGroup {
    pub id: LineIdentifier,
    pub kind: GroupKind,
    pub index: Option<u32>,
    /// Non-empty; the first member is the primary.
    pub members: Vec<LineIdentifier>,
    /// Declaring key.
    pub key: String,
}

impl ComponentGroup {
    pub fn primary(&self) -> &LineIdentifier {
        &self.members[0]
    }

    /// Rest-wavelength span shared by the members, `[min, max]`.
    pub fn window(&self) -> [f64; 2] {
        rest_window(&self.members)
    }

    /// Number of fitted profiles.
    pub fn profiles(&self) -> usize {
        match self.kind {
            GroupKind::Merged => 1,
            GroupKind::Blended => self.members.len(),
        }
    }
}

fn rest_window(lines: &[LineIdentifier]) -> [f64; 2] {
    lines.iter().map(LineIdentifier::rest_wavelength).fold(
        [f64::INFINITY, f64::NEG_INFINITY],
        |[lo, hi], w| [lo.min(w), hi.max(w)],
    )
}

/// Build the groups declared in `entries`.
///
/// Groups that fail validation are left out of the result; their failures
/// come back as `(key, error)` pairs.
pub fn build(entries: &[RecipeEntry]) -> (Vec<ComponentGroup>, Vec<(String, ErrorKind)>) {
    let declared: Vec<ComponentGroup> = entries
        .iter()
        .filter_map(|entry| match &entry.body {
            EntryBody::Group {
                kind,
                id,
                index,
                members,
            } => Some(ComponentGroup {
                id: id.clone(),
                kind: *kind,
                index: *index,
                members: members.clone(),
                key: entry.key.clone(),
            }),
            _ => None,
        })
        .collect();

    let mut errors = Vec::new();
    let mut groups = Vec::with_capacity(declared.len());
    let mut owner: HashMap<&LineIdentifier, &ComponentGroup> = HashMap::new();
    let mut ids: HashMap<&LineIdentifier, &str> = HashMap::new();

    for group in &declared {
        if let Some(first) = ids.insert(&group.id, &group.key) {
            errors.push((
                group.key.clone(),
                ErrorKind::ConflictingConstraint(format!(
                    "group {} is already declared by '{first}'",
                    group.id
                )),
            ));
            continue;
        }

        // A member naming another group that does not itself list that
        // label is a nested group.
        let nested = group.members.iter().find(|m| {
            declared
                .iter()
                .any(|other| other.key != group.key && other.id == **m && !other.members.contains(*m))
        });
        if let Some(member) = nested {
            errors.push((
                group.key.clone(),
                ErrorKind::MalformedIdentifier(format!(
                    "member {member} is itself a group; groups do not nest"
                )),
            ));
            continue;
        }

        let mut failed = false;
        for (i, member) in group.members.iter().enumerate() {
            let claimed_by = if group.members[..i].contains(member) {
                Some(group)
            } else {
                owner.get(member).copied()
            };
            if let Some(previous) = claimed_by {
                errors.push((
                    group.key.clone(),
                    ErrorKind::DuplicateGroupMembership {
                        line: member.to_string(),
                        group: previous.id.to_string(),
                    },
                ));
                failed = true;
            }
        }
        if failed {
            continue;
        }

        for member in &group.members {
            owner.insert(member, group);
        }
        groups.push(group.clone());
    }

    (groups, errors)
}

/// How a fit window's lines are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Single,
    Merged,
    Blended,
}

/// One fit window: a group or a standalone line.
///
/// Continuum parameters belong to the feature and are carried by its
/// primary line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub kind: FeatureKind,
    pub members: Vec<LineIdentifier>,
    pub primary: LineIdentifier,
    pub profiles: usize,
    pub window: [f64; 2],
}

impl Feature {
    pub fn single(line: &LineIdentifier) -> Self {
        Self {
            id: line.to_string(),
            key: None,
            kind: FeatureKind::Single,
            members: vec![line.clone()],
            primary: line.clone(),
            profiles: 1,
            window: rest_window(std::slice::from_ref(line)),
        }
    }

    pub fn from_group(group: &ComponentGroup) -> Self {
        Self {
            id: group.id.to_string(),
            key: Some(group.key.clone()),
            kind: match group.kind {
                GroupKind::Merged => FeatureKind::Merged,
                GroupKind::Blended => FeatureKind::Blended,
            },
            members: group.members.clone(),
            primary: group.primary().clone(),
            profiles: group.profiles(),
            window: group.window(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind != FeatureKind::Single
    }
}
