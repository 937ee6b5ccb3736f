//! Change planning.
//!
//! Compares what is known about a rule group with what a manifest declares.
//! `name`, `type`, and `capacity` cannot be changed in place, so a change to
//! any of them forces replacement. Everything else is updated in place.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeSet;
use std::fmt;

use super::{AttributeMap, DesiredState, ResourceState};
use crate::error::Result;
use crate::model::RuleGroupSpec;

/// Attributes whose change forces replacement.
pub const FORCE_NEW_ATTRIBUTES: &[&str] = &["name", "type", "capacity"];

/// Attributes the service changes on every write.
const VOLATILE_ATTRIBUTES: &[&str] = &["update_token"];

/// Kind of change to a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Remove,
    Modify,
}

/// A change to one attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    pub kind: ChangeKind,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl AttributeChange {
    /// Whether this change is only an element or entry count.
    pub fn is_count(&self) -> bool {
        self.path.ends_with(".#") || self.path.ends_with(".%")
    }

    /// Line diff for multi-line values such as rules text.
    pub fn text_diff(&self) -> Option<String> {
        let before = self.before.as_deref().unwrap_or("");
        let after = self.after.as_deref().unwrap_or("");
        if !before.contains('\n') && !after.contains('\n') {
            return None;
        }

        let diff = TextDiff::from_lines(before, after);
        let mut out = String::new();
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            out.push_str(sign);
            out.push_str(change.value());
            if !change.value().ends_with('\n') {
                out.push('\n');
            }
        }
        Some(out)
    }
}

impl fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChangeKind::Add => write!(f, "+ {} = {:?}", self.path, self.after.as_deref().unwrap_or("")),
            ChangeKind::Remove => {
                write!(f, "- {} = {:?}", self.path, self.before.as_deref().unwrap_or(""))
            }
            ChangeKind::Modify => write!(
                f,
                "~ {} = {:?} -> {:?}",
                self.path,
                self.before.as_deref().unwrap_or(""),
                self.after.as_deref().unwrap_or("")
            ),
        }
    }
}

/// What has to happen to bring a rule group in line with its declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum PlanAction {
    Create,
    /// Delete and recreate; `reasons` lists the attributes forcing it.
    Replace { reasons: Vec<String> },
    Update,
    Delete,
    NoOp,
}

impl PlanAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanAction::Create => "create",
            PlanAction::Replace { .. } => "replace",
            PlanAction::Update => "update",
            PlanAction::Delete => "delete",
            PlanAction::NoOp => "no-op",
        }
    }

    /// Short marker used in plan output.
    pub fn symbol(&self) -> &'static str {
        match self {
            PlanAction::Create => "+",
            PlanAction::Replace { .. } => "-/+",
            PlanAction::Update => "~",
            PlanAction::Delete => "-",
            PlanAction::NoOp => " ",
        }
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Planned action plus the attribute changes behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(flatten)]
    pub action: PlanAction,
    pub changes: Vec<AttributeChange>,
}

impl Plan {
    /// Plan to remove a resource that is no longer declared.
    pub fn delete(prior: &ResourceState) -> Result<Self> {
        let before = prior.attributes()?.filtered(|k| !is_volatile(k));
        Ok(Self {
            action: PlanAction::Delete,
            changes: diff_attributes(&before, &AttributeMap::default()),
        })
    }

    pub fn is_no_op(&self) -> bool {
        self.action == PlanAction::NoOp
    }

    /// Whether anything other than tags changes.
    pub fn body_changed(&self) -> bool {
        self.changes.iter().any(|c| !c.path.starts_with("tags."))
    }

    pub fn tags_changed(&self) -> bool {
        self.changes.iter().any(|c| c.path.starts_with("tags."))
    }
}

fn is_volatile(key: &str) -> bool {
    VOLATILE_ATTRIBUTES.contains(&key)
}

/// Changes turning `before` into `after`, ordered by path.
pub fn diff_attributes(before: &AttributeMap, after: &AttributeMap) -> Vec<AttributeChange> {
    let keys: BTreeSet<&str> = before.iter().chain(after.iter()).map(|(k, _)| k).collect();

    keys.into_iter()
        .filter_map(|key| {
            let old = before.get(key);
            let new = after.get(key);
            let kind = match (old, new) {
                (None, Some(_)) => ChangeKind::Add,
                (Some(_), None) => ChangeKind::Remove,
                (Some(a), Some(b)) if a != b => ChangeKind::Modify,
                _ => return None,
            };
            Some(AttributeChange {
                path: key.to_string(),
                kind,
                before: old.map(str::to_string),
                after: new.map(str::to_string),
            })
        })
        .collect()
}

/// Plans the change from `prior` (if the rule group exists) to `desired`.
pub fn plan(prior: Option<&ResourceState>, desired: &RuleGroupSpec) -> Result<Plan> {
    let declares_body = desired.rule_group.is_some();
    let managed = |key: &str| {
        matches!(key, "name" | "type" | "capacity" | "description" | "rules")
            || key.starts_with("tags.")
            || (declares_body && key.starts_with("rule_group."))
    };

    let after = DesiredState::from_spec(desired).attributes()?.filtered(managed);

    let Some(prior) = prior else {
        return Ok(Plan {
            action: PlanAction::Create,
            changes: diff_attributes(&AttributeMap::default(), &after),
        });
    };

    let before = prior.attributes()?.filtered(managed);
    let changes = diff_attributes(&before, &after);

    let reasons: Vec<String> = changes
        .iter()
        .filter(|c| FORCE_NEW_ATTRIBUTES.contains(&c.path.as_str()))
        .map(|c| c.path.clone())
        .collect();

    let action = if !reasons.is_empty() {
        PlanAction::Replace { reasons }
    } else if !changes.is_empty() {
        PlanAction::Update
    } else {
        PlanAction::NoOp
    };

    Ok(Plan { action, changes })
}

/// Differences between an imported state and the expected one.
///
/// Attributes starting with any of `ignore` are skipped, as is the update
/// token. An empty result means the import reproduced the state.
pub fn verify_import(
    imported: &ResourceState,
    expected: &ResourceState,
    ignore: &[&str],
) -> Result<Vec<AttributeChange>> {
    let keep = |key: &str| !is_volatile(key) && !ignore.iter().any(|p| key.starts_with(p));
    Ok(diff_attributes(
        &expected.attributes()?.filtered(keep),
        &imported.attributes()?.filtered(keep),
    ))
}
