//! Topology-aware scene normalization.
//!
//! Imported map models carry auxiliary geometry that has no business in a
//! render scene: collision meshes, collision spheres, low-detail LOD
//! variants, organizational placeholder nodes, and per-slot wheel
//! duplicates that all point at one template. [`cleanup`] removes the
//! auxiliary nodes, consolidates wheel instances onto the shared template
//! geometry, and guarantees that every surviving original node keeps the
//! world transform it had before the operation started.
//!
//! The pass never fails: an absent wheel template or a scene without any
//! tagged nodes is a logged no-op, and re-running the pass on an already
//! clean scene performs no further removals or creations.

use crate::scene::{NodeKind, Scene, Transform};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// How a name-driven rule matches a node name. Matching is
/// case-insensitive.
#[derive(Debug, Clone, Copy)]
pub enum NamePattern {
    Contains(&'static str),
    EndsWith(&'static str),
}

impl NamePattern {
    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        match self {
            NamePattern::Contains(tag) => lower.contains(tag),
            NamePattern::EndsWith(suffix) => lower.ends_with(suffix),
        }
    }
}

/// A single removal rule: nodes whose name matches `pattern` are dropped.
#[derive(Debug, Clone, Copy)]
pub struct NameRule {
    pub pattern: NamePattern,
    pub reason: &'static str,
}

/// The auxiliary-geometry naming policy, kept in one table so it can be
/// audited and tested in isolation.
pub const REMOVAL_RULES: &[NameRule] = &[
    NameRule {
        pattern: NamePattern::Contains("colmesh"),
        reason: "collision mesh",
    },
    NameRule {
        pattern: NamePattern::Contains("colsphere"),
        reason: "collision sphere",
    },
    NameRule {
        pattern: NamePattern::EndsWith("vlo"),
        reason: "LOD geometry",
    },
];

/// Prefix shared by all wheel instance slots (`wheel_lf`, `wheel_rb`, ...).
pub const WHEEL_INSTANCE_PREFIX: &str = "wheel_";
/// Prefix of the left-side wheel slots, which need a mirror to face out.
pub const WHEEL_LEFT_PREFIX: &str = "wheel_l";

fn removal_reason(name: &str) -> Option<&'static str> {
    REMOVAL_RULES
        .iter()
        .find(|rule| rule.pattern.matches(name))
        .map(|rule| rule.reason)
}

/// `wheel`, `wheel.001`... are templates; anything with a `_` delimiter is
/// an instance slot, not a template.
fn is_wheel_template_name(name: &str) -> bool {
    name.starts_with("wheel") && !name.contains('_')
}

/// One action taken by the cleanup pass, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    /// A node matched a removal rule and was deleted.
    Removed { name: String, reason: &'static str },
    /// The wheel template mesh was captured and its node deleted.
    TemplateRemoved { name: String },
    /// A mesh node was created at a wheel slot from the template geometry.
    InstanceCreated {
        source: String,
        name: String,
        mirrored: bool,
    },
    /// A placeholder node was deleted after detaching its children.
    PlaceholderRemoved { name: String },
}

impl fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupAction::Removed { name, reason } => {
                write!(f, "removed {name} ({reason})")
            }
            CleanupAction::TemplateRemoved { name } => {
                write!(f, "removed wheel template {name}")
            }
            CleanupAction::InstanceCreated { source, name, mirrored } => {
                if *mirrored {
                    write!(f, "created mirrored wheel {name} at slot {source}")
                } else {
                    write!(f, "created wheel {name} at slot {source}")
                }
            }
            CleanupAction::PlaceholderRemoved { name } => {
                write!(f, "removed placeholder {name}")
            }
        }
    }
}

/// Ordered log of everything a cleanup pass did.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub actions: Vec<CleanupAction>,
    /// Nodes whose world transform was re-applied from the pre-pass
    /// snapshot.
    pub transforms_restored: usize,
}

impl CleanupReport {
    pub fn removed_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| {
                matches!(
                    a,
                    CleanupAction::Removed { .. }
                        | CleanupAction::TemplateRemoved { .. }
                        | CleanupAction::PlaceholderRemoved { .. }
                )
            })
            .count()
    }

    pub fn created_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, CleanupAction::InstanceCreated { .. }))
            .count()
    }

    /// True when the pass changed nothing (the scene was already clean).
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} removed, {} created, {} transforms restored",
            self.removed_count(),
            self.created_count(),
            self.transforms_restored
        )
    }
}

/// Run the five-stage normalization over the whole scene.
///
/// Stage order matters: the name/transform snapshot is taken before any
/// mutation, and restoration runs last so that transform drift caused by
/// the structural edits in between is undone. Every stage is best-effort
/// and skips nodes that no longer exist.
pub fn cleanup(scene: &mut Scene) -> CleanupReport {
    let mut report = CleanupReport::default();

    // Stage 1: snapshot. Source of truth for the final restoration.
    let snapshot: Vec<(String, Transform)> = scene
        .ids()
        .iter()
        .filter_map(|id| scene.node(*id))
        .map(|n| (n.name.clone(), n.world_transform))
        .collect();
    let placeholder_names: Vec<String> = scene
        .ids()
        .iter()
        .filter_map(|id| scene.node(*id))
        .filter(|n| n.kind == NodeKind::Placeholder)
        .map(|n| n.name.clone())
        .collect();

    // Stage 2: tag-based removal.
    for (name, _) in &snapshot {
        let Some(reason) = removal_reason(name) else {
            continue;
        };
        if let Some(id) = scene.find_by_name(name) {
            scene.remove(id);
            debug!(node = %name, reason, "removed tagged node");
            report.actions.push(CleanupAction::Removed {
                name: name.clone(),
                reason,
            });
        }
    }

    // Stage 3: wheel consolidation. Every bare-named template is removed;
    // the last one's geometry is what the slots instance. Then rebuild
    // each slot as a real mesh instance.
    let mut template_mesh: Option<Arc<crate::scene::MeshData>> = None;
    let templates: Vec<_> = scene
        .ids()
        .into_iter()
        .filter_map(|id| scene.node(id))
        .filter(|n| n.kind == NodeKind::Mesh && is_wheel_template_name(&n.name))
        .map(|n| (n.id, n.name.clone(), n.mesh.clone()))
        .collect();
    if templates.is_empty() {
        debug!("no wheel template present, consolidation skipped");
    }
    for (id, name, mesh) in templates {
        template_mesh = mesh;
        scene.remove(id);
        debug!(node = %name, "removed wheel template");
        report.actions.push(CleanupAction::TemplateRemoved { name });
    }

    if let Some(mesh) = template_mesh {
        for slot_name in &placeholder_names {
            if !slot_name.starts_with(WHEEL_INSTANCE_PREFIX) {
                continue;
            }
            let Some(slot_id) = scene.find_by_name(slot_name) else {
                continue;
            };
            let slot_transform = match scene.node(slot_id) {
                Some(node) => node.world_transform,
                None => continue,
            };
            // Historical naming scheme: the created node keeps the full
            // slot name under another `wheel_` prefix (`wheel_wheel_lf`).
            let name = format!("wheel_{slot_name}");
            let mirrored = slot_name.starts_with(WHEEL_LEFT_PREFIX);
            let transform = if mirrored {
                slot_transform.mirrored_x()
            } else {
                slot_transform
            };
            scene.add_mesh(name.clone(), transform, Arc::clone(&mesh));
            debug!(slot = %slot_name, node = %name, mirrored, "created wheel instance");
            report.actions.push(CleanupAction::InstanceCreated {
                source: slot_name.clone(),
                name,
                mirrored,
            });
        }
    }

    // Stage 4: placeholder removal. Children are detached, never deleted.
    for name in &placeholder_names {
        if let Some(id) = scene.find_by_name(name) {
            scene.remove(id);
            debug!(node = %name, "removed placeholder");
            report.actions.push(CleanupAction::PlaceholderRemoved { name: name.clone() });
        }
    }

    // Stage 5: transform restoration. Ancestor removal disturbs the
    // effective placement of anything that hung below; put every
    // surviving original node back exactly where the snapshot says.
    for (name, transform) in &snapshot {
        if let Some(id) = scene.find_by_name(name) {
            if let Some(node) = scene.node_mut(id) {
                node.world_transform = *transform;
                report.transforms_restored += 1;
            }
        }
    }

    info!(%report, "cleanup finished");
    report
}
