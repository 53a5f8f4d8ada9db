//! Applying change instances to the world.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WorldResult;
use crate::node::{NodeId, NodeType, Role};
use crate::outcome::Outcome;
use crate::resolver::Tier;
use crate::schema::{Multiplicity, RelationKind};
use crate::value::Presence;

use super::World;

/// What [`World::apply_change`] did, counted per relation entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    /// Keys newly added as personal entries.
    pub added: usize,
    /// Inherited keys overridden so the change could apply to a copy.
    pub overridden: usize,
    /// Entries already personal or overridden whose properties were updated.
    pub updated: usize,
    /// Personal entries or overrides removed by an `Absent` presence.
    pub removed: usize,
    /// Entries that could not apply: kinds the subject cannot carry, removal
    /// of an inherited-only key, or a refused add.
    pub skipped: usize,
}

impl World {
    /// Apply the relations of a change instance to `subject` in one batch.
    ///
    /// For each personal relation of the change:
    /// - with presence `Absent`, the personal entry or override with that
    ///   key is removed;
    /// - otherwise the key is added if absent, overridden if only
    ///   inherited, or reused if personal or overridden, and the change's
    ///   quantity, necessity and value are copied onto it.
    ///
    /// Nested change relations apply to the resulting instance, recursively.
    /// Fails if `change` is not a change instance or `subject` is unknown.
    pub fn apply_change(&mut self, subject: NodeId, change: NodeId) -> WorldResult<Outcome<ChangeReport>> {
        let Some(NodeType::Instance {
            role: Role::Change, ..
        }) = self.node_type(change)
        else {
            return Ok(Outcome::Fail);
        };
        if !self.contains(subject) || subject == change {
            return Ok(Outcome::Fail);
        }

        let mut report = ChangeReport::default();
        self.batch(|w| w.apply_nested(subject, change, &mut report))?;
        debug!(%subject, %change, ?report, "change applied");
        Ok(Outcome::Success(report))
    }

    fn apply_nested(&mut self, subject: NodeId, change: NodeId, report: &mut ChangeReport) -> WorldResult<()> {
        let change_type = self.require(change)?;
        let subject_type = self.require(subject)?;

        for kind in RelationKind::for_owner(change_type) {
            let entries = self.personal(change, kind)?;
            if !kind.accepts_owner(subject_type) {
                report.skipped += entries.len();
                continue;
            }
            let keyed = kind.descriptor().key == Multiplicity::Unique;

            for entry in entries {
                let presence = self.presence(entry.instance)?.unwrap_or_default();
                let existing = if keyed {
                    self.find(subject, kind, entry.target)?
                } else {
                    None
                };

                if presence == Presence::Absent {
                    let removed = match existing.map(|e| e.tier) {
                        Some(Tier::Personal) => self.remove_relation(subject, kind, entry.target)?,
                        Some(Tier::Overridden) => self.remove_override(subject, kind, entry.target)?,
                        Some(Tier::Inherited) | None => Outcome::Fail,
                    };
                    if removed.is_success() {
                        report.removed += 1;
                    } else {
                        report.skipped += 1;
                    }
                    continue;
                }

                let applied = match existing {
                    Some(e) if e.tier != Tier::Inherited => {
                        report.updated += 1;
                        e.instance
                    }
                    Some(_) => match self.override_relation(subject, kind, entry.target)? {
                        Outcome::Success(copy) => {
                            report.overridden += 1;
                            copy
                        }
                        _ => {
                            report.skipped += 1;
                            continue;
                        }
                    },
                    None => match self.add_relation(subject, kind, entry.target)? {
                        Outcome::Success(added) => {
                            report.added += 1;
                            added
                        }
                        _ => {
                            report.skipped += 1;
                            continue;
                        }
                    },
                };

                self.copy_change_properties(entry.instance, applied)?;
                self.apply_nested(applied, entry.instance, report)?;
            }
        }
        Ok(())
    }

    /// Copy the change's quantity, necessity and value onto `to`. Properties
    /// `to` cannot carry are left out.
    fn copy_change_properties(&mut self, from: NodeId, to: NodeId) -> WorldResult<()> {
        let mut copied = Vec::with_capacity(3);
        if let Some(quantity) = self.quantity(from)? {
            copied.push(("quantity", self.set_quantity(to, Some(quantity))?));
        }
        if let Some(necessity) = self.necessity(from)? {
            copied.push(("necessity", self.set_necessity(to, Some(necessity))?));
        }
        if let Some(value) = self.value(from)? {
            copied.push(("value", self.set_value(to, Some(value))?));
        }
        for (property, outcome) in copied {
            if outcome.is_fail() {
                debug!(%from, %to, property, "change property not carried by target");
            }
        }
        Ok(())
    }
}
