//! Plan - the ordered Effects one apply performs
//!
//! Data source reads come first, then creates and updates in declaration
//! order, then deletes of resources that are no longer declared.

use crate::effect::Effect;
use crate::resource::ResourceId;

#[derive(Debug, Clone, Default)]
pub struct Plan {
    effects: Vec<Effect>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Effects that change something remotely
    pub fn mutation_count(&self) -> usize {
        self.effects.iter().filter(|e| e.is_mutating()).count()
    }

    /// The effect planned for a resource, if any
    pub fn effect_for(&self, id: &ResourceId) -> Option<&Effect> {
        self.effects
            .iter()
            .find(|e| e.is_mutating() && e.resource_id() == id)
    }

    pub fn summary(&self) -> PlanSummary {
        self.effects
            .iter()
            .fold(PlanSummary::default(), |mut summary, effect| {
                let counter = match effect {
                    Effect::Read(_) => &mut summary.read,
                    Effect::Create(_) => &mut summary.create,
                    Effect::Update { .. } => &mut summary.update,
                    Effect::Replace { .. } => &mut summary.replace,
                    Effect::Delete(_) => &mut summary.delete,
                };
                *counter += 1;
                summary
            })
    }
}

impl FromIterator<Effect> for Plan {
    fn from_iter<I: IntoIterator<Item = Effect>>(iter: I) -> Self {
        Self {
            effects: iter.into_iter().collect(),
        }
    }
}

/// Effect counts per kind
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub read: usize,
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to update, {} to replace, {} to delete",
            self.create, self.update, self.replace, self.delete
        )
    }
}
