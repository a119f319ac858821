//! Effect - A single side effect that applying a Plan performs

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Evaluate a data source
    Read(Resource),
    Create(Resource),
    Update {
        id: ResourceId,
        from: Box<State>,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete then create; used when an immutable attribute changes
    Replace {
        id: ResourceId,
        from: Box<State>,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    Delete(Box<State>),
}

impl Effect {
    /// Returns whether this Effect changes anything remotely
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read(_))
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read(r) | Effect::Create(r) => &r.id,
            Effect::Update { id, .. } | Effect::Replace { id, .. } => id,
            Effect::Delete(state) => &state.id,
        }
    }

    /// One-character marker used in plan output
    pub fn symbol(&self) -> &'static str {
        match self {
            Effect::Read(_) => "<=",
            Effect::Create(_) => "+",
            Effect::Update { .. } => "~",
            Effect::Replace { .. } => "-/+",
            Effect::Delete(_) => "-",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_is_not_mutating() {
        let effect = Effect::Read(Resource::new("aws_account", "prod").with_read_only(true));
        assert!(!effect.is_mutating());
        assert!(Effect::Create(Resource::new("aws_account", "prod")).is_mutating());
    }

    #[test]
    fn delete_reports_state_id() {
        let id = ResourceId::new("gcp_project", "analytics");
        let effect = Effect::Delete(Box::new(State::not_found(id.clone())));
        assert_eq!(effect.resource_id(), &id);
        assert_eq!(effect.symbol(), "-");
    }
}
