//! Planning and applying a configuration against a provider and a state backend

use std::collections::HashMap;

use colored::Colorize;
use log::debug;
use streamsec_core::differ::{Diff, create_plan, diff};
use streamsec_core::effect::Effect;
use streamsec_core::plan::Plan;
use streamsec_core::provider::Provider;
use streamsec_core::resource::{Attributes, Resource, ResourceId, State};
use streamsec_core::schema::ResourceSchema;
use streamsec_state::{StateBackend, StateFile};

use crate::config_file::{Bindings, Configuration, binding_of};
use crate::display::format_effect;

/// Resource and data source schemas, keyed by type
///
/// The two are kept apart since a type name such as `aws_account` names both.
#[derive(Debug, Default)]
pub struct Schemas {
    pub resources: HashMap<String, ResourceSchema>,
    pub data_sources: HashMap<String, ResourceSchema>,
}

impl Schemas {
    pub fn from_provider(provider: &dyn Provider) -> Self {
        Self::from_lists(provider.resource_schemas(), provider.data_source_schemas())
    }

    /// Schemas of the Stream.Security provider, without logging in
    pub fn builtin() -> Self {
        Self::from_lists(
            streamsec_provider::resources::all()
                .iter()
                .map(|h| h.schema())
                .collect(),
            streamsec_provider::data_sources::all()
                .iter()
                .map(|h| h.schema())
                .collect(),
        )
    }

    fn from_lists(resources: Vec<ResourceSchema>, data_sources: Vec<ResourceSchema>) -> Self {
        let by_type = |schemas: Vec<ResourceSchema>| {
            schemas
                .into_iter()
                .map(|s| (s.resource_type.clone(), s))
                .collect()
        };
        Self {
            resources: by_type(resources),
            data_sources: by_type(data_sources),
        }
    }

    pub fn get(&self, resource: &Resource) -> Option<&ResourceSchema> {
        if resource.is_data_source() {
            self.data_sources.get(&resource.id.resource_type)
        } else {
            self.resources.get(&resource.id.resource_type)
        }
    }

    pub fn for_effect(&self, effect: &Effect) -> Option<&ResourceSchema> {
        match effect {
            Effect::Read(r) => self.data_sources.get(&r.id.resource_type),
            _ => self.resources.get(&effect.resource_id().resource_type),
        }
    }
}

/// Check every block against its schema
pub fn validate(config: &Configuration, schemas: &Schemas) -> Result<(), String> {
    let mut problems = Vec::new();
    for resource in config.all() {
        let kind = if resource.is_data_source() { "data source" } else { "resource" };
        match schemas.get(resource) {
            None => problems.push(format!(
                "{}: unknown {} type '{}'",
                resource.id, kind, resource.id.resource_type
            )),
            Some(schema) => {
                if let Err(errors) = schema.validate(&resource.attributes) {
                    for e in errors {
                        problems.push(format!("{}: {}", resource.id, e));
                    }
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(format!("Validation failed:\n  {}", problems.join("\n  ")))
    }
}

/// Re-read every stored resource, dropping the ones that are gone
///
/// Returns the ids that were removed.
pub async fn refresh(
    provider: &dyn Provider,
    state: &mut StateFile,
) -> Result<Vec<ResourceId>, String> {
    let mut removed = Vec::new();
    for current in state.resources.iter().map(|r| r.to_state()).collect::<Vec<_>>() {
        debug!("Refreshing {}", current.id);
        let fresh = provider.read(&current).await.map_err(|e| e.to_string())?;
        if !fresh.exists {
            removed.push(current.id.clone());
        }
        state.apply_state(provider.name(), &fresh);
    }
    Ok(removed)
}

/// Evaluate data sources in order, each one seeing the results before it
pub async fn read_data_sources(
    provider: &dyn Provider,
    config: &Configuration,
    bindings: &mut Bindings,
) -> Result<Vec<(Resource, State)>, String> {
    let mut results = Vec::new();
    for data in &config.data_sources {
        let query = bindings.resolve(data);
        let state = read_data_source(provider, &query).await?;
        bindings.insert(binding_of(data), &state.attributes, &query.attributes);
        results.push((query, state));
    }
    Ok(results)
}

async fn read_data_source(provider: &dyn Provider, query: &Resource) -> Result<State, String> {
    let state = provider
        .read_data_source(query)
        .await
        .map_err(|e| e.to_string())?;
    if !state.exists {
        return Err(format!("data source {}: no matching object found", query.id));
    }
    Ok(state)
}

/// Diff the configuration against refreshed state
pub async fn plan(
    provider: &dyn Provider,
    config: &Configuration,
    schemas: &Schemas,
    current: &HashMap<ResourceId, State>,
) -> Result<Plan, String> {
    let mut bindings = Bindings::default();
    let mut desired: Vec<Resource> = read_data_sources(provider, config, &mut bindings)
        .await?
        .into_iter()
        .map(|(query, _)| query)
        .collect();

    for resource in &config.resources {
        let resolved = bindings.resolve(resource);
        // A resource about to be (re)created exposes only its configured values;
        // its computed attributes stay references until apply.
        let known = match current.get(&resource.id).filter(|s| s.exists) {
            Some(stored) => {
                let schema = schemas.resources.get(&resource.id.resource_type);
                match diff(&resolved, stored, schema) {
                    Diff::Replace { .. } => Attributes::new(),
                    _ => stored.attributes.clone(),
                }
            }
            None => Attributes::new(),
        };
        bindings.insert(binding_of(resource), &known, &resolved.attributes);
        desired.push(resolved);
    }

    Ok(create_plan(&desired, current, &schemas.resources))
}

/// Delete every stored resource, declared ones in reverse declaration order
pub fn destroy_plan(config: &Configuration, state: &StateFile) -> Plan {
    let mut plan = Plan::new();
    let stored = state.states();

    let mut declared: Vec<&ResourceId> = config.resources.iter().map(|r| &r.id).collect();
    declared.reverse();
    for id in &declared {
        if let Some(current) = stored.get(*id).filter(|s| s.exists) {
            plan.add(Effect::Delete(Box::new(current.clone())));
        }
    }

    let mut undeclared: Vec<&State> = stored
        .values()
        .filter(|s| s.exists && !declared.contains(&&s.id))
        .collect();
    undeclared.sort_by(|a, b| b.id.cmp(&a.id));
    for current in undeclared {
        plan.add(Effect::Delete(Box::new(current.clone())));
    }
    plan
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Execute a plan in order, persisting state after every successful change
///
/// A failed effect is reported and the rest still run; anything referring to
/// the failed resource then fails on its unresolved reference.
pub async fn apply(
    provider: &dyn Provider,
    backend: &dyn StateBackend,
    state: &mut StateFile,
    plan: &Plan,
) -> ApplyReport {
    let mut bindings = Bindings::default();
    for current in state.states().values() {
        bindings.insert(current.id.to_string(), &current.attributes, &Attributes::new());
    }

    let mut report = ApplyReport::default();
    for effect in plan.effects() {
        match execute(provider, backend, state, &mut bindings, effect).await {
            Ok(()) => {
                if effect.is_mutating() {
                    report.succeeded += 1;
                }
                println!("  {} {}", "✓".green(), format_effect(effect));
            }
            Err(e) => {
                report.failed += 1;
                println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
            }
        }
    }
    report
}

async fn execute(
    provider: &dyn Provider,
    backend: &dyn StateBackend,
    state: &mut StateFile,
    bindings: &mut Bindings,
    effect: &Effect,
) -> Result<(), String> {
    match effect {
        Effect::Read(query) => {
            let query = bindings.resolve(query);
            let result = read_data_source(provider, &query).await?;
            bindings.insert(binding_of(&query), &result.attributes, &query.attributes);
        }
        Effect::Create(resource) => {
            let resource = bindings.resolve(resource);
            let created = provider.create(&resource).await.map_err(|e| e.to_string())?;
            record(provider, backend, state, &created).await?;
            bindings.insert(binding_of(&resource), &created.attributes, &resource.attributes);
        }
        Effect::Update { from, to, .. } => {
            let to = bindings.resolve(to);
            let updated = provider.update(from, &to).await.map_err(|e| e.to_string())?;
            record(provider, backend, state, &updated).await?;
            bindings.insert(binding_of(&to), &updated.attributes, &to.attributes);
        }
        Effect::Replace { from, to, .. } => {
            let to = bindings.resolve(to);
            provider.delete(from).await.map_err(|e| e.to_string())?;
            record(provider, backend, state, &State::not_found(from.id.clone())).await?;
            let created = provider.create(&to).await.map_err(|e| e.to_string())?;
            record(provider, backend, state, &created).await?;
            bindings.insert(binding_of(&to), &created.attributes, &to.attributes);
        }
        Effect::Delete(current) => {
            provider.delete(current).await.map_err(|e| e.to_string())?;
            record(provider, backend, state, &State::not_found(current.id.clone())).await?;
        }
    }
    Ok(())
}

/// Store the outcome of one provider call
async fn record(
    provider: &dyn Provider,
    backend: &dyn StateBackend,
    state: &mut StateFile,
    outcome: &State,
) -> Result<(), String> {
    state.apply_state(provider.name(), outcome);
    persist(backend, state).await
}

pub async fn persist(backend: &dyn StateBackend, state: &mut StateFile) -> Result<(), String> {
    state.increment_serial();
    backend
        .write_state(state)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use streamsec_core::provider::{BoxFuture, ProviderError, ProviderResult};
    use streamsec_core::resource::Value;
    use streamsec_core::schema::{AttributeSchema, AttributeType};
    use streamsec_state::{BackendConfig, create_backend};
    use tempfile::TempDir;

    /// Keeps remote objects in memory and records every call
    #[derive(Default)]
    struct FakeProvider {
        remote: Mutex<HashMap<ResourceId, Attributes>>,
        calls: Mutex<Vec<String>>,
        fail_on: Option<ResourceId>,
    }

    impl FakeProvider {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn resource_schemas(&self) -> Vec<ResourceSchema> {
            vec![
                ResourceSchema::new("gcp_project")
                    .with_id("The ID of the account.")
                    .attribute(
                        AttributeSchema::new("project_id", AttributeType::String)
                            .required()
                            .requires_replace(),
                    )
                    .attribute(AttributeSchema::new("display_name", AttributeType::String)),
                ResourceSchema::new("gcp_project_ack")
                    .attribute(AttributeSchema::new("project_id", AttributeType::String).required()),
            ]
        }

        fn data_source_schemas(&self) -> Vec<ResourceSchema> {
            vec![
                ResourceSchema::new("gcp_project")
                    .attribute(AttributeSchema::new("project_id", AttributeType::String).required()),
            ]
        }

        fn read<'a>(&'a self, current: &'a State) -> BoxFuture<'a, ProviderResult<State>> {
            Box::pin(async move {
                self.log(format!("read {}", current.id));
                Ok(match self.remote.lock().unwrap().get(&current.id) {
                    Some(attrs) => State::existing(current.id.clone(), attrs.clone()),
                    None => State::not_found(current.id.clone()),
                })
            })
        }

        fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ProviderResult<State>> {
            Box::pin(async move {
                self.log(format!("create {}", resource.id));
                if self.fail_on.as_ref() == Some(&resource.id) {
                    return Err(ProviderError::new("boom").for_resource(resource.id.clone()));
                }
                if let Some((k, _)) = resource
                    .attributes
                    .iter()
                    .find(|(_, v)| matches!(v, Value::ResourceRef(_, _)))
                {
                    return Err(ProviderError::new(format!("unresolved {}", k)));
                }
                // Projects get a new id whenever their project_id changes
                let id = match resource.attributes.get("project_id") {
                    Some(Value::String(project)) if resource.id.resource_type == "gcp_project" => {
                        format!("id-{}", project)
                    }
                    _ => format!("id-{}", resource.id.name),
                };
                let mut attrs = resource.attributes.clone();
                attrs.insert("id".to_string(), Value::String(id));
                self.remote
                    .lock()
                    .unwrap()
                    .insert(resource.id.clone(), attrs.clone());
                Ok(State::existing(resource.id.clone(), attrs))
            })
        }

        fn update<'a>(
            &'a self,
            from: &'a State,
            to: &'a Resource,
        ) -> BoxFuture<'a, ProviderResult<State>> {
            Box::pin(async move {
                self.log(format!("update {}", to.id));
                let mut attrs = from.attributes.clone();
                attrs.extend(to.attributes.clone());
                self.remote.lock().unwrap().insert(to.id.clone(), attrs.clone());
                Ok(State::existing(to.id.clone(), attrs))
            })
        }

        fn delete<'a>(&'a self, current: &'a State) -> BoxFuture<'a, ProviderResult<()>> {
            Box::pin(async move {
                self.log(format!("delete {}", current.id));
                self.remote.lock().unwrap().remove(&current.id);
                Ok(())
            })
        }

        fn import<'a>(
            &'a self,
            resource_type: &'a str,
            name: &'a str,
            _import_id: &'a str,
        ) -> BoxFuture<'a, ProviderResult<State>> {
            Box::pin(async move {
                Err(ProviderError::new("unsupported")
                    .for_resource(ResourceId::new(resource_type, name)))
            })
        }

        fn read_data_source<'a>(
            &'a self,
            query: &'a Resource,
        ) -> BoxFuture<'a, ProviderResult<State>> {
            Box::pin(async move {
                self.log(format!("data {}", query.id));
                let mut attrs = query.attributes.clone();
                attrs.insert("account_token".to_string(), Value::String("tok".to_string()));
                Ok(State::existing(query.id.clone(), attrs))
            })
        }
    }

    const CONFIG: &str = r#"{
        "data": [
            { "type": "gcp_project", "name": "shared", "attributes": { "project_id": "acme-shared" } }
        ],
        "resources": [
            { "type": "gcp_project", "name": "analytics", "attributes": {
                "project_id": "acme-analytics", "display_name": "Analytics" } },
            { "type": "gcp_project_ack", "name": "analytics", "attributes": {
                "project_id": "${gcp_project.analytics.id}" } }
        ]
    }"#;

    fn backend(dir: &TempDir) -> Box<dyn StateBackend> {
        let path = dir.path().join("streamsec.state.json");
        create_backend(&BackendConfig::local(path.to_string_lossy())).unwrap()
    }

    async fn plan_and_apply(
        provider: &FakeProvider,
        backend: &dyn StateBackend,
        config: &Configuration,
    ) -> (Plan, ApplyReport) {
        let schemas = Schemas::from_provider(provider);
        let mut state = backend.read_state().await.unwrap().unwrap_or_default();
        refresh(provider, &mut state).await.unwrap();
        let plan = plan(provider, config, &schemas, &state.states()).await.unwrap();
        let report = apply(provider, backend, &mut state, &plan).await;
        (plan, report)
    }

    #[tokio::test]
    async fn apply_resolves_references_and_persists_state() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let provider = FakeProvider::default();
        let config = Configuration::parse(CONFIG).unwrap();

        let (plan, report) = plan_and_apply(&provider, backend.as_ref(), &config).await;
        assert_eq!(plan.summary().read, 1);
        assert_eq!(plan.summary().create, 2);
        assert_eq!(report, ApplyReport { succeeded: 2, failed: 0 });

        let state = backend.read_state().await.unwrap().unwrap();
        assert_eq!(state.serial, 2);
        let ack = state
            .find_resource(&ResourceId::new("gcp_project_ack", "analytics"))
            .unwrap();
        assert_eq!(ack.attributes["project_id"], serde_json::json!("id-acme-analytics"));
    }

    #[tokio::test]
    async fn second_plan_has_no_changes() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let provider = FakeProvider::default();
        let config = Configuration::parse(CONFIG).unwrap();
        plan_and_apply(&provider, backend.as_ref(), &config).await;

        let (plan, report) = plan_and_apply(&provider, backend.as_ref(), &config).await;
        assert_eq!(plan.mutation_count(), 0);
        assert_eq!(report.succeeded, 0);
    }

    #[tokio::test]
    async fn failed_create_is_reported_and_dependents_fail() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let provider = FakeProvider {
            fail_on: Some(ResourceId::new("gcp_project", "analytics")),
            ..Default::default()
        };
        let config = Configuration::parse(CONFIG).unwrap();

        let (_, report) = plan_and_apply(&provider, backend.as_ref(), &config).await;
        assert_eq!(report, ApplyReport { succeeded: 0, failed: 2 });
        assert!(backend.read_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_drops_removed_resources() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let provider = FakeProvider::default();
        let config = Configuration::parse(CONFIG).unwrap();
        plan_and_apply(&provider, backend.as_ref(), &config).await;

        provider
            .remote
            .lock()
            .unwrap()
            .remove(&ResourceId::new("gcp_project_ack", "analytics"));
        let mut state = backend.read_state().await.unwrap().unwrap();
        let removed = refresh(&provider, &mut state).await.unwrap();
        assert_eq!(removed, vec![ResourceId::new("gcp_project_ack", "analytics")]);
        assert_eq!(state.resources.len(), 1);
    }

    #[tokio::test]
    async fn changed_project_id_replaces() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let provider = FakeProvider::default();
        let config = Configuration::parse(CONFIG).unwrap();
        plan_and_apply(&provider, backend.as_ref(), &config).await;

        let changed = Configuration::parse(&CONFIG.replace("acme-analytics", "acme-analytics-2")).unwrap();
        let (plan, report) = plan_and_apply(&provider, backend.as_ref(), &changed).await;
        assert!(plan
            .effects()
            .iter()
            .any(|e| matches!(e, Effect::Replace { .. })));
        assert_eq!(report.failed, 0);

        let calls = provider.calls();
        let delete = calls.iter().rposition(|c| c == "delete gcp_project.analytics").unwrap();
        let create = calls.iter().rposition(|c| c == "create gcp_project.analytics").unwrap();
        assert!(delete < create);
    }

    #[tokio::test]
    async fn replaced_project_updates_the_ack_referring_to_it() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let provider = FakeProvider::default();
        let config = Configuration::parse(CONFIG).unwrap();
        plan_and_apply(&provider, backend.as_ref(), &config).await;

        let changed = Configuration::parse(&CONFIG.replace("acme-analytics", "acme-analytics-2")).unwrap();
        let (plan, report) = plan_and_apply(&provider, backend.as_ref(), &changed).await;
        let effects: Vec<String> = plan.effects().iter().map(format_effect).collect();
        assert!(
            effects.contains(&"Update gcp_project_ack.analytics".to_string()),
            "{:?}",
            effects
        );
        assert_eq!(report, ApplyReport { succeeded: 2, failed: 0 });

        let state = backend.read_state().await.unwrap().unwrap();
        let ack = state
            .find_resource(&ResourceId::new("gcp_project_ack", "analytics"))
            .unwrap();
        assert_eq!(ack.attributes["project_id"], serde_json::json!("id-acme-analytics-2"));

        let (plan, _) = plan_and_apply(&provider, backend.as_ref(), &changed).await;
        assert_eq!(plan.mutation_count(), 0);
    }

    #[tokio::test]
    async fn destroy_removes_in_reverse_order() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let provider = FakeProvider::default();
        let config = Configuration::parse(CONFIG).unwrap();
        plan_and_apply(&provider, backend.as_ref(), &config).await;

        let mut state = backend.read_state().await.unwrap().unwrap();
        let plan = destroy_plan(&config, &state);
        let order: Vec<String> = plan.effects().iter().map(format_effect).collect();
        assert_eq!(
            order,
            vec!["Delete gcp_project_ack.analytics", "Delete gcp_project.analytics"]
        );

        let report = apply(&provider, backend.as_ref(), &mut state, &plan).await;
        assert_eq!(report.succeeded, 2);
        assert!(backend.read_state().await.unwrap().unwrap().resources.is_empty());
    }

    #[test]
    fn validate_reports_unknown_types_and_bad_attributes() {
        let provider = FakeProvider::default();
        let schemas = Schemas::from_provider(&provider);
        let config = Configuration::parse(
            r#"{"resources": [
                { "type": "gcp_bucket", "name": "logs", "attributes": {} },
                { "type": "gcp_project", "name": "analytics", "attributes": { "display_name": 3 } }
            ]}"#,
        )
        .unwrap();

        let err = validate(&config, &schemas).unwrap_err();
        assert!(err.contains("unknown resource type 'gcp_bucket'"));
        assert!(err.contains("gcp_project.analytics"));
    }

    #[test]
    fn builtin_schemas_cover_the_provider() {
        let schemas = Schemas::builtin();
        assert_eq!(schemas.resources.len(), 12);
        assert_eq!(schemas.data_sources.len(), 3);
        assert!(schemas.data_sources.contains_key("aws_account"));
    }
}
