//! Plan and state rendering

use colored::Colorize;
use streamsec_core::effect::Effect;
use streamsec_core::plan::Plan;
use streamsec_core::resource::{Attributes, State, Value};
use streamsec_core::schema::ResourceSchema;

use crate::engine::Schemas;

pub const SENSITIVE: &str = "(sensitive)";
pub const KNOWN_AFTER_APPLY: &str = "(known after apply)";

pub fn print_plan(plan: &Plan, schemas: &Schemas) {
    if plan.mutation_count() == 0 {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();
    for effect in plan.effects() {
        let schema = schemas.for_effect(effect);
        println!("  {} {}", colored_symbol(effect), effect.resource_id().to_string().cyan().bold());
        for line in effect_lines(effect, schema) {
            println!("      {}", line);
        }
    }
    println!();
    println!("{}", plan.summary().to_string().bold());
}

fn colored_symbol(effect: &Effect) -> colored::ColoredString {
    let symbol = effect.symbol();
    match effect {
        Effect::Create(_) => symbol.green().bold(),
        Effect::Update { .. } => symbol.yellow().bold(),
        Effect::Replace { .. } => symbol.magenta().bold(),
        Effect::Delete(_) => symbol.red().bold(),
        Effect::Read(_) => symbol.normal(),
    }
}

/// Attribute lines shown under an effect
pub fn effect_lines(effect: &Effect, schema: Option<&ResourceSchema>) -> Vec<String> {
    match effect {
        Effect::Create(r) | Effect::Read(r) => {
            let mut lines = attribute_lines(&r.attributes, schema);
            if let (Effect::Create(_), Some(schema)) = (effect, schema) {
                let mut pending: Vec<&str> = schema
                    .attributes
                    .values()
                    .filter(|a| a.computed && !r.attributes.contains_key(&a.name))
                    .map(|a| a.name.as_str())
                    .collect();
                pending.sort();
                lines.extend(pending.into_iter().map(|k| format!("{}: {}", k, KNOWN_AFTER_APPLY)));
            }
            lines
        }
        Effect::Update {
            from,
            to,
            changed_attributes,
            ..
        }
        | Effect::Replace {
            from,
            to,
            changed_attributes,
            ..
        } => changed_attributes
            .iter()
            .map(|key| {
                let old = from
                    .attributes
                    .get(key)
                    .map(|v| display_value(schema, key, v))
                    .unwrap_or_else(|| "(none)".to_string());
                let new = to
                    .attributes
                    .get(key)
                    .map(|v| display_value(schema, key, v))
                    .unwrap_or_else(|| "(none)".to_string());
                let forces = matches!(effect, Effect::Replace { .. })
                    && schema.is_some_and(|s| s.requires_replace(key));
                if forces {
                    format!("{}: {} → {} # forces replacement", key, old, new)
                } else {
                    format!("{}: {} → {}", key, old, new)
                }
            })
            .collect(),
        Effect::Delete(_) => Vec::new(),
    }
}

/// Sorted `key: value` lines with sensitive values masked
pub fn attribute_lines(attributes: &Attributes, schema: Option<&ResourceSchema>) -> Vec<String> {
    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| format!("{}: {}", k, display_value(schema, k, &attributes[k])))
        .collect()
}

pub fn print_state(state: &State, schema: Option<&ResourceSchema>) {
    println!("  {}", state.id.to_string().cyan().bold());
    for line in attribute_lines(&state.attributes, schema) {
        println!("      {}", line);
    }
}

pub fn display_value(schema: Option<&ResourceSchema>, key: &str, value: &Value) -> String {
    if schema.is_some_and(|s| s.is_sensitive(key)) {
        return SENSITIVE.to_string();
    }
    format_value(value)
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Null => "null".to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut strs: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            strs.sort();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(binding, attr) => format!("${{{}.{}}}", binding, attr),
    }
}

pub fn format_effect(effect: &Effect) -> String {
    let verb = match effect {
        Effect::Read(_) => "Read",
        Effect::Create(_) => "Create",
        Effect::Update { .. } => "Update",
        Effect::Replace { .. } => "Replace",
        Effect::Delete(_) => "Delete",
    };
    format!("{} {}", verb, effect.resource_id())
}
