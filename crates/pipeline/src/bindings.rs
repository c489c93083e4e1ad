//! Default binding resolver for the configuration's `params` map.
//!
//! Each param value is either a literal or a reference into the build:
//!
//! | Value | Resolves to |
//! |-------|-------------|
//! | `$(build.id)` | event id |
//! | `$(build.projectId)` | project id |
//! | `$(build.status)` | status wire name |
//! | `$(build.logUrl)` | log URL (before tracking parameters are added) |
//! | `$(build.buildTriggerId)` | trigger id, empty when absent |
//! | `$(build.substitutions.KEY)` | substitution `KEY` |
//! | anything else | itself |
//!
//! A reference that cannot be resolved binds its param to `""` and is
//! reported as a failure; the other params are unaffected.

use std::collections::BTreeMap;

use crate::{BindingError, BindingResolver, BuildEvent, ResolvedBindings};

const SUBSTITUTIONS_PREFIX: &str = "substitutions.";

/// Resolves configured `params` against each event.
#[derive(Debug, Clone, Default)]
pub struct ParamBindingResolver {
    params: BTreeMap<String, String>,
}

impl ParamBindingResolver {
    pub fn new(params: BTreeMap<String, String>) -> Self {
        Self { params }
    }
}

impl BindingResolver for ParamBindingResolver {
    fn resolve(&self, event: &BuildEvent) -> ResolvedBindings {
        let mut resolved = ResolvedBindings::default();
        for (name, value) in &self.params {
            let value = resolve_value(name, value, event).unwrap_or_else(|err| {
                resolved.failures.push(err);
                String::new()
            });
            resolved.params.insert(name.clone(), value);
        }
        resolved
    }
}

fn resolve_value(param: &str, value: &str, event: &BuildEvent) -> Result<String, BindingError> {
    let Some(path) = value
        .trim()
        .strip_prefix("$(build.")
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return Ok(value.to_string());
    };

    if let Some(key) = path.strip_prefix(SUBSTITUTIONS_PREFIX) {
        return event
            .substitutions
            .get(key)
            .cloned()
            .ok_or_else(|| BindingError::MissingSubstitution {
                param: param.to_string(),
                key: key.to_string(),
            });
    }

    match path {
        "id" => Ok(event.id.clone()),
        "projectId" => Ok(event.project_id.clone()),
        "status" => Ok(event.status.as_str().to_string()),
        "logUrl" => Ok(event.log_url.clone()),
        "buildTriggerId" => Ok(event.build_trigger_id.clone().unwrap_or_default()),
        other => Err(BindingError::UnknownField {
            param: param.to_string(),
            field: other.to_string(),
        }),
    }
}
