//! Conversion between descriptor trees and the project model.
//!
//! # Invariants
//! - Discovery only adds or overwrites variables, it never removes keys.
//! - Discovery never touches the persisted `id`.
//! - A tree that fails validation leaves the model unchanged.
//! - `initialized` goes from `false` to `true` on the first successful apply
//!   and is never reset; later applies only refresh content.
//! - Rendering omits empty collections instead of writing empty containers.

use super::codec::DescriptorTree;
use super::{DescriptorError, DescriptorResult};
use crate::model::project::{Project, VariableValue};
use crate::model::workflow::{Workflow, WorkflowStage};
use log::debug;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Applies a parsed descriptor to `project` and marks it initialized.
///
/// `name` and hook entries accept any scalar, stringified like variable
/// values. `source` is only used for error reporting.
pub fn apply_tree(
    project: &mut Project,
    tree: DescriptorTree,
    source: &Path,
) -> DescriptorResult<()> {
    let name = match tree.name.as_ref().map(scalar_text) {
        None | Some(Scalar::Null) => None,
        Some(Scalar::Text(text)) => Some(text),
        Some(Scalar::Nested) => return Err(invalid_value(source, "name".to_string())),
    };
    let hooks = match tree.hooks {
        None | Some(Value::Null) => None,
        Some(Value::Sequence(items)) => {
            let mut hooks = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                match scalar_text(item) {
                    Scalar::Text(hook) => hooks.push(hook),
                    Scalar::Null => {}
                    Scalar::Nested => {
                        return Err(invalid_value(source, format!("hooks[{index}]")))
                    }
                }
            }
            Some(hooks)
        }
        Some(single) => match scalar_text(&single) {
            Scalar::Text(hook) => Some(vec![hook]),
            Scalar::Null => None,
            Scalar::Nested => return Err(invalid_value(source, "hooks".to_string())),
        },
    };

    let mut variables = Vec::new();
    for (key, value) in tree.variables.unwrap_or_default() {
        let slot = match scalar_text(&value) {
            Scalar::Text(text) => VariableValue::Present(text),
            Scalar::Null => VariableValue::Tombstone,
            Scalar::Nested => return Err(invalid_value(source, format!("variables.{key}"))),
        };
        variables.push((key, slot));
    }

    let mut workflow = None;
    if let Some(entries) = tree.workflow {
        let mut parsed = Workflow::default();
        for (key, value) in entries {
            let Some(stage) = WorkflowStage::parse(&key) else {
                debug!("event=descriptor_apply module=descriptor status=skip key=workflow.{key}");
                continue;
            };
            match scalar_text(&value) {
                Scalar::Text(command) => parsed.set(stage, command),
                Scalar::Null => {}
                Scalar::Nested => return Err(invalid_value(source, format!("workflow.{key}"))),
            }
        }
        workflow = Some(parsed);
    }

    if let Some(name) = name {
        project.name = name;
    }
    if let Some(hooks) = hooks {
        project.git_hooks = hooks;
    }
    project.variables.extend(variables);
    if let Some(workflow) = workflow {
        for (stage, command) in workflow.iter() {
            project.workflow.set(stage, command);
        }
    }
    project.initialized = true;
    Ok(())
}

/// Renders `project` into its descriptor tree.
///
/// `name` and `path` are always present. Hooks, variables and workflow are
/// emitted only when non-empty. Tombstoned variables are written as `null`.
pub fn to_tree(project: &Project) -> DescriptorTree {
    let variables = (!project.variables.is_empty()).then(|| {
        project
            .variables
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    VariableValue::Present(text) => Value::String(text.clone()),
                    VariableValue::Tombstone => Value::Null,
                };
                (key.clone(), rendered)
            })
            .collect::<BTreeMap<_, _>>()
    });

    let workflow = (!project.workflow.is_empty()).then(|| {
        project
            .workflow
            .iter()
            .map(|(stage, command)| {
                (
                    stage.as_str().to_string(),
                    Value::String(command.to_string()),
                )
            })
            .collect::<BTreeMap<_, _>>()
    });

    let hooks = (!project.git_hooks.is_empty()).then(|| {
        Value::Sequence(project.git_hooks.iter().cloned().map(Value::String).collect())
    });

    DescriptorTree {
        name: Some(Value::String(project.name.clone())),
        path: Some(Value::String(project.path().to_string_lossy().into_owned())),
        hooks,
        variables,
        workflow,
    }
}

enum Scalar {
    Text(String),
    Null,
    Nested,
}

fn scalar_text(value: &Value) -> Scalar {
    match value {
        Value::Null => Scalar::Null,
        Value::String(text) => Scalar::Text(text.clone()),
        Value::Number(number) => Scalar::Text(number.to_string()),
        Value::Bool(flag) => Scalar::Text(flag.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => Scalar::Nested,
    }
}

fn invalid_value(source: &Path, key: String) -> DescriptorError {
    DescriptorError::InvalidValue {
        path: source.to_path_buf(),
        key,
    }
}
