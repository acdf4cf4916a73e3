//! Declaration-time interfaces: the named, typed inputs and outputs of a
//! task, built from native type declarations.

use crate::engine::TypeEngine;
use crate::error::TransformError;
use crate::idl;
use crate::native::NativeType;
use crate::types::LiteralType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One named slot of an interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub literal_type: LiteralType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Variable {
    pub fn new(literal_type: LiteralType) -> Self {
        Self {
            literal_type,
            description: String::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn to_idl(&self) -> idl::Variable {
        idl::Variable {
            literal_type: Some(self.literal_type.to_idl()),
            description: self.description.clone(),
        }
    }

    pub fn from_idl(msg: &idl::Variable) -> Result<Self, TransformError> {
        let lt = msg
            .literal_type
            .as_ref()
            .ok_or_else(|| TransformError::Wire("variable missing type".into()))?;
        Ok(Self {
            literal_type: LiteralType::from_idl(lt)?,
            description: msg.description.clone(),
        })
    }
}

/// The typed surface of a task: ordered input and output variables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypedInterface {
    pub inputs: IndexMap<String, Variable>,
    pub outputs: IndexMap<String, Variable>,
}

impl TypedInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an interface from native type declarations, resolving every
    /// literal type through the engine. This is where malformed declarations
    /// fail, before any value exists.
    pub fn of(
        engine: &TypeEngine,
        inputs: &[(&str, NativeType)],
        outputs: &[(&str, NativeType)],
    ) -> Result<Self, TransformError> {
        let mut interface = Self::new();
        for (name, t) in inputs {
            interface
                .inputs
                .insert(name.to_string(), variable_of(engine, t)?);
        }
        for (name, t) in outputs {
            interface
                .outputs
                .insert(name.to_string(), variable_of(engine, t)?);
        }
        Ok(interface)
    }

    pub fn input(mut self, name: impl Into<String>, variable: Variable) -> Self {
        self.inputs.insert(name.into(), variable);
        self
    }

    pub fn output(mut self, name: impl Into<String>, variable: Variable) -> Self {
        self.outputs.insert(name.into(), variable);
        self
    }

    pub fn to_idl(&self) -> idl::TypedInterface {
        idl::TypedInterface {
            inputs: self
                .inputs
                .iter()
                .map(|(name, v)| (name.clone(), v.to_idl()))
                .collect(),
            outputs: self
                .outputs
                .iter()
                .map(|(name, v)| (name.clone(), v.to_idl()))
                .collect(),
        }
    }

    /// The wire map is unordered; variables come back sorted by name so the
    /// model form is deterministic.
    pub fn from_idl(msg: &idl::TypedInterface) -> Result<Self, TransformError> {
        Ok(Self {
            inputs: sorted_variables(&msg.inputs)?,
            outputs: sorted_variables(&msg.outputs)?,
        })
    }
}

fn variable_of(engine: &TypeEngine, t: &NativeType) -> Result<Variable, TransformError> {
    let (_, annotation) = t.strip_annotation();
    let mut variable = Variable::new(engine.literal_type_of(t)?);
    if let Some(description) = annotation.and_then(|a| a.description.as_deref()) {
        variable.description = description.to_string();
    }
    Ok(variable)
}

fn sorted_variables(
    wire: &std::collections::HashMap<String, idl::Variable>,
) -> Result<IndexMap<String, Variable>, TransformError> {
    let mut names: Vec<&String> = wire.keys().collect();
    names.sort();
    let mut variables = IndexMap::with_capacity(names.len());
    for name in names {
        variables.insert(name.clone(), Variable::from_idl(&wire[name])?);
    }
    Ok(variables)
}
