// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! The parameter system.
//!
//! Every component owns a [`ParameterSet`]; every system additionally owns a
//! [`SystemParameters`] store of named typed values. A component parameter
//! either holds a literal or is *bound by name* to a system parameter:
//! setting a parameter from text first tries to parse a literal of the
//! declared type, and otherwise records the text as a system-parameter name.
//! Binding is late: resolution happens at `initialize` and at explicit
//! `update_parameters` calls, so a binding whose target has been removed or
//! renamed fails exactly then, naming the offending parameter.

use std::fmt;

use crate::sim_error;
use crate::types::{SimError, SimResult};

/// The typed value of a parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterValue {
    /// A real value.
    Real(f64),
    /// An integer value.
    Integer(i64),
    /// A boolean value.
    Bool(bool),
    /// A free-text value.
    Text(String),
}

impl ParameterValue {
    /// The name of this value's type, used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::Real(_) => "real",
            ParameterValue::Integer(_) => "integer",
            ParameterValue::Bool(_) => "bool",
            ParameterValue::Text(_) => "text",
        }
    }

    /// Parse `text` as a literal of the same type as `self`.
    fn parse_same_type(&self, text: &str) -> Option<ParameterValue> {
        match self {
            ParameterValue::Real(_) => text.parse::<f64>().ok().map(ParameterValue::Real),
            ParameterValue::Integer(_) => text.parse::<i64>().ok().map(ParameterValue::Integer),
            ParameterValue::Bool(_) => text.parse::<bool>().ok().map(ParameterValue::Bool),
            ParameterValue::Text(_) => Some(ParameterValue::Text(text.to_owned())),
        }
    }

    /// Coerce another value into this value's type, if sensible.
    fn coerce_from(&self, other: &ParameterValue) -> Option<ParameterValue> {
        match (self, other) {
            (ParameterValue::Real(_), ParameterValue::Real(v)) => Some(ParameterValue::Real(*v)),
            (ParameterValue::Real(_), ParameterValue::Integer(v)) => {
                Some(ParameterValue::Real(*v as f64))
            }
            (ParameterValue::Integer(_), ParameterValue::Integer(v)) => {
                Some(ParameterValue::Integer(*v))
            }
            (ParameterValue::Bool(_), ParameterValue::Bool(v)) => Some(ParameterValue::Bool(*v)),
            (ParameterValue::Text(_), other) => Some(ParameterValue::Text(other.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParameterValue::Real(v) => write!(f, "{v}"),
            ParameterValue::Integer(v) => write!(f, "{v}"),
            ParameterValue::Bool(v) => write!(f, "{v}"),
            ParameterValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// One named parameter.
#[derive(Clone, Debug)]
pub struct Parameter {
    name: String,
    description: String,
    unit: String,
    value: ParameterValue,
    /// Name of the system parameter this parameter is bound to, if any.
    binding: Option<String>,
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Parameter {
    fn new(name: &str, description: &str, unit: &str, value: ParameterValue) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            unit: unit.to_owned(),
            value,
            binding: None,
        }
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The unit string.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// The current (last evaluated) value.
    #[must_use]
    pub fn value(&self) -> &ParameterValue {
        &self.value
    }

    /// The bound system-parameter name, if any.
    #[must_use]
    pub fn binding(&self) -> Option<&str> {
        self.binding.as_deref()
    }

    /// Set from text: a parsable literal of the declared type replaces the
    /// value and drops any binding; an identifier becomes a binding; any
    /// other text is refused without mutating state.
    pub fn set_from_text(&mut self, text: &str) -> SimResult {
        if let Some(value) = self.value.parse_same_type(text) {
            self.value = value;
            self.binding = None;
            return Ok(());
        }
        if is_identifier(text) {
            self.binding = Some(text.to_owned());
            return Ok(());
        }
        sim_error!(
            "'{text}' is neither a {} literal nor a system parameter name (parameter '{}')",
            self.value.type_name(),
            self.name
        )
    }

    /// Re-evaluate against the system-parameter store: a bound parameter
    /// reads its target, a literal parameter is a no-op.
    pub fn evaluate(&mut self, system_parameters: &SystemParameters) -> SimResult {
        let Some(target) = &self.binding else {
            return Ok(());
        };
        let Some(found) = system_parameters.get(target) else {
            return sim_error!(
                "Parameter '{}' is bound to system parameter '{target}', which does not exist",
                self.name
            );
        };
        match self.value.coerce_from(found.value()) {
            Some(value) => {
                self.value = value;
                Ok(())
            }
            None => sim_error!(
                "System parameter '{target}' has type {} but parameter '{}' needs {}",
                found.value().type_name(),
                self.name,
                self.value.type_name()
            ),
        }
    }
}

/// The parameter registry of one component.
#[derive(Clone, Debug, Default)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
}

impl ParameterSet {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter with its default value. Returns an error if the
    /// name is taken.
    pub fn add(
        &mut self,
        name: &str,
        description: &str,
        unit: &str,
        default: ParameterValue,
    ) -> SimResult {
        if self.exists(name) {
            return sim_error!("Parameter '{name}' is already registered");
        }
        self.parameters
            .push(Parameter::new(name, description, unit, default));
        Ok(())
    }

    /// Whether a parameter with this name is registered.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name == name)
    }

    /// All registered parameters, in registration order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Names of the registered parameters.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    fn find(&self, name: &str) -> Result<&Parameter, SimError> {
        match self.parameters.iter().find(|p| p.name == name) {
            Some(p) => Ok(p),
            None => sim_error!("No parameter '{name}'"),
        }
    }

    fn find_mut(&mut self, name: &str) -> Result<&mut Parameter, SimError> {
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(p) => Ok(p),
            None => sim_error!("No parameter '{name}'"),
        }
    }

    /// Set a parameter from text (literal or system-parameter name).
    pub fn set_value_text(&mut self, name: &str, text: &str) -> SimResult {
        self.find_mut(name)?.set_from_text(text)
    }

    /// The textual rendering of a parameter's value (the binding name while
    /// bound).
    pub fn value_text(&self, name: &str) -> Result<String, SimError> {
        let p = self.find(name)?;
        Ok(match p.binding() {
            Some(binding) => binding.to_owned(),
            None => p.value.to_string(),
        })
    }

    /// A real parameter's evaluated value.
    pub fn real(&self, name: &str) -> Result<f64, SimError> {
        match self.find(name)?.value {
            ParameterValue::Real(v) => Ok(v),
            ParameterValue::Integer(v) => Ok(v as f64),
            ref other => sim_error!("Parameter '{name}' is {} not real", other.type_name()),
        }
    }

    /// An integer parameter's evaluated value.
    pub fn integer(&self, name: &str) -> Result<i64, SimError> {
        match self.find(name)?.value {
            ParameterValue::Integer(v) => Ok(v),
            ref other => sim_error!("Parameter '{name}' is {} not integer", other.type_name()),
        }
    }

    /// A bool parameter's evaluated value.
    pub fn boolean(&self, name: &str) -> Result<bool, SimError> {
        match self.find(name)?.value {
            ParameterValue::Bool(v) => Ok(v),
            ref other => sim_error!("Parameter '{name}' is {} not bool", other.type_name()),
        }
    }

    /// A text parameter's evaluated value.
    pub fn text(&self, name: &str) -> Result<String, SimError> {
        match &self.find(name)?.value {
            ParameterValue::Text(v) => Ok(v.clone()),
            other => sim_error!("Parameter '{name}' is {} not text", other.type_name()),
        }
    }

    /// Evaluate every parameter against the system-parameter store.
    ///
    /// The first failure aborts and is returned; `initialize` must not
    /// proceed past it.
    pub fn evaluate(&mut self, system_parameters: &SystemParameters) -> SimResult {
        for p in &mut self.parameters {
            p.evaluate(system_parameters)?;
        }
        Ok(())
    }

    /// Check that every parameter evaluates, reporting the first failing
    /// parameter name.
    pub fn check_parameters(&self, system_parameters: &SystemParameters) -> Result<(), String> {
        for p in &self.parameters {
            let mut probe = p.clone();
            if probe.evaluate(system_parameters).is_err() {
                return Err(p.name.clone());
            }
        }
        Ok(())
    }
}

/// The "system parameter" store of a system: named typed literals that
/// component parameters can bind to.
#[derive(Clone, Debug, Default)]
pub struct SystemParameters {
    parameters: Vec<Parameter>,
}

impl SystemParameters {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite a system parameter from text. `prototype` supplies
    /// the declared type; the text must parse as a literal of it.
    pub fn set(
        &mut self,
        name: &str,
        text: &str,
        prototype: ParameterValue,
        description: &str,
        unit: &str,
    ) -> SimResult {
        let Some(value) = prototype.parse_same_type(text) else {
            return sim_error!(
                "'{text}' is not a {} literal (system parameter '{name}')",
                prototype.type_name()
            );
        };
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(existing) => {
                existing.value = value;
                existing.description = description.to_owned();
                existing.unit = unit.to_owned();
            }
            None => {
                self.parameters
                    .push(Parameter::new(name, description, unit, value));
            }
        }
        Ok(())
    }

    /// Look up a system parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Remove a system parameter. Bindings referencing it dangle and fail
    /// at the next evaluation.
    pub fn remove(&mut self, name: &str) -> SimResult {
        let before = self.parameters.len();
        self.parameters.retain(|p| p.name != name);
        if self.parameters.len() == before {
            return sim_error!("No system parameter '{name}'");
        }
        Ok(())
    }

    /// Rename a system parameter, leaving bindings to the old name to fail
    /// at the next evaluation.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> SimResult {
        if self.get(new_name).is_some() {
            return sim_error!("System parameter '{new_name}' already exists");
        }
        match self.parameters.iter_mut().find(|p| p.name == old_name) {
            Some(p) => {
                p.name = new_name.to_owned();
                Ok(())
            }
            None => sim_error!("No system parameter '{old_name}'"),
        }
    }

    /// Whether the store holds a parameter with this name.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All system parameters.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_with_gain() -> ParameterSet {
        let mut params = ParameterSet::new();
        params
            .add("gain", "Gain factor", "-", ParameterValue::Real(1.0))
            .unwrap();
        params
    }

    #[test]
    fn literal_round_trip() {
        let mut params = set_with_gain();
        params.set_value_text("gain", "2.5").unwrap();
        assert_eq!(params.real("gain").unwrap(), 2.5);
        assert_eq!(params.value_text("gain").unwrap(), "2.5");
    }

    #[test]
    fn illegal_text_refused_without_mutation() {
        let mut params = set_with_gain();
        params.set_value_text("gain", "2.0").unwrap();
        assert!(params.set_value_text("gain", "1.2.3").is_err());
        assert_eq!(params.real("gain").unwrap(), 2.0);
    }

    #[test]
    fn binding_resolves_at_evaluate() {
        let mut sys = SystemParameters::new();
        sys.set("K", "3.0", ParameterValue::Real(0.0), "", "").unwrap();

        let mut params = set_with_gain();
        params.set_value_text("gain", "K").unwrap();
        // The old literal remains until evaluation
        assert_eq!(params.real("gain").unwrap(), 1.0);

        params.evaluate(&sys).unwrap();
        assert_eq!(params.real("gain").unwrap(), 3.0);

        // Late-bound: a new value is picked up by the next evaluation
        sys.set("K", "4.0", ParameterValue::Real(0.0), "", "").unwrap();
        params.evaluate(&sys).unwrap();
        assert_eq!(params.real("gain").unwrap(), 4.0);
    }

    #[test]
    fn dangling_binding_names_the_parameter() {
        let mut sys = SystemParameters::new();
        sys.set("K", "3.0", ParameterValue::Real(0.0), "", "").unwrap();

        let mut params = set_with_gain();
        params.set_value_text("gain", "K").unwrap();
        params.evaluate(&sys).unwrap();

        sys.remove("K").unwrap();
        assert_eq!(params.check_parameters(&sys), Err("gain".to_owned()));
        assert!(params.evaluate(&sys).is_err());
    }

    #[test]
    fn system_parameter_type_checked() {
        let mut sys = SystemParameters::new();
        assert!(sys.set("n", "many", ParameterValue::Integer(0), "", "").is_err());
        sys.set("n", "7", ParameterValue::Integer(0), "", "").unwrap();
        assert_eq!(
            sys.get("n").unwrap().value(),
            &ParameterValue::Integer(7)
        );
    }

    #[test]
    fn integer_system_parameter_feeds_real_component_parameter() {
        let mut sys = SystemParameters::new();
        sys.set("n", "7", ParameterValue::Integer(0), "", "").unwrap();
        let mut params = set_with_gain();
        params.set_value_text("gain", "n").unwrap();
        params.evaluate(&sys).unwrap();
        assert_eq!(params.real("gain").unwrap(), 7.0);
    }
}
