use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::feature::{AttributeValue, Feature};

/// Variable names published by symbols while they render.
pub mod vars {
    /// The value of a symbol attribute before any data-defined override.
    pub const ORIGINAL_VALUE: &str = "value";
    pub const SYMBOL_COLOR: &str = "symbol_color";
    pub const SYMBOL_ANGLE: &str = "symbol_angle";
    pub const GEOMETRY_PART_COUNT: &str = "geometry_part_count";
    pub const GEOMETRY_PART_NUM: &str = "geometry_part_num";
    pub const MAP_SCALE: &str = "map_scale";
}

/// A named set of variables visible to expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionContextScope {
    pub name: String,
    variables: BTreeMap<String, AttributeValue>,
}

impl ExpressionContextScope {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variables: BTreeMap::new(),
        }
    }

    pub fn set_variable(&mut self, name: &str, value: impl Into<AttributeValue>) {
        self.variables.insert(name.to_string(), value.into());
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<AttributeValue> {
        self.variables.remove(name)
    }

    pub fn variable(&self, name: &str) -> Option<&AttributeValue> {
        self.variables.get(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }
}

/// Everything an expression can see: the current feature and a stack of
/// scopes, where later scopes shadow earlier ones.
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext<'a> {
    feature: Option<&'a Feature>,
    scopes: Vec<&'a ExpressionContextScope>,
}

impl<'a> ExpressionContext<'a> {
    pub fn new() -> Self {
        Self {
            feature: None,
            scopes: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature: Option<&'a Feature>) -> Self {
        self.feature = feature;
        self
    }

    pub fn push_scope(&mut self, scope: &'a ExpressionContextScope) {
        self.scopes.push(scope);
    }

    pub fn feature(&self) -> Option<&'a Feature> {
        self.feature
    }

    pub fn variable(&self, name: &str) -> Option<&'a AttributeValue> {
        self.scopes.iter().rev().copied().find_map(|s| s.variable(name))
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

/// External expression evaluator. The expression language itself lives
/// outside this crate; symbols only hand it formulas and contexts.
pub trait ExpressionEngine: fmt::Debug + Send + Sync {
    /// Evaluate `expression` against `context`.
    fn evaluate(
        &self,
        expression: &str,
        context: &ExpressionContext<'_>,
    ) -> Result<AttributeValue, EvalError>;

    /// Field names referenced by `expression`, found without evaluating it.
    fn referenced_columns(&self, expression: &str) -> Result<BTreeSet<String>, EvalError>;
}
