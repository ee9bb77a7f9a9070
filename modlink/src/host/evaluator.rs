// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{
    linker::{FunctorError, FunctorScope},
    module::ModuleLocation,
    value::Value,
};

/// An executable module body. It receives the capabilities of its module
/// through the [`FunctorScope`] and runs exactly once.
pub type Functor = Box<dyn FnOnce(&mut FunctorScope<'_>) -> Result<(), FunctorError>>;

/// Boxes a closure as a [`Functor`], pinning down the higher-ranked
/// signature closures need for it.
pub fn functor<F>(body: F) -> Functor
where
    F: FnOnce(&mut FunctorScope<'_>) -> Result<(), FunctorError> + 'static,
{
    Box::new(body)
}

#[derive(Debug, Clone, Copy)]
pub struct EvaluateOptions<'a> {
    /// The module whose functor source is being evaluated.
    pub module_location: &'a ModuleLocation,
}

/// The sandboxed evaluator.
///
/// Turns functor source into an executable [`Functor`] inside whatever
/// isolation the host provides. Evaluating the source text itself may throw,
/// in which case the module errors without its body ever running.
pub trait Evaluator {
    fn evaluate(
        &self,
        functor_source: &str,
        endowments: &Endowments,
        options: &EvaluateOptions<'_>,
    ) -> Result<Functor, Value>;
}

impl<F> Evaluator for F
where
    F: Fn(&str, &Endowments, &EvaluateOptions<'_>) -> Result<Functor, Value>,
{
    fn evaluate(
        &self,
        functor_source: &str,
        endowments: &Endowments,
        options: &EvaluateOptions<'_>,
    ) -> Result<Functor, Value> {
        self(functor_source, endowments, options)
    }
}

/// Named values made available to every module body of an import.
#[derive(Debug, Clone, Default)]
pub struct Endowments {
    entries: Vec<(Box<str>, Value)>,
}

impl Endowments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an endowment.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| &**n == name) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name.into(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (&**name, value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
