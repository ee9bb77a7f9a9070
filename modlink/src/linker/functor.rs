// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capabilities handed to a module body while it executes.

use std::{cell::RefCell, fmt, rc::Rc};

use tracing::{trace, warn};

use crate::{
    error::{Error, LinkError, LinkErrorKind, Result, UninitializedBindingError},
    host::Endowments,
    linker::Linker,
    module::{ModuleInstance, ModuleLocation, ModuleMap, Receiver, ResolvedExport},
    value::Value,
};

/// How a module body stops abnormally.
#[derive(Debug, Clone)]
pub enum FunctorError {
    /// The body threw a value.
    Throw(Value),
    /// An engine error surfaced inside the body, e.g. a read in the
    /// temporal dead zone.
    Error(Error),
}

impl From<Error> for FunctorError {
    fn from(error: Error) -> Self {
        FunctorError::Error(error)
    }
}

impl From<LinkError> for FunctorError {
    fn from(error: LinkError) -> Self {
        FunctorError::Error(error.into())
    }
}

impl From<UninitializedBindingError> for FunctorError {
    fn from(error: UninitializedBindingError) -> Self {
        FunctorError::Error(error.into())
    }
}

/// Receives values of one imported name.
pub enum Subscriber {
    Receiver(Receiver),
    Binding(ImportedBinding),
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subscriber::Receiver(_) => f.write_str("Receiver"),
            Subscriber::Binding(binding) => f.debug_tuple("Binding").field(binding).finish(),
        }
    }
}

/// Argument of [`FunctorScope::imports`]: per specifier, the imported names
/// and who receives their values. `*` names the namespace object.
#[derive(Debug, Default)]
pub struct Subscriptions {
    entries: Vec<(Box<str>, Vec<(Box<str>, Subscriber)>)>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, specifier: &str) -> &mut Vec<(Box<str>, Subscriber)> {
        let index = match self.entries.iter().position(|(s, _)| &**s == specifier) {
            Some(index) => index,
            None => {
                self.entries.push((specifier.into(), Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    /// Requests `specifier` without subscribing to any of its names.
    pub fn module(mut self, specifier: &str) -> Self {
        self.entry(specifier);
        self
    }

    /// Calls `receiver` with the current value of `name`, if any, and on
    /// every later write.
    pub fn on(mut self, specifier: &str, name: &str, receiver: impl Fn(&Value) + 'static) -> Self {
        self.entry(specifier)
            .push((name.into(), Subscriber::Receiver(Rc::new(receiver))));
        self
    }

    /// Keeps `binding` in sync with `name`.
    pub fn bind(mut self, specifier: &str, name: &str, binding: &ImportedBinding) -> Self {
        self.entry(specifier)
            .push((name.into(), Subscriber::Binding(binding.clone())));
        self
    }
}

/// A local slot mirroring an imported binding. Reading it before the
/// exporting module initialized the binding is a temporal dead zone error.
#[derive(Clone)]
pub struct ImportedBinding(Rc<ImportedBindingData>);

struct ImportedBindingData {
    local_name: Box<str>,
    /// The importer until subscribed, then the exporting module.
    location: RefCell<ModuleLocation>,
    value: RefCell<Option<Value>>,
}

impl ImportedBinding {
    pub fn new(importer: &ModuleLocation, local_name: &str) -> Self {
        Self(Rc::new(ImportedBindingData {
            local_name: local_name.into(),
            location: RefCell::new(importer.clone()),
            value: RefCell::new(None),
        }))
    }

    pub fn local_name(&self) -> &str {
        &self.0.local_name
    }

    pub fn is_initialized(&self) -> bool {
        self.0.value.borrow().is_some()
    }

    pub fn get(&self) -> Result<Value, UninitializedBindingError> {
        self.0.value.borrow().clone().ok_or_else(|| {
            UninitializedBindingError::new(&self.0.location.borrow(), &self.0.local_name)
        })
    }

    fn receiver(&self, exporter: &ModuleLocation) -> Receiver {
        self.0.location.replace(exporter.clone());
        let data = self.0.clone();
        Rc::new(move |value: &Value| {
            data.value.replace(Some(value.clone()));
        })
    }
}

impl fmt::Debug for ImportedBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportedBinding")
            .field("local_name", &self.0.local_name)
            .field("value", &self.0.value.borrow())
            .finish()
    }
}

/// Write handle for the live exports of a module. It stays usable after the
/// module body returned, so exported functions can keep updating bindings.
#[derive(Clone)]
pub struct LiveVar {
    instance: Rc<ModuleInstance>,
}

impl LiveVar {
    /// Writes the live binding `local_name` and notifies every importer.
    pub fn set(&self, local_name: &str, value: impl Into<Value>) -> Result<(), LinkError> {
        match self.instance.cell(local_name) {
            Some(cell) if cell.is_mutable() => {
                cell.set(value.into());
                Ok(())
            }
            _ => Err(LinkError::new(
                self.instance.location(),
                "",
                local_name,
                LinkErrorKind::UnknownLocalBinding,
            )),
        }
    }

    pub fn get(&self, local_name: &str) -> Option<Value> {
        self.instance.cell(local_name).and_then(|cell| cell.get())
    }
}

impl fmt::Debug for LiveVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LiveVar")
            .field(self.instance.location())
            .finish()
    }
}

/// Write handle for the fixed exports of a module.
pub struct OnceVar<'a> {
    instance: &'a ModuleInstance,
}

impl OnceVar<'_> {
    /// Initializes the fixed binding `local_name`. Each fixed binding is
    /// written at most once.
    pub fn set(&self, local_name: &str, value: impl Into<Value>) -> Result<(), LinkError> {
        match self.instance.cell(local_name) {
            Some(cell) if !cell.is_mutable() => {
                cell.set(value.into());
                Ok(())
            }
            _ => Err(LinkError::new(
                self.instance.location(),
                "",
                local_name,
                LinkErrorKind::UnknownLocalBinding,
            )),
        }
    }
}

/// What a module body can reach while it runs.
pub struct FunctorScope<'a> {
    linker: &'a Linker,
    modules: &'a ModuleMap,
    instance: Rc<ModuleInstance>,
    dependencies_evaluated: bool,
    dependency_error: Option<Error>,
}

impl<'a> FunctorScope<'a> {
    pub(crate) fn new(
        linker: &'a Linker,
        modules: &'a ModuleMap,
        instance: Rc<ModuleInstance>,
    ) -> Self {
        Self {
            linker,
            modules,
            instance,
            dependencies_evaluated: false,
            dependency_error: None,
        }
    }

    /// Whether the dependencies were evaluated, and how they failed if so.
    pub(crate) fn finish(self) -> (bool, Option<Error>) {
        (self.dependencies_evaluated, self.dependency_error)
    }

    pub fn location(&self) -> &ModuleLocation {
        self.instance.location()
    }

    pub fn endowments(&self) -> &Endowments {
        self.instance.endowments()
    }

    pub fn live_var(&self) -> LiveVar {
        LiveVar {
            instance: self.instance.clone(),
        }
    }

    pub fn once_var(&self) -> OnceVar<'_> {
        OnceVar {
            instance: &self.instance,
        }
    }

    /// A fresh [`ImportedBinding`] named `local_name` in this module.
    pub fn binding(&self, local_name: &str) -> ImportedBinding {
        ImportedBinding::new(self.location(), local_name)
    }

    /// Wires `subscriptions` to the exports of this module's dependencies.
    ///
    /// The first call evaluates every dependency first, in link order. In a
    /// cycle a dependency may still be evaluating, in which case its
    /// bindings are delivered as it initializes them. Receivers of bindings
    /// that are already initialized are called before this returns.
    pub fn imports(&mut self, subscriptions: Subscriptions) -> Result<()> {
        if let Some(error) = &self.dependency_error {
            return Err(error.clone());
        }
        if !self.dependencies_evaluated {
            self.dependencies_evaluated = true;
            for (export_name, local_name, hoisted) in self.instance.record().live_exports() {
                let initialized = self
                    .instance
                    .cell(local_name)
                    .is_some_and(|cell| cell.is_initialized());
                if hoisted && !initialized {
                    warn!(
                        module = %self.location(),
                        export_name,
                        "hoisted export not initialized before dependencies run"
                    );
                }
            }
            if let Err(error) = self.linker.evaluate_dependencies(self.modules, &self.instance) {
                self.dependency_error = Some(error.clone());
                return Err(error);
            }
        }
        for (specifier, names) in subscriptions.entries {
            let Some(dependency) = self.instance.loaded_module(&specifier) else {
                return Err(LinkError::new(
                    self.location(),
                    &specifier,
                    names.first().map_or("", |(name, _)| &**name),
                    LinkErrorKind::UnknownSpecifier,
                )
                .into());
            };
            let exporter = self.modules.get(dependency);
            for (name, subscriber) in names {
                let cell = if &*name == "*" {
                    self.modules.namespace(dependency);
                    exporter.namespace_cell().clone()
                } else {
                    let kind = match self
                        .modules
                        .resolve_export(dependency, &name, &mut Vec::new())
                    {
                        ResolvedExport::Binding(cell) => {
                            trace!(
                                module = %self.location(),
                                %specifier,
                                %name,
                                "subscribed"
                            );
                            Ok(cell)
                        }
                        ResolvedExport::NotFound => Err(LinkErrorKind::MissingExport),
                        ResolvedExport::Ambiguous => Err(LinkErrorKind::AmbiguousExport),
                    };
                    kind.map_err(|kind| LinkError::new(self.location(), &specifier, &name, kind))?
                };
                let receiver = match subscriber {
                    Subscriber::Receiver(receiver) => receiver,
                    Subscriber::Binding(binding) => binding.receiver(exporter.location()),
                };
                cell.subscribe(receiver);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FunctorScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctorScope")
            .field("module", self.location())
            .field("dependencies_evaluated", &self.dependencies_evaluated)
            .finish_non_exhaustive()
    }
}
