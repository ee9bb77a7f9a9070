// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;
use modlink::{
    Endowments, EvaluateOptions, Functor, FunctorError, FunctorScope, Importer, ImporterHooks,
    ImporterOptions, MemoryRetriever, ModuleAnalyzer, ModuleLocation, ModuleSource, Namespace,
    ProtocolRetriever, Result, Retrieve, RetrievableLocation, RetrievalError, RootedResolver,
    SuffixLocator, Value, functor,
};

pub const ROOT: &str = "https://www.example.com/";

type Body = Rc<dyn Fn(&mut FunctorScope<'_>) -> Result<(), FunctorError>>;

/// Module sources plus the Rust closures standing in for their compiled
/// bodies. Bodies are keyed by module location.
#[derive(Clone, Default)]
pub struct Fixture {
    sources: Rc<MemoryRetriever>,
    bodies: Rc<RefCell<AHashMap<String, Body>>>,
    runs: Rc<RefCell<Vec<String>>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `{ROOT}{name}.js` with `source`, evaluated by `body`.
    pub fn module(
        &self,
        name: &str,
        source: &str,
        body: impl Fn(&mut FunctorScope<'_>) -> Result<(), FunctorError> + 'static,
    ) -> &Self {
        self.sources
            .insert(&format!("{ROOT}{name}.js"), ModuleSource::module(source));
        self.bodies
            .borrow_mut()
            .insert(format!("{ROOT}{name}"), Rc::new(body));
        self
    }

    /// Adds `{ROOT}{name}.js` with no body, so evaluating it fails.
    pub fn source_only(&self, name: &str, source: &str) -> &Self {
        self.sources
            .insert(&format!("{ROOT}{name}.js"), ModuleSource::module(source));
        self
    }

    /// Names of the modules whose bodies ran, in order.
    pub fn runs(&self) -> Vec<String> {
        self.runs.borrow().clone()
    }

    pub fn importer(&self, options: ImporterOptions) -> Importer {
        let sources = self.sources.clone();
        let hooks = ImporterHooks::new(
            RootedResolver::parse(ROOT).unwrap(),
            SuffixLocator::new(".js"),
            ProtocolRetriever::new().with(
                "https",
                move |location: &RetrievableLocation| -> Result<ModuleSource, RetrievalError> {
                    sources.retrieve(location)
                },
            ),
            ModuleAnalyzer::new(),
        );
        let bodies = self.bodies.clone();
        let runs = self.runs.clone();
        Importer::new(
            hooks,
            move |_: &str,
                  _: &Endowments,
                  options: &EvaluateOptions<'_>|
                  -> Result<Functor, Value> {
                let location = options.module_location.as_str();
                let Some(body) = bodies.borrow().get(location).cloned() else {
                    return Err(Value::from(format!("no body for {location}")));
                };
                let name = location.strip_prefix(ROOT).unwrap_or(location).to_owned();
                let runs = runs.clone();
                Ok(functor(move |scope| {
                    runs.borrow_mut().push(name);
                    body(scope)
                }))
            },
            options,
        )
    }
}

pub fn root() -> ModuleLocation {
    ModuleLocation::from(ROOT)
}

pub fn import(importer: &Importer, specifier: &str) -> Result<Namespace> {
    importer.import(specifier, &root(), &Endowments::default())
}

/// Reads `key` of `namespace`, failing the test on a temporal dead zone.
pub fn read(namespace: &Namespace, key: &str) -> Value {
    namespace.get(key).unwrap()
}
