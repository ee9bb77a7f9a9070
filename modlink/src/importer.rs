// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## Importer
//!
//! Drives the collaborators and the [`Linker`] to turn an entry specifier
//! into an evaluated namespace. Every location is resolved, located,
//! retrieved and analyzed at most once per importer; the [`ModuleMap`] is the
//! memo table.

use std::{cell::RefCell, fmt, mem};

use tracing::{debug, trace, warn};

use crate::{
    error::{Error, ResolutionError, Result},
    host::{Analyze, Endowments, Evaluator, Locate, Resolve, Retrieve},
    linker::Linker,
    module::{LinkageRecord, ModuleId, ModuleLocation, ModuleLookup, ModuleMap, Namespace},
};

/// The collaborators an [`Importer`] loads modules with.
pub struct ImporterHooks {
    pub resolve: Box<dyn Resolve>,
    pub locate: Box<dyn Locate>,
    pub retrieve: Box<dyn Retrieve>,
    pub analyze: Box<dyn Analyze>,
}

impl ImporterHooks {
    pub fn new(
        resolve: impl Resolve + 'static,
        locate: impl Locate + 'static,
        retrieve: impl Retrieve + 'static,
        analyze: impl Analyze + 'static,
    ) -> Self {
        Self {
            resolve: Box::new(resolve),
            locate: Box::new(locate),
            retrieve: Box::new(retrieve),
            analyze: Box::new(analyze),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImporterOptions {
    /// Keep locations that failed to load or link in the memo table, so
    /// that importing them again replays the same error. When disabled, a
    /// failed import forgets every failure it caused and the next import
    /// retries them. Evaluation failures are kept either way.
    pub retain_failures: bool,
}

impl Default for ImporterOptions {
    fn default() -> Self {
        Self {
            retain_failures: true,
        }
    }
}

/// One module loading session.
pub struct Importer {
    hooks: ImporterHooks,
    linker: Linker,
    modules: ModuleMap,
    options: ImporterOptions,
    /// Locations loaded by the current import.
    touched: RefCell<Vec<ModuleLocation>>,
}

impl Importer {
    pub fn new(
        hooks: ImporterHooks,
        evaluator: impl Evaluator + 'static,
        options: ImporterOptions,
    ) -> Self {
        Self {
            hooks,
            linker: Linker::new(evaluator),
            modules: ModuleMap::new(),
            options,
            touched: RefCell::default(),
        }
    }

    pub fn modules(&self) -> &ModuleMap {
        &self.modules
    }

    pub fn options(&self) -> ImporterOptions {
        self.options
    }

    /// Imports `specifier` as written in `referrer`: links the module graph
    /// it roots, evaluates it and returns the namespace of the entry module.
    ///
    /// The first error met on the way fails the import. Errors are cached
    /// per module, so importing a failed module again fails the same way.
    pub fn import(
        &self,
        specifier: &str,
        referrer: &ModuleLocation,
        endowments: &Endowments,
    ) -> Result<Namespace> {
        let module = self.link(specifier, referrer, endowments)?;
        self.linker.evaluate(&self.modules, module)?;
        Ok(self.modules.namespace(module))
    }

    /// Loads and links the graph rooted at `specifier` without evaluating
    /// any of it.
    pub fn link(
        &self,
        specifier: &str,
        referrer: &ModuleLocation,
        endowments: &Endowments,
    ) -> Result<ModuleId> {
        debug_assert!(self.touched.borrow().is_empty());
        let result = self
            .hooks
            .resolve
            .resolve(referrer, specifier)
            .map_err(Error::from)
            .and_then(|location| self.link_location(&location, endowments));
        let touched = mem::take(&mut *self.touched.borrow_mut());
        if result.is_err() && !self.options.retain_failures {
            self.forget_failures(touched);
        }
        result
    }

    fn forget_failures(&self, touched: Vec<ModuleLocation>) {
        for location in touched {
            let failed = match self.modules.lookup(&location) {
                Some(ModuleLookup::Instance(instance)) => instance.status().error().is_some(),
                Some(ModuleLookup::Failed(_)) => true,
                None => false,
            };
            if failed && self.modules.evict(&location) {
                debug!(module = %location, "forgot failed module");
            }
        }
    }

    /// Returns the instance of `location`, loading and linking it first if
    /// this importer has not seen it yet.
    fn link_location(&self, location: &ModuleLocation, endowments: &Endowments) -> Result<ModuleId> {
        match self.modules.lookup(location) {
            Some(ModuleLookup::Instance(instance)) => {
                trace!(module = %location, status = instance.status().name(), "memo hit");
                if let Some(error) = instance.status().error() {
                    return Err(error.clone());
                }
                return Ok(instance.id());
            }
            Some(ModuleLookup::Failed(error)) => {
                trace!(module = %location, "memo hit on failed load");
                return Err(error);
            }
            None => {}
        }
        self.touched.borrow_mut().push(location.clone());
        let record = match self.load(location) {
            Ok(record) => record,
            Err(error) => {
                warn!(module = %location, %error, "load failed");
                self.modules.insert_failure(location, error.clone());
                return Err(error);
            }
        };
        self.linker.link(
            &self.modules,
            record,
            &mut |dependency| self.link_location(dependency, endowments),
            endowments.clone(),
        )
    }

    /// Locates, retrieves and analyzes `location`, then resolves every
    /// specifier it requests.
    fn load(&self, location: &ModuleLocation) -> Result<LinkageRecord> {
        let retrievable = self.hooks.locate.locate(location);
        debug!(module = %location, %retrievable, "retrieving");
        let source = self.hooks.retrieve.retrieve(&retrievable)?;
        let record = self.hooks.analyze.analyze(&source, location)?;
        let module_locations = record
            .requested_specifiers()
            .into_iter()
            .map(|specifier| {
                let resolved = self.hooks.resolve.resolve(location, specifier)?;
                Ok((Box::from(specifier), resolved))
            })
            .collect::<Result<Vec<_>, ResolutionError>>()?;
        debug!(
            module = %location,
            dependencies = module_locations.len(),
            "analyzed"
        );
        Ok(LinkageRecord::new(record, location.clone(), module_locations))
    }
}

impl fmt::Debug for Importer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Importer")
            .field("modules", &self.modules)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
