// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## The instantiate/evaluate protocol
//!
//! Linking is a depth-first traversal over the module graph that allocates
//! every module's binding cells and loads its dependencies. Modules that are
//! part of a cycle stay on the traversal stack until the root of their
//! strongly connected component finishes, at which point the whole
//! component becomes instantiated together and its imports are validated.
//!
//! Evaluation is a second traversal of the same shape that runs each module
//! body exactly once, dependencies first.

mod functor;

pub use functor::{
    FunctorError, FunctorScope, ImportedBinding, LiveVar, OnceVar, Subscriber, Subscriptions,
};

use std::{cell::RefCell, rc::Rc};

use tracing::{debug, trace, warn};

use crate::{
    error::{Error, FunctorEvaluationError, LinkError, LinkErrorKind, Result},
    host::{Endowments, EvaluateOptions, Evaluator},
    module::{
        DfsIndex, LinkageRecord, ModuleId, ModuleInstance, ModuleLocation, ModuleMap,
        ModuleStatus, ReexportImportName, ResolvedExport,
    },
};

#[derive(Debug, Default)]
struct DfsState {
    stack: Vec<ModuleId>,
    index: DfsIndex,
}

impl DfsState {
    fn next_index(&mut self) -> DfsIndex {
        let index = self.index;
        self.index += 1;
        index
    }

    /// Removes `module` and everything pushed after it.
    fn split_off(&mut self, module: ModuleId) -> Vec<ModuleId> {
        match self.stack.iter().position(|entry| *entry == module) {
            Some(position) => self.stack.split_off(position),
            None => Vec::new(),
        }
    }
}

/// Links and evaluates modules on behalf of an importer.
pub struct Linker {
    evaluator: Box<dyn Evaluator>,
    linking: RefCell<DfsState>,
    evaluating: RefCell<DfsState>,
}

impl Linker {
    pub fn new(evaluator: impl Evaluator + 'static) -> Self {
        Self {
            evaluator: Box::new(evaluator),
            linking: RefCell::default(),
            evaluating: RefCell::default(),
        }
    }

    /// ### [16.2.1.6.1.1 Link ( )](https://tc39.es/ecma262/#sec-moduledeclarationlinking)
    ///
    /// Creates the instance for `record` and links it, calling
    /// `recursive_link` for the location of every module it requests. A
    /// request for a module that is still instantiating returns that module;
    /// this is what makes cycles terminate.
    ///
    /// On failure this module, and every module linked after it that is not
    /// yet part of a completed component, is errored with the failure.
    pub fn link(
        &self,
        modules: &ModuleMap,
        record: LinkageRecord,
        recursive_link: &mut dyn FnMut(&ModuleLocation) -> Result<ModuleId>,
        endowments: Endowments,
    ) -> Result<ModuleId> {
        // 4. Set module.[[Status]] to linking.
        // 5. Set module.[[DFSIndex]] to index.
        // 6. Set module.[[DFSAncestorIndex]] to index.
        // 7. Set index to index + 1.
        let index = self.linking.borrow_mut().next_index();
        let instance = modules.insert(|id| {
            ModuleInstance::new(
                id,
                record,
                endowments,
                ModuleStatus::Instantiating {
                    dfs_index: index,
                    dfs_ancestor_index: index,
                },
            )
        });
        let module = instance.id();
        debug!(module = %instance.location(), index, "linking");
        // 8. Append module to stack.
        self.linking.borrow_mut().stack.push(module);

        let result = self
            .link_requested_modules(modules, &instance, recursive_link)
            .and_then(|()| self.complete_component(modules, &instance));
        if let Err(error) = &result {
            let failed = self.linking.borrow_mut().split_off(module);
            for id in failed {
                let member = modules.get(id);
                warn!(module = %member.location(), %error, "link failed");
                member.set_status(ModuleStatus::Errored(error.clone()));
            }
        }
        result.map(|()| module)
    }

    fn link_requested_modules(
        &self,
        modules: &ModuleMap,
        instance: &ModuleInstance,
        recursive_link: &mut dyn FnMut(&ModuleLocation) -> Result<ModuleId>,
    ) -> Result<()> {
        // 9. For each String required of module.[[RequestedModules]], do
        for (specifier, location) in instance.record().module_locations.iter() {
            // a. Let requiredModule be GetImportedModule(module, required).
            // b. Set index to ? InnerModuleLinking(requiredModule, stack, index).
            let required = recursive_link(location)?;
            instance.push_loaded_module(specifier, required);
            let required_module = modules.get(required);
            // c. If requiredModule is a Cyclic Module Record, then
            let required_status = required_module.status().clone();
            match required_status {
                // iii. If requiredModule.[[Status]] is linking, then
                ModuleStatus::Instantiating {
                    dfs_ancestor_index: required_ancestor_index,
                    ..
                } => {
                    // ii. Assert: requiredModule.[[Status]] is linking if and
                    // only if stack contains requiredModule.
                    debug_assert!(self.linking.borrow().stack.contains(&required));
                    // 1. Set module.[[DFSAncestorIndex]] to
                    // min(module.[[DFSAncestorIndex]], requiredModule.[[DFSAncestorIndex]]).
                    lower_ancestor_index(instance, required_ancestor_index);
                }
                ModuleStatus::Errored(error) => return Err(error),
                // i. Assert: requiredModule.[[Status]] is one of linking,
                // linked, evaluating-async, or evaluated.
                _ => {}
            }
        }
        Ok(())
    }

    fn complete_component(&self, modules: &ModuleMap, instance: &ModuleInstance) -> Result<()> {
        // 12. Assert: module.[[DFSAncestorIndex]] ≤ module.[[DFSIndex]].
        let ModuleStatus::Instantiating {
            dfs_index,
            dfs_ancestor_index,
        } = *instance.status()
        else {
            unreachable!("linked module left the instantiating state")
        };
        assert!(dfs_ancestor_index <= dfs_index);
        // 13. If module.[[DFSAncestorIndex]] = module.[[DFSIndex]], then
        if dfs_ancestor_index != dfs_index {
            return Ok(());
        }
        // a. Let done be false.
        // b. Repeat, while done is false,
        // i. Let requiredModule be the last element of stack.
        // ii. Remove the last element of stack.
        // v. If requiredModule and module are the same Module Record, set done to true.
        let component = self.linking.borrow_mut().split_off(instance.id());
        // iv. Set requiredModule.[[Status]] to linked.
        for id in component.iter() {
            modules.get(*id).set_status(ModuleStatus::Instantiated);
        }
        // InitializeEnvironment: every import must resolve before any body
        // in the component runs.
        let validation = component
            .iter()
            .try_for_each(|id| validate_imports(modules, &modules.get(*id)))
            .map_err(Error::from);
        if let Err(error) = validation {
            for id in component.iter() {
                let member = modules.get(*id);
                warn!(module = %member.location(), %error, "link failed");
                member.set_status(ModuleStatus::Errored(error.clone()));
            }
            return Err(error);
        }
        for id in component.iter() {
            modules.namespace(*id);
        }
        debug!(
            module = %instance.location(),
            size = component.len(),
            "instantiated component"
        );
        Ok(())
    }

    /// ### [16.2.1.6.1.3 Evaluate ( )](https://tc39.es/ecma262/#sec-moduleevaluation)
    ///
    /// Evaluates `module` and its dependencies. A module that already failed
    /// returns its cached error; a module that already evaluated returns
    /// immediately.
    pub fn evaluate(&self, modules: &ModuleMap, module: ModuleId) -> Result<()> {
        let instance = modules.get(module);
        // 2. Assert: module.[[Status]] is one of linked, evaluating-async, or evaluated.
        let status = instance.status().clone();
        match status {
            ModuleStatus::Evaluated | ModuleStatus::Evaluating { .. } => return Ok(()),
            ModuleStatus::Errored(error) => return Err(error),
            ModuleStatus::Instantiating { .. } => {
                unreachable!("evaluate called on a module that is still linking")
            }
            ModuleStatus::Instantiated => {}
        }
        // 4. Let stack be a new empty List.
        debug_assert!(self.evaluating.borrow().stack.is_empty());
        // 8. Let result be Completion(InnerModuleEvaluation(module, stack, 0)).
        let result = self.inner_module_evaluation(modules, module);
        // 9. If result is an abrupt completion, then
        if let Err(error) = &result {
            // a. For each Cyclic Module Record m of stack, do
            let failed = std::mem::take(&mut self.evaluating.borrow_mut().stack);
            for id in failed {
                let member = modules.get(id);
                // i. Assert: m.[[Status]] is evaluating.
                debug_assert!(matches!(
                    *member.status(),
                    ModuleStatus::Evaluating { .. } | ModuleStatus::Errored(_)
                ));
                // ii. Set m.[[Status]] to evaluated.
                // iii. Set m.[[EvaluationError]] to result.
                warn!(module = %member.location(), %error, "evaluation failed");
                member.set_status(ModuleStatus::Errored(error.clone()));
            }
        } else {
            // 10. Else,
            // a. Assert: module.[[Status]] is either evaluating-async or evaluated.
            // c. Assert: stack is empty.
            debug_assert!(self.evaluating.borrow().stack.is_empty());
        }
        self.evaluating.borrow_mut().index = 0;
        result
    }

    /// ### [16.2.1.6.1.3.1 InnerModuleEvaluation ( module, stack, index )](https://tc39.es/ecma262/#sec-innermoduleevaluation)
    fn inner_module_evaluation(&self, modules: &ModuleMap, module: ModuleId) -> Result<()> {
        let instance = modules.get(module);
        // 2. If module.[[Status]] is either evaluating-async or evaluated, then
        // 3. If module.[[Status]] is evaluating, return index.
        let status = instance.status().clone();
        match status {
            ModuleStatus::Evaluated | ModuleStatus::Evaluating { .. } => return Ok(()),
            // a. If module.[[EvaluationError]] is empty, return index.
            // b. Otherwise, return ? module.[[EvaluationError]].
            ModuleStatus::Errored(error) => return Err(error),
            ModuleStatus::Instantiating { .. } => {
                unreachable!("evaluating a module that is still linking")
            }
            // 4. Assert: module.[[Status]] is linked.
            ModuleStatus::Instantiated => {}
        }
        // 5. Set module.[[Status]] to evaluating.
        // 6. Set module.[[DFSIndex]] to index.
        // 7. Set module.[[DFSAncestorIndex]] to index.
        // 9. Set index to index + 1.
        let index = self.evaluating.borrow_mut().next_index();
        instance.set_status(ModuleStatus::Evaluating {
            dfs_index: index,
            dfs_ancestor_index: index,
        });
        // 10. Append module to stack.
        self.evaluating.borrow_mut().stack.push(module);
        debug!(module = %instance.location(), index, "evaluating");

        // 12-16. Evaluate the dependencies and execute the module body. The
        // body decides when its dependencies run by calling imports().
        self.execute_module(modules, &instance)?;

        // 17. Assert: module occurs exactly once in stack.
        debug_assert_eq!(
            self.evaluating
                .borrow()
                .stack
                .iter()
                .filter(|entry| **entry == module)
                .count(),
            1
        );
        // 18. Assert: module.[[DFSAncestorIndex]] ≤ module.[[DFSIndex]].
        let ModuleStatus::Evaluating {
            dfs_index,
            dfs_ancestor_index,
        } = *instance.status()
        else {
            unreachable!("evaluated module left the evaluating state")
        };
        assert!(dfs_ancestor_index <= dfs_index);
        // 19. If module.[[DFSAncestorIndex]] = module.[[DFSIndex]], then
        if dfs_ancestor_index == dfs_index {
            // a. Let done be false.
            // b. Repeat, while done is false,
            let component = self.evaluating.borrow_mut().split_off(module);
            for id in component.iter() {
                // iv. If requiredModule.[[AsyncEvaluation]] is false, set
                // requiredModule.[[Status]] to evaluated.
                modules.get(*id).set_status(ModuleStatus::Evaluated);
            }
            debug!(
                module = %instance.location(),
                size = component.len(),
                "evaluated component"
            );
        }
        // 20. Return index.
        Ok(())
    }

    /// Turns the functor source into a functor and runs it with the
    /// capabilities of `instance`.
    fn execute_module(&self, modules: &ModuleMap, instance: &Rc<ModuleInstance>) -> Result<()> {
        let location = instance.location();
        let functor = self
            .evaluator
            .evaluate(
                &instance.record().functor_source,
                instance.endowments(),
                &EvaluateOptions {
                    module_location: location,
                },
            )
            .map_err(|thrown| FunctorEvaluationError {
                location: location.clone(),
                thrown,
            })?;
        let mut scope = FunctorScope::new(self, modules, instance.clone());
        let body = functor(&mut scope);
        let (dependencies_evaluated, dependency_error) = scope.finish();
        // A dependency failure seen through imports() fails this module even
        // if the body caught it.
        if let Some(error) = dependency_error {
            return Err(error);
        }
        body.map_err(|error| match error {
            FunctorError::Throw(thrown) => Error::from(FunctorEvaluationError {
                location: location.clone(),
                thrown,
            }),
            FunctorError::Error(error) => error,
        })?;
        if !dependencies_evaluated {
            self.evaluate_dependencies(modules, instance)?;
        }
        trace!(module = %location, "module body completed");
        Ok(())
    }

    /// Steps 11-12 of InnerModuleEvaluation: evaluates every loaded
    /// dependency of `instance` in link order.
    pub(crate) fn evaluate_dependencies(
        &self,
        modules: &ModuleMap,
        instance: &ModuleInstance,
    ) -> Result<()> {
        for (_, required) in instance.loaded_modules() {
            // a. Let requiredModule be GetImportedModule(module, required).
            // b. Set index to ? InnerModuleEvaluation(requiredModule, stack, index).
            self.inner_module_evaluation(modules, required)?;
            // c. If requiredModule is a Cyclic Module Record, then
            let required_status = modules.get(required).status().clone();
            // iii. If requiredModule.[[Status]] is evaluating, then
            if let ModuleStatus::Evaluating {
                dfs_ancestor_index: required_ancestor_index,
                ..
            } = required_status
            {
                // 1. Set module.[[DFSAncestorIndex]] to
                // min(module.[[DFSAncestorIndex]], requiredModule.[[DFSAncestorIndex]]).
                lower_ancestor_index(instance, required_ancestor_index);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Linker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linker")
            .field("linking", &self.linking.borrow())
            .field("evaluating", &self.evaluating.borrow())
            .finish_non_exhaustive()
    }
}

fn lower_ancestor_index(instance: &ModuleInstance, required_ancestor_index: DfsIndex) {
    let status = instance.status().clone();
    match status {
        ModuleStatus::Instantiating {
            dfs_index,
            dfs_ancestor_index,
        } => instance.set_status(ModuleStatus::Instantiating {
            dfs_index,
            dfs_ancestor_index: dfs_ancestor_index.min(required_ancestor_index),
        }),
        ModuleStatus::Evaluating {
            dfs_index,
            dfs_ancestor_index,
        } => instance.set_status(ModuleStatus::Evaluating {
            dfs_index,
            dfs_ancestor_index: dfs_ancestor_index.min(required_ancestor_index),
        }),
        _ => unreachable!("ancestor index of a module that is not on a stack"),
    }
}

/// ### [16.2.1.7.3.1 InitializeEnvironment ( )](https://tc39.es/ecma262/#sec-source-text-module-record-initialize-environment)
///
/// Checks that every statically imported and re-exported name of
/// `instance` resolves to a binding.
fn validate_imports(modules: &ModuleMap, instance: &ModuleInstance) -> Result<(), LinkError> {
    let location = instance.location();
    let record = instance.record();
    let requests = record
        .imports
        .iter()
        .flat_map(|entry| entry.names.iter().map(|name| (&*entry.specifier, &**name)))
        .chain(record.reexports.iter().filter_map(|entry| match &entry.import_name {
            ReexportImportName::Name(name) => Some((&*entry.specifier, &**name)),
            ReexportImportName::NamespaceObject => None,
        }));
    for (specifier, import_name) in requests {
        // 1. For each ExportEntry Record e of module.[[IndirectExportEntries]], do
        // 7. For each ImportEntry Record in of module.[[ImportEntries]], do
        // a. Let importedModule be GetImportedModule(module, in.[[ModuleRequest]]).
        let Some(imported_module) = instance.loaded_module(specifier) else {
            return Err(LinkError::new(
                location,
                specifier,
                import_name,
                LinkErrorKind::UnknownSpecifier,
            ));
        };
        // b. If in.[[ImportName]] is namespace-object, then
        if import_name == "*" {
            continue;
        }
        // c. Else,
        // i. Let resolution be importedModule.ResolveExport(in.[[ImportName]]).
        // ii. If resolution is either null or ambiguous, throw a SyntaxError exception.
        let kind = match modules.resolve_export(imported_module, import_name, &mut Vec::new()) {
            ResolvedExport::Binding(_) => continue,
            ResolvedExport::NotFound => LinkErrorKind::MissingExport,
            ResolvedExport::Ambiguous => LinkErrorKind::AmbiguousExport,
        };
        return Err(LinkError::new(location, specifier, import_name, kind));
    }
    Ok(())
}
