// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Export resolution across the module graph.

use std::rc::Rc;

use tracing::trace;

use crate::module::{BindingCell, ModuleId, ModuleMap, Namespace, ReexportImportName};

/// Result of [`ModuleMap::resolve_export`].
#[derive(Debug, Clone)]
pub enum ResolvedExport {
    /// No binding, or a circular import request.
    NotFound,
    /// The name is provided by more than one star export.
    Ambiguous,
    Binding(Rc<BindingCell>),
}

impl ModuleMap {
    /// ### [16.2.1.7.2.2 ResolveExport ( exportName \[ , resolveSet \] )](https://tc39.es/ecma262/#sec-resolveexport)
    ///
    /// Star exports of modules that have not finished loading their
    /// dependencies only contribute what is already loaded.
    pub fn resolve_export(
        &self,
        module: ModuleId,
        export_name: &str,
        resolve_set: &mut Vec<(ModuleId, Box<str>)>,
    ) -> ResolvedExport {
        // 1. Assert: module.[[Status]] is not new.
        // 2. If resolveSet is not present, set resolveSet to a new empty List.
        // 3. For each Record { [[Module]], [[ExportName]] } r of resolveSet, do
        if resolve_set
            .iter()
            .any(|(m, name)| *m == module && &**name == export_name)
        {
            // a. If module and r.[[Module]] are the same Module Record and
            // exportName is r.[[ExportName]], then
            // i. Assert: This is a circular import request.
            // ii. Return null.
            return ResolvedExport::NotFound;
        }
        // 4. Append the Record { [[Module]]: module, [[ExportName]]: exportName } to resolveSet.
        resolve_set.push((module, export_name.into()));
        let instance = self.get(module);
        let record = instance.record();
        // 5. For each ExportEntry Record e of module.[[LocalExportEntries]], do
        if let Some(binding) = record.find_export(export_name) {
            // a. If e.[[ExportName]] is exportName, then
            // i. Assert: module provides the direct binding for this export.
            // ii. Return ResolvedBinding Record { [[Module]]: module, [[BindingName]]: e.[[LocalName]] }.
            return match instance.cell(binding.local_name()) {
                Some(cell) => ResolvedExport::Binding(cell.clone()),
                None => unreachable!("export without binding cell"),
            };
        }
        // 6. For each ExportEntry Record e of module.[[IndirectExportEntries]], do
        if let Some(entry) = record.find_reexport(export_name) {
            // a. If e.[[ExportName]] is exportName, then
            // i. Assert: e.[[ModuleRequest]] is not null.
            // ii. Let importedModule be GetImportedModule(module, e.[[ModuleRequest]]).
            let Some(imported_module) = instance.loaded_module(&entry.specifier) else {
                return ResolvedExport::NotFound;
            };
            return match &entry.import_name {
                // iii. If e.[[ImportName]] is all, then
                // 1. Assert: module does not provide the direct binding for this export.
                // 2. Return ResolvedBinding Record { [[Module]]: importedModule, [[BindingName]]: namespace }.
                ReexportImportName::NamespaceObject => {
                    ResolvedExport::Binding(self.get(imported_module).namespace_cell().clone())
                }
                // iv. Else,
                // 1. Assert: module imports a specific binding for this export.
                // 2. Assert: e.[[ImportName]] is a String.
                // 3. Return importedModule.ResolveExport(e.[[ImportName]], resolveSet).
                ReexportImportName::Name(import_name) => {
                    self.resolve_export(imported_module, import_name, resolve_set)
                }
            };
        }
        // 7. If exportName is "default", then
        if export_name == "default" {
            // a. Assert: A default export was not explicitly defined by this module.
            // b. Return null.
            // c. NOTE: A default export cannot be provided by an export * from "mod" declaration.
            return ResolvedExport::NotFound;
        }
        // 8. Let starResolution be null.
        let mut star_resolution: Option<Rc<BindingCell>> = None;
        // 9. For each ExportEntry Record e of module.[[StarExportEntries]], do
        for specifier in record.export_alls.iter() {
            // a. Assert: e.[[ModuleRequest]] is not null.
            // b. Let importedModule be GetImportedModule(module, e.[[ModuleRequest]]).
            let Some(imported_module) = instance.loaded_module(specifier) else {
                continue;
            };
            // c. Let resolution be importedModule.ResolveExport(exportName, resolveSet).
            match self.resolve_export(imported_module, export_name, resolve_set) {
                // d. If resolution is ambiguous, return ambiguous.
                ResolvedExport::Ambiguous => return ResolvedExport::Ambiguous,
                // e. If resolution is not null, then
                ResolvedExport::Binding(cell) => {
                    // i. Assert: resolution is a ResolvedBinding Record.
                    let Some(existing) = &star_resolution else {
                        // ii. If starResolution is null, then
                        // 1. Set starResolution to resolution.
                        star_resolution = Some(cell);
                        continue;
                    };
                    // iii. Else,
                    // 1. Assert: There is more than one * import that includes the requested name.
                    // 2. If resolution.[[Module]] and starResolution.[[Module]] are not the same
                    //    Module Record, return ambiguous.
                    // 3. If resolution.[[BindingName]] is not starResolution.[[BindingName]],
                    //    return ambiguous.
                    if !Rc::ptr_eq(existing, &cell) {
                        trace!(
                            module = %instance.location(),
                            export_name,
                            "ambiguous star export"
                        );
                        return ResolvedExport::Ambiguous;
                    }
                }
                ResolvedExport::NotFound => {}
            }
        }
        // 10. Return starResolution.
        match star_resolution {
            Some(cell) => ResolvedExport::Binding(cell),
            None => ResolvedExport::NotFound,
        }
    }

    /// ### [16.2.1.7.2.1 GetExportedNames ( \[ exportStarSet \] )](https://tc39.es/ecma262/#sec-getexportednames)
    pub fn exported_names(
        &self,
        module: ModuleId,
        export_star_set: &mut Vec<ModuleId>,
    ) -> Vec<Box<str>> {
        // 1. Assert: module.[[Status]] is not new.
        // 2. If exportStarSet is not present, set exportStarSet to a new empty List.
        // 3. If exportStarSet contains module, then
        if export_star_set.contains(&module) {
            // a. Assert: We've reached the starting point of an export * circularity.
            // b. Return a new empty List.
            return Vec::new();
        }
        // 4. Append module to exportStarSet.
        export_star_set.push(module);
        let instance = self.get(module);
        let record = instance.record();
        // 5. Let exportedNames be a new empty List.
        // 6. For each ExportEntry Record e of module.[[LocalExportEntries]], do
        // 7. For each ExportEntry Record e of module.[[IndirectExportEntries]], do
        let mut exported_names: Vec<Box<str>> = record
            .exports
            .iter()
            .map(|entry| entry.export_name.clone())
            .chain(record.reexports.iter().map(|entry| entry.export_name.clone()))
            .collect();
        // 8. For each ExportEntry Record e of module.[[StarExportEntries]], do
        for specifier in record.export_alls.iter() {
            // a. Assert: e.[[ModuleRequest]] is not null.
            // b. Let requestedModule be GetImportedModule(module, e.[[ModuleRequest]]).
            let Some(requested_module) = instance.loaded_module(specifier) else {
                continue;
            };
            // c. Let starNames be requestedModule.GetExportedNames(exportStarSet).
            let star_names = self.exported_names(requested_module, export_star_set);
            // d. For each element n of starNames, do
            for name in star_names {
                // i. If n is not "default", then
                // 1. If exportedNames does not contain n, then
                if &*name != "default" && !exported_names.contains(&name) {
                    // a. Append n to exportedNames.
                    exported_names.push(name);
                }
            }
        }
        // 9. Return exportedNames.
        exported_names
    }

    /// ### [10.4.6.12 GetModuleNamespace ( module )](https://tc39.es/ecma262/#sec-getmodulenamespace)
    ///
    /// The namespace is created once its module is linked and reused from
    /// then on. A module still instantiating gets a fresh view reflecting
    /// the dependencies loaded so far.
    pub fn namespace(&self, module: ModuleId) -> Namespace {
        let instance = self.get(module);
        // 1. Assert: If module is a Cyclic Module Record, then module.[[Status]] is not new or unlinked.
        // 2. Let namespace be module.[[Namespace]].
        if let Some(namespace) = instance.namespace_slot().get() {
            return namespace.clone();
        }
        // 3. If namespace is empty, then
        // a. Let exportedNames be module.GetExportedNames().
        let exported_names = self.exported_names(module, &mut Vec::new());
        // b. Let unambiguousNames be a new empty List.
        // c. For each element name of exportedNames, do
        let mut entries = Vec::with_capacity(exported_names.len());
        for name in exported_names {
            // i. Let resolution be module.ResolveExport(name).
            // ii. If resolution is a ResolvedBinding Record, append name to unambiguousNames.
            if let ResolvedExport::Binding(cell) = self.resolve_export(module, &name, &mut Vec::new())
            {
                entries.push((name, cell));
            }
        }
        // d. Set namespace to ModuleNamespaceCreate(module, unambiguousNames).
        let namespace = Namespace::new(instance.location().clone(), entries);
        if instance.status().is_linked() {
            let _ = instance.namespace_slot().set(namespace.clone());
            instance.namespace_cell().set(namespace.clone().into());
        }
        // 4. Return namespace.
        namespace
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        host::Endowments,
        module::{LinkageRecord, ModuleInstance, ModuleStatus, StaticModuleRecord},
    };

    /// Inserts a linked module whose dependencies are given by location.
    fn add(
        modules: &ModuleMap,
        location: &str,
        record: StaticModuleRecord,
        dependencies: &[(&str, ModuleId)],
    ) -> ModuleId {
        let instance = modules.insert(|id| {
            ModuleInstance::new(
                id,
                LinkageRecord::new(record, location.into(), Vec::new()),
                Endowments::default(),
                ModuleStatus::Instantiated,
            )
        });
        for (specifier, dependency) in dependencies {
            instance.push_loaded_module(specifier, *dependency);
        }
        instance.id()
    }

    #[test]
    fn local_names_shadow_star_exports() {
        let modules = ModuleMap::new();
        let dep = add(
            &modules,
            "dep",
            StaticModuleRecord::builder()
                .live_export("x", "x")
                .live_export("y", "y")
                .fixed_export("default", "*default*")
                .build(),
            &[],
        );
        let main = add(
            &modules,
            "main",
            StaticModuleRecord::builder()
                .export_all("./dep")
                .fixed_export("x", "own")
                .build(),
            &[("./dep", dep)],
        );
        let ResolvedExport::Binding(x) = modules.resolve_export(main, "x", &mut Vec::new()) else {
            panic!("x should resolve");
        };
        assert_eq!(x.local_name(), "own");
        assert!(matches!(
            modules.resolve_export(main, "default", &mut Vec::new()),
            ResolvedExport::NotFound
        ));
        let namespace = modules.namespace(main);
        assert_eq!(namespace.keys().collect::<Vec<_>>(), ["x", "y"]);
    }

    #[test]
    fn conflicting_star_exports_are_ambiguous() {
        let modules = ModuleMap::new();
        let a = add(
            &modules,
            "a",
            StaticModuleRecord::builder()
                .live_export("shared", "shared")
                .live_export("onlyA", "onlyA")
                .build(),
            &[],
        );
        let b = add(
            &modules,
            "b",
            StaticModuleRecord::builder()
                .live_export("shared", "shared")
                .build(),
            &[],
        );
        let main = add(
            &modules,
            "main",
            StaticModuleRecord::builder()
                .export_all("./a")
                .export_all("./b")
                .build(),
            &[("./a", a), ("./b", b)],
        );
        assert!(matches!(
            modules.resolve_export(main, "shared", &mut Vec::new()),
            ResolvedExport::Ambiguous
        ));
        assert_eq!(
            modules.namespace(main).keys().collect::<Vec<_>>(),
            ["onlyA"]
        );
    }

    #[test]
    fn same_binding_through_two_paths_is_not_ambiguous() {
        let modules = ModuleMap::new();
        let base = add(
            &modules,
            "base",
            StaticModuleRecord::builder().live_export("v", "v").build(),
            &[],
        );
        let left = add(
            &modules,
            "left",
            StaticModuleRecord::builder().export_all("./base").build(),
            &[("./base", base)],
        );
        let right = add(
            &modules,
            "right",
            StaticModuleRecord::builder().reexport("./base", "v", "v").build(),
            &[("./base", base)],
        );
        let main = add(
            &modules,
            "main",
            StaticModuleRecord::builder()
                .export_all("./left")
                .export_all("./right")
                .build(),
            &[("./left", left), ("./right", right)],
        );
        assert!(matches!(
            modules.resolve_export(main, "v", &mut Vec::new()),
            ResolvedExport::Binding(_)
        ));
    }

    #[test]
    fn star_cycles_terminate() {
        let modules = ModuleMap::new();
        // Ids are assigned in insertion order, so the first module can name
        // the second before it exists.
        let a = add(
            &modules,
            "a",
            StaticModuleRecord::builder()
                .export_all("./b")
                .live_export("fromA", "fromA")
                .build(),
            &[("./b", ModuleId::from_index(1))],
        );
        let b = add(
            &modules,
            "b",
            StaticModuleRecord::builder()
                .export_all("./a")
                .live_export("fromB", "fromB")
                .build(),
            &[("./a", a)],
        );
        assert_eq!(
            modules.namespace(a).keys().collect::<Vec<_>>(),
            ["fromA", "fromB"]
        );
        assert!(matches!(
            modules.resolve_export(b, "missing", &mut Vec::new()),
            ResolvedExport::NotFound
        ));
    }

    #[test]
    fn namespace_reexport_resolves_to_namespace_cell() {
        let modules = ModuleMap::new();
        let dep = add(
            &modules,
            "dep",
            StaticModuleRecord::builder().live_export("x", "x").build(),
            &[],
        );
        let main = add(
            &modules,
            "main",
            StaticModuleRecord::builder()
                .namespace_reexport("./dep", "ns")
                .build(),
            &[("./dep", dep)],
        );
        let dep_namespace = modules.namespace(dep);
        let ResolvedExport::Binding(cell) = modules.resolve_export(main, "ns", &mut Vec::new())
        else {
            panic!("ns should resolve");
        };
        let value = cell.get().unwrap();
        assert!(value.as_namespace().is_some_and(|ns| ns.ptr_eq(&dep_namespace)));
        assert!(modules.namespace(main).ptr_eq(&modules.namespace(main)));
    }
}
