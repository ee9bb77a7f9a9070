// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## Linkage records
//!
//! A [`StaticModuleRecord`] is what analysis of a module's source yields: the
//! functor body plus its static import and export tables. Once the importer
//! has resolved every requested specifier it becomes a [`LinkageRecord`],
//! which is immutable for the rest of the session.

use crate::module::ModuleLocation;

/// How an exported local binding may be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportBinding {
    /// Written exactly once, before any external read.
    Fixed { local_name: Box<str> },
    /// May be written repeatedly, readers observe every write. `hoisted` is
    /// set for function declarations, which are initialized before the body
    /// starts running.
    Live { local_name: Box<str>, hoisted: bool },
}

impl ExportBinding {
    pub fn local_name(&self) -> &str {
        match self {
            ExportBinding::Fixed { local_name } | ExportBinding::Live { local_name, .. } => {
                local_name
            }
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ExportBinding::Live { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub specifier: Box<str>,
    /// Imported names in declaration order. `*` is the namespace object.
    pub names: Vec<Box<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub export_name: Box<str>,
    pub binding: ExportBinding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReexportImportName {
    Name(Box<str>),
    /// `export * as ns from "..."`
    NamespaceObject,
}

/// An export whose binding lives in another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReexportEntry {
    pub specifier: Box<str>,
    pub import_name: ReexportImportName,
    pub export_name: Box<str>,
}

/// Output of static analysis, independent of where the module lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticModuleRecord {
    pub functor_source: Box<str>,
    pub imports: Vec<ImportEntry>,
    pub export_alls: Vec<Box<str>>,
    pub reexports: Vec<ReexportEntry>,
    pub exports: Vec<ExportEntry>,
}

impl StaticModuleRecord {
    pub fn builder() -> StaticModuleRecord {
        StaticModuleRecord::default()
    }

    pub fn functor_source(&mut self, source: &str) -> &mut Self {
        self.functor_source = source.into();
        self
    }

    /// Adds imported names for `specifier`, merging with any earlier import
    /// of the same specifier.
    pub fn import(&mut self, specifier: &str, names: &[&str]) -> &mut Self {
        let index = match self
            .imports
            .iter()
            .position(|entry| &*entry.specifier == specifier)
        {
            Some(index) => index,
            None => {
                self.imports.push(ImportEntry {
                    specifier: specifier.into(),
                    names: Vec::new(),
                });
                self.imports.len() - 1
            }
        };
        let entry = &mut self.imports[index];
        for name in names {
            if !entry.names.iter().any(|existing| &**existing == *name) {
                entry.names.push((*name).into());
            }
        }
        self
    }

    pub fn export_all(&mut self, specifier: &str) -> &mut Self {
        if !self.export_alls.iter().any(|s| &**s == specifier) {
            self.export_alls.push(specifier.into());
        }
        self
    }

    pub fn fixed_export(&mut self, export_name: &str, local_name: &str) -> &mut Self {
        self.export(
            export_name,
            ExportBinding::Fixed {
                local_name: local_name.into(),
            },
        )
    }

    pub fn live_export(&mut self, export_name: &str, local_name: &str) -> &mut Self {
        self.export(
            export_name,
            ExportBinding::Live {
                local_name: local_name.into(),
                hoisted: false,
            },
        )
    }

    pub fn hoisted_export(&mut self, export_name: &str, local_name: &str) -> &mut Self {
        self.export(
            export_name,
            ExportBinding::Live {
                local_name: local_name.into(),
                hoisted: true,
            },
        )
    }

    fn export(&mut self, export_name: &str, binding: ExportBinding) -> &mut Self {
        self.exports.push(ExportEntry {
            export_name: export_name.into(),
            binding,
        });
        self
    }

    pub fn reexport(&mut self, specifier: &str, import_name: &str, export_name: &str) -> &mut Self {
        self.reexports.push(ReexportEntry {
            specifier: specifier.into(),
            import_name: ReexportImportName::Name(import_name.into()),
            export_name: export_name.into(),
        });
        self
    }

    pub fn namespace_reexport(&mut self, specifier: &str, export_name: &str) -> &mut Self {
        self.reexports.push(ReexportEntry {
            specifier: specifier.into(),
            import_name: ReexportImportName::NamespaceObject,
            export_name: export_name.into(),
        });
        self
    }

    pub fn build(&mut self) -> StaticModuleRecord {
        std::mem::take(self)
    }

    /// Every specifier this module depends on: imports in declaration order,
    /// then star exports, then re-exports, without duplicates.
    pub fn requested_specifiers(&self) -> Vec<&str> {
        let mut specifiers: Vec<&str> = Vec::new();
        let candidates = self
            .imports
            .iter()
            .map(|entry| &*entry.specifier)
            .chain(self.export_alls.iter().map(|s| &**s))
            .chain(self.reexports.iter().map(|entry| &*entry.specifier));
        for specifier in candidates {
            if !specifiers.contains(&specifier) {
                specifiers.push(specifier);
            }
        }
        specifiers
    }

    /// Returns the names exported more than once, in order of their second
    /// occurrence.
    pub fn duplicate_exports(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        let mut duplicates = Vec::new();
        let names = self
            .exports
            .iter()
            .map(|entry| &*entry.export_name)
            .chain(self.reexports.iter().map(|entry| &*entry.export_name));
        for name in names {
            if seen.contains(&name) {
                duplicates.push(name);
            } else {
                seen.push(name);
            }
        }
        duplicates
    }
}

/// Immutable descriptor of one module: its static record plus the resolved
/// location of every specifier it requests.
#[derive(Debug, Clone)]
pub struct LinkageRecord {
    pub functor_source: Box<str>,
    pub imports: Box<[ImportEntry]>,
    pub export_alls: Box<[Box<str>]>,
    pub reexports: Box<[ReexportEntry]>,
    pub exports: Box<[ExportEntry]>,
    pub module_locations: Box<[(Box<str>, ModuleLocation)]>,
    pub module_location: ModuleLocation,
}

impl LinkageRecord {
    pub fn new(
        record: StaticModuleRecord,
        module_location: ModuleLocation,
        module_locations: Vec<(Box<str>, ModuleLocation)>,
    ) -> Self {
        let StaticModuleRecord {
            functor_source,
            imports,
            export_alls,
            reexports,
            exports,
        } = record;
        Self {
            functor_source,
            imports: imports.into_boxed_slice(),
            export_alls: export_alls.into_boxed_slice(),
            reexports: reexports.into_boxed_slice(),
            exports: exports.into_boxed_slice(),
            module_locations: module_locations.into_boxed_slice(),
            module_location,
        }
    }

    /// Specifiers in the order their modules are linked and evaluated.
    pub fn requested_specifiers(&self) -> impl Iterator<Item = &str> {
        self.module_locations.iter().map(|(specifier, _)| &**specifier)
    }

    pub fn find_export(&self, export_name: &str) -> Option<&ExportBinding> {
        self.exports
            .iter()
            .find(|entry| &*entry.export_name == export_name)
            .map(|entry| &entry.binding)
    }

    pub fn find_reexport(&self, export_name: &str) -> Option<&ReexportEntry> {
        self.reexports
            .iter()
            .find(|entry| &*entry.export_name == export_name)
    }

    /// `fixedExportMap`: exported name to local name.
    pub fn fixed_exports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.exports.iter().filter_map(|entry| match &entry.binding {
            ExportBinding::Fixed { local_name } => Some((&*entry.export_name, &**local_name)),
            ExportBinding::Live { .. } => None,
        })
    }

    /// `liveExportMap`: exported name to local name and hoisting flag.
    pub fn live_exports(&self) -> impl Iterator<Item = (&str, &str, bool)> {
        self.exports.iter().filter_map(|entry| match &entry.binding {
            ExportBinding::Live {
                local_name,
                hoisted,
            } => Some((&*entry.export_name, &**local_name, *hoisted)),
            ExportBinding::Fixed { .. } => None,
        })
    }
}
