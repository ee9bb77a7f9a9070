// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static analysis of module source into a [`StaticModuleRecord`].

use ahash::AHashMap;
use oxc_allocator::Allocator;
use oxc_ast::ast;
use oxc_diagnostics::OxcDiagnostic;
use oxc_ecmascript::BoundNames;
use oxc_parser::{Parser, ParserReturn};
use oxc_span::{GetSpan, SourceType};
use tracing::debug;

use crate::{
    error::AnalysisError,
    host::{Analyze, ModuleSource},
    module::{ModuleLocation, StaticModuleRecord},
};

/// Dispatches analysis on [`ModuleSource::kind`].
#[derive(Default)]
pub struct TypeAnalyzer {
    analyzers: AHashMap<Box<str>, Box<dyn Analyze>>,
}

impl TypeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: &str, analyzer: impl Analyze + 'static) -> Self {
        self.analyzers.insert(kind.into(), Box::new(analyzer));
        self
    }
}

impl Analyze for TypeAnalyzer {
    fn analyze(
        &self,
        source: &ModuleSource,
        location: &ModuleLocation,
    ) -> Result<StaticModuleRecord, AnalysisError> {
        match self.analyzers.get(&source.kind) {
            Some(analyzer) => analyzer.analyze(source, location),
            None => Err(AnalysisError::message(
                location,
                format!("No analyzer for {:?} sources", source.kind),
            )),
        }
    }
}

/// Analyzes ECMAScript module source.
///
/// `const` and `class` declarations and `export default` expressions are
/// fixed exports. `let`, `var` and export lists are live; function
/// declarations are live and hoisted. The functor source is the module text
/// itself: turning it into something executable is the evaluator's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleAnalyzer {
    typescript: bool,
}

/// Local name introduced by an import declaration.
struct ImportedLocal<'a> {
    local_name: &'a str,
    specifier: &'a str,
    /// `None` for namespace imports.
    import_name: Option<&'a str>,
}

impl ModuleAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses sources as TypeScript; type-only imports and exports are
    /// ignored.
    pub fn typescript(mut self, typescript: bool) -> Self {
        self.typescript = typescript;
        self
    }

    pub fn analyze_text(
        &self,
        text: &str,
        location: &ModuleLocation,
    ) -> Result<StaticModuleRecord, AnalysisError> {
        let allocator = Allocator::default();
        let source_type = SourceType::default()
            .with_module(true)
            .with_typescript(self.typescript);
        let parser = Parser::new(&allocator, text, source_type);
        let ParserReturn {
            errors, program, ..
        } = parser.parse();
        if !errors.is_empty() {
            return Err(AnalysisError::new(location, errors));
        }

        let mut record = StaticModuleRecord::builder();
        record.functor_source(text);
        let mut diagnostics = Vec::new();

        // Import declarations come first: export lists need to know which
        // of their local names are imported.
        let mut imported: Vec<ImportedLocal<'_>> = Vec::new();
        for stmt in program.body.iter() {
            let Some(ast::ModuleDeclaration::ImportDeclaration(decl)) = stmt.as_module_declaration()
            else {
                continue;
            };
            if decl.import_kind.is_type() {
                continue;
            }
            let specifier = decl.source.value.as_str();
            let mut names = Vec::new();
            for entry in decl.specifiers.iter().flatten() {
                match entry {
                    ast::ImportDeclarationSpecifier::ImportSpecifier(entry) => {
                        if entry.import_kind.is_type() {
                            continue;
                        }
                        let import_name = entry.imported.name().as_str();
                        names.push(import_name);
                        imported.push(ImportedLocal {
                            local_name: entry.local.name.as_str(),
                            specifier,
                            import_name: Some(import_name),
                        });
                    }
                    ast::ImportDeclarationSpecifier::ImportDefaultSpecifier(entry) => {
                        names.push("default");
                        imported.push(ImportedLocal {
                            local_name: entry.local.name.as_str(),
                            specifier,
                            import_name: Some("default"),
                        });
                    }
                    ast::ImportDeclarationSpecifier::ImportNamespaceSpecifier(entry) => {
                        names.push("*");
                        imported.push(ImportedLocal {
                            local_name: entry.local.name.as_str(),
                            specifier,
                            import_name: None,
                        });
                    }
                }
            }
            record.import(specifier, &names);
        }

        for stmt in program.body.iter() {
            let Some(decl) = stmt.as_module_declaration() else {
                continue;
            };
            match decl {
                ast::ModuleDeclaration::ImportDeclaration(_) => {}
                ast::ModuleDeclaration::ExportAllDeclaration(decl) => {
                    if decl.export_kind.is_type() {
                        continue;
                    }
                    let specifier = decl.source.value.as_str();
                    record.import(specifier, &[]);
                    match &decl.exported {
                        // export * as ns from "specifier";
                        Some(exported) => {
                            record.namespace_reexport(specifier, exported.name().as_str());
                        }
                        // export * from "specifier";
                        None => {
                            record.export_all(specifier);
                        }
                    }
                }
                ast::ModuleDeclaration::ExportDefaultDeclaration(decl) => match &decl.declaration {
                    ast::ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                        let local_name = function
                            .id
                            .as_ref()
                            .map_or("*default*", |id| id.name.as_str());
                        record.hoisted_export("default", local_name);
                    }
                    ast::ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        let local_name = class
                            .id
                            .as_ref()
                            .map_or("*default*", |id| id.name.as_str());
                        record.fixed_export("default", local_name);
                    }
                    ast::ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {}
                    _ => {
                        record.fixed_export("default", "*default*");
                    }
                },
                ast::ModuleDeclaration::ExportNamedDeclaration(decl) => {
                    if decl.export_kind.is_type() {
                        continue;
                    }
                    if let Some(source) = &decl.source {
                        // export { a, b as c } from "specifier";
                        let specifier = source.value.as_str();
                        record.import(specifier, &[]);
                        for entry in decl.specifiers.iter() {
                            if entry.export_kind.is_type() {
                                continue;
                            }
                            record.reexport(
                                specifier,
                                entry.local.name().as_str(),
                                entry.exported.name().as_str(),
                            );
                        }
                    } else if let Some(declaration) = &decl.declaration {
                        Self::export_declaration(&mut record, declaration);
                    } else {
                        // export { a, b as c };
                        for entry in decl.specifiers.iter() {
                            if entry.export_kind.is_type() {
                                continue;
                            }
                            let local_name = entry.local.name();
                            let export_name = entry.exported.name();
                            match imported
                                .iter()
                                .find(|binding| binding.local_name == local_name.as_str())
                            {
                                // Re-export of an imported binding.
                                Some(ImportedLocal {
                                    specifier,
                                    import_name: Some(import_name),
                                    ..
                                }) => {
                                    record.reexport(specifier, import_name, export_name.as_str());
                                }
                                Some(ImportedLocal {
                                    specifier,
                                    import_name: None,
                                    ..
                                }) => {
                                    record.namespace_reexport(specifier, export_name.as_str());
                                }
                                None => {
                                    record.live_export(export_name.as_str(), local_name.as_str());
                                }
                            }
                        }
                    }
                }
                ast::ModuleDeclaration::TSExportAssignment(_)
                | ast::ModuleDeclaration::TSNamespaceExportDeclaration(_) => {
                    diagnostics.push(
                        OxcDiagnostic::error("CommonJS style exports are not supported in modules")
                            .with_label(decl.span()),
                    );
                }
            }
        }

        let record = record.build();
        for name in record.duplicate_exports() {
            diagnostics.push(OxcDiagnostic::error(format!(
                "Duplicated export '{name}'"
            )));
        }
        if !diagnostics.is_empty() {
            return Err(AnalysisError::new(location, diagnostics));
        }
        debug!(
            module = %location,
            imports = record.imports.len(),
            exports = record.exports.len() + record.reexports.len(),
            star_exports = record.export_alls.len(),
            "analyzed module"
        );
        Ok(record)
    }

    /// export var d;
    /// export let e;
    /// export const f;
    /// export function g() {}
    /// export class H {}
    fn export_declaration(record: &mut StaticModuleRecord, declaration: &ast::Declaration<'_>) {
        match declaration {
            ast::Declaration::VariableDeclaration(variable) => {
                let fixed = matches!(variable.kind, ast::VariableDeclarationKind::Const);
                variable.bound_names(&mut |name| {
                    let name = name.name.as_str();
                    if fixed {
                        record.fixed_export(name, name);
                    } else {
                        record.live_export(name, name);
                    }
                });
            }
            ast::Declaration::FunctionDeclaration(function) => {
                if let Some(id) = &function.id {
                    record.hoisted_export(id.name.as_str(), id.name.as_str());
                }
            }
            ast::Declaration::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    record.fixed_export(id.name.as_str(), id.name.as_str());
                }
            }
            // Type declarations have no runtime binding.
            _ => {}
        }
    }
}

impl Analyze for ModuleAnalyzer {
    fn analyze(
        &self,
        source: &ModuleSource,
        location: &ModuleLocation,
    ) -> Result<StaticModuleRecord, AnalysisError> {
        self.analyze_text(&source.text, location)
    }
}
