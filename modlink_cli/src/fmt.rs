// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt::{self, Write};

use modlink::{ExportBinding, ModuleInstance, ReexportImportName, StaticModuleRecord};

/// Human readable rendering of the import and export tables of a module.
pub fn write_record(out: &mut impl Write, record: &StaticModuleRecord) -> fmt::Result {
    writeln!(out, "imports:")?;
    for entry in record.imports.iter() {
        if entry.names.is_empty() {
            writeln!(out, "  {:?}", entry.specifier)?;
        } else {
            writeln!(out, "  {:?}: {}", entry.specifier, entry.names.join(", "))?;
        }
    }
    writeln!(out, "exports:")?;
    for entry in record.exports.iter() {
        let kind = match &entry.binding {
            ExportBinding::Fixed { .. } => "fixed",
            ExportBinding::Live { hoisted: true, .. } => "live, hoisted",
            ExportBinding::Live { .. } => "live",
        };
        writeln!(
            out,
            "  {} <- {} ({kind})",
            entry.export_name,
            entry.binding.local_name()
        )?;
    }
    for entry in record.reexports.iter() {
        match &entry.import_name {
            ReexportImportName::Name(name) => writeln!(
                out,
                "  {} <- {name} from {:?}",
                entry.export_name, entry.specifier
            )?,
            ReexportImportName::NamespaceObject => writeln!(
                out,
                "  {} <- * from {:?}",
                entry.export_name, entry.specifier
            )?,
        }
    }
    for specifier in record.export_alls.iter() {
        writeln!(out, "  * from {specifier:?}")?;
    }
    Ok(())
}

/// One line per module: status, location and its dependencies.
pub fn write_module(out: &mut impl Write, instance: &ModuleInstance) -> fmt::Result {
    write!(
        out,
        "{:>12} {}",
        instance.status().name(),
        instance.location()
    )?;
    let dependencies = instance.record().module_locations.len();
    if dependencies > 0 {
        write!(out, " ({dependencies} dependencies)")?;
    }
    writeln!(out)
}
