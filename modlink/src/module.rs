// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Module records, instances and the bindings they export.

mod binding_cell;
mod exports;
mod linkage_record;
mod location;
mod module_map;
mod namespace;

pub use binding_cell::{BindingCell, Receiver};
pub use exports::ResolvedExport;
pub use linkage_record::{
    ExportBinding, ExportEntry, ImportEntry, LinkageRecord, ReexportEntry, ReexportImportName,
    StaticModuleRecord,
};
pub use location::{ModuleLocation, RetrievableLocation};
pub(crate) use module_map::DfsIndex;
pub use module_map::{ModuleId, ModuleInstance, ModuleLookup, ModuleMap, ModuleStatus};
pub use namespace::{Namespace, compare_code_units};
