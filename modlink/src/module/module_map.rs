// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    cell::{OnceCell, Ref, RefCell},
    fmt,
    rc::Rc,
};

use ahash::AHashMap;
use tracing::trace;

use crate::{
    error::Error,
    host::Endowments,
    module::{BindingCell, LinkageRecord, ModuleLocation, Namespace},
};

/// Index of a [`ModuleInstance`] in its [`ModuleMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(u32);

impl ModuleId {
    /// Creates a module identifier from a usize.
    ///
    /// ## Panics
    /// If the given index is greater than `u32::MAX`.
    pub(crate) const fn from_index(value: usize) -> Self {
        assert!(value <= u32::MAX as usize);
        Self(value as u32)
    }

    pub const fn into_index(self) -> usize {
        self.0 as usize
    }
}

/// Position of a module in the depth-first traversal of a link or evaluate
/// pass.
pub(crate) type DfsIndex = u32;

/// ### [16.2.1.6 Cyclic Module Records](https://tc39.es/ecma262/#sec-cyclic-module-records)
///
/// `Instantiating -> Instantiated -> Evaluating -> Evaluated`, or `Errored`
/// from any state. The traversal indices only exist while the module sits on
/// the stack of the corresponding pass.
#[derive(Debug, Clone)]
pub enum ModuleStatus {
    Instantiating {
        dfs_index: DfsIndex,
        dfs_ancestor_index: DfsIndex,
    },
    Instantiated,
    Evaluating {
        dfs_index: DfsIndex,
        dfs_ancestor_index: DfsIndex,
    },
    Evaluated,
    Errored(Error),
}

impl ModuleStatus {
    /// Namespaces are only stable once every dependency has been loaded.
    pub fn is_linked(&self) -> bool {
        matches!(
            self,
            ModuleStatus::Instantiated | ModuleStatus::Evaluating { .. } | ModuleStatus::Evaluated
        )
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            ModuleStatus::Errored(error) => Some(error),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModuleStatus::Instantiating { .. } => "instantiating",
            ModuleStatus::Instantiated => "instantiated",
            ModuleStatus::Evaluating { .. } => "evaluating",
            ModuleStatus::Evaluated => "evaluated",
            ModuleStatus::Errored(_) => "errored",
        }
    }
}

/// The single instance of a module within an importer session.
pub struct ModuleInstance {
    id: ModuleId,
    record: LinkageRecord,
    /// One cell per exported local name.
    cells: Box<[Rc<BindingCell>]>,
    /// Holds this module's own namespace object once it has been created, so
    /// that `export * as ns` and `import * as ns` resolve to a binding.
    namespace_cell: Rc<BindingCell>,
    loaded_modules: RefCell<Vec<(Box<str>, ModuleId)>>,
    status: RefCell<ModuleStatus>,
    endowments: Endowments,
    namespace: OnceCell<Namespace>,
}

impl ModuleInstance {
    pub(crate) fn new(
        id: ModuleId,
        record: LinkageRecord,
        endowments: Endowments,
        status: ModuleStatus,
    ) -> Self {
        let mut cells: Vec<Rc<BindingCell>> = Vec::with_capacity(record.exports.len());
        for entry in record.exports.iter() {
            let local_name = entry.binding.local_name();
            if cells.iter().any(|cell| cell.local_name() == local_name) {
                continue;
            }
            cells.push(BindingCell::new(local_name, entry.binding.is_live()));
        }
        Self {
            id,
            record,
            cells: cells.into_boxed_slice(),
            namespace_cell: BindingCell::new("*namespace*", false),
            loaded_modules: RefCell::new(Vec::new()),
            status: RefCell::new(status),
            endowments,
            namespace: OnceCell::new(),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn record(&self) -> &LinkageRecord {
        &self.record
    }

    pub fn location(&self) -> &ModuleLocation {
        &self.record.module_location
    }

    pub fn endowments(&self) -> &Endowments {
        &self.endowments
    }

    pub fn status(&self) -> Ref<'_, ModuleStatus> {
        self.status.borrow()
    }

    pub(crate) fn set_status(&self, status: ModuleStatus) {
        trace!(
            module = %self.location(),
            from = self.status.borrow().name(),
            to = status.name(),
            "module status"
        );
        self.status.replace(status);
    }

    /// The cell backing the local binding `local_name`.
    pub fn cell(&self, local_name: &str) -> Option<&Rc<BindingCell>> {
        self.cells
            .iter()
            .find(|cell| cell.local_name() == local_name)
    }

    pub fn cells(&self) -> &[Rc<BindingCell>] {
        &self.cells
    }

    pub(crate) fn namespace_cell(&self) -> &Rc<BindingCell> {
        &self.namespace_cell
    }

    pub(crate) fn namespace_slot(&self) -> &OnceCell<Namespace> {
        &self.namespace
    }

    /// ### [16.2.1.9 GetImportedModule ( referrer, request )](https://tc39.es/ecma262/#sec-GetImportedModule)
    pub fn loaded_module(&self, specifier: &str) -> Option<ModuleId> {
        self.loaded_modules
            .borrow()
            .iter()
            .find(|(s, _)| &**s == specifier)
            .map(|(_, id)| *id)
    }

    /// Dependencies in the order they were linked.
    pub fn loaded_modules(&self) -> Vec<(Box<str>, ModuleId)> {
        self.loaded_modules.borrow().clone()
    }

    pub(crate) fn push_loaded_module(&self, specifier: &str, module: ModuleId) {
        self.loaded_modules
            .borrow_mut()
            .push((specifier.into(), module));
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("id", &self.id)
            .field("location", self.location())
            .field("status", &self.status.borrow())
            .field("loaded_modules", &self.loaded_modules.borrow())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum ModuleEntry {
    Instance(ModuleId),
    /// The location could not be loaded; no instance was ever created.
    Failed(Error),
}

/// Outcome of looking a location up in the [`ModuleMap`].
#[derive(Debug, Clone)]
pub enum ModuleLookup {
    Instance(Rc<ModuleInstance>),
    Failed(Error),
}

/// Arena of module instances plus the location memo table of a session.
#[derive(Default)]
pub struct ModuleMap {
    modules: RefCell<Vec<Rc<ModuleInstance>>>,
    locations: RefCell<AHashMap<ModuleLocation, ModuleEntry>>,
}

impl ModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ModuleId) -> Rc<ModuleInstance> {
        self.modules
            .borrow()
            .get(id.into_index())
            .expect("ModuleId out of bounds")
            .clone()
    }

    pub fn lookup(&self, location: &ModuleLocation) -> Option<ModuleLookup> {
        let entry = self.locations.borrow().get(location).cloned()?;
        Some(match entry {
            ModuleEntry::Instance(id) => ModuleLookup::Instance(self.get(id)),
            ModuleEntry::Failed(error) => ModuleLookup::Failed(error),
        })
    }

    /// Allocates the instance for a location not yet in the map.
    pub(crate) fn insert(
        &self,
        create: impl FnOnce(ModuleId) -> ModuleInstance,
    ) -> Rc<ModuleInstance> {
        let mut modules = self.modules.borrow_mut();
        let id = ModuleId::from_index(modules.len());
        let instance = Rc::new(create(id));
        let previous = self
            .locations
            .borrow_mut()
            .insert(instance.location().clone(), ModuleEntry::Instance(id));
        debug_assert!(
            !matches!(previous, Some(ModuleEntry::Instance(_))),
            "{} instantiated twice",
            instance.location()
        );
        modules.push(instance.clone());
        instance
    }

    pub(crate) fn insert_failure(&self, location: &ModuleLocation, error: Error) {
        self.locations
            .borrow_mut()
            .insert(location.clone(), ModuleEntry::Failed(error));
    }

    /// Forgets the memo entry of `location`. The instance, if any, stays in
    /// the arena so identifiers held elsewhere remain valid.
    pub(crate) fn evict(&self, location: &ModuleLocation) -> bool {
        self.locations.borrow_mut().remove(location).is_some()
    }

    pub fn len(&self) -> usize {
        self.modules.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.borrow().is_empty()
    }

    /// Every instance ever created, in creation order.
    pub fn instances(&self) -> Vec<Rc<ModuleInstance>> {
        self.modules.borrow().clone()
    }

    /// `root` and its transitive dependencies, each listed after all of its
    /// dependencies that are not part of a cycle with it.
    pub fn post_order(&self, root: ModuleId) -> Vec<ModuleId> {
        fn visit(
            modules: &ModuleMap,
            id: ModuleId,
            order: &mut Vec<ModuleId>,
            seen: &mut Vec<ModuleId>,
        ) {
            if seen.contains(&id) {
                return;
            }
            seen.push(id);
            for (_, dependency) in modules.get(id).loaded_modules() {
                visit(modules, dependency, order, seen);
            }
            order.push(id);
        }
        let mut order = Vec::new();
        visit(self, root, &mut order, &mut Vec::new());
        order
    }
}

impl fmt::Debug for ModuleMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.modules.borrow().iter()).finish()
    }
}
