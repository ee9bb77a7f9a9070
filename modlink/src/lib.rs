// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # modlink
//!
//! A pluggable module linking engine. Given an entry specifier, the
//! [`Importer`] resolves, retrieves, statically analyzes and links a graph of
//! modules (cycles included) into live namespace objects, executing every
//! module body exactly once through a host supplied [`Evaluator`].
//!
//! The engine itself never touches syntax or I/O: those are the collaborator
//! traits in [`host`]. Built-in implementations cover URL resolution against
//! a root, suffix location, per-scheme retrieval and static analysis of
//! ECMAScript module source.
//!
//! Linking follows the two phase protocol of cyclic module records: the
//! instantiate phase allocates a [`BindingCell`] for every exported binding
//! of every module in the graph, and the evaluate phase runs module bodies in
//! dependency order, propagating writes to live exports to every importer.

pub mod error;
pub mod host;
pub mod importer;
pub mod linker;
pub mod module;
pub mod value;

pub use error::{
    AnalysisError, Error, FunctorEvaluationError, LinkError, LinkErrorKind, ResolutionError,
    Result, RetrievalError, RetrievalErrorKind, UninitializedBindingError,
};
pub use host::{
    Analyze, Endowments, EvaluateOptions, Evaluator, FileRetriever, Functor, Locate,
    MemoryRetriever, ModuleAnalyzer, ModuleSource, ProtocolRetriever, Resolve, Retrieve,
    RootedResolver, SuffixLocator, TypeAnalyzer, functor,
};
pub use importer::{Importer, ImporterHooks, ImporterOptions};
pub use linker::{
    FunctorError, FunctorScope, ImportedBinding, Linker, LiveVar, OnceVar, Subscriptions,
};
pub use module::{
    BindingCell, ExportBinding, ExportEntry, ImportEntry, LinkageRecord, ModuleId,
    ModuleInstance, ModuleLocation, ModuleLookup, ModuleMap, ModuleStatus, Namespace,
    ReexportEntry, ReexportImportName, RetrievableLocation, StaticModuleRecord,
};
pub use value::{Function, Value};
