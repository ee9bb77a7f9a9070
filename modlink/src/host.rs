// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## Host collaborators
//!
//! The importer knows nothing about URLs, I/O or syntax. Each of those
//! concerns is a trait implemented by the embedder; closures with the right
//! shape implement them too.

mod analyzer;
mod evaluator;
mod locator;
mod resolver;
mod retriever;

pub use analyzer::{ModuleAnalyzer, TypeAnalyzer};
pub use evaluator::{Endowments, EvaluateOptions, Evaluator, Functor, functor};
pub use locator::SuffixLocator;
pub use resolver::RootedResolver;
pub use retriever::{FileRetriever, MemoryRetriever, ModuleSource, ProtocolRetriever};

use crate::{
    error::{AnalysisError, ResolutionError, RetrievalError},
    module::{ModuleLocation, RetrievableLocation, StaticModuleRecord},
};

/// Maps a specifier, as written in the referrer, to a canonical location.
pub trait Resolve {
    fn resolve(
        &self,
        referrer: &ModuleLocation,
        specifier: &str,
    ) -> Result<ModuleLocation, ResolutionError>;
}

impl<F> Resolve for F
where
    F: Fn(&ModuleLocation, &str) -> Result<ModuleLocation, ResolutionError>,
{
    fn resolve(
        &self,
        referrer: &ModuleLocation,
        specifier: &str,
    ) -> Result<ModuleLocation, ResolutionError> {
        self(referrer, specifier)
    }
}

/// Maps a canonical location to where its source can be retrieved from.
pub trait Locate {
    fn locate(&self, location: &ModuleLocation) -> RetrievableLocation;
}

impl<F> Locate for F
where
    F: Fn(&ModuleLocation) -> RetrievableLocation,
{
    fn locate(&self, location: &ModuleLocation) -> RetrievableLocation {
        self(location)
    }
}

pub trait Retrieve {
    fn retrieve(&self, location: &RetrievableLocation) -> Result<ModuleSource, RetrievalError>;
}

impl<F> Retrieve for F
where
    F: Fn(&RetrievableLocation) -> Result<ModuleSource, RetrievalError>,
{
    fn retrieve(&self, location: &RetrievableLocation) -> Result<ModuleSource, RetrievalError> {
        self(location)
    }
}

/// Static analysis of retrieved source. Must return the same record for the
/// same source, since its output is cached per location.
pub trait Analyze {
    fn analyze(
        &self,
        source: &ModuleSource,
        location: &ModuleLocation,
    ) -> Result<StaticModuleRecord, AnalysisError>;
}

impl<F> Analyze for F
where
    F: Fn(&ModuleSource, &ModuleLocation) -> Result<StaticModuleRecord, AnalysisError>,
{
    fn analyze(
        &self,
        source: &ModuleSource,
        location: &ModuleLocation,
    ) -> Result<StaticModuleRecord, AnalysisError> {
        self(source, location)
    }
}
