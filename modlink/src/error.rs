// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Errors surfaced by the importer and linker.
//!
//! Every error is [`Clone`]: a module that fails keeps its error and replays
//! the same value to all later importers of its location.

use std::{io, rc::Rc, sync::Arc};

use oxc_diagnostics::OxcDiagnostic;
use thiserror::Error;

use crate::{
    module::{ModuleLocation, RetrievableLocation},
    value::Value,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    UninitializedBinding(#[from] UninitializedBindingError),
    #[error(transparent)]
    FunctorEvaluation(#[from] FunctorEvaluationError),
}

/// A specifier could not be interpreted relative to its referrer.
#[derive(Debug, Clone, Error)]
#[error("cannot resolve {specifier:?} from {referrer}: {reason}")]
pub struct ResolutionError {
    pub specifier: Box<str>,
    pub referrer: ModuleLocation,
    pub reason: Box<str>,
}

impl ResolutionError {
    pub fn new(specifier: &str, referrer: &ModuleLocation, reason: impl ToString) -> Self {
        Self {
            specifier: specifier.into(),
            referrer: referrer.clone(),
            reason: reason.to_string().into_boxed_str(),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("cannot retrieve {location}: {kind}")]
pub struct RetrievalError {
    pub location: RetrievableLocation,
    pub kind: RetrievalErrorKind,
}

impl RetrievalError {
    pub fn new(location: &RetrievableLocation, kind: RetrievalErrorKind) -> Self {
        Self {
            location: location.clone(),
            kind,
        }
    }

    pub fn not_found(location: &RetrievableLocation) -> Self {
        Self::new(location, RetrievalErrorKind::NotFound)
    }
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalErrorKind {
    #[error("not found")]
    NotFound,
    #[error("no retriever for scheme {0:?}")]
    UnsupportedScheme(Box<str>),
    #[error(transparent)]
    Transport(Arc<io::Error>),
}

impl From<io::Error> for RetrievalErrorKind {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Transport(Arc::new(error)),
        }
    }
}

/// The analyzer could not classify the retrieved source.
#[derive(Debug, Clone, Error)]
#[error("cannot analyze {location}: {}", diagnostic_summary(.diagnostics))]
pub struct AnalysisError {
    pub location: ModuleLocation,
    pub diagnostics: Rc<[OxcDiagnostic]>,
}

impl AnalysisError {
    pub fn new(location: &ModuleLocation, diagnostics: Vec<OxcDiagnostic>) -> Self {
        Self {
            location: location.clone(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn message(location: &ModuleLocation, message: impl Into<String>) -> Self {
        Self::new(location, vec![OxcDiagnostic::error(message.into())])
    }
}

fn diagnostic_summary(diagnostics: &[OxcDiagnostic]) -> String {
    match diagnostics {
        [] => "unknown error".to_owned(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkErrorKind {
    #[error("does not export")]
    MissingExport,
    #[error("ambiguously exports")]
    AmbiguousExport,
    #[error("has no dependency for specifier")]
    UnknownSpecifier,
    #[error("has no exported local binding")]
    UnknownLocalBinding,
}

/// A requested binding does not exist in the target module's exports.
///
/// `location` is the module that made the request. For
/// [`LinkErrorKind::UnknownLocalBinding`] the specifier is empty.
#[derive(Debug, Clone, Error)]
#[error("{location}: {specifier:?} {kind} {name:?}")]
pub struct LinkError {
    pub location: ModuleLocation,
    pub specifier: Box<str>,
    pub name: Box<str>,
    pub kind: LinkErrorKind,
}

impl LinkError {
    pub(crate) fn new(
        location: &ModuleLocation,
        specifier: &str,
        name: &str,
        kind: LinkErrorKind,
    ) -> Self {
        Self {
            location: location.clone(),
            specifier: specifier.into(),
            name: name.into(),
            kind,
        }
    }
}

/// A declared binding was read before its module assigned it.
#[derive(Debug, Clone, Error)]
#[error("cannot access {name:?} of {location} before initialization")]
pub struct UninitializedBindingError {
    pub location: ModuleLocation,
    pub name: Box<str>,
}

impl UninitializedBindingError {
    pub(crate) fn new(location: &ModuleLocation, name: &str) -> Self {
        Self {
            location: location.clone(),
            name: name.into(),
        }
    }
}

/// The module body raised while executing.
#[derive(Debug, Clone, Error)]
#[error("{location} threw {thrown}")]
pub struct FunctorEvaluationError {
    pub location: ModuleLocation,
    pub thrown: Value,
}
