// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{cell::RefCell, fs};

use ahash::AHashMap;
use tracing::debug;
use url::Url;

use crate::{
    error::{RetrievalError, RetrievalErrorKind},
    host::Retrieve,
    module::RetrievableLocation,
};

/// Retrieved source text, tagged with the kind of analysis it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub kind: Box<str>,
    pub text: Box<str>,
}

impl ModuleSource {
    pub const MODULE: &'static str = "module";

    /// ECMAScript module source.
    pub fn module(text: &str) -> Self {
        Self {
            kind: Self::MODULE.into(),
            text: text.into(),
        }
    }
}

/// Dispatches retrieval on the scheme of the location.
#[derive(Default)]
pub struct ProtocolRetriever {
    handlers: AHashMap<Box<str>, Box<dyn Retrieve>>,
}

impl ProtocolRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `scheme`, given with or without its trailing
    /// colon.
    pub fn with(mut self, scheme: &str, handler: impl Retrieve + 'static) -> Self {
        let scheme = scheme.strip_suffix(':').unwrap_or(scheme);
        self.handlers
            .insert(scheme.to_ascii_lowercase().into(), Box::new(handler));
        self
    }
}

impl Retrieve for ProtocolRetriever {
    fn retrieve(&self, location: &RetrievableLocation) -> Result<ModuleSource, RetrievalError> {
        let scheme = match location.as_str().split_once(':') {
            Some((scheme, _)) => scheme.to_ascii_lowercase(),
            None => String::new(),
        };
        let Some(handler) = self.handlers.get(scheme.as_str()) else {
            return Err(RetrievalError::new(
                location,
                RetrievalErrorKind::UnsupportedScheme(scheme.into()),
            ));
        };
        handler.retrieve(location)
    }
}

/// Reads `file:` URLs from the file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRetriever;

impl Retrieve for FileRetriever {
    fn retrieve(&self, location: &RetrievableLocation) -> Result<ModuleSource, RetrievalError> {
        let path = Url::parse(location.as_str())
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| {
                RetrievalError::new(
                    location,
                    RetrievalErrorKind::UnsupportedScheme(
                        location.as_str().split(':').next().unwrap_or_default().into(),
                    ),
                )
            })?;
        debug!(path = %path.display(), "reading module source");
        let text = fs::read_to_string(&path)
            .map_err(|error| RetrievalError::new(location, error.into()))?;
        Ok(ModuleSource::module(&text))
    }
}

/// In-memory sources keyed by location.
#[derive(Debug, Default)]
pub struct MemoryRetriever {
    sources: RefCell<AHashMap<RetrievableLocation, ModuleSource>>,
}

impl MemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, location: &str, text: &str) -> Self {
        self.insert(location, ModuleSource::module(text));
        self
    }

    pub fn insert(&self, location: &str, source: ModuleSource) {
        self.sources
            .borrow_mut()
            .insert(RetrievableLocation::from(location), source);
    }

    pub fn remove(&self, location: &str) -> Option<ModuleSource> {
        self.sources.borrow_mut().remove(location)
    }
}

impl Retrieve for MemoryRetriever {
    fn retrieve(&self, location: &RetrievableLocation) -> Result<ModuleSource, RetrievalError> {
        self.sources
            .borrow()
            .get(location)
            .cloned()
            .ok_or_else(|| RetrievalError::not_found(location))
    }
}
