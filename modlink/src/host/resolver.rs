// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::trace;
use url::Url;

use crate::{error::ResolutionError, host::Resolve, module::ModuleLocation};

/// Resolves specifiers as URLs confined to a root.
///
/// - `./x`, `../x` and `/x` are resolved against the referrer.
/// - Absolute URLs are taken as is.
/// - Bare specifiers are resolved against the root.
///
/// Anything that resolves outside the root is refused.
#[derive(Debug, Clone)]
pub struct RootedResolver {
    root: Url,
}

impl RootedResolver {
    /// A root without a trailing slash is treated as a directory.
    pub fn new(root: Url) -> Self {
        let mut root = root;
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        Self { root }
    }

    pub fn parse(root: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(root)?))
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Location of the root directory itself, usable as the referrer of
    /// entry specifiers.
    pub fn root_location(&self) -> ModuleLocation {
        ModuleLocation::from(self.root.as_str())
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

impl Resolve for RootedResolver {
    fn resolve(
        &self,
        referrer: &ModuleLocation,
        specifier: &str,
    ) -> Result<ModuleLocation, ResolutionError> {
        let resolved = if is_relative(specifier) {
            let base = Url::parse(referrer.as_str())
                .map_err(|error| ResolutionError::new(specifier, referrer, error))?;
            base.join(specifier)
        } else {
            match Url::parse(specifier) {
                Ok(url) => Ok(url),
                Err(url::ParseError::RelativeUrlWithoutBase) => self.root.join(specifier),
                Err(error) => Err(error),
            }
        }
        .map_err(|error| ResolutionError::new(specifier, referrer, error))?;
        if !resolved.as_str().starts_with(self.root.as_str()) {
            return Err(ResolutionError::new(
                specifier,
                referrer,
                format!("{resolved} is outside of {}", self.root),
            ));
        }
        trace!(%referrer, specifier, %resolved, "resolved");
        Ok(ModuleLocation::from(String::from(resolved)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn resolver() -> RootedResolver {
        RootedResolver::parse("https://example.com").unwrap()
    }

    #[test]
    fn relative_specifiers_resolve_against_referrer() {
        let resolved = resolver()
            .resolve(&"https://example.com/foo/abc".into(), "./def")
            .unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/foo/def");
        let resolved = resolver()
            .resolve(&"https://example.com/foo/abc".into(), "../bar/ghi")
            .unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/bar/ghi");
        let resolved = resolver()
            .resolve(&"https://example.com/foo/abc".into(), "/top")
            .unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/top");
    }

    #[test]
    fn bare_specifiers_resolve_against_root() {
        let resolver = RootedResolver::parse("https://example.com/lib").unwrap();
        assert_eq!(resolver.root().as_str(), "https://example.com/lib/");
        let resolved = resolver
            .resolve(&"https://example.com/lib/a/b".into(), "pkg/main")
            .unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/lib/pkg/main");
    }

    #[test]
    fn escaping_the_root_is_an_error() {
        let resolver = RootedResolver::parse("https://example.com/lib/").unwrap();
        let error = resolver
            .resolve(&"https://example.com/lib/a".into(), "../../etc/passwd")
            .unwrap_err();
        assert_eq!(&*error.specifier, "../../etc/passwd");
        assert!(
            resolver
                .resolve(&"https://example.com/lib/a".into(), "https://evil.com/x")
                .is_err()
        );
    }

    #[test]
    fn unparsable_referrer_is_an_error() {
        assert!(resolver().resolve(&"not a url".into(), "./x").is_err());
    }
}
