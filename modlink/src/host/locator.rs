// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::Url;

use crate::{
    host::Locate,
    module::{ModuleLocation, RetrievableLocation},
};

/// Appends a file suffix such as `.js` to the path of a location, unless the
/// path already ends with it. Query and fragment are left in place.
#[derive(Debug, Clone)]
pub struct SuffixLocator {
    suffix: Box<str>,
}

impl SuffixLocator {
    pub fn new(suffix: &str) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Locate for SuffixLocator {
    fn locate(&self, location: &ModuleLocation) -> RetrievableLocation {
        match Url::parse(location.as_str()) {
            Ok(mut url) => {
                if !url.path().ends_with(&*self.suffix) {
                    let path = format!("{}{}", url.path(), self.suffix);
                    url.set_path(&path);
                }
                RetrievableLocation::from(String::from(url))
            }
            // Not a URL: treat the whole location as a path.
            Err(_) if location.as_str().ends_with(&*self.suffix) => {
                RetrievableLocation::from(location.as_str())
            }
            Err(_) => RetrievableLocation::from(format!("{location}{}", self.suffix)),
        }
    }
}
