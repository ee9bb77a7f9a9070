// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{borrow::Borrow, fmt, rc::Rc};

macro_rules! location_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Rc<str>);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.into())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value.into())
            }
        }
    };
}

location_type! {
    /// Canonical identity of a module: two specifiers that resolve to the
    /// same location are the same module.
    ModuleLocation
}

location_type! {
    /// Where the source text of a module can be fetched, as produced by a
    /// locator from a [`ModuleLocation`].
    RetrievableLocation
}

#[cfg(test)]
mod tests {
    use ahash::AHashMap;

    use super::*;

    #[test]
    fn locations_are_keyed_by_text() {
        let mut map = AHashMap::new();
        map.insert(ModuleLocation::from("https://example.com/abc"), 1);
        assert_eq!(map.get("https://example.com/abc"), Some(&1));
        assert_eq!(
            ModuleLocation::from(String::from("x")),
            ModuleLocation::from("x")
        );
    }
}
