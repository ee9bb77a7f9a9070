// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [10.4.6 Module Namespace Exotic Objects](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects)
//!
//! A namespace is a read view over the binding cells backing a module's
//! exported names. The key set is fixed once the module is instantiated;
//! every read dereferences the cell, so writes to live exports are observed.

use std::{cmp::Ordering, fmt, rc::Rc};

use crate::{
    error::UninitializedBindingError,
    module::{BindingCell, ModuleLocation},
    value::Value,
};

#[derive(Clone)]
pub struct Namespace(Rc<NamespaceData>);

struct NamespaceData {
    location: ModuleLocation,
    /// Sorted by [`compare_code_units`] on the key.
    entries: Box<[(Box<str>, Rc<BindingCell>)]>,
}

/// Orders strings by their UTF-16 code units, which is how ECMAScript sorts
/// property keys. This differs from `str` ordering for characters outside
/// the Basic Multilingual Plane.
pub fn compare_code_units(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

impl Namespace {
    pub(crate) fn new(
        location: ModuleLocation,
        mut entries: Vec<(Box<str>, Rc<BindingCell>)>,
    ) -> Self {
        entries.sort_by(|(a, _), (b, _)| compare_code_units(a, b));
        entries.dedup_by(|(a, _), (b, _)| a == b);
        Self(Rc::new(NamespaceData {
            location,
            entries: entries.into_boxed_slice(),
        }))
    }

    /// The module this namespace belongs to.
    pub fn location(&self) -> &ModuleLocation {
        &self.0.location
    }

    /// ### [10.4.6.11 \[\[OwnPropertyKeys\]\] ( )](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects-ownpropertykeys)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.entries.iter().map(|(key, _)| &**key)
    }

    pub fn len(&self) -> usize {
        self.0.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.entries.is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// ### [10.4.6.8 \[\[Get\]\] ( P, Receiver )](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects-get-p-receiver)
    ///
    /// Keys that are not exported read as `undefined`. Exported keys whose
    /// binding has not been initialized yet are in their temporal dead zone.
    pub fn get(&self, key: &str) -> Result<Value, UninitializedBindingError> {
        // 1. If P is a Symbol, then ...
        // 2. Let exports be O.[[Exports]].
        // 3. If exports does not contain P, return undefined.
        let Some(cell) = self.find(key) else {
            return Ok(Value::Undefined);
        };
        // 4-11. Let targetEnv be ...; return ? targetEnv.GetBindingValue(binding.[[BindingName]], true).
        cell.get()
            .ok_or_else(|| UninitializedBindingError::new(&self.0.location, key))
    }

    /// Snapshot of every key with its current value; fails on the first key
    /// still in its temporal dead zone.
    pub fn entries(&self) -> Result<Vec<(Box<str>, Value)>, UninitializedBindingError> {
        self.keys()
            .map(|key| Ok((key.into(), self.get(key)?)))
            .collect()
    }

    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn find(&self, key: &str) -> Option<&Rc<BindingCell>> {
        self.0
            .entries
            .binary_search_by(|(probe, _)| compare_code_units(probe, key))
            .ok()
            .map(|index| &self.0.entries[index].1)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, cell) in self.0.entries.iter() {
            match cell.get() {
                Some(value) => map.entry(key, &value),
                None => map.entry(key, &format_args!("<uninitialized>")),
            };
        }
        map.finish()
    }
}
