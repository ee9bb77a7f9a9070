// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::value::Value;

/// Callback notified with the new value on every write to a cell.
pub type Receiver = Rc<dyn Fn(&Value)>;

/// Storage for one exported local binding.
///
/// A cell starts uninitialized and becomes initialized on its first write;
/// it never goes back. Every write notifies the registered observers in
/// subscription order.
pub struct BindingCell {
    local_name: Box<str>,
    mutable: bool,
    value: RefCell<Option<Value>>,
    observers: RefCell<Vec<Receiver>>,
}

impl BindingCell {
    pub(crate) fn new(local_name: &str, mutable: bool) -> Rc<Self> {
        Rc::new(Self {
            local_name: local_name.into(),
            mutable,
            value: RefCell::new(None),
            observers: RefCell::new(Vec::new()),
        })
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Whether the cell backs a live export.
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn is_initialized(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// The current value, or `None` while in the temporal dead zone.
    pub fn get(&self) -> Option<Value> {
        self.value.borrow().clone()
    }

    /// Set and notify.
    pub(crate) fn set(&self, value: Value) {
        debug_assert!(
            self.mutable || !self.is_initialized(),
            "fixed binding {:?} written twice",
            self.local_name
        );
        self.value.replace(Some(value.clone()));
        // Observers may subscribe to or write other cells; never hold a
        // borrow across the callbacks.
        let observers = self.observers.borrow().clone();
        for observer in observers {
            observer(&value);
        }
    }

    /// Registers `receiver` for every future write and, if the cell already
    /// holds a value, delivers it immediately.
    pub(crate) fn subscribe(&self, receiver: Receiver) {
        self.observers.borrow_mut().push(receiver.clone());
        let current = self.get();
        if let Some(value) = current {
            receiver(&value);
        }
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }
}

impl fmt::Debug for BindingCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingCell")
            .field("local_name", &self.local_name)
            .field("mutable", &self.mutable)
            .field("value", &self.value.borrow())
            .field("observers", &self.observer_count())
            .finish()
    }
}
