// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use hashbrown::HashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::{BindingId, Instance, TypeName};

/// How long a resolved instance lives and who shares it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// A new instance, with a freshly resolved dependency graph, on every resolution.
    Transient,
    /// One instance per container, built against the root scope.
    Singleton,
    /// One instance per scope.
    Scoped,
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transient => "transient",
            Self::Singleton => "singleton",
            Self::Scoped => "scoped",
        })
    }
}

/// Identity of a cached instance: the binding plus the specialized service type.
///
/// The service type matters for open generic bindings, where one binding yields a distinct
/// instance per closed service type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SlotKey {
    pub(crate) binding: BindingId,
    pub(crate) service: TypeName,
}

type Slot = Arc<OnceCell<Instance>>;

/// At-most-once instance storage of one scope.
///
/// The map lock is held only to find or insert a slot. Construction happens inside the slot's
/// cell, so concurrent first requests for the same slot block on a single winner while requests
/// for other slots proceed.
#[derive(Debug, Default)]
pub(crate) struct LifetimeCache {
    slots: RwLock<HashMap<SlotKey, Slot>>,
}

impl LifetimeCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the cached instance for `key`, constructing it with `factory` on first use.
    ///
    /// A failing factory leaves the slot empty so a later call may retry.
    pub(crate) fn get_or_create<E>(&self, key: &SlotKey, factory: impl FnOnce() -> Result<Instance, E>) -> Result<Instance, E> {
        let slot = self.slot(key);
        slot.get_or_try_init(factory).cloned()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, key: &SlotKey) -> Option<Instance> {
        self.slots.read().get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of constructed instances.
    pub(crate) fn len(&self) -> usize {
        self.slots.read().values().filter(|slot| slot.get().is_some()).count()
    }

    pub(crate) fn clear(&self) {
        self.slots.write().clear();
    }

    fn slot(&self, key: &SlotKey) -> Slot {
        if let Some(slot) = self.slots.read().get(key) {
            return Arc::clone(slot);
        }

        Arc::clone(self.slots.write().entry(key.clone()).or_default())
    }
}
