//! Cancelable, synchronous hook dispatch.
//!
//! Every stateful engine object (entity, layer, scene, camera, animation and
//! the engine itself) owns a [`Hooks`] registry and implements [`Hookable`].
//! Listeners run in insertion order and each returns a `bool`; `trigger`
//! reports `false` if any listener returned `false`. Callers treat that as a
//! veto and roll back the transition they were about to make.
//!
//! Listeners receive `&mut` access to the object that owns them, so a `drag`
//! listener may move the entity it is attached to. The listener list is
//! snapshotted before dispatch: a listener that registers or removes
//! listeners only affects the next `trigger`.
//!
//! # Example
//! ```
//! use yoo2d::entity::{Entity, EntityHook};
//! use yoo2d::hooks::{Hookable, Listener};
//!
//! let mut entity = Entity::rectangle(40.0, 40.0).unwrap();
//! let no_drag = Listener::<Entity>::new(|_, _| false);
//! entity.on(EntityHook::DragStart, &no_drag);
//! assert!(entity.has(EntityHook::DragStart, Some(&no_drag)));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// A registered callback. Identity is the allocation: clones of the same
/// `Listener` compare equal, two `Listener::new` calls never do.
pub struct Listener<T: Hookable>(Rc<dyn Fn(&mut T, &T::Event) -> bool>);

impl<T: Hookable> Listener<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut T, &T::Event) -> bool + 'static,
    {
        Self(Rc::new(f))
    }

    /// Run the callback against `target`.
    pub fn invoke(&self, target: &mut T, event: &T::Event) -> bool {
        (self.0)(target, event)
    }
}

impl<T: Hookable> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Hookable> PartialEq for Listener<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Hookable> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Per-object registry mapping a hook kind to its ordered listeners.
pub struct Hooks<T: Hookable> {
    listeners: HashMap<T::Kind, Vec<Listener<T>>>,
}

impl<T: Hookable> Hooks<T> {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }

    /// Append `listener` under `kind`. Returns false if it was already there.
    pub fn add(&mut self, kind: T::Kind, listener: Listener<T>) -> bool {
        let list = self.listeners.entry(kind).or_default();
        if list.contains(&listener) {
            return false;
        }
        list.push(listener);
        true
    }

    /// Remove `listener` from `kind`. Returns false if it was not registered.
    pub fn remove(&mut self, kind: T::Kind, listener: &Listener<T>) -> bool {
        let Some(list) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let Some(index) = list.iter().position(|l| l == listener) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            self.listeners.remove(&kind);
        }
        true
    }

    pub fn contains(&self, kind: T::Kind, listener: Option<&Listener<T>>) -> bool {
        match (self.listeners.get(&kind), listener) {
            (Some(list), Some(listener)) => list.contains(listener),
            (Some(list), None) => !list.is_empty(),
            (None, _) => false,
        }
    }

    pub fn count(&self, kind: T::Kind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Drop every listener registered under `kind`.
    pub fn clear(&mut self, kind: T::Kind) {
        self.listeners.remove(&kind);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn snapshot(&self, kind: T::Kind) -> Vec<Listener<T>> {
        self.listeners.get(&kind).cloned().unwrap_or_default()
    }
}

impl<T: Hookable> Default for Hooks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hookable> fmt::Debug for Hooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (kind, list) in &self.listeners {
            map.entry(kind, &list.len());
        }
        map.finish()
    }
}

/// Objects that carry a hook registry.
pub trait Hookable: Sized {
    /// Hook names this object dispatches.
    type Kind: Copy + Eq + Hash + fmt::Debug;
    /// Payload handed to every listener.
    type Event;

    fn hooks(&self) -> &Hooks<Self>;
    fn hooks_mut(&mut self) -> &mut Hooks<Self>;

    /// Register `listener` under `kind`. Adding the same listener twice is a
    /// no-op.
    fn on(&mut self, kind: Self::Kind, listener: &Listener<Self>) -> &mut Self {
        self.hooks_mut().add(kind, listener.clone());
        self
    }

    /// Wrap `f` in a [`Listener`], register it, and hand it back so the
    /// caller can later pass it to [`Hookable::off`].
    fn listen<F>(&mut self, kind: Self::Kind, f: F) -> Listener<Self>
    where
        F: Fn(&mut Self, &Self::Event) -> bool + 'static,
    {
        let listener = Listener::new(f);
        self.hooks_mut().add(kind, listener.clone());
        listener
    }

    fn off(&mut self, kind: Self::Kind, listener: &Listener<Self>) -> &mut Self {
        self.hooks_mut().remove(kind, listener);
        self
    }

    /// With `Some(listener)`, whether that listener is registered under
    /// `kind`; with `None`, whether anything is.
    fn has(&self, kind: Self::Kind, listener: Option<&Listener<Self>>) -> bool {
        self.hooks().contains(kind, listener)
    }

    /// Invoke every listener for `kind` in insertion order. Returns false if
    /// at least one listener vetoed. All listeners run even after a veto.
    fn trigger(&mut self, kind: Self::Kind, event: &Self::Event) -> bool {
        let listeners = self.hooks().snapshot(kind);
        let mut allowed = true;
        for listener in listeners {
            if !listener.invoke(self, event) {
                allowed = false;
            }
        }
        allowed
    }
}
