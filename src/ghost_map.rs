//! GhostMap - wrapper state kept across wrapper collection.
//!
//! When a wrapper with custom state (a scripting subclass or attributes in
//! its dictionary) is removed while its native object lives on, its type and
//! dictionary are kept as a ghost. The next time the native object crosses
//! the bridge, the ghost is turned back into a wrapper with the same type
//! and the same dictionary.
//!
//! Ghosts never keep a native object alive. Ghosts of dead objects are swept
//! before each capture; their payloads are returned to the caller instead of
//! being dropped in place, because dropping attribute values may run
//! arbitrary code.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use objbridge_core::{AttrDict, NativeRef, NativeWeak, ObjectId, WrapperTypeRef};

/// Saved wrapper state for one native object.
pub struct Ghost {
    native: NativeWeak,
    ty: WrapperTypeRef,
    dict: AttrDict,
}

impl Ghost {
    /// Whether the native object is still alive.
    pub fn is_alive(&self) -> bool {
        self.native.strong_count() > 0
    }

    /// The native object, if alive.
    pub fn native(&self) -> Option<NativeRef> {
        self.native.upgrade()
    }

    /// Saved wrapper type.
    pub fn ty(&self) -> &WrapperTypeRef {
        &self.ty
    }

    /// Saved attribute dictionary.
    pub fn dict(&self) -> &AttrDict {
        &self.dict
    }

    /// Split into the saved type and dictionary.
    pub fn into_state(self) -> (WrapperTypeRef, AttrDict) {
        (self.ty, self.dict)
    }
}

impl fmt::Debug for Ghost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ghost")
            .field("object", &ObjectId::of_weak(&self.native))
            .field("type", &self.ty.name())
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Table of ghosts keyed by native identity.
#[derive(Default)]
pub struct GhostMap {
    ghosts: FxHashMap<ObjectId, Ghost>,
}

impl GhostMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save wrapper state for `native`, replacing any previous ghost.
    ///
    /// Ghosts of dead objects are swept first. The swept ghosts (and a
    /// replaced one) are returned for the caller to drop.
    pub fn capture(
        &mut self,
        native: &NativeRef,
        ty: &WrapperTypeRef,
        dict: &AttrDict,
    ) -> Vec<Ghost> {
        let mut discarded = self.sweep();

        let id = ObjectId::of(native);
        let ghost = Ghost {
            native: Rc::downgrade(native),
            ty: Rc::clone(ty),
            dict: dict.clone(),
        };
        debug!(object = %id, wrapper = %ty.name(), attrs = dict.len(), "ghost captured");
        if let Some(previous) = self.ghosts.insert(id, ghost) {
            discarded.push(previous);
        }
        discarded
    }

    /// Remove the ghosts of dead native objects and return them.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn sweep(&mut self) -> Vec<Ghost> {
        let dead: Vec<ObjectId> = self
            .ghosts
            .iter()
            .filter(|(_, ghost)| !ghost.is_alive())
            .map(|(id, _)| *id)
            .collect();

        let swept: Vec<Ghost> = dead
            .into_iter()
            .filter_map(|id| self.ghosts.remove(&id))
            .collect();
        if !swept.is_empty() {
            debug!(swept = swept.len(), remaining = self.ghosts.len(), "ghosts swept");
        }
        swept
    }

    /// Remove the ghost for `id`. Its state is returned only if the native
    /// object is still alive.
    pub fn resurrect(&mut self, id: ObjectId) -> Option<(WrapperTypeRef, AttrDict)> {
        let ghost = self.take(id)?;
        if !ghost.is_alive() {
            return None;
        }
        debug!(object = %id, wrapper = %ghost.ty.name(), "ghost resurrected");
        Some(ghost.into_state())
    }

    /// Remove and return the ghost for `id`, alive or not.
    pub fn take(&mut self, id: ObjectId) -> Option<Ghost> {
        self.ghosts.remove(&id)
    }

    /// Live native object behind the ghost for `id`.
    pub fn native(&self, id: ObjectId) -> Option<NativeRef> {
        self.ghosts.get(&id).and_then(Ghost::native)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.ghosts.contains_key(&id)
    }

    /// Number of ghosts, dead ones not yet swept included.
    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    /// Remove every ghost and return them.
    pub fn clear(&mut self) -> Vec<Ghost> {
        self.ghosts.drain().map(|(_, ghost)| ghost).collect()
    }
}

impl fmt::Debug for GhostMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GhostMap")
            .field("ghosts", &self.ghosts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use objbridge_core::{NativeObject, Value, WrapperType};

    use super::*;

    struct Obj;

    impl NativeObject for Obj {
        fn class_name(&self) -> &str {
            "Obj"
        }

        fn is_a(&self, class_name: &str) -> bool {
            class_name == "Obj"
        }
    }

    fn state() -> (WrapperTypeRef, AttrDict) {
        let dict = AttrDict::new();
        dict.set("note", Value::str("kept"));
        (WrapperType::new("user.MyObj").into_ref(), dict)
    }

    #[test]
    fn capture_does_not_keep_native_alive() {
        let mut ghosts = GhostMap::new();
        let native: NativeRef = Rc::new(Obj);
        let (ty, dict) = state();

        assert!(ghosts.capture(&native, &ty, &dict).is_empty());
        assert_eq!(Rc::strong_count(&native), 1);
        assert!(ghosts.contains(ObjectId::of(&native)));
    }

    #[test]
    fn resurrect_returns_same_dict_and_removes_ghost() {
        let mut ghosts = GhostMap::new();
        let native: NativeRef = Rc::new(Obj);
        let id = ObjectId::of(&native);
        let (ty, dict) = state();
        let _ = ghosts.capture(&native, &ty, &dict);

        let (got_ty, got_dict) = ghosts.resurrect(id).unwrap();
        assert!(Rc::ptr_eq(&got_ty, &ty));
        assert!(got_dict.ptr_eq(&dict));
        assert!(!ghosts.contains(id));
        assert!(ghosts.resurrect(id).is_none());
    }

    #[test]
    fn capture_sweeps_dead_and_keeps_live() {
        let mut ghosts = GhostMap::new();
        let (ty, dict) = state();
        let alive: NativeRef = Rc::new(Obj);
        let doomed: NativeRef = Rc::new(Obj);
        let doomed_id = ObjectId::of(&doomed);

        let _ = ghosts.capture(&alive, &ty, &dict);
        let _ = ghosts.capture(&doomed, &ty, &dict);
        drop(doomed);
        assert_eq!(ghosts.len(), 2);

        let third: NativeRef = Rc::new(Obj);
        let swept = ghosts.capture(&third, &ty, &dict);
        assert_eq!(swept.len(), 1);
        assert!(!swept[0].is_alive());
        assert!(!ghosts.contains(doomed_id));
        assert!(ghosts.contains(ObjectId::of(&alive)));
        assert!(ghosts.contains(ObjectId::of(&third)));
    }

    #[test]
    fn recapture_replaces_previous_ghost() {
        let mut ghosts = GhostMap::new();
        let native: NativeRef = Rc::new(Obj);
        let (ty, dict) = state();
        let _ = ghosts.capture(&native, &ty, &dict);

        let (ty2, dict2) = state();
        let replaced = ghosts.capture(&native, &ty2, &dict2);
        assert_eq!(replaced.len(), 1);
        assert!(replaced[0].dict().ptr_eq(&dict));
        assert_eq!(ghosts.len(), 1);
    }

    #[test]
    fn dead_ghost_is_not_resurrected() {
        let mut ghosts = GhostMap::new();
        let native: NativeRef = Rc::new(Obj);
        let id = ObjectId::of(&native);
        let (ty, dict) = state();
        let _ = ghosts.capture(&native, &ty, &dict);
        drop(native);

        assert!(ghosts.native(id).is_none());
        assert!(ghosts.resurrect(id).is_none());
        assert!(ghosts.is_empty());
    }
}
