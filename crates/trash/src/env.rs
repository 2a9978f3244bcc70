//! Environment frames: the lexical scope chain.
//!
//! Frames live in an arena owned by the evaluator and refer to their parent
//! by index, so closures capture a frame id rather than a reference. This
//! sidesteps the reference cycles a closure stored in its own scope would
//! create. Frames that no closure captured are returned to a free list when
//! their scope exits; captured frames stay live for the evaluator's lifetime.

use ahash::AHashMap;

use crate::value::Value;

/// Index of a frame in [`Environments`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(u32);

impl EnvId {
    fn new(index: usize) -> Self {
        Self(index.try_into().expect("environment id overflow"))
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
struct Frame {
    bindings: AHashMap<String, Value>,
    parent: Option<EnvId>,
    /// Set when a closure captures this frame (or a child of it); retained
    /// frames are never reused.
    retained: bool,
}

/// Storage for all environment frames during execution.
#[derive(Debug)]
pub(crate) struct Environments {
    frames: Vec<Frame>,
    /// Frame slots whose scope has exited and which no closure captured.
    reuse_ids: Vec<EnvId>,
}

impl Environments {
    /// Creates the storage with a single root (global) frame at index 0.
    pub fn new() -> (Self, EnvId) {
        let environments = Self {
            frames: vec![Frame::default()],
            reuse_ids: Vec::new(),
        };
        (environments, EnvId(0))
    }

    /// Extends `parent` with a fresh child frame, reusing a dead slot when
    /// one is available.
    pub fn extend(&mut self, parent: EnvId) -> EnvId {
        if let Some(id) = self.reuse_ids.pop() {
            let frame = &mut self.frames[id.index()];
            frame.bindings.clear();
            frame.parent = Some(parent);
            frame.retained = false;
            id
        } else {
            let id = EnvId::new(self.frames.len());
            self.frames.push(Frame {
                bindings: AHashMap::new(),
                parent: Some(parent),
                retained: false,
            });
            id
        }
    }

    /// Releases a frame whose scope has exited. Retained frames are kept
    /// alive; everything else becomes reusable.
    pub fn release(&mut self, id: EnvId) {
        let frame = &mut self.frames[id.index()];
        if !frame.retained {
            frame.bindings.clear();
            frame.parent = None;
            self.reuse_ids.push(id);
        }
    }

    /// Marks `id` and its whole parent chain as captured by a closure.
    pub fn retain(&mut self, id: EnvId) {
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            let frame = &mut self.frames[id.index()];
            if frame.retained {
                break;
            }
            frame.retained = true;
            cursor = frame.parent;
        }
    }

    /// Reads a name, walking the parent chain.
    pub fn get(&self, id: EnvId, name: &str) -> Option<&Value> {
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            let frame = &self.frames[id.index()];
            if let Some(value) = frame.bindings.get(name) {
                return Some(value);
            }
            cursor = frame.parent;
        }
        None
    }

    /// Rewrites `name` in the nearest enclosing frame that holds it.
    /// Returns false when no enclosing frame binds the name.
    pub fn set(&mut self, id: EnvId, name: &str, value: Value) -> bool {
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            let frame = &mut self.frames[id.index()];
            if let Some(slot) = frame.bindings.get_mut(name) {
                *slot = value;
                return true;
            }
            cursor = frame.parent;
        }
        false
    }

    /// Binds `name` in exactly the frame `id`. Returns false when the name
    /// is already bound there.
    pub fn declare(&mut self, id: EnvId, name: &str, value: Value) -> bool {
        let bindings = &mut self.frames[id.index()].bindings;
        if bindings.contains_key(name) {
            return false;
        }
        bindings.insert(name.to_owned(), value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_walks_the_parent_chain() {
        let (mut envs, global) = Environments::new();
        assert!(envs.declare(global, "a", Value::Number(1.0)));
        let child = envs.extend(global);
        let grandchild = envs.extend(child);
        assert_eq!(envs.get(grandchild, "a"), Some(&Value::Number(1.0)));
        assert_eq!(envs.get(grandchild, "b"), None);
    }

    #[test]
    fn set_rewrites_the_nearest_binding() {
        let (mut envs, global) = Environments::new();
        envs.declare(global, "a", Value::Number(1.0));
        let child = envs.extend(global);
        envs.declare(child, "a", Value::Number(2.0));
        let grandchild = envs.extend(child);
        assert!(envs.set(grandchild, "a", Value::Number(3.0)));
        assert_eq!(envs.get(child, "a"), Some(&Value::Number(3.0)));
        assert_eq!(envs.get(global, "a"), Some(&Value::Number(1.0)));
        assert!(!envs.set(grandchild, "missing", Value::Nil));
    }

    #[test]
    fn declare_rejects_local_rebinding_but_allows_shadowing() {
        let (mut envs, global) = Environments::new();
        assert!(envs.declare(global, "a", Value::Nil));
        assert!(!envs.declare(global, "a", Value::Nil));
        let child = envs.extend(global);
        assert!(envs.declare(child, "a", Value::Number(1.0)));
    }

    #[test]
    fn released_frames_are_reused_unless_retained() {
        let (mut envs, global) = Environments::new();
        let child = envs.extend(global);
        envs.release(child);
        let reused = envs.extend(global);
        assert_eq!(child, reused);

        envs.retain(reused);
        envs.release(reused);
        let fresh = envs.extend(global);
        assert_ne!(reused, fresh);
        // captured bindings survive the scope exit
        envs.declare(reused, "kept", Value::Number(7.0));
        assert_eq!(envs.get(reused, "kept"), Some(&Value::Number(7.0)));
    }
}
