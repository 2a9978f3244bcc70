//! Arena for heap-backed runtime values.
//!
//! Objects and functions live in slots owned by the evaluator and are
//! referenced by index from [`Value`](crate::value::Value). Identity equality
//! for those values is just slot-id equality. Callables are held behind a
//! shared pointer so an invocation can release its arena borrow before
//! re-entering the evaluator.

use std::rc::Rc;

use crate::value::{Callable, Indexable};

/// Index of a slot in the [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u32);

impl HeapId {
    fn new(index: usize) -> Self {
        Self(index.try_into().expect("heap id overflow"))
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub(crate) enum HeapData {
    Object(Box<dyn Indexable>),
    Function(Rc<dyn Callable>),
}

/// Slot storage for all objects and functions created during evaluation.
///
/// Slots are never freed individually; everything is released when the
/// evaluator is dropped. This breaks the reference cycles that would
/// otherwise form between closures, environments and objects.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    slots: Vec<HeapData>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_object(&mut self, object: Box<dyn Indexable>) -> HeapId {
        let id = HeapId::new(self.slots.len());
        self.slots.push(HeapData::Object(object));
        id
    }

    pub fn alloc_function(&mut self, function: Rc<dyn Callable>) -> HeapId {
        let id = HeapId::new(self.slots.len());
        self.slots.push(HeapData::Function(function));
        id
    }

    /// # Panics
    /// Panics if the slot does not hold an object; `Value::Object` ids are
    /// only ever minted by `alloc_object`.
    pub fn object(&self, id: HeapId) -> &dyn Indexable {
        match &self.slots[id.index()] {
            HeapData::Object(object) => object.as_ref(),
            HeapData::Function(_) => panic!("heap slot {id:?} does not hold an object"),
        }
    }

    /// # Panics
    /// Panics if the slot does not hold an object.
    pub fn object_mut(&mut self, id: HeapId) -> &mut dyn Indexable {
        match &mut self.slots[id.index()] {
            HeapData::Object(object) => object.as_mut(),
            HeapData::Function(_) => panic!("heap slot {id:?} does not hold an object"),
        }
    }

    /// Returns a shared handle to a callable so the caller can invoke it
    /// without holding a borrow of the arena.
    ///
    /// # Panics
    /// Panics if the slot does not hold a function; `Value::Function` ids are
    /// only ever minted by `alloc_function`.
    pub fn function(&self, id: HeapId) -> Rc<dyn Callable> {
        match &self.slots[id.index()] {
            HeapData::Function(function) => Rc::clone(function),
            HeapData::Object(_) => panic!("heap slot {id:?} does not hold a function"),
        }
    }
}
