// SPDX-License-Identifier: BSD-3-Clause
//! Dense numbering of IR values and their affiliated memory objects.
//!
//! Some memory objects are not represented by any IR value — the frame
//! object an `alloca` creates, the block a `malloc` call returns, the
//! storage behind a global. Each such object gets an ID adjacent to its
//! allocation site: registering a value with `k` affiliated slots reserves
//! the `k` IDs following the value's own.

use std::collections::HashMap;
use std::fmt::{self, Display};

use crate::ir::Value;

/// IDs below this are special objects with no backing value.
pub const NUM_SPECIAL_OBJECTS: u32 = 1;

/// The special "some unknown object".
pub const ANY_OBJECT: u32 = 0;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("value {0} has not been registered")]
pub struct UnknownValue(pub String);

#[derive(Clone, Debug, Default)]
pub struct ObjectMap {
    value_to_id: HashMap<Value, u32>,
    /// Index `i` holds the value of object ID `i + NUM_SPECIAL_OBJECTS`;
    /// `None` marks an affiliated slot.
    values: Vec<Option<Value>>,
}

impl ObjectMap {
    pub fn new() -> Self {
        ObjectMap::default()
    }

    /// Registers a value and reserves `affiliated` slots after it.
    /// Idempotent: a registered value keeps its ID and its original
    /// affiliated count, whatever is passed later.
    pub fn add_value(&mut self, value: &Value, affiliated: u32) -> u32 {
        if let Some(id) = self.value_to_id.get(value) {
            return *id;
        }
        let id = self.values.len() as u32 + NUM_SPECIAL_OBJECTS;
        self.values.push(Some(value.clone()));
        self.value_to_id.insert(value.clone(), id);
        for _ in 0..affiliated {
            self.values.push(None);
        }
        id
    }

    pub fn object_id(&self, value: &Value) -> Result<u32, UnknownValue> {
        self.value_to_id
            .get(value)
            .copied()
            .ok_or_else(|| UnknownValue(value.to_string()))
    }

    pub fn has_value(&self, value: &Value) -> bool {
        self.value_to_id.contains_key(value)
    }

    pub fn is_valid_object_id(&self, id: u32) -> bool {
        id < self.values.len() as u32 + NUM_SPECIAL_OBJECTS
    }

    /// The value of an object ID, or `None` for specials and affiliated
    /// slots.
    pub fn value_of(&self, id: u32) -> Option<&Value> {
        let index = id.checked_sub(NUM_SPECIAL_OBJECTS)?;
        self.values.get(index as usize)?.as_ref()
    }

    /// The `index`-th affiliated object of `base`; the 0th affiliate would
    /// be the base itself.
    pub fn affiliated_object_id(&self, base: u32, index: u32) -> u32 {
        debug_assert!(index != 0, "the 0th affiliated object is the base itself");
        base + index
    }

    /// Walks `id` backwards to the nearest slot with a value, recovering
    /// the allocation site of an affiliated object. Returns the site and
    /// the affiliate index (0 when `id` is itself a value).
    pub fn main_value_of(&self, id: u32) -> Option<(&Value, u32)> {
        if !self.is_valid_object_id(id) {
            return None;
        }
        let mut current = id;
        while current >= NUM_SPECIAL_OBJECTS {
            if let Some(value) = self.value_of(current) {
                return Some((value, id - current));
            }
            current -= 1;
        }
        None
    }

    /// The number of allocated object IDs, specials included.
    pub fn len(&self) -> u32 {
        self.values.len() as u32 + NUM_SPECIAL_OBJECTS
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All registered values with their IDs, in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| Some((i as u32 + NUM_SPECIAL_OBJECTS, v.as_ref()?)))
    }

    /// Human-readable form of an object ID: `any`, `special(n)`, the
    /// value's qualified name, or `<site>::aff(k)` for affiliates.
    pub fn display(&self, id: u32) -> ObjectDisplay<'_> {
        ObjectDisplay { map: self, id }
    }
}

pub struct ObjectDisplay<'a> {
    map: &'a ObjectMap,
    id: u32,
}

impl Display for ObjectDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == ANY_OBJECT {
            return write!(f, "any");
        }
        if self.id < NUM_SPECIAL_OBJECTS {
            return write!(f, "special({})", self.id);
        }
        match self.map.main_value_of(self.id) {
            Some((value, 0)) => write!(f, "{}", value),
            Some((value, k)) => write!(f, "{}::aff({})", value, k),
            None => write!(f, "<invalid {}>", self.id),
        }
    }
}
