//! Owned-by bookkeeping shared by save and load.
//!
//! Every object has at most one owner. Owners may form cycles; pass 2 wires
//! them like any other reference.

use crate::error::OwnershipError;

/// Owner slot of every slot in one save or load call.
#[derive(Default)]
pub(crate) struct OwnerTable {
    owners: Vec<Option<u32>>,
}

impl OwnerTable {
    pub fn clear(&mut self) {
        self.owners.clear();
    }

    /// Resets the table to `len` unowned slots.
    pub fn reset(&mut self, len: usize) {
        self.owners.clear();
        self.owners.resize(len, None);
    }

    pub fn push_unowned(&mut self) {
        self.owners.push(None);
    }

    /// Records that `owner` holds an owning reference to `target`.
    pub fn claim(&mut self, owner: u32, target: u32) -> Result<(), OwnershipError> {
        let entry = &mut self.owners[target as usize];
        if entry.is_some() {
            return Err(OwnershipError::MultipleOwners { slot: target });
        }
        *entry = Some(owner);
        Ok(())
    }

    pub fn is_owned(&self, slot: usize) -> bool {
        self.owners[slot].is_some()
    }
}
