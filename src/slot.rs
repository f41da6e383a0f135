use std::fmt;

// What a slot currently holds.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    // Position of the slot's value in the dense value array.
    Occupied { value_idx: u32 },

    // Next slot on the freelist. The tail of the freelist points at itself.
    Vacant { next_free: u32 },
}

// A slot, the indirection between a key and the dense position of its value.
#[derive(Clone, Copy)]
pub(crate) struct Slot {
    // Starts at 1, bumped by one on every removal.
    pub generation: u32,
    pub state: SlotState,
}

impl Slot {
    pub fn occupied(value_idx: u32) -> Self {
        Slot {
            generation: 1,
            state: SlotState::Occupied { value_idx },
        }
    }

    // The dense index if this slot is occupied by `generation`.
    #[inline(always)]
    pub fn value_idx(&self, generation: u32) -> Option<u32> {
        match self.state {
            SlotState::Occupied { value_idx } if self.generation == generation => {
                Some(value_idx)
            }
            _ => None,
        }
    }

    #[inline(always)]
    pub fn next_free(&self) -> Option<u32> {
        match self.state {
            SlotState::Vacant { next_free } => Some(next_free),
            SlotState::Occupied { .. } => None,
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = fmt.debug_struct("Slot");
        builder.field("generation", &self.generation);
        match self.state {
            SlotState::Occupied { value_idx } => builder.field("value_idx", &value_idx),
            SlotState::Vacant { next_free } => builder.field("next_free", &next_free),
        };
        builder.finish()
    }
}
