//! Fixed ring of per-frame resources.
//!
//! With N frames in flight, the slot written for frame `k` is not touched
//! again until frame `k + N`, so the CPU never overwrites uniforms the GPU may
//! still be reading.

pub struct FrameRing<T> {
    slots: Vec<T>,
    frame: u64,
}

impl<T> FrameRing<T> {
    /// Build `count` slots (at least one) with `make(slot_index)`.
    pub fn new(count: usize, make: impl FnMut(usize) -> T) -> Self {
        Self {
            slots: (0..count.max(1)).map(make).collect(),
            frame: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Frames started so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Start a new frame and hand out its slot.
    pub fn next_slot(&mut self) -> (usize, &mut T) {
        let index = (self.frame % self.slots.len() as u64) as usize;
        self.frame += 1;
        (index, &mut self.slots[index])
    }

    pub fn slot(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }
}
