//! A byte queue for one TCP connection's inbound stream: data is appended at the tail as it
//! arrives off the socket and consumed from the head as whole frames are extracted. Unlike a
//! flat `Vec` that is `drain`ed on every partial frame, the head is tracked as an offset and the
//! backing storage is only compacted once the wasted prefix grows past a threshold, so a
//! connection that trickles in one byte at a time does not degrade to O(n^2) copying.

const COMPACT_THRESHOLD: usize = 4096;

#[derive(Default)]
pub struct ConnBuffer {
    data: Vec<u8>,
    head: usize,
}

impl ConnBuffer {
    #[inline]
    pub fn new() -> ConnBuffer {
        ConnBuffer {
            data: Vec::new(),
            head: 0,
        }
    }

    /// Appends freshly read bytes to the tail of the buffer.
    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// The number of unconsumed bytes currently buffered.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A view of the unconsumed bytes.
    #[inline]
    pub fn readable(&self) -> &[u8] {
        &self.data[self.head..]
    }

    /// Marks `count` bytes as consumed from the head, compacting the backing storage once the
    /// wasted prefix grows large enough to be worth the copy.
    #[inline]
    pub fn consume(&mut self, count: usize) {
        self.head += count;
        debug_assert!(self.head <= self.data.len());

        if self.head >= COMPACT_THRESHOLD || self.head == self.data.len() {
            self.data.drain(0..self.head);
            self.head = 0;
        }
    }

    /// Drops every unconsumed byte. Used when the reassembler gives up on an unrecoverable
    /// frame and has no cheap way to resynchronize.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
    }
}
