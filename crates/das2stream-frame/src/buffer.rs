use tracing::debug;

/// Read buffer with explicit read and write positions.
///
/// Bytes in `read_pos..write_pos` are buffered but unconsumed. The arena
/// compacts before every refill and grows only when a single frame will not
/// fit, to `len + len / 10 + 1024` bytes.
#[derive(Debug)]
pub struct ByteArena {
    buf: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl ByteArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            read_pos: 0,
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Buffered, unconsumed byte count.
    pub fn len(&self) -> usize {
        self.write_pos - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    pub fn unread(&self) -> &[u8] {
        &self.buf[self.read_pos..self.write_pos]
    }

    /// Mark `n` unread bytes as consumed.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.read_pos = (self.read_pos + n).min(self.write_pos);
        if self.read_pos == self.write_pos {
            self.read_pos = 0;
            self.write_pos = 0;
        }
    }

    /// Move unread bytes to the front.
    pub fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        self.buf.copy_within(self.read_pos..self.write_pos, 0);
        self.write_pos -= self.read_pos;
        self.read_pos = 0;
    }

    /// Make room for a frame of `frame_len` bytes starting at the read position.
    pub fn reserve_frame(&mut self, frame_len: usize) {
        if frame_len <= self.capacity() {
            return;
        }
        self.compact();
        let grown = frame_len + frame_len / 10 + 1024;
        debug!(from = self.capacity(), to = grown, "growing read buffer");
        self.buf.resize(grown, 0);
    }

    /// Free space after the write position, at most `max` bytes, compacting
    /// (and growing when full) first.
    pub fn spare_mut(&mut self, max: usize) -> &mut [u8] {
        self.compact();
        if self.write_pos == self.capacity() {
            self.reserve_frame(self.capacity() + 1);
        }
        let end = self.capacity().min(self.write_pos + max.max(1));
        &mut self.buf[self.write_pos..end]
    }

    /// Record `n` bytes written into [`spare_mut`](Self::spare_mut).
    pub fn commit(&mut self, n: usize) {
        self.write_pos = (self.write_pos + n).min(self.capacity());
    }

    /// Append bytes, compacting and growing as needed.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.compact();
        let needed = self.write_pos + bytes.len();
        if needed > self.capacity() {
            self.reserve_frame(needed);
        }
        self.buf[self.write_pos..needed].copy_from_slice(bytes);
        self.write_pos = needed;
    }

    /// Remove and return every unread byte.
    pub fn take_unread(&mut self) -> Vec<u8> {
        let rest = self.unread().to_vec();
        self.read_pos = 0;
        self.write_pos = 0;
        rest
    }
}
