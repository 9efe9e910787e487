//! Receive ring buffer.
//!
//! A fixed-capacity queue of [`RxRecord`]s. One slot always stays free so that
//! `read == write` unambiguously means empty, which leaves `N - 1` usable
//! slots. When the ring is full a push evicts the oldest record.

use crate::registers::LineStatus;

/// Default number of slots in the receive ring.
pub const RX_CAPACITY: usize = 1029;

/// One received byte together with the line status it arrived with.
///
/// Packed as `status << 8 | data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxRecord(u16);

impl RxRecord {
    /// Packs a status snapshot and a data byte.
    #[inline]
    pub const fn new(status: u8, data: u8) -> Self {
        Self(((status as u16) << 8) | data as u16)
    }

    /// The raw line status captured when the byte was read.
    #[inline]
    pub const fn status(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// The received byte.
    #[inline]
    pub const fn data(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    /// The captured line status as typed flags.
    #[inline]
    pub const fn line_status(self) -> LineStatus {
        LineStatus::from_bits_retain(self.status())
    }

    /// The packed 16-bit representation.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }
}

/// Fixed-capacity receive queue that keeps the most recent `N - 1` records.
pub struct RxRing<const N: usize = RX_CAPACITY> {
    slots: [RxRecord; N],
    /// Next slot to consume. Always `< N`.
    read: usize,
    /// Next slot to fill. Always `< N`.
    write: usize,
}

impl<const N: usize> Default for RxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RxRing<N> {
    const NONEMPTY: () = assert!(N >= 2, "ring needs at least one usable slot");

    /// Creates an empty ring with both cursors at slot 0.
    pub const fn new() -> Self {
        let _: () = Self::NONEMPTY;
        Self {
            slots: [RxRecord(0); N],
            read: 0,
            write: 0,
        }
    }

    /// Total number of slots, one more than can be occupied at once.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of records that fit before the oldest one gets evicted.
    #[inline]
    pub const fn usable(&self) -> usize {
        N - 1
    }

    #[inline]
    const fn next(index: usize) -> usize {
        if index + 1 == N { 0 } else { index + 1 }
    }

    /// Number of buffered records.
    #[inline]
    pub const fn len(&self) -> usize {
        if self.write >= self.read {
            self.write - self.read
        } else {
            N - self.read + self.write
        }
    }

    /// Number of records that can be pushed without evicting anything.
    #[inline]
    pub const fn free(&self) -> usize {
        self.usable() - self.len()
    }

    /// Returns `true` if there is nothing to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Returns `true` if the next push evicts the oldest record.
    #[inline]
    pub const fn is_full(&self) -> bool {
        Self::next(self.write) == self.read
    }

    /// Appends a record. Never fails.
    ///
    /// If the ring is full the oldest unread record is discarded first, so the
    /// ring always holds the most recent `N - 1` records in arrival order.
    ///
    /// Returns `true` if a record was evicted.
    pub fn push(&mut self, status: u8, data: u8) -> bool {
        self.slots[self.write] = RxRecord::new(status, data);
        self.write = Self::next(self.write);

        let evicted = self.write == self.read;
        if evicted {
            // The slot just filled closed the gap: drop the oldest record so
            // `read == write` keeps meaning empty.
            trace!("rx ring full, dropping oldest");
            self.read = Self::next(self.read);
        }
        evicted
    }

    /// Removes and returns the oldest record.
    pub fn pop(&mut self) -> Option<RxRecord> {
        if self.is_empty() {
            return None;
        }
        let record = self.slots[self.read];
        self.read = Self::next(self.read);
        Some(record)
    }

    /// Returns the oldest record without removing it.
    pub fn peek(&self) -> Option<RxRecord> {
        if self.is_empty() {
            None
        } else {
            Some(self.slots[self.read])
        }
    }

    /// Drops everything buffered.
    pub fn clear(&mut self) {
        self.read = self.write;
    }

    /// Returns `true` once at least `threshold` records are buffered.
    ///
    /// Used as the stop watermark for RTS flow control.
    #[inline]
    pub const fn is_nearly_full(&self, threshold: usize) -> bool {
        self.len() >= threshold
    }

    /// Returns `true` while at most `threshold` records are buffered.
    ///
    /// The bound is inclusive: a backlog of exactly `threshold` counts as
    /// below. Used as the resume watermark for RTS flow control.
    #[inline]
    pub const fn is_below(&self, threshold: usize) -> bool {
        self.len() <= threshold
    }
}
