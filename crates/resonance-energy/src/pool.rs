//! Bounded energy reservoirs and the storage capability contract.
//!
//! [`EnergyPool`] is the reservoir every native node owns. Its only
//! mutation channel during transfers is [`EnergyPool::receive`] and
//! [`EnergyPool::extract`], each of which can be run in
//! [`TransferMode::Simulate`] first to learn how much would move.
//!
//! [`EnergyStorage`] is the structural contract shared with foreign
//! storages that are not part of this network but can still exchange
//! energy with it.
//!
//! # Invariants
//!
//! - `0 <= energy <= capacity` after every operation.
//! - A simulated call never mutates `energy`.
//! - A single call never moves more than
//!   `min(requested, rate cap, available headroom or stock)`.

use resonance_types::{PoolRecord, TransferMode};

/// The capability contract for anything that can hold and exchange energy.
///
/// Native pools and foreign storages both implement it; the transfer
/// coordinator only ever talks to neighbors through this trait.
pub trait EnergyStorage {
    /// Accept up to `amount` energy. Returns the amount accepted (or that
    /// would be accepted, when simulating).
    fn receive(&mut self, amount: u32, mode: TransferMode) -> u32;

    /// Give up to `amount` energy. Returns the amount given (or that would
    /// be given, when simulating).
    fn extract(&mut self, amount: u32, mode: TransferMode) -> u32;

    /// Energy currently stored.
    fn stored(&self) -> u32;

    /// Maximum energy this storage can hold.
    fn max_stored(&self) -> u32;

    /// Whether a receive could currently accept anything.
    fn can_receive(&self) -> bool;

    /// Whether an extract could currently give anything.
    fn can_extract(&self) -> bool;
}

/// Callback run after a committed change to a pool's stored energy.
///
/// Owners use it to mark themselves dirty for persistence or UI refresh.
/// It must not reach back into the pool that invoked it.
pub type ChangeListener = Box<dyn Fn()>;

/// A bounded integer energy reservoir with independent rate caps.
pub struct EnergyPool {
    capacity: u32,
    max_receive: u32,
    max_extract: u32,
    energy: u32,
    listener: Option<ChangeListener>,
}

impl core::fmt::Debug for EnergyPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EnergyPool")
            .field("capacity", &self.capacity)
            .field("max_receive", &self.max_receive)
            .field("max_extract", &self.max_extract)
            .field("energy", &self.energy)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl EnergyPool {
    /// Create an empty pool.
    pub const fn new(capacity: u32, max_receive: u32, max_extract: u32) -> Self {
        Self {
            capacity,
            max_receive,
            max_extract,
            energy: 0,
            listener: None,
        }
    }

    /// Create an empty pool with the same cap for receive and extract.
    pub const fn with_transfer(capacity: u32, max_transfer: u32) -> Self {
        Self::new(capacity, max_transfer, max_transfer)
    }

    /// Restore a pool from its persisted record.
    ///
    /// A record with `energy > capacity` is clamped to `capacity`.
    pub fn from_record(record: PoolRecord) -> Self {
        let mut pool = Self::new(record.capacity, record.max_receive, record.max_extract);
        pool.energy = record.energy.min(record.capacity);
        pool
    }

    /// Snapshot the pool into its persisted record.
    pub const fn to_record(&self) -> PoolRecord {
        PoolRecord {
            capacity: self.capacity,
            max_receive: self.max_receive,
            max_extract: self.max_extract,
            energy: self.energy,
        }
    }

    /// Attach the change listener, replacing any previous one.
    #[must_use]
    pub fn with_listener(mut self, listener: ChangeListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Replace (or clear) the change listener.
    pub fn set_listener(&mut self, listener: Option<ChangeListener>) {
        self.listener = listener;
    }

    /// Maximum energy the pool can hold.
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Stored energy.
    pub const fn energy(&self) -> u32 {
        self.energy
    }

    /// Per-call receive cap.
    pub const fn max_receive(&self) -> u32 {
        self.max_receive
    }

    /// Per-call extract cap.
    pub const fn max_extract(&self) -> u32 {
        self.max_extract
    }

    /// Free space left before the pool is full.
    pub const fn headroom(&self) -> u32 {
        self.capacity.saturating_sub(self.energy)
    }

    /// Accept up to `amount` energy.
    ///
    /// Moves `min(amount, max_receive, capacity - energy)`; nothing when
    /// `amount` is zero. Only [`TransferMode::Commit`] mutates.
    pub fn receive(&mut self, amount: u32, mode: TransferMode) -> u32 {
        if amount == 0 {
            return 0;
        }
        let accepted = amount.min(self.max_receive).min(self.headroom());
        if mode.is_commit() && accepted > 0 {
            self.energy = self.energy.saturating_add(accepted).min(self.capacity);
            self.notify();
        }
        accepted
    }

    /// Give up to `amount` energy.
    ///
    /// Moves `min(amount, max_extract, energy)`; nothing when `amount` is
    /// zero. Only [`TransferMode::Commit`] mutates.
    pub fn extract(&mut self, amount: u32, mode: TransferMode) -> u32 {
        if amount == 0 {
            return 0;
        }
        let given = amount.min(self.max_extract).min(self.energy);
        if mode.is_commit() && given > 0 {
            self.energy = self.energy.saturating_sub(given);
            self.notify();
        }
        given
    }

    /// `max_receive > 0` and the pool is not full.
    pub const fn can_receive(&self) -> bool {
        self.max_receive > 0 && self.energy < self.capacity
    }

    /// `max_extract > 0` and the pool is not empty.
    pub const fn can_extract(&self) -> bool {
        self.max_extract > 0 && self.energy > 0
    }

    // -- Privileged paths ----------------------------------------------------
    //
    // These bypass the rate caps. They exist for creative/debug tooling,
    // deserialization, and a machine's own generation and consumption. They
    // never take part in neighbor transfers.

    /// Overwrite the stored energy, clamped to `0..=capacity`.
    pub fn set_energy(&mut self, energy: u32) {
        self.energy = energy.min(self.capacity);
        self.notify();
    }

    /// Add energy, clamped at capacity. Returns the amount actually added.
    pub fn add_energy(&mut self, amount: u32) -> u32 {
        let added = amount.min(self.headroom());
        if added > 0 {
            self.energy = self.energy.saturating_add(added);
            self.notify();
        }
        added
    }

    /// Remove energy, clamped at zero. Returns the amount actually removed.
    pub fn consume_energy(&mut self, amount: u32) -> u32 {
        let removed = amount.min(self.energy);
        if removed > 0 {
            self.energy = self.energy.saturating_sub(removed);
            self.notify();
        }
        removed
    }

    /// Remove exactly `amount` if that much is stored; otherwise leave the
    /// pool untouched and return `false`.
    pub fn try_consume(&mut self, amount: u32) -> bool {
        if self.energy < amount {
            return false;
        }
        self.consume_energy(amount);
        true
    }

    /// Change the capacity. Stored energy above the new capacity is lost.
    pub fn set_capacity(&mut self, capacity: u32) {
        self.capacity = capacity;
        if self.energy > capacity {
            self.energy = capacity;
            self.notify();
        }
    }

    /// Change the per-call receive cap.
    pub const fn set_max_receive(&mut self, max_receive: u32) {
        self.max_receive = max_receive;
    }

    /// Change the per-call extract cap.
    pub const fn set_max_extract(&mut self, max_extract: u32) {
        self.max_extract = max_extract;
    }

    // -- Queries -------------------------------------------------------------

    /// Whether any energy is stored.
    pub const fn has_energy(&self) -> bool {
        self.energy > 0
    }

    /// Whether the pool is at capacity.
    pub const fn is_full(&self) -> bool {
        self.energy >= self.capacity
    }

    /// Whether the pool is empty.
    pub const fn is_empty(&self) -> bool {
        self.energy == 0
    }

    /// Fill level in `0.0..=1.0`; `0.0` for a zero-capacity pool.
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        f64::from(self.energy) / f64::from(self.capacity)
    }

    /// Fill level as a whole percentage, rounded down.
    pub fn fill_percent(&self) -> u32 {
        if self.capacity == 0 {
            return 0;
        }
        u64::from(self.energy)
            .checked_mul(100)
            .and_then(|scaled| scaled.checked_div(u64::from(self.capacity)))
            .and_then(|pct| u32::try_from(pct).ok())
            .unwrap_or(0)
    }

    // -- Transfer corrections ------------------------------------------------

    /// Undo part of a committed receive whose counterpart delivered less
    /// than it promised.
    pub(crate) fn reverse_receive(&mut self, amount: u32) {
        self.consume_energy(amount);
    }

    /// Undo part of a committed extract whose counterpart accepted less
    /// than it promised.
    pub(crate) fn reverse_extract(&mut self, amount: u32) {
        self.add_energy(amount);
    }

    fn notify(&self) {
        if let Some(listener) = &self.listener {
            listener();
        }
    }
}

impl EnergyStorage for EnergyPool {
    fn receive(&mut self, amount: u32, mode: TransferMode) -> u32 {
        Self::receive(self, amount, mode)
    }

    fn extract(&mut self, amount: u32, mode: TransferMode) -> u32 {
        Self::extract(self, amount, mode)
    }

    fn stored(&self) -> u32 {
        self.energy
    }

    fn max_stored(&self) -> u32 {
        self.capacity
    }

    fn can_receive(&self) -> bool {
        Self::can_receive(self)
    }

    fn can_extract(&self) -> bool {
        Self::can_extract(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    use TransferMode::{Commit, Simulate};

    fn filled(capacity: u32, max_receive: u32, max_extract: u32, energy: u32) -> EnergyPool {
        EnergyPool::from_record(PoolRecord {
            capacity,
            max_receive,
            max_extract,
            energy,
        })
    }

    #[test]
    fn receive_is_bounded_by_rate_and_headroom() {
        let mut pool = filled(500, 40, 0, 0);
        assert_eq!(pool.receive(1000, Commit), 40);
        assert_eq!(pool.energy(), 40);

        let mut nearly_full = filled(500, 40, 0, 490);
        assert_eq!(nearly_full.receive(1000, Commit), 10);
        assert_eq!(nearly_full.energy(), 500);
        assert!(!nearly_full.can_receive());
    }

    #[test]
    fn extract_is_bounded_by_rate_and_stock() {
        let mut pool = filled(1000, 0, 100, 1000);
        assert_eq!(pool.extract(1000, Commit), 100);
        assert_eq!(pool.energy(), 900);

        let mut low = filled(1000, 0, 100, 30);
        assert_eq!(low.extract(50, Commit), 30);
        assert!(low.is_empty());
        assert!(!low.can_extract());
    }

    #[test]
    fn simulate_never_mutates() {
        let mut pool = filled(100, 50, 50, 60);
        for _ in 0..5 {
            assert_eq!(pool.receive(80, Simulate), 40);
            assert_eq!(pool.extract(80, Simulate), 50);
        }
        assert_eq!(pool.energy(), 60);
    }

    #[test]
    fn commit_matches_simulate() {
        let mut pool = filled(100, 30, 30, 85);
        let predicted = pool.receive(25, Simulate);
        assert_eq!(pool.receive(25, Commit), predicted);
        let predicted = pool.extract(70, Simulate);
        assert_eq!(pool.extract(70, Commit), predicted);
    }

    #[test]
    fn zero_amount_moves_nothing() {
        let mut pool = filled(100, 10, 10, 50);
        assert_eq!(pool.receive(0, Commit), 0);
        assert_eq!(pool.extract(0, Commit), 0);
        assert_eq!(pool.energy(), 50);
    }

    #[test]
    fn rate_caps_gate_capability_flags() {
        let no_input = filled(100, 0, 10, 50);
        assert!(!no_input.can_receive());
        assert!(no_input.can_extract());

        let no_output = filled(100, 10, 0, 50);
        assert!(no_output.can_receive());
        assert!(!no_output.can_extract());
    }

    #[test]
    fn record_round_trips_and_clamps() {
        let record = PoolRecord {
            capacity: 1000,
            max_receive: 40,
            max_extract: 100,
            energy: 960,
        };
        assert_eq!(EnergyPool::from_record(record).to_record(), record);

        let corrupt = PoolRecord {
            energy: 5000,
            ..record
        };
        assert_eq!(EnergyPool::from_record(corrupt).energy(), 1000);
    }

    #[test]
    fn listener_fires_only_on_committed_change() {
        let hits = Rc::new(Cell::new(0_u32));
        let counter = Rc::clone(&hits);
        let mut pool = EnergyPool::with_transfer(100, 10)
            .with_listener(Box::new(move || counter.set(counter.get().saturating_add(1))));

        pool.receive(10, Simulate);
        assert_eq!(hits.get(), 0);

        pool.receive(10, Commit);
        assert_eq!(hits.get(), 1);

        // Nothing to extract from an empty pool after draining.
        pool.extract(10, Commit);
        pool.extract(10, Commit);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn privileged_paths_clamp() {
        let mut pool = EnergyPool::new(100, 0, 0);
        pool.set_energy(250);
        assert_eq!(pool.energy(), 100);
        assert_eq!(pool.add_energy(10), 0);
        assert_eq!(pool.consume_energy(150), 100);
        assert!(pool.is_empty());

        pool.set_energy(40);
        assert!(!pool.try_consume(41));
        assert_eq!(pool.energy(), 40);
        assert!(pool.try_consume(40));
        assert!(pool.is_empty());
    }

    #[test]
    fn shrinking_capacity_clamps_energy() {
        let mut pool = filled(100, 10, 10, 80);
        pool.set_capacity(50);
        assert_eq!(pool.energy(), 50);
        assert!(pool.is_full());
    }

    #[test]
    fn fill_level() {
        let pool = filled(200, 0, 0, 50);
        assert_eq!(pool.fill_ratio(), 0.25);
        assert_eq!(pool.fill_percent(), 25);
        assert_eq!(EnergyPool::new(0, 0, 0).fill_percent(), 0);
    }

    #[test]
    fn listener_can_be_replaced_and_cleared() {
        let first = Rc::new(Cell::new(0_u32));
        let second = Rc::new(Cell::new(0_u32));
        let counter = Rc::clone(&first);
        let mut pool = EnergyPool::with_transfer(100, 10)
            .with_listener(Box::new(move || counter.set(counter.get().saturating_add(1))));
        pool.receive(5, Commit);

        let counter = Rc::clone(&second);
        pool.set_listener(Some(Box::new(move || {
            counter.set(counter.get().saturating_add(1));
        })));
        pool.receive(5, Commit);
        assert_eq!((first.get(), second.get()), (1, 1));

        pool.set_listener(None);
        pool.receive(5, Commit);
        assert_eq!((first.get(), second.get()), (1, 1));
        assert_eq!(pool.energy(), 15);
    }
}
