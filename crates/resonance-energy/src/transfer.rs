//! Per-tick energy exchange between one node and its neighbors.
//!
//! [`TransferCoordinator`] borrows a node's [`EnergyNode`] for one call and
//! walks its enabled sides in canonical order. Every exchange follows the
//! same protocol:
//!
//! 1. Simulate the neighbor's half to learn what it would give or take.
//! 2. Commit the origin's half for that amount.
//! 3. Commit the neighbor's half for exactly what the origin committed.
//!
//! The origin never commits more than the neighbor's simulation offered,
//! and the neighbor is never asked to commit more than the origin accepted,
//! so energy is neither lost nor duplicated. If a foreign neighbor's
//! commit under-delivers anyway, the origin's half is corrected by the
//! shortfall.
//!
//! Exchanges are committed per neighbor, not batched: when a source runs
//! short, sides visited earlier win.

use resonance_types::{Direction, Position, TransferMode, TransferOutcome};
use serde::Serialize;
use tracing::{debug, warn};

use crate::neighbor::{EnergyWorld, Neighbor, NeighborKind, NeighborResolver};
use crate::node::EnergyNode;
use crate::role::Operation;

/// One committed movement of energy between two adjacent cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Exchange {
    /// Cell the energy left.
    pub from: Position,
    /// Cell the energy entered.
    pub to: Position,
    /// Side of the coordinating node the exchange went through.
    pub direction: Direction,
    /// Whether the counterpart was native or a foreign storage.
    pub kind: NeighborKind,
    /// Energy moved.
    pub amount: u32,
}

/// Receives every committed [`Exchange`] a coordinator performs.
pub trait ExchangeRecorder {
    /// Called once per committed, non-zero exchange.
    fn record(&mut self, exchange: Exchange);
}

impl ExchangeRecorder for Vec<Exchange> {
    fn record(&mut self, exchange: Exchange) {
        self.push(exchange);
    }
}

/// A neighbor reported by the read-only helper queries.
#[derive(Debug, Clone)]
pub struct AdjacentStorage {
    /// The resolved neighbor.
    pub neighbor: Neighbor,
    /// Energy it held when queried.
    pub stored: u32,
    /// Its capacity when queried.
    pub max_stored: u32,
}

impl AdjacentStorage {
    /// Free space in the neighbor when queried.
    pub const fn headroom(&self) -> u32 {
        self.max_stored.saturating_sub(self.stored)
    }
}

/// Coordinates one node's exchanges with its neighbors.
///
/// Holds no state of its own; everything lives in the borrowed node.
pub struct TransferCoordinator<'a, W: ?Sized> {
    node: &'a mut EnergyNode,
    position: Position,
    resolver: NeighborResolver<'a, W>,
    recorder: Option<&'a mut dyn ExchangeRecorder>,
}

impl<'a, W: EnergyWorld + ?Sized> TransferCoordinator<'a, W> {
    /// Borrow `node` at `position` for exchanges against `world`.
    pub const fn new(node: &'a mut EnergyNode, position: Position, world: &'a W) -> Self {
        Self {
            node,
            position,
            resolver: NeighborResolver::new(world),
            recorder: None,
        }
    }

    /// Report every committed exchange to `recorder`.
    #[must_use]
    pub fn with_recorder(mut self, recorder: &'a mut dyn ExchangeRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Pull up to `max_total` energy from neighbors on input sides.
    ///
    /// Returns the amount actually received, never more than
    /// `min(max_total, pool.max_receive)`.
    pub fn receive(&mut self, max_total: u32) -> u32 {
        if max_total == 0 || !self.node.pool.can_receive() {
            return 0;
        }

        let sides = self.node.sides;
        let mut remaining = max_total.min(self.node.pool.max_receive());
        let mut total: u32 = 0;

        for direction in sides.input_sides() {
            if remaining == 0 {
                break;
            }
            let Some(neighbor) =
                self.resolver
                    .resolve(self.position, &sides, direction, Operation::Extract)
            else {
                continue;
            };

            let offer = neighbor
                .with_storage(|s| {
                    if s.can_extract() {
                        s.extract(remaining, TransferMode::Simulate)
                    } else {
                        0
                    }
                })
                .unwrap_or(0);
            if offer == 0 {
                continue;
            }

            let accepted = self.node.pool.receive(offer, TransferMode::Commit);
            if accepted == 0 {
                continue;
            }

            let delivered = neighbor
                .with_storage(|s| s.extract(accepted, TransferMode::Commit))
                .unwrap_or(0)
                .min(accepted);
            if delivered < accepted {
                let shortfall = accepted.saturating_sub(delivered);
                warn!(
                    position = %self.position,
                    %direction,
                    promised = accepted,
                    delivered,
                    "neighbor delivered less than it offered; reverting shortfall"
                );
                self.node.pool.reverse_receive(shortfall);
            }
            if delivered == 0 {
                continue;
            }

            remaining = remaining.saturating_sub(delivered);
            total = total.saturating_add(delivered);
            self.emit(Exchange {
                from: neighbor.position,
                to: self.position,
                direction,
                kind: neighbor.kind(),
                amount: delivered,
            });
        }

        if total > 0 {
            debug!(position = %self.position, received = total, "energy received");
        }
        total
    }

    /// Push up to `max_total` energy to neighbors on output sides.
    ///
    /// Returns the amount actually sent, never more than
    /// `min(max_total, pool.max_extract)`.
    pub fn send(&mut self, max_total: u32) -> u32 {
        if max_total == 0 || !self.node.pool.can_extract() {
            return 0;
        }

        let sides = self.node.sides;
        let mut remaining = max_total.min(self.node.pool.max_extract());
        let mut total: u32 = 0;

        for direction in sides.output_sides() {
            if remaining == 0 {
                break;
            }
            let Some(neighbor) =
                self.resolver
                    .resolve(self.position, &sides, direction, Operation::Insert)
            else {
                continue;
            };

            let demand = neighbor
                .with_storage(|s| {
                    if s.can_receive() {
                        s.receive(remaining, TransferMode::Simulate)
                    } else {
                        0
                    }
                })
                .unwrap_or(0);
            if demand == 0 {
                continue;
            }

            let extracted = self.node.pool.extract(demand, TransferMode::Commit);
            if extracted == 0 {
                continue;
            }

            let delivered = neighbor
                .with_storage(|s| s.receive(extracted, TransferMode::Commit))
                .unwrap_or(0)
                .min(extracted);
            if delivered < extracted {
                let shortfall = extracted.saturating_sub(delivered);
                warn!(
                    position = %self.position,
                    %direction,
                    promised = extracted,
                    delivered,
                    "neighbor accepted less than it offered; reverting shortfall"
                );
                self.node.pool.reverse_extract(shortfall);
            }
            if delivered == 0 {
                continue;
            }

            remaining = remaining.saturating_sub(delivered);
            total = total.saturating_add(delivered);
            self.emit(Exchange {
                from: self.position,
                to: neighbor.position,
                direction,
                kind: neighbor.kind(),
                amount: delivered,
            });
        }

        if total > 0 {
            debug!(position = %self.position, sent = total, "energy sent");
        }
        total
    }

    /// Receive, then send, each bounded by `max_transfer`.
    pub fn perform_balanced(&mut self, max_transfer: u32) -> TransferOutcome {
        let received = self.receive(max_transfer);
        let sent = self.send(max_transfer);
        TransferOutcome { received, sent }
    }

    /// Neighbors on input sides that can currently give energy.
    pub fn find_sources(&self) -> Vec<AdjacentStorage> {
        self.scan(Operation::Extract)
            .into_iter()
            .filter(|a| a.stored > 0)
            .collect()
    }

    /// Neighbors on output sides that can currently take energy.
    pub fn find_sinks(&self) -> Vec<AdjacentStorage> {
        self.scan(Operation::Insert)
            .into_iter()
            .filter(|a| a.stored < a.max_stored)
            .collect()
    }

    /// Whether any input side leads to a usable source.
    pub fn has_energy_sources(&self) -> bool {
        !self.find_sources().is_empty()
    }

    /// Whether any output side leads to a usable sink.
    pub fn has_energy_sinks(&self) -> bool {
        !self.find_sinks().is_empty()
    }

    /// Whether the node is connected to any source or sink.
    pub fn has_energy_connections(&self) -> bool {
        self.has_energy_sources() || self.has_energy_sinks()
    }

    /// Energy stored across all usable sources.
    pub fn total_available_energy(&self) -> u64 {
        self.find_sources()
            .iter()
            .fold(0_u64, |acc, a| acc.saturating_add(u64::from(a.stored)))
    }

    /// Free space across all usable sinks.
    pub fn total_sink_capacity(&self) -> u64 {
        self.find_sinks()
            .iter()
            .fold(0_u64, |acc, a| acc.saturating_add(u64::from(a.headroom())))
    }

    /// Resolve and snapshot every neighbor usable for `operation`.
    fn scan(&self, operation: Operation) -> Vec<AdjacentStorage> {
        let sides = self.node.sides;
        let candidates: Vec<Direction> = match operation {
            Operation::Extract => sides.input_sides().collect(),
            Operation::Insert => sides.output_sides().collect(),
        };

        candidates
            .into_iter()
            .filter_map(|direction| {
                let neighbor = self
                    .resolver
                    .resolve(self.position, &sides, direction, operation)?;
                let (usable, stored, max_stored) = neighbor.peek(|s| {
                    let usable = match operation {
                        Operation::Extract => s.can_extract(),
                        Operation::Insert => s.can_receive(),
                    };
                    (usable, s.stored(), s.max_stored())
                })?;
                usable.then_some(AdjacentStorage {
                    neighbor,
                    stored,
                    max_stored,
                })
            })
            .collect()
    }

    fn emit(&mut self, exchange: Exchange) {
        if let Some(recorder) = self.recorder.as_deref_mut() {
            recorder.record(exchange);
        }
    }
}
