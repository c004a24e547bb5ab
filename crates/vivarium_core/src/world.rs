//! Explicit simulation context.
//!
//! Everything the reference kept in global singletons lives here instead: the
//! component store, the grid collaborator, the shared-resource ledger, the
//! per-tick action outcome log, the bounded worker pool and the metrics
//! collector. Created at simulation start, torn down at simulation end, and
//! passed by reference into every system call.

use crate::config::AppConfig;
use crate::grid::{NodeId, WorldGrid};
use crate::metrics::Metrics;
use crate::store::ComponentStore;
use anyhow::Context;
use glam::Vec2;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use vivarium_data::EntityId;

/// One observed consequence of an executed action, consumed by the fitness
/// shaper after the tick. Commands record outcomes instead of mutating
/// fitness directly so that shaping reads settled results, not live races.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The entity advanced along `heading` while `toward` pointed at its
    /// current target.
    Moved {
        id: EntityId,
        heading: Vec2,
        toward: Vec2,
    },
    /// The entity consumed `amount` of food.
    Ate { id: EntityId, amount: f32 },
    /// The entity searched for food; `progressed` is false when the search
    /// came up empty.
    SoughtFood { id: EntityId, progressed: bool },
    /// The entity dealt damage to `target`.
    DealtDamage {
        id: EntityId,
        target: EntityId,
        amount: f32,
        killed: bool,
    },
    /// The entity took damage.
    TookDamage { id: EntityId, amount: f32 },
    /// The entity fled a threat; `gained_distance` is true when the gap grew.
    Escaped { id: EntityId, gained_distance: bool },
    /// Flock metrics observed while steering with the group.
    Flocked {
        id: EntityId,
        cohesion: f32,
        separation: f32,
        alignment: f32,
    },
}

impl ActionOutcome {
    /// The entity whose brain this outcome scores. For damage taken that is
    /// the victim, not the attacker.
    #[must_use]
    pub fn owner(&self) -> EntityId {
        match self {
            ActionOutcome::Moved { id, .. }
            | ActionOutcome::Ate { id, .. }
            | ActionOutcome::SoughtFood { id, .. }
            | ActionOutcome::DealtDamage { id, .. }
            | ActionOutcome::TookDamage { id, .. }
            | ActionOutcome::Escaped { id, .. }
            | ActionOutcome::Flocked { id, .. } => *id,
        }
    }
}

/// Per-tick log of action outcomes. Append-only during a tick, drained by
/// the fitness shaper afterwards.
#[derive(Default)]
pub struct OutcomeLog {
    events: Mutex<Vec<ActionOutcome>>,
}

impl OutcomeLog {
    pub fn record(&self, outcome: ActionOutcome) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(outcome);
    }

    #[must_use]
    pub fn drain(&self) -> Vec<ActionOutcome> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared-resource ledger with per-resource exclusive locking.
///
/// World-state mutations that many entities race on (decrementing food at a
/// shared node) lock only the one cell they touch.
#[derive(Default)]
pub struct ResourceLedger {
    cells: RwLock<HashMap<NodeId, Mutex<f32>>>,
}

impl ResourceLedger {
    pub fn deposit(&self, node: NodeId, amount: f32) {
        {
            let cells = self.cells.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cell) = cells.get(&node) {
                *cell.lock().unwrap_or_else(|e| e.into_inner()) += amount;
                return;
            }
        }
        let mut cells = self.cells.write().unwrap_or_else(|e| e.into_inner());
        *cells
            .entry(node)
            .or_insert_with(|| Mutex::new(0.0))
            .lock()
            .unwrap_or_else(|e| e.into_inner()) += amount;
    }

    /// Withdraws up to `amount` from the node, returning what was actually
    /// taken. Zero for an unknown or empty node.
    pub fn withdraw(&self, node: NodeId, amount: f32) -> f32 {
        let cells = self.cells.read().unwrap_or_else(|e| e.into_inner());
        let Some(cell) = cells.get(&node) else {
            return 0.0;
        };
        let mut stock = cell.lock().unwrap_or_else(|e| e.into_inner());
        let taken = amount.min(*stock).max(0.0);
        *stock -= taken;
        taken
    }

    #[must_use]
    pub fn stock(&self, node: NodeId) -> f32 {
        let cells = self.cells.read().unwrap_or_else(|e| e.into_inner());
        cells
            .get(&node)
            .map(|cell| *cell.lock().unwrap_or_else(|e| e.into_inner()))
            .unwrap_or(0.0)
    }
}

/// The shared simulation context.
pub struct World {
    pub store: ComponentStore,
    pub grid: Arc<dyn WorldGrid>,
    pub resources: ResourceLedger,
    pub outcomes: OutcomeLog,
    pub pool: Arc<rayon::ThreadPool>,
    pub metrics: Metrics,
}

impl World {
    /// Builds the context, including the bounded worker pool for parallel
    /// action buckets.
    pub fn new(config: &AppConfig, grid: Arc<dyn WorldGrid>) -> anyhow::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.schedule.max_parallel_actions.max(1))
            .build()
            .context("building action worker pool")?;
        Ok(Self {
            store: ComponentStore::new(),
            grid,
            resources: ResourceLedger::default(),
            outcomes: OutcomeLog::default(),
            pool: Arc::new(pool),
            metrics: Metrics::new(config.schedule.log_interval),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_ledger_withdraw_clamps_to_stock() {
        let ledger = ResourceLedger::default();
        let node = NodeId(1);
        ledger.deposit(node, 10.0);
        assert_eq!(ledger.withdraw(node, 4.0), 4.0);
        assert_eq!(ledger.withdraw(node, 100.0), 6.0);
        assert_eq!(ledger.withdraw(node, 1.0), 0.0);
        assert_eq!(ledger.withdraw(NodeId(99), 1.0), 0.0);
    }

    #[test]
    fn test_ledger_racing_withdrawals_never_overdraw() {
        let ledger = ResourceLedger::default();
        let node = NodeId(7);
        ledger.deposit(node, 100.0);
        let taken: f32 = (0..200)
            .into_par_iter()
            .map(|_| ledger.withdraw(node, 1.0))
            .sum();
        assert_eq!(taken, 100.0);
        assert_eq!(ledger.stock(node), 0.0);
    }

    #[test]
    fn test_outcome_log_drains_clean() {
        let log = OutcomeLog::default();
        log.record(ActionOutcome::Ate {
            id: EntityId(1),
            amount: 2.0,
        });
        assert_eq!(log.len(), 1);
        let drained = log.drain();
        assert_eq!(drained.len(), 1);
        assert!(log.is_empty());
    }
}
