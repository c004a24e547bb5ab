//! Per-tick action sets produced by state behaviours.
//!
//! Actions are explicit command values (an action kind plus operands), not
//! captured closures, queued into order-keyed buckets. The sequential bucket
//! of an order runs in registration order on the ticking thread; the
//! parallel bucket of the same order runs concurrently on the bounded pool.

use glam::Vec2;
use std::collections::BTreeMap;
use vivarium_data::{EntityId, SpeciesType};

/// A world-mutating action. Implementations identify the action kind and
/// carry their operands; all shared state they touch must be lock-protected.
pub trait Command: Send + Sync {
    /// Shared context the command executes against.
    type Ctx: Sync;

    fn execute(&self, ctx: &Self::Ctx);
}

/// Which bucket of an execution order a command was registered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Runs one at a time, in registration order, on the ticking thread.
    Sequential,
    /// Runs concurrently with the other parallel commands of its order.
    Parallel,
}

/// Decision callback run strictly after every bucket of a tick has drained.
/// May request a transition by returning a flag to signal.
pub type TransitionDecision<F, Ctx> = Box<dyn FnOnce(&Ctx) -> Option<F> + Send>;

/// The ephemeral action set for one tick of one state.
pub struct BehaviourActions<F, C: Command> {
    sequential: BTreeMap<u32, Vec<C>>,
    parallel: BTreeMap<u32, Vec<C>>,
    transition: Option<TransitionDecision<F, C::Ctx>>,
}

impl<F, C: Command> Default for BehaviourActions<F, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F, C: Command> BehaviourActions<F, C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sequential: BTreeMap::new(),
            parallel: BTreeMap::new(),
            transition: None,
        }
    }

    /// Queues a command at the given execution order.
    pub fn push(&mut self, order: u32, lane: Lane, command: C) {
        let bucket = match lane {
            Lane::Sequential => &mut self.sequential,
            Lane::Parallel => &mut self.parallel,
        };
        bucket.entry(order).or_default().push(command);
    }

    /// Installs the tick's single transition decision.
    pub fn on_transition(
        &mut self,
        decision: impl FnOnce(&C::Ctx) -> Option<F> + Send + 'static,
    ) {
        self.transition = Some(Box::new(decision));
    }

    /// Lowest execution order still holding commands in either bucket.
    #[must_use]
    pub fn next_order(&self) -> Option<u32> {
        let seq = self.sequential.keys().next().copied();
        let par = self.parallel.keys().next().copied();
        match (seq, par) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// Removes and returns one order's commands from one lane.
    pub fn take_slice(&mut self, order: u32, lane: Lane) -> Option<Vec<C>> {
        match lane {
            Lane::Sequential => self.sequential.remove(&order),
            Lane::Parallel => self.parallel.remove(&order),
        }
    }

    pub fn take_transition(&mut self) -> Option<TransitionDecision<F, C::Ctx>> {
        self.transition.take()
    }

    /// Whether both buckets have drained. Ignores the transition decision.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.sequential.is_empty() && self.parallel.is_empty()
    }

    /// Total queued commands across both buckets.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.sequential.values().map(Vec::len).sum::<usize>()
            + self.parallel.values().map(Vec::len).sum::<usize>()
    }
}

/// Parameter value handed from the owner's parameter callback to a state's
/// behaviour provider. Providers validate the array and return an empty
/// action set on any mismatch instead of failing the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviourParam {
    Float(f32),
    Int(i64),
    Entity(EntityId),
    Vector(Vec2),
    Species(SpeciesType),
}

impl BehaviourParam {
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            BehaviourParam::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            BehaviourParam::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            BehaviourParam::Entity(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vector(&self) -> Option<Vec2> {
        match self {
            BehaviourParam::Vector(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_species(&self) -> Option<SpeciesType> {
        match self {
            BehaviourParam::Species(v) => Some(*v),
            _ => None,
        }
    }
}

/// Owner-supplied callback producing a state's parameter array each tick.
pub type ParamsFn<Ctx> = Box<dyn Fn(&Ctx) -> Vec<BehaviourParam> + Send + Sync>;
