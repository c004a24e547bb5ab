//! Enum-indexed finite-state machine with ordered, partially-parallel
//! per-tick behaviour execution.
//!
//! One machine per entity. The transition table is a dense arena indexed by
//! the integer representations of the state and flag enums; unset cells hold
//! the "no transition" sentinel and signalling them is a benign no-op. Ticks
//! drain the current state's [`BehaviourActions`] order by order: the
//! sequential bucket on the ticking thread, the parallel bucket on a bounded
//! worker pool, and only after both buckets have drained does the tick's
//! single transition decision run.

pub mod actions;

pub use actions::{
    BehaviourActions, BehaviourParam, Command, Lane, ParamsFn, TransitionDecision,
};

use crate::error::CoreError;
use rayon::prelude::*;
use std::sync::Arc;

/// Enums usable as dense arena indices.
pub trait EnumIndexed: Copy + Eq {
    const COUNT: usize;

    /// Index in `0..Self::COUNT`.
    fn index(self) -> usize;
}

/// Produces the action sets of one state. Called fresh each tick with the
/// owner's parameter array; malformed parameters yield an empty action set,
/// never an error.
pub trait BehaviourProvider<F, C: Command>: Send + Sync {
    fn tick(&self, ctx: &C::Ctx, params: &[BehaviourParam]) -> BehaviourActions<F, C>;

    fn on_enter(&self, _ctx: &C::Ctx, _params: &[BehaviourParam]) -> BehaviourActions<F, C> {
        BehaviourActions::new()
    }

    fn on_exit(&self, _ctx: &C::Ctx, _params: &[BehaviourParam]) -> BehaviourActions<F, C> {
        BehaviourActions::new()
    }
}

/// A state's behaviour provider plus its parameter callbacks.
pub struct StateBehaviour<F, C: Command> {
    provider: Box<dyn BehaviourProvider<F, C>>,
    tick_params: ParamsFn<C::Ctx>,
    enter_params: Option<ParamsFn<C::Ctx>>,
    exit_params: Option<ParamsFn<C::Ctx>>,
}

impl<F, C: Command> StateBehaviour<F, C> {
    pub fn new(
        provider: impl BehaviourProvider<F, C> + 'static,
        tick_params: impl Fn(&C::Ctx) -> Vec<BehaviourParam> + Send + Sync + 'static,
    ) -> Self {
        Self {
            provider: Box::new(provider),
            tick_params: Box::new(tick_params),
            enter_params: None,
            exit_params: None,
        }
    }

    #[must_use]
    pub fn with_enter_params(
        mut self,
        params: impl Fn(&C::Ctx) -> Vec<BehaviourParam> + Send + Sync + 'static,
    ) -> Self {
        self.enter_params = Some(Box::new(params));
        self
    }

    #[must_use]
    pub fn with_exit_params(
        mut self,
        params: impl Fn(&C::Ctx) -> Vec<BehaviourParam> + Send + Sync + 'static,
    ) -> Self {
        self.exit_params = Some(Box::new(params));
        self
    }
}

struct TransitionCell<S, Ctx: ?Sized> {
    to: S,
    callback: Option<Arc<dyn Fn(&Ctx) + Send + Sync>>,
}

impl<S: Copy, Ctx: ?Sized> Clone for TransitionCell<S, Ctx> {
    fn clone(&self) -> Self {
        Self {
            to: self.to,
            callback: self.callback.clone(),
        }
    }
}

/// Per-entity behaviour machine. Runs indefinitely; there is no terminal
/// state.
pub struct StateMachine<S: EnumIndexed, F: EnumIndexed, C: Command> {
    current: Option<S>,
    table: Vec<Option<TransitionCell<S, C::Ctx>>>,
    behaviours: Vec<Option<StateBehaviour<F, C>>>,
    pending: Option<BehaviourActions<F, C>>,
    pool: Arc<rayon::ThreadPool>,
}

impl<S: EnumIndexed, F: EnumIndexed, C: Command> StateMachine<S, F, C> {
    /// Builds an empty machine over the dense `S::COUNT x F::COUNT` arena.
    /// Enum cardinalities are validated here.
    pub fn new(pool: Arc<rayon::ThreadPool>) -> Result<Self, CoreError> {
        if S::COUNT == 0 || F::COUNT == 0 {
            return Err(CoreError::StateArena(format!(
                "zero-cardinality arena ({} states x {} flags)",
                S::COUNT,
                F::COUNT
            )));
        }
        Ok(Self {
            current: None,
            table: (0..S::COUNT * F::COUNT).map(|_| None).collect(),
            behaviours: (0..S::COUNT).map(|_| None).collect(),
            pending: None,
            pool,
        })
    }

    #[must_use]
    pub fn current_state(&self) -> Option<S> {
        self.current
    }

    fn cell_index(state: S, flag: F) -> usize {
        state.index() * F::COUNT + flag.index()
    }

    /// Registers a state's behaviour. Duplicate registration is a no-op.
    pub fn add_behaviour(&mut self, state: S, behaviour: StateBehaviour<F, C>) {
        let slot = &mut self.behaviours[state.index()];
        if slot.is_none() {
            *slot = Some(behaviour);
        }
    }

    /// Populates one cell of the transition table.
    pub fn set_transition(
        &mut self,
        from: S,
        flag: F,
        to: S,
        callback: Option<Arc<dyn Fn(&C::Ctx) + Send + Sync>>,
    ) {
        self.table[Self::cell_index(from, flag)] = Some(TransitionCell { to, callback });
    }

    /// Clears one cell back to the "no transition" sentinel.
    pub fn clear_transition(&mut self, from: S, flag: F) {
        self.table[Self::cell_index(from, flag)] = None;
    }

    /// Switches state unconditionally, bypassing the transition table: runs
    /// the exit behaviour of the current state (skipped before any state has
    /// been entered), switches, runs the enter behaviour of the new state.
    /// Also used to enter the initial state.
    pub fn force_transition(&mut self, to: S, ctx: &C::Ctx) {
        self.run_exit(ctx);
        self.current = Some(to);
        self.run_enter(ctx);
    }

    /// Signals a stimulus flag. An unconfigured (state, flag) pair is the
    /// everyday no-op. Otherwise: exit behaviour, optional transition
    /// callback, re-check of the cell (a sentinel on re-lookup aborts before
    /// the switch), switch, enter behaviour.
    pub fn signal(&mut self, flag: F, ctx: &C::Ctx) {
        let Some(current) = self.current else {
            return;
        };
        let index = Self::cell_index(current, flag);
        let Some(cell) = self.table[index].clone() else {
            return;
        };

        self.run_exit(ctx);
        if let Some(callback) = &cell.callback {
            callback(ctx);
        }
        if self.table[index].is_none() {
            // cell cleared while the exit behaviour ran: abort the switch
            return;
        }
        self.current = Some(cell.to);
        self.run_enter(ctx);
    }

    /// Runs one full tick: obtain this tick's action set and drain it, then
    /// run the transition decision.
    pub fn tick(&mut self, ctx: &C::Ctx) {
        if !self.begin_tick(ctx) {
            return;
        }
        self.finish_tick(ctx);
    }

    /// Obtains this tick's `BehaviourActions` from the current state's
    /// provider. Returns false (no-op tick) when no behaviour is registered
    /// for the current state.
    pub fn begin_tick(&mut self, ctx: &C::Ctx) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        let Some(behaviour) = &self.behaviours[current.index()] else {
            return false;
        };
        let params = (behaviour.tick_params)(ctx);
        self.pending = Some(behaviour.provider.tick(ctx, &params));
        true
    }

    /// Executes and removes a single order-slice of the pending tick, for
    /// callers interleaving FSM work with other per-frame work.
    pub fn run_slice(&mut self, order: u32, lane: Lane, ctx: &C::Ctx) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let Some(commands) = pending.take_slice(order, lane) else {
            return;
        };
        match lane {
            Lane::Sequential => {
                for command in &commands {
                    command.execute(ctx);
                }
            }
            Lane::Parallel => {
                self.pool
                    .install(|| commands.par_iter().for_each(|c| c.execute(ctx)));
            }
        }
    }

    /// Drains whatever the partial driver left behind, then runs the tick's
    /// transition decision (which may signal a flag).
    pub fn finish_tick(&mut self, ctx: &C::Ctx) {
        let Some(mut pending) = self.pending.take() else {
            return;
        };
        self.drain(&mut pending, ctx);
        if let Some(decision) = pending.take_transition() {
            if let Some(flag) = decision(ctx) {
                self.signal(flag, ctx);
            }
        }
    }

    fn drain(&self, actions: &mut BehaviourActions<F, C>, ctx: &C::Ctx) {
        while let Some(order) = actions.next_order() {
            if let Some(commands) = actions.take_slice(order, Lane::Sequential) {
                for command in &commands {
                    command.execute(ctx);
                }
            }
            if let Some(commands) = actions.take_slice(order, Lane::Parallel) {
                self.pool
                    .install(|| commands.par_iter().for_each(|c| c.execute(ctx)));
            }
        }
    }

    fn run_enter(&self, ctx: &C::Ctx) {
        let Some(current) = self.current else {
            return;
        };
        let Some(behaviour) = &self.behaviours[current.index()] else {
            return;
        };
        let params = behaviour
            .enter_params
            .as_ref()
            .map_or_else(Vec::new, |f| f(ctx));
        let mut actions = behaviour.provider.on_enter(ctx, &params);
        self.drain(&mut actions, ctx);
    }

    fn run_exit(&self, ctx: &C::Ctx) {
        let Some(current) = self.current else {
            return;
        };
        let Some(behaviour) = &self.behaviours[current.index()] else {
            return;
        };
        let params = behaviour
            .exit_params
            .as_ref()
            .map_or_else(Vec::new, |f| f(ctx));
        let mut actions = behaviour.provider.on_exit(ctx, &params);
        self.drain(&mut actions, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestState {
        A,
        B,
    }

    impl EnumIndexed for TestState {
        const COUNT: usize = 2;
        fn index(self) -> usize {
            self as usize
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestFlag {
        F1,
        F2,
    }

    impl EnumIndexed for TestFlag {
        const COUNT: usize = 2;
        fn index(self) -> usize {
            self as usize
        }
    }

    #[derive(Default)]
    struct TestCtx {
        log: Mutex<Vec<u32>>,
        enters: AtomicUsize,
    }

    enum TestCommand {
        Log(u32),
        SlowLog(u32),
        CountEnter,
    }

    impl Command for TestCommand {
        type Ctx = TestCtx;

        fn execute(&self, ctx: &TestCtx) {
            match self {
                TestCommand::Log(v) => ctx.log.lock().unwrap().push(*v),
                TestCommand::SlowLog(v) => {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    ctx.log.lock().unwrap().push(*v);
                }
                TestCommand::CountEnter => {
                    ctx.enters.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    struct ScriptedBehaviour {
        build: fn() -> BehaviourActions<TestFlag, TestCommand>,
        enter: fn() -> BehaviourActions<TestFlag, TestCommand>,
    }

    impl BehaviourProvider<TestFlag, TestCommand> for ScriptedBehaviour {
        fn tick(
            &self,
            _ctx: &TestCtx,
            params: &[BehaviourParam],
        ) -> BehaviourActions<TestFlag, TestCommand> {
            // malformed parameter arrays produce an empty, no-op result
            let Some(_count) = params.first().and_then(BehaviourParam::as_int) else {
                return BehaviourActions::new();
            };
            (self.build)()
        }

        fn on_enter(
            &self,
            _ctx: &TestCtx,
            _params: &[BehaviourParam],
        ) -> BehaviourActions<TestFlag, TestCommand> {
            (self.enter)()
        }
    }

    fn empty_actions() -> BehaviourActions<TestFlag, TestCommand> {
        BehaviourActions::new()
    }

    fn enter_counter() -> BehaviourActions<TestFlag, TestCommand> {
        let mut actions = BehaviourActions::new();
        actions.push(0, Lane::Sequential, TestCommand::CountEnter);
        actions
    }

    fn pool() -> Arc<rayon::ThreadPool> {
        Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(4)
                .build()
                .unwrap(),
        )
    }

    fn machine_ab() -> StateMachine<TestState, TestFlag, TestCommand> {
        let mut machine = StateMachine::new(pool()).unwrap();
        machine.add_behaviour(
            TestState::A,
            StateBehaviour::new(
                ScriptedBehaviour {
                    build: empty_actions,
                    enter: empty_actions,
                },
                |_| vec![BehaviourParam::Int(1)],
            ),
        );
        machine.add_behaviour(
            TestState::B,
            StateBehaviour::new(
                ScriptedBehaviour {
                    build: empty_actions,
                    enter: enter_counter,
                },
                |_| vec![BehaviourParam::Int(1)],
            ),
        );
        machine.set_transition(TestState::A, TestFlag::F1, TestState::B, None);
        machine
    }

    #[test]
    fn test_signal_configured_flag_switches_and_enters_once() {
        let ctx = TestCtx::default();
        let mut machine = machine_ab();
        machine.force_transition(TestState::A, &ctx);

        machine.signal(TestFlag::F1, &ctx);
        assert_eq!(machine.current_state(), Some(TestState::B));
        assert_eq!(ctx.enters.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_signal_unconfigured_flag_is_a_no_op() {
        let ctx = TestCtx::default();
        let mut machine = machine_ab();
        machine.force_transition(TestState::A, &ctx);

        machine.signal(TestFlag::F2, &ctx);
        assert_eq!(machine.current_state(), Some(TestState::A));
        assert_eq!(ctx.enters.load(Ordering::SeqCst), 0);
        assert!(ctx.log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_initial_forced_transition_runs_enter_only() {
        let ctx = TestCtx::default();
        let mut machine = machine_ab();
        // no state has been entered yet, so no exit behaviour runs
        machine.force_transition(TestState::B, &ctx);
        assert_eq!(machine.current_state(), Some(TestState::B));
        assert_eq!(ctx.enters.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transition_callback_runs_between_exit_and_switch() {
        let ctx = TestCtx::default();
        let mut machine = machine_ab();
        machine.force_transition(TestState::A, &ctx);
        machine.set_transition(
            TestState::A,
            TestFlag::F2,
            TestState::B,
            Some(Arc::new(|ctx: &TestCtx| {
                ctx.log.lock().unwrap().push(77);
            })),
        );
        machine.signal(TestFlag::F2, &ctx);
        assert_eq!(machine.current_state(), Some(TestState::B));
        assert_eq!(*ctx.log.lock().unwrap(), vec![77]);
    }

    #[test]
    fn test_sequential_actions_run_in_registration_order() {
        let ctx = TestCtx::default();
        let mut machine = StateMachine::<TestState, TestFlag, TestCommand>::new(pool()).unwrap();
        machine.add_behaviour(
            TestState::A,
            StateBehaviour::new(
                ScriptedBehaviour {
                    build: || {
                        let mut actions = BehaviourActions::new();
                        actions.push(0, Lane::Sequential, TestCommand::Log(1));
                        actions.push(0, Lane::Sequential, TestCommand::Log(2));
                        actions.push(0, Lane::Sequential, TestCommand::Log(3));
                        actions
                    },
                    enter: empty_actions,
                },
                |_| vec![BehaviourParam::Int(1)],
            ),
        );
        machine.force_transition(TestState::A, &ctx);
        machine.tick(&ctx);
        assert_eq!(*ctx.log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_later_order_never_starts_before_earlier_order_drains() {
        let ctx = TestCtx::default();
        let mut machine = StateMachine::<TestState, TestFlag, TestCommand>::new(pool()).unwrap();
        machine.add_behaviour(
            TestState::A,
            StateBehaviour::new(
                ScriptedBehaviour {
                    build: || {
                        let mut actions = BehaviourActions::new();
                        for _ in 0..8 {
                            actions.push(0, Lane::Parallel, TestCommand::SlowLog(0));
                        }
                        actions.push(0, Lane::Sequential, TestCommand::Log(0));
                        actions.push(1, Lane::Sequential, TestCommand::Log(1));
                        actions.push(1, Lane::Parallel, TestCommand::Log(1));
                        actions
                    },
                    enter: empty_actions,
                },
                |_| vec![BehaviourParam::Int(1)],
            ),
        );
        machine.force_transition(TestState::A, &ctx);
        machine.tick(&ctx);

        let log = ctx.log.lock().unwrap();
        assert_eq!(log.len(), 11);
        assert!(log[..9].iter().all(|v| *v == 0), "order 0 drains first");
        assert!(log[9..].iter().all(|v| *v == 1));
    }

    #[test]
    fn test_transition_decision_runs_after_buckets_drain() {
        let ctx = TestCtx::default();
        let mut machine = StateMachine::<TestState, TestFlag, TestCommand>::new(pool()).unwrap();
        machine.add_behaviour(
            TestState::A,
            StateBehaviour::new(
                ScriptedBehaviour {
                    build: || {
                        let mut actions = BehaviourActions::new();
                        actions.push(0, Lane::Parallel, TestCommand::Log(5));
                        actions.on_transition(|ctx: &TestCtx| {
                            // every bucket has drained by the time this runs
                            assert_eq!(ctx.log.lock().unwrap().len(), 1);
                            Some(TestFlag::F1)
                        });
                        actions
                    },
                    enter: empty_actions,
                },
                |_| vec![BehaviourParam::Int(1)],
            ),
        );
        machine.add_behaviour(
            TestState::B,
            StateBehaviour::new(
                ScriptedBehaviour {
                    build: empty_actions,
                    enter: enter_counter,
                },
                |_| vec![BehaviourParam::Int(1)],
            ),
        );
        machine.set_transition(TestState::A, TestFlag::F1, TestState::B, None);
        machine.force_transition(TestState::A, &ctx);
        machine.tick(&ctx);
        assert_eq!(machine.current_state(), Some(TestState::B));
        assert_eq!(ctx.enters.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_params_yield_a_no_op_tick() {
        let ctx = TestCtx::default();
        let mut machine = StateMachine::<TestState, TestFlag, TestCommand>::new(pool()).unwrap();
        machine.add_behaviour(
            TestState::A,
            StateBehaviour::new(
                ScriptedBehaviour {
                    build: || {
                        let mut actions = BehaviourActions::new();
                        actions.push(0, Lane::Sequential, TestCommand::Log(9));
                        actions
                    },
                    enter: empty_actions,
                },
                // wrong parameter type: provider expects a leading Int
                |_| vec![BehaviourParam::Float(1.0)],
            ),
        );
        machine.force_transition(TestState::A, &ctx);
        machine.tick(&ctx);
        assert!(ctx.log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_tick_without_registered_behaviour_is_a_no_op() {
        let ctx = TestCtx::default();
        let mut machine = StateMachine::<TestState, TestFlag, TestCommand>::new(pool()).unwrap();
        machine.set_transition(TestState::A, TestFlag::F1, TestState::B, None);
        machine.force_transition(TestState::A, &ctx);
        machine.tick(&ctx);
        assert!(ctx.log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_partial_tick_drives_single_slices() {
        let ctx = TestCtx::default();
        let mut machine = StateMachine::<TestState, TestFlag, TestCommand>::new(pool()).unwrap();
        machine.add_behaviour(
            TestState::A,
            StateBehaviour::new(
                ScriptedBehaviour {
                    build: || {
                        let mut actions = BehaviourActions::new();
                        actions.push(0, Lane::Sequential, TestCommand::Log(1));
                        actions.push(1, Lane::Parallel, TestCommand::Log(2));
                        actions
                    },
                    enter: empty_actions,
                },
                |_| vec![BehaviourParam::Int(1)],
            ),
        );
        machine.force_transition(TestState::A, &ctx);

        assert!(machine.begin_tick(&ctx));
        machine.run_slice(0, Lane::Sequential, &ctx);
        assert_eq!(*ctx.log.lock().unwrap(), vec![1]);
        machine.run_slice(1, Lane::Parallel, &ctx);
        assert_eq!(*ctx.log.lock().unwrap(), vec![1, 2]);
        machine.finish_tick(&ctx);
        assert_eq!(ctx.log.lock().unwrap().len(), 2);
    }
}
