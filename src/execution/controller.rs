//! Execution controller: commits paths and walks them step by step.
//!
//! Key invariants:
//! - A committed sequence is never modified; it is replaced or discarded.
//! - Before an action becomes current, it must be applicable on the real
//!   session and the rest of the path must still work out when simulated
//!   cumulatively over the real session.
//! - Every indication the planner placed is retracted when its path ends,
//!   whether completed, aborted or discarded.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::blackboard::FactStorage;
use crate::config::PlannerConfig;
use crate::error::{ExecutionError, PlanError, PlanResult, ValidationError};
use crate::fact::{Fact, SourceId};
use crate::knowledge::{MethodId, ObjectId};
use crate::operator::{action_applicable, AnsweredQuestions, CompletionCheck};
use crate::runtime::SearchRuntime;
use crate::search::{CostFunction, Path, SearchEngine, SearchHeuristic, SearchReport, Target, TargetOrigin};
use crate::session::{ProtocolEntry, Session, SessionView, SimulatedSession};
use crate::value::{Indication, Value};

use super::situation::Situation;
use super::state::{ExecutionState, PlanState};

/// The cost-benefit planner.
///
/// Immutable and shareable across sessions; all per-session state lives in
/// the session's `ExecutionState`. Searches run inline unless a
/// `SearchRuntime` is attached.
pub struct Planner {
    config: PlannerConfig,
    engine: SearchEngine,
    completion: Arc<dyn CompletionCheck>,
    retract_pattern: Regex,
    runtime: Option<Arc<SearchRuntime>>,
}

impl Planner {
    /// Creates a planner with static costs, the cost/benefit heuristic and
    /// answered-questions completion.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid configuration.
    pub fn new(config: PlannerConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        let retract_pattern = config.compile_retract_pattern()?;
        let engine = SearchEngine::new(config.search.clone());
        Ok(Self {
            config,
            engine,
            completion: Arc::new(AnsweredQuestions),
            retract_pattern,
            runtime: None,
        })
    }

    /// Replaces the search cost function.
    #[must_use]
    pub fn with_cost_function(mut self, cost: Arc<dyn CostFunction>) -> Self {
        self.engine = self.engine.with_cost_function(cost);
        self
    }

    /// Replaces the search heuristic.
    #[must_use]
    pub fn with_heuristic(mut self, heuristic: Arc<dyn SearchHeuristic>) -> Self {
        self.engine = self.engine.with_heuristic(heuristic);
        self
    }

    /// Replaces the check that decides when an action is done.
    #[must_use]
    pub fn with_completion_check(mut self, completion: Arc<dyn CompletionCheck>) -> Self {
        self.completion = completion;
        self
    }

    /// Runs searches on a shared worker pool. A search that does not finish
    /// within the configured `runtime.join_timeout_ms` is cancelled.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Arc<SearchRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Starts a worker pool of its own, sized by the `runtime` config section.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid runtime configuration.
    pub fn with_background_search(self) -> Result<Self, ValidationError> {
        let runtime = SearchRuntime::new(self.engine.clone(), &self.config.runtime)?;
        Ok(self.with_runtime(Arc::new(runtime)))
    }

    /// Planner configuration.
    #[must_use]
    pub const fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Search engine used for planning.
    #[must_use]
    pub const fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// Phase of the session's plan; `Idle` before the first request.
    #[must_use]
    pub fn current_state(&self, session: &Session) -> PlanState {
        session.execution().map_or(PlanState::Idle, ExecutionState::state)
    }

    /// Action the user should carry out now.
    #[must_use]
    pub fn current_action(&self, session: &Session) -> Option<ObjectId> {
        session.execution().and_then(ExecutionState::current_action)
    }

    /// Last action of the most recently aborted path.
    #[must_use]
    pub fn unreached_target(&self, session: &Session) -> Option<ObjectId> {
        session.execution().and_then(ExecutionState::unreached_target)
    }

    /// Conflicting questions of the last observed situation.
    #[must_use]
    pub fn conflicting_objects(&self, session: &Session) -> BTreeSet<ObjectId> {
        session
            .execution()
            .map(|s| s.conflicting().clone())
            .unwrap_or_default()
    }

    /// Per-session planner state, if the planner ever ran on `session`.
    #[must_use]
    pub fn execution_state<'a>(&self, session: &'a Session) -> Option<&'a ExecutionState> {
        session.execution()
    }

    /// Overrides the configured manual mode for one session.
    pub fn set_manual_mode(&self, session: &mut Session, manual: bool) {
        let mut state = session.take_execution();
        state.manual_mode = Some(manual);
        session.restore_execution(state);
    }

    /// Plans towards targets the user selected explicitly.
    ///
    /// Target benefits are raised to `user_selected_benefit`, and the plan
    /// is not discarded when the strategic situation changes. Returns `None`
    /// if no target is reachable.
    ///
    /// # Errors
    ///
    /// Structural errors from the search.
    pub fn request_plan(&self, session: &mut Session, targets: &[Target]) -> PlanResult<Option<Path>> {
        let boosted: Vec<Target> = targets
            .iter()
            .map(|t| t.with_benefit(self.config.user_selected_benefit))
            .collect();
        self.with_state(session, |state, session| {
            self.reset_path(state, session, false);
            state.undiscriminated = None;
            state.unreached_target = None;
            self.plan(state, session, &boosted, true)
        })
    }

    /// Plans towards the targets of a strategic situation.
    ///
    /// # Errors
    ///
    /// Structural errors from the search.
    pub fn request_plan_for(&self, session: &mut Session, situation: &Situation) -> PlanResult<Option<Path>> {
        self.with_state(session, |state, session| {
            self.reset_path(state, session, false);
            self.record_conflicts(state, session, &situation.conflicting);
            state.undiscriminated = Some(situation.undiscriminated.clone());
            state.unreached_target = None;
            self.plan(state, session, &situation.targets, false)
        })
    }

    /// Advances execution after the session changed and returns the action
    /// to carry out next.
    ///
    /// With a `situation`, a situation-based plan whose undiscriminated
    /// solutions or conflicting questions changed is discarded and replaced.
    /// Without a committed path, a plan is calculated unless manual mode is
    /// on or the agenda still holds unfinished actions placed by someone
    /// else; a path to the unreached target of an aborted explicit request
    /// is retried first.
    ///
    /// # Errors
    ///
    /// Structural errors from condition evaluation or the search.
    pub fn advance(&self, session: &mut Session, situation: Option<&Situation>) -> PlanResult<Option<ObjectId>> {
        self.with_state(session, |state, session| {
            if let Some(situation) = situation {
                if state.has_path() && self.situation_changed(state, session, situation) {
                    info!(session = %session.id(), "situation changed, discarding path");
                    self.reset_path(state, session, false);
                    state.state = PlanState::Replanning;
                }
            }

            if state.has_path() {
                return self.activate_next(state, session);
            }

            if let Some(unreached) = state.unreached_target {
                if state.undiscriminated.is_none() && !state.aborted_manually_set_target {
                    debug!(session = %session.id(), target = %unreached, "retrying unreached target");
                    let target = Target::single(unreached, self.config.user_selected_benefit)?;
                    state.unreached_target = None;
                    if self.plan(state, session, &[target], true)?.is_some() {
                        return Ok(state.current_action());
                    }
                }
            }

            if state.manual_mode.unwrap_or(self.config.manual_mode) {
                return Ok(None);
            }
            match situation {
                Some(situation) if !situation.targets.is_empty() => {
                    if let Some(pending) = self.pending_foreign_action(state, session) {
                        debug!(session = %session.id(), action = %pending, "agenda busy, planning deferred");
                        return Ok(None);
                    }
                    self.record_conflicts(state, session, &situation.conflicting);
                    state.undiscriminated = Some(situation.undiscriminated.clone());
                    self.plan(state, session, &situation.targets, false)?;
                    Ok(state.current_action())
                }
                _ => Ok(None),
            }
        })
    }

    /// Records that the user carries out `action` instead of the indicated one.
    ///
    /// A different action interrupts the current path: it is discarded, its
    /// last action becomes the unreached target and no automatic retry
    /// towards it happens.
    ///
    /// # Errors
    ///
    /// `UnknownAction` if `action` is not an action container.
    pub fn force_action(&self, session: &mut Session, action: ObjectId) -> PlanResult<()> {
        if !session.knowledge().object(action).is_some_and(|o| o.is_action()) {
            return Err(ExecutionError::UnknownAction { action }.into());
        }
        self.with_state(session, |state, session| {
            match state.current_action() {
                Some(current) if current != action => {
                    info!(session = %session.id(), indicated = %current, chosen = %action, "path interrupted manually");
                    self.reset_path(state, session, true);
                    state.aborted_manually_set_target = true;
                    state.state = PlanState::Aborted;
                }
                _ => {}
            }
            Ok(())
        })
    }

    fn with_state<R>(
        &self,
        session: &mut Session,
        f: impl FnOnce(&mut ExecutionState, &mut Session) -> PlanResult<R>,
    ) -> PlanResult<R> {
        let mut state = session.take_execution();
        let result = f(&mut state, session);
        session.restore_execution(state);
        result
    }

    fn plan(
        &self,
        state: &mut ExecutionState,
        session: &mut Session,
        targets: &[Target],
        explicit: bool,
    ) -> PlanResult<Option<Path>> {
        state.state = PlanState::Planning;
        let started = Instant::now();
        let origin = if explicit {
            TargetOrigin::UserSelected
        } else {
            TargetOrigin::Derived
        };
        let report = match self.run_search(session, targets, origin) {
            Ok(report) => report,
            Err(e) => {
                state.state = PlanState::Idle;
                return Err(e);
            }
        };
        for (target, reason) in &report.blocked {
            debug!(session = %session.id(), %target, ?reason, "target blocked");
        }
        let Some(path) = report.into_path() else {
            if explicit {
                state.aborted_manually_set_target = true;
            }
            state.state = PlanState::Idle;
            info!(session = %session.id(), "no reachable target");
            return Ok(None);
        };
        self.commit(state, session, &path, started.elapsed());
        self.activate_next(state, session)?;
        Ok(Some(path))
    }

    fn run_search(&self, session: &Session, targets: &[Target], origin: TargetOrigin) -> PlanResult<SearchReport> {
        let root = session.root_handle();
        let Some(runtime) = &self.runtime else {
            return self.engine.search_with(&root, targets, origin, None);
        };
        let handle = match runtime.submit(Arc::new(self.engine.clone()), root.clone(), targets.to_vec(), origin) {
            Ok(handle) => handle,
            Err(PlanError::Execution(ExecutionError::QueueFull { capacity })) => {
                debug!(session = %session.id(), capacity, "search queue full, searching inline");
                return self.engine.search_with(&root, targets, origin, None);
            }
            Err(e) => return Err(e),
        };
        let timeout = Duration::from_millis(self.config.runtime.join_timeout_ms);
        let result = handle.join_timeout(timeout);
        if let Err(PlanError::Execution(ExecutionError::Timeout { .. })) = &result {
            warn!(session = %session.id(), "search timed out, cancelling");
            handle.cancel();
        }
        result
    }

    /// First unfinished agenda action this planner did not place.
    fn pending_foreign_action(&self, state: &ExecutionState, session: &Session) -> Option<ObjectId> {
        session.agenda().unwrap_or_default().into_iter().find(|action| {
            !state.indicated_facts.iter().any(|f| f.object == *action) && !self.completion.is_done(*action, session)
        })
    }

    fn commit(&self, state: &mut ExecutionState, session: &mut Session, path: &Path, elapsed: Duration) {
        let sequence: Arc<[ObjectId]> = path.sequence().into();
        for (order, action) in sequence.iter().enumerate() {
            self.retract_questions(session, *action);
            let fact = Fact::derived(
                *action,
                Value::Indication(Indication::indicated(order)),
                MethodId::COST_BENEFIT,
                SourceId::new(),
            );
            session.add_fact(fact.clone());
            state.indicated_facts.push(fact);
        }

        let time = session.propagation_time();
        session.protocol_mut().push(ProtocolEntry::CalculatedPath {
            time,
            actions: sequence.to_vec(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
        info!(session = %session.id(), path = %path, "path committed");

        state.sequence = Some(sequence);
        state.cursor = -1;
        state.state = PlanState::Executing;
    }

    /// Moves the cursor to the next action that still needs doing.
    fn activate_next(&self, state: &mut ExecutionState, session: &mut Session) -> PlanResult<Option<ObjectId>> {
        loop {
            let Some(sequence) = state.sequence.clone() else {
                return Ok(None);
            };
            if let Some(current) = state.current_action() {
                if !self.completion.is_done(current, &*session) {
                    return Ok(Some(current));
                }
                self.finish_action(state, session, current)?;
            }

            let next = state.cursor + 1;
            let idx = usize::try_from(next).unwrap_or_default();
            if idx >= sequence.len() {
                info!(session = %session.id(), "path completed");
                self.reset_path(state, session, false);
                state.state = PlanState::Completed;
                return Ok(None);
            }
            if idx > 0 {
                self.retract_questions(session, sequence[idx - 1]);
            }
            state.cursor = next;
            if !self.check_path(session, &sequence[idx..])? {
                warn!(session = %session.id(), action = %sequence[idx], "path no longer applicable, aborting");
                self.reset_path(state, session, true);
                state.state = PlanState::Aborted;
                return Ok(None);
            }
            state.state = PlanState::Executing;
            if !self.completion.is_done(sequence[idx], &*session) {
                debug!(session = %session.id(), action = %sequence[idx], "action activated");
                return Ok(Some(sequence[idx]));
            }
        }
    }

    /// Applies a completed action's effects to the real session.
    fn finish_action(&self, state: &mut ExecutionState, session: &mut Session, action: ObjectId) -> PlanResult<()> {
        if let Some(operator) = session.knowledge_arc().operator(action) {
            session.propagation().open();
            let fired = operator.fire(&*session);
            session.propagation().commit();
            fired?;
        }
        if let Some(pos) = state.indicated_facts.iter().position(|f| f.object == action) {
            let fact = state.indicated_facts.remove(pos);
            session.remove_fact(&fact);
        }
        debug!(session = %session.id(), %action, "action done");
        Ok(())
    }

    /// Re-validates the remaining path: the first action on the real
    /// session, then all of them cumulatively on a simulation over it.
    fn check_path(&self, session: &Session, remaining: &[ObjectId]) -> PlanResult<bool> {
        let Some(first) = remaining.first() else {
            return Ok(true);
        };
        if !action_applicable(session, *first)? {
            return Ok(false);
        }
        let knowledge = session.knowledge_arc();
        let simulation = SimulatedSession::over(session);
        for action in remaining {
            if !action_applicable(&simulation, *action)? {
                return Ok(false);
            }
            if let Some(operator) = knowledge.operator(*action) {
                operator.simulate(&simulation)?;
            }
        }
        Ok(true)
    }

    /// Drops the committed path and retracts every indication placed for it.
    fn reset_path(&self, state: &mut ExecutionState, session: &Session, record_unreached: bool) {
        if record_unreached {
            if let Some(sequence) = &state.sequence {
                let pending = usize::try_from(state.cursor).map_or(true, |c| c < sequence.len());
                if pending {
                    state.unreached_target = sequence.last().copied();
                }
            }
        }
        for fact in state.indicated_facts.drain(..) {
            session.remove_fact(&fact);
        }
        state.sequence = None;
        state.cursor = -1;
        state.aborted_manually_set_target = false;
    }

    /// Removes user answers of retractable questions so `action` can be asked again.
    fn retract_questions(&self, session: &Session, action: ObjectId) {
        let knowledge = session.knowledge_arc();
        for question in knowledge.questions_of(action) {
            let retractable = knowledge.object(question).is_some_and(|o| {
                !o.properties.check_once
                    && matches!(o.properties.choices.as_slice(), [only] if self.retract_pattern.is_match(only))
            });
            if !retractable {
                continue;
            }
            for fact in session.store().all_facts(question) {
                if knowledge.methods().is_source(fact.method) {
                    session.remove_fact(&fact);
                }
            }
        }
    }

    fn situation_changed(&self, state: &mut ExecutionState, session: &mut Session, situation: &Situation) -> bool {
        let conflicts_changed = self.record_conflicts(state, session, &situation.conflicting);
        let Some(previous) = &state.undiscriminated else {
            return false;
        };
        conflicts_changed || *previous != situation.undiscriminated
    }

    /// Stores the conflicting questions; returns true if they changed.
    fn record_conflicts(&self, state: &mut ExecutionState, session: &mut Session, conflicting: &BTreeSet<ObjectId>) -> bool {
        if state.conflicting == *conflicting {
            return false;
        }
        let added: Vec<String> = conflicting
            .difference(&state.conflicting)
            .map(|q| session.knowledge().name_of(*q).map_or_else(|| q.to_string(), str::to_string))
            .collect();
        if !added.is_empty() {
            let message = format!("conflicting questions: {}", added.join(", "));
            warn!(session = %session.id(), "{message}");
            let time = session.propagation_time();
            session.protocol_mut().push(ProtocolEntry::Text { time, message });
        }
        state.conflicting = conflicting.clone();
        true
    }
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
