//! Best-first search over simulated sessions.
//!
//! Key invariants:
//! - The real session is never written; every node owns a simulated layer
//!   directly over the root store.
//! - Children are simulated on a copy of their parent's layer.
//! - The goal test happens when an entry is popped, so with a monotone
//!   heuristic the first returned path is optimal.
//! - Ties are broken by path length, then by declaration order of the
//!   actions, which makes results reproducible.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ExecutionError, PlanResult};
use crate::knowledge::{KnowledgeBase, ObjectId};
use crate::operator::StateTransition;
use crate::session::{RootHandle, SessionView, SimulatedSession};

use super::blocking::{blocked_actions, BlockingReason};
use super::heuristic::{CostBenefitRatio, CostFunction, SearchHeuristic, StaticCosts};
use super::limits::SearchLimits;
use super::path::Path;
use super::target::{Target, TargetOrigin};

/// Why a search ended without a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoPathReason {
    /// The reachable state space was explored completely.
    Exhausted,
    /// The expansion or time budget ran out.
    BudgetExhausted,
    /// The search was cancelled from outside.
    Cancelled,
    /// No usable target was requested.
    NoTargets,
}

/// Result of one search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Best path found.
    Found(Path),
    /// No target was reached.
    NoPath(NoPathReason),
}

/// Counters of one search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Nodes whose successors were generated.
    pub expansions: usize,
    /// Successor states simulated.
    pub generated: usize,
    /// Successors dropped because an equal state was already reached at no higher cost.
    pub pruned: usize,
    /// Frontier entries left when the search ended.
    pub open: usize,
    /// Wall-clock duration.
    pub elapsed_ms: u64,
}

/// Outcome plus counters.
#[derive(Debug, Clone)]
pub struct SearchReport {
    /// How the search ended.
    pub outcome: SearchOutcome,
    /// Search counters.
    pub stats: SearchStats,
    /// Requested targets left out of the search, with the reason of their
    /// first blocked action.
    pub blocked: Vec<(Target, BlockingReason)>,
}

impl SearchReport {
    /// The path found, if any.
    #[must_use]
    pub const fn path(&self) -> Option<&Path> {
        match &self.outcome {
            SearchOutcome::Found(path) => Some(path),
            SearchOutcome::NoPath(_) => None,
        }
    }

    /// Consumes the report and returns the path found, if any.
    #[must_use]
    pub fn into_path(self) -> Option<Path> {
        match self.outcome {
            SearchOutcome::Found(path) => Some(path),
            SearchOutcome::NoPath(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EntryKind {
    // Declared first so that a goal pops before an expansion with the same key.
    Goal { target: usize },
    Expand,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct FrontierEntry {
    score: OrderedFloat<f64>,
    len: usize,
    order: Vec<usize>,
    kind: EntryKind,
    node: usize,
}

struct Node {
    session: SimulatedSession,
    actions: Vec<ObjectId>,
    order: Vec<usize>,
    cost: f64,
}

type Fingerprint = [u8; 32];

/// Cost-benefit search engine.
///
/// The engine is immutable and can be shared between threads; every call to
/// `search` owns its frontier.
#[derive(Clone)]
pub struct SearchEngine {
    cost: Arc<dyn CostFunction>,
    heuristic: Arc<dyn SearchHeuristic>,
    limits: SearchLimits,
}

impl SearchEngine {
    /// Engine with static costs and the cost/benefit ratio heuristic.
    #[must_use]
    pub fn new(limits: SearchLimits) -> Self {
        Self {
            cost: Arc::new(StaticCosts),
            heuristic: Arc::new(CostBenefitRatio),
            limits,
        }
    }

    /// Replaces the cost function.
    #[must_use]
    pub fn with_cost_function(mut self, cost: Arc<dyn CostFunction>) -> Self {
        self.cost = cost;
        self
    }

    /// Replaces the heuristic.
    #[must_use]
    pub fn with_heuristic(mut self, heuristic: Arc<dyn SearchHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Expansion and time limits.
    #[must_use]
    pub const fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    /// Name of the configured heuristic.
    #[must_use]
    pub fn heuristic_name(&self) -> &'static str {
        self.heuristic.name()
    }

    /// Searches for the best path to any of `targets`.
    ///
    /// # Errors
    ///
    /// `UnknownAction` if a target names an object outside the knowledge
    /// base; structural condition errors abort the search.
    pub fn search(&self, root: &RootHandle, targets: &[Target]) -> PlanResult<SearchReport> {
        self.search_with(root, targets, TargetOrigin::Derived, None)
    }

    /// Like `search`, but stops with `NoPathReason::Cancelled` once `cancel` is set.
    ///
    /// # Errors
    ///
    /// See `search`.
    pub fn search_cancellable(
        &self,
        root: &RootHandle,
        targets: &[Target],
        cancel: Option<&AtomicBool>,
    ) -> PlanResult<SearchReport> {
        self.search_with(root, targets, TargetOrigin::Derived, cancel)
    }

    /// Searches on behalf of `origin`.
    ///
    /// Targets selected by the user may contain permanently relevant
    /// actions; derived targets containing one are blocked. Such actions are
    /// never planned as intermediate steps.
    ///
    /// # Errors
    ///
    /// See `search`.
    pub fn search_with(
        &self,
        root: &RootHandle,
        targets: &[Target],
        origin: TargetOrigin,
        cancel: Option<&AtomicBool>,
    ) -> PlanResult<SearchReport> {
        let started = Instant::now();
        let budget = Duration::from_millis(self.limits.max_duration_ms);
        let knowledge = Arc::clone(root.knowledge());
        let start = SimulatedSession::from_root(root.clone());

        let blocked_actions = blocked_actions(&start)?;
        let (targets, blocked) = usable_targets(&knowledge, &blocked_actions, targets, origin)?;
        let mut stats = SearchStats::default();
        if targets.is_empty() {
            return Ok(finish(SearchOutcome::NoPath(NoPathReason::NoTargets), stats, blocked, started));
        }
        let target_costs: Vec<f64> = targets
            .iter()
            .map(|t| t.actions().iter().map(|a| self.action_cost(*a, &start)).sum())
            .collect();

        let candidates: Vec<(usize, &StateTransition)> = knowledge
            .operators()
            .iter()
            .enumerate()
            .filter(|(_, op)| {
                !blocked_actions.contains_key(&op.action)
                    && knowledge.object(op.action).is_some_and(|o| !o.properties.target_only)
            })
            .collect();

        let mut seen: HashMap<Fingerprint, f64> = HashMap::new();
        seen.insert(fingerprint(&start), 0.0);
        let mut nodes = vec![Node {
            session: start,
            actions: Vec::new(),
            order: Vec::new(),
            cost: 0.0,
        }];
        let mut frontier = BinaryHeap::new();
        frontier.push(Reverse(FrontierEntry {
            score: OrderedFloat(self.bound(0.0, &targets, &target_costs)),
            len: 0,
            order: Vec::new(),
            kind: EntryKind::Expand,
            node: 0,
        }));

        let outcome = loop {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                break SearchOutcome::NoPath(NoPathReason::Cancelled);
            }
            let Some(Reverse(entry)) = frontier.pop() else {
                break SearchOutcome::NoPath(NoPathReason::Exhausted);
            };
            if let EntryKind::Goal { target } = entry.kind {
                break SearchOutcome::Found(self.path_to(&nodes[entry.node], &targets, &target_costs, target));
            }

            let node = &nodes[entry.node];
            let reached = self.best_reached(node, &targets, &target_costs)?;
            if let Some((target, score)) = reached {
                if score <= entry.score.0 {
                    break SearchOutcome::Found(self.path_to(node, &targets, &target_costs, target));
                }
            }
            if stats.expansions >= self.limits.max_expansions || started.elapsed() >= budget {
                frontier.push(Reverse(entry));
                break SearchOutcome::NoPath(NoPathReason::BudgetExhausted);
            }
            if let Some((target, score)) = reached {
                frontier.push(Reverse(FrontierEntry {
                    score: OrderedFloat(score),
                    len: entry.len,
                    order: entry.order.clone(),
                    kind: EntryKind::Goal { target },
                    node: entry.node,
                }));
            }
            stats.expansions += 1;

            let mut children = Vec::new();
            for (decl, operator) in &candidates {
                if node.actions.last() == Some(&operator.action) {
                    continue;
                }
                if !operator.is_applicable(&node.session)? {
                    continue;
                }
                let session = node.session.copy();
                let cost = node.cost + self.action_cost(operator.action, &session);
                operator.simulate(&session)?;
                stats.generated += 1;

                let print = fingerprint(&session);
                if seen.get(&print).is_some_and(|best| *best <= cost) {
                    stats.pruned += 1;
                    continue;
                }
                seen.insert(print, cost);

                let mut actions = node.actions.clone();
                actions.push(operator.action);
                let mut order = node.order.clone();
                order.push(*decl);
                children.push(Node {
                    session,
                    actions,
                    order,
                    cost,
                });
            }

            for child in children {
                let idx = nodes.len();
                frontier.push(Reverse(FrontierEntry {
                    score: OrderedFloat(self.bound(child.cost, &targets, &target_costs)),
                    len: child.actions.len(),
                    order: child.order.clone(),
                    kind: EntryKind::Expand,
                    node: idx,
                }));
                nodes.push(child);
            }
        };

        stats.open = frontier.len();
        let report = finish(outcome, stats, blocked, started);
        match &report.outcome {
            SearchOutcome::Found(path) => info!(
                path = %path,
                expansions = report.stats.expansions,
                elapsed_ms = report.stats.elapsed_ms,
                heuristic = self.heuristic.name(),
                "search found path"
            ),
            SearchOutcome::NoPath(reason) => info!(
                ?reason,
                expansions = report.stats.expansions,
                elapsed_ms = report.stats.elapsed_ms,
                "search found no path"
            ),
        }
        Ok(report)
    }

    fn action_cost(&self, action: ObjectId, session: &dyn SessionView) -> f64 {
        let cost = self.cost.cost(action, session);
        if cost.is_finite() && cost >= 0.0 {
            cost
        } else {
            debug!(%action, cost, "invalid action cost clamped to zero");
            0.0
        }
    }

    /// Lowest score any target could still reach from a node with `cost`.
    fn bound(&self, cost: f64, targets: &[Target], target_costs: &[f64]) -> f64 {
        targets
            .iter()
            .zip(target_costs)
            .map(|(t, tc)| self.heuristic.score(cost, *tc, t.benefit()))
            .fold(f64::INFINITY, f64::min)
    }

    /// Best target reached in `node`, with its score.
    fn best_reached(
        &self,
        node: &Node,
        targets: &[Target],
        target_costs: &[f64],
    ) -> PlanResult<Option<(usize, f64)>> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, target) in targets.iter().enumerate() {
            if !target.is_reached(&node.session)? {
                continue;
            }
            let score = self.heuristic.score(node.cost, target_costs[idx], target.benefit());
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((idx, score));
            }
        }
        Ok(best)
    }

    fn path_to(&self, node: &Node, targets: &[Target], target_costs: &[f64], target: usize) -> Path {
        debug!(actions = node.actions.len(), cost = node.cost, heuristic = self.heuristic.name(), "goal reached");
        Path::new(
            node.actions.clone(),
            targets[target].clone(),
            node.cost,
            target_costs[target],
        )
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(SearchLimits::default())
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("heuristic", &self.heuristic.name())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

type TargetSplit = (Vec<Target>, Vec<(Target, BlockingReason)>);

/// Splits the requested targets into searchable and blocked ones.
fn usable_targets(
    knowledge: &KnowledgeBase,
    blocked_actions: &BTreeMap<ObjectId, BlockingReason>,
    targets: &[Target],
    origin: TargetOrigin,
) -> PlanResult<TargetSplit> {
    let mut usable = Vec::with_capacity(targets.len());
    let mut blocked = Vec::new();
    'targets: for target in targets {
        for action in target.actions() {
            knowledge
                .object(*action)
                .filter(|o| o.is_action())
                .ok_or(ExecutionError::UnknownAction { action: *action })?;
            let reason = match blocked_actions.get(action) {
                Some(BlockingReason::PermanentlyRelevant) if origin == TargetOrigin::UserSelected => None,
                other => other.copied(),
            };
            if let Some(reason) = reason {
                debug!(target = %target, ?reason, "blocked target skipped");
                blocked.push((target.clone(), reason));
                continue 'targets;
            }
        }
        usable.push(target.clone());
    }
    Ok((usable, blocked))
}

/// Stable hash of everything the simulation changed relative to the root.
fn fingerprint(session: &SimulatedSession) -> Fingerprint {
    let layer = session.layer();
    let mut hasher = blake3::Hasher::new();
    for object in layer.decorated_objects() {
        if let Some(value) = layer.changed_value(object) {
            hasher.update(&object.raw().to_le_bytes());
            value.hash_into(&mut hasher);
        }
    }
    *hasher.finalize().as_bytes()
}

fn finish(
    outcome: SearchOutcome,
    mut stats: SearchStats,
    blocked: Vec<(Target, BlockingReason)>,
    started: Instant,
) -> SearchReport {
    stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    SearchReport {
        outcome,
        stats,
        blocked,
    }
}
