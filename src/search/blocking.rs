//! Actions that can never be part of a plan in the current session.
//!
//! An action is blocked when it is contra-indicated, when it is permanently
//! relevant, or when the answers of check-once questions already falsify its
//! precondition. Check-once answers never change, so such a precondition
//! stays false for the rest of the session.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::blackboard::{FactStorage, FactStore};
use crate::condition::Condition;
use crate::error::PlanResult;
use crate::fact::Fact;
use crate::knowledge::ObjectId;
use crate::session::{PropagationManager, RootHandle, SessionView, SimulatedSession};
use crate::value::Value;

/// Why an action is excluded from planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingReason {
    /// The action is contra-indicated.
    ContraIndicated,
    /// The action is always relevant; it is only planned as an explicitly requested target.
    PermanentlyRelevant,
    /// Answered check-once questions falsify the action's precondition.
    CheckOnceAnswered,
}

/// Answered check-once questions with their current values.
#[must_use]
pub fn final_values(session: &dyn SessionView) -> Vec<(ObjectId, Value)> {
    session
        .knowledge()
        .objects()
        .filter(|o| o.is_question() && o.properties.check_once)
        .filter_map(|o| session.value(o.id).map(|v| (o.id, v)))
        .collect()
}

/// Every blocked action of the session behind `start`, with the first
/// reason that applies.
///
/// # Errors
///
/// Structural condition errors from evaluating preconditions.
pub fn blocked_actions(start: &SimulatedSession) -> PlanResult<BTreeMap<ObjectId, BlockingReason>> {
    let knowledge = start.knowledge();
    let finals = final_values(start);
    let frozen = (!finals.is_empty()).then(|| finals_only(start.root(), &finals));

    let mut blocked = BTreeMap::new();
    for object in knowledge.action_containers() {
        let action = object.id;
        if start.is_contra_indicated(action) {
            blocked.insert(action, BlockingReason::ContraIndicated);
            continue;
        }
        if object.properties.permanently_relevant {
            blocked.insert(action, BlockingReason::PermanentlyRelevant);
            continue;
        }
        let condition = knowledge.operator(action).and_then(|op| op.activation.as_ref());
        let (Some(frozen), Some(condition)) = (&frozen, condition) else {
            continue;
        };
        let is_final = |object: ObjectId| finals.iter().any(|(q, _)| *q == object);
        let depends_on_finals = condition.terminal_objects().into_iter().any(&is_final);
        if !depends_on_finals || !known_terms_within(condition, &is_final) {
            continue;
        }
        match condition.eval(frozen) {
            Ok(false) => {
                trace!(%action, "precondition falsified by check-once answers");
                blocked.insert(action, BlockingReason::CheckOnceAnswered);
            }
            Ok(true) => {}
            Err(e) if e.is_recoverable() => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(blocked)
}

/// `Known` decides on a missing answer instead of deferring, so it is only
/// meaningful in the frozen session for check-once questions.
fn known_terms_within(condition: &Condition, is_final: &impl Fn(ObjectId) -> bool) -> bool {
    match condition {
        Condition::Known { question } => is_final(*question),
        Condition::And { terms } | Condition::Or { terms } => terms.iter().all(|t| known_terms_within(t, is_final)),
        Condition::Not { term } => known_terms_within(term, is_final),
        _ => true,
    }
}

/// A simulation that knows nothing but the check-once answers.
fn finals_only(root: &RootHandle, finals: &[(ObjectId, Value)]) -> SimulatedSession {
    let store = Arc::new(FactStore::new(Arc::clone(root.store().methods())));
    for (question, value) in finals {
        store.add(Fact::user_entered(*question, value.clone()));
    }
    let propagation = Arc::new(PropagationManager::new(root.propagation_time()));
    SimulatedSession::from_root(RootHandle::new(Arc::clone(root.knowledge()), store, propagation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::SourceId;
    use crate::knowledge::{ActionSpec, KnowledgeBase, MethodId, QuestionSpec};
    use crate::operator::StateTransition;
    use crate::session::Session;
    use crate::value::Indication;

    struct Bench {
        session: Session,
        sealed: ObjectId,
        open: ObjectId,
        check: ObjectId,
        always: ObjectId,
        gauge: ObjectId,
    }

    /// `open` needs an unsealed housing, `check` and `gauge` a sealed one;
    /// `sealed` is check-once.
    fn bench() -> Bench {
        let mut kb = KnowledgeBase::builder();
        let sealed = kb.question_with("sealed", QuestionSpec::default().check_once());
        let level = kb.question("level");
        let open = kb.action("open", 1.0);
        let check = kb.action("check", 1.0);
        let always = kb.action_with("always", ActionSpec::cost(1.0).permanently_relevant());
        let gauge = kb.action("gauge", 1.0);
        kb.operator(StateTransition::new(open).with_activation(Condition::equal(sealed, Value::Bool(false))));
        kb.operator(StateTransition::new(check).with_activation(Condition::equal(sealed, Value::Bool(true))));
        kb.operator(StateTransition::new(always));
        kb.operator(StateTransition::new(gauge).with_activation(Condition::and(vec![
            Condition::known(level),
            Condition::equal(sealed, Value::Bool(true)),
        ])));
        Bench {
            session: Session::new(Arc::new(kb.build().unwrap())),
            sealed,
            open,
            check,
            always,
            gauge,
        }
    }

    #[test]
    fn permanently_relevant_actions_are_always_blocked() {
        let b = bench();
        let blocked = blocked_actions(&SimulatedSession::over(&b.session)).unwrap();
        assert_eq!(blocked.get(&b.always), Some(&BlockingReason::PermanentlyRelevant));
        assert!(!blocked.contains_key(&b.open));
        assert!(!blocked.contains_key(&b.gauge));
    }

    #[test]
    fn check_once_answer_blocks_falsified_preconditions_only() {
        let b = bench();
        b.session.answer(b.sealed, Value::Bool(true));
        let blocked = blocked_actions(&SimulatedSession::over(&b.session)).unwrap();
        assert_eq!(blocked.get(&b.open), Some(&BlockingReason::CheckOnceAnswered));
        assert!(!blocked.contains_key(&b.check));
        assert!(!blocked.contains_key(&b.gauge));
        assert_eq!(final_values(&b.session), vec![(b.sealed, Value::Bool(true))]);
    }

    #[test]
    fn known_terms_on_open_questions_never_block() {
        let b = bench();
        b.session.answer(b.sealed, Value::Bool(false));
        let blocked = blocked_actions(&SimulatedSession::over(&b.session)).unwrap();
        assert_eq!(blocked.get(&b.check), Some(&BlockingReason::CheckOnceAnswered));
        assert!(!blocked.contains_key(&b.gauge));
        assert!(!blocked.contains_key(&b.open));
    }

    #[test]
    fn contra_indication_takes_precedence() {
        let b = bench();
        b.session.answer(b.sealed, Value::Bool(true));
        for action in [b.open, b.always] {
            b.session.add_fact(Fact::derived(
                action,
                Value::Indication(Indication::contra()),
                MethodId::RULES,
                SourceId::new(),
            ));
        }
        let blocked = blocked_actions(&SimulatedSession::over(&b.session)).unwrap();
        assert_eq!(blocked.get(&b.open), Some(&BlockingReason::ContraIndicated));
        assert_eq!(blocked.get(&b.always), Some(&BlockingReason::ContraIndicated));
    }
}
