//! Planning operators.
//!
//! A `StateTransition` binds an action container to an activation condition
//! and a list of value effects. Operators are evaluated against any
//! `SessionView`; the search fires them on simulated layers, the execution
//! controller fires them on the real session once an action is done.

mod completion;

pub use completion::{AnsweredQuestions, CompletionCheck};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::condition::Condition;
use crate::error::ConditionError;
use crate::fact::{Fact, SourceId, SourceKind};
use crate::knowledge::{MethodId, ObjectId};
use crate::session::SessionView;
use crate::value::Value;

/// One case of a value effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "case", rename_all = "snake_case")]
pub enum EffectCase {
    /// Applies unconditionally.
    Always { value: Value },
    /// Applies if `condition` holds before firing.
    When { condition: Condition, value: Value },
}

impl EffectCase {
    /// Case that always applies.
    #[must_use]
    pub const fn always(value: Value) -> Self {
        Self::Always { value }
    }

    /// Case guarded by `condition`.
    #[must_use]
    pub const fn when(condition: Condition, value: Value) -> Self {
        Self::When { condition, value }
    }

    const fn value(&self) -> &Value {
        match self {
            Self::Always { value } | Self::When { value, .. } => value,
        }
    }

    fn matches(&self, session: &dyn SessionView) -> Result<bool, ConditionError> {
        match self {
            Self::Always { .. } => Ok(true),
            Self::When { condition, .. } => recoverable_as_false(condition.eval(session)),
        }
    }
}

/// Sets one question to the value of the first matching case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueTransition {
    /// Question that receives the value.
    pub question: ObjectId,
    /// Cases in priority order; the first match wins.
    pub cases: Vec<EffectCase>,
}

impl ValueTransition {
    /// Effect on `question` with explicit cases.
    #[must_use]
    pub const fn new(question: ObjectId, cases: Vec<EffectCase>) -> Self {
        Self { question, cases }
    }

    /// Unconditionally sets `question` to `value`.
    #[must_use]
    pub fn set(question: ObjectId, value: Value) -> Self {
        Self::new(question, vec![EffectCase::always(value)])
    }

    /// The value selected for the current state, if any case matches.
    ///
    /// # Errors
    ///
    /// Structural condition errors only.
    pub fn select(&self, session: &dyn SessionView) -> Result<Option<Value>, ConditionError> {
        for case in &self.cases {
            if case.matches(session)? {
                return Ok(Some(case.value().clone()));
            }
        }
        Ok(None)
    }
}

/// Planning operator of one action container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Action container the operator describes.
    pub action: ObjectId,
    /// Precondition; `None` means always applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<Condition>,
    /// Value effects of carrying out the action.
    #[serde(default)]
    pub effects: Vec<ValueTransition>,
}

impl StateTransition {
    /// Operator without precondition and without effects.
    #[must_use]
    pub const fn new(action: ObjectId) -> Self {
        Self {
            action,
            activation: None,
            effects: Vec::new(),
        }
    }

    /// Sets the precondition.
    #[must_use]
    pub fn with_activation(mut self, condition: Condition) -> Self {
        self.activation = Some(condition);
        self
    }

    /// Adds an effect.
    #[must_use]
    pub fn with_effect(mut self, effect: ValueTransition) -> Self {
        self.effects.push(effect);
        self
    }

    /// Every object referenced by the activation condition or the effects.
    #[must_use]
    pub fn referenced_objects(&self) -> Vec<ObjectId> {
        let mut out = self
            .activation
            .as_ref()
            .map(Condition::terminal_objects)
            .unwrap_or_default();
        for effect in &self.effects {
            out.push(effect.question);
            for case in &effect.cases {
                if let EffectCase::When { condition, .. } = case {
                    out.extend(condition.terminal_objects());
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Questions this operator may assign.
    pub fn state_questions(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.effects.iter().map(|e| e.question)
    }

    /// Returns true if the action can run in the given state.
    ///
    /// A contra-indicated action is never applicable. Unanswered or unknown
    /// precondition values make the operator inapplicable.
    ///
    /// # Errors
    ///
    /// Structural condition errors only.
    pub fn is_applicable(&self, session: &dyn SessionView) -> Result<bool, ConditionError> {
        if session.is_contra_indicated(self.action) {
            return Ok(false);
        }
        match &self.activation {
            None => Ok(true),
            Some(condition) => recoverable_as_false(condition.eval(session)),
        }
    }

    /// Applies the effects to `session` and returns the written facts.
    ///
    /// All cases are decided against the state before the first write, so
    /// effects never observe each other.
    ///
    /// # Errors
    ///
    /// Structural condition errors only.
    pub fn fire(&self, session: &dyn SessionView) -> Result<Vec<Fact>, ConditionError> {
        let mut assignments = Vec::with_capacity(self.effects.len());
        for effect in &self.effects {
            if let Some(value) = effect.select(session)? {
                assignments.push((effect.question, value));
            }
        }

        let source = SourceId::new();
        let origin = if session.is_simulated() {
            SourceKind::Simulated
        } else {
            SourceKind::Derived
        };
        let facts: Vec<Fact> = assignments
            .into_iter()
            .map(|(question, value)| Fact::new(question, value, MethodId::STATE_TRANSITION, source, origin))
            .collect();
        for fact in &facts {
            session.blackboard().add(fact.clone());
        }
        trace!(action = %self.action, facts = facts.len(), "operator fired");
        Ok(facts)
    }

    /// Simulates performing the action: assumes expected answers for its
    /// unanswered questions, then fires the effects.
    ///
    /// # Errors
    ///
    /// Structural condition errors only.
    pub fn simulate(&self, session: &dyn SessionView) -> Result<Vec<Fact>, ConditionError> {
        assume_expected_answers(session, self.action);
        self.fire(session)
    }
}

/// Writes the expected answer for every unanswered question of `action`.
///
/// The expected answer is the question's normal value, or its only choice.
/// Questions without either stay unanswered.
pub fn assume_expected_answers(session: &dyn SessionView, action: ObjectId) -> Vec<Fact> {
    let knowledge = session.knowledge();
    let source = SourceId::new();
    let mut written = Vec::new();
    for question in knowledge.questions_of(action) {
        if session.value(question).is_some() {
            continue;
        }
        let Some(object) = knowledge.object(question) else {
            continue;
        };
        let expected = object.properties.normal_value.clone().or_else(|| match object.properties.choices.as_slice() {
            [only] => Some(Value::choice(only.clone())),
            _ => None,
        });
        if let Some(value) = expected {
            let fact = Fact::new(question, value, MethodId::USER_SELECTED, source, SourceKind::Simulated);
            session.blackboard().add(fact.clone());
            written.push(fact);
        }
    }
    written
}

/// Applicability of an action, whether or not it has an operator.
///
/// # Errors
///
/// Structural condition errors only.
pub fn action_applicable(session: &dyn SessionView, action: ObjectId) -> Result<bool, ConditionError> {
    match session.knowledge().operator(action) {
        Some(operator) => operator.is_applicable(session),
        None => Ok(!session.is_contra_indicated(action)),
    }
}

fn recoverable_as_false(result: Result<bool, ConditionError>) -> Result<bool, ConditionError> {
    match result {
        Ok(b) => Ok(b),
        Err(e) if e.is_recoverable() => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::knowledge::{KnowledgeBase, QuestionSpec};
    use crate::session::{Session, SimulatedSession};
    use crate::value::Indication;

    struct Fixture {
        session: Session,
        a: ObjectId,
        level: ObjectId,
        mode: ObjectId,
        check: ObjectId,
    }

    fn fixture() -> Fixture {
        let mut kb = KnowledgeBase::builder();
        let a = kb.action("A", 1.0);
        let level = kb.question("level");
        let mode = kb.question("mode");
        let check = kb.question_in(a, "A#ok", QuestionSpec::choices(["ok"]));
        kb.operator(
            StateTransition::new(a)
                .with_activation(Condition::greater(level, 1.0))
                .with_effect(ValueTransition::new(
                    mode,
                    vec![
                        EffectCase::when(Condition::greater(level, 10.0), Value::choice("high")),
                        EffectCase::always(Value::choice("normal")),
                    ],
                ))
                .with_effect(ValueTransition::new(
                    level,
                    vec![EffectCase::always(Value::Number(0.0))],
                )),
        );
        let kb = Arc::new(kb.build().unwrap());
        Fixture {
            session: Session::new(kb),
            a,
            level,
            mode,
            check,
        }
    }

    #[test]
    fn unanswered_precondition_is_not_applicable() {
        let f = fixture();
        let op = f.session.knowledge().operator(f.a).unwrap();
        assert!(!op.is_applicable(&f.session).unwrap());

        f.session.answer(f.level, Value::Unknown);
        assert!(!op.is_applicable(&f.session).unwrap());

        f.session.answer(f.level, Value::Number(2.0));
        assert!(op.is_applicable(&f.session).unwrap());
    }

    #[test]
    fn contra_indication_blocks_the_operator() {
        let f = fixture();
        f.session.answer(f.level, Value::Number(2.0));
        f.session.add_fact(Fact::derived(
            f.a,
            Value::Indication(Indication::contra()),
            MethodId::RULES,
            SourceId::new(),
        ));
        assert!(!action_applicable(&f.session, f.a).unwrap());
    }

    #[test]
    fn effects_read_the_state_before_firing() {
        let f = fixture();
        f.session.answer(f.level, Value::Number(20.0));
        let sim = SimulatedSession::over(&f.session);
        let op = f.session.knowledge().operator(f.a).unwrap();

        let facts = op.fire(&sim).unwrap();
        assert_eq!(facts.len(), 2);
        assert!(facts.iter().all(|fact| fact.source == facts[0].source));
        // the level reset does not influence the mode decision
        assert_eq!(sim.value(f.mode), Some(Value::choice("high")));
        assert_eq!(f.session.value(f.mode), None);
    }

    #[test]
    fn state_transition_facts_do_not_override_user_answers() {
        let f = fixture();
        f.session.answer(f.level, Value::Number(5.0));
        let sim = SimulatedSession::over(&f.session);
        f.session.knowledge().operator(f.a).unwrap().fire(&sim).unwrap();
        assert_eq!(sim.value(f.level), Some(Value::Number(5.0)));
        assert_eq!(
            sim.blackboard().merged_value_by(f.level, MethodId::STATE_TRANSITION),
            Some(Value::Number(0.0))
        );
    }

    #[test]
    fn simulate_assumes_single_choice_answers() {
        let f = fixture();
        f.session.answer(f.level, Value::Number(2.0));
        let sim = SimulatedSession::over(&f.session);
        f.session.knowledge().operator(f.a).unwrap().simulate(&sim).unwrap();
        assert_eq!(sim.value(f.check), Some(Value::choice("ok")));
        assert_eq!(sim.value(f.mode), Some(Value::choice("normal")));
        assert_eq!(f.session.value(f.check), None);
    }

    #[test]
    fn referenced_objects_cover_conditions_and_effects() {
        let f = fixture();
        let op = f.session.knowledge().operator(f.a).unwrap();
        assert_eq!(op.referenced_objects(), vec![f.level, f.mode]);
        assert_eq!(op.state_questions().collect::<Vec<_>>(), vec![f.mode, f.level]);
    }
}
