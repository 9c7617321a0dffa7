//! Conditions over session values.
//!
//! Conditions are evaluated against any `SessionView`, so the same operator
//! precondition works on the real session and on every simulated layer.

use serde::{Deserialize, Serialize};

use crate::error::ConditionError;
use crate::knowledge::ObjectId;
use crate::session::SessionView;
use crate::value::Value;

/// A boolean condition over question values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    /// Always holds.
    True,
    /// The question's value equals `value`.
    Equal { question: ObjectId, value: Value },
    /// The question's value is one of `values`.
    In { question: ObjectId, values: Vec<Value> },
    /// The question's numeric value is strictly greater than `threshold`.
    Greater { question: ObjectId, threshold: f64 },
    /// The question's numeric value is strictly less than `threshold`.
    Less { question: ObjectId, threshold: f64 },
    /// The question has a value other than `Unknown`.
    Known { question: ObjectId },
    /// All terms hold.
    And { terms: Vec<Condition> },
    /// At least one term holds.
    Or { terms: Vec<Condition> },
    /// Negation of `term`.
    Not { term: Box<Condition> },
}

impl Condition {
    /// Value equals `value`.
    #[must_use]
    pub fn equal(question: ObjectId, value: Value) -> Self {
        Self::Equal { question, value }
    }

    /// Value is one of `values`.
    #[must_use]
    pub fn one_of(question: ObjectId, values: Vec<Value>) -> Self {
        Self::In { question, values }
    }

    /// Numeric value above `threshold`.
    #[must_use]
    pub const fn greater(question: ObjectId, threshold: f64) -> Self {
        Self::Greater { question, threshold }
    }

    /// Numeric value below `threshold`.
    #[must_use]
    pub const fn less(question: ObjectId, threshold: f64) -> Self {
        Self::Less { question, threshold }
    }

    /// Answered with anything but `Unknown`.
    #[must_use]
    pub const fn known(question: ObjectId) -> Self {
        Self::Known { question }
    }

    /// Conjunction.
    #[must_use]
    pub fn and(terms: Vec<Self>) -> Self {
        Self::And { terms }
    }

    /// Disjunction.
    #[must_use]
    pub fn or(terms: Vec<Self>) -> Self {
        Self::Or { terms }
    }

    /// Negation.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(term: Self) -> Self {
        Self::Not { term: Box::new(term) }
    }

    /// Evaluates the condition.
    ///
    /// # Errors
    ///
    /// `NoAnswer`/`UnknownAnswer` if a referenced question has no usable
    /// value (recoverable), `UnknownObject` if the question is not part of
    /// the session's knowledge base (structural).
    pub fn eval(&self, session: &dyn SessionView) -> Result<bool, ConditionError> {
        match self {
            Self::True => Ok(true),
            Self::Equal { question, value } => Ok(answered(session, *question)? == *value),
            Self::In { question, values } => {
                let actual = answered(session, *question)?;
                Ok(values.contains(&actual))
            }
            Self::Greater { question, threshold } => {
                Ok(answered(session, *question)?.as_number().is_some_and(|n| n > *threshold))
            }
            Self::Less { question, threshold } => {
                Ok(answered(session, *question)?.as_number().is_some_and(|n| n < *threshold))
            }
            Self::Known { question } => {
                ensure_known_object(session, *question)?;
                Ok(session.value(*question).is_some_and(|v| !v.is_unknown()))
            }
            Self::And { terms } => {
                let mut pending = None;
                let mut any_false = false;
                for term in terms {
                    match term.eval(session) {
                        Ok(true) => {}
                        Ok(false) => any_false = true,
                        Err(e) if e.is_recoverable() => {
                            pending.get_or_insert(e);
                        }
                        Err(e) => return Err(e),
                    }
                }
                match pending {
                    _ if any_false => Ok(false),
                    Some(e) => Err(e),
                    None => Ok(true),
                }
            }
            Self::Or { terms } => {
                let mut pending = None;
                let mut any_true = false;
                for term in terms {
                    match term.eval(session) {
                        Ok(true) => any_true = true,
                        Ok(false) => {}
                        Err(e) if e.is_recoverable() => {
                            pending.get_or_insert(e);
                        }
                        Err(e) => return Err(e),
                    }
                }
                match pending {
                    _ if any_true => Ok(true),
                    Some(e) => Err(e),
                    None => Ok(false),
                }
            }
            Self::Not { term } => term.eval(session).map(|b| !b),
        }
    }

    /// Objects referenced by this condition, in first-occurrence order.
    #[must_use]
    pub fn terminal_objects(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        self.collect_terminals(&mut out);
        out
    }

    fn collect_terminals(&self, out: &mut Vec<ObjectId>) {
        match self {
            Self::True => {}
            Self::Equal { question, .. }
            | Self::In { question, .. }
            | Self::Greater { question, .. }
            | Self::Less { question, .. }
            | Self::Known { question } => {
                if !out.contains(question) {
                    out.push(*question);
                }
            }
            Self::And { terms } | Self::Or { terms } => {
                for term in terms {
                    term.collect_terminals(out);
                }
            }
            Self::Not { term } => term.collect_terminals(out),
        }
    }
}

fn ensure_known_object(session: &dyn SessionView, question: ObjectId) -> Result<(), ConditionError> {
    if session.knowledge().object(question).is_none() {
        return Err(ConditionError::UnknownObject { object: question });
    }
    Ok(())
}

fn answered(session: &dyn SessionView, question: ObjectId) -> Result<Value, ConditionError> {
    ensure_known_object(session, question)?;
    match session.value(question) {
        None => Err(ConditionError::NoAnswer { object: question }),
        Some(Value::Unknown) => Err(ConditionError::UnknownAnswer { object: question }),
        Some(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fact::Fact;
    use crate::knowledge::KnowledgeBase;
    use crate::session::Session;

    fn session() -> (Session, ObjectId, ObjectId) {
        let mut kb = KnowledgeBase::builder();
        let q1 = kb.question("q1");
        let q2 = kb.question("q2");
        (Session::new(Arc::new(kb.build().unwrap())), q1, q2)
    }

    #[test]
    fn unanswered_question_is_recoverable() {
        let (session, q1, _) = session();
        let err = Condition::equal(q1, Value::choice("yes")).eval(&session).unwrap_err();
        assert_eq!(err, ConditionError::NoAnswer { object: q1 });
        assert!(err.is_recoverable());
    }

    #[test]
    fn unknown_answer_is_recoverable() {
        let (session, q1, _) = session();
        session.add_fact(Fact::user_entered(q1, Value::Unknown));
        let err = Condition::greater(q1, 1.0).eval(&session).unwrap_err();
        assert!(matches!(err, ConditionError::UnknownAnswer { .. }));
        assert!(!Condition::known(q1).eval(&session).unwrap());
    }

    #[test]
    fn unknown_object_is_structural() {
        let (session, _, _) = session();
        let err = Condition::known(ObjectId::new(77)).eval(&session).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn and_prefers_false_over_missing_answers() {
        let (session, q1, q2) = session();
        session.add_fact(Fact::user_entered(q1, Value::Number(1.0)));

        let cond = Condition::and(vec![Condition::greater(q1, 3.0), Condition::known(q2)]);
        assert!(!cond.eval(&session).unwrap());

        let cond = Condition::and(vec![Condition::less(q1, 3.0), Condition::equal(q2, Value::Bool(true))]);
        assert!(cond.eval(&session).unwrap_err().is_recoverable());
    }

    #[test]
    fn or_prefers_true_over_missing_answers() {
        let (session, q1, q2) = session();
        session.add_fact(Fact::user_entered(q1, Value::choice("a")));

        let cond = Condition::or(vec![
            Condition::equal(q2, Value::choice("x")),
            Condition::one_of(q1, vec![Value::choice("a"), Value::choice("b")]),
        ]);
        assert!(cond.eval(&session).unwrap());
        assert!(!Condition::not(cond).eval(&session).unwrap());
    }

    #[test]
    fn structural_errors_escape_combinators() {
        let (session, q1, _) = session();
        session.add_fact(Fact::user_entered(q1, Value::Number(1.0)));
        let cond = Condition::or(vec![Condition::less(q1, 3.0), Condition::known(ObjectId::new(50))]);
        assert!(matches!(
            cond.eval(&session),
            Err(ConditionError::UnknownObject { .. })
        ));
    }

    #[test]
    fn terminal_objects_are_deduplicated() {
        let q = ObjectId::new(1);
        let r = ObjectId::new(2);
        let cond = Condition::and(vec![
            Condition::known(q),
            Condition::not(Condition::or(vec![Condition::greater(r, 0.0), Condition::less(q, 9.0)])),
        ]);
        assert_eq!(cond.terminal_objects(), vec![q, r]);
    }

    #[test]
    fn serde_uses_op_tag() {
        let cond = Condition::known(ObjectId::new(4));
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json["op"], "known");
        let back: Condition = serde_json::from_value(json).unwrap();
        assert_eq!(back, cond);
    }
}
