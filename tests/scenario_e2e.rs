use std::sync::Arc;

use diagplan::knowledge::ActionSpec;
use diagplan::operator::ValueTransition;
use diagplan::search::{NoPathReason, SearchLimits};
use diagplan::{
    Condition, KnowledgeBase, ObjectId, PlanState, Planner, PlannerConfig, SearchEngine, SearchOutcome, Session,
    SessionView, SimulatedSession, StateTransition, Target, Value,
};

struct Scenario {
    session: Session,
    a: ObjectId,
    b: ObjectId,
    d: ObjectId,
    target: ObjectId,
    q1: ObjectId,
    q2: ObjectId,
}

/// A (1) sets Q1=5, B (2) needs Q1=5 and sets Q2=ok, the target needs Q2=ok.
/// D (4) sets Q2=ok directly, but only while Q1 has no usable value.
fn scenario() -> Scenario {
    let mut kb = KnowledgeBase::builder();
    let q1 = kb.question("Q1");
    let q2 = kb.question("Q2");
    let a = kb.action("A", 1.0);
    let b = kb.action("B", 2.0);
    let d = kb.action("D", 4.0);
    let target = kb.action_with("repair", ActionSpec::cost(1.0).target_only());
    kb.operator(StateTransition::new(a).with_effect(ValueTransition::set(q1, Value::Number(5.0))));
    kb.operator(
        StateTransition::new(b)
            .with_activation(Condition::equal(q1, Value::Number(5.0)))
            .with_effect(ValueTransition::set(q2, Value::choice("ok"))),
    );
    kb.operator(
        StateTransition::new(d)
            .with_activation(Condition::not(Condition::known(q1)))
            .with_effect(ValueTransition::set(q2, Value::choice("ok"))),
    );
    kb.operator(StateTransition::new(target).with_activation(Condition::equal(q2, Value::choice("ok"))));
    Scenario {
        session: Session::new(Arc::new(kb.build().unwrap())),
        a,
        b,
        d,
        target,
        q1,
        q2,
    }
}

#[test]
fn cheapest_sequence_is_a_then_b() {
    let s = scenario();
    let report = SearchEngine::default()
        .search(&s.session.root_handle(), &[Target::single(s.target, 1.0).unwrap()])
        .unwrap();

    let path = report.path().unwrap();
    assert_eq!(path.actions(), &[s.a, s.b]);
    assert!((path.cost() - 3.0).abs() < f64::EPSILON);
    assert!(report.stats.generated >= 2);
}

#[test]
fn found_path_replays_to_the_target() {
    let s = scenario();
    let target = Target::single(s.target, 1.0).unwrap();
    let path = SearchEngine::default()
        .search(&s.session.root_handle(), std::slice::from_ref(&target))
        .unwrap()
        .into_path()
        .unwrap();

    let replay = SimulatedSession::over(&s.session);
    assert!(!target.is_reached(&replay).unwrap());
    for action in path.actions() {
        let operator = s.session.knowledge().operator(*action).unwrap();
        assert!(operator.is_applicable(&replay).unwrap());
        operator.simulate(&replay).unwrap();
    }
    assert!(target.is_reached(&replay).unwrap());

    // nothing leaked into the real session
    assert_eq!(s.session.value(s.q1), None);
    assert_eq!(s.session.value(s.q2), None);
}

#[test]
fn known_state_changes_the_optimum() {
    let s = scenario();
    s.session.answer(s.q1, Value::Number(5.0));
    let path = SearchEngine::default()
        .search(&s.session.root_handle(), &[Target::single(s.target, 1.0).unwrap()])
        .unwrap()
        .into_path()
        .unwrap();
    assert_eq!(path.actions(), &[s.b]);
    assert!((path.cost() - 2.0).abs() < f64::EPSILON);
}

#[test]
fn alternative_branch_is_used_when_the_cheap_one_is_blocked() {
    let s = scenario();
    s.session.answer(s.q1, Value::Number(1.0));
    let report = SearchEngine::default()
        .search(&s.session.root_handle(), &[Target::single(s.target, 1.0).unwrap()])
        .unwrap();
    // Q1 is known but wrong, and D needs it unknown
    assert_eq!(report.outcome, SearchOutcome::NoPath(NoPathReason::Exhausted));

    let fresh = scenario();
    fresh.session.answer(fresh.q1, Value::Unknown);
    let path = SearchEngine::default()
        .search(&fresh.session.root_handle(), &[Target::single(fresh.target, 1.0).unwrap()])
        .unwrap()
        .into_path()
        .unwrap();
    assert_eq!(path.actions(), &[fresh.d]);
}

#[test]
fn tight_budget_stops_the_search() {
    let s = scenario();
    let engine = SearchEngine::new(SearchLimits::default().with_max_expansions(1));
    let report = engine
        .search(&s.session.root_handle(), &[Target::single(s.target, 1.0).unwrap()])
        .unwrap();
    assert_eq!(report.outcome, SearchOutcome::NoPath(NoPathReason::BudgetExhausted));
    assert_eq!(report.stats.expansions, 1);
}

#[test]
fn actions_without_questions_complete_on_commit() {
    let mut s = scenario();
    let planner = Planner::new(PlannerConfig::default()).unwrap();
    let path = planner
        .request_plan(&mut s.session, &[Target::single(s.target, 1.0).unwrap()])
        .unwrap()
        .unwrap();

    assert_eq!(path.sequence(), vec![s.a, s.b, s.target]);
    assert_eq!(planner.current_state(&s.session), PlanState::Completed);
    assert_eq!(s.session.value(s.q1), Some(Value::Number(5.0)));
    assert_eq!(s.session.value(s.q2), Some(Value::choice("ok")));
    assert!(s.session.agenda().unwrap().is_empty());
    assert_eq!(
        s.session.protocol().unwrap().calculated_paths().next(),
        Some(&[s.a, s.b, s.target][..])
    );
}
