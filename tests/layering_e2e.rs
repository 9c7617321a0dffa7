use std::sync::Arc;

use diagplan::knowledge::{MethodRegistry, QuestionSpec};
use diagplan::{
    Fact, FactStorage, FactStore, Indication, KnowledgeBase, LayeredBlackboard, MethodId, ObjectId, Session,
    SessionView, SimulatedSession, SourceId, Value,
};

fn session_with(questions: &[&str]) -> (Session, Vec<ObjectId>) {
    let mut kb = KnowledgeBase::builder();
    let ids = questions
        .iter()
        .map(|name| kb.question_with(*name, QuestionSpec::default()))
        .collect();
    (Session::new(Arc::new(kb.build().unwrap())), ids)
}

#[test]
fn simulated_writes_never_reach_the_real_session() {
    let (session, q) = session_with(&["pressure", "noise"]);
    session.answer(q[0], Value::Number(2.0));

    let sim = SimulatedSession::over(&session);
    let nested = sim.decorate();
    sim.blackboard().add(Fact::user_entered(q[1], Value::Bool(true)));
    nested.blackboard().add(Fact::user_entered(q[0], Value::Number(7.0)));

    assert_eq!(session.value(q[0]), Some(Value::Number(2.0)));
    assert_eq!(session.value(q[1]), None);
    assert_eq!(sim.value(q[0]), Some(Value::Number(2.0)));
    assert_eq!(nested.value(q[0]), Some(Value::Number(7.0)));
    // the floor's write shows through for objects the upper layer never touched
    assert_eq!(nested.value(q[1]), Some(Value::Bool(true)));
    assert_eq!(nested.depth(), 2);
}

#[test]
fn copies_diverge_independently() {
    let (session, q) = session_with(&["a", "b"]);
    let sim = SimulatedSession::over(&session);
    sim.blackboard().add(Fact::user_entered(q[0], Value::Number(1.0)));

    let left = sim.copy();
    let right = sim.copy();
    left.blackboard().add(Fact::user_entered(q[1], Value::choice("left")));
    right.blackboard().add(Fact::user_entered(q[1], Value::choice("right")));

    assert_eq!(left.value(q[1]), Some(Value::choice("left")));
    assert_eq!(right.value(q[1]), Some(Value::choice("right")));
    assert_eq!(sim.value(q[1]), None);
    assert!(left.layer().agrees_with(right.layer(), q[0]));
    assert!(!left.layer().agrees_with(right.layer(), q[1]));
}

#[test]
fn merge_result_does_not_depend_on_insertion_order() {
    let q = ObjectId::new(0);
    let user = Fact::user_entered(q, Value::Number(1.0));
    let transition = Fact::derived(q, Value::Number(2.0), MethodId::STATE_TRANSITION, SourceId::new());
    let rules = Fact::derived(q, Value::Number(3.0), MethodId::RULES, SourceId::new());

    let forward = FactStore::new(Arc::new(MethodRegistry::default()));
    let backward = FactStore::new(Arc::new(MethodRegistry::default()));
    for fact in [&rules, &transition, &user] {
        forward.add(fact.clone());
    }
    for fact in [&user, &transition, &rules] {
        backward.add(fact.clone());
    }

    assert_eq!(forward.merged_fact(q), backward.merged_fact(q));
    assert_eq!(forward.merged_value(q), Some(Value::Number(1.0)));

    assert!(forward.remove(&user));
    assert!(backward.remove(&user));
    assert_eq!(forward.merged_value(q), Some(Value::Number(2.0)));
    assert_eq!(forward.merged_fact(q), backward.merged_fact(q));
}

#[test]
fn contra_indication_dominates_any_indication() {
    let action = ObjectId::new(0);
    let store = FactStore::new(Arc::new(MethodRegistry::default()));
    store.add(Fact::derived(
        action,
        Value::Indication(Indication::indicated(0)),
        MethodId::USER_SELECTED,
        SourceId::new(),
    ));
    store.add(Fact::derived(
        action,
        Value::Indication(Indication::contra()),
        MethodId::COST_BENEFIT,
        SourceId::new(),
    ));
    assert_eq!(store.merged_value(action), Some(Value::Indication(Indication::contra())));
}

#[test]
fn decorated_values_exclude_the_root() {
    let (session, q) = session_with(&["seen", "untouched"]);
    session.answer(q[0], Value::Number(1.0));
    session.answer(q[1], Value::Number(1.0));

    let sim = SimulatedSession::over(&session);
    sim.blackboard().add(Fact::derived(q[0], Value::Number(4.0), MethodId::INIT, SourceId::new()));

    let layer = sim.layer();
    assert_eq!(layer.decorated_objects(), vec![q[0]]);
    assert_eq!(layer.decorated_merged_value(q[1]), None);
    // the materialized object carries the seeded root answer, which still wins
    assert_eq!(layer.decorated_merged_value(q[0]), Some(Value::Number(1.0)));
    assert_eq!(layer.merged_value_by(q[0], MethodId::INIT), Some(Value::Number(4.0)));
}

#[test]
fn writing_the_root_value_again_is_not_a_change() {
    let (session, q) = session_with(&["level"]);
    session.answer(q[0], Value::Number(3.0));

    let sim = SimulatedSession::over(&session);
    sim.blackboard().add(Fact::user_entered(q[0], Value::Number(3.0)));
    assert_eq!(sim.layer().local_objects(), vec![q[0]]);
    assert_eq!(sim.layer().changed_value(q[0]), None);

    sim.blackboard().add(Fact::user_entered(q[0], Value::Number(4.0)));
    assert_eq!(sim.layer().changed_value(q[0]), Some(Value::Number(4.0)));
}

#[test]
fn layers_keep_their_view_when_the_floor_changes_later() {
    let root = Arc::new(FactStore::new(Arc::new(MethodRegistry::default())));
    let q = ObjectId::new(0);
    let r = ObjectId::new(1);
    let floor = Arc::new(LayeredBlackboard::over_root(Arc::clone(&root)));
    let top = LayeredBlackboard::over(Arc::clone(&floor));

    top.add(Fact::user_entered(q, Value::Number(1.0)));
    floor.add(Fact::user_entered(q, Value::Number(9.0)));
    floor.add(Fact::user_entered(r, Value::Number(2.0)));

    assert_eq!(top.merged_value(q), Some(Value::Number(1.0)));
    assert_eq!(top.merged_value(r), Some(Value::Number(2.0)));
    assert!(!top.agrees_with(&floor, q));
    assert!(top.agrees_with(&floor, r));
    assert!(root.is_empty());
}
