use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use diagplan::{KnowledgeBase, PlanState, Planner, PlannerConfig, Session, Situation, Target, ValidationError};

#[test]
fn config_file_drives_the_planner() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("planner.json");
    fs::write(
        &path,
        r#"{
            "manual_mode": true,
            "search": { "max_expansions": 500, "max_duration_ms": 250 },
            "runtime": { "workers": 1 }
        }"#,
    )
    .unwrap();

    let config = PlannerConfig::from_path(&path).unwrap();
    assert!(config.manual_mode);
    assert_eq!(config.search.max_expansions, 500);
    assert_eq!(config.runtime.workers, 1);
    assert_eq!(config.runtime.queue_capacity, PlannerConfig::default().runtime.queue_capacity);

    let mut kb = KnowledgeBase::builder();
    let a = kb.action("A", 1.0);
    let mut session = Session::new(Arc::new(kb.build().unwrap()));
    let planner = Planner::new(config).unwrap();
    assert_eq!(planner.engine().limits().max_expansions, 500);

    let situation = Situation {
        targets: vec![Target::single(a, 1.0).unwrap()],
        ..Situation::default()
    };
    assert_eq!(planner.advance(&mut session, Some(&situation)).unwrap(), None);
    assert_eq!(planner.current_state(&session), PlanState::Idle);
}

#[test]
fn unreadable_and_invalid_files_are_rejected() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(matches!(
        PlannerConfig::from_path(&missing),
        Err(ValidationError::ConfigUnreadable { .. })
    ));

    let invalid = dir.path().join("invalid.json");
    fs::write(&invalid, r#"{ "search": { "max_expansions": 0 } }"#).unwrap();
    assert!(matches!(
        PlannerConfig::from_path(&invalid),
        Err(ValidationError::InvalidSearchLimits { .. })
    ));

    let zero_workers = dir.path().join("workers.json");
    fs::write(&zero_workers, r#"{ "runtime": { "workers": 0 } }"#).unwrap();
    assert!(matches!(
        PlannerConfig::from_path(&zero_workers),
        Err(ValidationError::InvalidRuntimeConfig { .. })
    ));
}
