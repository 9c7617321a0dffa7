use std::collections::BTreeSet;

use crate::knowledge::ObjectId;
use crate::search::Target;
use crate::session::Session;

/// Strategic information supplied by the classification layer.
pub trait StrategicSupport: Send + Sync {
    /// Solutions that are still plausible and not yet told apart.
    fn undiscriminated_solutions(&self, session: &Session) -> BTreeSet<ObjectId>;

    /// Questions whose answers contradict each other.
    fn conflicting_questions(&self, session: &Session, solutions: &BTreeSet<ObjectId>) -> BTreeSet<ObjectId>;

    /// Targets that would discriminate `solutions`.
    fn discriminating_targets(&self, session: &Session, solutions: &BTreeSet<ObjectId>) -> Vec<Target>;
}

/// Snapshot of the strategic situation the planner reacts to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Situation {
    /// Solutions not yet told apart.
    pub undiscriminated: BTreeSet<ObjectId>,
    /// Questions whose answers contradict each other.
    pub conflicting: BTreeSet<ObjectId>,
    /// Targets that would discriminate the solutions.
    pub targets: Vec<Target>,
}

impl Situation {
    /// Asks `support` for the current situation of `session`.
    #[must_use]
    pub fn observe(support: &dyn StrategicSupport, session: &Session) -> Self {
        let undiscriminated = support.undiscriminated_solutions(session);
        let conflicting = support.conflicting_questions(session, &undiscriminated);
        let targets = support.discriminating_targets(session, &undiscriminated);
        Self {
            undiscriminated,
            conflicting,
            targets,
        }
    }
}
