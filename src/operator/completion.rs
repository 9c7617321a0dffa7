use crate::knowledge::ObjectId;
use crate::session::SessionView;

/// Decides whether an action has been carried out.
pub trait CompletionCheck: Send + Sync {
    /// True once `action` needs no further user input.
    fn is_done(&self, action: ObjectId, session: &dyn SessionView) -> bool;
}

/// An action is done once every question below it has a value.
///
/// Actions without questions are done immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnsweredQuestions;

impl CompletionCheck for AnsweredQuestions {
    fn is_done(&self, action: ObjectId, session: &dyn SessionView) -> bool {
        session
            .knowledge()
            .questions_of(action)
            .into_iter()
            .all(|q| session.value(q).is_some())
    }
}
