//! Knowledge model: terminology objects, problem-solving methods and the
//! validated knowledge base that planning operators are declared in.

mod base;
mod method;
mod object;

pub use base::{ActionSpec, KnowledgeBase, KnowledgeBaseBuilder, QuestionSpec};
pub use method::{MethodId, MethodKind, MethodRegistry, ProblemSolver};
pub use object::{ObjectId, ObjectKind, ObjectProperties, TerminologyObject};
