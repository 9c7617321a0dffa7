//! Knowledge base: the terminology hierarchy plus planning operators.

use std::collections::HashMap;

use tracing::debug;

use crate::error::ValidationError;
use crate::operator::StateTransition;
use crate::value::Value;

use super::method::MethodRegistry;
use super::object::{ObjectId, ObjectKind, ObjectProperties, TerminologyObject};

/// Immutable, validated knowledge base shared by sessions via `Arc`.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    objects: Vec<TerminologyObject>,
    by_name: HashMap<String, ObjectId>,
    operators: Vec<StateTransition>,
    operator_index: HashMap<ObjectId, usize>,
    methods: MethodRegistry,
}

impl KnowledgeBase {
    /// Starts building a knowledge base.
    #[must_use]
    pub fn builder() -> KnowledgeBaseBuilder {
        KnowledgeBaseBuilder::default()
    }

    /// Object with `id`.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&TerminologyObject> {
        self.objects.get(id.index())
    }

    /// Looks up an object and fails with `UnknownObject` if it does not exist.
    pub fn require(&self, id: ObjectId) -> Result<&TerminologyObject, ValidationError> {
        self.object(id).ok_or(ValidationError::UnknownObject { id })
    }

    /// Id of the object called `name`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<ObjectId> {
        self.by_name.get(name).copied()
    }

    /// Name of `id`.
    #[must_use]
    pub fn name_of(&self, id: ObjectId) -> Option<&str> {
        self.object(id).map(|o| o.name.as_str())
    }

    /// All objects in declaration order.
    pub fn objects(&self) -> impl Iterator<Item = &TerminologyObject> {
        self.objects.iter()
    }

    /// Action containers in declaration order.
    pub fn action_containers(&self) -> impl Iterator<Item = &TerminologyObject> {
        self.objects.iter().filter(|o| o.is_action())
    }

    /// Operator of `action`.
    #[must_use]
    pub fn operator(&self, action: ObjectId) -> Option<&StateTransition> {
        self.operator_index.get(&action).map(|&idx| &self.operators[idx])
    }

    /// Operators in declaration order.
    #[must_use]
    pub fn operators(&self) -> &[StateTransition] {
        &self.operators
    }

    /// Registered problem-solving methods.
    #[must_use]
    pub const fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    /// Static cost of an action container; zero for anything else.
    #[must_use]
    pub fn cost(&self, action: ObjectId) -> f64 {
        self.object(action)
            .filter(|o| o.is_action())
            .map_or(0.0, |o| o.properties.cost)
    }

    /// All questions below `container`, depth first in child order.
    #[must_use]
    pub fn questions_of(&self, container: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack = vec![container];
        let mut visited = vec![false; self.objects.len()];
        while let Some(id) = stack.pop() {
            let Some(object) = self.object(id) else {
                continue;
            };
            if std::mem::replace(&mut visited[id.index()], true) {
                continue;
            }
            if object.is_question() && id != container {
                out.push(id);
            }
            stack.extend(object.children.iter().rev().copied());
        }
        out
    }
}

/// Options for a new question.
#[derive(Debug, Clone, Default)]
pub struct QuestionSpec {
    /// Choice alternatives; empty for non-choice questions.
    pub choices: Vec<String>,
    /// Answer assumed while simulating.
    pub normal_value: Option<Value>,
    /// Answer is final once given.
    pub check_once: bool,
}

impl QuestionSpec {
    /// Choice question with these alternatives.
    #[must_use]
    pub fn choices<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the normal value.
    #[must_use]
    pub fn with_normal_value(mut self, value: Value) -> Self {
        self.normal_value = Some(value);
        self
    }

    /// Marks the question as check-once.
    #[must_use]
    pub const fn check_once(mut self) -> Self {
        self.check_once = true;
        self
    }
}

/// Options for a new action container.
#[derive(Debug, Clone, Default)]
pub struct ActionSpec {
    /// Static cost.
    pub cost: f64,
    /// Never used as an intermediate step.
    pub target_only: bool,
    /// Only planned when requested explicitly.
    pub permanently_relevant: bool,
}

impl ActionSpec {
    /// Action with cost `cost` and no flags.
    #[must_use]
    pub fn cost(cost: f64) -> Self {
        Self {
            cost,
            ..Self::default()
        }
    }

    /// Marks the action as target only.
    #[must_use]
    pub const fn target_only(mut self) -> Self {
        self.target_only = true;
        self
    }

    /// Marks the action as permanently relevant.
    #[must_use]
    pub const fn permanently_relevant(mut self) -> Self {
        self.permanently_relevant = true;
        self
    }
}

/// Builder for `KnowledgeBase`.
///
/// Declaration methods return the new object's id and never fail; all
/// structural checks run in `build`.
#[derive(Debug, Default)]
pub struct KnowledgeBaseBuilder {
    objects: Vec<TerminologyObject>,
    operators: Vec<StateTransition>,
    methods: MethodRegistry,
}

impl KnowledgeBaseBuilder {
    fn push(&mut self, name: impl Into<String>, kind: ObjectKind, properties: ObjectProperties) -> ObjectId {
        let raw = u32::try_from(self.objects.len()).unwrap_or(u32::MAX);
        let id = ObjectId::new(raw);
        self.objects.push(TerminologyObject {
            id,
            name: name.into(),
            kind,
            parents: Vec::new(),
            children: Vec::new(),
            properties,
        });
        id
    }

    /// Declares a question with default options.
    pub fn question(&mut self, name: impl Into<String>) -> ObjectId {
        self.question_with(name, QuestionSpec::default())
    }

    /// Declares a question with explicit options.
    pub fn question_with(&mut self, name: impl Into<String>, spec: QuestionSpec) -> ObjectId {
        let properties = ObjectProperties {
            normal_value: spec.normal_value,
            check_once: spec.check_once,
            choices: spec.choices,
            ..ObjectProperties::default()
        };
        self.push(name, ObjectKind::Question, properties)
    }

    /// Declares an action container with the given static cost.
    pub fn action(&mut self, name: impl Into<String>, cost: f64) -> ObjectId {
        self.action_with(name, ActionSpec::cost(cost))
    }

    /// Declares an action container with explicit options.
    pub fn action_with(&mut self, name: impl Into<String>, spec: ActionSpec) -> ObjectId {
        let properties = ObjectProperties {
            cost: spec.cost,
            target_only: spec.target_only,
            permanently_relevant: spec.permanently_relevant,
            ..ObjectProperties::default()
        };
        self.push(name, ObjectKind::ActionContainer, properties)
    }

    /// Declares a solution.
    pub fn solution(&mut self, name: impl Into<String>) -> ObjectId {
        self.push(name, ObjectKind::Solution, ObjectProperties::default())
    }

    /// Links `child` below `parent`. Unknown ids are reported by `build`.
    pub fn add_child(&mut self, parent: ObjectId, child: ObjectId) -> &mut Self {
        if let Some(p) = self.objects.get_mut(parent.index()) {
            if !p.children.contains(&child) {
                p.children.push(child);
            }
        }
        if let Some(c) = self.objects.get_mut(child.index()) {
            if !c.parents.contains(&parent) {
                c.parents.push(parent);
            }
        }
        self
    }

    /// Declares a question directly below `action`.
    pub fn question_in(&mut self, action: ObjectId, name: impl Into<String>, spec: QuestionSpec) -> ObjectId {
        let id = self.question_with(name, spec);
        self.add_child(action, id);
        id
    }

    /// Adds the operator of one action.
    pub fn operator(&mut self, operator: StateTransition) -> &mut Self {
        self.operators.push(operator);
        self
    }

    /// Registry for additional methods.
    pub fn methods_mut(&mut self) -> &mut MethodRegistry {
        &mut self.methods
    }

    /// Validates and freezes the knowledge base.
    pub fn build(self) -> Result<KnowledgeBase, ValidationError> {
        let mut by_name = HashMap::with_capacity(self.objects.len());
        for object in &self.objects {
            if by_name.insert(object.name.clone(), object.id).is_some() {
                return Err(ValidationError::DuplicateName {
                    name: object.name.clone(),
                });
            }
            for linked in object.children.iter().chain(&object.parents) {
                if linked.index() >= self.objects.len() {
                    return Err(ValidationError::UnknownObject { id: *linked });
                }
            }
            if object.is_action() && !(object.properties.cost.is_finite() && object.properties.cost >= 0.0) {
                return Err(ValidationError::InvalidCost {
                    action: object.id,
                    cost: object.properties.cost,
                });
            }
        }

        let lookup = |id: ObjectId| self.objects.get(id.index()).ok_or(ValidationError::UnknownObject { id });

        let mut operator_index = HashMap::with_capacity(self.operators.len());
        for (idx, operator) in self.operators.iter().enumerate() {
            let action = lookup(operator.action)?;
            if !action.is_action() {
                return Err(ValidationError::WrongObjectKind {
                    id: action.id,
                    expected: ObjectKind::ActionContainer.to_string(),
                    actual: action.kind.to_string(),
                });
            }
            if operator_index.insert(operator.action, idx).is_some() {
                return Err(ValidationError::DuplicateOperator {
                    action: operator.action,
                });
            }
            for effect in &operator.effects {
                if !lookup(effect.question)?.is_question() {
                    return Err(ValidationError::OperatorWithoutQuestion {
                        action: operator.action,
                    });
                }
            }
            for referenced in operator.referenced_objects() {
                lookup(referenced)?;
            }
        }

        debug!(
            objects = self.objects.len(),
            operators = self.operators.len(),
            "knowledge base built"
        );

        Ok(KnowledgeBase {
            objects: self.objects,
            by_name,
            operators: self.operators,
            operator_index,
            methods: self.methods,
        })
    }
}
