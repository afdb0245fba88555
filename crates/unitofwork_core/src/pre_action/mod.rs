//! Pre-action interception pipeline.
//!
//! # Responsibility
//! - Run caller-configured handlers against an entity or a type token
//!   before a repository touches the store.
//! - Collect findings into the target's validation map.
//!
//! # Invariants
//! - Handlers run in configuration order and all of them always run.
//! - An empty pipeline records nothing, so every gate passes.
//! - Type-token runs start from a fresh `ValidationResult`; entity runs
//!   append to whatever the entity already carries.

use crate::model::validation::{Validatable, ValidationError, ValidationResult, ValidationResults};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub mod student_age;

/// What a handler inspects: one entity instance, or a type token standing in
/// for "no specific instance" (reads, counts, deletes by key).
pub enum PreActionTarget<'a, E: ?Sized> {
    Entity(&'a mut E),
    Type {
        entity_type: &'static str,
        result: &'a mut ValidationResult,
    },
}

impl<E: Validatable + ?Sized> PreActionTarget<'_, E> {
    /// The concrete entity, when the target is an instance.
    pub fn entity(&self) -> Option<&E> {
        match self {
            Self::Entity(entity) => Some(&**entity),
            Self::Type { .. } => None,
        }
    }

    pub fn validation_results(&self) -> &ValidationResults {
        match self {
            Self::Entity(entity) => entity.validation_results(),
            Self::Type { result, .. } => result.validation_results(),
        }
    }

    pub fn validation_results_mut(&mut self) -> &mut ValidationResults {
        match self {
            Self::Entity(entity) => entity.validation_results_mut(),
            Self::Type { result, .. } => result.validation_results_mut(),
        }
    }
}

/// One interception unit run before a repository operation.
pub trait PreActionHandler<E: ?Sized> {
    fn operate(&self, target: &mut PreActionTarget<'_, E>) -> Result<(), ValidationError>;
}

/// Ordered handler list owned by one repository.
pub struct PreActionPipeline<E: ?Sized> {
    handlers: Vec<Arc<dyn PreActionHandler<E>>>,
}

impl<E: ?Sized> Default for PreActionPipeline<E> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<E: ?Sized> Clone for PreActionPipeline<E> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<E: ?Sized> Debug for PreActionPipeline<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreActionPipeline")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<E: Validatable + ?Sized + 'static> PreActionPipeline<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` and returns the pipeline for chaining.
    pub fn with<H: PreActionHandler<E> + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Appends an already shared handler.
    pub fn push(&mut self, handler: Arc<dyn PreActionHandler<E>>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs every handler against `entity`, appending to its own map.
    pub fn run_on_entity(&self, entity: &mut E) -> Result<(), ValidationError> {
        let mut target = PreActionTarget::Entity(entity);
        for handler in &self.handlers {
            handler.operate(&mut target)?;
        }
        Ok(())
    }

    /// Runs every handler against a type token and returns the findings.
    pub fn run_on_type(&self, entity_type: &'static str) -> Result<ValidationResult, ValidationError> {
        let mut result = ValidationResult::new();
        {
            let mut target = PreActionTarget::Type {
                entity_type,
                result: &mut result,
            };
            for handler in &self.handlers {
                handler.operate(&mut target)?;
            }
        }
        Ok(result)
    }
}
