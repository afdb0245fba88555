//! Age gate for `Student` writes.

use super::{PreActionHandler, PreActionTarget};
use crate::model::entity::Record;
use crate::model::student::Student;
use crate::model::validation::{ValidationError, ValidationResults};

pub const UNDER_18_AGE_CODE: &str = "Under18Age";
pub const UNDER_18_AGE_MESSAGE: &str = "Age can not be under 18";

const MINIMUM_AGE: i64 = 18;

/// Flags students younger than 18. Type-token targets always pass.
///
/// Works on the typed repository and, by downcasting, on the untyped one.
#[derive(Debug, Clone, Copy, Default)]
pub struct StudentAgeGate;

impl StudentAgeGate {
    fn check(student_age: Option<i64>, results: &mut ValidationResults) {
        if student_age.is_some_and(|age| age < MINIMUM_AGE) {
            // Keyed set keeps reruns on the same entity idempotent.
            results.set(UNDER_18_AGE_CODE, UNDER_18_AGE_MESSAGE);
        }
    }
}

impl PreActionHandler<Student> for StudentAgeGate {
    fn operate(&self, target: &mut PreActionTarget<'_, Student>) -> Result<(), ValidationError> {
        if let PreActionTarget::Entity(student) = target {
            let age = student.age;
            Self::check(age, &mut student.validation_results);
        }
        Ok(())
    }
}

impl PreActionHandler<dyn Record> for StudentAgeGate {
    fn operate(
        &self,
        target: &mut PreActionTarget<'_, dyn Record>,
    ) -> Result<(), ValidationError> {
        if let PreActionTarget::Entity(record) = target {
            if let Some(student) = record.downcast_mut::<Student>() {
                let age = student.age;
                Self::check(age, &mut student.validation_results);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{StudentAgeGate, UNDER_18_AGE_CODE, UNDER_18_AGE_MESSAGE};
    use crate::model::entity::Record;
    use crate::model::student::Student;
    use crate::model::validation::Validatable;
    use crate::pre_action::PreActionPipeline;

    #[test]
    fn flags_minors_only() {
        let pipeline = PreActionPipeline::<Student>::new().with(StudentAgeGate);

        let mut tom = Student::new("Tom", 15);
        pipeline.run_on_entity(&mut tom).expect("run");
        assert_eq!(
            tom.validation_results.get(UNDER_18_AGE_CODE),
            Some(UNDER_18_AGE_MESSAGE)
        );

        let mut ann = Student::new("Ann", 18);
        pipeline.run_on_entity(&mut ann).expect("run");
        assert!(ann.validation_results.is_empty());
    }

    #[test]
    fn reruns_are_idempotent() {
        let pipeline = PreActionPipeline::<Student>::new().with(StudentAgeGate);
        let mut tom = Student::new("Tom", 15);
        pipeline.run_on_entity(&mut tom).expect("first");
        pipeline.run_on_entity(&mut tom).expect("second");
        assert_eq!(tom.validation_results.len(), 1);
    }

    #[test]
    fn untyped_gate_downcasts_students() {
        let pipeline = PreActionPipeline::<dyn Record>::new().with(StudentAgeGate);
        let mut tom: Box<dyn Record> = Box::new(Student::new("Tom", 15));
        pipeline.run_on_entity(&mut *tom).expect("run");
        assert!(tom.validation_results().contains(UNDER_18_AGE_CODE));
    }
}
