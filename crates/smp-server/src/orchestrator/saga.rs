//! Ordered steps with best-effort compensation.
//!
//! A plan is plain data: the steps to perform in order, the undo action of
//! each step, and which failures trigger compensation of the steps that
//! already completed. [`run`] interprets a plan against a [`SagaExecutor`].

use async_trait::async_trait;
use smp_core::{Participant, Result, SmpError};
use tracing::{error, warn};

/// Forward action of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaAction {
    RemoveFromDirectory,
    DeregisterFromSml,
    DeleteLocal,
}

/// Undo of a completed step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Undo {
    /// Publish the participant in the directory again
    Republish,
}

/// Applied when an undo itself fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Persist the participant as unpublished
    MarkUnpublished,
}

impl Undo {
    pub fn fallback(self) -> Option<Fallback> {
        match self {
            Undo::Republish => Some(Fallback::MarkUnpublished),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaStep {
    pub action: SagaAction,
    pub undo: Option<Undo>,
    /// Whether failure of this step compensates the completed steps
    pub compensate_on_failure: bool,
}

/// Ordered steps of a saga
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SagaPlan {
    steps: Vec<SagaStep>,
}

impl SagaPlan {
    /// Deletion of a participant: directory first, then the SML, then the row.
    ///
    /// The SML step is skipped while a migration is pending, the receiving
    /// server completes the registration change.
    pub fn for_deletion(participant: &Participant) -> Self {
        let mut steps = Vec::new();
        if participant.published_in_directory {
            steps.push(SagaStep {
                action: SagaAction::RemoveFromDirectory,
                undo: Some(Undo::Republish),
                compensate_on_failure: false,
            });
        }
        if participant.registered_in_sml && !participant.is_pending_migration() {
            steps.push(SagaStep {
                action: SagaAction::DeregisterFromSml,
                undo: None,
                compensate_on_failure: true,
            });
        }
        steps.push(SagaStep {
            action: SagaAction::DeleteLocal,
            undo: None,
            compensate_on_failure: false,
        });
        Self { steps }
    }

    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }

    pub fn contains(&self, action: SagaAction) -> bool {
        self.steps.iter().any(|s| s.action == action)
    }
}

/// Performs the actions of a saga on a working copy of the participant.
///
/// Implementations update the flags of the working copy as actions succeed.
#[async_trait]
pub trait SagaExecutor: Send + Sync {
    async fn perform(&self, action: SagaAction, participant: &mut Participant) -> Result<()>;

    async fn undo(&self, undo: Undo, participant: &mut Participant) -> Result<()>;

    async fn fallback(&self, fallback: Fallback, participant: &mut Participant) -> Result<()>;
}

/// Execute `plan`.
///
/// On a compensating failure the completed steps are undone in reverse
/// order. If an undo succeeds only the original error is returned; if it
/// fails its fallback is applied and a combined error is returned.
pub async fn run<E>(plan: &SagaPlan, executor: &E, participant: &mut Participant) -> Result<()>
where
    E: SagaExecutor + ?Sized,
{
    let mut completed: Vec<&SagaStep> = Vec::new();
    for step in plan.steps() {
        match executor.perform(step.action, participant).await {
            Ok(()) => completed.push(step),
            Err(cause) => {
                warn!(participant = %participant.id, action = ?step.action, error = %cause, "Saga step failed");
                if !step.compensate_on_failure {
                    return Err(cause);
                }
                return Err(compensate(&completed, executor, participant, cause).await);
            }
        }
    }
    Ok(())
}

async fn compensate<E>(completed: &[&SagaStep], executor: &E, participant: &mut Participant, cause: SmpError) -> SmpError
where
    E: SagaExecutor + ?Sized,
{
    for step in completed.iter().rev() {
        let Some(undo) = step.undo else {
            continue;
        };
        if let Err(undo_err) = executor.undo(undo, participant).await {
            error!(
                participant = %participant.id,
                undo = ?undo,
                error = %undo_err,
                "Compensation failed"
            );
            if let Some(fallback) = undo.fallback() {
                if let Err(e) = executor.fallback(fallback, participant).await {
                    error!(participant = %participant.id, fallback = ?fallback, error = %e, "Fallback failed");
                }
            }
            return SmpError::Compensation {
                cause: Box::new(cause),
                compensation: Box::new(undo_err),
            };
        }
    }
    cause
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use smp_core::{IdScheme, Identifier};

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
        fail: Vec<SagaAction>,
        fail_undo: bool,
    }

    #[async_trait]
    impl SagaExecutor for Recorder {
        async fn perform(&self, action: SagaAction, _: &mut Participant) -> Result<()> {
            self.log.lock().push(format!("{:?}", action));
            if self.fail.contains(&action) {
                return Err(SmpError::NetworkRegistration(format!("{:?} failed", action)));
            }
            Ok(())
        }

        async fn undo(&self, undo: Undo, _: &mut Participant) -> Result<()> {
            self.log.lock().push(format!("undo {:?}", undo));
            if self.fail_undo {
                return Err(SmpError::Directory("undo failed".into()));
            }
            Ok(())
        }

        async fn fallback(&self, fallback: Fallback, _: &mut Participant) -> Result<()> {
            self.log.lock().push(format!("fallback {:?}", fallback));
            Ok(())
        }
    }

    fn participant(registered: bool, published: bool, code: Option<&str>) -> Participant {
        let scheme = IdScheme::new("iso6523-actorid-upis", false).unwrap();
        let mut p = Participant::new(Identifier::with_scheme(scheme, "9999:test1").unwrap());
        p.registered_in_sml = registered;
        p.published_in_directory = published;
        p.sml_migration_code = code.map(str::to_string);
        p
    }

    #[test]
    fn test_deletion_plan_order() {
        let plan = SagaPlan::for_deletion(&participant(true, true, None));
        let actions: Vec<SagaAction> = plan.steps().iter().map(|s| s.action).collect();
        assert_eq!(
            actions,
            vec![SagaAction::RemoveFromDirectory, SagaAction::DeregisterFromSml, SagaAction::DeleteLocal]
        );
    }

    #[test]
    fn test_pending_migration_skips_sml() {
        let plan = SagaPlan::for_deletion(&participant(true, false, Some("code")));
        assert!(!plan.contains(SagaAction::DeregisterFromSml));
        assert!(plan.contains(SagaAction::DeleteLocal));
    }

    #[tokio::test]
    async fn test_failure_without_compensation_stops() {
        let mut p = participant(true, true, None);
        let exec = Recorder {
            fail: vec![SagaAction::RemoveFromDirectory],
            ..Default::default()
        };

        let result = run(&SagaPlan::for_deletion(&p), &exec, &mut p).await;
        assert!(result.is_err());
        assert_eq!(*exec.log.lock(), vec!["RemoveFromDirectory"]);
    }

    #[tokio::test]
    async fn test_compensation_success_returns_cause() {
        let mut p = participant(true, true, None);
        let exec = Recorder {
            fail: vec![SagaAction::DeregisterFromSml],
            ..Default::default()
        };

        let result = run(&SagaPlan::for_deletion(&p), &exec, &mut p).await;
        assert!(matches!(result, Err(SmpError::NetworkRegistration(_))));
        assert_eq!(
            *exec.log.lock(),
            vec!["RemoveFromDirectory", "DeregisterFromSml", "undo Republish"]
        );
    }

    #[tokio::test]
    async fn test_failed_compensation_applies_fallback() {
        let mut p = participant(true, true, None);
        let exec = Recorder {
            fail: vec![SagaAction::DeregisterFromSml],
            fail_undo: true,
            ..Default::default()
        };

        let result = run(&SagaPlan::for_deletion(&p), &exec, &mut p).await;
        assert!(matches!(result, Err(SmpError::Compensation { .. })));
        assert_eq!(exec.log.lock().last().map(String::as_str), Some("fallback MarkUnpublished"));
    }
}
