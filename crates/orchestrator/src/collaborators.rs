//! Timeout-bounded collaborator decorators.
//!
//! Every collaborator call made by the executor goes through one of these
//! wrappers, so a provider that never answers surfaces as
//! [`CollaboratorError::Timeout`] instead of stalling the task forever.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use pipeline::{
    Collaborator, CollaboratorError, KnowledgeCollaborator, LandParcel, PolicyCollaborator,
    PolicyRecord,
};

/// Default bound on a single knowledge collaborator call.
pub const DEFAULT_KNOWLEDGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default bound on a single policy collaborator call.
pub const DEFAULT_POLICY_TIMEOUT: Duration = Duration::from_secs(30);

/// Wraps a [`KnowledgeCollaborator`] with a per-call timeout.
#[derive(Clone)]
pub struct TimedKnowledge {
    inner: Arc<dyn KnowledgeCollaborator>,
    timeout: Duration,
}

impl TimedKnowledge {
    pub fn new(inner: Arc<dyn KnowledgeCollaborator>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl KnowledgeCollaborator for TimedKnowledge {
    async fn analyze(&self, parcel: &LandParcel) -> Result<String, CollaboratorError> {
        match tokio::time::timeout(self.timeout, self.inner.analyze(parcel)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CollaboratorError::Timeout {
                collaborator: Collaborator::Knowledge,
                after: self.timeout,
            }),
        }
    }
}

/// Wraps a [`PolicyCollaborator`] with a per-call timeout.
#[derive(Clone)]
pub struct TimedPolicy {
    inner: Arc<dyn PolicyCollaborator>,
    timeout: Duration,
}

impl TimedPolicy {
    pub fn new(inner: Arc<dyn PolicyCollaborator>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl PolicyCollaborator for TimedPolicy {
    async fn find_policies(
        &self,
        parcel: &LandParcel,
    ) -> Result<Vec<PolicyRecord>, CollaboratorError> {
        match tokio::time::timeout(self.timeout, self.inner.find_policies(parcel)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CollaboratorError::Timeout {
                collaborator: Collaborator::Policy,
                after: self.timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::ParcelSubmission;

    struct Slow(Duration);

    #[async_trait]
    impl KnowledgeCollaborator for Slow {
        async fn analyze(&self, _parcel: &LandParcel) -> Result<String, CollaboratorError> {
            tokio::time::sleep(self.0).await;
            Ok("late".into())
        }
    }

    #[async_trait]
    impl PolicyCollaborator for Slow {
        async fn find_policies(
            &self,
            _parcel: &LandParcel,
        ) -> Result<Vec<PolicyRecord>, CollaboratorError> {
            tokio::time::sleep(self.0).await;
            Ok(Vec::new())
        }
    }

    fn parcel() -> LandParcel {
        ParcelSubmission {
            address: Some("Yuseong-gu, Daejeon".into()),
            zoning: Some("natural green".into()),
            land_use: Some("field".into()),
            terrain: Some("flat".into()),
            shape: Some("trapezoid".into()),
            road_frontage: Some("no frontage".into()),
            unit_price: Some(95_000),
            ..ParcelSubmission::default()
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn knowledge_timeout_is_normalized() {
        let timed = TimedKnowledge::new(
            Arc::new(Slow(Duration::from_secs(5))),
            Duration::from_millis(20),
        );
        let err = timed.analyze(&parcel()).await.unwrap_err();
        assert_eq!(
            err,
            CollaboratorError::Timeout {
                collaborator: Collaborator::Knowledge,
                after: Duration::from_millis(20),
            }
        );
    }

    #[tokio::test]
    async fn policy_timeout_is_normalized() {
        let timed = TimedPolicy::new(
            Arc::new(Slow(Duration::from_secs(5))),
            Duration::from_millis(20),
        );
        let err = timed.find_policies(&parcel()).await.unwrap_err();
        assert_eq!(err.collaborator(), Collaborator::Policy);
        assert_eq!(err.kind(), pipeline::FailureKind::CollaboratorTimeout);
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let timed = TimedKnowledge::new(
            Arc::new(Slow(Duration::from_millis(1))),
            Duration::from_secs(5),
        );
        assert_eq!(timed.analyze(&parcel()).await.unwrap(), "late");
    }
}
