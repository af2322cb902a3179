use async_trait::async_trait;

use crate::acknowledgement::{classify, Acknowledgement, Outcome};
use crate::request::ProvisionRequest;

/// A database server able to hand out per-database handles.
pub trait Deployment: Send + Sync {
    type Database: UserAdmin;

    /// Select the database named `name`.
    fn database(&self, name: &str) -> Self::Database;
}

/// User administration on one selected database.
#[async_trait]
pub trait UserAdmin: Send + Sync {
    /// Issue a single create-user command. Failures come back as an
    /// [`Acknowledgement`] rather than an error so they can be classified.
    async fn create_user(&self, request: &ProvisionRequest) -> Acknowledgement;
}

/// Ensures the application user described by a [`ProvisionRequest`] exists.
pub struct Provisioner<D> {
    deployment: D,
}

impl<D: Deployment> Provisioner<D> {
    pub fn new(deployment: D) -> Self {
        Self { deployment }
    }

    /// Select the target database, create the user once and report the result.
    pub async fn ensure_user(&self, request: &ProvisionRequest) -> Outcome {
        let database = self.deployment.database(request.database_name());

        tracing::debug!(
            user = request.user_name(),
            database = request.database_name(),
            "issuing createUser"
        );
        let ack = database.create_user(request).await;

        let outcome = classify(&ack);
        report(request, &outcome);
        outcome
    }
}

/// Emit the status line for `outcome`.
pub fn report(request: &ProvisionRequest, outcome: &Outcome) {
    let user = request.user_name();
    let database = request.database_name();

    match outcome {
        Outcome::Created => tracing::info!(
            user,
            database,
            "successfully created or ensured user '{}' with readWrite access to database '{}'",
            user,
            database
        ),
        Outcome::AlreadyExists => tracing::info!(
            user,
            database,
            "user '{}' already exists in database '{}'; skipping creation",
            user,
            database
        ),
        Outcome::Anomaly(ack) => tracing::error!(
            user,
            database,
            response = %ack,
            "error creating user '{}' for database '{}'",
            user,
            database
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RoleGrant;
    use provision_kernel::AppCredentials;
    use secrecy::{ExposeSecret, SecretString};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct RecordedCall {
        database: String,
        user: String,
        password: String,
        roles: Vec<RoleGrant>,
    }

    /// Replays canned replies and records every create-user call.
    #[derive(Clone, Default)]
    struct FakeDeployment {
        replies: Arc<Mutex<VecDeque<Acknowledgement>>>,
        calls: Arc<Mutex<Vec<RecordedCall>>>,
    }

    impl FakeDeployment {
        fn replying(replies: Vec<serde_json::Value>) -> Self {
            let fake = Self::default();
            fake.replies
                .lock()
                .unwrap()
                .extend(replies.into_iter().map(Acknowledgement::from_value));
            fake
        }

        fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    struct FakeDatabase {
        name: String,
        deployment: FakeDeployment,
    }

    impl Deployment for FakeDeployment {
        type Database = FakeDatabase;

        fn database(&self, name: &str) -> FakeDatabase {
            FakeDatabase {
                name: name.to_string(),
                deployment: self.clone(),
            }
        }
    }

    #[async_trait]
    impl UserAdmin for FakeDatabase {
        async fn create_user(&self, request: &ProvisionRequest) -> Acknowledgement {
            self.deployment.calls.lock().unwrap().push(RecordedCall {
                database: self.name.clone(),
                user: request.user_name().to_string(),
                password: request.password().expose_secret().to_string(),
                roles: request.roles().to_vec(),
            });
            self.deployment
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default()
        }
    }

    fn request() -> ProvisionRequest {
        ProvisionRequest::from(AppCredentials {
            database: "orders".to_string(),
            user: "orders_app".to_string(),
            password: SecretString::from("s3cret"),
        })
    }

    #[tokio::test]
    async fn creates_user_once_with_read_write_on_target_database() {
        let fake = FakeDeployment::replying(vec![json!({"ok": 1})]);
        let provisioner = Provisioner::new(fake.clone());

        let outcome = provisioner.ensure_user(&request()).await;

        assert_eq!(outcome, Outcome::Created);
        assert_eq!(
            fake.calls(),
            vec![RecordedCall {
                database: "orders".to_string(),
                user: "orders_app".to_string(),
                password: "s3cret".to_string(),
                roles: vec![RoleGrant::read_write("orders")],
            }]
        );
    }

    #[tokio::test]
    async fn success_shapes_are_created() {
        for reply in [json!({"ok": 1}), json!({"code": 0}), json!({})] {
            let provisioner = Provisioner::new(FakeDeployment::replying(vec![reply]));
            assert_eq!(provisioner.ensure_user(&request()).await, Outcome::Created);
        }
    }

    #[tokio::test]
    async fn existing_user_is_skipped() {
        let fake = FakeDeployment::replying(vec![json!({
            "errmsg": "couldn't add user: UserAlreadyExists"
        })]);
        let outcome = Provisioner::new(fake).ensure_user(&request()).await;
        assert_eq!(outcome, Outcome::AlreadyExists);
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn unexpected_reply_is_reported_as_anomaly() {
        let fake = FakeDeployment::replying(vec![json!({"errmsg": "Authentication failed"})]);
        let outcome = Provisioner::new(fake.clone()).ensure_user(&request()).await;

        match outcome {
            Outcome::Anomaly(ack) => assert_eq!(ack.errmsg(), Some("Authentication failed")),
            other => panic!("expected anomaly, got {:?}", other),
        }
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test]
    async fn repeated_runs_are_both_successful() {
        let fake = FakeDeployment::replying(vec![
            json!({"ok": 1}),
            json!({"ok": 0, "errmsg": "User \"orders_app@orders\" already exists", "code": 51003}),
        ]);
        let provisioner = Provisioner::new(fake.clone());

        let first = provisioner.ensure_user(&request()).await;
        let second = provisioner.ensure_user(&request()).await;

        assert_eq!(first, Outcome::Created);
        assert_eq!(second, Outcome::AlreadyExists);
        assert_eq!(fake.calls().len(), 2);
    }
}
