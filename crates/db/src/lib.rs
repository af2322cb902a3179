//! MongoDB implementation of the provisioner's database boundary.

use anyhow::Context;
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};

use mongo_provision::{Acknowledgement, Deployment, ProvisionRequest, UserAdmin};
use provision_kernel::settings::MongoSettings;

/// A MongoDB deployment reached through the admin connection string.
#[derive(Clone, Debug)]
pub struct MongoDeployment {
    connection: Connection,
}

/// Either a usable client or the reason the server could not be located.
#[derive(Clone, Debug)]
enum Connection {
    Ready(Client),
    Unreachable(String),
}

impl MongoDeployment {
    /// Build a client from settings. The driver connects lazily, so this only
    /// fails when the connection string itself is malformed.
    ///
    /// `mongodb+srv://` strings are resolved through DNS while parsing. A lookup
    /// failure is kept and handed back from every create-user call, so it is
    /// reported like any other unreachable server.
    pub async fn connect(settings: &MongoSettings) -> anyhow::Result<Self> {
        let mut options = match ClientOptions::parse(settings.uri.expose_secret()).await {
            Ok(options) => options,
            Err(err) if is_malformed(&err) => {
                return Err(anyhow::Error::new(err)
                    .context("failed to parse MongoDB connection string"));
            }
            Err(err) => {
                tracing::debug!(
                    target: "provision-db",
                    error = %err,
                    "mongodb deployment could not be resolved"
                );
                return Ok(Self {
                    connection: Connection::Unreachable(err.to_string()),
                });
            }
        };
        options.app_name = Some(settings.app.clone());

        let client = Client::with_options(options)
            .with_context(|| "failed to build MongoDB client")?;

        tracing::debug!(target: "provision-db", app = %settings.app, "mongodb client ready");
        Ok(Self {
            connection: Connection::Ready(client),
        })
    }
}

impl Deployment for MongoDeployment {
    type Database = MongoUserAdmin;

    fn database(&self, name: &str) -> MongoUserAdmin {
        let target = match &self.connection {
            Connection::Ready(client) => Target::Database(client.database(name)),
            Connection::Unreachable(reason) => Target::Unreachable(reason.clone()),
        };
        MongoUserAdmin { target }
    }
}

/// User administration scoped to one database.
#[derive(Clone, Debug)]
pub struct MongoUserAdmin {
    target: Target,
}

#[derive(Clone, Debug)]
enum Target {
    Database(Database),
    Unreachable(String),
}

#[async_trait]
impl UserAdmin for MongoUserAdmin {
    async fn create_user(&self, request: &ProvisionRequest) -> Acknowledgement {
        let database = match &self.target {
            Target::Database(database) => database,
            Target::Unreachable(reason) => return Acknowledgement::failure(reason.clone()),
        };

        match database.run_command(create_user_command(request)).await {
            Ok(reply) => Acknowledgement::from_value(Bson::Document(reply).into_relaxed_extjson()),
            Err(err) => error_acknowledgement(&err),
        }
    }
}

fn is_malformed(err: &MongoError) -> bool {
    matches!(err.kind.as_ref(), ErrorKind::InvalidArgument { .. })
}

/// The `createUser` command document for `request`.
pub fn create_user_command(request: &ProvisionRequest) -> Document {
    let roles: Vec<Document> = request
        .roles()
        .iter()
        .map(|grant| doc! { "role": grant.role.as_str(), "db": grant.database.as_str() })
        .collect();

    doc! {
        "createUser": request.user_name(),
        "pwd": request.password().expose_secret(),
        "roles": roles,
    }
}

/// Server command failures keep their code and name; every other driver
/// failure only has its message.
fn error_acknowledgement(err: &MongoError) -> Acknowledgement {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => {
            let mut fields = Map::new();
            fields.insert("ok".to_string(), Value::from(0));
            fields.insert("errmsg".to_string(), Value::from(command.message.clone()));
            fields.insert("code".to_string(), Value::from(command.code));
            fields.insert("codeName".to_string(), Value::from(command.code_name.clone()));
            Acknowledgement::new(fields)
        }
        _ => Acknowledgement::failure(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongo_provision::{classify, Outcome};
    use provision_kernel::AppCredentials;
    use secrecy::SecretString;

    fn request() -> ProvisionRequest {
        ProvisionRequest::from(AppCredentials {
            database: "orders".to_string(),
            user: "orders_app".to_string(),
            password: SecretString::from("s3cret"),
        })
    }

    fn settings(uri: &str) -> MongoSettings {
        MongoSettings {
            uri: SecretString::from(uri),
            app: "provision-db-tests".to_string(),
        }
    }

    #[test]
    fn command_grants_read_write_on_target_database() {
        let command = create_user_command(&request());
        assert_eq!(
            command,
            doc! {
                "createUser": "orders_app",
                "pwd": "s3cret",
                "roles": [{ "role": "readWrite", "db": "orders" }],
            }
        );
    }

    #[tokio::test]
    async fn malformed_uri_is_rejected() {
        let err = MongoDeployment::connect(&settings("postgres://localhost"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection string"));
    }

    #[tokio::test]
    async fn unreachable_server_becomes_an_anomaly() {
        let deployment = MongoDeployment::connect(&settings(
            "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&directConnection=true",
        ))
        .await
        .unwrap();

        let ack = deployment.database("orders").create_user(&request()).await;

        assert_eq!(ack.ok(), Some(0.0));
        assert!(ack.errmsg().is_some());
        assert!(matches!(classify(&ack), Outcome::Anomaly(_)));
    }

    #[tokio::test]
    async fn unresolvable_srv_host_becomes_an_anomaly() {
        let deployment = MongoDeployment::connect(&settings(
            "mongodb+srv://cluster0.nonexistent-host.invalid/?serverSelectionTimeoutMS=200",
        ))
        .await
        .unwrap();

        let ack = deployment.database("orders").create_user(&request()).await;

        assert_eq!(ack.ok(), Some(0.0));
        assert!(ack.errmsg().is_some_and(|msg| !msg.is_empty()));
        assert!(matches!(classify(&ack), Outcome::Anomaly(_)));
    }
}
