//! Application credentials the provisioner must be given.
//!
//! These come straight from the process environment and have no defaults:
//! a run without all three aborts before touching the database.

use secrecy::SecretString;
use thiserror::Error;

pub const DATABASE_VAR: &str = "APP_MONGO_DB";
pub const USER_VAR: &str = "APP_MONGO_USER";
pub const PASSWORD_VAR: &str = "APP_MONGO_PASSWORD";

/// Fatal configuration problems. Nothing is sent to the server when one occurs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error(
        "application database details ({}) are not set in environment variables",
        .0.join(", ")
    )]
    MissingVariables(Vec<&'static str>),
}

/// Database name, user name and password for the application user.
#[derive(Debug)]
pub struct AppCredentials {
    pub database: String,
    pub user: String,
    pub password: SecretString,
}

impl AppCredentials {
    /// Read the credentials from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the credentials through `lookup`, reporting every missing or empty
    /// variable at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let database = read(DATABASE_VAR);
        let user = read(USER_VAR);
        let password = read(PASSWORD_VAR);

        match (database, user, password) {
            (Some(database), Some(user), Some(password)) => Ok(Self {
                database,
                user,
                password: SecretString::from(password),
            }),
            (database, user, password) => {
                let missing = [
                    (DATABASE_VAR, database.is_none()),
                    (USER_VAR, user.is_none()),
                    (PASSWORD_VAR, password.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                Err(ConfigurationError::MissingVariables(missing))
            }
        }
    }
}
