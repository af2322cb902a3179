use provision_kernel::AppCredentials;
use secrecy::SecretString;
use serde::Serialize;

/// The only role an application user is ever granted.
pub const READ_WRITE_ROLE: &str = "readWrite";

/// A role scoped to one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleGrant {
    pub role: String,
    #[serde(rename = "db")]
    pub database: String,
}

impl RoleGrant {
    pub fn read_write(database: impl Into<String>) -> Self {
        Self {
            role: READ_WRITE_ROLE.to_string(),
            database: database.into(),
        }
    }
}

/// Everything needed for one create-user call. Built once per run.
#[derive(Debug)]
pub struct ProvisionRequest {
    database_name: String,
    user_name: String,
    password: SecretString,
    roles: Vec<RoleGrant>,
}

impl ProvisionRequest {
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn roles(&self) -> &[RoleGrant] {
        &self.roles
    }
}

impl From<AppCredentials> for ProvisionRequest {
    fn from(credentials: AppCredentials) -> Self {
        let roles = vec![RoleGrant::read_write(credentials.database.clone())];
        Self {
            database_name: credentials.database,
            user_name: credentials.user,
            password: credentials.password,
            roles,
        }
    }
}
