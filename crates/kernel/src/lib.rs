pub mod credentials;
pub mod settings;

pub use credentials::{AppCredentials, ConfigurationError};
pub use settings::Settings;
