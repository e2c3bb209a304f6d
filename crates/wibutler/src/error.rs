//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use wibutler_config::ConfigError;
use wibutler_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to hub at {url}")]
    #[diagnostic(
        code(wibutler::connection_failed),
        help(
            "Check that the hub is powered and reachable.\n\
             Reason: {reason}\n\
             Try --tls / --port if the hub is not on the default http port 8081."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(wibutler::auth_failed),
        help(
            "Verify the username and password.\n\
             Re-run: wibutler config init"
        )
    )]
    AuthFailed { message: String },

    #[error("No password configured for '{username}'")]
    #[diagnostic(
        code(wibutler::no_credentials),
        help(
            "Store one with: wibutler config init\n\
             Or set WIBUTLER_PASSWORD, or point password_env at a variable."
        )
    )]
    NoCredentials { username: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(wibutler::not_found),
        help("Run: wibutler {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Commands ─────────────────────────────────────────────────────

    #[error("'{operation}' is not supported by {entity}")]
    #[diagnostic(code(wibutler::unsupported))]
    Unsupported { operation: String, entity: String },

    #[error("The hub did not accept the command: {message}")]
    #[diagnostic(
        code(wibutler::command_failed),
        help("Run with -v for the hub's response; stopping a cover needs --last.")
    )]
    CommandFailed { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(wibutler::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("No hub configured")]
    #[diagnostic(
        code(wibutler::no_config),
        help(
            "Create a config with: wibutler config init\n\
             Expected at: {path}\n\
             Or pass --host and --username."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(wibutler::config))]
    Config(ConfigError),

    // ── Internal / IO ────────────────────────────────────────────────

    #[error("Internal error: {0}")]
    #[diagnostic(code(wibutler::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::HubClosed => CliError::ConnectionFailed {
                url: "(closed)".into(),
                reason: "hub connection was closed".into(),
            },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::EntityNotFound { identifier } => CliError::NotFound {
                resource_type: "entity".into(),
                identifier,
                list_command: "entities list".into(),
            },

            CoreError::Unsupported { operation, entity } => {
                CliError::Unsupported { operation, entity }
            }

            CoreError::CommandFailed { message } => CliError::CommandFailed { message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { username } => CliError::NoCredentials { username },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let auth = CliError::from(CoreError::AuthenticationFailed {
            message: "rejected".into(),
        });
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let missing = CliError::from(CoreError::EntityNotFound {
            identifier: "x".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let down = CliError::from(CoreError::ConnectionFailed {
            url: "http://hub:8081".into(),
            reason: "refused".into(),
        });
        assert_eq!(down.exit_code(), exit_code::CONNECTION);

        let invalid = CliError::from(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
        assert_eq!(invalid.exit_code(), exit_code::USAGE);

        let rejected = CliError::from(CoreError::CommandFailed {
            message: "stop on 'b1'".into(),
        });
        assert_eq!(rejected.exit_code(), exit_code::GENERAL);
    }
}
