use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Specify a Librato user with --user or the LIBRATO_USER environment variable.")]
    MissingLibratoUser,
    #[error("Specify a Librato token with --token or the LIBRATO_TOKEN environment variable.")]
    MissingLibratoToken,
    #[error("Flush interval must be at least one second.")]
    ZeroFlushInterval,
}
