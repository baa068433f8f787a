#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("registry: {0}")]
    Registry(#[from] job_registry::RegistryError),

    #[error("api: {0}")]
    Api(String),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}

impl ServerError {
    /// Prefix the detail of a `Config` error; other variants pass through.
    pub fn with_detail_prefix(self, prefix: &str) -> Self {
        match self {
            ServerError::Config { context, detail } => ServerError::Config {
                context,
                detail: format!("{prefix}: {detail}"),
            },
            other => other,
        }
    }
}
