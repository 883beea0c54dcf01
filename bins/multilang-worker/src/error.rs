use multilang_api::MultilangError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("input '{path}': {source}")]
    Input { path: String, source: std::io::Error },

    #[error("{0}")]
    Protocol(#[from] MultilangError),
}
