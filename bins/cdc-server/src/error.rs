#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    Engine(#[from] cdc_engine::EngineError),

    #[error("{0}")]
    Server(#[from] cdc_api_server::ServerError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
