#[derive(Debug, thiserror::Error)]
pub enum BleError {
    #[error("bluetooth error: {0}")]
    Btle(#[from] btleplug::Error),
    #[error("no bluetooth adapter found")]
    NoAdapter,
    #[error("no lock matching {0:?} found within {1:?}")]
    NotFound(Option<String>, std::time::Duration),
    #[error("invalid uuid {0}: {1}")]
    Uuid(String, uuid::Error),
}
