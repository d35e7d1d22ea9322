use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Container not found: {0}")]
    ContainerNotFound(String),
}
