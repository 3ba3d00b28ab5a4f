use aes::cipher::block_padding::UnpadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HinaError {
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("No variant found in master playlist")]
    NoVariant,

    #[error("No segments found in media playlist")]
    NoSegments,

    #[error("Invalid AES-128 key: {0:?}")]
    InvalidAes128Key(Vec<u8>),

    #[error("Download canceled")]
    Canceled,

    #[error("Pkcs7 unpad error")]
    UnpadError(#[from] UnpadError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
}

pub type HinaResult<T> = Result<T, HinaError>;
