use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Callback data too long: {0} bytes")]
    TooLong(usize),

    #[error("Base64 decode error")]
    Base64Decode,

    #[error("Invalid action format")]
    InvalidFormat,
}
