use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioModemError {
    #[error("CRC mismatch in payload")]
    PayloadCrcMismatch,

    #[error("Reed-Solomon decode failure")]
    FecDecodeFailure,

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid input size")]
    InvalidInputSize,

    #[error("Insufficient data")]
    InsufficientData,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, AudioModemError>;
