use std::io;
use thiserror::Error;

/// Failure of a user-triggered open
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("No serial device selected")]
    NoDeviceSelected,

    #[error("Session already open on '{device}'")]
    AlreadyOpen { device: String },

    #[error("Serial device '{device}' is unavailable: {source}")]
    DeviceUnavailable {
        device: String,
        #[source]
        source: io::Error,
    },
}

/// Failure of a user-triggered close
///
/// `AlreadyInvalid` still leaves the session Closed; it only tells the caller
/// the handle died underneath the application.
#[derive(Error, Debug)]
pub enum CloseError {
    #[error("No session is open")]
    NotOpen,

    #[error("Serial device '{device}' vanished before it could be closed: {source}")]
    AlreadyInvalid {
        device: String,
        #[source]
        source: io::Error,
    },
}

/// Failure of the transmit path
#[derive(Error, Debug)]
pub enum SendError {
    #[error("No session is open")]
    NotOpen,

    #[error("Write to '{device}' failed: {source}")]
    WriteFailed {
        device: String,
        #[source]
        source: io::Error,
    },
}

/// SerialTerm unified error type
#[derive(Error, Debug)]
pub enum SerialTermError {
    #[error("Open failed: {0}")]
    Open(#[from] OpenError),

    #[error("Close failed: {0}")]
    Close(#[from] CloseError),

    #[error("Send failed: {0}")]
    Send(#[from] SendError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

pub type SerialTermResult<T> = Result<T, SerialTermError>;
