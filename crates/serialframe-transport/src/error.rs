use std::path::PathBuf;

/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to duplicate a handle to an open device.
    #[error("failed to clone port handle for {path}: {source}")]
    Clone {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the port.
    #[error("port I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The port has been closed.
    #[error("port closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

pub(crate) fn serialport_to_io(err: serialport::Error) -> std::io::Error {
    use serialport::ErrorKind;

    let kind = match err.kind() {
        ErrorKind::NoDevice => std::io::ErrorKind::NotFound,
        ErrorKind::InvalidInput => std::io::ErrorKind::InvalidInput,
        ErrorKind::Io(kind) => kind,
        ErrorKind::Unknown => std::io::ErrorKind::Other,
    };
    std::io::Error::new(kind, err.description)
}
