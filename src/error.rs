//! The error taxonomy shared by every oiXX engine.
//!
//! All fallible operations in this crate return [`Result`], never panic on
//! caller-supplied data, and never partially mutate a file object on
//! failure (insertion routines roll back whatever they pushed before
//! returning an error — see the individual engines for the rollback
//! points).

use thiserror::Error;

pub type Result<A, E = Error> = std::result::Result<A, E>;

/// The kind of failure, independent of where it occurred.
///
/// Mirrors the reference implementation's `EGenericError` taxonomy so that
/// callers familiar with the C API recognize the same failure classes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("null pointer: {message}")]
    NullPointer { message: &'static str },

    #[error("invalid parameter {parameter_index}: {message}")]
    InvalidParameter {
        parameter_index: u32,
        message: &'static str,
    },

    #[error("invalid state: {message}")]
    InvalidState { message: &'static str },

    #[error("invalid operation: {message}")]
    InvalidOperation { message: &'static str },

    #[error("out of bounds: value {value} exceeds bound {bound} ({message})")]
    OutOfBounds {
        value: u64,
        bound: u64,
        message: &'static str,
    },

    #[error("overflow: {message}")]
    Overflow { message: &'static str },

    #[error("unauthorized: {message}")]
    Unauthorized { message: &'static str },

    #[error("const data: {message}")]
    ConstData { message: &'static str },

    #[error("unsupported: {message}")]
    Unsupported { message: &'static str },

    #[error("{0}")]
    Stderr(String),

    #[error("AES-GCM failure: {0}")]
    Aead(#[from] aes_gcm::Error),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn null_pointer(message: &'static str) -> Self {
        Error::NullPointer { message }
    }

    pub fn invalid_parameter(parameter_index: u32, message: &'static str) -> Self {
        Error::InvalidParameter {
            parameter_index,
            message,
        }
    }

    pub fn invalid_state(message: &'static str) -> Self {
        Error::InvalidState { message }
    }

    pub fn invalid_operation(message: &'static str) -> Self {
        Error::InvalidOperation { message }
    }

    pub fn out_of_bounds(value: u64, bound: u64, message: &'static str) -> Self {
        Error::OutOfBounds {
            value,
            bound,
            message,
        }
    }

    pub fn overflow(message: &'static str) -> Self {
        Error::Overflow { message }
    }

    pub fn unauthorized(message: &'static str) -> Self {
        Error::Unauthorized { message }
    }

    pub fn const_data(message: &'static str) -> Self {
        Error::ConstData { message }
    }

    pub fn unsupported(message: &'static str) -> Self {
        Error::Unsupported { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_carries_bound() {
        let e = Error::out_of_bounds(70_000, 65_535, "struct table capacity");
        match e {
            Error::OutOfBounds { value, bound, .. } => {
                assert_eq!(value, 70_000);
                assert_eq!(bound, 65_535);
            }
            _ => panic!("wrong variant"),
        }
    }
}
