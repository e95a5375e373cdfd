use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn null_handle(handle: &'static str) -> Error {
        Error(ErrorKind::NullHandle { handle }.into())
    }

    pub fn expired(handle: &'static str) -> Error {
        Error(ErrorKind::Expired { handle }.into())
    }

    pub fn cast_failed(from: &'static str, to: &'static str) -> Error {
        Error(ErrorKind::CastFailed { from, to }.into())
    }

    /// Returns true if this error reports a failed runtime type check.
    pub fn is_cast_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::CastFailed { .. })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("access through a null {handle} handle")]
    NullHandle { handle: &'static str },

    #[error("{handle} observer outlived its value")]
    Expired { handle: &'static str },

    #[error("cannot cast '{from}' to '{to}'")]
    CastFailed {
        from: &'static str,
        to: &'static str,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
