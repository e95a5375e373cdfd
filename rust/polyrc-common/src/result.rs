pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[cold]
pub fn null_handle<T>(handle: &'static str) -> Result<T> {
    Err(crate::error::ErrorKind::NullHandle { handle }.into())
}

#[cold]
pub fn cast_failed<T>(from: &'static str, to: &'static str) -> Result<T> {
    Err(crate::error::ErrorKind::CastFailed { from, to }.into())
}
