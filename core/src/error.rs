/// A boxed error raised by the platform behind the traits in [`crate::platform`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("NFC adapter is not available or turned off")]
    AdapterUnavailable,

    #[error("Notification has no valid tag for NFC dispatch")]
    NoValidTag,

    /// Opening or talking to the link failed.
    /// The cause is logged where it occurs, and never carried here.
    #[error("Cannot connect to NFC adapter")]
    Transport,

    #[error("Failed to register foreground dispatch: {0}")]
    DispatchRegistration(#[source] BoxError),
}

pub type Result<T> = std::result::Result<T, Error>;
