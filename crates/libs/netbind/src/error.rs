/// Errors returned by interface lifecycle and registry operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum NetifError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("interface registration failed: {reason}")]
    Registration { reason: String },

    #[error("io error: {message}")]
    Io { message: String },

    /// The interface has not completed a successful `open` yet.
    #[error("interface is not open")]
    NotOpen,

    /// DHCP status was queried while DHCP was never enabled.
    #[error("dhcp is not enabled")]
    DhcpNotEnabled,

    #[error("interface has been shut down")]
    Disposed,

    #[error("interface name already registered: {name}")]
    DuplicateName { name: String },
}

impl NetifError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io { message: message.into() }
    }

    /// Returns `true` for logic errors in the caller, as opposed to I/O
    /// conditions that may clear on their own.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::NotOpen
                | Self::DhcpNotEnabled
                | Self::Disposed
                | Self::DuplicateName { .. }
        )
    }
}
