use thiserror::Error;

/// Outcome of every remote catalog operation: the value, or a classified failure
pub type ApiResult<T> = std::result::Result<T, ApiErrorKind>;

/// Closed taxonomy of remote failures.
///
/// Backend kinds mirror the numeric `status_code` of the catalog's error
/// envelope (2..=47). `InvalidResponse` covers payloads that could not be
/// decoded, and `Unknown` everything that could not be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ApiErrorKind {
    #[error("Invalid service: this service does not exist")]
    InvalidService,
    #[error("Authentication failed: you do not have permissions to access the service")]
    AuthenticationFailed,
    #[error("Invalid format: this service doesn't exist in that format")]
    InvalidFormat,
    #[error("Invalid parameters: your request parameters are incorrect")]
    InvalidParameters,
    #[error("Invalid id: the pre-requisite id is invalid or not found")]
    InvalidId,
    #[error("Invalid API key: you must be granted a valid key")]
    InvalidApiKey,
    #[error("Duplicate entry: the data you tried to submit already exists")]
    DuplicateEntry,
    #[error("Service offline: this service is temporarily offline, try again later")]
    ServiceOffline,
    #[error("Suspended API key: access to your account has been suspended")]
    SuspendedApiKey,
    #[error("Internal error: something went wrong on the catalog side")]
    InternalError,
    #[error("The item was updated successfully")]
    ItemUpdated,
    #[error("The item was deleted successfully")]
    ItemDeleted,
    #[error("Authentication failed")]
    AuthenticationDenied,
    #[error("Failed")]
    Failed,
    #[error("Device denied")]
    DeviceDenied,
    #[error("Session denied")]
    SessionDenied,
    #[error("Validation failed")]
    ValidationFailed,
    #[error("Invalid accept header")]
    InvalidAcceptHeader,
    #[error("Invalid date range: should be a range no longer than 14 days")]
    InvalidDateRange,
    #[error("Entry not found: the item you are trying to edit cannot be found")]
    EntryNotFound,
    #[error("Invalid page: pages start at 1 and max at 500")]
    InvalidPage,
    #[error("Invalid date: format needs to be YYYY-MM-DD")]
    InvalidDate,
    #[error("Your request to the backend server timed out, try again")]
    BackendTimeout,
    #[error("Your request count is over the allowed limit")]
    RequestLimitExceeded,
    #[error("You must provide a username and password")]
    CredentialsRequired,
    #[error("Too many append to response objects")]
    TooManyAppendedResponses,
    #[error("Invalid timezone")]
    InvalidTimezone,
    #[error("You must confirm this action")]
    ConfirmationRequired,
    #[error("Invalid username and/or password")]
    InvalidLogin,
    #[error("Account disabled: your account is no longer active")]
    AccountDisabled,
    #[error("Email not verified: your email address has not been verified")]
    EmailNotVerified,
    #[error("Invalid request token: the request token is either expired or invalid")]
    InvalidRequestToken,
    #[error("The resource you requested could not be found")]
    ResourceNotFound,
    #[error("Invalid token")]
    InvalidToken,
    #[error("This token hasn't been granted write permission by the user")]
    WritePermissionMissing,
    #[error("The requested session could not be found")]
    SessionNotFound,
    #[error("You don't have permission to edit this resource")]
    EditPermissionDenied,
    #[error("This resource is private")]
    PrivateResource,
    #[error("Nothing to update")]
    NothingToUpdate,
    #[error("This request token hasn't been approved by the user")]
    RequestTokenNotApproved,
    #[error("This request method is not supported for this resource")]
    MethodNotSupported,
    #[error("Couldn't connect to the backend server")]
    BackendConnectionFailed,
    #[error("The ID is invalid")]
    InvalidIdFormat,
    #[error("This user has been suspended")]
    UserSuspended,
    #[error("The API is undergoing maintenance, try again later")]
    UnderMaintenance,
    #[error("The input is not valid")]
    InvalidInput,
    #[error("The response could not be decoded")]
    InvalidResponse,
    #[error("Unknown error")]
    Unknown,
}

impl ApiErrorKind {
    pub const ALL: [ApiErrorKind; 48] = [
        ApiErrorKind::InvalidService,
        ApiErrorKind::AuthenticationFailed,
        ApiErrorKind::InvalidFormat,
        ApiErrorKind::InvalidParameters,
        ApiErrorKind::InvalidId,
        ApiErrorKind::InvalidApiKey,
        ApiErrorKind::DuplicateEntry,
        ApiErrorKind::ServiceOffline,
        ApiErrorKind::SuspendedApiKey,
        ApiErrorKind::InternalError,
        ApiErrorKind::ItemUpdated,
        ApiErrorKind::ItemDeleted,
        ApiErrorKind::AuthenticationDenied,
        ApiErrorKind::Failed,
        ApiErrorKind::DeviceDenied,
        ApiErrorKind::SessionDenied,
        ApiErrorKind::ValidationFailed,
        ApiErrorKind::InvalidAcceptHeader,
        ApiErrorKind::InvalidDateRange,
        ApiErrorKind::EntryNotFound,
        ApiErrorKind::InvalidPage,
        ApiErrorKind::InvalidDate,
        ApiErrorKind::BackendTimeout,
        ApiErrorKind::RequestLimitExceeded,
        ApiErrorKind::CredentialsRequired,
        ApiErrorKind::TooManyAppendedResponses,
        ApiErrorKind::InvalidTimezone,
        ApiErrorKind::ConfirmationRequired,
        ApiErrorKind::InvalidLogin,
        ApiErrorKind::AccountDisabled,
        ApiErrorKind::EmailNotVerified,
        ApiErrorKind::InvalidRequestToken,
        ApiErrorKind::ResourceNotFound,
        ApiErrorKind::InvalidToken,
        ApiErrorKind::WritePermissionMissing,
        ApiErrorKind::SessionNotFound,
        ApiErrorKind::EditPermissionDenied,
        ApiErrorKind::PrivateResource,
        ApiErrorKind::NothingToUpdate,
        ApiErrorKind::RequestTokenNotApproved,
        ApiErrorKind::MethodNotSupported,
        ApiErrorKind::BackendConnectionFailed,
        ApiErrorKind::InvalidIdFormat,
        ApiErrorKind::UserSuspended,
        ApiErrorKind::UnderMaintenance,
        ApiErrorKind::InvalidInput,
        ApiErrorKind::InvalidResponse,
        ApiErrorKind::Unknown,
    ];

    /// Fixed human-readable description
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Numeric code the backend uses for this kind, if it has one.
    ///
    /// Deliberately exhaustive: a new variant does not compile until it is
    /// placed here, which keeps `from_backend_code` complete.
    pub fn backend_code(&self) -> Option<u16> {
        match self {
            ApiErrorKind::InvalidService => Some(2),
            ApiErrorKind::AuthenticationFailed => Some(3),
            ApiErrorKind::InvalidFormat => Some(4),
            ApiErrorKind::InvalidParameters => Some(5),
            ApiErrorKind::InvalidId => Some(6),
            ApiErrorKind::InvalidApiKey => Some(7),
            ApiErrorKind::DuplicateEntry => Some(8),
            ApiErrorKind::ServiceOffline => Some(9),
            ApiErrorKind::SuspendedApiKey => Some(10),
            ApiErrorKind::InternalError => Some(11),
            ApiErrorKind::ItemUpdated => Some(12),
            ApiErrorKind::ItemDeleted => Some(13),
            ApiErrorKind::AuthenticationDenied => Some(14),
            ApiErrorKind::Failed => Some(15),
            ApiErrorKind::DeviceDenied => Some(16),
            ApiErrorKind::SessionDenied => Some(17),
            ApiErrorKind::ValidationFailed => Some(18),
            ApiErrorKind::InvalidAcceptHeader => Some(19),
            ApiErrorKind::InvalidDateRange => Some(20),
            ApiErrorKind::EntryNotFound => Some(21),
            ApiErrorKind::InvalidPage => Some(22),
            ApiErrorKind::InvalidDate => Some(23),
            ApiErrorKind::BackendTimeout => Some(24),
            ApiErrorKind::RequestLimitExceeded => Some(25),
            ApiErrorKind::CredentialsRequired => Some(26),
            ApiErrorKind::TooManyAppendedResponses => Some(27),
            ApiErrorKind::InvalidTimezone => Some(28),
            ApiErrorKind::ConfirmationRequired => Some(29),
            ApiErrorKind::InvalidLogin => Some(30),
            ApiErrorKind::AccountDisabled => Some(31),
            ApiErrorKind::EmailNotVerified => Some(32),
            ApiErrorKind::InvalidRequestToken => Some(33),
            ApiErrorKind::ResourceNotFound => Some(34),
            ApiErrorKind::InvalidToken => Some(35),
            ApiErrorKind::WritePermissionMissing => Some(36),
            ApiErrorKind::SessionNotFound => Some(37),
            ApiErrorKind::EditPermissionDenied => Some(38),
            ApiErrorKind::PrivateResource => Some(39),
            ApiErrorKind::NothingToUpdate => Some(40),
            ApiErrorKind::RequestTokenNotApproved => Some(41),
            ApiErrorKind::MethodNotSupported => Some(42),
            ApiErrorKind::BackendConnectionFailed => Some(43),
            ApiErrorKind::InvalidIdFormat => Some(44),
            ApiErrorKind::UserSuspended => Some(45),
            ApiErrorKind::UnderMaintenance => Some(46),
            ApiErrorKind::InvalidInput => Some(47),
            ApiErrorKind::InvalidResponse | ApiErrorKind::Unknown => None,
        }
    }

    /// Map a backend `status_code` to its kind; unmapped codes are `Unknown`
    pub fn from_backend_code(code: u16) -> ApiErrorKind {
        ApiErrorKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.backend_code() == Some(code))
            .unwrap_or(ApiErrorKind::Unknown)
    }

    /// Map an HTTP status to a kind; used when no structured error body is available
    pub fn from_http_status(status: u16) -> ApiErrorKind {
        match status {
            201 => ApiErrorKind::ItemUpdated,
            400 => ApiErrorKind::ValidationFailed,
            401 => ApiErrorKind::AuthenticationFailed,
            403 => ApiErrorKind::EditPermissionDenied,
            404 => ApiErrorKind::ResourceNotFound,
            405 => ApiErrorKind::MethodNotSupported,
            406 => ApiErrorKind::InvalidAcceptHeader,
            422 => ApiErrorKind::InvalidParameters,
            429 => ApiErrorKind::RequestLimitExceeded,
            500 => ApiErrorKind::InternalError,
            502 => ApiErrorKind::BackendConnectionFailed,
            503 => ApiErrorKind::ServiceOffline,
            504 => ApiErrorKind::BackendTimeout,
            _ => ApiErrorKind::Unknown,
        }
    }

    /// Conditions that may clear up on their own (outages, throttling, unclassified failures)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiErrorKind::ServiceOffline
                | ApiErrorKind::InternalError
                | ApiErrorKind::Failed
                | ApiErrorKind::BackendTimeout
                | ApiErrorKind::RequestLimitExceeded
                | ApiErrorKind::BackendConnectionFailed
                | ApiErrorKind::UnderMaintenance
                | ApiErrorKind::Unknown
        )
    }

    /// Conditions a retry of the same request will not change (bad page, missing resource, bad key)
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Retrying the same request can never fix a payload that does not decode
    pub fn is_retriable(&self) -> bool {
        !matches!(self, ApiErrorKind::InvalidResponse)
    }
}
