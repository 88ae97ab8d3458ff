//! Error types for the scheduling engine.
//!
//! Every expected, recoverable condition is reported as [`Error::Rejected`]
//! carrying an [`ErrorCode`]. Store and serialization failures are kept
//! apart from that taxonomy so callers can tell a refused request from a
//! broken backend.

use std::fmt;

use sea_orm::DbErr;
use thiserror::Error;

/// Broad category of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced session, template or mentor does not exist.
    NotFound,
    /// The acting mentor does not own the resource.
    OwnershipViolation,
    /// The operation is not legal for the session's current status.
    InvalidStateTransition,
    /// The candidate interval overlaps an active session of the same mentor.
    Conflict,
    /// Reschedule window, disallowed rescheduling, or input validation.
    PolicyViolation,
    /// Unknown recurrence pattern string.
    UnsupportedPattern,
}

/// Specific reason a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    TrialSessionNotFound,
    MentorNotFound,
    AvailabilityTemplateNotFound,
    UnauthorizedAccess,
    SessionNotAvailable,
    InvalidSessionStatus,
    CannotDeleteBookedSession,
    TimeSlotConflict,
    ReschedulingNotAllowed,
    ReschedulingTooLate,
    InvalidRequest,
    TooManyCandidates,
    InvalidRecurringPattern,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrialSessionNotFound => "TRIAL_SESSION_NOT_FOUND",
            Self::MentorNotFound => "MENTOR_NOT_FOUND",
            Self::AvailabilityTemplateNotFound => "AVAILABILITY_TEMPLATE_NOT_FOUND",
            Self::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            Self::SessionNotAvailable => "SESSION_NOT_AVAILABLE",
            Self::InvalidSessionStatus => "INVALID_SESSION_STATUS",
            Self::CannotDeleteBookedSession => "CANNOT_DELETE_BOOKED_SESSION",
            Self::TimeSlotConflict => "TIME_SLOT_CONFLICT",
            Self::ReschedulingNotAllowed => "RESCHEDULING_NOT_ALLOWED",
            Self::ReschedulingTooLate => "RESCHEDULING_TOO_LATE",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::TooManyCandidates => "TOO_MANY_CANDIDATES",
            Self::InvalidRecurringPattern => "INVALID_RECURRING_PATTERN",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TrialSessionNotFound
            | Self::MentorNotFound
            | Self::AvailabilityTemplateNotFound => ErrorKind::NotFound,
            Self::UnauthorizedAccess => ErrorKind::OwnershipViolation,
            Self::SessionNotAvailable
            | Self::InvalidSessionStatus
            | Self::CannotDeleteBookedSession => ErrorKind::InvalidStateTransition,
            Self::TimeSlotConflict => ErrorKind::Conflict,
            Self::ReschedulingNotAllowed
            | Self::ReschedulingTooLate
            | Self::InvalidRequest
            | Self::TooManyCandidates => ErrorKind::PolicyViolation,
            Self::InvalidRecurringPattern => ErrorKind::UnsupportedPattern,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by every scheduling operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{code}: {detail}")]
    Rejected { code: ErrorCode, detail: String },
    #[error("backend error: {0}")]
    Backend(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl Error {
    pub fn rejected(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            detail: detail.into(),
        }
    }

    /// The rejection code, or `None` for infrastructure failures.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.code().map(|code| code.kind())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn backend(err: DbErr) -> Error {
    Error::Backend(err.to_string())
}

pub(crate) fn session_not_found(id: i64) -> Error {
    Error::rejected(
        ErrorCode::TrialSessionNotFound,
        format!("Session with ID {id} does not exist"),
    )
}

pub(crate) fn invalid_request(detail: impl Into<String>) -> Error {
    Error::rejected(ErrorCode::InvalidRequest, detail)
}
