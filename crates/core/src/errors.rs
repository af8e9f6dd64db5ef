use thiserror::Error;

use crate::domain::job::JobStatus;
use crate::domain::payment::PaymentStatus;
use crate::identity::{Capability, Role};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid payment transition from {from} to {to}")]
    InvalidPaymentTransition { from: PaymentStatus, to: PaymentStatus },
    #[error("invalid job transition from {from} to {to}")]
    InvalidJobTransition { from: JobStatus, to: JobStatus },
    #[error("{0}")]
    Validation(String),
    #[error("role `{role}` is not permitted to {capability}")]
    Unauthorized { role: Role, capability: Capability },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Domain(DomainError::Validation(_)))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Domain(DomainError::Unauthorized { .. }))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You do not have permission to perform this action.",
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::Conflict { .. } => {
                "This record was changed by someone else. Refresh and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Unauthorized { role, capability }) => {
                Self::Forbidden {
                    message: format!("role `{role}` is not permitted to {capability}"),
                    correlation_id,
                }
            }
            ApplicationError::Domain(DomainError::Validation(message)) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::Domain(error @ DomainError::InvalidPaymentTransition { .. })
            | ApplicationError::Domain(error @ DomainError::InvalidJobTransition { .. })
            | ApplicationError::Domain(error @ DomainError::InvariantViolation(_)) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::NotFound(what) => {
                Self::NotFound { message: format!("{what} not found"), correlation_id }
            }
            ApplicationError::Conflict(message) => Self::Conflict { message, correlation_id },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::payment::PaymentStatus;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::identity::{Capability, Role};

    #[test]
    fn validation_error_maps_to_bad_request_with_its_message() {
        let interface = ApplicationError::from(DomainError::Validation(
            "Please provide a reason for rejection".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, ref message }
                if correlation_id == "req-1" && message == "Please provide a reason for rejection"
        ));
    }

    #[test]
    fn unauthorized_error_maps_to_forbidden() {
        let interface = ApplicationError::from(DomainError::Unauthorized {
            role: Role::Checker,
            capability: Capability::ReviewPayment,
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Forbidden { .. }));
        assert_eq!(interface.user_message(), "You do not have permission to perform this action.");
    }

    #[test]
    fn terminal_transition_maps_to_bad_request() {
        let interface = ApplicationError::from(DomainError::InvalidPaymentTransition {
            from: PaymentStatus::Completed,
            to: PaymentStatus::Completed,
        })
        .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert_eq!(interface.message(), "invalid payment transition from completed to completed");
    }

    #[test]
    fn conflict_maps_to_conflict() {
        let interface = ApplicationError::Conflict("payment PAY-1 changed".to_owned())
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Conflict { .. }));
        assert_eq!(interface.correlation_id(), "req-4");
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }
}
