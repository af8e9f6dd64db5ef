pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod forms;
pub mod fraud;
pub mod identity;
pub mod live;
pub mod notify;
pub mod payments;
pub mod session;

pub use domain::job::{Job, JobId, JobPatch, JobStatus};
pub use domain::payment::{CostBreakdown, PaymentRequest, PaymentRequestId, PaymentStatus};
pub use domain::resource::{Resource, ResourceId, ResourceStatus, ResourceType};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use forms::{JobForm, PaymentRequestForm, VehicleAssignmentForm};
pub use fraud::{FraudAssessment, FraudDetector, FraudThresholds};
pub use identity::{Account, AccountDirectory, Actor, ActorId, Capability, Role};
pub use live::{ChangeEvent, PaymentBoard, PaymentStatusCounts};
pub use notify::{Notification, NotificationKind, Notifier};
pub use payments::{PaymentSubmission, PaymentWorkflow};
pub use session::{Session, SessionError, SessionManager};
