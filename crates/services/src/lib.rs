//! Workflow operations over repositories, change feeds, audit and notifications.
//!
//! Each mutating operation runs the same sequence: authorize, validate, load,
//! apply the domain rule, persist, publish the change, audit the attempt, and
//! hand back exactly one notification for the caller to show.

pub mod context;
pub mod jobs;
pub mod payments;
pub mod resources;

pub use context::{Outcome, ServiceContext};
pub use jobs::JobService;
pub use payments::PaymentService;
pub use resources::ResourceService;
