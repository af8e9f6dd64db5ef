pub mod job;
pub mod payment;
pub mod resource;
