pub mod accounts;
pub mod dispatch;
pub mod fare;
pub mod payments;
pub mod queue;
pub mod ratings;
pub mod registry;
pub mod rides;
pub mod tracking;
