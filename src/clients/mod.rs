//! Outbound HTTP collaborators. Every client carries a finite request timeout.

pub mod identity;
pub mod razorpay;
pub mod relay;
