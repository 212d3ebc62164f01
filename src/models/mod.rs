pub mod driver;
pub mod payment;
pub mod rating;
pub mod rider;
pub mod tracking;
pub mod trip;
pub mod vehicle;
