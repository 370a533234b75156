pub mod audit_logs;
pub mod feedback;
pub mod menu;
pub mod orders;
pub mod payments;
pub mod users;
