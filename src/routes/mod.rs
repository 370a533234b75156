pub mod chat;
pub mod customers;
pub mod kitchen;
pub mod payments;
pub mod realtime;
pub mod staff;
pub mod tables;
