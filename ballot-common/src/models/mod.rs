pub mod admin;
pub mod candidate;
pub mod otp;
pub mod payment;
pub mod position;
pub mod session;
pub mod vote;
