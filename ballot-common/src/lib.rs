#![cfg(not(doctest))]

#[macro_use]
extern crate diesel;

pub mod cache;
pub mod db;
pub mod email;
pub mod gateway;
pub mod models;
pub mod otp;
pub mod request_io;
pub mod schema;
pub mod session;
pub mod threadrand;
pub mod validators;
