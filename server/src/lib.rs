#![warn(rust_2018_idioms)]

pub mod server;
pub mod session;
pub mod settings;

pub use server::{bind, run, Bound, Stats};
