//! Common types shared by the bookstore token crates

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
