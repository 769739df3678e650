//! Message and address types carried by the transport

mod address;
mod message;

pub use address::{Address, AddressError};
pub use message::{Expiry, Message};
