#![forbid(unsafe_code)]
//! Security service layer over a slot-addressed secure element: key management,
//! crypto, secure storage and authentication.

pub mod adapters;
pub mod buffer;
pub mod cbor;
pub mod crypto;
pub mod dispatcher;
pub mod error;
pub mod hal;
pub mod hash;
pub mod key_path;
pub mod link;
pub mod security_service;
pub mod soft_se;
pub mod translate;
pub mod types;

pub use adapters::*;
pub use buffer::*;
pub use cbor::*;
pub use dispatcher::*;
pub use error::*;
pub use hal::*;
pub use key_path::*;
pub use link::*;
pub use security_service::*;
pub use soft_se::*;
pub use translate::*;
pub use types::*;
