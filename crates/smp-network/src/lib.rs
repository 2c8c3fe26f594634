//! SMP Network - integrations with the network-wide services
//!
//! A registry server announces its participants to two independent services:
//!
//! - **Locator service (SML)**: maps a participant identifier to the server
//!   answering for it, see [`LocatorClient`]
//! - **Directory**: searchable catalog of participant business data, see
//!   [`DirectoryClient`]
//!
//! Neither service offers transactions. Coordinating them is up to the
//! server; this crate only defines the clients and in-memory versions of
//! both for tests and development setups.

pub mod directory;
pub mod error;
pub mod locator;
pub mod mock;
pub mod services;

pub use directory::DirectoryClient;
pub use error::{DirectoryError, DirectoryResult, LocatorError, LocatorResult};
pub use locator::LocatorClient;
pub use mock::{MockDirectory, MockLocator};
pub use services::NetworkServices;
