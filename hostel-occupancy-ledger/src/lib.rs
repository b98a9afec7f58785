//! Room occupancy ledger of the hostel portal.
//!
//! Owns the invariant that no room ever has more occupants than its capacity,
//! across direct allocation by a rector and the request/approve room change
//! workflow.

pub mod authority;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod model;
pub mod notify;
pub mod store;
pub mod vacancy;

pub use authority::{Identity, RectorAuthority, Role, StudentAuthority};
pub use error::LedgerError;
pub use ledger::{Ledger, DEFAULT_HISTORY_LIMIT};
pub use store::OccupancyStore;
pub use vacancy::compute_vacancy;
