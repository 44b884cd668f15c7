//! Intent → backend call → raw payload.

pub mod registry;
pub mod router;

pub use registry::{normalize_booking_status, BackendCall, Operation, ParamKind, ParamSpec, Registry};
pub use router::{DispatchRouter, Dispatched, Route};
