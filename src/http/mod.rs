//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! caller builds RequestDescriptor (request.rs)
//!     → dedup pipeline decides whether it may go out
//!     → transport.rs executes it (reqwest, or mock.rs in dry runs)
//!     → TransportResponse / TransportError (response.rs, transport.rs)
//!     → back through the dedup pipeline to the caller
//! ```

pub mod mock;
pub mod request;
pub mod response;
pub mod transport;

pub use mock::SimulatedTransport;
pub use request::{RequestDescriptor, X_REQUEST_ID};
pub use response::TransportResponse;
pub use transport::{ReqwestTransport, Transport, TransportError};
