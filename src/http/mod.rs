//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (one worker task)
//!     → request.rs (request line, headers, GET-only)
//!     → uri.rs (http://host[:port]/path)
//!     → server.rs (cache lookup)
//!         hit  → cached bytes to client
//!         miss → upstream::Forwarder with outbound.rs request
//!     → response.rs (status reply only when the request failed early)
//!     → close
//! ```

pub mod error;
pub mod outbound;
pub mod request;
pub mod response;
pub mod server;
pub mod uri;

pub use error::{HttpError, ProxyError};
pub use outbound::build_forward_request;
pub use request::{parse_request_line, read_headers, read_request, Header, InFlightRequest, RequestLine};
pub use server::{Outcome, ProxyServer, ProxyState};
pub use uri::{parse_absolute_uri, AbsoluteUri};
