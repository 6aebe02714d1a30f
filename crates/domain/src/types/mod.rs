//! Transport-level data types
//!
//! Everything the orchestration layer passes between its components:
//! request descriptors going in, attempt outcomes coming out, and the page
//! and bulk shapes built from them.

pub mod bulk;
pub mod credential;
pub mod outcome;
pub mod page;
pub mod request;

pub use bulk::{BulkItemResult, BulkStatusLine, WriteAck};
pub use credential::{Credential, TokenResponse};
pub use outcome::AttemptOutcome;
pub use page::{Embedded, Link, PageCursor, PageEnvelope, PaginatedResult};
pub use request::{HttpMethod, MultipartPart, RequestBody, RequestDescriptor};
