//! ORM session re-exports.
//!
//! `tinyorm::Session` is the unit of work: identity map, change tracking, flush
//! ordering and relationship loading. The implementation lives in the separate
//! `tinyorm-session` crate; this module lets programs use it without depending
//! on the sub-crate directly.

pub use tinyorm_session::{
    Handle, ObjectKey, ObjectState, Session, SessionConfig, SessionDebugInfo, SessionQuery,
};
