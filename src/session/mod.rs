//! Client API sessions.
//!
//! This module provides:
//! - `ClientApi`: the seam to the vendor client library
//! - `ClientHost`: the process-scoped owner of the client context
//! - `Session`: one exclusively-owned, title-scoped connection
//! - `MockClient`: a scriptable client for tests
//! - `SnapshotClient`: a client backed by a library snapshot file

pub mod client;
pub mod host;
pub mod mock;
pub mod snapshot;

pub use client::{ClientApi, ClientHandle, SessionError, UnlockError};
pub use host::{ClientHost, DEFAULT_INIT_TIMEOUT, Session};
pub use mock::{MockCall, MockClient, TitleScript};
pub use snapshot::{LibrarySnapshot, SnapshotAchievement, SnapshotClient, SnapshotGame};
