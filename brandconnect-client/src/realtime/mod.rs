//! Live table mirrors

pub mod collection;
pub mod records;
pub mod synchronizer;
pub mod types;

pub use collection::SyncedCollection;
pub use records::{Booking, Message, Notification};
pub use synchronizer::RealtimeSynchronizer;
pub use types::{
    row_id, ConnectionStatus, ErrorHook, Record, RecordHook, SyncDeps, SyncHooks, SyncOptions,
    SyncSnapshot,
};
