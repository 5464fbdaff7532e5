//! invox: client-side invoice synchronization and upload-orchestration core.
//!
//! A single-consumer event mailbox (actor) owns a paginated, optimistically
//! mutated in-memory view of invoice records, drives a staged file-upload
//! pipeline, and reconciles local state against a remote backend. The UI
//! layer talks to it exclusively through [`CoreHandle`]: intents in, a
//! durable state stream and a transient notification stream out.

pub mod actor;
pub mod config;
pub mod detail;
pub mod error;
pub mod events;
pub mod gateway;
pub mod mutation;
pub mod store;
pub mod types;
pub mod upload;

pub use actor::{spawn_core, CoreHandle};
pub use error::{CoreError, GatewayError};
pub use events::{CoreState, Notification};
pub use gateway::http::HttpInvoiceGateway;
pub use gateway::InvoiceGateway;
pub use types::{
    Filters, InvoiceRecord, InvoiceStatus, SessionContext, UploadMetadata, UploadStage,
};
