//! Core traits for the listsync engine
//!
//! This module defines the interfaces to the engine's external collaborators.
//!
//! - [`DocumentStore`]: Source registries, result collections, metadata, settings
//! - [`Cache`]: Downstream cache, flushed after a list is replaced
//! - [`Scheduler`]: Named recurring jobs
//! - [`Transport`]: Remote fetch of source content

pub mod cache;
pub mod document_store;
pub mod scheduler;
pub mod transport;

pub use cache::{Cache, CacheFactory};
pub use document_store::{
    Document, DocumentStore, DocumentStoreFactory, DuplicateGroup, Filter, ID_FIELD,
};
pub use scheduler::{Job, JobFuture, Scheduler};
pub use transport::{Transport, TransportFactory};
