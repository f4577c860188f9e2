//! Session persistence and turn processing.
//!
//! `repository` defines the `SessionStore` port, `memory_store` is the
//! process-local backend, `box_store` erases the backend type for runtime
//! selection, and `service` orchestrates one exchange with the model.

pub mod box_store;
pub mod locks;
pub mod memory_store;
pub mod prompt;
pub mod repository;
pub mod service;
