//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cleanup: drops metadata and index records left behind by expired entries

mod cleanup;

pub use cleanup::spawn_cleanup_task;
