//! Session Module
//!
//! The console side of the client: a line reader and reply writer wrapped
//! around a [`Dispatcher`](crate::commands::Dispatcher). It works over any
//! `AsyncRead`/`AsyncWrite` pair, so the binary uses stdin/stdout and the
//! tests use in-memory buffers.
//!
//! ## Example
//!
//! ```ignore
//! use sqlcmd::backend::MemoryBackend;
//! use sqlcmd::commands::Dispatcher;
//! use sqlcmd::manager::DatabaseManager;
//! use sqlcmd::session::Session;
//!
//! let dispatcher = Dispatcher::new(DatabaseManager::new(MemoryBackend::new()));
//! let mut session = Session::new(tokio::io::stdin(), tokio::io::stdout(), dispatcher);
//! session.run().await?;
//! ```

pub mod handler;

pub use handler::{Session, SessionError, SessionStats, MAX_LINE_SIZE};
