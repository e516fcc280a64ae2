//! Daemon module — long-running process serving queries over a Unix socket.
//!
//! The daemon holds one `KnowledgeBase` (and so one warm query cache) for
//! every client. Without it, each CLI invocation opens the store and starts
//! with a cold cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           cartograph daemon             │
//! │  - KnowledgeBase + query cache          │
//! │  - Unix socket server                   │
//! └─────────────────────────────────────────┘
//!           ▲
//!           │ .cartograph/cartograph.sock
//!           ▼
//! ┌─────────────────────────────────────────┐
//! │           cartograph CLI                │
//! │  - connects to daemon                   │
//! │  - sends JSON requests                  │
//! │  - receives JSON responses              │
//! └─────────────────────────────────────────┘
//! ```

pub mod protocol;
pub mod server;

pub use protocol::{Request, Response};
pub use server::{is_daemon_running, process_request, send_request, socket_path, start_daemon};
