//! Commit preview orchestration.
//!
//! ## Overview
//!
//! Given `(owner, repo, commit)`, the preview subsystem clones the commit into
//! an isolated workspace, works out what kind of JavaScript web app it holds,
//! writes a container build recipe if the repository has none, builds and
//! starts a container, and reports the resulting URL. Clients poll a status
//! endpoint while the build runs in the background.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │  (poll)  │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │                                        │
//!                       │         │ PreviewPipeline::submit()              │
//!                       │         v                                        │
//!                       │  pipeline.rs  (one task per request)             │
//!                       │    ├─ source.rs    clone / checkout (git)        │
//!                       │    ├─ detector.rs  manifest → ProjectType        │
//!                       │    ├─ recipe.rs    Dockerfile synthesis          │
//!                       │    └─ runtime.rs   build / run / port (docker)   │
//!                       │         │                                        │
//!                       │         │ update_if_current(ticket, ..)          │
//!                       │         v                                        │
//!                       │  registry.rs  (in-memory sessions)               │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module      | Responsibility                                          |
//! |-------------|---------------------------------------------------------|
//! | `models`    | `PreviewId`, `PreviewStatus`, `PreviewSession`, updates |
//! | `workspace` | Per-id directories under the workspace root, id locks   |

pub mod api;
pub mod detector;
pub mod models;
pub mod pipeline;
pub mod recipe;
pub mod registry;
pub mod runtime;
pub mod server;
pub mod source;
pub mod workspace;

pub use models::{PreviewId, PreviewRequest, PreviewSession, PreviewStatus, ProjectType};
pub use pipeline::PreviewPipeline;
pub use registry::PreviewRegistry;
