//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `serve`   | `Serve`          |
//! | `detect`  | `Detect`         |
//! | `id`      | `Id`             |
//! | `stop`    | `Stop`           |

pub mod detect;
pub mod id;
pub mod serve;
pub mod stop;

pub use detect::cmd_detect;
pub use id::cmd_id;
pub use serve::{ServeArgs, cmd_serve};
pub use stop::cmd_stop;
