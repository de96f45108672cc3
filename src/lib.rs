pub mod errors;
pub mod logging;
pub mod preview;
pub mod preview_config;
