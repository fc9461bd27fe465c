//! CLI commands module.

mod call;
mod config;
mod services;
mod synthesize;
mod util;

pub use call::CallCommand;
pub use config::ConfigCommand;
pub use services::ServicesCommand;
pub use synthesize::SynthesizeCommand;

pub(crate) use util::*;
