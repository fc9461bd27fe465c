//! Shared utilities for Watson command line tools.
//!
//! Context-based YAML configuration, request file loading and output helpers.

pub mod config;
pub mod output;
pub mod request;

pub use config::{Config, Context, load_config, mask_api_key};
pub use output::{Output, OutputFormat, guess_extension, print_verbose};
pub use request::{RequestError, RequestFile, load_request, parse_key_value};
