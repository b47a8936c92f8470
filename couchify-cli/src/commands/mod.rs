//! CLI command implementations.

pub mod bundle;
pub mod deploy;

pub use bundle::{bundle, load_config, print_document};
pub use deploy::deploy;
