pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use frameworks::config::HTTP_PORT;
pub use frameworks::server::{app, run_with_config};
