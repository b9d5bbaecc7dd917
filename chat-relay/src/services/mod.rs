pub mod metrics;
pub mod upstream;

pub use upstream::{ForwardRequest, UpstreamClient};
