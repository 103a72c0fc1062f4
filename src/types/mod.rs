mod client;
mod version;

pub use client::{ClientSpec, Mapping, client_namespace, rebase_client_path};
pub use version::Version;
