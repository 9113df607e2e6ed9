// Build-time package identity from Cargo.toml, served by GET / and GET /version

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// One-line description, shown by GET /.
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
