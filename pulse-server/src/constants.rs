/// Name of the header carrying the request token.
pub const TOKEN_HEADER: &str = "token";

/// Value of the `Server` response header.
pub const SERVER: &str = "Pulse";

/// Value of the `User-Agent` header on requests to the discovery registry.
pub const USER_AGENT: &str = concat!("pulse/", env!("CARGO_PKG_VERSION"));
