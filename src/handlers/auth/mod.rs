// handlers/auth/mod.rs - Authenticated helper endpoints

pub mod whoami; // GET /api/v1/auth/whoami

pub use whoami::whoami_get;
