pub mod guard;
pub mod identity;
pub mod resolver;

pub use guard::authorize;
pub use identity::{CallerIdentity, Role, TenantId, TenantScope};
pub use resolver::resolve;
