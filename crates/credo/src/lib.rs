// credo — main library crate
//
// Wires together crypto, the token manager, rate limiting, idempotency,
// oracles, the provisioning resilience layer, and the registration/login
// orchestrators.

pub mod audit;
pub mod context;
pub mod crypto;
pub mod idempotency;
pub mod login;
pub mod oracles;
pub mod provisioning;
pub mod rate_limit;
pub mod register;
pub mod reserved;
pub mod tokens;
pub mod verification;

pub use context::{AuthContext, AuthContextBuilder, RequestContext};
pub use login::{handle_login, handle_refresh, LoginRequest, LoginResponse};
pub use register::{handle_register, RegistrationRequest, RegistrationResponse};
pub use tokens::{KeyClass, TokenManager};
pub use verification::verify_email;
