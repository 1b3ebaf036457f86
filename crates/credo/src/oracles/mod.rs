// External boolean oracles consulted during registration: MX lookup on the
// email domain, breached-password screening, and CAPTCHA verification.
// Each is feature-flagged and fails open on outage, so an oracle being
// down never blocks registration.

mod breach;
mod captcha;
mod mx;

pub use breach::{BreachOracle, HibpBreachOracle, OracleError, StaticBreachOracle};
pub use captcha::{CaptchaOracle, RecaptchaOracle, StaticCaptchaOracle};
pub use mx::{DnsMxOracle, MxOracle, StaticMxOracle};
