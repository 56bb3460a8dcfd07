//! User-Agent string sent with every exchange request.
//!
//! Sites often log the agent next to each exchange step, so it names the
//! tool and its version.

/// Product token; also the prefix the version is parsed from in tests.
const PRODUCT: &str = "cml-exchange";

/// Default User-Agent for exchange requests.
#[must_use]
pub(crate) fn default_exchange_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{PRODUCT}/{version} (commerceml-exchange)")
}
