use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

use crate::core::state::NetworkSettings;

pub const APP_USER_AGENT: &str = concat!("InterfaceOficial/", env!("CARGO_PKG_VERSION"));

/// Shared client for every reqwest-based request. Bodies are fetched with
/// `identity` encoding so that declared hashes and sizes match the bytes on disk.
pub fn build_http_client(network: &NetworkSettings) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
        .read_timeout(Duration::from_secs(network.io_timeout_secs))
        .build()
}
