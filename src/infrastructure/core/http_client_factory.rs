use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use std::time::Duration;

/// Builds the single HTTP client shared by the exchange and LLM adapters:
/// pooled connections, bounded timeouts, and transient-error retry with
/// exponential backoff (grounded on the teacher's `core::http_client_factory`).
pub struct HttpClientFactory;

impl HttpClientFactory {
    pub fn create_client() -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client configuration is valid");

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}

/// Percent-encodes a query value per RFC 3986, used when signing requests
/// since `reqwest-middleware` does not expose a `.query()` builder.
pub fn urlencoding_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Builds a `base?k=v&k2=v2` URL from ordered pairs, percent-encoding values.
pub fn build_url_with_query(base: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding_encode(v)))
        .collect();
    format!("{}?{}", base, query.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_reserved_characters() {
        assert_eq!(urlencoding_encode("BTC-PERP/USD"), "BTC-PERP%2FUSD");
    }

    #[test]
    fn builds_query_string_in_order() {
        let url = build_url_with_query(
            "https://api.example.com/order",
            &[("symbol", "BTC-PERP".to_string()), ("side", "BUY".to_string())],
        );
        assert_eq!(url, "https://api.example.com/order?symbol=BTC-PERP&side=BUY");
    }
}
