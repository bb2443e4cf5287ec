//! Solana JSON-RPC balance source.

use crate::{FetchError, FetchResult, TokenAccount, TokenBalanceSource};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// SPL token program id.
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Public mainnet endpoint.
pub const MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
/// Public devnet endpoint.
pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";

/// JSON-RPC error code some providers use for throttling.
const RPC_RATE_LIMIT_CODE: i64 = 429;
/// JSON-RPC "invalid params".
const RPC_INVALID_PARAMS_CODE: i64 = -32602;

/// Check that `address` is a base58-encoded 32-byte public key.
pub fn validate_address(address: &str) -> FetchResult<()> {
    match bs58::decode(address).into_vec() {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        Ok(bytes) => Err(FetchError::InvalidAddress(format!(
            "{} decodes to {} bytes",
            address,
            bytes.len()
        ))),
        Err(e) => Err(FetchError::InvalidAddress(format!("{}: {}", address, e))),
    }
}

/// Balance source backed by a Solana JSON-RPC endpoint.
pub struct SolanaRpcClient {
    client: Client,
    url: String,
    request_id: AtomicU64,
}

impl SolanaRpcClient {
    /// Create a client for the given endpoint.
    pub fn new(url: impl Into<String>) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Other(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a JSON-RPC request and return the raw response body.
    async fn call(&self, method: &str, params: Value) -> FetchResult<Vec<u8>> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::ConnectionFailure(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::ConnectionFailure(format!(
                "HTTP {}: {}",
                status, text
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Decode a JSON-RPC response body into its `result` field.
///
/// `malformed` builds the error for a body that is not JSON.
fn decode_rpc_result<F>(body: &[u8], malformed: F) -> FetchResult<Value>
where
    F: FnOnce(String) -> FetchError,
{
    let mut json: Value = serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;
    if let Some(error) = json.get("error") {
        return Err(classify_rpc_error(error));
    }
    Ok(json["result"].take())
}

/// Map a JSON-RPC error object to a [`FetchError`].
fn classify_rpc_error(error: &Value) -> FetchError {
    let code = error["code"].as_i64().unwrap_or_default();
    let message = error["message"].as_str().unwrap_or("unknown error");
    let lower = message.to_lowercase();

    if code == RPC_RATE_LIMIT_CODE
        || lower.contains("rate limit")
        || lower.contains("too many requests")
    {
        FetchError::RateLimited
    } else if code == RPC_INVALID_PARAMS_CODE {
        FetchError::InvalidAddress(message.to_string())
    } else {
        FetchError::Other(format!("{} (code {})", message, code))
    }
}

/// Parse the `value` array of a `getTokenAccountsByOwner` jsonParsed result.
///
/// Accounts that cannot be decoded are skipped; a missing `value` array
/// makes the whole response malformed.
fn parse_token_accounts(address: &str, result: &Value) -> FetchResult<Vec<TokenAccount>> {
    let accounts = result["value"]
        .as_array()
        .ok_or_else(|| FetchError::MalformedResponse {
            address: address.to_string(),
            reason: "missing value array".to_string(),
        })?;

    let mut parsed = Vec::with_capacity(accounts.len());
    for account in accounts {
        let info = &account["account"]["data"]["parsed"]["info"];
        let mint = info["mint"].as_str();
        let amount = info["tokenAmount"]["amount"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok());
        let decimals = info["tokenAmount"]["decimals"]
            .as_u64()
            .and_then(|d| u8::try_from(d).ok());

        match (mint, amount, decimals) {
            (Some(mint), Some(amount), Some(decimals)) => {
                parsed.push(TokenAccount::new(mint, amount, decimals));
            }
            _ => {
                debug!(
                    wallet = address,
                    pubkey = account["pubkey"].as_str().unwrap_or("?"),
                    "Skipping undecodable token account"
                );
            }
        }
    }

    Ok(parsed)
}

#[async_trait]
impl TokenBalanceSource for SolanaRpcClient {
    async fn fetch_token_balances(&self, address: &str) -> FetchResult<Vec<TokenAccount>> {
        let params = json!([
            address,
            { "programId": TOKEN_PROGRAM_ID },
            { "encoding": "jsonParsed" }
        ]);
        let body = self.call("getTokenAccountsByOwner", params).await?;
        let result = decode_rpc_result(&body, |reason| FetchError::MalformedResponse {
            address: address.to_string(),
            reason,
        })?;
        parse_token_accounts(address, &result)
    }

    async fn healthcheck(&self) -> FetchResult<u64> {
        let body = self.call("getSlot", json!([])).await?;
        let result = decode_rpc_result(&body, |reason| {
            FetchError::ConnectionFailure(format!("invalid getSlot response: {}", reason))
        })?;
        result
            .as_u64()
            .ok_or_else(|| FetchError::ConnectionFailure("getSlot returned no slot".to_string()))
    }

    fn name(&self) -> &str {
        "solana-rpc"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK").is_ok());
        assert!(validate_address(TOKEN_PROGRAM_ID).is_ok());
        assert!(matches!(
            validate_address("invalid-address"),
            Err(FetchError::InvalidAddress(_))
        ));
        assert!(validate_address("abc").is_err());
    }

    #[test]
    fn test_classify_rpc_error() {
        let rate = json!({"code": 429, "message": "Too many requests for a specific RPC call"});
        assert!(matches!(classify_rpc_error(&rate), FetchError::RateLimited));

        let rate_msg = json!({"code": -32005, "message": "Rate limit exceeded"});
        assert!(matches!(classify_rpc_error(&rate_msg), FetchError::RateLimited));

        let params = json!({"code": -32602, "message": "Invalid param: WrongSize"});
        assert!(matches!(classify_rpc_error(&params), FetchError::InvalidAddress(_)));

        let other = json!({"code": -32000, "message": "Node is unhealthy"});
        assert!(matches!(classify_rpc_error(&other), FetchError::Other(_)));
    }

    #[test]
    fn test_decode_rpc_result() {
        let malformed = |reason: String| FetchError::MalformedResponse {
            address: "W1".to_string(),
            reason,
        };

        let ok = br#"{"jsonrpc":"2.0","id":1,"result":{"value":[]}}"#;
        assert_eq!(decode_rpc_result(ok, malformed).unwrap(), json!({"value": []}));

        let rpc_error = br#"{"jsonrpc":"2.0","id":1,"error":{"code":429,"message":"slow down"}}"#;
        assert!(matches!(
            decode_rpc_result(rpc_error, malformed),
            Err(FetchError::RateLimited)
        ));
    }

    #[test]
    fn test_non_json_body_only_drops_the_wallet() {
        let err = decode_rpc_result(b"<html>502 Bad Gateway</html>", |reason| {
            FetchError::MalformedResponse {
                address: "W1".to_string(),
                reason,
            }
        })
        .unwrap_err();

        assert!(err.is_wallet_local());
        assert!(matches!(err, FetchError::MalformedResponse { ref address, .. } if address == "W1"));
    }

    #[test]
    fn test_parse_token_accounts_skips_bad_entries() {
        let result = json!({
            "context": {"slot": 1},
            "value": [
                {
                    "pubkey": "acc1",
                    "account": {"data": {"parsed": {"info": {
                        "mint": "So11111111111111111111111111111111111111112",
                        "tokenAmount": {"amount": "1000000000", "decimals": 9}
                    }}}}
                },
                {
                    "pubkey": "acc2",
                    "account": {"data": ["base64data", "base64"]}
                },
                {
                    "pubkey": "acc3",
                    "account": {"data": {"parsed": {"info": {
                        "mint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                        "tokenAmount": {"amount": "0", "decimals": 6}
                    }}}}
                }
            ]
        });

        let accounts = parse_token_accounts("W1", &result).unwrap();
        assert_eq!(
            accounts,
            vec![
                TokenAccount::new("So11111111111111111111111111111111111111112", 1_000_000_000, 9),
                TokenAccount::new("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 0, 6),
            ]
        );
    }

    #[test]
    fn test_parse_token_accounts_requires_value() {
        let err = parse_token_accounts("W1", &json!({"context": {}})).unwrap_err();
        assert!(err.is_wallet_local());
    }
}
