//! Minimal JSON-RPC 2.0 client for sequence numbers and receipts.

use crate::models::{ObjectId, ProposalId};
use crate::session::{Session, upstream};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// JSON-RPC client bound to the session's node endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    session: Arc<Session>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// A transaction receipt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// Transaction hash.
    pub transaction_hash: String,
    /// Hex block number.
    pub block_number: Option<String>,
    /// `0x1` on success, `0x0` on revert.
    pub status: Option<String>,
    /// Emitted logs.
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

/// One log entry of a receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptLog {
    /// Indexed topics; `topics[0]` is the event signature.
    #[serde(default)]
    pub topics: Vec<String>,
}

impl TxReceipt {
    /// Returns `true` if the transaction succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status
            .as_deref()
            .and_then(|s| parse_quantity(s).ok())
            .is_some_and(|s| s == 1)
    }

    /// Block number as an integer.
    #[must_use]
    pub fn block(&self) -> Option<u64> {
        self.block_number
            .as_deref()
            .and_then(|b| parse_quantity(b).ok())
    }

    /// Finds the proposal id emitted under `topic`.
    ///
    /// The id is the low 16 bytes of the first indexed argument.
    #[must_use]
    pub fn find_proposal_id(&self, topic: &str) -> Option<ProposalId> {
        self.logs
            .iter()
            .filter(|log| {
                log.topics
                    .first()
                    .is_some_and(|t0| t0.eq_ignore_ascii_case(topic))
            })
            .find_map(|log| log.topics.get(1))
            .and_then(|word| ObjectId::from_word_hex(word).ok())
            .map(ProposalId::new)
    }
}

impl RpcClient {
    /// Creates a client.
    #[must_use]
    pub const fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    fn call<T: serde::de::DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .session
            .http()
            .post(&self.session.config().endpoints.rpc_url)
            .json(&body)
            .send();
        let decoded: RpcResponse<T> = crate::session::decode_json(response, method)?;
        if let Some(err) = decoded.error {
            return Err(upstream(method, format!("rpc error {}: {}", err.code, err.message)));
        }
        Ok(decoded.result)
    }

    /// Reads the pending transaction count of `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails after retries or the result is
    /// not a hex quantity.
    pub fn transaction_count(&self, address: &str) -> Result<u64> {
        let raw: String = self
            .session
            .retry()
            .run("eth_getTransactionCount", || {
                self.call::<String>("eth_getTransactionCount", json!([address, "pending"]))
            })?
            .ok_or_else(|| upstream("eth_getTransactionCount", "empty result"))?;
        parse_quantity(&raw)
    }

    /// Fetches a receipt; `None` while the transaction is unmined.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails after retries.
    pub fn receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>> {
        self.session.retry().run("eth_getTransactionReceipt", || {
            self.call::<TxReceipt>("eth_getTransactionReceipt", json!([tx_hash]))
        })
    }

    /// Polls until `tx_hash` is mined.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when the confirmation budget is exhausted
    /// and [`Error::TransactionReverted`] when the receipt reports failure.
    pub fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt> {
        let timing = &self.session.config().timing;
        let budget = Duration::from_millis(timing.confirmation_timeout_ms);
        let poll = Duration::from_millis(timing.confirmation_poll_ms.max(1));
        let start = Instant::now();

        loop {
            if let Some(receipt) = self.receipt(tx_hash)? {
                if !receipt.succeeded() {
                    return Err(Error::TransactionReverted {
                        tx_hash: tx_hash.to_string(),
                    });
                }
                tracing::debug!(
                    tx_hash,
                    block = receipt.block(),
                    waited_ms = crate::duration_to_millis(start.elapsed()),
                    "Transaction confirmed"
                );
                return Ok(receipt);
            }
            if start.elapsed() + poll > budget {
                return Err(Error::Timeout {
                    operation: format!("receipt {tx_hash}"),
                    waited_ms: crate::duration_to_millis(start.elapsed()),
                });
            }
            std::thread::sleep(poll);
        }
    }
}

/// Parses a `0x`-prefixed hex quantity.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the value is not hex.
pub fn parse_quantity(value: &str) -> Result<u64> {
    let digits = value.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::InvalidInput(format!("bad hex quantity '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "0xabc0000000000000000000000000000000000000000000000000000000000def";

    fn receipt(json: &str) -> TxReceipt {
        serde_json::from_str(json).expect("receipt")
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").expect("zero"), 0);
        assert_eq!(parse_quantity("0x1a").expect("hex"), 26);
        assert_eq!(parse_quantity("0x").expect("empty"), 0);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_receipt_status() {
        let ok = receipt(r#"{"transactionHash":"0x1","blockNumber":"0x10","status":"0x1"}"#);
        assert!(ok.succeeded());
        assert_eq!(ok.block(), Some(16));

        let reverted = receipt(r#"{"transactionHash":"0x2","status":"0x0","logs":[]}"#);
        assert!(!reverted.succeeded());
    }

    #[test]
    fn test_find_proposal_id_matches_topic() {
        let json = format!(
            r#"{{"transactionHash":"0x1","status":"0x1","logs":[
                {{"topics":["0xffff"]}},
                {{"topics":["{TOPIC}","0x000000000000000000000000000000005e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b"]}}
            ]}}"#
        );
        let found = receipt(&json).find_proposal_id(TOPIC).expect("proposal id");
        assert_eq!(found.to_string(), "5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b");
        assert!(receipt(&json).find_proposal_id("0x1234").is_none());
    }
}
