//! HTTP write gateway.
//!
//! The gateway encodes ops and signs transactions on the operator's behalf;
//! this client supplies the sequence number, submits, and then confirms each
//! transaction on the node RPC itself.
//!
//! | Call | Request |
//! |------|---------|
//! | publish | `POST {gateway}/spaces/{space}/edits` |
//! | propose | `POST {gateway}/spaces/{space}/proposals` |
//! | vote | `POST {gateway}/proposals/{id}/votes` |
//! | execute | `POST {gateway}/proposals/{id}/execute` |
//! | status | `GET {gateway}/proposals/{id}` |

use super::rpc::RpcClient;
use super::writer::{ChainWriter, Confirmation};
use crate::models::{
    AuthorIdentity, ObjectId, ProposalId, ProposalStatus, SpaceId, VoteOption, VotingMode,
};
use crate::session::{Session, decode_json, upstream};
use crate::sweep::Op;
use crate::{Error, Result};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Instant;

/// Header carrying the HMAC-SHA256 signature of the request body.
pub const SIGNATURE_HEADER: &str = "X-Spacesweep-Signature";

/// [`ChainWriter`] backed by the HTTP write gateway and node RPC.
#[derive(Debug, Clone)]
pub struct GatewayWriter {
    session: Arc<Session>,
    rpc: RpcClient,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishRequest<'a> {
    from: &'a str,
    nonce: u64,
    author: ObjectId,
    name: &'a str,
    ops: &'a [Op],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProposeRequest<'a> {
    from: &'a str,
    nonce: u64,
    author: ObjectId,
    voting_mode: VotingMode,
    ops: &'a [Op],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoteRequest<'a> {
    from: &'a str,
    nonce: u64,
    voter_space_id: SpaceId,
    option: VoteOption,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    from: &'a str,
    nonce: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    tx_hash: String,
    #[serde(default)]
    proposal_id: Option<String>,
}

impl GatewayWriter {
    /// Creates a writer for the session's gateway and RPC endpoints.
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        let rpc = RpcClient::new(Arc::clone(&session));
        Self { session, rpc }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.session.config().endpoints.gateway_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn operator(&self) -> Result<&str> {
        self.session.config().require_operator_address()
    }

    /// Adds bearer and HMAC headers when configured.
    fn authorize(
        &self,
        mut request: reqwest::blocking::RequestBuilder,
        body: &str,
    ) -> Result<reqwest::blocking::RequestBuilder> {
        let endpoints = &self.session.config().endpoints;
        if let Some(token) = &endpoints.gateway_token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(secret) = &endpoints.gateway_hmac_secret {
            let signature = compute_body_signature(secret.expose_secret(), body)?;
            request = request.header(SIGNATURE_HEADER, signature);
        }
        Ok(request)
    }

    /// Submits one write under the signer lock and waits for its receipt.
    fn submit<B, F>(&self, operation: &str, path: &str, from: &str, build: F) -> Result<Confirmation>
    where
        B: Serialize,
        F: FnOnce(u64) -> B,
    {
        let start = Instant::now();
        self.session.signer().with_next(
            || self.rpc.transaction_count(from),
            |nonce| {
                let body = serde_json::to_string(&build(nonce)).map_err(|e| {
                    Error::OperationFailed {
                        operation: format!("serialize_{operation}"),
                        cause: e.to_string(),
                    }
                })?;
                let request = self
                    .session
                    .http()
                    .post(self.url(path))
                    .header(reqwest::header::CONTENT_TYPE, "application/json");
                let request = self.authorize(request, &body)?;
                let submitted: SubmitResponse = decode_json(request.body(body).send(), operation)?;
                tracing::debug!(operation, nonce, tx_hash = %submitted.tx_hash, "Submitted");

                let receipt = self.rpc.wait_for_receipt(&submitted.tx_hash)?;
                let mut confirmation = Confirmation::new(submitted.tx_hash);
                if let Some(block) = receipt.block() {
                    confirmation = confirmation.with_block_number(block);
                }
                let proposal = match submitted.proposal_id.as_deref() {
                    Some(raw) => Some(ObjectId::parse(raw).map(ProposalId::new)?),
                    None => self
                        .session
                        .config()
                        .schema
                        .proposal_created_topic
                        .as_deref()
                        .and_then(|topic| receipt.find_proposal_id(topic)),
                };
                if let Some(proposal) = proposal {
                    confirmation = confirmation.with_proposal(proposal);
                }
                tracing::info!(
                    operation,
                    tx_hash = %confirmation.tx_hash,
                    elapsed_ms = crate::duration_to_millis(start.elapsed()),
                    "Confirmed"
                );
                Ok(confirmation)
            },
        )
    }
}

impl ChainWriter for GatewayWriter {
    fn publish(
        &self,
        space: SpaceId,
        author: &AuthorIdentity,
        name: &str,
        ops: &[Op],
    ) -> Result<Confirmation> {
        let from = self.operator()?;
        self.submit("publish", &format!("spaces/{space}/edits"), from, |nonce| {
            PublishRequest {
                from,
                nonce,
                author: author.id,
                name,
                ops,
            }
        })
    }

    fn propose(
        &self,
        space: SpaceId,
        author: &AuthorIdentity,
        ops: &[Op],
        voting_mode: VotingMode,
    ) -> Result<Confirmation> {
        let from = self.operator()?;
        let confirmation =
            self.submit("propose", &format!("spaces/{space}/proposals"), from, |nonce| {
                ProposeRequest {
                    from,
                    nonce,
                    author: author.id,
                    voting_mode,
                    ops,
                }
            })?;
        if confirmation.proposal_id.is_none() {
            return Err(upstream(
                "propose",
                format!("no proposal id for transaction {}", confirmation.tx_hash),
            ));
        }
        Ok(confirmation)
    }

    fn vote(
        &self,
        proposal: ProposalId,
        voter_space: SpaceId,
        option: VoteOption,
    ) -> Result<Confirmation> {
        let from = self.operator()?;
        self.submit("vote", &format!("proposals/{proposal}/votes"), from, |nonce| {
            VoteRequest {
                from,
                nonce,
                voter_space_id: voter_space,
                option,
            }
        })
    }

    fn execute(&self, proposal: ProposalId) -> Result<Confirmation> {
        let from = self.operator()?;
        self.submit(
            "execute",
            &format!("proposals/{proposal}/execute"),
            from,
            |nonce| ExecuteRequest { from, nonce },
        )
    }

    fn proposal_status(&self, proposal: ProposalId) -> Result<ProposalStatus> {
        let url = self.url(&format!("proposals/{proposal}"));
        self.session.retry().run("proposal_status", || {
            let request = self.authorize(self.session.http().get(&url), "")?;
            decode_json(request.send(), "proposal_status")
        })
    }
}

/// Computes `sha256=<hex>` over `body` with `secret`.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the key is rejected.
pub fn compute_body_signature(secret: &str, body: &str) -> Result<String> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| Error::OperationFailed {
            operation: "hmac_key".to_string(),
            cause: e.to_string(),
        })?;
    mac.update(body.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("sha256={signature}"))
}
