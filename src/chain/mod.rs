//! Write path: gateway submission, chain confirmation and signer sequencing.
//!
//! Every write goes through [`ChainWriter`]. The production implementation,
//! [`GatewayWriter`], submits signed transactions through an HTTP write
//! gateway and waits for their receipts on the node RPC. Writes are strictly
//! sequential per signing identity, enforced by [`SignerSequence`].

mod gateway;
mod retry;
mod rpc;
mod signer;
mod writer;

pub use gateway::{GatewayWriter, SIGNATURE_HEADER, compute_body_signature};
pub use retry::RetryPolicy;
pub use rpc::{ReceiptLog, RpcClient, TxReceipt, parse_quantity};
pub use signer::SignerSequence;
pub use writer::{ChainWriter, Confirmation};
