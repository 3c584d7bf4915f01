//! Error taxonomy for position lifecycle operations

use std::fmt;
use std::time::Duration;

use aero_math::MathError;
use alloy::primitives::TxHash;
use thiserror::Error;

use super::types::{CloseStep, OpenStep};

/// Main SDK error type
#[derive(Error, Debug)]
pub enum LpError {
    /// A read-only RPC call failed. Safe to retry.
    #[error("Chain read failed ({context}): {message}")]
    ChainRead { context: String, message: String },

    /// Building, signing or broadcasting a transaction failed
    #[error("Transaction submission failed ({context}): {message}")]
    ChainWrite { context: String, message: String },

    /// A transaction was mined with a failing status
    #[error("Transaction {tx_hash} ({context}) reverted")]
    Reverted { context: String, tx_hash: TxHash },

    /// The mint transaction was mined with a failing status
    #[error("Mint transaction {tx_hash} reverted")]
    MintFailed { tx_hash: TxHash },

    /// No receipt within the wait budget. The transaction was broadcast and
    /// may still be mined; inspect `tx_hash` on-chain before resubmitting.
    #[error("No receipt for {tx_hash} after {waited:?}")]
    ReceiptTimeout { tx_hash: TxHash, waited: Duration },

    /// Caller supplied something unusable
    #[error("Validation error: {0}")]
    Validation(String),

    /// A receipt lacked the expected log pattern
    #[error("Malformed receipt: {0}")]
    MalformedReceipt(String),

    /// Missing credentials, unsupported provider or invalid registry
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// The mint was mined but the position could not be recovered from its receipt
    #[error("Mint {tx_hash} succeeded but its receipt could not be parsed: {source}")]
    UnrecordedMint {
        tx_hash: TxHash,
        #[source]
        source: Box<LpError>,
    },

    /// The collect was mined but its receipt could not be parsed
    #[error("Collect {tx_hash} succeeded but its receipt could not be parsed: {source}")]
    UnrecordedCollect {
        tx_hash: TxHash,
        #[source]
        source: Box<LpError>,
    },

    /// Opening stopped at `step`; earlier approvals stay on-chain
    #[error("Open failed at {step}: {source}")]
    OpenFailed {
        step: OpenStep,
        #[source]
        source: Box<LpError>,
    },

    /// Closing stopped at `step`; `completed` steps are already on-chain
    #[error("Close failed at {step} ({}): {source}", CompletedSteps(.completed))]
    CloseFailed {
        step: CloseStep,
        completed: Vec<(CloseStep, TxHash)>,
        #[source]
        source: Box<LpError>,
    },
}

/// Result type alias for SDK operations
pub type LpResult<T> = Result<T, LpError>;

impl LpError {
    pub fn chain_read(context: impl Into<String>, err: impl fmt::Display) -> Self {
        LpError::ChainRead {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn chain_write(context: impl Into<String>, err: impl fmt::Display) -> Self {
        LpError::ChainWrite {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// Innermost error, looking through step wrappers
    pub fn root_cause(&self) -> &LpError {
        match self {
            LpError::OpenFailed { source, .. }
            | LpError::CloseFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the operation may be retried as-is.
    ///
    /// Only failed reads qualify. Anything raised after a broadcast carries
    /// the transaction hash and is never retryable: resubmitting could repeat
    /// a transaction that was mined.
    pub fn is_retryable(&self) -> bool {
        matches!(self.root_cause(), LpError::ChainRead { .. })
    }

    /// Hash of a broadcast transaction whose outcome the caller must check
    /// on-chain, if this failure happened after a broadcast
    pub fn pending_tx_hash(&self) -> Option<TxHash> {
        match self {
            LpError::ReceiptTimeout { tx_hash, .. }
            | LpError::UnrecordedMint { tx_hash, .. }
            | LpError::UnrecordedCollect { tx_hash, .. } => Some(*tx_hash),
            LpError::OpenFailed { source, .. } | LpError::CloseFailed { source, .. } => source.pending_tx_hash(),
            _ => None,
        }
    }
}

struct CompletedSteps<'a>(&'a [(CloseStep, TxHash)]);

impl fmt::Display for CompletedSteps<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "nothing completed");
        }
        write!(f, "completed:")?;
        for (step, tx_hash) in self.0 {
            write!(f, " {}={}", step, tx_hash)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_step_errors() {
        let err = LpError::CloseFailed {
            step: CloseStep::Collect,
            completed: vec![(CloseStep::DecreaseLiquidity, TxHash::ZERO)],
            source: Box::new(LpError::chain_read("positions", "timeout")),
        };

        assert!(matches!(err.root_cause(), LpError::ChainRead { .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Close failed at collect"));
        assert!(err.to_string().contains("decrease-liquidity="));
    }

    #[test]
    fn test_write_failures_are_not_retryable() {
        let err = LpError::OpenFailed {
            step: OpenStep::Mint,
            source: Box::new(LpError::MintFailed { tx_hash: TxHash::ZERO }),
        };
        assert!(!err.is_retryable());
        assert!(!LpError::Validation("missing token id".into()).is_retryable());
    }

    #[test]
    fn test_post_broadcast_failures_keep_hash() {
        let tx_hash = TxHash::repeat_byte(0x33);
        let err = LpError::OpenFailed {
            step: OpenStep::Mint,
            source: Box::new(LpError::ReceiptTimeout {
                tx_hash,
                waited: Duration::from_secs(1000),
            }),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.pending_tx_hash(), Some(tx_hash));

        let err = LpError::UnrecordedMint {
            tx_hash,
            source: Box::new(LpError::chain_read("positions", "timeout")),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.pending_tx_hash(), Some(tx_hash));
        assert_eq!(LpError::chain_read("slot0", "timeout").pending_tx_hash(), None);
    }
}
