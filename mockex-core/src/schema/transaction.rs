use crate::schema::{TransactionStatus, TransactionType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A deposit or withdrawal of funds.
///
/// Withdrawals start `non_authorized` and are confirmed by the engine's processing
/// sweep; deposits minted by the test faucet are created already `confirmed`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub api_key: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub currency: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u32>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Construct a new [`Transaction`] from an adapter submission, defaulting to the
    /// `non_authorized` initial state unless the draft overrides it.
    pub fn submit(
        api_key: &str,
        number: &str,
        created_at: DateTime<Utc>,
        draft: TransactionDraft,
    ) -> Self {
        Self {
            id: number.to_owned(),
            api_key: api_key.to_owned(),
            kind: draft.kind,
            currency: draft.currency,
            amount: draft.amount,
            address: draft.address,
            fee: draft.fee,
            payment_id: draft.payment_id,
            hash: None,
            confirmations: None,
            status: draft.status.unwrap_or(TransactionStatus::NonAuthorized),
            created_at,
            updated_at: draft.updated_at,
        }
    }
}

/// Fields an adapter provides when submitting a new transaction to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub kind: TransactionType,
    pub currency: String,
    pub amount: Decimal,
    pub address: Option<String>,
    pub fee: Decimal,
    pub payment_id: Option<String>,
    /// Overrides the `non_authorized` initial state (used by the faucet).
    pub status: Option<TransactionStatus>,
    pub updated_at: Option<DateTime<Utc>>,
}
