pub mod builder;
pub mod config;
pub mod encode;
pub mod error;
pub mod external;
pub mod fees;
pub mod sighash;
pub mod signer;
pub mod types;
pub mod wallet;

pub use builder::{
    BuiltTransaction, LinearSizeEstimator, Payment, SizeEstimator, TxTemplate,
    VirtualSizeEstimator, build_unsigned, build_unsigned_with,
};
pub use config::{EstimatorKind, TxConfig};
pub use encode::{deserialize, deserialize_hex, serialize, serialize_hex};
pub use error::TxError;
pub use external::{Broadcaster, Collaborators, FeeRateSource, UtxoSource};
pub use fees::{FeeTier, RecommendedFees};
pub use sighash::SighashType;
pub use signer::{Signer, SpendKind};
pub use types::{
    EsploraUtxo, MAX_MONEY, OutPoint, PrevOutputIndex, Transaction, TransactionSummary, TxIn,
    TxOut, Txid, Utxo,
};
pub use wallet::{SignedTransaction, build_and_sign_transaction, send_payment};
