//! Wire shapes mirroring the upstream engine's v0.37 JSON responses.
//!
//! Heights are numbers, block and transaction hashes uppercase hex,
//! timestamps RFC 3339, transaction payloads and stored values base64.

use base64::{
    engine::general_purpose::STANDARD as BASE64,
    Engine as _,
};
use mockbft_core::{
    Block,
    BlockHash,
    Validator,
    ValidatorSet,
};
use serde::Serialize;
use serde_json::Value;
use sha2::{
    Digest as _,
    Sha256,
};

use crate::app::{
    AppHash,
    TxResult,
};

pub(super) fn base64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub(super) fn base64_decode(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(value)
}

/// Digest binding the validator set into headers; static per instance since
/// the set never rotates.
pub(super) fn validators_hash(validators: &ValidatorSet) -> String {
    let mut hasher = Sha256::new();
    for validator in validators.iter() {
        hasher.update(validator.id().as_str().as_bytes());
        hasher.update(validator.address().as_bytes());
        hasher.update(validator.voting_power().to_be_bytes());
    }
    hex::encode_upper(hasher.finalize())
}

fn data_hash(block: &Block) -> String {
    let mut hasher = Sha256::new();
    for tx in block.txs() {
        hasher.update(tx.as_bytes());
    }
    hex::encode_upper(hasher.finalize())
}

#[derive(Serialize)]
pub(super) struct JsonBlockId {
    pub(super) hash: String,
    pub(super) parts: JsonPartSetHeader,
}

#[derive(Serialize)]
pub(super) struct JsonPartSetHeader {
    pub(super) total: u32,
    pub(super) hash: String,
}

impl JsonBlockId {
    pub(super) fn for_block(block: &Block) -> Self {
        Self::from_hash(Some(block.hash()))
    }

    pub(super) fn from_hash(hash: Option<BlockHash>) -> Self {
        match hash {
            Some(hash) => Self {
                hash: hash.to_string(),
                parts: JsonPartSetHeader {
                    total: 1,
                    hash: hash.to_string(),
                },
            },
            None => Self {
                hash: String::new(),
                parts: JsonPartSetHeader {
                    total: 0,
                    hash: String::new(),
                },
            },
        }
    }
}

#[derive(Serialize)]
pub(super) struct JsonVersion {
    pub(super) block: u64,
    pub(super) app: u64,
}

#[derive(Serialize)]
pub(super) struct JsonHeader {
    pub(super) version: JsonVersion,
    pub(super) chain_id: String,
    pub(super) height: i64,
    pub(super) time: String,
    pub(super) last_block_id: JsonBlockId,
    pub(super) last_commit_hash: String,
    pub(super) data_hash: String,
    pub(super) validators_hash: String,
    pub(super) next_validators_hash: String,
    pub(super) consensus_hash: String,
    pub(super) app_hash: String,
    pub(super) last_results_hash: String,
    pub(super) evidence_hash: String,
    pub(super) proposer_address: String,
}

impl JsonHeader {
    pub(super) fn new(
        block: &Block,
        chain_id: &str,
        validators: &ValidatorSet,
        app_hash: Option<AppHash>,
    ) -> Self {
        let set_hash = validators_hash(validators);
        let proposer_address = validators
            .iter()
            .find(|validator| validator.id() == block.proposer())
            .map(|validator| validator.address().to_string())
            .unwrap_or_default();
        Self {
            version: JsonVersion {
                block: 11,
                app: 1,
            },
            chain_id: chain_id.to_string(),
            height: block.height(),
            time: block.time().to_string(),
            last_block_id: JsonBlockId::from_hash(block.prev_hash()),
            last_commit_hash: String::new(),
            data_hash: data_hash(block),
            validators_hash: set_hash.clone(),
            next_validators_hash: set_hash,
            consensus_hash: String::new(),
            app_hash: app_hash.map(|hash| hash.to_string()).unwrap_or_default(),
            last_results_hash: String::new(),
            evidence_hash: String::new(),
            proposer_address,
        }
    }
}

#[derive(Serialize)]
pub(super) struct JsonBlock {
    pub(super) header: JsonHeader,
    pub(super) data: JsonBlockData,
    pub(super) evidence: JsonEvidenceData,
    pub(super) last_commit: JsonCommit,
}

#[derive(Serialize)]
pub(super) struct JsonBlockData {
    pub(super) txs: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct JsonEvidenceData {
    pub(super) evidence: Vec<Value>,
}

#[derive(Serialize)]
pub(super) struct JsonCommit {
    pub(super) height: i64,
    pub(super) round: u32,
    pub(super) block_id: JsonBlockId,
    pub(super) signatures: Vec<JsonCommitSig>,
}

#[derive(Serialize)]
pub(super) struct JsonCommitSig {
    pub(super) block_id_flag: u32,
    pub(super) validator_address: String,
    pub(super) timestamp: String,
    pub(super) signature: Option<String>,
}

impl JsonBlock {
    pub(super) fn new(block: &Block, header: JsonHeader) -> Self {
        Self {
            header,
            data: JsonBlockData {
                txs: block
                    .txs()
                    .iter()
                    .map(|tx| base64_encode(tx.as_bytes()))
                    .collect(),
            },
            evidence: JsonEvidenceData {
                evidence: Vec::new(),
            },
            last_commit: JsonCommit {
                height: block.height().saturating_sub(1),
                round: 0,
                block_id: JsonBlockId::from_hash(block.prev_hash()),
                signatures: Vec::new(),
            },
        }
    }
}

/// A synthesized commit: every validator signs, with no actual signature
/// bytes (`block_id_flag` 2 is "commit").
pub(super) fn synthesized_commit(block: &Block, validators: &ValidatorSet) -> JsonCommit {
    JsonCommit {
        height: block.height(),
        round: 0,
        block_id: JsonBlockId::for_block(block),
        signatures: validators
            .iter()
            .map(|validator| JsonCommitSig {
                block_id_flag: 2,
                validator_address: validator.address().to_string(),
                timestamp: block.time().to_string(),
                signature: None,
            })
            .collect(),
    }
}

#[derive(Serialize)]
pub(super) struct JsonValidator {
    pub(super) address: String,
    pub(super) pub_key: Option<Value>,
    pub(super) voting_power: i64,
    pub(super) proposer_priority: i64,
}

impl From<&Validator> for JsonValidator {
    fn from(validator: &Validator) -> Self {
        Self {
            address: validator.address().to_string(),
            pub_key: None,
            voting_power: validator.voting_power(),
            proposer_priority: 0,
        }
    }
}

#[derive(Serialize)]
pub(super) struct JsonTxResult {
    pub(super) code: u32,
    pub(super) data: Option<String>,
    pub(super) log: String,
    pub(super) gas_wanted: i64,
    pub(super) gas_used: i64,
}

impl JsonTxResult {
    pub(super) fn ok() -> Self {
        Self {
            code: 0,
            data: None,
            log: String::new(),
            gas_wanted: 0,
            gas_used: 0,
        }
    }

    pub(super) fn failed(log: impl Into<String>) -> Self {
        Self {
            code: 1,
            data: None,
            log: log.into(),
            gas_wanted: 0,
            gas_used: 0,
        }
    }
}

impl From<&TxResult> for JsonTxResult {
    fn from(result: &TxResult) -> Self {
        Self {
            code: result.code,
            data: None,
            log: result.log.clone(),
            gas_wanted: 0,
            gas_used: 0,
        }
    }
}

#[derive(Serialize)]
pub(super) struct AbciInfoResponse {
    pub(super) response: AbciInfo,
}

#[derive(Serialize)]
pub(super) struct AbciInfo {
    pub(super) version: String,
    pub(super) app_version: u64,
    pub(super) last_block_height: i64,
    pub(super) last_block_app_hash: String,
}

#[derive(Serialize)]
pub(super) struct AbciQueryResponse {
    pub(super) response: AbciQueryResult,
}

#[derive(Serialize)]
pub(super) struct AbciQueryResult {
    pub(super) code: u32,
    pub(super) log: String,
    pub(super) key: Option<String>,
    pub(super) value: Option<String>,
    pub(super) height: i64,
}

#[derive(Serialize)]
pub(super) struct BroadcastTxResponse {
    pub(super) code: u32,
    pub(super) data: String,
    pub(super) log: String,
    pub(super) hash: String,
}

#[derive(Serialize)]
pub(super) struct BroadcastTxCommitResponse {
    pub(super) check_tx: JsonTxResult,
    pub(super) deliver_tx: JsonTxResult,
    pub(super) hash: String,
    pub(super) height: i64,
}

#[derive(Serialize)]
pub(super) struct BlockResponse {
    pub(super) block_id: JsonBlockId,
    pub(super) block: JsonBlock,
}

#[derive(Serialize)]
pub(super) struct BlockResultsResponse {
    pub(super) height: i64,
    pub(super) txs_results: Vec<JsonTxResult>,
    pub(super) finalize_block_events: Vec<Value>,
    pub(super) validator_updates: Vec<Value>,
    pub(super) consensus_param_updates: Option<Value>,
}

#[derive(Serialize)]
pub(super) struct JsonBlockMeta {
    pub(super) block_id: JsonBlockId,
    pub(super) block_size: usize,
    pub(super) header: JsonHeader,
    pub(super) num_txs: usize,
}

#[derive(Serialize)]
pub(super) struct BlockchainInfoResponse {
    pub(super) last_height: i64,
    pub(super) block_metas: Vec<JsonBlockMeta>,
}

#[derive(Serialize)]
pub(super) struct JsonSignedHeader {
    pub(super) header: JsonHeader,
    pub(super) commit: JsonCommit,
}

#[derive(Serialize)]
pub(super) struct CommitResponse {
    pub(super) signed_header: JsonSignedHeader,
    pub(super) canonical: bool,
}

#[derive(Serialize)]
pub(super) struct GenesisResponse {
    pub(super) genesis: JsonGenesis,
}

#[derive(Serialize)]
pub(super) struct JsonGenesis {
    pub(super) genesis_time: String,
    pub(super) chain_id: String,
    pub(super) initial_height: i64,
    pub(super) validators: Vec<JsonValidator>,
    pub(super) app_hash: String,
}

#[derive(Serialize)]
pub(super) struct NetInfoResponse {
    pub(super) listening: bool,
    pub(super) listeners: Vec<String>,
    pub(super) n_peers: u64,
    pub(super) peers: Vec<Value>,
}

#[derive(Serialize)]
pub(super) struct StatusResponse {
    pub(super) node_info: JsonNodeInfo,
    pub(super) sync_info: JsonSyncInfo,
    pub(super) validator_info: JsonValidatorInfo,
}

#[derive(Serialize)]
pub(super) struct JsonNodeInfo {
    pub(super) protocol_version: JsonProtocolVersion,
    pub(super) id: String,
    pub(super) listen_addr: String,
    pub(super) network: String,
    pub(super) version: String,
    pub(super) channels: String,
    pub(super) moniker: String,
    pub(super) other: JsonNodeInfoOther,
}

#[derive(Serialize)]
pub(super) struct JsonProtocolVersion {
    pub(super) p2p: u64,
    pub(super) block: u64,
    pub(super) app: u64,
}

#[derive(Serialize)]
pub(super) struct JsonNodeInfoOther {
    pub(super) tx_index: String,
    pub(super) rpc_address: String,
}

#[derive(Serialize)]
pub(super) struct JsonSyncInfo {
    pub(super) latest_block_hash: String,
    pub(super) latest_app_hash: String,
    pub(super) latest_block_height: i64,
    pub(super) latest_block_time: String,
    pub(super) earliest_block_height: i64,
    pub(super) catching_up: bool,
}

#[derive(Serialize)]
pub(super) struct JsonValidatorInfo {
    pub(super) address: String,
    pub(super) pub_key: Option<Value>,
    pub(super) voting_power: i64,
}

#[derive(Serialize)]
pub(super) struct ValidatorsResponse {
    pub(super) block_height: i64,
    pub(super) validators: Vec<JsonValidator>,
    pub(super) count: usize,
    pub(super) total: usize,
}

#[derive(Serialize)]
pub(super) struct SimulateResponse {
    pub(super) code: u32,
    pub(super) log: String,
    pub(super) gas_wanted: i64,
    pub(super) gas_used: i64,
}
