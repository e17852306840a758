use mockbft_core::{
    Block,
    Transaction,
};
use serde::Serialize;
use serde_json::{
    json,
    Value,
};
use sha2::{
    Digest as _,
    Sha256,
};
use tracing::debug;

use super::{
    params::RequestParams,
    types::{
        base64_decode,
        base64_encode,
        synthesized_commit,
        AbciInfo,
        AbciInfoResponse,
        AbciQueryResponse,
        AbciQueryResult,
        BlockResponse,
        BlockResultsResponse,
        BlockchainInfoResponse,
        BroadcastTxCommitResponse,
        BroadcastTxResponse,
        CommitResponse,
        GenesisResponse,
        JsonBlock,
        JsonBlockId,
        JsonBlockMeta,
        JsonGenesis,
        JsonHeader,
        JsonNodeInfo,
        JsonNodeInfoOther,
        JsonProtocolVersion,
        JsonSignedHeader,
        JsonSyncInfo,
        JsonTxResult,
        JsonValidator,
        JsonValidatorInfo,
        NetInfoResponse,
        SimulateResponse,
        StatusResponse,
        ValidatorsResponse,
    },
    RpcError,
    RpcState,
};

/// How many block metas `BlockchainInfo` returns at most per request.
const MAX_BLOCKCHAIN_INFO_SPAN: i64 = 20;

const DEFAULT_VALIDATORS_PER_PAGE: i64 = 30;
const MAX_VALIDATORS_PER_PAGE: i64 = 100;

/// Version of the engine whose wire surface this server mirrors.
const MIRRORED_VERSION: &str = "0.37.2";

pub(super) async fn dispatch(
    state: &RpcState,
    method: &str,
    params: RequestParams,
) -> Result<Value, RpcError> {
    match method {
        "Health" => Ok(json!({})),
        "ABCIInfo" => abci_info(state),
        "ABCIQuery" => abci_query(state, &params),
        "BroadcastTxAsync" => broadcast_tx_async(state, &params),
        "BroadcastTxSync" => broadcast_tx_sync(state, &params),
        "BroadcastTxCommit" => broadcast_tx_commit(state, &params).await,
        "Block" => block(state, &params),
        "BlockResults" => block_results(state, &params),
        "BlockchainInfo" => blockchain_info(state, &params),
        "Commit" => commit(state, &params),
        "Genesis" => genesis(state),
        "NetInfo" => net_info(),
        "Status" => status(state),
        "Validators" => validators(state, &params),
        "Simulate" => simulate(state, &params),
        other => Err(RpcError::method_not_found(other)),
    }
}

fn to_value<T: Serialize>(response: T) -> Result<Value, RpcError> {
    serde_json::to_value(response)
        .map_err(|err| RpcError::internal(format!("failed encoding response: {err}")))
}

/// Decodes a tx or key parameter: `0x` hex and `base64:` payloads become raw
/// bytes, anything else is literal UTF-8.
fn decode_bytes(param: &str) -> Result<Vec<u8>, RpcError> {
    if let Some(hex_payload) = param.strip_prefix("0x") {
        return hex::decode(hex_payload)
            .map_err(|_| RpcError::invalid_params("invalid hex payload"));
    }
    if let Some(base64_payload) = param.strip_prefix("base64:") {
        return base64_decode(base64_payload)
            .map_err(|_| RpcError::invalid_params("invalid base64 payload"));
    }
    Ok(param.as_bytes().to_vec())
}

fn decode_tx(params: &RequestParams) -> Result<Transaction, RpcError> {
    let raw = params.require_string(0, "tx")?;
    Ok(Transaction::from(decode_bytes(&raw)?))
}

/// Resolves a height parameter against committed blocks. `None` or `0` is
/// the latest committed block; anything else must exist.
fn resolve_block(state: &RpcState, height: Option<i64>) -> Result<Block, RpcError> {
    match height {
        None | Some(0) => state
            .engine
            .latest_committed_block()
            .ok_or_else(|| RpcError::server_error("no blocks have been committed yet")),
        Some(height) if height < 0 => {
            Err(RpcError::invalid_params("height cannot be negative"))
        }
        Some(height) => state
            .engine
            .committed_block(height)
            .ok_or_else(|| RpcError::server_error(format!("height {height} is not available"))),
    }
}

fn abci_info(state: &RpcState) -> Result<Value, RpcError> {
    to_value(AbciInfoResponse {
        response: AbciInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            app_version: 1,
            last_block_height: state.engine.current_height(),
            last_block_app_hash: state.engine.latest_app_hash().to_string(),
        },
    })
}

fn abci_query(state: &RpcState, params: &RequestParams) -> Result<Value, RpcError> {
    // The path parameter is accepted for wire compatibility; the mock serves
    // a single keyspace and has no historical state, so `height` and `prove`
    // are ignored as well.
    let _path = params.opt_string(0, "path")?;
    let data = params.require_string(1, "data")?;
    let key = decode_bytes(&data)?;

    let (value, log) = match state.engine.query(&key) {
        Some(value) => (Some(base64_encode(&value)), "exists".to_string()),
        None => (None, "does not exist".to_string()),
    };
    to_value(AbciQueryResponse {
        response: AbciQueryResult {
            code: 0,
            log,
            key: Some(base64_encode(&key)),
            value,
            height: state.engine.current_height(),
        },
    })
}

fn broadcast_tx_async(state: &RpcState, params: &RequestParams) -> Result<Value, RpcError> {
    let tx = decode_tx(params)?;
    let hash = tx.hash().to_string();
    if let Err(error) = state.engine.check_tx(&tx) {
        debug!(tx = %hash, %error, "async admission failed");
    }
    to_value(BroadcastTxResponse {
        code: 0,
        data: String::new(),
        log: String::new(),
        hash,
    })
}

fn broadcast_tx_sync(state: &RpcState, params: &RequestParams) -> Result<Value, RpcError> {
    let tx = decode_tx(params)?;
    let hash = tx.hash().to_string();
    let (code, log) = match state.engine.check_tx(&tx) {
        Ok(()) => (0, String::new()),
        Err(error) => (1, error.to_string()),
    };
    to_value(BroadcastTxResponse {
        code,
        data: String::new(),
        log,
        hash,
    })
}

async fn broadcast_tx_commit(state: &RpcState, params: &RequestParams) -> Result<Value, RpcError> {
    let tx = decode_tx(params)?;
    let hash = tx.hash();

    // Subscribe before admission so the commit that includes this tx cannot
    // slip between the two.
    let mut commits = state.engine.subscribe_commits();
    if let Err(error) = state.engine.check_tx(&tx) {
        return to_value(BroadcastTxCommitResponse {
            check_tx: JsonTxResult::failed(error.to_string()),
            deliver_tx: JsonTxResult::ok(),
            hash: hash.to_string(),
            height: 0,
        });
    }

    let deadline = tokio::time::Instant::now() + state.broadcast_tx_commit_timeout;
    loop {
        match tokio::time::timeout_at(deadline, commits.changed()).await {
            Ok(Ok(())) => {
                let height = *commits.borrow_and_update();
                let Some(execution) = state.engine.execution(height) else {
                    continue;
                };
                let Some(index) = execution.tx_hashes.iter().position(|h| *h == hash) else {
                    continue;
                };
                return to_value(BroadcastTxCommitResponse {
                    check_tx: JsonTxResult::ok(),
                    deliver_tx: JsonTxResult::from(&execution.tx_results[index]),
                    hash: hash.to_string(),
                    height,
                });
            }
            // Timed out or the engine went away: report the successful check
            // with a zero height instead of blocking forever.
            Ok(Err(_)) | Err(_) => {
                return to_value(BroadcastTxCommitResponse {
                    check_tx: JsonTxResult::ok(),
                    deliver_tx: JsonTxResult::failed(
                        "timed out waiting for transaction to be committed",
                    ),
                    hash: hash.to_string(),
                    height: 0,
                });
            }
        }
    }
}

fn block(state: &RpcState, params: &RequestParams) -> Result<Value, RpcError> {
    let height = params.opt_i64(0, "height")?;
    let block = resolve_block(state, height)?;
    let header = JsonHeader::new(
        &block,
        state.engine.chain_id(),
        state.engine.validator_set(),
        state.engine.app_hash_of_block(block.height()),
    );
    to_value(BlockResponse {
        block_id: JsonBlockId::for_block(&block),
        block: JsonBlock::new(&block, header),
    })
}

fn block_results(state: &RpcState, params: &RequestParams) -> Result<Value, RpcError> {
    let height = match params.opt_i64(0, "height")? {
        None | Some(0) => state.engine.current_height(),
        Some(height) if height < 0 => {
            return Err(RpcError::invalid_params("height cannot be negative"));
        }
        Some(height) => height,
    };
    let execution = state
        .engine
        .execution(height)
        .ok_or_else(|| RpcError::server_error(format!("no block results for height {height}")))?;
    to_value(BlockResultsResponse {
        height,
        txs_results: execution.tx_results.iter().map(JsonTxResult::from).collect(),
        finalize_block_events: Vec::new(),
        validator_updates: Vec::new(),
        consensus_param_updates: None,
    })
}

fn blockchain_info(state: &RpcState, params: &RequestParams) -> Result<Value, RpcError> {
    let latest_committed = state.engine.current_height() - 1;
    if latest_committed < 1 {
        return to_value(BlockchainInfoResponse {
            last_height: state.engine.current_height(),
            block_metas: Vec::new(),
        });
    }

    let min_height = params.opt_i64(0, "minHeight")?.unwrap_or(1).max(1);
    let max_height = match params.opt_i64(1, "maxHeight")? {
        None | Some(0) => latest_committed,
        Some(height) => height.min(latest_committed),
    };
    if min_height > max_height {
        return Err(RpcError::server_error(format!(
            "min height {min_height} is greater than max height {max_height}"
        )));
    }
    let min_height = min_height.max(max_height - MAX_BLOCKCHAIN_INFO_SPAN + 1);

    let mut block_metas = Vec::new();
    let mut height = max_height;
    while height >= min_height {
        let block = resolve_block(state, Some(height))?;
        let header = JsonHeader::new(
            &block,
            state.engine.chain_id(),
            state.engine.validator_set(),
            state.engine.app_hash_of_block(block.height()),
        );
        block_metas.push(JsonBlockMeta {
            block_id: JsonBlockId::for_block(&block),
            block_size: block.txs().iter().map(Transaction::len).sum(),
            header,
            num_txs: block.txs().len(),
        });
        height -= 1;
    }
    to_value(BlockchainInfoResponse {
        last_height: state.engine.current_height(),
        block_metas,
    })
}

fn commit(state: &RpcState, params: &RequestParams) -> Result<Value, RpcError> {
    let height = params.opt_i64(0, "height")?;
    let block = resolve_block(state, height)?;
    let header = JsonHeader::new(
        &block,
        state.engine.chain_id(),
        state.engine.validator_set(),
        state.engine.app_hash_of_block(block.height()),
    );
    to_value(CommitResponse {
        signed_header: JsonSignedHeader {
            header,
            commit: synthesized_commit(&block, state.engine.validator_set()),
        },
        canonical: true,
    })
}

fn genesis(state: &RpcState) -> Result<Value, RpcError> {
    to_value(GenesisResponse {
        genesis: JsonGenesis {
            genesis_time: state.engine.genesis_time().to_string(),
            chain_id: state.engine.chain_id().to_string(),
            initial_height: 1,
            validators: state
                .engine
                .validator_set()
                .iter()
                .map(JsonValidator::from)
                .collect(),
            app_hash: String::new(),
        },
    })
}

fn net_info() -> Result<Value, RpcError> {
    to_value(NetInfoResponse {
        listening: true,
        listeners: Vec::new(),
        n_peers: 0,
        peers: Vec::new(),
    })
}

fn status(state: &RpcState) -> Result<Value, RpcError> {
    let engine = &state.engine;
    let latest_block = engine.latest_committed_block();

    let listen_addr = format!("tcp://{}", state.listen_addr);
    let node_info = JsonNodeInfo {
        protocol_version: JsonProtocolVersion {
            p2p: 8,
            block: 11,
            app: 1,
        },
        id: node_id(engine.chain_id(), &state.moniker),
        listen_addr: listen_addr.clone(),
        network: engine.chain_id().to_string(),
        version: MIRRORED_VERSION.to_string(),
        channels: "40202122233038606100".to_string(),
        moniker: state.moniker.clone(),
        other: JsonNodeInfoOther {
            tx_index: "on".to_string(),
            rpc_address: listen_addr,
        },
    };

    let sync_info = JsonSyncInfo {
        latest_block_hash: latest_block
            .as_ref()
            .map(|block| block.hash().to_string())
            .unwrap_or_default(),
        latest_app_hash: engine.latest_app_hash().to_string(),
        latest_block_height: engine.current_height(),
        latest_block_time: latest_block
            .as_ref()
            .map(|block| block.time().to_string())
            .unwrap_or_else(|| engine.genesis_time().to_string()),
        earliest_block_height: 1,
        catching_up: false,
    };

    let validator_info = match engine.validator_set().get(0) {
        Some(validator) => JsonValidatorInfo {
            address: validator.address().to_string(),
            pub_key: None,
            voting_power: validator.voting_power(),
        },
        None => JsonValidatorInfo {
            address: String::new(),
            pub_key: None,
            voting_power: 0,
        },
    };

    to_value(StatusResponse {
        node_info,
        sync_info,
        validator_info,
    })
}

fn validators(state: &RpcState, params: &RequestParams) -> Result<Value, RpcError> {
    let block_height = match params.opt_i64(0, "height")? {
        None | Some(0) => state.engine.current_height(),
        Some(height) if height < 1 => {
            return Err(RpcError::invalid_params("height cannot be negative"));
        }
        Some(height) if height > state.engine.current_height() => {
            return Err(RpcError::server_error(format!(
                "height {height} is not available"
            )));
        }
        Some(height) => height,
    };

    let page = params.opt_i64(1, "page")?.unwrap_or(1);
    let per_page = params
        .opt_i64(2, "per_page")?
        .unwrap_or(DEFAULT_VALIDATORS_PER_PAGE)
        .clamp(1, MAX_VALIDATORS_PER_PAGE);

    let set = state.engine.validator_set();
    let total = set.len();
    let total_i64 = total as i64;
    let pages = ((total_i64 + per_page - 1) / per_page).max(1);
    if page < 1 || page > pages {
        return Err(RpcError::invalid_params(format!(
            "page {page} is out of range (1..={pages})"
        )));
    }

    let start = usize::try_from((page - 1) * per_page).expect("page bounds checked above");
    let validators: Vec<JsonValidator> = set
        .iter()
        .skip(start)
        .take(usize::try_from(per_page).expect("per_page is clamped positive"))
        .map(JsonValidator::from)
        .collect();
    to_value(ValidatorsResponse {
        block_height,
        count: validators.len(),
        validators,
        total,
    })
}

fn simulate(state: &RpcState, params: &RequestParams) -> Result<Value, RpcError> {
    let tx = decode_tx(params)?;
    let gas = i64::try_from(tx.len()).unwrap_or(i64::MAX);
    let response = match state.engine.simulate_tx(&tx) {
        Ok(()) => SimulateResponse {
            code: 0,
            log: String::new(),
            gas_wanted: gas,
            gas_used: gas,
        },
        Err(error) => SimulateResponse {
            code: 1,
            log: error.to_string(),
            gas_wanted: 0,
            gas_used: 0,
        },
    };
    to_value(response)
}

/// Stable fake node id: the first twenty bytes of a digest over the chain id
/// and moniker, hex encoded like the upstream engine's node ids.
fn node_id(chain_id: &str, moniker: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chain_id.as_bytes());
    hasher.update(moniker.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..20])
}
