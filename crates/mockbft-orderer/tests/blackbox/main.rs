mod helpers;

use std::time::Duration;

use serde_json::{
    json,
    Value,
};

use crate::helpers::TestOrderer;

#[tokio::test(flavor = "multi_thread")]
async fn single_transaction_round_commits() {
    let orderer = TestOrderer::spawn().await;

    let broadcast = orderer.result("BroadcastTxSync", json!(["a=1"])).await;
    assert_eq!(broadcast["code"], json!(0));

    orderer.wait_for_height(2).await;

    let results = orderer.result("BlockResults", json!([2])).await;
    assert_eq!(results["txs_results"][0]["code"], json!(0));

    let status = orderer.result("Status", Value::Null).await;
    assert_eq!(status["sync_info"]["latest_block_height"], json!(2));

    let query = orderer.result("ABCIQuery", json!(["", "a"])).await;
    assert_eq!(query["response"]["code"], json!(0));
    assert!(query["response"]["value"].is_string());

    orderer.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn idle_ticks_leave_the_chain_unchanged() {
    let orderer = TestOrderer::spawn().await;

    orderer.result("BroadcastTxSync", json!(["a=1"])).await;
    orderer.wait_for_height(2).await;

    let block_before = orderer.result("Block", Value::Null).await;
    let height_before = orderer.latest_height().await;

    // several empty ticks pass
    tokio::time::sleep(Duration::from_millis(200)).await;

    let block_after = orderer.result("Block", Value::Null).await;
    assert_eq!(
        block_after["block"]["header"]["height"],
        block_before["block"]["header"]["height"],
    );
    assert_eq!(
        block_after["block_id"]["hash"],
        block_before["block_id"]["hash"],
    );
    assert_eq!(orderer.latest_height().await, height_before);

    orderer.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn broadcast_tx_commit_waits_for_inclusion() {
    let orderer = TestOrderer::spawn().await;

    let committed = orderer.result("BroadcastTxCommit", json!(["b=2"])).await;
    assert_eq!(committed["check_tx"]["code"], json!(0));
    assert_eq!(committed["deliver_tx"]["code"], json!(0));
    assert!(committed["height"].as_i64().unwrap() >= 2);

    let query = orderer.result("ABCIQuery", json!(["", "b"])).await;
    assert!(query["response"]["value"].is_string());

    orderer.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn get_requests_map_query_parameters() {
    let orderer = TestOrderer::spawn().await;

    let broadcast = orderer.get("BroadcastTxSync", &[("tx", "c=3")]).await;
    assert_eq!(broadcast["code"], json!(0));

    orderer.wait_for_height(2).await;

    let block = orderer.get("Block", &[("height", "0")]).await;
    assert_eq!(block["block"]["header"]["height"], json!(1));

    let validators = orderer
        .get("Validators", &[("page", "1"), ("per_page", "2")])
        .await;
    assert_eq!(validators["count"], json!(2));
    assert_eq!(validators["total"], json!(4));

    let health = orderer.get("Health", &[]).await;
    assert_eq!(health, json!({}));

    orderer.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_tag_transactions_commit_with_a_failed_result() {
    let orderer = TestOrderer::spawn().await;

    orderer.result("BroadcastTxSync", json!(["zz:oops"])).await;
    orderer.wait_for_height(2).await;

    let results = orderer.result("BlockResults", Value::Null).await;
    assert_eq!(results["txs_results"][0]["code"], json!(1));
    assert_eq!(results["txs_results"][0]["log"], json!(""));

    orderer.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_requests_yield_jsonrpc_errors() {
    let orderer = TestOrderer::spawn().await;

    let unknown = orderer.call("NoSuchMethod", Value::Null).await;
    assert_eq!(unknown["error"]["code"], json!(-32601));

    let raw: Value = orderer
        .client
        .post(format!("http://{}/", orderer.addr))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(raw["error"]["code"], json!(-32700));

    let out_of_range = orderer.call("Block", json!([42])).await;
    assert_eq!(out_of_range["error"]["code"], json!(-32000));

    orderer.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_broadcast_is_rejected_while_pending() {
    // a slow chain so the duplicate lands before the first tx commits
    let orderer = TestOrderer::spawn_with_interval(Duration::from_secs(30)).await;

    let first = orderer.result("BroadcastTxSync", json!(["d=4"])).await;
    assert_eq!(first["code"], json!(0));
    let duplicate = orderer.result("BroadcastTxSync", json!(["d=4"])).await;
    assert_eq!(duplicate["code"], json!(1));

    orderer.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn commit_returns_a_signed_header_for_each_height() {
    let orderer = TestOrderer::spawn().await;

    orderer.result("BroadcastTxSync", json!(["a=1"])).await;
    orderer.wait_for_height(2).await;

    let commit = orderer.result("Commit", json!([1])).await;
    let signed_header = &commit["signed_header"];
    assert_eq!(signed_header["header"]["height"], json!(1));
    assert_eq!(signed_header["header"]["chain_id"], json!("blackbox-chain"));
    assert_eq!(signed_header["commit"]["height"], json!(1));
    assert_eq!(
        signed_header["commit"]["signatures"]
            .as_array()
            .unwrap()
            .len(),
        4
    );
    assert_eq!(commit["canonical"], json!(true));

    orderer.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn abci_info_and_blockchain_info_track_commits() {
    let orderer = TestOrderer::spawn().await;

    for tx in ["a=1", "b=2"] {
        orderer.result("BroadcastTxCommit", json!([tx])).await;
    }
    orderer.wait_for_height(3).await;

    let info = orderer.result("ABCIInfo", Value::Null).await;
    assert_eq!(info["response"]["last_block_height"], json!(3));
    assert!(info["response"]["last_block_app_hash"]
        .as_str()
        .is_some_and(|hash| !hash.is_empty()));

    let chain = orderer.result("BlockchainInfo", json!([])).await;
    let metas = chain["block_metas"].as_array().unwrap();
    assert_eq!(metas.len(), 2);
    // descending order, parents chain up
    assert_eq!(metas[0]["header"]["height"], json!(2));
    assert_eq!(metas[1]["header"]["height"], json!(1));
    assert_eq!(
        metas[0]["header"]["last_block_id"]["hash"],
        metas[1]["block_id"]["hash"],
    );

    orderer.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn genesis_and_net_info_describe_the_instance() {
    let orderer = TestOrderer::spawn().await;

    let genesis = orderer.result("Genesis", Value::Null).await;
    assert_eq!(genesis["genesis"]["chain_id"], json!("blackbox-chain"));
    assert_eq!(
        genesis["genesis"]["validators"].as_array().unwrap().len(),
        4
    );

    let net_info = orderer.result("NetInfo", Value::Null).await;
    assert_eq!(net_info["listening"], json!(true));

    let simulate = orderer.result("Simulate", json!(["x=9"])).await;
    assert_eq!(simulate["code"], json!(0));
    assert_eq!(simulate["gas_used"], json!(3));

    orderer.stop().await;
}
