mod common;

use alloy::primitives::{Address, U256};
use serde_json::json;

use chainpilot::action::ActionRequest;
use chainpilot::cards::{CardKind, CardStatus};
use chainpilot::chain::RpcFailure;
use chainpilot::market::{HistoryEntry, HistoryPage, HistorySource};
use chainpilot::sentinel::{CONTRACT_CALL_PREFIX, TX_DATA_PREFIX};
use chainpilot::slot::PendingOperation;

use common::*;

fn transfer(amount: &str) -> ActionRequest {
    ActionRequest::new("prepareTransaction")
        .with_param("to", recipient().to_string())
        .with_param("amount", amount)
        .with_param("networkName", "ethereum-sepolia")
}

fn contract_call(function: &str, args: serde_json::Value) -> ActionRequest {
    ActionRequest::new("prepareContractInteraction")
        .with_param("contractAddress", token_address().to_string())
        .with_param("functionName", function)
        .with_param("functionArgs", args)
}

#[tokio::test]
async fn test_sepolia_transfer_end_to_end() {
    let harness = Harness::connected().await;

    let reply = harness.dispatcher.dispatch(transfer("1.5")).await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.contains("Send 1.5 ETH"));
    assert!(reply.message.contains("Estimated Gas: 21000 units"));
    assert!(reply.message.contains("Gas Price: 2 Gwei"));
    assert_eq!(reply.content.len(), 2);
    assert!(reply.content[1].starts_with(TX_DATA_PREFIX));
    assert!(matches!(reply.pending, Some(PendingOperation::NativeTransfer(_))));

    let reply = harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await;
    assert!(reply.ok, "{}", reply.message);
    let hash = reply.tx_hash.unwrap();
    assert_eq!(reply.message, format!("Transaction sent: {hash}"));

    let requests = harness.wallet.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].from, account());
    assert_eq!(requests[0].to, Some(recipient()));
    assert_eq!(requests[0].value, Some(U256::from(0x14d1120d7b160000u64)));
    assert_eq!(requests[0].chain_id, Some(SEPOLIA));
    let wire = serde_json::to_value(&requests[0]).unwrap();
    assert_eq!(wire["value"], "0x14d1120d7b160000");

    let card = harness.dispatcher.cards().get(&hash).unwrap();
    assert_eq!(card.kind, CardKind::Transfer);
    assert_eq!(card.status, CardStatus::Waiting);
    assert_eq!(card.title, "Transaction pending");
    assert!(card.detail.starts_with("Sending 1.5 ETH to 0x"));

    let session = harness.dispatcher.session().await;
    assert_eq!(session.slot, "empty");
    assert!(session.pending.is_none());
    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_newer_preparation_replaces_pending() {
    let harness = Harness::connected().await;

    assert!(harness.dispatcher.dispatch(transfer("1")).await.ok);
    assert!(harness.dispatcher.dispatch(transfer("2")).await.ok);

    let session = harness.dispatcher.session().await;
    match session.pending {
        Some(PendingOperation::NativeTransfer(op)) => assert_eq!(op.amount_decimal, "2"),
        other => panic!("unexpected pending operation: {other:?}"),
    }

    assert!(harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await.ok);
    let requests = harness.wallet.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].value, Some(U256::from(2u64) * U256::from(10u64).pow(U256::from(18u64))));
    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_confirm_and_deny_on_empty_slot() {
    let harness = Harness::connected().await;

    let reply = harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await;
    assert!(!reply.ok);
    assert_eq!(reply.error_kind, Some("no_pending_operation"));
    assert_eq!(reply.message, "No pending transaction to confirm.");

    let reply = harness.dispatcher.dispatch(ActionRequest::new("denyTransaction")).await;
    assert!(!reply.ok);
    assert_eq!(reply.message, "No pending transaction to cancel.");
    assert!(harness.wallet.requests().is_empty());
}

#[tokio::test]
async fn test_deny_then_confirm() {
    let harness = Harness::connected().await;

    assert!(harness.dispatcher.dispatch(transfer("0.1")).await.ok);
    let reply = harness.dispatcher.dispatch(ActionRequest::new("denyTransaction")).await;
    assert!(reply.ok);
    assert_eq!(reply.message, "Transaction cancelled.");

    let reply = harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await;
    assert_eq!(reply.error_kind, Some("no_pending_operation"));
    assert!(harness.wallet.requests().is_empty());
    assert!(harness.dispatcher.cards().list().is_empty());
}

#[tokio::test]
async fn test_user_rejection_clears_slot() {
    let harness = Harness::connected().await;
    harness
        .wallet
        .fail_with(RpcFailure::new("User rejected the request.").with_code(4001));

    assert!(harness.dispatcher.dispatch(transfer("0.1")).await.ok);
    let reply = harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await;
    assert!(!reply.ok);
    assert_eq!(reply.error_kind, Some("user_rejected"));
    assert_eq!(reply.message, "Transaction rejected in wallet.");

    assert_eq!(harness.dispatcher.session().await.slot, "empty");
    assert!(harness.dispatcher.cards().list().is_empty());
    let reply = harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await;
    assert_eq!(reply.error_kind, Some("no_pending_operation"));
}

#[tokio::test]
async fn test_unrelated_action_discards_pending() {
    let harness = Harness::connected().await;

    assert!(harness.dispatcher.dispatch(transfer("0.1")).await.ok);
    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("getGasPrice").with_param("networkName", "ethereum-sepolia"))
        .await;
    assert!(reply.ok);
    assert!(reply.message.contains("2 Gwei"));

    assert!(harness.dispatcher.session().await.pending.is_none());
    let reply = harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await;
    assert_eq!(reply.error_kind, Some("no_pending_operation"));
}

#[tokio::test]
async fn test_failed_preparation_keeps_nothing_pending() {
    let harness = Harness::connected().await;

    assert!(harness.dispatcher.dispatch(transfer("0.1")).await.ok);
    let reply = harness.dispatcher.dispatch(transfer("-1")).await;
    assert!(!reply.ok);
    assert_eq!(reply.error_kind, Some("validation"));
    assert!(harness.dispatcher.session().await.pending.is_none());
}

#[tokio::test]
async fn test_unresolved_parameters() {
    let harness = Harness::connected().await;

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("prepareTransaction").with_param("to", "error").with_param("amount", "1"))
        .await;
    assert_eq!(reply.message, "No recipient address specified for the transaction.");

    let reply = harness
        .dispatcher
        .dispatch(transfer("1").with_param("networkName", "error"))
        .await;
    assert!(reply.message.starts_with("Unsupported network specified."));
}

#[tokio::test]
async fn test_unparseable_request_keeps_pending() {
    let harness = Harness::connected().await;

    assert!(harness.dispatcher.dispatch(transfer("0.1")).await.ok);
    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("prepareTransaction").with_param("to", "error").with_param("amount", "1"))
        .await;
    assert!(!reply.ok);
    assert_eq!(reply.message, "No recipient address specified for the transaction.");

    let session = harness.dispatcher.session().await;
    assert_eq!(session.slot, "awaiting");
    match session.pending {
        Some(PendingOperation::NativeTransfer(op)) => assert_eq!(op.amount_decimal, "0.1"),
        other => panic!("unexpected pending operation: {other:?}"),
    }

    assert!(harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await.ok);
    assert_eq!(harness.wallet.requests().len(), 1);
    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_estimation_failures_show_not_available() {
    let harness = Harness::connected().await;

    *harness.chain.gas.lock().unwrap() = None;
    let reply = harness.dispatcher.dispatch(transfer("0.1")).await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.contains("Estimated Gas: n/a units"));
    assert!(reply.message.contains("Gas Price: 2 Gwei"));
    assert!(reply.message.contains("≈ Fee: n/a ETH"));
    assert!(reply.pending.is_some());

    *harness.chain.gas.lock().unwrap() = Some(21_000);
    *harness.chain.gas_price.lock().unwrap() = None;
    let reply = harness.dispatcher.dispatch(transfer("0.2")).await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.contains("Estimated Gas: 21000 units"));
    assert!(reply.message.contains("Gas Price: n/a Gwei"));
    assert!(reply.message.contains("≈ Fee: n/a ETH"));
    assert!(matches!(reply.pending, Some(PendingOperation::NativeTransfer(_))));
}

#[tokio::test]
async fn test_transfer_uses_connected_chain() {
    let harness = Harness::connected().await;

    let reply = harness
        .dispatcher
        .dispatch(
            ActionRequest::new("prepareTransaction")
                .with_param("to", recipient().to_string())
                .with_param("amount", "0.5"),
        )
        .await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.contains("on ethereum-sepolia"));
}

#[tokio::test]
async fn test_signing_without_wallet() {
    let harness = Harness::build(false).await;

    let reply = harness.dispatcher.dispatch(transfer("0.1")).await;
    assert_eq!(reply.error_kind, Some("wallet_unavailable"));

    let reply = harness
        .dispatcher
        .dispatch(transfer("0.1").with_param("address", account().to_string()))
        .await;
    assert!(reply.ok, "{}", reply.message);
    let reply = harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await;
    assert_eq!(reply.error_kind, Some("wallet_unavailable"));
    assert_eq!(harness.dispatcher.session().await.slot, "empty");
}

#[tokio::test]
async fn test_arity_error() {
    let harness = Harness::connected().await;
    harness.registry.insert(token_record());

    let reply = harness
        .dispatcher
        .dispatch(contract_call("transfer", json!([recipient().to_string()])))
        .await;
    assert!(!reply.ok);
    assert_eq!(reply.error_kind, Some("arity"));
    assert_eq!(reply.message, "Function 'transfer' expects 2 arguments, received 1.");
    assert!(harness.chain.calls().is_empty());
}

#[tokio::test]
async fn test_view_call_answers_without_pending() {
    let harness = Harness::connected().await;
    harness.registry.insert(token_record());
    harness.chain.push_call(Ok(word(42)));

    let reply = harness
        .dispatcher
        .dispatch(contract_call("balanceOf", json!([account().to_string()])))
        .await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.contains("Read-only function executed."));
    assert!(reply.message.contains("[#0] 42"));
    assert!(reply.pending.is_none());
    assert!(reply.content[1].starts_with(CONTRACT_CALL_PREFIX));
    assert!(reply.content[1].contains("\"contractRead\""));

    assert!(harness.dispatcher.session().await.pending.is_none());
    assert!(harness.dispatcher.cards().list().is_empty());
    assert!(harness.wallet.requests().is_empty());
}

#[tokio::test]
async fn test_contract_write_confirmed() {
    let harness = Harness::connected().await;
    harness.registry.insert(token_record());

    let reply = harness
        .dispatcher
        .dispatch(contract_call("transfer", json!([recipient().to_string(), "7"])))
        .await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.contains("Args (2): to="));
    assert!(reply.message.contains("Expected order: 0. to:address | 1. amount:uint256"));
    let Some(PendingOperation::ContractWrite(write)) = reply.pending else {
        panic!("expected a pending contract write");
    };
    assert_eq!(&write.encoded_data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);

    let reply = harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await;
    assert!(reply.ok, "{}", reply.message);

    // Simulated at preparation and again before signing.
    assert_eq!(harness.chain.calls().len(), 2);
    let requests = harness.wallet.requests();
    assert_eq!(requests[0].to, Some(token_address()));
    assert_eq!(requests[0].data.as_ref(), Some(&write.encoded_data));
    assert_eq!(requests[0].value, None);
    assert_eq!(requests[0].chain_id, None);

    let card = harness.dispatcher.cards().get(&reply.tx_hash.unwrap()).unwrap();
    assert_eq!(card.kind, CardKind::Contract);
    assert_eq!(card.title, "Invoking transfer() function");
    assert_eq!(card.detail, format!("Waiting confirmation on {}...", &token_address().to_string()[..10]));
    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_simulated_revert_is_reported() {
    let harness = Harness::connected().await;
    harness.registry.insert(token_record());
    harness.chain.push_call(Err(RpcFailure::new("execution reverted: insufficient balance").with_code(3)));

    let reply = harness
        .dispatcher
        .dispatch(contract_call("transfer", json!([recipient().to_string(), "7"])))
        .await;
    assert!(!reply.ok);
    assert_eq!(reply.error_kind, Some("simulated_revert"));
    assert_eq!(reply.message, "Contract call would revert: insufficient balance");
    assert!(reply.pending.is_none());
}

#[tokio::test]
async fn test_value_on_non_payable_function() {
    let harness = Harness::connected().await;
    harness.registry.insert(token_record());

    let reply = harness
        .dispatcher
        .dispatch(contract_call("transfer", json!([recipient().to_string(), "7"])).with_param("valueEth", "0.1"))
        .await;
    assert_eq!(reply.error_kind, Some("payability"));
    assert_eq!(reply.message, "Function 'transfer' is not payable; omit valueEth.");
}

#[tokio::test]
async fn test_payable_write_carries_value() {
    let harness = Harness::connected().await;
    harness.registry.insert(token_record());

    let reply = harness
        .dispatcher
        .dispatch(contract_call("deposit", json!([])).with_param("valueEth", "0.25"))
        .await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.contains("Value: 0.25 ETH"));
    assert_eq!(harness.chain.calls()[0].value, U256::from(250_000_000_000_000_000u64));

    assert!(harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await.ok);
    assert_eq!(
        harness.wallet.requests()[0].value,
        Some(U256::from(250_000_000_000_000_000u64))
    );
    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_ambiguous_contract_name() {
    let harness = Harness::connected().await;
    harness.registry.insert(token_record());
    let mut second = token_record();
    second.id = "2_00000002".to_string();
    second.contract_address = Some(Address::repeat_byte(0x44));
    harness.registry.insert(second);

    let reply = harness
        .dispatcher
        .dispatch(
            ActionRequest::new("prepareContractInteraction")
                .with_param("contractName", "token")
                .with_param("functionName", "balanceOf")
                .with_param("functionArgs", json!([account().to_string()])),
        )
        .await;
    assert_eq!(reply.error_kind, Some("ambiguous_target"));
    assert!(reply.message.starts_with("More than one contract matches."));
    assert_eq!(reply.message.matches("• Token @ ").count(), 2);
}

#[tokio::test]
async fn test_chain_switch_before_confirm() {
    let harness = Harness::connected().await;
    harness.registry.insert(token_record());

    assert!(
        harness
            .dispatcher
            .dispatch(contract_call("transfer", json!([recipient().to_string(), "7"])))
            .await
            .ok
    );
    harness.wallet.switch_chain(1);

    let reply = harness.dispatcher.dispatch(ActionRequest::new("confirmTransaction")).await;
    assert_eq!(reply.error_kind, Some("chain_mismatch"));
    assert!(harness.wallet.requests().is_empty());
    assert_eq!(harness.dispatcher.session().await.slot, "empty");
}

#[tokio::test]
async fn test_wallet_events_update_session() {
    let harness = Harness::connected().await;
    let session = harness.dispatcher.session().await;
    assert_eq!(session.account, Some(account()));
    assert_eq!(session.chain_id, Some(SEPOLIA));

    harness.wallet.switch_chain(84532);
    let mut switched = false;
    for _ in 0..100 {
        if harness.dispatcher.session().await.chain_id == Some(84532) {
            switched = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(switched);
    let session = harness.dispatcher.session().await;
    assert_eq!(session.network.map(|network| network.to_string()), Some("base-sepolia".to_string()));
    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_deploy_registers_contract_once_mined() {
    let harness = Harness::connected().await;

    let reply = harness
        .dispatcher
        .dispatch(
            ActionRequest::new("deploySC")
                .with_param("source", "contract Counter {}")
                .with_param("fileName", "Counter.sol")
                .with_param("constructorArgs", json!([5])),
        )
        .await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.starts_with("Deployment sent: "));
    assert!(reply.content[0].contains("Contract Counter compiled successfully."));
    assert!(reply.pending.is_none());

    let request = &harness.wallet.requests()[0];
    assert_eq!(request.to, None);
    assert_eq!(request.chain_id, Some(SEPOLIA));
    let init_code = request.data.clone().unwrap();
    assert_eq!(&init_code[..4], &[0x60, 0x80, 0x60, 0x40]);
    assert_eq!(init_code.len(), 4 + 32);
    assert_eq!(init_code[35], 5);

    let hash = reply.tx_hash.unwrap();
    let card = harness.dispatcher.cards().get(&hash).unwrap();
    assert_eq!(card.kind, CardKind::Deploy);
    assert_eq!(card.title, "Deploy Counter");

    let deployed = Address::repeat_byte(0x55);
    harness.chain.mine(hash, true, Some(deployed));
    assert!(eventually(|| !harness.registry.records().is_empty()).await);

    let record = &harness.registry.records()[0];
    assert_eq!(record.contract_address, Some(deployed));
    assert_eq!(record.deploy_tx_hash, Some(hash));
    assert_eq!(record.contract_name.as_deref(), Some("Counter"));
    assert_eq!(record.network_name.as_deref(), Some("ethereum-sepolia"));
    assert_eq!(record.user_address, Some(account()));
    assert_eq!(record.constructor_args, vec![json!(5)]);

    assert!(
        eventually(|| harness
            .dispatcher
            .cards()
            .get(&hash)
            .is_some_and(|card| card.detail == format!("Contract deployed at {deployed}")))
        .await
    );
    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_deploy_constructor_mismatch() {
    let harness = Harness::connected().await;

    let reply = harness
        .dispatcher
        .dispatch(
            ActionRequest::new("deploySC")
                .with_param("source", "contract Counter {}")
                .with_param("fileName", "Counter.sol"),
        )
        .await;
    assert_eq!(reply.error_kind, Some("argument_format"));
    assert_eq!(reply.message, "Constructor error: expected 1 arguments, received 0.");
    assert!(harness.wallet.requests().is_empty());
}

#[tokio::test]
async fn test_describe_and_list_contracts() {
    let harness = Harness::connected().await;

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("listDeployedContracts"))
        .await;
    assert_eq!(reply.message, "No deployed contracts found for the specified filters.");

    harness.registry.insert(token_record());
    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("listDeployedContracts").with_param("networkName", "ethereum-sepolia"))
        .await;
    assert!(reply.message.starts_with("Deployed Contracts:\n• Token @ "));

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("describeContracts").with_param("contractName", "Token"))
        .await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.contains("Functions: 3"));
    assert!(reply.message.contains("- transfer(address,uint256)"));
    assert!(reply.message.contains("Mutability: payable (value needed)"));
}

#[tokio::test]
async fn test_balance_of_session_account() {
    let harness = Harness::connected().await;

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("getBalance").with_param("networkName", "ethereum-sepolia"))
        .await;
    assert!(reply.ok, "{}", reply.message);
    assert_eq!(
        reply.message,
        format!("Current balance of {} on ethereum-sepolia (chainId: 11155111): 1 ETH", account())
    );
}

#[tokio::test]
async fn test_unknown_action() {
    let harness = Harness::connected().await;
    let reply = harness.dispatcher.dispatch(ActionRequest::new("launchRocket")).await;
    assert_eq!(reply.error_kind, Some("validation"));
    assert_eq!(reply.message, "Unknown action: launchRocket");
}

#[tokio::test]
async fn test_show_address() {
    let harness = Harness::connected().await;
    let reply = harness.dispatcher.dispatch(ActionRequest::new("showAddress")).await;
    assert!(reply.ok);
    assert_eq!(reply.message, format!("Your wallet address is: {}", account()));

    let harness = Harness::build(false).await;
    let reply = harness.dispatcher.dispatch(ActionRequest::new("showAddress")).await;
    assert_eq!(reply.message, "Your wallet address is: Unknown");
}

#[tokio::test]
async fn test_transaction_details() {
    let harness = Harness::connected().await;
    harness.chain.broadcast(tx_hash(0x42), Some(7));
    harness.chain.mine(tx_hash(0x42), true, None);

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("getTransactionDetails").with_param("hash", tx_hash(0x42).to_string()))
        .await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.starts_with("Transaction Details on ethereum-sepolia"));
    assert!(reply.message.contains(&format!("From: {}", account())));
    assert!(reply.message.contains("Value: 1.5 ETH"));
    assert!(reply.message.contains("Gas Price: 2 Gwei"));
    assert!(reply.message.contains("Gas Used: 21000"));
    assert!(reply.message.contains("Block: 7"));
    assert!(reply.message.ends_with("Status: Success"));

    harness.chain.broadcast(tx_hash(0x43), None);
    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("getTransactionDetails").with_param("hash", tx_hash(0x43).to_string()))
        .await;
    assert!(reply.message.contains("Gas Used: N/A"));
    assert!(reply.message.ends_with("Status: Pending"));

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("getTransactionDetails").with_param("hash", tx_hash(0x44).to_string()))
        .await;
    assert_eq!(reply.error_kind, Some("not_found"));

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("getTransactionDetails").with_param("hash", "0xdeadbeef"))
        .await;
    assert_eq!(reply.error_kind, Some("validation"));
    assert_eq!(reply.message, "Invalid or missing transaction hash.");
}

#[tokio::test]
async fn test_price_lookup() {
    let harness = Harness::connected().await;

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("getPrice").with_param("crypto", "eth"))
        .await;
    assert!(reply.ok, "{}", reply.message);
    assert_eq!(reply.message, "Current ETHEREUM Price:\n🇺🇸 USD: $3,245.68\n🇪🇺 EUR: €2,999.00");
    assert_eq!(
        harness.prices.requests.lock().unwrap()[0],
        ("ethereum".to_string(), vec!["usd".to_string(), "eur".to_string()])
    );

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("getPrice").with_param("crypto", "dogecoin"))
        .await;
    assert_eq!(reply.error_kind, Some("not_found"));
    assert!(reply.message.starts_with("Unsupported cryptocurrency: dogecoin."));
}

#[tokio::test]
async fn test_transaction_history() {
    let harness = Harness::connected().await;

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("getTransactions").with_param("networkName", "ethereum-sepolia"))
        .await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.starts_with("No transactions returned by the explorer"));
    assert!(reply
        .message
        .ends_with(&format!("Check on explorer: https://sepolia.etherscan.io/address/{}", account())));

    *harness.history.page.lock().unwrap() = Some(HistoryPage {
        source: HistorySource::Normal,
        entries: vec![HistoryEntry {
            hash: Some(tx_hash(0x42)),
            to: Some(recipient()),
            value: U256::from(10u64).pow(U256::from(18u64)),
            timestamp: Some(1_700_000_000),
            success: true,
        }],
        notice: None,
    });
    let reply = harness.dispatcher.dispatch(ActionRequest::new("getTransactions")).await;
    assert!(reply.ok, "{}", reply.message);
    assert!(reply.message.starts_with(&format!("Last 1 transactions of {}", account())));
    assert!(reply.message.contains("[2023-11-14 22:13:20 UTC] 1 ETH"));
    assert!(reply.message.contains(&format!("https://sepolia.etherscan.io/tx/{}", tx_hash(0x42))));
    assert_eq!(harness.history.requests.lock().unwrap()[1].2, 5);

    let reply = harness
        .dispatcher
        .dispatch(ActionRequest::new("getTransactions").with_param("networkName", "ganache"))
        .await;
    assert_eq!(reply.message, "Transaction history not supported on ganache.");
}
