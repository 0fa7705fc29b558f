//! Identifier recovery through the public API: inline decode, filter
//! fallback, and the hard stop when neither finds the event.

use sphere_ledger::{
    resolve_uploaded, Address, CredentialLedger, LedgerError, LedgerReceipt, MockLedger, U256,
};

fn fee() -> U256 {
    U256::from(sphere_core::CANONICAL_FEE_WEI)
}

#[tokio::test]
async fn inline_event_is_used_when_present() {
    let ledger = MockLedger::new().with_starting_id(42);
    let receipt = ledger
        .submit_upload(Address::repeat_byte(0x02), "https://gw/ipfs/QmA", fee())
        .await
        .unwrap();

    let event = resolve_uploaded(&ledger, &receipt).await.unwrap();
    assert_eq!(event.contract_id, 42);
    assert_eq!(event.ipfs_hash, "https://gw/ipfs/QmA");
    assert_eq!(event.fee, fee());
}

#[tokio::test]
async fn fallback_matches_by_transaction_hash_among_neighbours() {
    let ledger = MockLedger::new().with_starting_id(10);
    ledger.set_inline_logs(false);
    let org = Address::repeat_byte(0x02);
    let _before = ledger.submit_upload(org, "https://gw/ipfs/Qm1", fee()).await.unwrap();
    let target = ledger.submit_upload(org, "https://gw/ipfs/Qm2", fee()).await.unwrap();
    let _after = ledger.submit_upload(org, "https://gw/ipfs/Qm3", fee()).await.unwrap();

    let event = resolve_uploaded(&ledger, &target).await.unwrap();
    assert_eq!(event.contract_id, 11);
    assert_eq!(event.ipfs_hash, "https://gw/ipfs/Qm2");
}

#[tokio::test]
async fn receipt_without_any_event_is_a_hard_stop() {
    let ledger = MockLedger::new();
    let receipt = LedgerReceipt {
        transaction_hash: sphere_ledger::B256::repeat_byte(0x5a),
        block_number: Some(3),
        succeeded: true,
        logs: Vec::new(),
    };
    ledger.insert_receipt(receipt.clone());

    let fetched = ledger
        .transaction_receipt(receipt.transaction_hash)
        .await
        .unwrap()
        .unwrap();
    let err = resolve_uploaded(&ledger, &fetched).await.unwrap_err();
    assert!(matches!(err, LedgerError::MissingEvent { .. }));
}

#[tokio::test]
async fn receipt_without_block_skips_the_fallback() {
    let ledger = MockLedger::new();
    let receipt = LedgerReceipt {
        transaction_hash: sphere_ledger::B256::repeat_byte(0x5b),
        block_number: None,
        succeeded: true,
        logs: Vec::new(),
    };
    let err = resolve_uploaded(&ledger, &receipt).await.unwrap_err();
    assert!(matches!(err, LedgerError::MissingEvent { .. }));
}

#[tokio::test]
async fn on_chain_record_reflects_decline() {
    let ledger = MockLedger::new().with_starting_id(5);
    ledger
        .submit_upload(Address::repeat_byte(0x02), "https://gw/ipfs/QmD", fee())
        .await
        .unwrap();
    ledger.submit_verification(5, false, "illegible").await.unwrap();

    let record = ledger.certificate(5).await.unwrap();
    assert!(record.rejected);
    assert!(!record.verified);
    assert_eq!(record.comment, "illegible");
    assert_eq!(ledger.verifications().len(), 1);
}
