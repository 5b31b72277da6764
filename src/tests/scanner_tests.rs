#[cfg(test)]
mod tests {
    use crate::blockchain::client::{parse_sequence_number, ChainClient};
    use crate::blockchain::processor::{process_transaction, ProcessOutcome, TransactionContext};
    use crate::blockchain::scanner::{self, BlockOutcome, ScanState, Scanner, ScannerError, TickOutcome};
    use crate::db::{block, parsed, raw_response, transaction, wallet};
    use crate::models::BalanceChangeType;
    use crate::config::Config;
    use crate::tests::support::{checkpoint, credit, test_config, test_pool, transfer, MockChainClient};
    use serde_json::{json, Value};
    use sqlx::SqlitePool;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;

    const TS: i64 = 1_700_000_000_000;

    fn scanner_with(mock: &Arc<MockChainClient>, pool: &SqlitePool) -> Scanner {
        scanner_with_config(mock, pool, &test_config())
    }

    fn scanner_with_config(mock: &Arc<MockChainClient>, pool: &SqlitePool, config: &Config) -> Scanner {
        let client: Arc<dyn ChainClient> = mock.clone();
        Scanner::new(client, pool.clone(), config)
    }

    /// Checkpoint 100 holding `count` transfers from 0xa11ce.
    fn seed_transfers(mock: &MockChainClient, count: usize) -> Vec<String> {
        let digests: Vec<String> = (0..count).map(|i| format!("Transfer{}", i)).collect();
        for (i, digest) in digests.iter().enumerate() {
            mock.add_transaction(transfer(digest, "0xa11ce", &format!("0xb{}", i), 10, TS));
        }
        let refs: Vec<&str> = digests.iter().map(String::as_str).collect();
        mock.add_checkpoint(100, checkpoint(100, TS, &refs));
        digests
    }

    /// Checkpoint 100 holding a transfer and a single credit to 0xA.
    fn seed_checkpoint_100(mock: &MockChainClient) {
        mock.add_checkpoint(100, checkpoint(100, TS, &["Transfer100", "Credit100"]));
        mock.add_transaction(transfer("Transfer100", "0xa11ce", "0xb0b", 7, TS));
        mock.add_transaction(credit("Credit100", "0xA", "5000000000", TS));
    }

    async fn row_counts(pool: &SqlitePool) -> (i64, i64, i64, i64) {
        (
            block::count_blocks(pool).await.unwrap(),
            parsed::count_parsed(pool).await.unwrap(),
            raw_response::count_responses(pool).await.unwrap(),
            transaction::count_transactions_in_block(pool, 100).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn test_initialize_starts_from_chain_tip_when_empty() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(5_000));
        let scanner = scanner_with(&mock, &pool);

        assert_eq!(scanner.initialize().await.unwrap(), 5_000);
        assert_eq!(scanner.last_processed_block(), 5_000);
        assert_eq!(scanner.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn test_initialize_resumes_from_stored_blocks() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(5_000));
        seed_checkpoint_100(&mock);
        let scanner = scanner_with(&mock, &pool);
        scanner.process_block(100).await.unwrap();

        assert_eq!(scanner.initialize().await.unwrap(), 100);
        assert_eq!(mock.latest_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_initialize_gives_up_after_bounded_retries() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::default());
        let scanner = scanner_with(&mock, &pool);

        let err = scanner.initialize().await.unwrap_err();

        assert!(matches!(err, ScannerError::Initialization { attempts: 3, .. }));
        assert_eq!(mock.latest_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cursor_advances_once_per_tick_even_on_failure() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        seed_checkpoint_100(&mock);
        // 101 and 102 are missing on the node
        mock.add_checkpoint(103, checkpoint(103, TS + 3_000, &[]));
        let scanner = scanner_with(&mock, &pool);
        let c0 = scanner.initialize().await.unwrap();

        for _ in 0..4 {
            scanner.tick().await;
        }

        assert_eq!(scanner.last_processed_block(), c0 + 4);
        assert!(block::block_exists(&pool, 100).await.unwrap());
        assert!(!block::block_exists(&pool, 101).await.unwrap());
        assert!(!block::block_exists(&pool, 102).await.unwrap());
        assert!(block::block_exists(&pool, 103).await.unwrap());
        assert_eq!(scanner.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn test_failed_fetch_reports_error_and_writes_nothing() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(10));
        let scanner = scanner_with(&mock, &pool);
        scanner.initialize().await.unwrap();

        match scanner.tick().await {
            TickOutcome::Ran { block_number, result } => {
                assert_eq!(block_number, 11);
                assert!(matches!(result, Err(ScannerError::CheckpointFetch { number: 11, .. })));
            }
            TickOutcome::Skipped => panic!("tick should have run"),
        }
        assert_eq!(scanner.last_processed_block(), 11);
        assert_eq!(block::count_blocks(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_checkpoint_100_is_fully_ingested() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        seed_checkpoint_100(&mock);
        let scanner = scanner_with(&mock, &pool);
        scanner.initialize().await.unwrap();

        let outcome = match scanner.tick().await {
            TickOutcome::Ran { result, .. } => result.unwrap(),
            TickOutcome::Skipped => panic!("tick should have run"),
        };
        assert_eq!(outcome, BlockOutcome::Processed { transactions: 2, saved: 2 });

        let stored = block::get_block_by_number(&pool, 100).await.unwrap().unwrap();
        assert_eq!(stored.block_hash, "checkpoint-digest-100");
        assert_eq!(stored.transaction_count, 2);
        assert_eq!(stored.timestamp.timestamp_millis(), TS);
        let data = stored.block_data.unwrap();
        assert_eq!(data["version"], "1.0");
        assert_eq!(data["sequenceNumber"], "100");
        assert!(data.get("processedAt").is_some());

        let credited = parsed::get_parsed_by_digest(&pool, "Credit100").await.unwrap().unwrap();
        assert_eq!(credited.info.block_number, 100);
        assert_eq!(credited.info.recipients, vec!["0xA"]);
        assert_eq!(credited.info.tokens[0].symbol, "SUI");
        let change = &credited.info.balance_changes[0];
        assert_eq!(change.owner, "0xA");
        assert_eq!(change.amount, "5000000000");
        assert_eq!(change.change_type, BalanceChangeType::Increase);
        assert_eq!(change.symbol, "SUI");
        assert_eq!(credited.network, "mainnet");

        let raw = raw_response::get_response_by_digest(&pool, "Credit100").await.unwrap().unwrap();
        assert_eq!(raw.block_number, 100);
        assert_eq!(raw.checkpoint.as_deref(), Some("100"));
        let metadata = raw.metadata.unwrap();
        assert_eq!(metadata.version, "1.0");
        assert_eq!(metadata.network, "mainnet");

        assert!(transaction::transaction_exists(&pool, "Transfer100").await.unwrap());
        assert!(wallet::get_wallet(&pool, "0xA").await.unwrap().is_some());
        assert!(wallet::get_wallet(&pool, "0xb0b").await.unwrap().is_some());
        assert_eq!(row_counts(&pool).await, (1, 2, 2, 2));
    }

    #[tokio::test]
    async fn test_reingesting_checkpoint_writes_no_duplicates() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        seed_checkpoint_100(&mock);
        let scanner = scanner_with(&mock, &pool);

        scanner.process_block(100).await.unwrap();
        let before = row_counts(&pool).await;
        let fetches = mock.transaction_fetches.load(Ordering::SeqCst);
        let wallet_before = wallet::get_wallet(&pool, "0xA").await.unwrap().unwrap();

        assert_eq!(scanner.process_block(100).await.unwrap(), BlockOutcome::AlreadyProcessed);

        assert_eq!(row_counts(&pool).await, before);
        assert_eq!(mock.transaction_fetches.load(Ordering::SeqCst), fetches);
        let wallet_after = wallet::get_wallet(&pool, "0xA").await.unwrap().unwrap();
        assert_eq!(wallet_after.transaction_count, wallet_before.transaction_count);
    }

    #[tokio::test]
    async fn test_processed_digest_is_not_fetched_again() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        seed_checkpoint_100(&mock);
        let config = test_config();
        let ctx = TransactionContext {
            client: mock.as_ref(),
            pool: &pool,
            network: &config.network,
        };

        let first = process_transaction(&ctx, "Credit100", 100).await.unwrap();
        assert!(matches!(first, ProcessOutcome::Processed(_)));

        let second = process_transaction(&ctx, "Credit100", 100).await.unwrap();
        assert!(matches!(second, ProcessOutcome::AlreadyProcessed));
        assert_eq!(mock.transaction_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(parsed::count_parsed(&pool).await.unwrap(), 1);
        assert_eq!(raw_response::count_responses(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failing_transaction_does_not_block_checkpoint() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        mock.add_checkpoint(100, checkpoint(100, TS, &["Credit100", "MissingDigest"]));
        mock.add_transaction(credit("Credit100", "0xA", "1", TS));
        let scanner = scanner_with(&mock, &pool);

        let outcome = scanner.process_block(100).await.unwrap();

        assert_eq!(outcome, BlockOutcome::Processed { transactions: 2, saved: 1 });
        assert!(block::block_exists(&pool, 100).await.unwrap());
        assert!(parsed::parsed_exists(&pool, "Credit100").await.unwrap());
        assert!(!raw_response::response_exists(&pool, "MissingDigest").await.unwrap());
    }

    #[tokio::test]
    async fn test_unsanitizable_checkpoint_is_stored_with_minimal_payload() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        seed_transfers(&mock, 1);
        let mut deep = json!("leaf");
        for _ in 0..80 {
            deep = Value::Array(vec![deep]);
        }
        let mut cp = checkpoint(100, TS, &["Transfer0"]);
        cp.extra.insert("nested".to_string(), deep);
        mock.add_checkpoint(100, cp);
        let scanner = scanner_with(&mock, &pool);

        let outcome = scanner.process_block(100).await.unwrap();

        assert_eq!(outcome, BlockOutcome::Processed { transactions: 1, saved: 1 });
        let stored = block::get_block_by_number(&pool, 100).await.unwrap().unwrap();
        let data = stored.block_data.unwrap();
        let mut keys: Vec<&str> = data.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["digest", "processedAt", "timestampMs", "transactionCount", "version"]
        );
        assert_eq!(data["digest"], "checkpoint-digest-100");
        assert_eq!(data["transactionCount"], 1);
        assert!(parsed::parsed_exists(&pool, "Transfer0").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_transaction_processing_saves_every_digest() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        let digests = seed_transfers(&mock, 5);
        let config = Config {
            tx_concurrency: 3,
            ..test_config()
        };
        let scanner = scanner_with_config(&mock, &pool, &config);

        let outcome = scanner.process_block(100).await.unwrap();

        assert_eq!(outcome, BlockOutcome::Processed { transactions: 5, saved: 5 });
        assert_eq!(mock.transaction_fetches.load(Ordering::SeqCst), 5);
        assert_eq!(parsed::count_parsed(&pool).await.unwrap(), 5);
        assert_eq!(raw_response::count_responses(&pool).await.unwrap(), 5);
        assert_eq!(transaction::count_transactions_in_block(&pool, 100).await.unwrap(), 5);
        for digest in &digests {
            assert!(transaction::transaction_exists(&pool, digest).await.unwrap());
        }
        let sender = wallet::get_wallet(&pool, "0xa11ce").await.unwrap().unwrap();
        assert_eq!(sender.sent_transaction_count, 5);
    }

    #[tokio::test]
    async fn test_failed_batch_falls_back_to_single_inserts() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        seed_transfers(&mock, 3);
        sqlx::query(
            "CREATE TRIGGER reject_transfer1 BEFORE INSERT ON transactions \
             WHEN NEW.digest = 'Transfer1' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&pool)
        .await
        .unwrap();
        let scanner = scanner_with(&mock, &pool);

        let outcome = scanner.process_block(100).await.unwrap();

        assert_eq!(outcome, BlockOutcome::Processed { transactions: 3, saved: 2 });
        assert!(transaction::transaction_exists(&pool, "Transfer0").await.unwrap());
        assert!(!transaction::transaction_exists(&pool, "Transfer1").await.unwrap());
        assert!(transaction::transaction_exists(&pool, "Transfer2").await.unwrap());
        assert_eq!(parsed::count_parsed(&pool).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_tick_is_skipped_while_another_is_running() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        seed_checkpoint_100(&mock);
        let gate = Arc::new(Notify::new());
        mock.hold_checkpoints(gate.clone());
        let scanner = Arc::new(scanner_with(&mock, &pool));
        scanner.initialize().await.unwrap();

        let running = tokio::spawn({
            let scanner = scanner.clone();
            async move { scanner.tick().await }
        });
        tokio::time::timeout(Duration::from_secs(5), async {
            while scanner.state() != ScanState::Scanning {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("first tick never started");

        assert!(matches!(scanner.tick().await, TickOutcome::Skipped));
        assert!(scanner.get_status().is_scanning);
        assert_eq!(scanner.last_processed_block(), 99);

        gate.notify_one();
        let outcome = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("first tick did not finish")
            .unwrap();
        assert!(matches!(outcome, TickOutcome::Ran { block_number: 100, result: Ok(_) }));
        assert_eq!(scanner.last_processed_block(), 100);
        assert_eq!(scanner.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn test_stop_start_and_reset() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        seed_checkpoint_100(&mock);
        let scanner = scanner_with(&mock, &pool);
        scanner.initialize().await.unwrap();

        scanner.stop();
        assert_eq!(scanner.state(), ScanState::Stopped);
        assert!(matches!(scanner.tick().await, TickOutcome::Skipped));
        assert_eq!(scanner.last_processed_block(), 99);

        assert!(scanner.start());
        assert!(!scanner.start());
        scanner.tick().await;
        scanner.tick().await;
        assert_eq!(scanner.last_processed_block(), 101);

        // Highest stored block is 100, so reset rewinds to it
        scanner.stop();
        assert_eq!(scanner.reset().await.unwrap(), 100);
        assert_eq!(scanner.state(), ScanState::Idle);
        assert_eq!(scanner.last_processed_block(), 100);

        let status = scanner.get_status();
        assert!(!status.is_scanning);
        assert_eq!(status.last_processed_block, 100);
        assert_eq!(status.network.name, "mainnet");
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let pool = test_pool().await;
        let mock = Arc::new(MockChainClient::with_latest(99));
        seed_checkpoint_100(&mock);
        let scanner = Arc::new(scanner_with(&mock, &pool));
        scanner.initialize().await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(scanner.clone().run(Duration::from_millis(5), shutdown.clone()));

        tokio::time::timeout(Duration::from_secs(5), async {
            while !block::block_exists(&pool, 100).await.unwrap() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("checkpoint 100 was never stored");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scanner did not stop")
            .unwrap();
        assert!(scanner.last_processed_block() >= 100);
    }

    #[tokio::test]
    async fn test_connection_report() {
        let config = test_config();
        let mock = MockChainClient::with_latest(42);

        let report = scanner::test_connection(&mock, &config.network).await;
        assert!(report.success);
        assert_eq!(report.latest_checkpoint, Some(42));
        assert_eq!(report.epoch.as_deref(), Some("512"));
        assert_eq!(report.protocol_version.as_deref(), Some("70"));
        assert!(report.error.is_none());

        mock.set_latest(None);
        let report = scanner::test_connection(&mock, &config.network).await;
        assert!(!report.success);
        assert!(report.error.is_some());
        assert_eq!(report.rpc_url, config.network.rpc_url);
    }

    #[test]
    fn test_fallback_payload_is_minimal() {
        let cp = checkpoint(7, TS, &["a", "b"]);

        let payload = scanner::fallback_payload(&cp);

        assert_eq!(payload["digest"], "checkpoint-digest-7");
        assert_eq!(payload["transactionCount"], 2);
        assert_eq!(payload["version"], "1.0");
        assert!(payload.get("epochRollingGasCostSummary").is_none());
    }

    #[test]
    fn test_sequence_numbers_accept_strings_and_numbers() {
        assert_eq!(parse_sequence_number(&json!("123456")).unwrap(), 123_456);
        assert_eq!(parse_sequence_number(&json!(42)).unwrap(), 42);
        assert!(parse_sequence_number(&json!("-1")).is_err());
        assert!(parse_sequence_number(&json!(null)).is_err());
    }
}
