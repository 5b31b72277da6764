#[cfg(test)]
mod tests {
    use crate::blockchain::parser::{generate_summary, parse_transaction};
    use crate::blockchain::processor::{legacy_projection, process_transaction, TransactionContext};
    use crate::db::{block, parsed, raw_response, transaction, InsertOutcome};
    use crate::models::{NewBlock, ParsedTransactionInfo};
    use crate::tests::support::{credit, test_config, test_pool, transfer, MockChainClient, SUI};
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;
    use sqlx::SqlitePool;

    fn new_block(number: i64, hash: &str, timestamp_ms: i64) -> NewBlock {
        NewBlock {
            block_number: number,
            block_hash: hash.to_string(),
            timestamp_ms,
            transaction_count: 2,
            total_gas_used: "0".to_string(),
            total_gas_cost: "0".to_string(),
            block_data: Some(json!({ "digest": hash })),
        }
    }

    async fn store_parsed(pool: &SqlitePool, info: &ParsedTransactionInfo) -> InsertOutcome {
        parsed::insert_parsed(pool, info, &generate_summary(info), "mainnet")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_block_insert_is_idempotent() {
        let pool = test_pool().await;

        assert_eq!(block::get_max_block_number(&pool).await.unwrap(), None);

        let first = block::insert_block(&pool, &new_block(100, "hash-100", 1_000)).await.unwrap();
        let again = block::insert_block(&pool, &new_block(100, "hash-100", 1_000)).await.unwrap();
        let same_hash = block::insert_block(&pool, &new_block(101, "hash-100", 2_000)).await.unwrap();

        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(again, InsertOutcome::AlreadyExists);
        assert_eq!(same_hash, InsertOutcome::AlreadyExists);
        assert_eq!(block::count_blocks(&pool).await.unwrap(), 1);
        assert_eq!(block::get_max_block_number(&pool).await.unwrap(), Some(100));

        let stored = block::get_block_by_hash(&pool, "hash-100").await.unwrap().unwrap();
        assert_eq!(stored.block_number, 100);
        assert_eq!(stored.block_data, Some(json!({ "digest": "hash-100" })));
    }

    #[tokio::test]
    async fn test_block_listing_and_time_range() {
        let pool = test_pool().await;
        for n in 1..=5 {
            block::insert_block(&pool, &new_block(n, &format!("hash-{}", n), n * 1_000))
                .await
                .unwrap();
        }

        let (page, total) = block::list_blocks(&pool, 1, 2).await.unwrap();
        assert_eq!(total, 5);
        let numbers: Vec<i64> = page.iter().map(|b| b.block_number).collect();
        assert_eq!(numbers, vec![4, 3]);

        let latest = block::get_latest_blocks(&pool, 1).await.unwrap();
        assert_eq!(latest[0].block_number, 5);

        let start = DateTime::from_timestamp_millis(2_000).unwrap();
        let end = DateTime::from_timestamp_millis(4_000).unwrap();
        let in_range = block::get_blocks_by_time_range(&pool, start, end).await.unwrap();
        let numbers: Vec<i64> = in_range.iter().map(|b| b.block_number).collect();
        assert_eq!(numbers, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_parsed_insert_is_idempotent() {
        let pool = test_pool().await;
        let info = parse_transaction(&transfer("Digest1", "0xa", "0xb", 10, 1_000), 1).unwrap();

        assert_eq!(store_parsed(&pool, &info).await, InsertOutcome::Inserted);
        assert_eq!(store_parsed(&pool, &info).await, InsertOutcome::AlreadyExists);
        assert_eq!(parsed::count_parsed(&pool).await.unwrap(), 1);
        assert!(parsed::parsed_exists(&pool, "Digest1").await.unwrap());

        let stored = parsed::get_parsed_by_digest(&pool, "Digest1").await.unwrap().unwrap();
        assert_eq!(stored.info, info);
        assert_eq!(stored.network, "mainnet");
        assert_eq!(stored.summary, generate_summary(&info));
    }

    #[tokio::test]
    async fn test_membership_queries() {
        let pool = test_pool().await;
        let first = parse_transaction(&transfer("Digest1", "0xa", "0xb", 10, 1_000), 1).unwrap();
        let second = parse_transaction(&transfer("Digest2", "0xb", "0xc", 20, 2_000), 1).unwrap();
        let third = parse_transaction(&credit("Digest3", "0xd", "30", 3_000), 2).unwrap();
        for info in [&first, &second, &third] {
            store_parsed(&pool, info).await;
        }

        let (by_sender, total) = parsed::get_parsed_by_sender(&pool, "0xb", 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(by_sender[0].info.digest, "Digest2");

        let (received, total) = parsed::get_parsed_by_recipient(&pool, "0xc", 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(received[0].info.digest, "Digest2");

        let (involved, total) = parsed::get_parsed_by_involved_address(&pool, "0xb", 0, 10)
            .await
            .unwrap();
        assert_eq!(total, 2);
        // Newest first
        let digests: Vec<&str> = involved.iter().map(|p| p.info.digest.as_str()).collect();
        assert_eq!(digests, vec!["Digest2", "Digest1"]);

        let (none, total) = parsed::get_parsed_by_recipient(&pool, "0xzz", 0, 10).await.unwrap();
        assert!(none.is_empty());
        assert_eq!(total, 0);

        let (sui, total) = parsed::get_parsed_by_coin_type(&pool, SUI, 0, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(sui.len(), 2);

        let in_block = parsed::get_parsed_by_block(&pool, 1).await.unwrap();
        assert_eq!(in_block.len(), 2);
    }

    #[tokio::test]
    async fn test_grouped_counts_and_statistics() {
        let pool = test_pool().await;
        store_parsed(&pool, &parse_transaction(&transfer("D1", "0xa", "0xb", 1, 1_000), 1).unwrap()).await;
        store_parsed(&pool, &parse_transaction(&transfer("D2", "0xa", "0xb", 1, 2_000), 1).unwrap()).await;
        store_parsed(&pool, &parse_transaction(&credit("D3", "0xa", "1", 3_000), 1).unwrap()).await;

        let types = parsed::get_type_counts(&pool).await.unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].key, "SUI Transfer");
        assert_eq!(types[0].count, 2);
        assert_eq!(types[1].key, "Unknown (unknown)");
        assert_eq!(types[1].count, 1);

        let statuses = parsed::get_status_counts(&pool).await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].key, "success");
        assert_eq!(statuses[0].count, 3);

        let stats = parsed::get_statistics(&pool).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.latest_timestamp.map(|t| t.timestamp_millis()), Some(3_000));

        let (by_type, total) = parsed::get_parsed_by_type(&pool, "SUI Transfer", 0, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(by_type.len(), 2);
    }

    #[tokio::test]
    async fn test_token_activity() {
        let pool = test_pool().await;
        store_parsed(&pool, &parse_transaction(&transfer("D1", "0xa", "0xb", 100, 1_000), 1).unwrap()).await;
        store_parsed(&pool, &parse_transaction(&transfer("D2", "0xc", "0xa", 50, 2_000), 1).unwrap()).await;

        let tokens = parsed::get_token_activity_stats(&pool, SUI).await.unwrap();
        assert_eq!(tokens.transaction_count, 2);
        assert_eq!(tokens.total_volume, "300");
        assert_eq!(tokens.unique_addresses, 3);
    }

    #[tokio::test]
    async fn test_legacy_rows_skip_existing_digests() {
        let pool = test_pool().await;
        let first = legacy_projection(&transfer("D1", "0xa", "0xb", 1, 1_000), 9, "Sui Mainnet");
        let second = legacy_projection(&transfer("D2", "0xa", "0xb", 1, 1_000), 9, "Sui Mainnet");

        assert_eq!(
            transaction::add_transaction(&pool, &first).await.unwrap(),
            InsertOutcome::Inserted
        );
        transaction::add_transactions(&pool, &[first.clone(), second.clone()])
            .await
            .unwrap();
        assert_eq!(
            transaction::add_transaction(&pool, &second).await.unwrap(),
            InsertOutcome::AlreadyExists
        );

        assert_eq!(transaction::count_transactions_in_block(&pool, 9).await.unwrap(), 2);

        let stored = transaction::get_transaction_by_digest(&pool, "D1").await.unwrap().unwrap();
        assert_eq!(stored.status, "success");
        assert_eq!(stored.gas_used, "750000");
        assert_eq!(stored.sender.as_deref(), Some("0xa"));
        assert_eq!(stored.transaction_type, "Unknown");
    }

    #[tokio::test]
    async fn test_response_statistics_and_retention() {
        let pool = test_pool().await;
        let config = test_config();
        let mock = MockChainClient::with_latest(1);
        let now = Utc::now().timestamp_millis();
        let old = (Utc::now() - Duration::days(90)).timestamp_millis();
        mock.add_transaction(transfer("Fresh1", "0xa", "0xb", 1, now));
        mock.add_transaction(transfer("Fresh2", "0xa", "0xb", 1, now));
        mock.add_transaction(credit("Stale", "0xa", "1", old));

        let ctx = TransactionContext {
            client: &mock,
            pool: &pool,
            network: &config.network,
        };
        for digest in ["Fresh1", "Fresh2", "Stale"] {
            process_transaction(&ctx, digest, 1).await.unwrap();
        }

        let stats = raw_response::get_response_statistics(&pool).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.latest_timestamp.map(|t| t.timestamp_millis()), Some(now));
        assert!(stats.average_per_day >= 1);

        let (page, total) = raw_response::list_responses(&pool, 0, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(raw_response::get_responses_by_block(&pool, 1).await.unwrap().len(), 3);

        assert_eq!(raw_response::delete_older_than(&pool, 30).await.unwrap(), 1);
        assert_eq!(parsed::delete_older_than(&pool, 30).await.unwrap(), 1);
        assert!(!raw_response::response_exists(&pool, "Stale").await.unwrap());
        assert!(parsed::parsed_exists(&pool, "Fresh1").await.unwrap());
    }
}
