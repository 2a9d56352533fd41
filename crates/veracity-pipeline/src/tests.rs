//! Integration tests for the pipeline

#[cfg(test)]
mod tests {
    use crate::{
        extraction_fn, verification_fn, CancellationToken, ChunkUnit, CollaboratorError,
        LlmExtractor, LlmVerifier, Pipeline, PipelineConfig, PipelineError, PipelineStage,
        RunOutcome, WorkflowStage,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use veracity_domain::traits::FactRepository;
    use veracity_domain::{
        CandidateFact, Chunk, ChunkStats, ChunkStatus, Document, Fact, FactKey, FactStats,
        Verdict, VerificationStatus,
    };
    use veracity_llm::MockProvider;
    use veracity_store::SqliteStore;

    fn config() -> PipelineConfig {
        PipelineConfig {
            collaborator_timeout_secs: 5,
            ..Default::default()
        }
    }

    /// Five-word chunks with no overlap
    fn small_chunks() -> PipelineConfig {
        PipelineConfig {
            chunk_size: 5,
            chunk_overlap: 0,
            ..config()
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn llm_pipeline(
        store: &Arc<SqliteStore>,
        extractor: &MockProvider,
        verifier: &MockProvider,
        config: PipelineConfig,
    ) -> Pipeline<SqliteStore, LlmExtractor<MockProvider>, LlmVerifier<MockProvider>> {
        Pipeline::new(
            Arc::clone(store),
            LlmExtractor::new(Arc::new(extractor.clone())),
            LlmVerifier::new(Arc::new(verifier.clone())),
            config,
        )
        .unwrap()
    }

    fn accept_all() -> MockProvider {
        MockProvider::new(r#"{"accepted": true, "reason": null}"#)
    }

    #[tokio::test]
    async fn test_full_run_records_facts() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = MockProvider::new(
            r#"["Water boils at 100C at sea level.", "The moon orbits the earth."]"#,
        );
        let verifier = accept_all();
        let pipeline = llm_pipeline(&store, &extractor, &verifier, config());

        let document = Document::new(
            "science",
            "Water boils at 100C at sea level. The moon orbits the earth.",
        );
        let report = pipeline
            .run_document(document, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.final_stage, WorkflowStage::Done);
        assert_eq!(report.document, "science");
        assert_eq!(report.counters.chunks_created, 1);
        assert_eq!(report.counters.extraction_calls, 1);
        assert_eq!(report.counters.verification_calls, 2);
        assert_eq!(report.stats, FactStats::new(2, 0, 0));
        assert_eq!(report.chunk_stats.processed, 1);
        assert!(report.is_complete());
        let statements: Vec<&str> = report.facts.iter().map(|f| f.statement.as_str()).collect();
        assert_eq!(
            statements,
            vec!["Water boils at 100C at sea level.", "The moon orbits the earth."]
        );
        assert!(report.facts.iter().all(|f| !f.is_rejected()));

        let chunk = store.get_chunk("science", 0).unwrap().unwrap();
        assert_eq!(chunk.status, ChunkStatus::Processed);
        assert!(chunk.contains_facts);
    }

    #[tokio::test]
    async fn test_second_run_makes_no_calls() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = MockProvider::new(r#"["Fact from a chunk."]"#);
        let verifier = accept_all();
        let pipeline = llm_pipeline(&store, &extractor, &verifier, small_chunks());
        let document = Document::new("report", words(23));

        let first = pipeline
            .run_document(document.clone(), &CancellationToken::new())
            .await
            .unwrap();
        let chunks_before = store.list_chunks(Some("report")).unwrap();
        let facts_before = store
            .list_facts(Some("report"), VerificationStatus::Verified)
            .unwrap();

        extractor.reset_call_count();
        verifier.reset_call_count();

        let second = pipeline
            .run_document(document, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(extractor.call_count(), 0);
        assert_eq!(verifier.call_count(), 0);
        assert!(second.is_noop());
        assert!(second.facts.is_empty());
        assert_eq!(second.counters.chunks_created, 0);
        assert_eq!(second.counters.chunks_skipped, chunks_before.len());
        assert_eq!(second.stats, first.stats);
        assert_eq!(store.list_chunks(Some("report")).unwrap(), chunks_before);
        assert_eq!(
            store
                .list_facts(Some("report"), VerificationStatus::Verified)
                .unwrap(),
            facts_before
        );
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_one_failing_chunk_does_not_stop_the_run() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = MockProvider::new(r#"["Fact from a chunk."]"#).with_error("corrupted");
        let verifier = accept_all();
        let pipeline = llm_pipeline(&store, &extractor, &verifier, small_chunks());

        // Four chunks; the third holds the poisoned word
        let text = words(20).replace("w12", "corrupted");
        let report = pipeline
            .run_document(Document::new("report", text.clone()), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.chunk_failures.len(), 1);
        assert_eq!(report.chunk_failures[0].chunk_index, 2);
        assert_eq!(
            report.chunk_stats,
            ChunkStats {
                total: 4,
                pending: 0,
                processing: 0,
                processed: 3,
                failed: 1,
            }
        );
        assert_eq!(report.stats.verified, 3);
        assert!(!report.is_complete());

        let failed = store.get_chunk("report", 2).unwrap().unwrap();
        assert_eq!(failed.status, ChunkStatus::Failed);
        assert!(failed.error_message.is_some());

        // Next run retries only the failed chunk
        extractor.clear_rules();
        extractor.reset_call_count();
        let retry = pipeline
            .run_document(Document::new("report", text), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(extractor.call_count(), 1);
        assert_eq!(retry.counters.chunks_skipped, 3);
        assert_eq!(retry.chunk_stats.processed, 4);
        assert_eq!(retry.stats.verified, 4);
        assert!(retry.is_complete());
    }

    #[tokio::test]
    async fn test_empty_extraction_marks_chunk_processed() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = MockProvider::new("[]");
        let verifier = accept_all();
        let pipeline = llm_pipeline(&store, &extractor, &verifier, config());

        let report = pipeline
            .run_document(
                Document::new("opinion", "I think this is lovely."),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let chunk = store.get_chunk("opinion", 0).unwrap().unwrap();
        assert_eq!(chunk.status, ChunkStatus::Processed);
        assert!(!chunk.contains_facts);
        assert_eq!(report.stats, FactStats::default());
        assert_eq!(verifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_candidate_only_in_rejected_store() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = MockProvider::new(r#"["The moon is made of cheese."]"#);
        let verifier =
            MockProvider::new(r#"{"accepted": false, "reason": "unsupported by source"}"#);
        let pipeline = llm_pipeline(&store, &extractor, &verifier, config());

        let report = pipeline
            .run_document(Document::new("moon", "The moon is rock."), &CancellationToken::new())
            .await
            .unwrap();

        let rejected = store
            .list_facts(Some("moon"), VerificationStatus::Rejected)
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].statement, "The moon is made of cheese.");
        assert_eq!(
            rejected[0].verification_reason.as_deref(),
            Some("unsupported by source")
        );
        assert!(store
            .list_facts(Some("moon"), VerificationStatus::Verified)
            .unwrap()
            .is_empty());
        assert_eq!(report.counters.facts_rejected, 1);
        assert_eq!(report.stats, FactStats::new(0, 1, 0));
    }

    #[tokio::test]
    async fn test_stats_add_up_and_failed_verification_is_retried() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = extraction_fn(|_, _| {
            Ok(vec![
                "A is true.".to_string(),
                "B is false.".to_string(),
                "C breaks the verifier.".to_string(),
            ])
        });
        let flaky = verification_fn(|statement, _| match statement.chars().next() {
            Some('A') => Ok(Verdict::accept()),
            Some('B') => Ok(Verdict::reject("contradicted by source")),
            _ => Err(CollaboratorError::Call("connection reset".to_string())),
        });
        let pipeline = Pipeline::new(Arc::clone(&store), extractor, flaky, config()).unwrap();
        let document = Document::new("letters", "A is true. B is true. C is true.");

        let report = pipeline
            .run_document(document.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.stats, FactStats::new(1, 1, 1));
        assert_eq!(
            report.stats.total,
            report.stats.verified + report.stats.rejected + report.stats.pending
        );
        assert_eq!(report.fact_failures.len(), 1);
        assert_eq!(report.fact_failures[0].statement, "C breaks the verifier.");
        // The chunk itself succeeded
        assert_eq!(report.chunk_stats.processed, 1);
        assert!(report.chunk_failures.is_empty());

        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let steady = verification_fn(move |_, _| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Verdict::accept())
        });
        let extract_calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let extract_counter = Arc::clone(&extract_calls);
        let extractor = extraction_fn(move |_, _| {
            extract_counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![])
        });
        let pipeline = Pipeline::new(Arc::clone(&store), extractor, steady, config()).unwrap();

        let retry = pipeline
            .run_document(document, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(extract_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(retry.stats, FactStats::new(2, 1, 0));
    }

    #[tokio::test]
    async fn test_already_rejected_statement_is_not_reverified() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .upsert_chunk(&Chunk::new("doc", 0, "Old text.", 1).processed(true, 2))
            .unwrap();
        store
            .append_fact(&Fact::from_verdict(
                &CandidateFact::new("doc", 0, "Same claim."),
                Verdict::reject("unsupported by source"),
                3,
            ))
            .unwrap();
        store
            .upsert_chunk(&Chunk::new("doc", 0, "Old text.", 1))
            .unwrap();

        let verifier = accept_all();
        let pipeline = llm_pipeline(
            &store,
            &MockProvider::new(r#"["Same claim."]"#),
            &verifier,
            config(),
        );

        let report = pipeline
            .run_document(Document::new("doc", "Old text."), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(verifier.call_count(), 0);
        assert_eq!(report.stats, FactStats::new(0, 1, 0));
        let key = FactKey {
            document_name: "doc".to_string(),
            source_chunk: 0,
            statement: "Same claim.".to_string(),
        };
        assert!(store.find_fact(&key).unwrap().unwrap().is_rejected());
    }

    #[tokio::test]
    async fn test_extraction_timeout_is_a_chunk_failure() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = MockProvider::new("[]").with_delay(Duration::from_millis(1500));
        let pipeline = llm_pipeline(
            &store,
            &extractor,
            &accept_all(),
            PipelineConfig {
                collaborator_timeout_secs: 1,
                ..config()
            },
        );

        let report = pipeline
            .run_document(Document::new("slow", "Some text."), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(matches!(
            report.chunk_failures[0].error,
            CollaboratorError::Timeout(_)
        ));
        assert_eq!(report.chunk_stats.failed, 1);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_chunks_pending() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let extractor = extraction_fn(move |_, _| {
            trigger.cancel();
            std::thread::sleep(Duration::from_millis(50));
            Ok(vec!["Too late.".to_string()])
        });
        let pipeline = Pipeline::new(
            Arc::clone(&store),
            extractor,
            verification_fn(|_, _| Ok(Verdict::accept())),
            PipelineConfig {
                max_concurrent_chunks: 1,
                ..small_chunks()
            },
        )
        .unwrap();
        let document = Document::new("halted", words(15));

        let report = pipeline.run_document(document.clone(), &cancel).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.final_stage, WorkflowStage::Extracting);
        assert_eq!(report.chunk_stats.pending, 3);
        assert_eq!(report.chunk_stats.processed, 0);
        assert_eq!(report.stats.total, 0);

        // A fresh run picks the work back up
        let pipeline = Pipeline::new(
            Arc::clone(&store),
            extraction_fn(|_, _| Ok(vec!["Resumed.".to_string()])),
            verification_fn(|_, _| Ok(Verdict::accept())),
            small_chunks(),
        )
        .unwrap();
        let resumed = pipeline
            .run_document(document, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resumed.outcome, RunOutcome::Completed);
        assert_eq!(resumed.chunk_stats.processed, 3);
        assert_eq!(resumed.stats.verified, 3);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = MockProvider::new("[]");
        let pipeline = llm_pipeline(&store, &extractor, &accept_all(), config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = pipeline
            .run_document(Document::new("never", "Some text."), &cancel)
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.final_stage, WorkflowStage::Start);
        assert_eq!(extractor.call_count(), 0);
        assert!(store.list_chunks(Some("never")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_two_thousand_word_document() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let pipeline = llm_pipeline(&store, &MockProvider::new("[]"), &accept_all(), config());
        let text = words(2000);

        let report = pipeline
            .run_document(Document::new("long", text.clone()), &CancellationToken::new())
            .await
            .unwrap();

        let chunks = store.list_chunks(Some("long")).unwrap();
        assert_eq!(report.counters.chunks_created, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0].content.split_whitespace().collect();
            let next: Vec<&str> = pair[1].content.split_whitespace().collect();
            assert_eq!(&prev[prev.len() - 50..], &next[..50]);
        }

        let mut covered: Vec<&str> = Vec::new();
        for chunk in &chunks {
            for word in chunk.content.split_whitespace() {
                if covered.last().map_or(true, |last| word_index(last) < word_index(word)) {
                    covered.push(word);
                }
            }
        }
        assert_eq!(covered.join(" "), text);
    }

    fn word_index(word: &str) -> usize {
        word.trim_start_matches('w').parse().unwrap()
    }

    #[tokio::test]
    async fn test_rechunk_is_noop_unless_forced() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = MockProvider::new(r#"["Kept fact."]"#);
        let pipeline = llm_pipeline(&store, &extractor, &accept_all(), small_chunks());

        pipeline
            .run_document(Document::new("draft", words(10)), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.list_chunks(Some("draft")).unwrap().len(), 2);

        // Same name, new text: existing chunks win
        let report = pipeline
            .run_document(Document::new("draft", words(20)), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.counters.chunks_created, 0);
        assert_eq!(store.list_chunks(Some("draft")).unwrap().len(), 2);

        let forced = llm_pipeline(
            &store,
            &extractor,
            &accept_all(),
            PipelineConfig {
                force_rechunk: true,
                ..small_chunks()
            },
        );
        let report = forced
            .run_document(Document::new("draft", words(20)), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.counters.chunks_created, 4);
        assert_eq!(store.list_chunks(Some("draft")).unwrap().len(), 4);
        // Facts for chunks 0 and 1 survive and are not duplicated
        assert_eq!(report.stats.verified, 4);
    }

    #[tokio::test]
    async fn test_empty_document_has_no_chunks() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = MockProvider::new("[]");
        let pipeline = llm_pipeline(&store, &extractor, &accept_all(), config());

        let report = pipeline
            .run_document(Document::new("blank", ""), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.chunk_stats, ChunkStats::default());
        assert_eq!(extractor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_runs_write_each_fact_once() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let pipeline = llm_pipeline(
            &store,
            &MockProvider::new(r#"["Shared fact one.", "Shared fact two."]"#),
            &accept_all(),
            config(),
        );
        let document = Document::new("shared", "Shared text.");
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(
            pipeline.run_document(document.clone(), &cancel),
            pipeline.run_document(document.clone(), &cancel),
        );
        a.unwrap();
        b.unwrap();

        let verified = store
            .list_facts(Some("shared"), VerificationStatus::Verified)
            .unwrap();
        assert_eq!(verified.len(), 2);
        assert_eq!(store.get_stats(Some("shared")).unwrap(), FactStats::new(2, 0, 0));
    }

    #[tokio::test]
    async fn test_run_documents_keeps_input_order() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let pipeline = llm_pipeline(
            &store,
            &MockProvider::new(r#"["A fact."]"#),
            &accept_all(),
            PipelineConfig {
                max_concurrent_documents: 2,
                ..config()
            },
        );
        let documents = vec![
            Document::new("gamma", "Third."),
            Document::new("alpha", "First."),
            Document::new("beta", "Second."),
        ];

        let results = pipeline
            .run_documents(documents, &CancellationToken::new())
            .await;

        let names: Vec<&str> = results.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["gamma", "alpha", "beta"]);
        for (name, result) in &results {
            let report = result.as_ref().unwrap();
            assert_eq!(&report.document, name);
            assert_eq!(report.stats.verified, 1);
        }
        assert_eq!(store.document_names().unwrap(), vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_llm_prompts_carry_document_context() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let extractor = MockProvider::new(r#"["Tides follow the moon."]"#);
        let verifier = accept_all();
        let pipeline = llm_pipeline(&store, &extractor, &verifier, config());

        let document = Document::new("tides", "The tides follow the moon.")
            .with_title("Tides")
            .with_source("https://example.org/tides");
        pipeline
            .run_document(document, &CancellationToken::new())
            .await
            .unwrap();

        let extraction_prompt = &extractor.prompts()[0];
        assert!(extraction_prompt.contains("Title: Tides"));
        assert!(extraction_prompt.contains("https://example.org/tides"));

        let verification_prompt = &verifier.prompts()[0];
        assert!(verification_prompt.contains("Tides follow the moon."));
        assert!(verification_prompt.contains("The tides follow the moon."));
    }

    #[tokio::test]
    async fn test_durable_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.db");
        let document = Document::new("persisted", words(12));
        let extractor = MockProvider::new(r#"["Durable fact."]"#);

        {
            let store = Arc::new(SqliteStore::new(&path).unwrap());
            llm_pipeline(&store, &extractor, &accept_all(), small_chunks())
                .run_document(document.clone(), &CancellationToken::new())
                .await
                .unwrap();
        }

        extractor.reset_call_count();
        let store = Arc::new(SqliteStore::new(&path).unwrap());
        let report = llm_pipeline(&store, &extractor, &accept_all(), small_chunks())
            .run_document(document, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(extractor.call_count(), 0);
        assert!(report.is_noop());
        assert_eq!(report.stats.verified, 3);
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_run() {
        let pipeline = Pipeline::new(
            Arc::new(UnavailableRepository),
            extraction_fn(|_, _| Ok(vec![])),
            verification_fn(|_, _| Ok(Verdict::accept())),
            config(),
        )
        .unwrap();

        let result = pipeline
            .run_document(Document::new("doc", "Text."), &CancellationToken::new())
            .await;

        match result {
            Err(e @ PipelineError::Storage(_)) => {
                assert!(e.is_fatal());
                assert!(e.to_string().contains("database is locked"));
            }
            other => panic!("expected storage error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_chunk_write_leaves_no_prefix() {
        let repository = Arc::new(FaultyStore::new().fail_batch_with(2));
        let extractor = MockProvider::new(r#"["A fact."]"#);
        let pipeline = Pipeline::new(
            Arc::clone(&repository),
            LlmExtractor::new(Arc::new(extractor.clone())),
            LlmVerifier::new(Arc::new(accept_all())),
            small_chunks(),
        )
        .unwrap();
        let document = Document::new("doc", words(20));

        let first = pipeline
            .run_document(document.clone(), &CancellationToken::new())
            .await;
        match first {
            Err(e @ PipelineError::Storage(_)) => {
                assert!(e.to_string().contains("database is locked"))
            }
            other => panic!("expected storage error, got {:?}", other),
        }
        assert!(repository.list_chunks(Some("doc")).unwrap().is_empty());
        assert_eq!(extractor.call_count(), 0);

        let report = pipeline
            .run_document(document, &CancellationToken::new())
            .await
            .unwrap();
        let chunks = repository.list_chunks(Some("doc")).unwrap();
        assert_eq!(report.counters.chunks_created, 4);
        assert_eq!(chunks.len(), 4);
        assert!(chunks[3].content.contains("w19"));
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_panicked_run_fails_only_its_own_slot() {
        let pipeline = Pipeline::new(
            Arc::new(FaultyStore::new().panic_on("beta")),
            extraction_fn(|_, _| Ok(vec!["A fact.".to_string()])),
            verification_fn(|_, _| Ok(Verdict::accept())),
            config(),
        )
        .unwrap();
        let documents = vec![
            Document::new("alpha", "First text."),
            Document::new("beta", "Second text."),
            Document::new("gamma", "Third text."),
        ];

        let results = pipeline
            .run_documents(documents, &CancellationToken::new())
            .await;

        let names: Vec<&str> = results.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
        assert!(results[0].1.as_ref().unwrap().is_complete());
        match &results[1].1 {
            Err(e @ PipelineError::Task(_)) => assert!(e.is_fatal()),
            other => panic!("expected task error, got {:?}", other),
        }
        assert!(results[2].1.as_ref().unwrap().is_complete());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Pipeline::new(
            Arc::new(UnavailableRepository),
            extraction_fn(|_, _| Ok(vec![])),
            verification_fn(|_, _| Ok(Verdict::accept())),
            PipelineConfig {
                chunk_size: 10,
                chunk_overlap: 10,
                ..config()
            },
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_stage_identity() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let stage = crate::ChunkingStage::new(
            store,
            crate::TextChunker::new(ChunkUnit::Words, 10, 2),
            false,
        );
        assert_eq!(stage.stage(), WorkflowStage::Chunking);
    }

    /// An in-memory store with injected faults
    ///
    /// The first chunk batch holding `fail_index` is refused, and any lookup
    /// for `panic_document` panics.
    struct FaultyStore {
        inner: SqliteStore,
        fail_index: Option<u32>,
        panic_document: Option<&'static str>,
        failed: AtomicBool,
    }

    impl FaultyStore {
        fn new() -> Self {
            Self {
                inner: SqliteStore::in_memory().unwrap(),
                fail_index: None,
                panic_document: None,
                failed: AtomicBool::new(false),
            }
        }

        fn fail_batch_with(mut self, chunk_index: u32) -> Self {
            self.fail_index = Some(chunk_index);
            self
        }

        fn panic_on(mut self, document: &'static str) -> Self {
            self.panic_document = Some(document);
            self
        }
    }

    impl FactRepository for FaultyStore {
        type Error = String;

        fn upsert_chunk(&self, chunk: &Chunk) -> Result<(), String> {
            self.inner.upsert_chunk(chunk).map_err(|e| e.to_string())
        }
        fn upsert_chunks(&self, chunks: &[Chunk]) -> Result<(), String> {
            if chunks.iter().any(|c| Some(c.chunk_index) == self.fail_index)
                && !self.failed.swap(true, Ordering::SeqCst)
            {
                return locked();
            }
            self.inner.upsert_chunks(chunks).map_err(|e| e.to_string())
        }
        fn get_chunk(&self, document: &str, index: u32) -> Result<Option<Chunk>, String> {
            self.inner.get_chunk(document, index).map_err(|e| e.to_string())
        }
        fn list_chunks(&self, document: Option<&str>) -> Result<Vec<Chunk>, String> {
            self.inner.list_chunks(document).map_err(|e| e.to_string())
        }
        fn chunk_exists(&self, document: &str, index: u32) -> Result<bool, String> {
            if self.panic_document == Some(document) {
                panic!("store poisoned for '{}'", document);
            }
            self.inner.chunk_exists(document, index).map_err(|e| e.to_string())
        }
        fn delete_chunks(&self, document: &str) -> Result<usize, String> {
            self.inner.delete_chunks(document).map_err(|e| e.to_string())
        }
        fn append_fact(&self, fact: &Fact) -> Result<bool, String> {
            self.inner.append_fact(fact).map_err(|e| e.to_string())
        }
        fn fact_exists(&self, document: &str, index: u32, statement: &str) -> Result<bool, String> {
            self.inner
                .fact_exists(document, index, statement)
                .map_err(|e| e.to_string())
        }
        fn find_fact(&self, key: &FactKey) -> Result<Option<Fact>, String> {
            self.inner.find_fact(key).map_err(|e| e.to_string())
        }
        fn list_facts(
            &self,
            document: Option<&str>,
            status: VerificationStatus,
        ) -> Result<Vec<Fact>, String> {
            self.inner.list_facts(document, status).map_err(|e| e.to_string())
        }
        fn stage_candidate(&self, candidate: &CandidateFact) -> Result<bool, String> {
            self.inner.stage_candidate(candidate).map_err(|e| e.to_string())
        }
        fn pending_candidates(&self, document: Option<&str>) -> Result<Vec<CandidateFact>, String> {
            self.inner.pending_candidates(document).map_err(|e| e.to_string())
        }
        fn get_stats(&self, document: Option<&str>) -> Result<FactStats, String> {
            self.inner.get_stats(document).map_err(|e| e.to_string())
        }
        fn chunk_stats(&self, document: Option<&str>) -> Result<ChunkStats, String> {
            self.inner.chunk_stats(document).map_err(|e| e.to_string())
        }
    }

    /// A repository whose backing store is always locked
    struct UnavailableRepository;

    fn locked<T>() -> Result<T, String> {
        Err("database is locked".to_string())
    }

    impl FactRepository for UnavailableRepository {
        type Error = String;

        fn upsert_chunk(&self, _: &Chunk) -> Result<(), String> {
            locked()
        }
        fn upsert_chunks(&self, _: &[Chunk]) -> Result<(), String> {
            locked()
        }
        fn get_chunk(&self, _: &str, _: u32) -> Result<Option<Chunk>, String> {
            locked()
        }
        fn list_chunks(&self, _: Option<&str>) -> Result<Vec<Chunk>, String> {
            locked()
        }
        fn chunk_exists(&self, _: &str, _: u32) -> Result<bool, String> {
            locked()
        }
        fn delete_chunks(&self, _: &str) -> Result<usize, String> {
            locked()
        }
        fn append_fact(&self, _: &Fact) -> Result<bool, String> {
            locked()
        }
        fn fact_exists(&self, _: &str, _: u32, _: &str) -> Result<bool, String> {
            locked()
        }
        fn find_fact(&self, _: &FactKey) -> Result<Option<Fact>, String> {
            locked()
        }
        fn list_facts(&self, _: Option<&str>, _: VerificationStatus) -> Result<Vec<Fact>, String> {
            locked()
        }
        fn stage_candidate(&self, _: &CandidateFact) -> Result<bool, String> {
            locked()
        }
        fn pending_candidates(&self, _: Option<&str>) -> Result<Vec<CandidateFact>, String> {
            locked()
        }
        fn get_stats(&self, _: Option<&str>) -> Result<FactStats, String> {
            locked()
        }
        fn chunk_stats(&self, _: Option<&str>) -> Result<ChunkStats, String> {
            locked()
        }
    }
}
