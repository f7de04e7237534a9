#[cfg(test)]
mod tests {
    use crate::utils::{
        FlakySink, ScriptedSource, TS_FORMAT, approved, at, mixed_batch, now, options,
        orchestrator, page, sale_json, stored_ids,
    };
    use connectors::{file::csv::sheet::CsvSheet, http::error::ApiError};
    use engine_config::settings::SortDirection;
    use engine_core::{
        clock::{Clock, ManualClock},
        connectors::sink::TabularSink,
        state::{StateStore, sled_store::SledStateStore},
    };
    use engine_runtime::execution::{
        executor::SyncExecutor, orchestrator::SyncOptions, scheduler::TickScheduler,
    };
    use model::{
        execution::summary::RunState,
        records::{
            row::SheetContents,
            sale::{SALE_COLUMNS, sale_header},
        },
    };
    use serde_json::json;
    use std::{sync::Arc, time::Duration};
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    fn paged(records: Vec<serde_json::Value>, size: usize) -> Vec<Result<serde_json::Value, ApiError>> {
        let mut pages: Vec<_> = records.chunks(size).map(|c| page(c.to_vec())).collect();
        if records.len() % size == 0 {
            pages.push(page(Vec::new()));
        }
        pages
    }

    // Scenario: empty sheet, five raw records spread over three pages.
    // Expected Outcome: two rows written most recent first; every skip counted under its own reason.
    #[traced_test]
    #[tokio::test]
    async fn end_to_end_mixed_batch() {
        let source = ScriptedSource::new(paged(mixed_batch(), 2));
        let sink = Arc::new(FlakySink::new());
        let (sync, _clock) = orchestrator(source.clone(), sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert!(summary.succeeded(), "{summary:?}");
        assert_eq!(source.queries().len(), 3);
        assert_eq!(summary.pages_fetched, 3);
        assert_eq!(summary.fetched, 5);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.skipped.filtered_out, 1);
        assert_eq!(summary.skipped.invalid_date, 1);
        assert_eq!(summary.skipped.duplicate_in_batch, 1);
        assert_eq!(summary.skipped.malformed, 0);
        assert_eq!(summary.appended, 2);

        let contents = sink.snapshot().await;
        assert_eq!(contents.header, sale_header());
        assert_eq!(stored_ids(&contents), vec!["tx-200", "tx-100"]);
        // first occurrence of tx-100 wins
        assert_eq!(contents.rows[1][4], "2024-03-10 09:15:00");
        assert_eq!(sink.calls(), vec!["read", "rewrite"]);
    }

    // Scenario: the same source data is synced twice.
    // Expected Outcome: the second pass appends nothing and the sheet keeps one row per id.
    #[traced_test]
    #[tokio::test]
    async fn second_run_is_idempotent() {
        let source = ScriptedSource::new(paged(mixed_batch(), 2));
        let sink = Arc::new(FlakySink::new());
        let (sync, _clock) = orchestrator(source.clone(), sink.clone(), options());

        let first = sync.run(&CancellationToken::new()).await;
        source.push(paged(mixed_batch(), 2));
        let second = sync.run(&CancellationToken::new()).await;

        assert_eq!(first.appended, 2);
        assert!(second.succeeded());
        assert_eq!(second.accepted, 2);
        assert_eq!(second.appended, 0);
        assert_ne!(first.run_id, second.run_id);

        let contents = sink.snapshot().await;
        assert_eq!(contents.rows.len(), 2);
        assert_eq!(sink.calls(), vec!["read", "rewrite", "read"]);
    }

    // Scenario: the sheet already holds one of the fetched ids.
    // Expected Outcome: only the new record is appended, below the existing rows.
    #[traced_test]
    #[tokio::test]
    async fn appends_only_unknown_ids() {
        let existing = vec!["v-1", "tx-100", "31", "197.00", "2024-03-10 09:15:00", "1", "2", "880", "Maria", "m@example.com", "6"]
            .into_iter()
            .map(String::from)
            .collect();
        let sink = Arc::new(FlakySink::with_contents(SheetContents::new(
            sale_header(),
            vec![existing],
        )));
        let source = ScriptedSource::new(vec![page(vec![
            approved("tx-100", "2024-03-10 09:15:00"),
            approved("tx-500", "2024-03-14 11:00:00"),
        ]), page(Vec::new())]);
        let (sync, _clock) = orchestrator(source, sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert_eq!(summary.appended, 1);
        assert_eq!(sink.calls(), vec!["read", "append"]);
        assert_eq!(stored_ids(&sink.snapshot().await), vec!["tx-100", "tx-500"]);
    }

    // Scenario: eviction enabled, the sheet holds rows older than the window.
    // Expected Outcome: new rows appended first, then aged-out rows removed by a rewrite.
    #[traced_test]
    #[tokio::test]
    async fn eviction_removes_aged_out_rows() {
        let row = |id: &str, ts: &str| -> Vec<String> {
            let mut cells = vec![String::new(); SALE_COLUMNS.len()];
            cells[1] = id.to_string();
            cells[4] = ts.to_string();
            cells
        };
        let sink = Arc::new(FlakySink::with_contents(SheetContents::new(
            sale_header(),
            vec![
                row("tx-old", "2024-02-20 10:00:00"),
                row("tx-keep", "2024-03-05 10:00:00"),
                row("tx-odd", "sometime"),
            ],
        )));
        let source = ScriptedSource::new(vec![page(vec![approved("tx-new", "2024-03-14 10:00:00")])]);
        let (sync, _clock) = orchestrator(
            source,
            sink.clone(),
            SyncOptions {
                evict: true,
                ..options()
            },
        );

        let summary = sync.run(&CancellationToken::new()).await;

        assert!(summary.succeeded());
        assert_eq!(summary.appended, 1);
        assert_eq!(summary.pruned, 1);
        assert_eq!(sink.calls(), vec!["read", "append", "rewrite"]);
        assert_eq!(
            stored_ids(&sink.snapshot().await),
            vec!["tx-keep", "tx-odd", "tx-new"]
        );
    }

    // Scenario: eviction disabled with the same aged-out rows.
    // Expected Outcome: nothing is removed.
    #[tokio::test]
    async fn rows_are_kept_without_eviction() {
        let mut old = vec![String::new(); SALE_COLUMNS.len()];
        old[1] = "tx-old".into();
        old[4] = "2024-01-01 00:00:00".into();
        let sink = Arc::new(FlakySink::with_contents(SheetContents::new(sale_header(), vec![old])));
        let source = ScriptedSource::new(vec![page(vec![])]);
        let (sync, _clock) = orchestrator(source, sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert_eq!(summary.pruned, 0);
        assert_eq!(sink.calls(), vec!["read"]);
        assert_eq!(stored_ids(&sink.snapshot().await), vec!["tx-old"]);
    }

    // Scenario: first page request is refused with 401.
    // Expected Outcome: run fails at once, no retries, sink untouched.
    #[traced_test]
    #[tokio::test]
    async fn auth_failure_aborts_run() {
        let source = ScriptedSource::new(vec![Err(ApiError::status(401, "invalid token"))]);
        let sink = Arc::new(FlakySink::new());
        let (sync, clock) = orchestrator(source.clone(), sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert_eq!(summary.state, RunState::Failed);
        assert!(summary.error.as_deref().unwrap().contains("401"));
        assert_eq!(source.queries().len(), 1);
        assert!(clock.sleeps().is_empty());
        assert!(sink.calls().is_empty());
        assert_eq!(sync.state(), RunState::Failed);
    }

    // Scenario: a later page comes back without the records key.
    // Expected Outcome: run fails and earlier pages are not written.
    #[traced_test]
    #[tokio::test]
    async fn malformed_page_aborts_without_partial_write() {
        let source = ScriptedSource::new(vec![
            page(vec![approved("tx-1", "2024-03-10 10:00:00"), approved("tx-2", "2024-03-10 11:00:00")]),
            Ok(json!({ "rows": [] })),
        ]);
        let sink = Arc::new(FlakySink::new());
        let (sync, _clock) = orchestrator(source, sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert_eq!(summary.state, RunState::Failed);
        assert!(summary.error.as_deref().unwrap().contains("Malformed"));
        assert!(sink.calls().is_empty());
    }

    // Scenario: the second page keeps timing out past the retry budget.
    // Expected Outcome: backoff 5s, 10s, 20s, 40s; the first page is still written and the run flagged.
    #[traced_test]
    #[tokio::test]
    async fn exhausted_fetch_keeps_partial_results() {
        let timeout = || Err(ApiError::Timeout("timed out".into()));
        let source = ScriptedSource::new(vec![
            page(vec![approved("tx-1", "2024-03-10 10:00:00"), approved("tx-2", "2024-03-11 10:00:00")]),
            timeout(),
            timeout(),
            timeout(),
            timeout(),
            timeout(),
        ]);
        let sink = Arc::new(FlakySink::new());
        let (sync, clock) = orchestrator(source, sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert!(summary.succeeded());
        assert!(summary.fetch_exhausted);
        assert_eq!(summary.retries, 4);
        assert_eq!(summary.appended, 2);
        assert_eq!(
            clock.sleeps(),
            [5, 10, 20, 40].map(Duration::from_secs).to_vec()
        );
        assert!(logs_contain("retrying in"));
    }

    // Scenario: transient timeouts on the only page.
    // Expected Outcome: three retries then success; run records the retries.
    #[tokio::test]
    async fn transient_timeouts_recover() {
        let timeout = || Err(ApiError::Timeout("timed out".into()));
        let source = ScriptedSource::new(vec![
            timeout(),
            timeout(),
            timeout(),
            page(vec![approved("tx-1", "2024-03-10 10:00:00")]),
        ]);
        let sink = Arc::new(FlakySink::new());
        let (sync, clock) = orchestrator(source, sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert!(summary.succeeded());
        assert!(!summary.fetch_exhausted);
        assert_eq!(summary.retries, 3);
        assert_eq!(clock.sleeps(), [5, 10, 20].map(Duration::from_secs).to_vec());
        assert_eq!(sync.metrics().snapshot().fetch_retries, 3);
    }

    // Scenario: one append failure.
    // Expected Outcome: the single sink retry absorbs it.
    #[traced_test]
    #[tokio::test]
    async fn sink_failure_is_retried_once() {
        let mut existing = vec![String::new(); SALE_COLUMNS.len()];
        existing[1] = "tx-0".into();
        let sink = Arc::new(
            FlakySink::with_contents(SheetContents::new(sale_header(), vec![existing]))
                .failing_appends(1),
        );
        let source = ScriptedSource::new(vec![page(vec![approved("tx-1", "2024-03-10 10:00:00")])]);
        let (sync, clock) = orchestrator(source, sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert!(summary.succeeded(), "{summary:?}");
        assert_eq!(summary.appended, 1);
        assert_eq!(sink.calls(), vec!["read", "append", "append"]);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
        assert_eq!(sync.metrics().snapshot().sink_retries, 1);
    }

    // Scenario: the sink stays unreachable.
    // Expected Outcome: the run fails after one retry and reports what it wrote (nothing).
    #[traced_test]
    #[tokio::test]
    async fn persistent_sink_failure_fails_run() {
        let sink = Arc::new(FlakySink::new().failing_reads(2));
        let source = ScriptedSource::new(vec![page(vec![approved("tx-1", "2024-03-10 10:00:00")])]);
        let (sync, _clock) = orchestrator(source, sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert_eq!(summary.state, RunState::Failed);
        assert_eq!(summary.appended, 0);
        assert!(summary.error.as_deref().unwrap().contains("injected read failure"));
        assert_eq!(sink.calls(), vec!["read", "read"]);
    }

    // Scenario: the sheet has someone else's header and no rows.
    // Expected Outcome: the run fails before writing and the sheet is left untouched.
    #[tokio::test]
    async fn foreign_header_fails_without_writing() {
        let header = vec!["Data".to_string(), "Cliente".to_string()];
        let sink = Arc::new(FlakySink::with_contents(SheetContents::new(
            header.clone(),
            vec![],
        )));
        let source = ScriptedSource::new(paged(mixed_batch(), 2));
        let (sync, _clock) = orchestrator(source, sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert_eq!(summary.state, RunState::Failed);
        assert_eq!(summary.appended, 0);
        assert!(summary.error.as_deref().unwrap().contains("transacao_id"));
        assert_eq!(sink.calls(), vec!["read"]);
        let contents = sink.snapshot().await;
        assert_eq!(contents.header, header);
        assert!(contents.rows.is_empty());
    }

    // Scenario: append succeeds but the prune rewrite keeps failing.
    // Expected Outcome: run fails; the summary still reports the appended row.
    #[tokio::test]
    async fn partial_write_is_reported() {
        let mut old = vec![String::new(); SALE_COLUMNS.len()];
        old[1] = "tx-old".into();
        old[4] = "2024-01-01 00:00:00".into();
        let sink = Arc::new(
            FlakySink::with_contents(SheetContents::new(sale_header(), vec![old]))
                .failing_rewrites(2),
        );
        let source = ScriptedSource::new(vec![page(vec![approved("tx-1", "2024-03-10 10:00:00")])]);
        let (sync, _clock) = orchestrator(
            source,
            sink.clone(),
            SyncOptions {
                evict: true,
                ..options()
            },
        );

        let summary = sync.run(&CancellationToken::new()).await;

        assert_eq!(summary.state, RunState::Failed);
        assert_eq!(summary.appended, 1);
        assert_eq!(summary.pruned, 0);
        assert_eq!(stored_ids(&sink.snapshot().await), vec!["tx-old", "tx-1"]);
    }

    // Scenario: cancellation requested before the run starts.
    // Expected Outcome: no request is sent and nothing is written.
    #[tokio::test]
    async fn cancelled_run_writes_nothing() {
        let source = ScriptedSource::new(vec![page(vec![approved("tx-1", "2024-03-10 10:00:00")])]);
        let sink = Arc::new(FlakySink::new());
        let (sync, _clock) = orchestrator(source.clone(), sink.clone(), options());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = sync.run(&cancel).await;

        assert_eq!(summary.state, RunState::Cancelled);
        assert!(source.queries().is_empty());
        assert!(sink.calls().is_empty());
    }

    // Scenario: dry run against a sheet that needs both an append and a prune.
    // Expected Outcome: summary reports both counts; the sheet is only read.
    #[tokio::test]
    async fn dry_run_only_reads() {
        let mut old = vec![String::new(); SALE_COLUMNS.len()];
        old[1] = "tx-old".into();
        old[4] = "2024-01-01 00:00:00".into();
        let sink = Arc::new(FlakySink::with_contents(SheetContents::new(sale_header(), vec![old])));
        let source = ScriptedSource::new(vec![page(vec![approved("tx-1", "2024-03-10 10:00:00")])]);
        let (sync, _clock) = orchestrator(
            source,
            sink.clone(),
            SyncOptions {
                evict: true,
                dry_run: true,
                ..options()
            },
        );

        let summary = sync.run(&CancellationToken::new()).await;

        assert!(summary.succeeded());
        assert!(summary.dry_run);
        assert_eq!(summary.appended, 1);
        assert_eq!(summary.pruned, 1);
        assert_eq!(sink.calls(), vec!["read"]);
    }

    // Scenario: ascending order configured; every accepted record checked against the window.
    // Expected Outcome: oldest first, ties broken by id, nothing outside the window.
    #[tokio::test]
    async fn ascending_order_and_window_bounds() {
        let source = ScriptedSource::new(vec![page(vec![
            approved("tx-b", "2024-03-05 10:00:00"),
            approved("tx-a", "2024-03-05 10:00:00"),
            approved("tx-c", "2024-03-02 10:00:00"),
            approved("tx-early", "2024-03-01 11:59:59"),
            approved("tx-late", "2024-03-15 12:00:01"),
            approved("tx-start", "2024-03-01 12:00:00"),
        ])]);
        let sink = Arc::new(FlakySink::new());
        let (sync, _clock) = orchestrator(
            source,
            sink.clone(),
            SyncOptions {
                page_size: 10,
                sort_direction: SortDirection::Ascending,
                ..options()
            },
        );

        let summary = sync.run(&CancellationToken::new()).await;

        assert_eq!(summary.skipped.filtered_out, 2);
        let window = summary.window.unwrap();
        assert_eq!(window.end(), now());
        assert_eq!(
            stored_ids(&sink.snapshot().await),
            vec!["tx-start", "tx-c", "tx-a", "tx-b"]
        );
    }

    // Scenario: state transitions are observable while the run is in progress.
    // Expected Outcome: the channel ends on Idle and each stage is logged.
    #[traced_test]
    #[tokio::test]
    async fn transitions_are_published() {
        let source = ScriptedSource::new(vec![page(vec![approved("tx-1", "2024-03-10 10:00:00")])]);
        let sink = Arc::new(FlakySink::new());
        let (sync, _clock) = orchestrator(source, sink, options());
        let mut rx = sync.subscribe();

        let summary = sync.run(&CancellationToken::new()).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), RunState::Idle);
        assert_eq!(summary.state, RunState::Idle);
        for step in [
            "idle -> fetching",
            "fetching -> filtering",
            "filtering -> merging",
            "merging -> sorting",
            "sorting -> writing",
            "writing -> idle",
        ] {
            assert!(logs_contain(step), "missing transition {step}");
        }
    }

    // Scenario: full pass against a CSV file on disk, run twice.
    // Expected Outcome: header plus two rows after the first pass; second pass adds nothing.
    #[traced_test]
    #[tokio::test]
    async fn csv_sheet_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        let sheet: Arc<dyn TabularSink> = Arc::new(CsvSheet::new(path.clone()));
        let source = ScriptedSource::new(paged(mixed_batch(), 2));
        let (sync, _clock) = orchestrator(source.clone(), sheet.clone(), options());

        let first = sync.run(&CancellationToken::new()).await;
        source.push(paged(mixed_batch(), 2));
        let second = sync.run(&CancellationToken::new()).await;

        assert_eq!(first.appended, 2);
        assert_eq!(second.appended, 0);

        let contents = sheet.read_all().await.unwrap();
        assert_eq!(contents.header, sale_header());
        assert_eq!(stored_ids(&contents), vec!["tx-200", "tx-100"]);
        assert_eq!(contents.rows[0][4], "2024-03-12 16:40:00");
        assert_eq!(contents.rows[0][3], "197.00");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    // Scenario: executor persists each pass in the sled history.
    // Expected Outcome: both runs are listed newest first.
    #[tokio::test]
    async fn executor_records_history() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SledStateStore::open(dir.path().join("state")).unwrap());
        let source = ScriptedSource::new(vec![
            Err(ApiError::status(403, "forbidden")),
            page(vec![approved("tx-1", "2024-03-10 10:00:00")]),
        ]);
        let (sync, clock) = orchestrator(source, Arc::new(FlakySink::new()), options());
        let executor = SyncExecutor::with_parts(sync, store.clone(), None);

        let failed = executor.execute(&CancellationToken::new()).await.unwrap();
        clock.advance(Duration::from_secs(600));
        let ok = executor.execute(&CancellationToken::new()).await.unwrap();

        let history = store.recent_runs(10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].run_id, ok.run_id);
        assert_eq!(history[1].run_id, failed.run_id);
        assert_eq!(history[1].state, RunState::Failed);
    }

    // Scenario: scheduler limited to three passes on a manual clock.
    // Expected Outcome: passes run one after another with the configured pause in between.
    #[tokio::test]
    async fn scheduler_runs_sequential_passes() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let source = ScriptedSource::new(vec![page(vec![approved("tx-1", "2024-03-10 10:00:00")])]);
        let sink = Arc::new(FlakySink::new());
        let (sync, clock) = orchestrator(source, sink.clone(), options());
        let executor = SyncExecutor::with_parts(sync, store, None);

        let scheduler = TickScheduler::new(executor, clock.clone(), Duration::from_secs(300))
            .with_max_passes(3);
        let mut appended = Vec::new();
        let passes = scheduler
            .run(&CancellationToken::new(), |s| appended.push(s.appended))
            .await
            .unwrap();

        assert_eq!(passes, 3);
        assert_eq!(appended, vec![1, 0, 0]);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(300); 2]);
        assert_eq!(clock.now(), at("2024-03-15 12:10:00"));
        assert_eq!(stored_ids(&sink.snapshot().await), vec!["tx-1"]);
    }

    // Scenario: a record whose payment type is quoted and whose amount is a number.
    // Expected Outcome: lenient decoding still accepts it and renders the cells.
    #[tokio::test]
    async fn lenient_scalars_are_accepted() {
        let mut raw = sale_json("tx-9", "2024-03-10 10:00:00", 2, 2, 6);
        raw["tipo_pagamento"] = json!("2");
        raw["valor_liquido"] = json!(49.9);
        let source = ScriptedSource::new(vec![page(vec![raw])]);
        let sink = Arc::new(FlakySink::new());
        let (sync, _clock) = orchestrator(source, sink.clone(), options());

        let summary = sync.run(&CancellationToken::new()).await;

        assert_eq!(summary.appended, 1);
        let contents = sink.snapshot().await;
        assert_eq!(contents.rows[0][3], "49.9");
        assert_eq!(contents.rows[0][5], "2");
        assert_eq!(
            chrono::NaiveDateTime::parse_from_str(&contents.rows[0][4], TS_FORMAT).unwrap(),
            at("2024-03-10 10:00:00")
        );
    }

    #[test]
    fn manual_clock_drives_window() {
        let clock = ManualClock::new(now());
        let window = clock.window(14).unwrap();
        assert_eq!(window.start(), at("2024-03-01 12:00:00"));
    }
}
