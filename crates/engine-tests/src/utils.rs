#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDateTime;
use connectors::http::{error::ApiError, query::SalesQuery};
use engine_core::{
    clock::{Clock, ManualClock},
    connectors::{
        sink::{TabularSink, memory::MemorySheet},
        source::SalesSource,
    },
    error::SinkError,
    retry::RetryPolicy,
};
use engine_processing::fetcher::PageFetcher;
use engine_runtime::execution::orchestrator::{SyncOptions, SyncOrchestrator};
use model::records::{
    row::{SheetContents, SheetRow},
    sale::TRANSACTION_ID_COLUMN,
};
use serde_json::{Value, json};
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fixed "now" for every scenario: the window is 2024-03-01 12:00 .. 2024-03-15 12:00.
pub fn now() -> NaiveDateTime {
    at("2024-03-15 12:00:00")
}

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap()
}

/// A raw sale as the API sends it.
pub fn sale_json(id: &str, completed: &str, payment: i64, status: i64, gateway: i64) -> Value {
    json!({
        "vendas_id": format!("v-{id}"),
        "transacao_id": id,
        "produto_id": 31,
        "valor_liquido": "197.00",
        "data_conclusao": completed,
        "tipo_pagamento": payment,
        "status_transacao": status,
        "aluno_id": 880,
        "nome": "Maria Souza",
        "email": "maria@example.com",
        "gateway": gateway,
    })
}

/// A sale that passes every predicate.
pub fn approved(id: &str, completed: &str) -> Value {
    sale_json(id, completed, 1, 2, 6)
}

pub fn page(records: Vec<Value>) -> Result<Value, ApiError> {
    Ok(json!({ "data": records }))
}

/// Source that replays scripted responses in order, then serves empty pages.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Value, ApiError>>>,
    queries: Mutex<Vec<SalesQuery>>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<Value, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, responses: Vec<Result<Value, ApiError>>) {
        self.responses.lock().unwrap().extend(responses);
    }

    pub fn queries(&self) -> Vec<SalesQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SalesSource for ScriptedSource {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    async fn fetch(&self, query: &SalesQuery) -> Result<Value, ApiError> {
        self.queries.lock().unwrap().push(*query);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| page(Vec::new()))
    }
}

/// In-memory sheet that fails a configurable number of calls per operation
/// and records every call it receives.
#[derive(Default)]
pub struct FlakySink {
    inner: MemorySheet,
    fail_reads: AtomicUsize,
    fail_appends: AtomicUsize,
    fail_rewrites: AtomicUsize,
    calls: Mutex<Vec<&'static str>>,
}

impl FlakySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: SheetContents) -> Self {
        Self {
            inner: MemorySheet::with_contents(contents),
            ..Self::default()
        }
    }

    pub fn failing_reads(self, n: usize) -> Self {
        self.fail_reads.store(n, Ordering::SeqCst);
        self
    }

    pub fn failing_appends(self, n: usize) -> Self {
        self.fail_appends.store(n, Ordering::SeqCst);
        self
    }

    pub fn failing_rewrites(self, n: usize) -> Self {
        self.fail_rewrites.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub async fn snapshot(&self) -> SheetContents {
        self.inner.snapshot().await
    }

    fn enter(&self, call: &'static str, failures: &AtomicUsize) -> Result<(), SinkError> {
        self.calls.lock().unwrap().push(call);
        let tripped = failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(SinkError::Unavailable(format!("injected {call} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl TabularSink for FlakySink {
    fn name(&self) -> String {
        "flaky".to_string()
    }

    async fn read_all(&self) -> Result<SheetContents, SinkError> {
        self.enter("read", &self.fail_reads)?;
        self.inner.read_all().await
    }

    async fn append_rows(&self, rows: &[SheetRow]) -> Result<(), SinkError> {
        self.enter("append", &self.fail_appends)?;
        self.inner.append_rows(rows).await
    }

    async fn clear_and_rewrite(
        &self,
        header: &[String],
        rows: &[SheetRow],
    ) -> Result<(), SinkError> {
        self.enter("rewrite", &self.fail_rewrites)?;
        self.inner.clear_and_rewrite(header, rows).await
    }
}

/// Options matching the production defaults, with short waits and small pages.
pub fn options() -> SyncOptions {
    SyncOptions {
        page_size: 2,
        sink_retry: RetryPolicy::for_sink(Duration::from_secs(2)),
        ..SyncOptions::default()
    }
}

pub fn network_retry() -> RetryPolicy {
    RetryPolicy::new(5, Duration::from_secs(5), Duration::from_secs(60))
}

/// Wires an orchestrator over scripted collaborators and a manual clock.
pub fn orchestrator(
    source: Arc<ScriptedSource>,
    sink: Arc<dyn TabularSink>,
    options: SyncOptions,
) -> (SyncOrchestrator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now()));
    let fetcher = PageFetcher::new(source, clock.clone(), network_retry(), "data");
    let orchestrator = SyncOrchestrator::new(fetcher, sink, clock.clone() as Arc<dyn Clock>, options);
    (orchestrator, clock)
}

/// Transaction ids of the stored rows, in sheet order.
pub fn stored_ids(contents: &SheetContents) -> Vec<String> {
    let column = contents.column(TRANSACTION_ID_COLUMN).unwrap();
    contents.rows.iter().map(|r| r[column].clone()).collect()
}

/// Five raw records: two valid, one wrong gateway, one bad date, one repeat
/// of the first id.
pub fn mixed_batch() -> Vec<Value> {
    vec![
        approved("tx-100", "2024-03-10 09:15:00"),
        approved("tx-200", "2024-03-12 16:40:00"),
        sale_json("tx-300", "2024-03-11 10:00:00", 1, 2, 3),
        approved("tx-400", "11/03/2024 10:00"),
        approved("tx-100", "2024-03-13 08:00:00"),
    ]
}
