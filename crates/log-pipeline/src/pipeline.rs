//! 파이프라인 오케스트레이션 -- 수집/파싱/분석의 전체 흐름을 관리합니다.
//!
//! # 내부 아키텍처
//! ```text
//! Collectors -> mpsc(공유 큐) -> Fan-out -> mpsc(컨슈머별 채널) -> Alert/Stats 워커
//! ```
//!
//! # 실행 모델
//! - 소스당 수집기 태스크 하나, 팬아웃 태스크 하나, 컨슈머당 워커 하나
//! - 소스 내 순서는 FIFO로 보존되고, 소스 간 순서는 보장하지 않음
//! - 모든 채널은 유계(bounded) — 느린 컨슈머의 배압이 수집기까지 전파됨
//! - 모든 수집기가 끝나면 취소 신호가 큐와 컨슈머 채널을 거쳐 전파되어
//!   깨끗하게 종료됨 (태스크 누수 없음)
//! - 수집기 태스크의 패닉은 소스 단위로 복구되며 다른 소스에 영향 없음

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use logsift_core::config::Config;
use logsift_core::consumer::Consumer;
use logsift_core::error::{ConfigError, LogsiftError, PipelineError};
use logsift_core::record::{RawMessage, Record};

use crate::collector::Collector;
use crate::consumer::{
    self, AlertConsumer, AnyConsumer, CONSUMER_CHANNEL_CAPACITY, ConsumerHandle,
    ConsumerRegistry, SharedConsumer, StatsConsumer,
};
use crate::dispatch::{self, DispatchCounters};
use crate::source::{SourceRegistry, SourceSettings};

/// 대기 중인 컨슈머 워커 — 이름, 공유 상태, 인바운드 채널 수신측
type PendingWorker = (String, SharedConsumer, mpsc::Receiver<Record>);

/// 로그 파이프라인
///
/// 설정에서 조립된 수집기/컨슈머를 들고 있다가 [`run`](Self::run)에서
/// 태스크로 스폰합니다. 실행은 모든 소스가 끝까지 읽힐 때까지 지속되며,
/// 한 번 실행하고 나면 다시 실행할 수 없습니다.
pub struct LogPipeline {
    config: Config,
    sources: Arc<SourceRegistry>,
    consumers: Arc<ConsumerRegistry>,
    collectors: Vec<Collector>,
    pending_workers: Vec<PendingWorker>,
    handles: Vec<ConsumerHandle>,
    counters: Arc<DispatchCounters>,
}

impl LogPipeline {
    /// 처리된 레코드 수를 반환합니다.
    pub fn processed_count(&self) -> u64 {
        self.counters.processed.load(Ordering::Relaxed)
    }

    /// 파싱 실패 수를 반환합니다.
    pub fn parse_error_count(&self) -> u64 {
        self.counters.parse_errors.load(Ordering::Relaxed)
    }

    /// 등록된 컨슈머 핸들을 반환합니다. 실행 후 상태 점검에 사용합니다.
    pub fn consumer_handles(&self) -> &[ConsumerHandle] {
        &self.handles
    }

    /// 소스 레지스트리에 대한 Arc 참조를 반환합니다.
    pub fn source_registry(&self) -> Arc<SourceRegistry> {
        Arc::clone(&self.sources)
    }

    /// 파이프라인을 실행합니다.
    ///
    /// 컨슈머 워커와 팬아웃을 먼저 올린 뒤 수집기를 스폰하고, 모든
    /// 수집기가 끝나면 취소 신호를 전파하여 나머지 태스크를 정리합니다.
    /// 팬아웃 스테이지의 치명적 에러(파싱 실패, 미등록 소스)가 있으면
    /// 정리 후 그 에러를 반환합니다.
    pub async fn run(&mut self) -> Result<(), LogsiftError> {
        info!(
            sources = self.collectors.len(),
            consumers = self.handles.len(),
            queue_buffer = self.config.queue_buffer_size,
            "starting log pipeline"
        );

        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_buffer_size);

        // 1. 컨슈머 워커
        let mut worker_handles = Vec::new();
        for (name, inner, rx) in self.pending_workers.drain(..) {
            worker_handles.push(tokio::spawn(consumer::run_worker(name, inner, rx)));
        }

        // 2. 팬아웃
        let fanout = tokio::spawn(dispatch::run_fanout(
            queue_rx,
            Arc::clone(&self.sources),
            Arc::clone(&self.consumers),
            Arc::clone(&self.counters),
        ));

        // 3. 수집기 — 전부 끝날 때까지 대기, 패닉은 소스 단위로 복구
        let mut collector_set = JoinSet::new();
        for collector in self.collectors.drain(..) {
            let registry = Arc::clone(&self.sources);
            let tx = queue_tx.clone();
            collector_set.spawn(async move {
                let name = collector.name().to_owned();
                let result = collector.run(registry, tx).await;
                (name, result)
            });
        }

        while let Some(joined) = collector_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => debug!(source = %name, "collector finished"),
                Ok((name, Err(e))) => {
                    error!(source = %name, error = %e, "collector failed")
                }
                Err(e) => error!(error = %e, "recovered panic in collector task"),
            }
        }

        // 4. 모든 소스 종료 → 취소 신호 전파
        if queue_tx.send(RawMessage::cancel_signal()).await.is_err() {
            debug!("queue receiver already closed");
        }
        drop(queue_tx);

        let fanout_result = match fanout.await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::Task(format!("fan-out: {e}")).into()),
        };

        // 팬아웃이 에러로 끝났다면 컨슈머에 취소가 전달되지 않았을 수
        // 있으므로 여기서 한 번 더 보냄. 이미 종료한 워커의 채널 전송
        // 실패는 무시.
        for handle in &self.handles {
            let _ = handle.tx.send(Record::cancel_signal()).await;
        }

        for worker in worker_handles {
            if let Err(e) = worker.await {
                error!(error = %e, "consumer worker panicked");
            }
        }

        info!(
            processed = self.processed_count(),
            parse_errors = self.parse_error_count(),
            "log pipeline finished"
        );

        fanout_result
    }
}

/// 로그 파이프라인 빌더
///
/// 검증된 설정에서 레지스트리, 수집기, 컨슈머를 조립합니다.
pub struct LogPipelineBuilder {
    config: Option<Config>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self { config: None }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// 파이프라인을 조립합니다.
    ///
    /// 비활성 항목은 건너뜁니다. 활성 로그 소스가 하나도 없으면
    /// 실패합니다. 컨슈머가 하나도 없는 구성은 허용됩니다 — 레코드는
    /// 파싱만 되고 버려집니다.
    pub async fn build(self) -> Result<LogPipeline, LogsiftError> {
        let config = self.config.ok_or(ConfigError::InvalidValue {
            field: "config".to_owned(),
            reason: "builder requires a config".to_owned(),
        })?;
        config.validate().map_err(LogsiftError::Config)?;

        // 로그 소스 등록
        let sources = Arc::new(SourceRegistry::new());
        let mut collectors = Vec::new();
        for src_cfg in &config.log_sources {
            if src_cfg.disabled {
                debug!(source = %src_cfg.name, "skipping disabled log source");
                continue;
            }
            let settings = SourceSettings::from_config(&src_cfg.settings)?;
            sources.register(&src_cfg.name, settings).await?;
            collectors.push(Collector::from_config(src_cfg)?);
        }
        if collectors.is_empty() {
            return Err(ConfigError::NoLogSources.into());
        }

        // 컨슈머 등록
        let consumers = Arc::new(ConsumerRegistry::new());
        let mut pending_workers = Vec::new();
        let mut handles = Vec::new();

        let mut enabled: Vec<AnyConsumer> = Vec::new();
        for st in &config.stats.types {
            if st.disabled {
                debug!(consumer = %st.name, "skipping disabled stats type");
                continue;
            }
            enabled.push(AnyConsumer::Stats(StatsConsumer::from_config(st)?));
        }
        for at in &config.alert.types {
            if at.disabled {
                debug!(consumer = %at.name, "skipping disabled alert type");
                continue;
            }
            enabled.push(AnyConsumer::Alert(AlertConsumer::from_config(at)?));
        }

        for any in enabled {
            let name = any.name().to_owned();
            let (tx, rx) = mpsc::channel(CONSUMER_CHANNEL_CAPACITY);
            let inner: SharedConsumer = Arc::new(RwLock::new(any));

            let handle = ConsumerHandle {
                name: name.clone(),
                tx,
                inner: Arc::clone(&inner),
            };
            consumers.register(handle.clone()).await?;
            handles.push(handle);
            pending_workers.push((name, inner, rx));
        }

        Ok(LogPipeline {
            config,
            sources,
            consumers,
            collectors,
            pending_workers,
            handles,
            counters: Arc::new(DispatchCounters::default()),
        })
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
