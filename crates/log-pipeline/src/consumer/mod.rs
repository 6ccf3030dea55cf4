//! 컨슈머 모듈 -- 분석 컨슈머와 디스패치 기반 시설
//!
//! # 구성
//! - [`AlertConsumer`]: 슬라이딩 윈도우 임계값 알림
//! - [`StatsConsumer`]: 텀블링 윈도우 통계 집계
//! - [`AnyConsumer`]: 두 변종을 묶는 태그드 유니언
//! - [`ConsumerRegistry`]: 소스 이름 → 구독 컨슈머 핸들의 전역 인덱스
//! - [`run_worker`]: 컨슈머당 하나씩 실행되는 채널 드레인 루프
//!
//! # 동시성
//! 각 컨슈머의 가변 상태는 `Arc<RwLock<AnyConsumer>>` 뒤에 있고, 워커가
//! `consume` 동안 배타적으로 잠급니다. 레지스트리 쓰기는 시작 시점에만
//! 일어나고, 이후는 레코드 단위 읽기입니다.

pub mod alert;
pub mod stats;

pub use alert::{AlertConsumer, AlertEpisode, AlertSourceSettings};
pub use stats::{StatsConsumer, StatsSourceSettings, StatsWindow, ValueStats};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, warn};

use logsift_core::consumer::Consumer;
use logsift_core::error::{ConfigError, ConsumeError};
use logsift_core::record::Record;

/// 컨슈머 인바운드 채널의 버퍼 크기
pub const CONSUMER_CHANNEL_CAPACITY: usize = 8;

/// 알림 또는 통계 컨슈머
///
/// 파이프라인은 컨슈머를 이 태그드 유니언으로 들고 다니며, 두 변종 모두
/// [`Consumer`] 계약을 위임으로 구현합니다.
pub enum AnyConsumer {
    /// 슬라이딩 윈도우 알림
    Alert(AlertConsumer),
    /// 텀블링 윈도우 통계
    Stats(StatsConsumer),
}

impl Consumer for AnyConsumer {
    fn name(&self) -> &str {
        match self {
            Self::Alert(c) => c.name(),
            Self::Stats(c) => c.name(),
        }
    }

    fn subscribed_sources(&self) -> Vec<String> {
        match self {
            Self::Alert(c) => c.subscribed_sources(),
            Self::Stats(c) => c.subscribed_sources(),
        }
    }

    fn prepare(&mut self, first_ts: SystemTime) {
        match self {
            Self::Alert(c) => c.prepare(first_ts),
            Self::Stats(c) => c.prepare(first_ts),
        }
    }

    fn consume(&mut self, record: &Record) -> Result<(), ConsumeError> {
        match self {
            Self::Alert(c) => c.consume(record),
            Self::Stats(c) => c.consume(record),
        }
    }
}

/// 공유 컨슈머 상태
pub type SharedConsumer = Arc<RwLock<AnyConsumer>>;

/// 디스패치에 필요한 컨슈머 핸들 — 이름, 인바운드 채널 송신측, 공유 상태
#[derive(Clone)]
pub struct ConsumerHandle {
    /// 컨슈머 이름
    pub name: String,
    /// 인바운드 채널 송신측
    pub tx: mpsc::Sender<Record>,
    /// 공유 컨슈머 상태
    pub inner: SharedConsumer,
}

/// 소스 이름 → 구독 컨슈머 핸들의 프로세스 전역 인덱스
///
/// 하나의 소스를 여러 컨슈머가 구독할 수 있습니다.
#[derive(Default)]
pub struct ConsumerRegistry {
    by_source: RwLock<HashMap<String, Vec<ConsumerHandle>>>,
    all: RwLock<Vec<ConsumerHandle>>,
}

impl ConsumerRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 컨슈머를 등록하고 구독 소스별 인덱스에 반영합니다.
    ///
    /// 구독 소스가 하나도 없는 컨슈머는 설정 에러입니다.
    pub async fn register(&self, handle: ConsumerHandle) -> Result<(), ConfigError> {
        let sources = handle.inner.read().await.subscribed_sources();
        if sources.is_empty() {
            return Err(ConfigError::NoSourceSettings {
                consumer: handle.name.clone(),
            });
        }

        let mut by_source = self.by_source.write().await;
        for source in sources {
            by_source.entry(source).or_default().push(handle.clone());
        }
        self.all.write().await.push(handle);
        Ok(())
    }

    /// 소스를 구독하는 컨슈머 핸들 목록을 반환합니다.
    pub async fn subscribers(&self, source: &str) -> Vec<ConsumerHandle> {
        self.by_source
            .read()
            .await
            .get(source)
            .cloned()
            .unwrap_or_default()
    }

    /// 등록된 모든 컨슈머 핸들을 (컨슈머당 한 번씩) 반환합니다.
    pub async fn all(&self) -> Vec<ConsumerHandle> {
        self.all.read().await.clone()
    }

    /// 등록된 컨슈머 수를 반환합니다.
    pub async fn len(&self) -> usize {
        self.all.read().await.len()
    }

    /// 레지스트리가 비어 있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.all.read().await.is_empty()
    }
}

/// 컨슈머 워커 루프 — 인바운드 채널을 드레인하며 `consume`을 호출합니다.
///
/// 첫 레코드에서 `prepare`를 호출하고, 취소 레코드를 만나면 종료합니다.
/// `consume` 에러는 로그만 남기고 다음 레코드로 진행합니다 — 한 레코드의
/// 실패가 다른 컨슈머나 이후 레코드에 영향을 주지 않습니다.
pub async fn run_worker(name: String, inner: SharedConsumer, mut rx: mpsc::Receiver<Record>) {
    let mut first = true;

    while let Some(record) = rx.recv().await {
        if record.cancel {
            warn!(consumer = %name, "cancel signal received");
            break;
        }

        let mut consumer = inner.write().await;
        if first {
            consumer.prepare(record.ts);
            first = false;
        }

        if let Err(e) = consumer.consume(&record) {
            error!(
                source = %record.source_name,
                seq = record.seq_id,
                consumer = %name,
                error = %e,
                "error consuming record"
            );
            continue;
        }

        debug!(
            source = %record.source_name,
            seq = record.seq_id,
            consumer = %name,
            "record consumed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    use logsift_core::config::{AlertSourceSettingConfig, AlertTypeConfig};

    fn alert_handle(sources: &[&str]) -> ConsumerHandle {
        let consumer = AlertConsumer::from_config(&AlertTypeConfig {
            name: "test alert".to_owned(),
            duration_seconds: 60,
            threshold: 2,
            disabled: false,
            source_settings: sources
                .iter()
                .map(|s| AlertSourceSettingConfig {
                    name: (*s).to_owned(),
                    key: String::new(),
                    value_mutator_func: String::new(),
                    values: vec![],
                })
                .collect(),
        })
        .unwrap();

        let (tx, _rx) = mpsc::channel(CONSUMER_CHANNEL_CAPACITY);
        ConsumerHandle {
            name: "test alert".to_owned(),
            tx,
            inner: Arc::new(RwLock::new(AnyConsumer::Alert(consumer))),
        }
    }

    fn record_from(source: &str, ts: SystemTime) -> Record {
        Record {
            source_name: source.to_owned(),
            seq_id: 1,
            raw: String::new(),
            kv: HashMap::new(),
            ts,
            cancel: false,
        }
    }

    #[tokio::test]
    async fn registry_indexes_by_source() {
        let registry = ConsumerRegistry::new();
        registry.register(alert_handle(&["a", "b"])).await.unwrap();
        registry.register(alert_handle(&["b"])).await.unwrap();

        assert_eq!(registry.len().await, 2);
        assert_eq!(registry.subscribers("a").await.len(), 1);
        assert_eq!(registry.subscribers("b").await.len(), 2);
        assert!(registry.subscribers("c").await.is_empty());
        assert_eq!(registry.all().await.len(), 2);
    }

    #[tokio::test]
    async fn registry_rejects_consumer_without_sources() {
        let registry = ConsumerRegistry::new();
        let err = registry.register(alert_handle(&[])).await.unwrap_err();
        assert!(matches!(err, ConfigError::NoSourceSettings { .. }));
    }

    #[tokio::test]
    async fn worker_consumes_until_cancel() {
        let handle = alert_handle(&["src"]);
        let (tx, rx) = mpsc::channel(CONSUMER_CHANNEL_CAPACITY);
        let inner = Arc::clone(&handle.inner);

        let worker = tokio::spawn(run_worker("test alert".to_owned(), Arc::clone(&inner), rx));

        let now = UNIX_EPOCH + Duration::from_secs(1_000_000);
        tx.send(record_from("src", now)).await.unwrap();
        tx.send(record_from("src", now + Duration::from_secs(1)))
            .await
            .unwrap();
        tx.send(Record::cancel_signal()).await.unwrap();

        worker.await.unwrap();

        match &*inner.read().await {
            AnyConsumer::Alert(a) => {
                assert_eq!(a.moving_count(), 2);
                assert!(a.alert_open());
            }
            AnyConsumer::Stats(_) => panic!("expected alert consumer"),
        }
    }

    #[tokio::test]
    async fn worker_continues_after_consume_error() {
        let handle = alert_handle(&["src"]);
        let (tx, rx) = mpsc::channel(CONSUMER_CHANNEL_CAPACITY);
        let inner = Arc::clone(&handle.inner);

        let worker = tokio::spawn(run_worker("test alert".to_owned(), Arc::clone(&inner), rx));

        let now = UNIX_EPOCH + Duration::from_secs(1_000_000);
        // 미등록 소스의 레코드는 에러를 내지만 워커는 계속 진행
        tx.send(record_from("unknown_source", now)).await.unwrap();
        tx.send(record_from("src", now)).await.unwrap();
        tx.send(Record::cancel_signal()).await.unwrap();

        worker.await.unwrap();

        match &*inner.read().await {
            AnyConsumer::Alert(a) => assert_eq!(a.moving_count(), 1),
            AnyConsumer::Stats(_) => panic!("expected alert consumer"),
        }
    }
}
