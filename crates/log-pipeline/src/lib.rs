#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: 소스별 라인 수집 (파일, stdin), `\q` 종료 신호, 헤더 부트스트랩
//! - [`format`]: 라인 포맷(csv)과 타임스탬프 형식(unix)의 닫힌 레지스트리
//! - [`normalize`]: 값 노멀라이저 레지스트리와 key-value 투영
//! - [`source`]: 소스별 파싱 설정과 소스 레지스트리
//! - [`dispatch`]: 팬아웃 스테이지 (파싱 + 구독자 라우팅)
//! - [`consumer`]: Alert/Stats 컨슈머, 컨슈머 인덱스, 워커 루프
//! - [`pipeline`]: 전체 파이프라인 조립과 실행
//!
//! # 아키텍처
//!
//! ```text
//! Collectors -> mpsc(공유 큐) -> Fan-out -> mpsc(컨슈머별) -> AlertConsumer
//!     |                           |                        -> StatsConsumer
//!  File/Stdin               파싱 + 라우팅
//! ```

pub mod collector;
pub mod consumer;
pub mod dispatch;
pub mod format;
pub mod normalize;
pub mod pipeline;
pub mod source;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// 수집기
pub use collector::{Collector, FileCollector, StdinCollector};

// 포맷
pub use format::{LogFormat, TimestampFormat};

// 노멀라이저
pub use normalize::{Normalizer, project_keys};

// 소스
pub use source::{SourceRegistry, SourceSettings};

// 컨슈머
pub use consumer::{
    AlertConsumer, AnyConsumer, ConsumerHandle, ConsumerRegistry, StatsConsumer, run_worker,
};

// 디스패치
pub use dispatch::{DispatchCounters, run_fanout};
