//! 팬아웃 스테이지 -- 공유 큐를 드레인하여 파싱하고 구독자에게 라우팅합니다.
//!
//! 파싱과 라우팅을 한곳에 모아 컨슈머가 포맷을 몰라도 되게 하고, 같은
//! 레코드를 구독하는 모든 컨슈머가 동일한 파싱 결과를 받도록 보장합니다.
//!
//! # 배압
//! 컨슈머 채널로의 전송은 블로킹입니다. 느린 컨슈머는 팬아웃을 느리게
//! 하고, 그 배압이 공유 큐를 거쳐 수집기까지 전파됩니다. 레코드는
//! 드롭되지 않습니다.
//!
//! # 실패 정책
//! 공백뿐인 라인, 미등록 소스, 파싱 실패(필드 수/타임스탬프)는 스테이지를
//! 종료시키는 치명적 에러입니다. 스테이지가 종료되면 큐의 수신측이 닫혀
//! 수집기의 전송이 실패하므로, 생산자들도 자연스럽게 정리됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use logsift_core::error::{LogsiftError, ParseError, PipelineError};
use logsift_core::record::{RawMessage, Record};

use crate::consumer::ConsumerRegistry;
use crate::source::SourceRegistry;

/// 팬아웃 스테이지에서 공유되는 카운터
#[derive(Default)]
pub struct DispatchCounters {
    /// 성공적으로 파싱되어 라우팅된 레코드 수
    pub processed: AtomicU64,
    /// 파싱 실패 수
    pub parse_errors: AtomicU64,
}

/// 팬아웃 워커 — 취소 신호를 만나거나 치명적 에러가 날 때까지 실행됩니다.
///
/// 취소 신호는 모든 컨슈머 채널로 전파한 뒤 정상 종료합니다. 큐의 모든
/// 송신측이 닫혀도 정상 종료합니다.
pub async fn run_fanout(
    mut queue_rx: mpsc::Receiver<RawMessage>,
    sources: Arc<SourceRegistry>,
    consumers: Arc<ConsumerRegistry>,
    counters: Arc<DispatchCounters>,
) -> Result<(), LogsiftError> {
    while let Some(raw) = queue_rx.recv().await {
        if raw.cancel {
            warn!(source = %raw.source_name, seq = raw.seq_id, "cancel signal received");
            for handle in consumers.all().await {
                if handle.tx.send(Record::cancel_signal()).await.is_err() {
                    // 이미 종료된 워커는 무시
                    debug!(consumer = %handle.name, "consumer channel already closed");
                }
            }
            return Ok(());
        }

        debug!(source = %raw.source_name, seq = raw.seq_id, "message received from queue");

        if raw.text.trim().is_empty() {
            return Err(ParseError::EmptyMessage.into());
        }

        let settings = sources.settings(&raw.source_name).await?;

        let record = match settings.structure(&raw) {
            Ok(record) => record,
            Err(e) => {
                counters.parse_errors.fetch_add(1, Ordering::Relaxed);
                return Err(e.into());
            }
        };
        counters.processed.fetch_add(1, Ordering::Relaxed);

        let subscribers = consumers.subscribers(&raw.source_name).await;
        debug!(
            source = %raw.source_name,
            seq = raw.seq_id,
            subscribers = subscribers.len(),
            "routing record"
        );

        for handle in subscribers {
            handle
                .tx
                .send(record.clone())
                .await
                .map_err(|e| PipelineError::ChannelSend(e.to_string()))?;
        }
    }

    debug!("queue closed, fan-out finished");
    Ok(())
}
