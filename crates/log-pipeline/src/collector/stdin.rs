//! 표준 입력 로그 수집기
//!
//! 프로세스의 stdin을 라인 단위로 스트리밍합니다. EOF 또는 `\q` 라인에서
//! 종료합니다.

use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;

use logsift_core::error::PipelineError;
use logsift_core::record::RawMessage;

use super::stream_lines;
use crate::source::SourceRegistry;

/// 표준 입력 수집기
pub struct StdinCollector {
    /// 소스 이름
    name: String,
}

impl StdinCollector {
    /// 새 stdin 수집기를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// 소스 이름을 반환합니다.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// stdin을 EOF까지 스트리밍합니다.
    pub async fn run(
        &self,
        registry: &SourceRegistry,
        tx: &mpsc::Sender<RawMessage>,
    ) -> Result<(), PipelineError> {
        info!(source = %self.name, "streaming from stdin");
        let reader = BufReader::new(tokio::io::stdin());
        stream_lines(&self.name, reader, registry, tx).await
    }
}
