//! 로그 수집 모듈 -- 소스별 라인 스트리밍
//!
//! 각 수집기는 자체 tokio 태스크에서 실행되며, 읽은 라인을
//! `tokio::mpsc::Sender<RawMessage>`를 통해 공유 큐로 전달합니다.
//!
//! # 수집 소스
//! - [`FileCollector`]: 파일을 처음부터 끝까지 스트리밍
//! - [`StdinCollector`]: 표준 입력 스트리밍
//!
//! # 공통 동작
//! - 라인 끝의 개행 문자 하나를 제거
//! - `\q` 라인은 해당 소스의 인밴드 종료 신호
//! - `use_firstline_as_header` 소스는 첫 라인을 헤더로 학습하고
//!   큐에 넣지 않음 (이후 라인은 `seq_id >= 2`)

pub mod file;
pub mod stdin;

pub use file::FileCollector;
pub use stdin::StdinCollector;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use logsift_core::config::LogSourceConfig;
use logsift_core::error::{ConfigError, PipelineError};
use logsift_core::record::RawMessage;

use crate::source::SourceRegistry;

/// 설정된 유형에 따른 수집기
pub enum Collector {
    /// 파일 소스
    File(FileCollector),
    /// 표준 입력 소스
    Stdin(StdinCollector),
}

impl Collector {
    /// 설정에서 수집기를 생성합니다.
    pub fn from_config(cfg: &LogSourceConfig) -> Result<Self, ConfigError> {
        match cfg.kind.as_str() {
            "file" => Ok(Self::File(FileCollector::new(&cfg.name, &cfg.path)?)),
            "stdin" => Ok(Self::Stdin(StdinCollector::new(&cfg.name))),
            other => Err(ConfigError::UnknownName {
                kind: "source type",
                name: other.to_owned(),
            }),
        }
    }

    /// 소스 이름을 반환합니다.
    pub fn name(&self) -> &str {
        match self {
            Self::File(c) => c.name(),
            Self::Stdin(c) => c.name(),
        }
    }

    /// 수집기를 실행합니다. 스트림이 끝나거나 종료 신호를 만나면 반환합니다.
    pub async fn run(
        self,
        registry: std::sync::Arc<SourceRegistry>,
        tx: mpsc::Sender<RawMessage>,
    ) -> Result<(), PipelineError> {
        match self {
            Self::File(c) => c.run(&registry, &tx).await,
            Self::Stdin(c) => c.run(&registry, &tx).await,
        }
    }
}

/// 버퍼 리더에서 라인을 읽어 원시 메시지로 전송하는 공통 루프
///
/// 첫 라인 헤더 부트스트랩과 시퀀스 ID 부여를 담당합니다.
pub(crate) async fn stream_lines<R>(
    name: &str,
    mut reader: R,
    registry: &SourceRegistry,
    tx: &mpsc::Sender<RawMessage>,
) -> Result<(), PipelineError>
where
    R: AsyncBufRead + Unpin,
{
    let mut seq_id: u64 = 0;
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read =
            reader
                .read_line(&mut line)
                .await
                .map_err(|e| PipelineError::SourceRead {
                    source_name: name.to_owned(),
                    reason: format!("failed to read line: {e}"),
                })?;

        if bytes_read == 0 {
            debug!(source = name, "stream EOF");
            break;
        }

        let text = strip_trailing_newline(&line);

        if text == "\\q" {
            debug!(source = name, "exit signal detected");
            break;
        }

        // 첫 라인이 헤더인 소스는 헤더를 레지스트리에 반영하고 큐로 보내지 않음
        if seq_id == 0 {
            let settings = registry.settings(name).await?;
            if settings.use_firstline_as_header {
                debug!(source = name, header = text, "first line is header");
                let headers = settings.format.split(text, true);
                registry.set_headers(name, headers).await?;
                seq_id += 1;
                continue;
            }
        }

        seq_id += 1;
        tx.send(RawMessage::new(name, seq_id, text))
            .await
            .map_err(|e| PipelineError::ChannelSend(e.to_string()))?;
    }

    Ok(())
}

/// 라인 끝의 개행 문자 하나를 제거합니다. `\r`은 건드리지 않습니다.
pub(crate) fn strip_trailing_newline(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::format::{LogFormat, TimestampFormat};
    use crate::source::SourceSettings;

    fn settings(use_firstline_as_header: bool) -> SourceSettings {
        SourceSettings {
            format: LogFormat::Csv,
            headers: vec!["date".to_owned(), "host".to_owned()],
            timestamp_key: "date".to_owned(),
            timestamp_format: TimestampFormat::Unix,
            use_firstline_as_header,
        }
    }

    async fn registry_with(name: &str, s: SourceSettings) -> Arc<SourceRegistry> {
        let registry = Arc::new(SourceRegistry::new());
        registry.register(name, s).await.unwrap();
        registry
    }

    #[test]
    fn strip_newline_variants() {
        assert_eq!(strip_trailing_newline(""), "");
        assert_eq!(strip_trailing_newline("abc\n"), "abc");
        assert_eq!(strip_trailing_newline("abc\r"), "abc\r");
        assert_eq!(strip_trailing_newline("\n"), "");
        assert_eq!(strip_trailing_newline("abc"), "abc");
    }

    #[tokio::test]
    async fn streams_lines_with_sequence_ids() {
        let registry = registry_with("src", settings(false)).await;
        let (tx, mut rx) = mpsc::channel(10);

        let input: &[u8] = b"100,a\n200,b\n";
        stream_lines("src", input, &registry, &tx).await.unwrap();
        drop(tx);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.seq_id, 1);
        assert_eq!(first.text, "100,a");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.seq_id, 2);
        assert_eq!(second.text, "200,b");

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn exit_signal_stops_stream() {
        let registry = registry_with("src", settings(false)).await;
        let (tx, mut rx) = mpsc::channel(10);

        let input: &[u8] = b"100,a\n\\q\n300,c\n";
        stream_lines("src", input, &registry, &tx).await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await.unwrap().text, "100,a");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn first_line_becomes_header() {
        let registry = registry_with("src", settings(true)).await;
        let (tx, mut rx) = mpsc::channel(10);

        let input: &[u8] = b"\"date\",\"host\",\"status\"\n100,a,200\n";
        stream_lines("src", input, &registry, &tx).await.unwrap();
        drop(tx);

        // 헤더 라인은 큐로 가지 않고, 레지스트리에 반영됨 (따옴표 제거)
        let updated = registry.settings("src").await.unwrap();
        assert_eq!(updated.headers, vec!["date", "host", "status"]);

        // 두 번째 라인이 seq_id = 2인 데이터
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.seq_id, 2);
        assert_eq!(msg.text, "100,a,200");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn only_first_line_is_treated_as_header() {
        let registry = registry_with("src", settings(true)).await;
        let (tx, mut rx) = mpsc::channel(10);

        let input: &[u8] = b"h1,h2\nd1,d2\nd3,d4\n";
        stream_lines("src", input, &registry, &tx).await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await.unwrap().seq_id, 2);
        assert_eq!(rx.recv().await.unwrap().seq_id, 3);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn from_config_rejects_unknown_type() {
        let cfg = LogSourceConfig {
            name: "src".to_owned(),
            kind: "socket".to_owned(),
            path: String::new(),
            disabled: false,
            settings: logsift_core::config::LogSourceSettingsConfig {
                format: "csv".to_owned(),
                headers: vec![],
                timestamp_key: "date".to_owned(),
                timestamp_format: "unix".to_owned(),
                use_firstline_as_header: false,
            },
        };
        assert!(matches!(
            Collector::from_config(&cfg),
            Err(ConfigError::UnknownName { .. })
        ));
    }
}
