//! 파일 기반 로그 수집기
//!
//! 설정된 파일을 열어 처음부터 끝까지 라인 단위로 스트리밍합니다.
//! EOF 또는 `\q` 라인에서 정상 종료합니다.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::info;

use logsift_core::error::{ConfigError, PipelineError};
use logsift_core::record::RawMessage;

use super::stream_lines;
use crate::source::SourceRegistry;

/// 파일 기반 로그 수집기
pub struct FileCollector {
    /// 소스 이름
    name: String,
    /// 읽을 파일 경로
    path: PathBuf,
}

impl FileCollector {
    /// 새 파일 수집기를 생성합니다. 빈 경로는 설정 에러입니다.
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let name = name.into();
        let path = path.as_ref();
        if path.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("log_sources['{name}'].path"),
                reason: "file path is empty".to_owned(),
            });
        }
        Ok(Self {
            name,
            path: path.to_path_buf(),
        })
    }

    /// 소스 이름을 반환합니다.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 파일을 열고 끝까지 스트리밍합니다.
    pub async fn run(
        &self,
        registry: &SourceRegistry,
        tx: &mpsc::Sender<RawMessage>,
    ) -> Result<(), PipelineError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| PipelineError::SourceRead {
                source_name: self.name.clone(),
                reason: format!("failed to open {:?}: {}", self.path, e),
            })?;

        info!(source = %self.name, path = %self.path.display(), "streaming log file");

        let reader = BufReader::new(file);
        stream_lines(&self.name, reader, registry, tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use tempfile::NamedTempFile;

    use crate::format::{LogFormat, TimestampFormat};
    use crate::source::SourceSettings;

    fn settings() -> SourceSettings {
        SourceSettings {
            format: LogFormat::Csv,
            headers: vec!["date".to_owned(), "host".to_owned()],
            timestamp_key: "date".to_owned(),
            timestamp_format: TimestampFormat::Unix,
            use_firstline_as_header: false,
        }
    }

    #[test]
    fn rejects_empty_path() {
        assert!(FileCollector::new("src", "").is_err());
        assert!(FileCollector::new("src", "  ").is_err());
    }

    #[tokio::test]
    async fn streams_file_contents() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "100,alpha").unwrap();
        writeln!(temp_file, "200,beta").unwrap();
        temp_file.flush().unwrap();

        let registry = Arc::new(SourceRegistry::new());
        registry.register("src", settings()).await.unwrap();

        let (tx, mut rx) = mpsc::channel(10);
        let collector = FileCollector::new("src", temp_file.path()).unwrap();
        collector.run(&registry, &tx).await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await.unwrap().text, "100,alpha");
        assert_eq!(rx.recv().await.unwrap().text, "200,beta");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let registry = Arc::new(SourceRegistry::new());
        registry.register("src", settings()).await.unwrap();

        let (tx, _rx) = mpsc::channel(10);
        let collector = FileCollector::new("src", "/nonexistent/access.log").unwrap();
        let err = collector.run(&registry, &tx).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceRead { .. }));
    }
}
