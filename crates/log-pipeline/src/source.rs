//! 로그 소스 설정 및 레지스트리
//!
//! [`SourceSettings`]는 특정 소스에서 오는 라인을 파싱하는 데 필요한
//! 정보(포맷, 헤더, 타임스탬프 키/형식)를 담습니다. [`SourceRegistry`]는
//! 소스 이름으로 설정을 조회하는 프로세스 전역 맵입니다.
//!
//! # 변경 규율
//! 레지스트리 쓰기는 시작 시점 등록과, 소스당 최대 한 번의 헤더
//! 부트스트랩([`SourceRegistry::set_headers`])뿐입니다. 이후 모든 접근은
//! 레코드 단위 읽기입니다.

use std::collections::HashMap;

use tokio::sync::RwLock;

use logsift_core::config::LogSourceSettingsConfig;
use logsift_core::error::{ConfigError, ParseError, PipelineError};
use logsift_core::record::{RawMessage, Record};

use crate::format::{LogFormat, TimestampFormat};

/// 소스별 파싱 설정
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// 라인 포맷
    pub format: LogFormat,
    /// 헤더 목록 (데이터 파트와 같은 순서)
    pub headers: Vec<String>,
    /// 타임스탬프가 담긴 필드 이름
    pub timestamp_key: String,
    /// 타임스탬프 형식
    pub timestamp_format: TimestampFormat,
    /// 첫 라인을 헤더로 사용할지 여부
    pub use_firstline_as_header: bool,
}

impl SourceSettings {
    /// 설정 파일 표현에서 인스턴스를 생성합니다.
    ///
    /// 포맷/타임스탬프 형식 이름이 레지스트리에 없으면 실패합니다.
    pub fn from_config(cfg: &LogSourceSettingsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            format: LogFormat::from_name(&cfg.format)?,
            headers: cfg.headers.clone(),
            timestamp_key: cfg.timestamp_key.clone(),
            timestamp_format: TimestampFormat::from_name(&cfg.timestamp_format)?,
            use_firstline_as_header: cfg.use_firstline_as_header,
        })
    }

    /// 원시 메시지를 구조화된 레코드로 변환합니다.
    ///
    /// key-value 맵을 만들고 타임스탬프 필드를 파싱합니다. 타임스탬프
    /// 키가 맵에 없으면 빈 문자열 파싱이 되어 실패합니다.
    pub fn structure(&self, raw: &RawMessage) -> Result<Record, ParseError> {
        let kv = self.format.to_kv(&raw.text, &self.headers)?;

        let time_str = kv.get(&self.timestamp_key).map_or("", String::as_str);
        let ts = self.timestamp_format.parse(time_str)?;

        Ok(Record {
            source_name: raw.source_name.clone(),
            seq_id: raw.seq_id,
            raw: raw.text.clone(),
            kv,
            ts,
            cancel: raw.cancel,
        })
    }
}

/// 소스 이름 → 파싱 설정의 프로세스 전역 레지스트리
#[derive(Default)]
pub struct SourceRegistry {
    inner: RwLock<HashMap<String, SourceSettings>>,
}

impl SourceRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 소스를 등록합니다. 같은 이름의 재등록은 설정 에러입니다.
    pub async fn register(
        &self,
        name: impl Into<String>,
        settings: SourceSettings,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        let mut inner = self.inner.write().await;
        if inner.contains_key(&name) {
            return Err(ConfigError::InvalidValue {
                field: "log_sources".to_owned(),
                reason: format!("source '{name}' has already been registered"),
            });
        }
        inner.insert(name, settings);
        Ok(())
    }

    /// 헤더 부트스트랩 — 소스의 헤더를 첫 라인에서 배운 값으로 교체합니다.
    ///
    /// `use_firstline_as_header` 소스에 대해 소스당 정확히 한 번 호출됩니다.
    pub async fn set_headers(
        &self,
        name: &str,
        headers: Vec<String>,
    ) -> Result<(), PipelineError> {
        let mut inner = self.inner.write().await;
        match inner.get_mut(name) {
            Some(settings) => {
                settings.headers = headers;
                Ok(())
            }
            None => Err(PipelineError::UnknownSource(name.to_owned())),
        }
    }

    /// 소스 이름으로 설정을 조회합니다.
    pub async fn settings(&self, name: &str) -> Result<SourceSettings, PipelineError> {
        let inner = self.inner.read().await;
        inner
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownSource(name.to_owned()))
    }

    /// 등록된 소스 수를 반환합니다.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// 레지스트리가 비어 있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn apache_settings() -> SourceSettings {
        SourceSettings {
            format: LogFormat::Csv,
            headers: ["remotehost", "rfc931", "authuser", "date", "request", "status", "bytes"]
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            timestamp_key: "date".to_owned(),
            timestamp_format: TimestampFormat::Unix,
            use_firstline_as_header: false,
        }
    }

    #[test]
    fn from_config_resolves_names() {
        let cfg = LogSourceSettingsConfig {
            format: "csv".to_owned(),
            headers: vec!["date".to_owned()],
            timestamp_key: "date".to_owned(),
            timestamp_format: "unix".to_owned(),
            use_firstline_as_header: false,
        };
        let settings = SourceSettings::from_config(&cfg).unwrap();
        assert_eq!(settings.format, LogFormat::Csv);
        assert_eq!(settings.timestamp_format, TimestampFormat::Unix);
    }

    #[test]
    fn from_config_rejects_unknown_format() {
        let cfg = LogSourceSettingsConfig {
            format: "xml".to_owned(),
            headers: vec![],
            timestamp_key: "date".to_owned(),
            timestamp_format: "unix".to_owned(),
            use_firstline_as_header: false,
        };
        assert!(SourceSettings::from_config(&cfg).is_err());
    }

    #[test]
    fn structure_builds_record() {
        let settings = apache_settings();
        let raw = RawMessage::new(
            "apache",
            3,
            "\"10.0.0.5\",\"-\",\"apache\",1549573963,\"GET /api/user HTTP/1.0\",200,1234",
        );

        let record = settings.structure(&raw).unwrap();
        assert_eq!(record.source_name, "apache");
        assert_eq!(record.seq_id, 3);
        assert_eq!(record.kv.len(), 7);
        assert_eq!(record.kv["date"], "1549573963");
        assert_eq!(record.ts, UNIX_EPOCH + Duration::from_secs(1_549_573_963));
        assert_ne!(record.ts, UNIX_EPOCH);
    }

    #[test]
    fn structure_fails_on_missing_timestamp_key() {
        let mut settings = apache_settings();
        settings.timestamp_key = "nonexistent".to_owned();
        let raw = RawMessage::new("apache", 1, "a,b,c,1549573963,d,200,99");

        let err = settings.structure(&raw).unwrap_err();
        assert!(matches!(err, ParseError::Timestamp { .. }));
    }

    #[test]
    fn structure_fails_on_arity_mismatch() {
        let settings = apache_settings();
        let raw = RawMessage::new("apache", 1, "only,three,parts");
        assert!(matches!(
            settings.structure(&raw),
            Err(ParseError::Arity { expected: 7, got: 3 })
        ));
    }

    #[tokio::test]
    async fn registry_register_and_lookup() {
        let registry = SourceRegistry::new();
        registry
            .register("apache", apache_settings())
            .await
            .unwrap();

        assert_eq!(registry.len().await, 1);
        let settings = registry.settings("apache").await.unwrap();
        assert_eq!(settings.timestamp_key, "date");

        assert!(matches!(
            registry.settings("nginx").await,
            Err(PipelineError::UnknownSource(_))
        ));
    }

    #[tokio::test]
    async fn registry_rejects_duplicate_registration() {
        let registry = SourceRegistry::new();
        registry
            .register("apache", apache_settings())
            .await
            .unwrap();
        assert!(registry.register("apache", apache_settings()).await.is_err());
    }

    #[tokio::test]
    async fn registry_header_bootstrap() {
        let registry = SourceRegistry::new();
        let mut settings = apache_settings();
        settings.headers.clear();
        settings.use_firstline_as_header = true;
        registry.register("csvfile", settings).await.unwrap();

        registry
            .set_headers("csvfile", vec!["date".to_owned(), "host".to_owned()])
            .await
            .unwrap();

        let settings = registry.settings("csvfile").await.unwrap();
        assert_eq!(settings.headers, vec!["date", "host"]);

        assert!(registry
            .set_headers("unknown", vec![])
            .await
            .is_err());
    }
}
