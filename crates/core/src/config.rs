//! 설정 관리 — logsift.toml 파싱 및 시작 시점 검증
//!
//! 설정 파일의 구조는 다음과 같습니다:
//!
//! ```toml
//! queue_buffer_size = 100
//! debug_level_not = 2
//!
//! [[log_sources]]
//! name = "apache"
//! type = "file"
//! path = "/var/log/apache.log"
//! [log_sources.settings]
//! format = "csv"
//! headers = ["remotehost", "rfc931", "authuser", "date", "request", "status", "bytes"]
//! timestamp_key = "date"
//! timestamp_format = "unix"
//!
//! [[stats.types]]
//! name = "section hits"
//! duration_seconds = 10
//! [[stats.types.source_settings]]
//! name = "apache"
//! key = "request"
//! value_mutator_func = "HTTPStatusLineToSection"
//! other_keys = ["status"]
//!
//! [[alert.types]]
//! name = "high traffic"
//! duration_seconds = 120
//! threshold = 10
//! [[alert.types.source_settings]]
//! name = "apache"
//! ```
//!
//! 이름으로 참조되는 레지스트리(포맷, 타임스탬프 형식, 값 노멀라이저)의
//! 미지 이름 검증은 해당 레지스트리를 소유한 파이프라인 크레이트에서
//! 인스턴스 생성 시점에 수행됩니다.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Logsift 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 공유 인바운드 큐의 버퍼 크기 (1 이상)
    pub queue_buffer_size: usize,
    /// 진단 로그 억제 수준 (높을수록 조용해짐)
    #[serde(default)]
    pub debug_level_not: i64,
    /// 로그 출력 형식 (pretty, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// 로그 소스 정의
    #[serde(default)]
    pub log_sources: Vec<LogSourceConfig>,
    /// 통계 컨슈머 정의
    #[serde(default)]
    pub stats: StatsSection,
    /// 알림 컨슈머 정의
    #[serde(default)]
    pub alert: AlertSection,
}

fn default_log_format() -> String {
    "pretty".to_owned()
}

/// `[stats]` 섹션
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSection {
    /// 통계 타입 목록
    #[serde(default)]
    pub types: Vec<StatsTypeConfig>,
}

/// `[alert]` 섹션
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertSection {
    /// 알림 타입 목록
    #[serde(default)]
    pub types: Vec<AlertTypeConfig>,
}

/// 로그 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSourceConfig {
    /// 소스 이름 (파이프라인 전역에서 유일)
    pub name: String,
    /// 소스 유형 (file, stdin)
    #[serde(rename = "type")]
    pub kind: String,
    /// 파일 경로 (file 유형 전용)
    #[serde(default)]
    pub path: String,
    /// 비활성화 여부 — 비활성 소스는 건너뜁니다
    #[serde(default)]
    pub disabled: bool,
    /// 파싱 설정
    pub settings: LogSourceSettingsConfig,
}

/// 로그 소스 파싱 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSourceSettingsConfig {
    /// 라인 포맷 이름 (csv)
    pub format: String,
    /// 헤더 목록 — `use_firstline_as_header`가 아니면 필수
    #[serde(default)]
    pub headers: Vec<String>,
    /// 타임스탬프가 담긴 필드 이름
    pub timestamp_key: String,
    /// 타임스탬프 형식 이름 (unix)
    pub timestamp_format: String,
    /// 첫 라인을 헤더로 사용할지 여부
    #[serde(default)]
    pub use_firstline_as_header: bool,
}

/// 통계 컨슈머 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsTypeConfig {
    /// 컨슈머 이름
    pub name: String,
    /// 텀블링 윈도우 길이 (초, 1 이상)
    pub duration_seconds: u64,
    /// 비활성화 여부
    #[serde(default)]
    pub disabled: bool,
    /// 소스별 집계 정책
    #[serde(default)]
    pub source_settings: Vec<StatsSourceSettingConfig>,
}

/// 통계 컨슈머의 소스별 정책
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSourceSettingConfig {
    /// 대상 로그 소스 이름
    pub name: String,
    /// 집계 기준 키
    #[serde(default)]
    pub key: String,
    /// 값 노멀라이저 이름 (빈 문자열이면 없음)
    #[serde(default)]
    pub value_mutator_func: String,
    /// 부가 분해(breakdown) 키 목록
    #[serde(default)]
    pub other_keys: Vec<String>,
}

/// 알림 컨슈머 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertTypeConfig {
    /// 컨슈머 이름
    pub name: String,
    /// 슬라이딩 윈도우 길이 (초, 1 이상)
    pub duration_seconds: u64,
    /// 알림 발동 임계값 (1 이상)
    pub threshold: u64,
    /// 비활성화 여부
    #[serde(default)]
    pub disabled: bool,
    /// 소스별 매칭 정책
    #[serde(default)]
    pub source_settings: Vec<AlertSourceSettingConfig>,
}

/// 알림 컨슈머의 소스별 정책
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertSourceSettingConfig {
    /// 대상 로그 소스 이름
    pub name: String,
    /// 매칭 기준 키 (빈 문자열이면 전체 수용)
    #[serde(default)]
    pub key: String,
    /// 값 노멀라이저 이름 (빈 문자열이면 없음)
    #[serde(default)]
    pub value_mutator_func: String,
    /// 수용 집합 — 정규화된 값이 여기에 속하면 카운트에 포함
    #[serde(default)]
    pub values: Vec<String>,
}

impl Config {
    /// TOML 설정 파일을 읽고 파싱한 뒤 검증합니다.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let path_str = path.to_string_lossy();
        if path_str.trim().is_empty() {
            return Err(ConfigError::EmptyPath);
        }

        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ConfigError::Unreadable {
                    path: path_str.into_owned(),
                    reason: e.to_string(),
                })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_buffer_size < 1 {
            return Err(ConfigError::InvalidValue {
                field: "queue_buffer_size".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        match self.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "log_format".to_owned(),
                    reason: format!("expected 'pretty' or 'json', got '{other}'"),
                });
            }
        }

        if self.log_sources.is_empty() {
            return Err(ConfigError::NoLogSources);
        }

        for src in &self.log_sources {
            src.validate()?;
        }

        for st in &self.stats.types {
            if !st.disabled && st.duration_seconds < 1 {
                return Err(ConfigError::InvalidValue {
                    field: format!("stats.types['{}'].duration_seconds", st.name),
                    reason: "must be at least 1".to_owned(),
                });
            }
        }

        for at in &self.alert.types {
            if at.disabled {
                continue;
            }
            if at.duration_seconds < 1 {
                return Err(ConfigError::InvalidValue {
                    field: format!("alert.types['{}'].duration_seconds", at.name),
                    reason: "must be at least 1".to_owned(),
                });
            }
            if at.threshold < 1 {
                return Err(ConfigError::InvalidValue {
                    field: format!("alert.types['{}'].threshold", at.name),
                    reason: "must be at least 1".to_owned(),
                });
            }
        }

        Ok(())
    }
}

impl LogSourceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.disabled {
            return Ok(());
        }

        match self.kind.as_str() {
            "file" => {
                if self.path.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("log_sources['{}'].path", self.name),
                        reason: "file source requires a non-empty path".to_owned(),
                    });
                }
            }
            "stdin" => {}
            other => {
                return Err(ConfigError::UnknownName {
                    kind: "source type",
                    name: other.to_owned(),
                });
            }
        }

        if !self.settings.use_firstline_as_header && self.settings.headers.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("log_sources['{}'].settings.headers", self.name),
                reason: "headers are required unless use_firstline_as_header is set".to_owned(),
            });
        }

        Ok(())
    }
}
