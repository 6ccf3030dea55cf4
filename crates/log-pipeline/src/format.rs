//! 라인 포맷 및 타임스탬프 형식 레지스트리
//!
//! 두 레지스트리 모두 컴파일 타임에 닫혀 있으며, 설정 파일의 문자열
//! 이름으로 조회됩니다. 미지의 이름은 설정 검증 단계에서 즉시 실패합니다.
//!
//! | 포맷 | 동작 |
//! |---|---|
//! | `csv` | 쉼표 분리, 선택적 양끝 따옴표 제거, 헤더 정렬 key-value 맵 |
//!
//! | 타임스탬프 | 동작 |
//! |---|---|
//! | `unix` | 십진 정수 초 → `SystemTime` |

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use logsift_core::error::{ConfigError, ParseError};

/// 로그 라인 포맷
///
/// 설정의 `format` 필드 이름으로 선택됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 쉼표 구분 형식
    Csv,
}

impl LogFormat {
    /// 이름으로 포맷을 조회합니다. 미지의 이름은 설정 에러입니다.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "csv" => Ok(Self::Csv),
            other => Err(ConfigError::UnknownName {
                kind: "format",
                name: other.to_owned(),
            }),
        }
    }

    /// 포맷 식별자를 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
        }
    }

    /// 로그 라인을 개별 파트로 분리합니다.
    ///
    /// `strip_quotes`가 설정되면 양끝이 모두 `"`인 파트에서만 따옴표를
    /// 제거합니다. 헤더 부트스트랩 경로에서 사용됩니다.
    pub fn split(&self, text: &str, strip_quotes: bool) -> Vec<String> {
        match self {
            Self::Csv => text
                .split(',')
                .map(|part| {
                    if strip_quotes {
                        strip_surrounding_quotes(part).to_owned()
                    } else {
                        part.to_owned()
                    }
                })
                .collect(),
        }
    }

    /// 로그 라인을 헤더에 정렬된 key-value 맵으로 변환합니다.
    ///
    /// 파트 수가 헤더 수와 다르면 실패합니다. 헤더와 데이터의 순서는
    /// 동일하다고 가정합니다.
    pub fn to_kv(
        &self,
        text: &str,
        headers: &[String],
    ) -> Result<HashMap<String, String>, ParseError> {
        let parts = self.split(text, false);
        if parts.len() != headers.len() {
            return Err(ParseError::Arity {
                expected: headers.len(),
                got: parts.len(),
            });
        }

        let mut kv = HashMap::with_capacity(headers.len());
        for (header, part) in headers.iter().zip(parts) {
            kv.insert(header.clone(), part);
        }
        Ok(kv)
    }
}

/// 타임스탬프 형식
///
/// 설정의 `timestamp_format` 필드 이름으로 선택됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// Unix epoch 초
    Unix,
}

impl TimestampFormat {
    /// 이름으로 타임스탬프 형식을 조회합니다.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "unix" => Ok(Self::Unix),
            other => Err(ConfigError::UnknownName {
                kind: "timestamp format",
                name: other.to_owned(),
            }),
        }
    }

    /// 형식 식별자를 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unix => "unix",
        }
    }

    /// 시각 문자열을 `SystemTime`으로 파싱합니다.
    pub fn parse(&self, value: &str) -> Result<SystemTime, ParseError> {
        match self {
            Self::Unix => {
                let secs: i64 = value.parse().map_err(|_| ParseError::Timestamp {
                    value: value.to_owned(),
                    reason: "not a decimal unix timestamp".to_owned(),
                })?;
                if secs >= 0 {
                    Ok(UNIX_EPOCH + Duration::from_secs(secs as u64))
                } else {
                    Ok(UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()))
                }
            }
        }
    }
}

/// 양끝이 모두 `"`인 경우에만 따옴표를 제거합니다.
///
/// `"hello"` → `hello`, `"hello` → `"hello` 그대로.
pub fn strip_surrounding_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
