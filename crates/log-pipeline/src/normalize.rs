//! 값 노멀라이저 레지스트리
//!
//! 컨슈머가 집계 키로 쓰기 전에 원시 값을 가공하는 순수 함수들입니다.
//! 레지스트리는 컴파일 타임에 닫혀 있고, 설정의 `value_mutator_func`
//! 이름으로 조회됩니다. 빈 이름은 "노멀라이저 없음"을 뜻합니다.

use std::collections::HashMap;

use logsift_core::error::{ConfigError, ConsumeError};

/// 이름으로 등록된 값 노멀라이저
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// HTTP 요청 라인에서 첫 경로 섹션을 추출 (`GET /api/user HTTP/1.0` → `/api`)
    HttpStatusLineToSection,
}

impl Normalizer {
    /// 설정 이름으로 노멀라이저를 조회합니다.
    ///
    /// 빈 이름은 `None`(노멀라이저 없음)을 반환하고, 미지의 이름은
    /// 설정 에러입니다.
    pub fn from_name(name: &str) -> Result<Option<Self>, ConfigError> {
        match name {
            "" => Ok(None),
            "HTTPStatusLineToSection" => Ok(Some(Self::HttpStatusLineToSection)),
            other => Err(ConfigError::UnknownName {
                kind: "value mutator func",
                name: other.to_owned(),
            }),
        }
    }

    /// 노멀라이저 식별자를 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HttpStatusLineToSection => "HTTPStatusLineToSection",
        }
    }

    /// 입력값을 정규화합니다.
    pub fn apply(&self, input: &str) -> Result<String, ConsumeError> {
        match self {
            Self::HttpStatusLineToSection => http_status_line_to_section(input),
        }
    }
}

/// HTTP 요청 라인에서 웹사이트 섹션을 추출합니다.
///
/// 입력은 공백으로 정확히 3개 파트로 나뉘어야 하고, 가운데 파트(엔드포인트)는
/// `/`로 시작해야 합니다. 반환값은 `"/" + 첫 경로 세그먼트`입니다.
fn http_status_line_to_section(text: &str) -> Result<String, ConsumeError> {
    let parts: Vec<&str> = text.split(' ').collect();
    if parts.len() != 3 {
        return Err(ConsumeError::Normalizer {
            input: text.to_owned(),
            reason: format!("invalid number of parts: expected 3, got {}", parts.len()),
        });
    }

    let endpoint = parts[1];
    let mut segments = endpoint.split('/');

    // 엔드포인트가 `/`로 시작하면 첫 분할 조각은 빈 문자열이어야 함
    match segments.next() {
        Some("") => {}
        _ => {
            return Err(ConsumeError::Normalizer {
                input: text.to_owned(),
                reason: format!("expected endpoint to begin with '/': {endpoint}"),
            });
        }
    }

    match segments.next() {
        Some(section) if !section.is_empty() => Ok(format!("/{section}")),
        _ => Err(ConsumeError::Normalizer {
            input: text.to_owned(),
            reason: format!("not enough segments to extract a section: {endpoint}"),
        }),
    }
}

/// `keys`에 나열된 키만 복사한 맵을 만듭니다.
///
/// 결과 맵의 키 집합은 `keys`와 같고, 원본에 없는 키는 빈 문자열로
/// 매핑됩니다.
pub fn project_keys(kv: &HashMap<String, String>, keys: &[String]) -> HashMap<String, String> {
    let mut projected = HashMap::with_capacity(keys.len());
    for key in keys {
        let value = kv.get(key).cloned().unwrap_or_default();
        projected.insert(key.clone(), value);
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        assert_eq!(Normalizer::from_name("").unwrap(), None);
        assert_eq!(
            Normalizer::from_name("HTTPStatusLineToSection").unwrap(),
            Some(Normalizer::HttpStatusLineToSection)
        );
        assert!(matches!(
            Normalizer::from_name("LowerCase"),
            Err(ConfigError::UnknownName { .. })
        ));
    }

    #[test]
    fn section_normal_case() {
        let n = Normalizer::HttpStatusLineToSection;
        assert_eq!(n.apply("GET /api/user HTTP/1.0").unwrap(), "/api");
    }

    #[test]
    fn section_just_the_section() {
        let n = Normalizer::HttpStatusLineToSection;
        assert_eq!(n.apply("GET /api HTTP/1.0").unwrap(), "/api");
    }

    #[test]
    fn section_long_path_with_query() {
        let n = Normalizer::HttpStatusLineToSection;
        assert_eq!(n.apply("GET /report/api/xyz?123/ HTTP/1.0").unwrap(), "/report");
    }

    #[test]
    fn section_trailing_slash() {
        let n = Normalizer::HttpStatusLineToSection;
        assert_eq!(n.apply("GET /api/ HTTP/1.0").unwrap(), "/api");
    }

    #[test]
    fn section_rejects_missing_leading_slash() {
        let n = Normalizer::HttpStatusLineToSection;
        assert!(n.apply("GET api/ HTTP/1.0").is_err());
    }

    #[test]
    fn section_rejects_wrong_part_count() {
        let n = Normalizer::HttpStatusLineToSection;
        assert!(n.apply("api/ GET HTTP/1.0 GET").is_err());
        assert!(n.apply("GET /api").is_err());
    }

    #[test]
    fn section_rejects_bare_root() {
        // 섹션이 없는 루트 경로는 실패
        let n = Normalizer::HttpStatusLineToSection;
        assert!(n.apply("GET / HTTP/1.0").is_err());
    }

    #[test]
    fn section_result_has_single_slash() {
        // 유효 입력의 결과는 `/`로 시작하고 두 번째 `/`는 없어야 함
        let n = Normalizer::HttpStatusLineToSection;
        for input in [
            "GET /api/user HTTP/1.0",
            "POST /report/api/xyz HTTP/1.1",
            "GET / HTTP/1.0",
        ] {
            if let Ok(section) = n.apply(input) {
                assert!(section.starts_with('/'), "input: {input}");
                assert_eq!(section[1..].find('/'), None, "input: {input}");
            }
        }
    }

    #[test]
    fn project_keys_copies_listed_keys() {
        let mut kv = HashMap::new();
        for (k, v) in [("a", "_a"), ("b", "_b"), ("c", "_c"), ("d", "_d"), ("e", "_e")] {
            kv.insert(k.to_owned(), v.to_owned());
        }

        let keys = vec!["b".to_owned(), "c".to_owned()];
        let projected = project_keys(&kv, &keys);

        assert_eq!(projected.len(), 2);
        assert_eq!(projected["b"], "_b");
        assert_eq!(projected["c"], "_c");
    }

    #[test]
    fn project_keys_maps_missing_to_empty() {
        let kv = HashMap::new();
        let keys = vec!["host".to_owned()];
        let projected = project_keys(&kv, &keys);
        assert_eq!(projected["host"], "");
    }

    #[test]
    fn project_keys_handles_empty_key() {
        let mut kv = HashMap::new();
        kv.insert(String::new(), "_".to_owned());
        kv.insert("b".to_owned(), "_b".to_owned());

        let keys = vec!["b".to_owned(), String::new()];
        let projected = project_keys(&kv, &keys);

        assert_eq!(projected.len(), 2);
        assert_eq!(projected[""], "_");
        assert_eq!(projected["b"], "_b");
    }
}
