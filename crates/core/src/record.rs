//! 도메인 타입 — 큐와 컨슈머 채널을 흐르는 로그 메시지

use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// 원시 로그 메시지
///
/// 소스 수집기가 생성하여 공유 큐로 전송하는 파싱 전 단위입니다.
/// `cancel`이 설정된 메시지는 팬아웃 스테이지 종료 신호이며, 내용은
/// 해석되지 않고 그대로 흘러갑니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// 소스 이름
    pub source_name: String,
    /// 소스 내에서 단조 증가하는 시퀀스 ID (1부터)
    pub seq_id: u64,
    /// 원시 로그 라인 (개행 제거됨)
    pub text: String,
    /// 종료 신호 여부
    pub cancel: bool,
}

impl RawMessage {
    /// 새 원시 메시지를 생성합니다.
    pub fn new(source_name: impl Into<String>, seq_id: u64, text: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            seq_id,
            text: text.into(),
            cancel: false,
        }
    }

    /// 종료 신호 메시지를 생성합니다.
    pub fn cancel_signal() -> Self {
        Self {
            source_name: String::new(),
            seq_id: 0,
            text: String::new(),
            cancel: true,
        }
    }
}

/// 구조화된 로그 레코드
///
/// 팬아웃 스테이지가 원시 메시지를 파싱하여 만들고, 구독하는 모든
/// 컨슈머가 동일한 레코드를 전달받습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// 소스 이름
    pub source_name: String,
    /// 소스 내 시퀀스 ID
    pub seq_id: u64,
    /// 원시 로그 라인
    pub raw: String,
    /// 헤더에 정렬된 key-value 맵 (타임스탬프 키 포함)
    pub kv: HashMap<String, String>,
    /// `kv`의 타임스탬프 필드에서 파싱한 이벤트 시각
    pub ts: SystemTime,
    /// 종료 신호 여부 — 컨슈머 워커 종료에 사용됩니다
    pub cancel: bool,
}

impl Record {
    /// 키에 해당하는 값을 반환합니다. 없으면 빈 문자열입니다.
    pub fn value(&self, key: &str) -> &str {
        self.kv.get(key).map_or("", String::as_str)
    }

    /// 컨슈머 워커 종료용 레코드를 생성합니다.
    pub fn cancel_signal() -> Self {
        Self {
            source_name: String::new(),
            seq_id: 0,
            raw: String::new(),
            kv: HashMap::new(),
            ts: UNIX_EPOCH,
            cancel: true,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {} ({} fields)",
            self.source_name,
            self.seq_id,
            unix_timestamp_str(self.ts),
            self.kv.len(),
        )
    }
}

/// `SystemTime`을 epoch 기준 초 문자열로 렌더링합니다.
///
/// 로그와 알림 메시지에서 사람이 읽을 시각 표기로 사용됩니다.
pub fn unix_timestamp_str(ts: SystemTime) -> String {
    match ts.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs().to_string(),
        Err(e) => format!("-{}", e.duration().as_secs()),
    }
}
