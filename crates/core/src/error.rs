//! 에러 타입 — 도메인별 에러 정의

/// Logsift 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogsiftError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 로그 라인 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 컨슈머 처리 에러
    #[error("consume error: {0}")]
    Consume(#[from] ConsumeError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
///
/// 시작 시점에 표면화되며 항상 치명적입니다.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일 경로가 비어 있음
    #[error("config file path is empty")]
    EmptyPath,

    /// 설정 파일을 읽을 수 없음
    #[error("cannot read config file '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 이름 기반 레지스트리(포맷, 타임스탬프, 노멀라이저)에 없는 이름
    #[error("unknown {kind} name: '{name}'")]
    UnknownName { kind: &'static str, name: String },

    /// 동일 로그 소스에 대한 per-source 설정이 중복됨
    #[error("duplicate source settings for log source '{source_name}' in consumer '{consumer}'")]
    DuplicateSourceSettings { consumer: String, source_name: String },

    /// 구독하는 로그 소스가 하나도 없는 컨슈머
    #[error("consumer '{consumer}' has no source settings")]
    NoSourceSettings { consumer: String },

    /// 활성화된 로그 소스가 없음
    #[error("no valid log sources configured")]
    NoLogSources,
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 디스패치 시점에 소스 레지스트리에 없는 소스 이름
    #[error("source '{0}' not found in registry")]
    UnknownSource(String),

    /// 소스 리더 에러 (파일 열기, 라인 읽기 등)
    #[error("source '{source_name}' read failed: {reason}")]
    SourceRead { source_name: String, reason: String },

    /// 채널 전송 실패 (수신측 종료)
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 워커 태스크가 join 불가능하게 종료됨 (패닉 등)
    #[error("worker task failed: {0}")]
    Task(String),
}

/// 로그 라인 파싱 에러
///
/// 팬아웃 스테이지에서 레코드 단위로 발생하며, 스테이지를 종료시킵니다.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 공백뿐인 메시지
    #[error("received an empty message")]
    EmptyMessage,

    /// 필드 수와 헤더 수 불일치
    #[error("field count does not match header count: expected {expected}, got {got}")]
    Arity { expected: usize, got: usize },

    /// 타임스탬프 필드 누락 또는 형식 오류
    #[error("cannot parse timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },
}

/// 컨슈머 처리 에러
///
/// 컨슈머 워커가 로그를 남기고 다음 레코드로 진행합니다. 다른 컨슈머에
/// 전파되지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    /// 레코드의 소스에 대한 per-source 설정이 없음
    #[error("consumer '{consumer}' has no source settings for '{source_name}'")]
    UnknownSourceSettings { consumer: String, source_name: String },

    /// 값 노멀라이저가 입력을 거부함
    #[error("normalizer rejected value '{input}': {reason}")]
    Normalizer { input: String, reason: String },
}
