//! 텀블링 윈도우 통계 컨슈머
//!
//! [`StatsConsumer`]는 고정 길이의 연속 윈도우(`[start, end)`)마다 값별
//! 카운트와 부가 키 분해(breakdown)를 집계합니다. 윈도우가 넘어가면 바로
//! 보고하지 않고, `latest_ts`가 윈도우 끝을 2초 이상 지난 뒤에 보고를
//! 내보냅니다 — 순서가 어긋나게 도착하는 레코드를 위한 유예입니다.
//!
//! # 불변식 (매 consume 이후)
//! - `windows[0]`은 epoch에서 시작하는 센티널로, 과거 밖 레코드를 수용
//! - `i >= 1`에 대해 `windows[i].start == windows[i-1].end`,
//!   `windows[i].end == windows[i].start + window`
//! - 모든 레코드는 정확히 하나의 윈도우에 속함 (오른쪽 반개 구간)
//! - 같은 윈도우 인덱스는 최대 한 번만 보고됨

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use logsift_core::config::{StatsSourceSettingConfig, StatsTypeConfig};
use logsift_core::consumer::Consumer;
use logsift_core::error::{ConfigError, ConsumeError};
use logsift_core::record::{Record, unix_timestamp_str};

use crate::normalize::{Normalizer, project_keys};

/// 보고 전 유예 시간 — 이만큼 지연된 데이터까지 집계에 포함됩니다.
const FLUSH_LAG: Duration = Duration::from_secs(2);

/// 보고에 포함되는 상위 값 수
const REPORT_TOP_VALUES: usize = 4;

/// 통계 컨슈머의 소스별 집계 정책
#[derive(Debug, Clone)]
pub struct StatsSourceSettings {
    /// 집계 기준 키
    pub key: String,
    /// 선택적 값 노멀라이저
    pub normalizer: Option<Normalizer>,
    /// 부가 분해 키 목록
    pub other_keys: Vec<String>,
}

impl StatsSourceSettings {
    /// 설정 표현에서 정책을 생성합니다. 미지의 노멀라이저 이름은 실패합니다.
    pub fn from_config(cfg: &StatsSourceSettingConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            key: cfg.key.clone(),
            normalizer: Normalizer::from_name(&cfg.value_mutator_func)?,
            other_keys: cfg.other_keys.clone(),
        })
    }

    /// 레코드에서 기준 키의 값을 꺼내 정규화합니다.
    pub fn cleaned_value(&self, record: &Record) -> Result<String, ConsumeError> {
        let value = record.value(&self.key);
        match self.normalizer {
            Some(n) => n.apply(value),
            None => Ok(value.to_owned()),
        }
    }

    /// 부가 분해 키만 복사한 key-value 맵을 만듭니다.
    pub fn cleaned_kv(&self, record: &Record) -> HashMap<String, String> {
        project_keys(&record.kv, &self.other_keys)
    }
}

/// 한 값에 대한 윈도우 내 집계
#[derive(Debug, Clone, Default)]
pub struct ValueStats {
    /// 값의 출현 횟수
    pub count: u64,
    /// 부가 키별 값 분포: key → value → count
    pub other: HashMap<String, HashMap<String, u64>>,
}

/// 하나의 텀블링 윈도우 `[start, end)`
#[derive(Debug, Clone)]
pub struct StatsWindow {
    /// 윈도우 시작 (포함)
    pub start: SystemTime,
    /// 윈도우 끝 (미포함)
    pub end: SystemTime,
    /// 값별 집계
    pub buckets: HashMap<String, ValueStats>,
    /// 이미 보고되었는지 여부
    flushed: bool,
}

impl StatsWindow {
    fn new(start: SystemTime, end: SystemTime) -> Self {
        Self {
            start,
            end,
            buckets: HashMap::new(),
            flushed: false,
        }
    }

    /// 값 카운트와 부가 키 분포를 증가시킵니다.
    fn add(&mut self, value: String, other_kv: HashMap<String, String>) {
        let stats = self.buckets.entry(value).or_default();
        stats.count += 1;
        for (key, val) in other_kv {
            *stats.other.entry(key).or_default().entry(val).or_default() += 1;
        }
    }
}

/// 텀블링 윈도우 통계 컨슈머
pub struct StatsConsumer {
    name: String,
    window: Duration,
    settings: HashMap<String, StatsSourceSettings>,

    windows: Vec<StatsWindow>,
    current: usize,
    pending_flush: Vec<usize>,
    latest_ts: SystemTime,
}

impl StatsConsumer {
    /// 설정에서 통계 컨슈머를 생성합니다.
    ///
    /// 같은 로그 소스에 대한 per-source 설정이 중복되면 실패합니다.
    pub fn from_config(cfg: &StatsTypeConfig) -> Result<Self, ConfigError> {
        let mut settings = HashMap::new();
        for src_cfg in &cfg.source_settings {
            if settings.contains_key(&src_cfg.name) {
                return Err(ConfigError::DuplicateSourceSettings {
                    consumer: cfg.name.clone(),
                    source_name: src_cfg.name.clone(),
                });
            }
            settings.insert(src_cfg.name.clone(), StatsSourceSettings::from_config(src_cfg)?);
        }

        Ok(Self {
            name: cfg.name.clone(),
            window: Duration::from_secs(cfg.duration_seconds),
            settings,
            windows: Vec::new(),
            current: 0,
            pending_flush: Vec::new(),
            latest_ts: UNIX_EPOCH,
        })
    }

    /// 윈도우 수를 반환합니다.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// 마지막으로 기록한 윈도우의 인덱스를 반환합니다.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// 보고 대기 중인 윈도우 인덱스 목록을 반환합니다.
    pub fn pending_flush(&self) -> &[usize] {
        &self.pending_flush
    }

    /// 지금까지 관측한 가장 늦은 타임스탬프를 반환합니다.
    pub fn latest_ts(&self) -> SystemTime {
        self.latest_ts
    }

    /// 인덱스의 윈도우를 반환합니다. 진단용입니다.
    pub fn window(&self, idx: usize) -> Option<&StatsWindow> {
        self.windows.get(idx)
    }

    /// 타임스탬프가 속하는 윈도우 인덱스를 결정합니다.
    ///
    /// `current`에서 시작해 앞뒤로 걷습니다. 끝을 지나면 연속된 새
    /// 윈도우를 만들어 붙이고(`created = true`), 시작 앞이면 센티널
    /// 방향으로 내려갑니다. 구간은 오른쪽 반개이므로 `end` 정각의
    /// 레코드는 다음 윈도우에 속합니다.
    fn determine_window(&mut self, ts: SystemTime) -> (usize, bool) {
        let mut created = false;
        let mut idx = self.current;

        loop {
            if idx >= self.windows.len() {
                created = true;
                let last_end = self
                    .windows
                    .last()
                    .expect("windows are seeded in prepare")
                    .end;
                let new_window = StatsWindow::new(last_end, last_end + self.window);
                debug!(
                    consumer = %self.name,
                    start = %unix_timestamp_str(new_window.start),
                    end = %unix_timestamp_str(new_window.end),
                    "creating a new stats window"
                );
                self.windows.push(new_window);
                continue;
            }

            let window = &self.windows[idx];
            if ts < window.start {
                if idx == 0 {
                    // 센티널은 그보다 이른 모든 시각을 수용
                    break;
                }
                idx -= 1;
                continue;
            }
            if ts >= window.end {
                idx += 1;
                continue;
            }
            break;
        }

        (idx, created)
    }

    /// 유예 시간이 지난 대기 윈도우를 보고하고 목록에서 제거합니다.
    fn release_pending(&mut self) {
        let mut i = 0;
        while i < self.pending_flush.len() {
            let idx = self.pending_flush[i];
            let lag = self
                .latest_ts
                .duration_since(self.windows[idx].end)
                .unwrap_or_default();
            if lag > FLUSH_LAG {
                let report = self.render_report(idx);
                info!("{report}");
                self.windows[idx].flushed = true;
                self.pending_flush.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// 윈도우 보고서를 렌더링합니다.
    ///
    /// 값을 카운트 내림차순으로 정렬해 상위 몇 개만 싣고, 각 값마다
    /// 부가 키별 분포를 함께 출력합니다. 동률은 값 이름 오름차순으로
    /// 안정적으로 정렬됩니다.
    pub fn render_report(&self, idx: usize) -> String {
        let window = &self.windows[idx];

        let mut ordered: Vec<(&String, &ValueStats)> = window.buckets.iter().collect();
        ordered.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));

        let mut report = format!(
            "[{}] Stats Report:\n\tTime Start: {}\n\tTime End  : {}\n",
            self.name,
            unix_timestamp_str(window.start),
            unix_timestamp_str(window.end),
        );

        for (value, stats) in ordered.into_iter().take(REPORT_TOP_VALUES) {
            report.push_str(&format!("\t\t{value}\t:\t{}\n", stats.count));

            let mut other_keys: Vec<&String> = stats.other.keys().collect();
            other_keys.sort();
            for key in other_keys {
                report.push_str(&format!("\t\t\tBreakdown by {key}\n"));
                let mut entries: Vec<(&String, &u64)> = stats.other[key].iter().collect();
                entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
                for (val, count) in entries {
                    report.push_str(&format!("\t\t\t\t{val}\t:\t{count}\n"));
                }
            }
        }

        report
    }
}

impl Consumer for StatsConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribed_sources(&self) -> Vec<String> {
        self.settings.keys().cloned().collect()
    }

    fn prepare(&mut self, first_ts: SystemTime) {
        if self.windows.is_empty() {
            debug!(consumer = %self.name, "initializing stats windows");
            // 센티널은 과거에서 오는 레코드를 위한 수용처
            self.windows = vec![
                StatsWindow::new(UNIX_EPOCH, first_ts),
                StatsWindow::new(first_ts, first_ts + self.window),
            ];
            self.current = 1;
        }
    }

    fn consume(&mut self, record: &Record) -> Result<(), ConsumeError> {
        let (idx, created) = self.determine_window(record.ts);

        // 새 윈도우가 만들어졌다면 직전 current를 보고 대기열에 올림.
        // 이미 보고되었거나 대기 중인 인덱스는 다시 올리지 않음.
        if created {
            let previous = self.current;
            if !self.windows[previous].flushed && !self.pending_flush.contains(&previous) {
                self.pending_flush.push(previous);
            }
        }

        let settings =
            self.settings
                .get(&record.source_name)
                .ok_or_else(|| ConsumeError::UnknownSourceSettings {
                    consumer: self.name.clone(),
                    source_name: record.source_name.clone(),
                })?;

        let value = settings.cleaned_value(record)?;
        let other_kv = settings.cleaned_kv(record);

        debug!(
            source = %record.source_name,
            seq = record.seq_id,
            consumer = %self.name,
            window = idx,
            value = %value,
            "bucketing record"
        );

        self.windows[idx].add(value, other_kv);
        self.current = idx;

        if self.latest_ts < record.ts {
            self.latest_ts = record.ts;
        }

        self.release_pending();

        Ok(())
    }
}
