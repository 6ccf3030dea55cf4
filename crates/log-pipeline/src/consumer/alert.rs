//! 슬라이딩 윈도우 임계값 알림 컨슈머
//!
//! [`AlertConsumer`]는 최근 `window` 안에 들어온 레코드를 타임스탬프로
//! 정렬된 체인에 유지하면서, 체인 크기가 임계값 이상이 되는 순간 알림을
//! 열고 다시 내려가는 순간 닫습니다 (히스테리시스 없음).
//!
//! # 체인 표현
//! 이중 연결 리스트를 인덱스 기반 아레나(`Vec` + free list)로 표현합니다.
//! 삽입과 제거는 인덱스 편집이며, 소유권 순환이 없습니다.
//!
//! # 불변식 (매 consume 이후)
//! - 체인은 타임스탬프 비내림차순, `oldest`가 최소, `latest`가 최대
//! - 모든 노드 n에 대해 `latest.ts - n.ts <= window`
//! - `count`는 체인 노드 수와 일치
//! - `alert_open`은 마지막 에피소드의 `end` 미설정 여부와 일치

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use logsift_core::config::{AlertSourceSettingConfig, AlertTypeConfig};
use logsift_core::consumer::Consumer;
use logsift_core::error::{ConfigError, ConsumeError};
use logsift_core::record::{Record, unix_timestamp_str};

use crate::normalize::Normalizer;

/// 알림 컨슈머의 소스별 매칭 정책
#[derive(Debug, Clone)]
pub struct AlertSourceSettings {
    /// 매칭 기준 키 — 빈 문자열이면 해당 소스의 모든 레코드를 수용
    pub key: String,
    /// 선택적 값 노멀라이저
    pub normalizer: Option<Normalizer>,
    /// 수용 집합 — 정규화된 값이 여기에 속하면 카운트에 포함
    pub values: Vec<String>,
}

impl AlertSourceSettings {
    /// 설정 표현에서 정책을 생성합니다. 미지의 노멀라이저 이름은 실패합니다.
    pub fn from_config(cfg: &AlertSourceSettingConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            key: cfg.key.clone(),
            normalizer: Normalizer::from_name(&cfg.value_mutator_func)?,
            values: cfg.values.clone(),
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

    /// 레코드를 카운트에 포함할지 결정합니다.
    pub fn is_match(&self, record: &Record) -> Result<bool, ConsumeError> {
        // 키가 비어 있으면 값과 무관하게 전부 카운트
        if self.key.is_empty() {
            return Ok(true);
        }
        let value = self.cleaned_value(record)?;
        Ok(self.values.iter().any(|v| *v == value))
    }
}

/// 알림 에피소드 — 열린 시각과 (닫혔다면) 닫힌 시각
#[derive(Debug, Clone)]
pub struct AlertEpisode {
    /// 에피소드 ID
    pub id: String,
    /// 알림이 열린 시각
    pub start: SystemTime,
    /// 알림이 닫힌 시각 (진행 중이면 None)
    pub end: Option<SystemTime>,
}

/// 아레나에 저장되는 체인 노드
#[derive(Debug)]
struct ChainNode {
    record: Record,
    prev: Option<usize>,
    next: Option<usize>,
}

/// 슬라이딩 윈도우 임계값 알림 컨슈머
#[derive(Debug)]
pub struct AlertConsumer {
    name: String,
    window: Duration,
    threshold: u64,
    settings: HashMap<String, AlertSourceSettings>,

    nodes: Vec<Option<ChainNode>>,
    free: Vec<usize>,
    latest: Option<usize>,
    oldest: Option<usize>,
    count: u64,

    alert_open: bool,
    episodes: Vec<AlertEpisode>,
}

impl AlertConsumer {
    /// 설정에서 알림 컨슈머를 생성합니다.
    ///
    /// 같은 로그 소스에 대한 per-source 설정이 중복되면 실패합니다.
    pub fn from_config(cfg: &AlertTypeConfig) -> Result<Self, ConfigError> {
        let mut settings = HashMap::new();
        for src_cfg in &cfg.source_settings {
            if settings.contains_key(&src_cfg.name) {
                return Err(ConfigError::DuplicateSourceSettings {
                    consumer: cfg.name.clone(),
                    source_name: src_cfg.name.clone(),
                });
            }
            settings.insert(src_cfg.name.clone(), AlertSourceSettings::from_config(src_cfg)?);
        }

        Ok(Self {
            name: cfg.name.clone(),
            window: Duration::from_secs(cfg.duration_seconds),
            threshold: cfg.threshold,
            settings,
            nodes: Vec::new(),
            free: Vec::new(),
            latest: None,
            oldest: None,
            count: 0,
            alert_open: false,
            episodes: Vec::new(),
        })
    }

    /// 현재 윈도우 안의 레코드 수를 반환합니다.
    pub fn moving_count(&self) -> u64 {
        self.count
    }

    /// 알림이 진행 중인지 확인합니다.
    pub fn alert_open(&self) -> bool {
        self.alert_open
    }

    /// 지금까지 기록된 알림 에피소드를 반환합니다.
    pub fn episodes(&self) -> &[AlertEpisode] {
        &self.episodes
    }

    /// 체인의 타임스탬프를 오래된 순으로 반환합니다. 진단용입니다.
    pub fn chain_timestamps(&self) -> Vec<SystemTime> {
        let mut out = Vec::new();
        let mut cursor = self.oldest;
        while let Some(i) = cursor {
            let node = self.nodes[i].as_ref().expect("chain index points at freed node");
            out.push(node.record.ts);
            cursor = node.next;
        }
        out
    }

    fn node(&self, idx: usize) -> &ChainNode {
        self.nodes[idx].as_ref().expect("chain index points at freed node")
    }

    fn node_mut(&mut self, idx: usize) -> &mut ChainNode {
        self.nodes[idx].as_mut().expect("chain index points at freed node")
    }

    fn alloc(&mut self, node: ChainNode) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) {
        self.nodes[idx] = None;
        self.free.push(idx);
    }

    /// 새 레코드를 정렬된 체인에 삽입합니다.
    ///
    /// `latest`에서 `prev`를 따라 뒤로 걸으며 `node.ts <= record.ts`인 첫
    /// 노드를 찾아 그 뒤에 넣습니다 (동일 타임스탬프는 기존 노드 뒤 —
    /// 안정 삽입). 걸음이 소진되면 새 머리가 되어 기존 `oldest` 앞에
    /// 연결됩니다. 시간순 입력이면 꼬리에서 O(1)입니다.
    fn insert(&mut self, record: &Record) {
        let mut anchor = self.latest;
        while let Some(i) = anchor {
            if record.ts < self.node(i).record.ts {
                anchor = self.node(i).prev;
            } else {
                break;
            }
        }

        let idx = self.alloc(ChainNode {
            record: record.clone(),
            prev: anchor,
            next: None,
        });

        match anchor {
            Some(i) => {
                let next = self.node(i).next;
                self.node_mut(idx).next = next;
                self.node_mut(i).next = Some(idx);
                if let Some(n) = next {
                    self.node_mut(n).prev = Some(idx);
                }
            }
            None => {
                self.node_mut(idx).next = self.oldest;
                if let Some(o) = self.oldest {
                    self.node_mut(o).prev = Some(idx);
                }
            }
        }

        if self.node(idx).next.is_none() {
            self.latest = Some(idx);
        }
        if self.node(idx).prev.is_none() {
            self.oldest = Some(idx);
        }
    }

    /// `oldest`부터 윈도우를 벗어난 노드를 제거하고 제거 수를 반환합니다.
    ///
    /// 방금 삽입된 노드가 존재하므로 체인은 비어 있을 수 없고, `latest`
    /// 자신의 나이는 0이므로 루프는 항상 유지되는 노드에서 멈춥니다.
    fn evict(&mut self) -> u64 {
        let latest_idx = self.latest.expect("evict called on an empty chain");
        let latest_ts = self.node(latest_idx).record.ts;

        let mut removed: u64 = 0;
        let mut cursor = self.oldest;
        while let Some(i) = cursor {
            let age = latest_ts
                .duration_since(self.node(i).record.ts)
                .unwrap_or_default();
            if age > self.window {
                let next = self.node(i).next;
                self.release(i);
                removed += 1;
                cursor = next;
            } else {
                break;
            }
        }

        debug_assert!(cursor.is_some(), "eviction cannot drain past the newest node");
        if let Some(i) = cursor {
            self.node_mut(i).prev = None;
        }
        self.oldest = cursor;

        removed
    }

    fn trigger_alert(&mut self, start: SystemTime) {
        if self.alert_open {
            return;
        }
        self.episodes.push(AlertEpisode {
            id: uuid::Uuid::new_v4().to_string(),
            start,
            end: None,
        });
        self.alert_open = true;

        warn!(
            "{} generated an alert - hits = {}, triggered at {}",
            self.name,
            self.count,
            unix_timestamp_str(start),
        );
    }

    fn close_alert(&mut self, end: SystemTime) {
        if !self.alert_open {
            return;
        }
        if let Some(last) = self.episodes.last_mut() {
            last.end = Some(end);
        }
        self.alert_open = false;

        warn!("High traffic alert recovered at {}", unix_timestamp_str(end));
    }
}

impl Consumer for AlertConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribed_sources(&self) -> Vec<String> {
        self.settings.keys().cloned().collect()
    }

    fn prepare(&mut self, _first_ts: SystemTime) {
        // 기준 시각이 필요한 상태가 없음
    }

    fn consume(&mut self, record: &Record) -> Result<(), ConsumeError> {
        let settings =
            self.settings
                .get(&record.source_name)
                .ok_or_else(|| ConsumeError::UnknownSourceSettings {
                    consumer: self.name.clone(),
                    source_name: record.source_name.clone(),
                })?;

        if !settings.is_match(record)? {
            return Ok(());
        }

        debug!(
            source = %record.source_name,
            seq = record.seq_id,
            consumer = %self.name,
            "including record in the alert chain"
        );

        self.insert(record);
        let removed = self.evict();
        self.count = self.count + 1 - removed;

        let latest_idx = self.latest.expect("chain is non-empty after insert");
        let latest_ts = self.node(latest_idx).record.ts;

        if self.count >= self.threshold {
            self.trigger_alert(latest_ts);
        } else {
            self.close_alert(latest_ts);
        }

        Ok(())
    }
}
