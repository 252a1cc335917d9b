//! 프로토콜 설정

use std::time::Duration;

use crate::message::PREAMBLE_LEN;
use crate::{Error, Result, DEFAULT_MSG_TOTAL_LEN, DEFAULT_TIMEOUT_MS, DEFAULT_WINDOW_SIZE, MSG_HEADER_LEN};

/// UDP 데이터그램 최대 페이로드 (IPv4)
pub const MAX_DATAGRAM_LEN: usize = 65507;

/// linger 연장 상한 (linger_ms 배수)
const MAX_LINGER_FACTOR: u32 = 8;

/// 전송 설정
///
/// 송신자와 수신자 생성 시 넘겨준다. 전송마다 별도 값을 쓸 수 있으므로
/// 서로 다른 튜닝의 전송이 동시에 존재할 수 있다.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// 프레임 최대 길이 (헤더 포함, 바이트)
    pub msg_total_len: usize,

    /// 동시에 ACK 대기 가능한 최대 프레임 수
    /// 고정값이며 RTT에 따라 조정하지 않는다
    pub window_size: usize,

    /// ACK 대기 타임아웃 (밀리초)
    /// 만료 시 윈도우 전체 재전송
    pub timeout_ms: u64,

    /// 전송 전체 데드라인 (밀리초)
    /// None이면 무기한 대기
    pub transfer_deadline_ms: Option<u64>,

    /// 수신 완료 후 마지막 ACK 재전송을 위해 대기하는 시간 (밀리초)
    /// 0이면 바로 반환
    pub linger_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            msg_total_len: DEFAULT_MSG_TOTAL_LEN,
            window_size: DEFAULT_WINDOW_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,  // 500ms
            transfer_deadline_ms: None,      // 무기한
            linger_ms: 2 * DEFAULT_TIMEOUT_MS,
        }
    }
}

impl TransferConfig {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 프레임 하나에 담을 수 있는 최대 페이로드 크기
    pub fn max_payload_len(&self) -> usize {
        self.msg_total_len.saturating_sub(MSG_HEADER_LEN)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn transfer_deadline(&self) -> Option<Duration> {
        self.transfer_deadline_ms.map(Duration::from_millis)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    /// 재전송으로 linger가 연장되더라도 넘지 않는 총 대기 시간
    pub fn max_linger(&self) -> Duration {
        self.linger() * MAX_LINGER_FACTOR
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidConfig {
                field: "window_size",
                reason: "최소 1 이상이어야 함".into(),
            });
        }

        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig {
                field: "timeout_ms",
                reason: "0은 허용되지 않음".into(),
            });
        }

        // 프리앰블이 한 프레임에 들어가야 함
        if self.max_payload_len() < PREAMBLE_LEN {
            return Err(Error::InvalidConfig {
                field: "msg_total_len",
                reason: format!(
                    "프리앰블({} bytes)을 담으려면 최소 {} bytes 필요",
                    PREAMBLE_LEN,
                    MSG_HEADER_LEN + PREAMBLE_LEN
                ),
            });
        }

        if self.msg_total_len > MAX_DATAGRAM_LEN {
            return Err(Error::InvalidConfig {
                field: "msg_total_len",
                reason: format!("UDP 데이터그램 한계 {} bytes 초과", MAX_DATAGRAM_LEN),
            });
        }

        Ok(())
    }

    /// 저지연 로컬 네트워크용 설정
    pub fn low_latency() -> Self {
        Self {
            msg_total_len: 1400,
            window_size: 32,
            timeout_ms: 50,
            transfer_deadline_ms: None,
            linger_ms: 100,
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            msg_total_len: 512,           // 작은 프레임
            window_size: 4,
            timeout_ms: 1000,
            transfer_deadline_ms: Some(120_000),
            linger_ms: 3000,
        }
    }
}
