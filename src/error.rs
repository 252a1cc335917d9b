//! 에러 타입 정의
//!
//! 손실, 손상, 중복, 순서 뒤바뀜 같은 일시적 네트워크 문제는 프로토콜 내부에서
//! 재전송으로 해결되므로 여기 나타나지 않는다.

use thiserror::Error;

/// TXRX 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("유효하지 않은 설정: {field} ({reason})")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("메시지가 너무 큼: {len} bytes (최대 {max} bytes)")]
    MessageTooLarge { len: usize, max: usize },

    #[error("전송 타임아웃: {elapsed_ms}ms 경과")]
    TransferTimeout { elapsed_ms: u64 },

    #[error("전송 취소됨")]
    Cancelled,

    #[error("CRC 불일치: expected {expected:08X}, got {got:08X}")]
    CrcMismatch { expected: u32, got: u32 },

    #[error("연결 종료")]
    ConnectionClosed,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
