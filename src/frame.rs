//! 프레임 코덱
//!
//! 와이어 포맷 (빅엔디언):
//!
//! ```text
//! +-----------------+-----------------+------------------------+
//! | sequence (u32)  | checksum (u32)  | payload (0..N bytes)   |
//! +-----------------+-----------------+------------------------+
//! ```
//!
//! 체크섬은 시퀀스 번호 4바이트와 페이로드를 이어서 계산한 CRC32.
//! 손상되거나 헤더보다 짧은 버퍼는 에러 대신 [`FrameOutcome`]으로 표현되며
//! 호출자는 조용히 버린다 (재전송 타이머에 맡김).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{ACK_TOKEN, MSG_HEADER_LEN};

/// 시퀀스 번호 (32비트, 0은 프리앰블)
pub type SequenceNumber = u32;

/// 프레임 (전송 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 시퀀스 번호
    pub sequence_number: SequenceNumber,

    /// 페이로드
    pub payload: Bytes,
}

impl Frame {
    /// 새 프레임 생성
    pub fn new(sequence_number: SequenceNumber, payload: Bytes) -> Self {
        Self {
            sequence_number,
            payload,
        }
    }

    /// ACK 프레임 생성
    ///
    /// `sequence_number`까지 연속 수신했음을 의미
    pub fn ack(sequence_number: SequenceNumber) -> Self {
        Self::new(sequence_number, Bytes::from_static(ACK_TOKEN))
    }

    /// ACK 프레임 여부
    pub fn is_ack(&self) -> bool {
        self.payload.as_ref() == ACK_TOKEN
    }

    /// 체크섬 계산
    pub fn checksum(&self) -> u32 {
        compute_checksum(self.sequence_number, &self.payload)
    }

    /// 직렬화 후 길이
    pub fn wire_len(&self) -> usize {
        MSG_HEADER_LEN + self.payload.len()
    }

    /// 프레임을 바이트로 직렬화
    pub fn pack(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_u32(self.sequence_number);
        buf.put_u32(self.checksum());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// 바이트에서 프레임 역직렬화
    ///
    /// 실패해도 패닉하거나 에러를 반환하지 않는다
    pub fn unpack(bytes: &[u8]) -> FrameOutcome {
        if bytes.len() < MSG_HEADER_LEN {
            return FrameOutcome::Malformed { len: bytes.len() };
        }

        let mut header = &bytes[..MSG_HEADER_LEN];
        let sequence_number = header.get_u32();
        let checksum = header.get_u32();
        let payload = &bytes[MSG_HEADER_LEN..];

        if compute_checksum(sequence_number, payload) != checksum {
            return FrameOutcome::Corrupt { sequence_number };
        }

        FrameOutcome::Valid(Frame::new(sequence_number, Bytes::copy_from_slice(payload)))
    }
}

/// 역직렬화 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 체크섬 일치
    Valid(Frame),

    /// 체크섬 불일치 (헤더에 적힌 시퀀스 번호는 신뢰할 수 없음)
    Corrupt { sequence_number: SequenceNumber },

    /// 헤더보다 짧은 버퍼
    Malformed { len: usize },
}

impl FrameOutcome {
    /// 체크섬 검증 통과 여부
    pub fn correct_checksum(&self) -> bool {
        matches!(self, FrameOutcome::Valid(_))
    }

    pub fn into_valid(self) -> Option<Frame> {
        match self {
            FrameOutcome::Valid(frame) => Some(frame),
            _ => None,
        }
    }
}

/// 시퀀스 번호와 페이로드에 대한 CRC32
pub fn compute_checksum(sequence_number: SequenceNumber, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&sequence_number.to_be_bytes());
    hasher.update(payload);
    hasher.finalize()
}
