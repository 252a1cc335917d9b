//! 메시지 분할과 조립
//!
//! - TransferMessage: 송신측. 데이터를 프리앰블(0번) + 데이터 프레임(1..=N)으로 분할
//! - ReceiveMessage: 수신측. 순서대로 도착한 페이로드를 누적

use std::collections::VecDeque;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::frame::{Frame, SequenceNumber};
use crate::{Error, Result, MAGIC_NUMBER, PROTOCOL_VERSION};

/// bincode로 직렬화한 프리앰블 크기 (고정 길이)
/// magic(4) + version(1) + total_len(8) + frame_count(4) + message_crc(4)
pub const PREAMBLE_LEN: usize = 21;

/// 프리앰블 시퀀스 번호
pub const PREAMBLE_SEQUENCE: SequenceNumber = 0;

/// 조립 버퍼 초기 용량 상한 (신뢰할 수 없는 total_len 대비)
const MAX_INITIAL_CAPACITY: usize = 1024 * 1024;

/// 프리앰블 (0번 프레임 페이로드)
///
/// 수신자는 여기 적힌 전체 길이로 조립 완료를 판단한다
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preamble {
    /// 매직 넘버
    pub magic: u32,

    /// 프로토콜 버전
    pub version: u8,

    /// 전체 메시지 길이 (바이트)
    pub total_len: u64,

    /// 데이터 프레임 수 (프리앰블 제외)
    pub frame_count: u32,

    /// 전체 메시지 CRC32
    pub message_crc: u32,
}

impl Preamble {
    pub fn new(total_len: u64, frame_count: u32, message_crc: u32) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            version: PROTOCOL_VERSION,
            total_len,
            frame_count,
            message_crc,
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }

    /// 바이트에서 역직렬화
    ///
    /// 길이, 매직 넘버, 버전 중 하나라도 맞지 않으면 None
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PREAMBLE_LEN {
            return None;
        }

        let preamble: Preamble = bincode::deserialize(bytes).ok()?;
        if preamble.magic != MAGIC_NUMBER || preamble.version != PROTOCOL_VERSION {
            return None;
        }

        Some(preamble)
    }
}

/// 송신 메시지
///
/// 전송 시작 시 생성되고 마지막 ACK로 윈도우가 닫히면 소멸
#[derive(Debug)]
pub struct TransferMessage {
    preamble: Preamble,

    /// 아직 윈도우에 들어가지 않은 프레임 (0번 프리앰블 포함)
    frames: VecDeque<Frame>,
}

impl TransferMessage {
    /// 데이터를 프레임들로 분할
    pub fn new(data: Bytes, max_payload_len: usize) -> Result<Self> {
        debug_assert!(max_payload_len > 0);

        // 데이터 프레임은 1..=u32::MAX-1 범위여야 총 프레임 수가 u32에 들어감
        let max_frames = (SequenceNumber::MAX - 1) as usize;
        let data_frames = (data.len() + max_payload_len - 1) / max_payload_len;
        if data_frames > max_frames {
            return Err(Error::MessageTooLarge {
                len: data.len(),
                max: max_frames.saturating_mul(max_payload_len),
            });
        }

        let preamble = Preamble::new(
            data.len() as u64,
            data_frames as u32,
            crc32fast::hash(&data),
        );

        let mut frames = VecDeque::with_capacity(data_frames + 1);
        frames.push_back(Frame::new(PREAMBLE_SEQUENCE, preamble.to_bytes()?));

        let mut offset = 0;
        let mut sequence_number = PREAMBLE_SEQUENCE + 1;
        while offset < data.len() {
            let end = (offset + max_payload_len).min(data.len());
            frames.push_back(Frame::new(sequence_number, data.slice(offset..end)));
            offset = end;
            sequence_number += 1;
        }

        Ok(Self { preamble, frames })
    }

    pub fn preamble(&self) -> &Preamble {
        &self.preamble
    }

    /// 총 프레임 수 (프리앰블 포함)
    pub fn frame_count(&self) -> u32 {
        self.preamble.frame_count + 1
    }

    /// 다음 프레임 꺼내기
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// 남은 프레임 수
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

/// 수신 메시지 (조립 버퍼)
///
/// 유효한 프리앰블 수신 시 생성, 순서대로 도착한 프레임마다 갱신
#[derive(Debug)]
pub struct ReceiveMessage {
    preamble: Preamble,
    buffer: BytesMut,
    frames_received: u32,
    started_at: Instant,
}

impl ReceiveMessage {
    pub fn new(preamble: Preamble) -> Self {
        let capacity = (preamble.total_len as usize).min(MAX_INITIAL_CAPACITY);
        Self {
            preamble,
            buffer: BytesMut::with_capacity(capacity),
            frames_received: 0,
            started_at: Instant::now(),
        }
    }

    pub fn preamble(&self) -> &Preamble {
        &self.preamble
    }

    /// 지금까지 조립된 데이터
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// 완료까지 남은 바이트
    pub fn remaining(&self) -> u64 {
        self.preamble
            .total_len
            .saturating_sub(self.buffer.len() as u64)
    }

    /// 페이로드 추가
    ///
    /// 선언된 전체 길이를 넘기는 페이로드는 거부
    pub fn append(&mut self, payload: &[u8]) -> bool {
        if payload.len() as u64 > self.remaining() {
            return false;
        }

        self.buffer.extend_from_slice(payload);
        self.frames_received += 1;
        true
    }

    /// 완료 여부 확인
    pub fn is_complete(&self) -> bool {
        self.buffer.len() as u64 == self.preamble.total_len
    }

    /// 완료된 메시지 추출 (CRC 검증)
    pub fn into_reassembled(self) -> Result<ReassembledMessage> {
        let got = crc32fast::hash(&self.buffer);
        if got != self.preamble.message_crc {
            return Err(Error::CrcMismatch {
                expected: self.preamble.message_crc,
                got,
            });
        }

        Ok(ReassembledMessage {
            data: self.buffer.freeze(),
            frame_count: self.frames_received,
            elapsed: self.started_at.elapsed(),
        })
    }
}

/// 조립 완료된 메시지
#[derive(Debug, Clone)]
pub struct ReassembledMessage {
    /// 메시지 데이터
    pub data: Bytes,

    /// 수신한 데이터 프레임 수
    pub frame_count: u32,

    /// 프리앰블 수신부터 완료까지 걸린 시간
    pub elapsed: Duration,
}
