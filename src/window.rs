//! 송신 윈도우
//!
//! ```text
//!   base               next
//!    │                   │
//! ───┼───────────────────┼──────────────▶ sequence
//!    │ <── outstanding ─▶│ <── 전송 가능 ─▶
//! ```
//!
//! - outstanding: 전송했지만 아직 ACK 받지 못한 프레임, 최대 `window_size`개
//! - 프리앰블(0번)이 ACK되기 전에는 윈도우 크기를 1로 제한
//! - ACK는 누적: `K`는 `K`까지 모두 수신했음을 의미

use std::collections::VecDeque;

use bytes::Bytes;

use crate::frame::SequenceNumber;
use crate::message::PREAMBLE_SEQUENCE;

/// 윈도우 안의 프레임
#[derive(Debug, Clone)]
pub struct OutstandingFrame {
    pub sequence_number: SequenceNumber,

    /// 직렬화된 프레임 (재전송 시 그대로 사용)
    pub packed: Bytes,

    /// 전송 횟수
    pub tx_count: u32,
}

/// ACK 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckEffect {
    /// 윈도우가 n 프레임 전진
    Advanced(usize),

    /// 이미 처리한 ACK (중복)
    Stale,

    /// 아직 보내지 않은 프레임에 대한 ACK
    OutOfRange,
}

/// 송신 윈도우
#[derive(Debug)]
pub struct SendWindow {
    /// 가장 오래된 미확인 프레임 번호 (윈도우 시작)
    base: SequenceNumber,

    /// 다음에 보낼 프레임 번호
    next: SequenceNumber,

    /// 총 프레임 수 (프리앰블 포함)
    total: SequenceNumber,

    /// 최대 윈도우 크기
    size: usize,

    /// 전송 중인 프레임 (앞쪽이 가장 오래됨)
    outstanding: VecDeque<OutstandingFrame>,
}

impl SendWindow {
    pub fn new(size: usize, total: SequenceNumber) -> Self {
        assert!(size >= 1, "window size must be at least 1");
        Self {
            base: PREAMBLE_SEQUENCE,
            next: PREAMBLE_SEQUENCE,
            total,
            size,
            outstanding: VecDeque::with_capacity(size),
        }
    }

    pub fn base(&self) -> SequenceNumber {
        self.base
    }

    pub fn next_sequence(&self) -> SequenceNumber {
        self.next
    }

    /// 프리앰블 ACK 전까지는 1
    pub fn limit(&self) -> usize {
        if self.preamble_pending() {
            1
        } else {
            self.size
        }
    }

    /// 프리앰블이 아직 ACK되지 않음
    pub fn preamble_pending(&self) -> bool {
        self.base == PREAMBLE_SEQUENCE
    }

    /// 새 프레임을 보낼 수 있는지
    pub fn can_send(&self) -> bool {
        self.next < self.total && self.outstanding.len() < self.limit()
    }

    /// 전송 중인 프레임 수
    pub fn in_flight(&self) -> usize {
        self.outstanding.len()
    }

    /// 모든 프레임 ACK 완료
    pub fn is_complete(&self) -> bool {
        self.base >= self.total
    }

    /// 방금 전송한 프레임을 윈도우에 추가
    ///
    /// 프레임 번호는 `next_sequence()`와 같아야 함
    pub fn record_sent(&mut self, sequence_number: SequenceNumber, packed: Bytes) {
        debug_assert_eq!(sequence_number, self.next);
        debug_assert!(
            self.can_send(),
            "record_sent on a full window ({} / {})",
            self.outstanding.len(),
            self.limit()
        );

        self.outstanding.push_back(OutstandingFrame {
            sequence_number,
            packed,
            tx_count: 1,
        });
        self.next += 1;
    }

    /// 누적 ACK 처리
    ///
    /// `base <= ack < next`일 때만 윈도우를 `ack + 1`로 전진하고
    /// 그 이하 프레임을 버린다
    pub fn acknowledge(&mut self, ack: SequenceNumber) -> AckEffect {
        if ack < self.base {
            return AckEffect::Stale;
        }
        if ack >= self.next {
            return AckEffect::OutOfRange;
        }

        let mut advanced = 0;
        while let Some(front) = self.outstanding.front() {
            if front.sequence_number > ack {
                break;
            }
            self.outstanding.pop_front();
            advanced += 1;
        }

        self.base = ack + 1;
        AckEffect::Advanced(advanced)
    }

    /// 재전송 대상 (base부터 마지막 전송 프레임까지)
    ///
    /// 각 프레임의 전송 횟수 증가
    pub fn retransmit_all(&mut self) -> impl Iterator<Item = &OutstandingFrame> {
        for frame in self.outstanding.iter_mut() {
            frame.tx_count += 1;
        }
        self.outstanding.iter()
    }

    pub fn outstanding(&self) -> impl Iterator<Item = &OutstandingFrame> {
        self.outstanding.iter()
    }
}
