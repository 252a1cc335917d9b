//! 전송 통계

use std::time::{Duration, Instant};

/// 전송 통계
///
/// 송신자와 수신자가 같은 구조를 사용하며 각자 해당하는 필드만 채운다
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 완료된 메시지 수
    pub completed_messages: u64,

    /// 페이로드 바이트 (송신: 보낸 메시지, 수신: 조립된 메시지)
    pub total_bytes: u64,

    /// 처음 전송한 프레임 수
    pub frames_sent: u64,

    /// 재전송 프레임 수
    pub retransmitted_frames: u64,

    /// 타임아웃으로 인한 재전송 라운드 수
    pub timeouts: u64,

    /// 수신한 유효 ACK 수
    pub acks_received: u64,

    /// 윈도우를 전진시키지 못한 ACK 수 (중복/범위 밖)
    pub stale_acks: u64,

    /// 보낸 ACK 수
    pub acks_sent: u64,

    /// 순서대로 조립된 프레임 수
    pub frames_accepted: u64,

    /// 중복 또는 순서가 어긋난 프레임 수
    pub out_of_order_frames: u64,

    /// 체크섬 불일치로 버린 프레임 수
    pub corrupt_frames: u64,

    /// 헤더보다 짧아 버린 프레임 수
    pub malformed_frames: u64,

    /// 동시에 ACK 대기 중이던 최대 프레임 수
    pub max_outstanding: usize,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            completed_messages: 0,
            total_bytes: 0,
            frames_sent: 0,
            retransmitted_frames: 0,
            timeouts: 0,
            acks_received: 0,
            stale_acks: 0,
            acks_sent: 0,
            frames_accepted: 0,
            out_of_order_frames: 0,
            corrupt_frames: 0,
            malformed_frames: 0,
            max_outstanding: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 최대 동시 전송 프레임 수 갱신
    pub fn record_outstanding(&mut self, in_flight: usize) {
        self.max_outstanding = self.max_outstanding.max(in_flight);
    }

    /// 실효 처리율 (bytes/sec, 재전송 제외)
    pub fn goodput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 재전송 비율
    pub fn retransmit_ratio(&self) -> f64 {
        let total = self.frames_sent + self.retransmitted_frames;
        if total == 0 {
            return 0.0;
        }
        self.retransmitted_frames as f64 / total as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Messages: {} | Bytes: {} | Goodput: {:.2} KB/s | Frames: {} (+{} retx, {} timeouts) | ACKs: {} sent / {} recv ({} stale) | Dropped: {} corrupt, {} malformed, {} out-of-order",
            self.elapsed().as_secs_f64(),
            self.completed_messages,
            self.total_bytes,
            self.goodput() / 1000.0,
            self.frames_sent,
            self.retransmitted_frames,
            self.timeouts,
            self.acks_sent,
            self.acks_received,
            self.stale_acks,
            self.corrupt_frames,
            self.malformed_frames,
            self.out_of_order_frames,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retransmit_ratio() {
        let mut stats = TransferStats::new();
        assert_eq!(stats.retransmit_ratio(), 0.0);

        stats.frames_sent = 30;
        stats.retransmitted_frames = 10;
        assert!((stats.retransmit_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_outstanding_keeps_peak() {
        let mut stats = TransferStats::new();
        stats.record_outstanding(3);
        stats.record_outstanding(7);
        stats.record_outstanding(2);
        assert_eq!(stats.max_outstanding, 7);
    }
}
