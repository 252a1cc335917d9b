//! 수신자 (순서 보장 조립)
//!
//! - `expected_index`와 같은 번호의 프레임만 조립 버퍼에 추가하고 ACK
//! - 중복/순서가 어긋난 프레임은 버퍼링하지 않고 마지막 ACK를 다시 보냄
//! - 체크섬 불일치 프레임은 ACK 없이 버림 (송신자 타임아웃에 맡김)
//! - 프리앰블에 선언된 길이를 채우면 완료

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::cancel::CancelToken;
use crate::config::TransferConfig;
use crate::frame::{Frame, FrameOutcome, SequenceNumber};
use crate::message::{Preamble, ReassembledMessage, ReceiveMessage, PREAMBLE_SEQUENCE};
use crate::sender::sleep_until_opt;
use crate::stats::TransferStats;
use crate::transport::{is_transient, Transport};
use crate::{Error, Result};

/// 프레임 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveAction {
    /// 순서대로 도착, 조립 버퍼에 추가됨 (프리앰블 포함)
    Accepted { ack: SequenceNumber },

    /// 중복이거나 순서가 어긋남, 마지막 ACK 재전송 (아직 없으면 None)
    OutOfOrder { ack: Option<SequenceNumber> },

    /// 체크섬은 맞지만 내용이 잘못됨 (프리앰블 파싱 실패, 선언 길이 초과)
    Rejected,

    /// 체크섬 불일치
    Corrupt,

    /// 헤더보다 짧음
    Malformed,
}

impl ReceiveAction {
    /// 보내야 할 ACK 번호
    pub fn ack(&self) -> Option<SequenceNumber> {
        match *self {
            ReceiveAction::Accepted { ack } => Some(ack),
            ReceiveAction::OutOfOrder { ack } => ack,
            _ => None,
        }
    }
}

/// 완료 후(linger 중) 도착한 유효 프레임 판정
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LingerAction {
    /// 끝난 전송의 재전송, 마지막 ACK를 다시 보내고 대기 연장
    Reack { ack: SequenceNumber },

    /// 다음 전송의 프리앰블, ACK 없이 대기 종료
    NextTransfer(Frame),

    /// 끝난 전송 범위 밖, ACK 없이 버림
    Ignore,
}

/// 조립 상태 기계
///
/// 입출력 없이 프레임 판정만 담당한다
#[derive(Debug)]
pub struct Reassembler {
    /// 다음에 필요한 프레임 번호 (0은 프리앰블)
    expected_index: SequenceNumber,

    /// 마지막으로 보낸 ACK
    last_ack: Option<SequenceNumber>,

    /// 프리앰블 수신 후 생성
    message: Option<ReceiveMessage>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            expected_index: PREAMBLE_SEQUENCE,
            last_ack: None,
            message: None,
        }
    }

    pub fn expected_index(&self) -> SequenceNumber {
        self.expected_index
    }

    pub fn last_ack(&self) -> Option<SequenceNumber> {
        self.last_ack
    }

    /// 수신한 프리앰블
    pub fn preamble(&self) -> Option<&Preamble> {
        self.message.as_ref().map(|m| m.preamble())
    }

    /// 지금까지 조립된 데이터
    pub fn buffered(&self) -> &[u8] {
        self.message.as_ref().map(|m| m.data()).unwrap_or(&[])
    }

    /// 조립 완료 여부
    pub fn is_complete(&self) -> bool {
        self.message.as_ref().map_or(false, |m| m.is_complete())
    }

    /// 프레임 처리
    pub fn on_frame(&mut self, outcome: FrameOutcome) -> ReceiveAction {
        let frame = match outcome {
            FrameOutcome::Valid(frame) => frame,
            FrameOutcome::Corrupt { .. } => return ReceiveAction::Corrupt,
            FrameOutcome::Malformed { .. } => return ReceiveAction::Malformed,
        };

        if self.is_complete() || frame.sequence_number != self.expected_index {
            return ReceiveAction::OutOfOrder { ack: self.last_ack };
        }

        if self.expected_index == PREAMBLE_SEQUENCE {
            match Preamble::from_bytes(&frame.payload) {
                Some(preamble) => {
                    debug!(
                        "프리앰블 수신: {} bytes, {} 프레임",
                        preamble.total_len, preamble.frame_count
                    );
                    self.message = Some(ReceiveMessage::new(preamble));
                }
                None => return ReceiveAction::Rejected,
            }
        } else {
            let Some(message) = self.message.as_mut() else {
                return ReceiveAction::Rejected;
            };
            if !message.append(&frame.payload) {
                return ReceiveAction::Rejected;
            }
        }

        let ack = self.expected_index;
        self.expected_index += 1;
        self.last_ack = Some(ack);
        ReceiveAction::Accepted { ack }
    }

    /// 완료 후 도착한 유효 프레임 판정
    ///
    /// `1..=마지막 번호` 범위만 이전 전송의 재전송으로 보고 다시 ACK한다.
    /// 0번에 유효한 프리앰블이 오면 다음 전송의 시작이다. 단, 빈 메시지는
    /// 프리앰블이 마지막 프레임이므로 같은 프리앰블은 재전송으로 취급한다.
    pub fn on_lingering_frame(&self, frame: Frame) -> LingerAction {
        let Some(final_ack) = self.last_ack.filter(|_| self.is_complete()) else {
            return LingerAction::Ignore;
        };

        if frame.sequence_number == PREAMBLE_SEQUENCE {
            return match Preamble::from_bytes(&frame.payload) {
                Some(preamble)
                    if final_ack == PREAMBLE_SEQUENCE && self.preamble() == Some(&preamble) =>
                {
                    LingerAction::Reack { ack: final_ack }
                }
                Some(_) => LingerAction::NextTransfer(frame),
                None => LingerAction::Ignore,
            };
        }

        if frame.sequence_number <= final_ack {
            LingerAction::Reack { ack: final_ack }
        } else {
            LingerAction::Ignore
        }
    }

    /// 완료된 메시지 추출
    ///
    /// 아직 완료되지 않았으면 None
    pub fn into_message(self) -> Option<Result<ReassembledMessage>> {
        match self.message {
            Some(message) if message.is_complete() => Some(message.into_reassembled()),
            _ => None,
        }
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// select! 결과
enum ReceiverEvent {
    Cancelled,
    DeadlineExpired,
    LingerElapsed,
    Received(std::io::Result<(usize, SocketAddr)>),
    /// 이전 호출의 linger 중 받아 둔 프리앰블
    Carried(Frame),
}

/// 완료 후 대기 구간
struct Linger {
    until: Instant,

    /// 재전송이 계속 와도 이 시각 이후로는 연장하지 않음
    hard_stop: Instant,
}

impl Linger {
    fn start(period: Duration, max: Duration) -> Self {
        let now = Instant::now();
        Self {
            until: now + period,
            hard_stop: now + max,
        }
    }

    fn extend(&mut self, period: Duration) {
        self.until = (Instant::now() + period).min(self.hard_stop);
    }
}

/// 수신자
pub struct Receiver<T> {
    /// 전송 계층
    transport: T,

    /// 설정
    config: TransferConfig,

    /// 수신 통계
    stats: TransferStats,

    /// linger 중 도착한 다음 전송의 프리앰블
    pending: Option<Frame>,
}

impl<T: Transport> Receiver<T> {
    /// 새 수신자 생성
    pub fn new(transport: T, config: TransferConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            transport,
            config,
            stats: TransferStats::new(),
            pending: None,
        })
    }

    /// 메시지 하나 수신 (완료될 때까지 대기)
    ///
    /// ACK는 `ack_dest`로 보낸다
    pub async fn receive_message(&mut self, ack_dest: SocketAddr) -> Result<ReassembledMessage> {
        self.receive_message_with_cancel(ack_dest, &CancelToken::new())
            .await
    }

    /// 취소 가능한 메시지 수신
    pub async fn receive_message_with_cancel(
        &mut self,
        ack_dest: SocketAddr,
        cancel: &CancelToken,
    ) -> Result<ReassembledMessage> {
        let mut reassembler = Reassembler::new();
        let started = Instant::now();
        let deadline = self.config.transfer_deadline().map(|d| started + d);
        let mut linger: Option<Linger> = None;
        let mut carried = self.pending.take();
        let mut buf = vec![0u8; self.config.msg_total_len];

        loop {
            let event = match carried.take() {
                Some(frame) => ReceiverEvent::Carried(frame),
                None => {
                    // 완료 후 linger 중에는 전체 데드라인을 적용하지 않음
                    let active_deadline = if linger.is_some() { None } else { deadline };
                    let linger_until = linger.as_ref().map(|l| l.until);

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => ReceiverEvent::Cancelled,
                        _ = sleep_until_opt(active_deadline) => ReceiverEvent::DeadlineExpired,
                        _ = sleep_until_opt(linger_until) => ReceiverEvent::LingerElapsed,
                        result = self.transport.recv_from(&mut buf) => ReceiverEvent::Received(result),
                    }
                }
            };

            let outcome = match event {
                ReceiverEvent::Cancelled => {
                    info!("수신 취소: expected={}", reassembler.expected_index());
                    return Err(Error::Cancelled);
                }
                ReceiverEvent::DeadlineExpired => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    warn!(
                        "수신 타임아웃: {}ms, expected={}",
                        elapsed_ms,
                        reassembler.expected_index()
                    );
                    return Err(Error::TransferTimeout { elapsed_ms });
                }
                ReceiverEvent::LingerElapsed => break,
                ReceiverEvent::Received(Ok((len, from))) => {
                    trace!("{} 프레임 수신 ({} bytes)", from, len);
                    Frame::unpack(&buf[..len])
                }
                ReceiverEvent::Received(Err(e)) => {
                    if !is_transient(&e) {
                        return Err(e.into());
                    }
                    warn!("수신 에러: {}", e);
                    continue;
                }
                ReceiverEvent::Carried(frame) => FrameOutcome::Valid(frame),
            };

            if let Some(linger) = linger.as_mut() {
                match outcome {
                    FrameOutcome::Valid(frame) => match reassembler.on_lingering_frame(frame) {
                        LingerAction::Reack { ack } => {
                            self.stats.out_of_order_frames += 1;
                            self.send_ack(ack, ack_dest).await?;
                            linger.extend(self.config.linger());
                        }
                        LingerAction::NextTransfer(frame) => {
                            debug!("다음 전송의 프리앰블 수신, linger 종료");
                            self.pending = Some(frame);
                            break;
                        }
                        LingerAction::Ignore => self.stats.out_of_order_frames += 1,
                    },
                    FrameOutcome::Corrupt { .. } => self.stats.corrupt_frames += 1,
                    FrameOutcome::Malformed { .. } => self.stats.malformed_frames += 1,
                }
                continue;
            }

            let action = reassembler.on_frame(outcome);
            self.record(&action);
            trace!("프레임 처리: {:?}", action);

            if let Some(ack) = action.ack() {
                self.send_ack(ack, ack_dest).await?;
            }

            if reassembler.is_complete() {
                debug!(
                    "조립 완료: {} 프레임, linger {}ms",
                    reassembler.expected_index(),
                    self.config.linger_ms
                );
                if self.config.linger_ms == 0 {
                    break;
                }
                linger = Some(Linger::start(self.config.linger(), self.config.max_linger()));
            }
        }

        let message = reassembler.into_message().ok_or(Error::ConnectionClosed)??;

        self.stats.completed_messages += 1;
        self.stats.total_bytes += message.data.len() as u64;
        info!(
            "수신 완료: {} bytes, {} 프레임, {:.2}ms",
            message.data.len(),
            message.frame_count,
            message.elapsed.as_secs_f64() * 1000.0
        );

        Ok(message)
    }

    fn record(&mut self, action: &ReceiveAction) {
        match action {
            ReceiveAction::Accepted { .. } => self.stats.frames_accepted += 1,
            ReceiveAction::OutOfOrder { .. } => self.stats.out_of_order_frames += 1,
            ReceiveAction::Rejected | ReceiveAction::Corrupt => self.stats.corrupt_frames += 1,
            ReceiveAction::Malformed => self.stats.malformed_frames += 1,
        }
    }

    /// ACK 전송 (일시적 에러는 무시, 송신자가 재전송함)
    async fn send_ack(&mut self, ack: SequenceNumber, dest: SocketAddr) -> Result<()> {
        match self.transport.send_to(&Frame::ack(ack).pack(), dest).await {
            Ok(()) => {
                self.stats.acks_sent += 1;
                Ok(())
            }
            Err(e) if is_transient(&e) => {
                warn!("ACK {} 전송 실패: {}", ack, e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 통계 반환
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

/// 기본 설정으로 메시지 하나 수신
pub async fn receive_message<T: Transport>(
    transport: &T,
    ack_address: IpAddr,
    ack_port: u16,
) -> Result<ReassembledMessage> {
    let mut receiver = Receiver::new(transport, TransferConfig::default())?;
    receiver
        .receive_message(SocketAddr::new(ack_address, ack_port))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TransferMessage;
    use crate::sim::{MemoryNetwork, MemoryTransport};
    use bytes::Bytes;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn frames_for(data: &[u8], max_payload_len: usize) -> Vec<Frame> {
        let mut message =
            TransferMessage::new(Bytes::copy_from_slice(data), max_payload_len).unwrap();
        std::iter::from_fn(|| message.next_frame()).collect()
    }

    fn feed(reassembler: &mut Reassembler, frame: &Frame) -> ReceiveAction {
        reassembler.on_frame(Frame::unpack(&frame.pack()))
    }

    #[test]
    fn test_in_order_reassembly() {
        let data = b"HELLO WORLD".repeat(50);
        let frames = frames_for(&data, 64);
        let mut reassembler = Reassembler::new();

        for (i, frame) in frames.iter().enumerate() {
            assert!(!reassembler.is_complete());
            assert_eq!(
                feed(&mut reassembler, frame),
                ReceiveAction::Accepted { ack: i as u32 }
            );
        }

        assert!(reassembler.is_complete());
        let message = reassembler.into_message().unwrap().unwrap();
        assert_eq!(message.data.as_ref(), data.as_slice());
    }

    #[test]
    fn test_duplicate_frame_is_idempotent() {
        let frames = frames_for(b"abcdefghij", 4);
        let mut reassembler = Reassembler::new();

        feed(&mut reassembler, &frames[0]);
        assert_eq!(feed(&mut reassembler, &frames[1]), ReceiveAction::Accepted { ack: 1 });
        assert_eq!(
            feed(&mut reassembler, &frames[1]),
            ReceiveAction::OutOfOrder { ack: Some(1) }
        );
        assert_eq!(reassembler.expected_index(), 2);
        assert_eq!(reassembler.buffered(), b"abcd");
    }

    #[test]
    fn test_future_frame_reacks_last() {
        let frames = frames_for(b"abcdefghij", 4);
        let mut reassembler = Reassembler::new();

        feed(&mut reassembler, &frames[0]);
        assert_eq!(
            feed(&mut reassembler, &frames[3]),
            ReceiveAction::OutOfOrder { ack: Some(0) }
        );
        assert!(reassembler.buffered().is_empty());
    }

    #[test]
    fn test_data_before_preamble_not_assembled() {
        let frames = frames_for(b"abcdefghij", 4);
        let mut reassembler = Reassembler::new();

        assert_eq!(
            feed(&mut reassembler, &frames[1]),
            ReceiveAction::OutOfOrder { ack: None }
        );
        assert!(reassembler.preamble().is_none());
        assert_eq!(reassembler.expected_index(), 0);

        // 0번이지만 프리앰블이 아닌 페이로드
        let bogus = Frame::new(0, Bytes::from_static(b"not a preamble"));
        assert_eq!(feed(&mut reassembler, &bogus), ReceiveAction::Rejected);
        assert_eq!(reassembler.expected_index(), 0);

        assert_eq!(feed(&mut reassembler, &frames[0]), ReceiveAction::Accepted { ack: 0 });
        assert_eq!(reassembler.preamble().unwrap().total_len, 10);
    }

    #[test]
    fn test_corrupt_and_malformed_not_acked() {
        let frames = frames_for(b"abcdefghij", 4);
        let mut reassembler = Reassembler::new();
        feed(&mut reassembler, &frames[0]);

        let mut corrupted = frames[1].pack().to_vec();
        corrupted[9] ^= 0xFF;
        let action = reassembler.on_frame(Frame::unpack(&corrupted));
        assert_eq!(action, ReceiveAction::Corrupt);
        assert_eq!(action.ack(), None);

        let action = reassembler.on_frame(Frame::unpack(&[1, 2, 3]));
        assert_eq!(action, ReceiveAction::Malformed);
        assert_eq!(reassembler.expected_index(), 1);
    }

    #[test]
    fn test_overflowing_frame_rejected() {
        let frames = frames_for(b"abcd", 4);
        let mut reassembler = Reassembler::new();
        feed(&mut reassembler, &frames[0]);

        let oversized = Frame::new(1, Bytes::from_static(b"abcde"));
        assert_eq!(feed(&mut reassembler, &oversized), ReceiveAction::Rejected);
        assert_eq!(feed(&mut reassembler, &frames[1]), ReceiveAction::Accepted { ack: 1 });
        assert!(reassembler.is_complete());
    }

    #[test]
    fn test_empty_message_completes_on_preamble() {
        let frames = frames_for(b"", 4);
        assert_eq!(frames.len(), 1);

        let mut reassembler = Reassembler::new();
        feed(&mut reassembler, &frames[0]);
        assert!(reassembler.is_complete());
        assert!(reassembler.into_message().unwrap().unwrap().data.is_empty());
    }

    #[test]
    fn test_after_complete_everything_reacks_final() {
        let frames = frames_for(b"abcdefgh", 4);
        let mut reassembler = Reassembler::new();
        for frame in &frames {
            feed(&mut reassembler, frame);
        }
        assert!(reassembler.is_complete());

        for frame in &frames {
            assert_eq!(
                feed(&mut reassembler, frame),
                ReceiveAction::OutOfOrder { ack: Some(2) }
            );
        }
    }

    #[test]
    fn test_lingering_frames_classified() {
        let frames = frames_for(b"abcdefgh", 4);
        let mut reassembler = Reassembler::new();
        for frame in &frames {
            feed(&mut reassembler, frame);
        }

        // 끝난 전송의 재전송은 마지막 번호로 다시 ACK
        assert_eq!(
            reassembler.on_lingering_frame(frames[1].clone()),
            LingerAction::Reack { ack: 2 }
        );
        assert_eq!(
            reassembler.on_lingering_frame(frames[2].clone()),
            LingerAction::Reack { ack: 2 }
        );

        // 범위를 넘는 번호와 프리앰블이 아닌 0번은 무시
        let beyond = Frame::new(3, Bytes::from_static(b"zz"));
        assert_eq!(reassembler.on_lingering_frame(beyond), LingerAction::Ignore);
        let bogus = Frame::new(0, Bytes::from_static(b"not a preamble"));
        assert_eq!(reassembler.on_lingering_frame(bogus), LingerAction::Ignore);

        // 새 프리앰블은 다음 전송의 시작 (같은 내용이어도)
        let next = frames_for(b"second message", 4).remove(0);
        assert_eq!(
            reassembler.on_lingering_frame(next.clone()),
            LingerAction::NextTransfer(next)
        );
        assert_eq!(
            reassembler.on_lingering_frame(frames[0].clone()),
            LingerAction::NextTransfer(frames[0].clone())
        );
    }

    #[test]
    fn test_lingering_after_empty_message() {
        let empty = frames_for(b"", 4).remove(0);
        let mut reassembler = Reassembler::new();
        feed(&mut reassembler, &empty);
        assert!(reassembler.is_complete());

        // 빈 메시지는 프리앰블이 마지막 프레임: 같은 프리앰블은 재전송
        assert_eq!(
            reassembler.on_lingering_frame(empty.clone()),
            LingerAction::Reack { ack: 0 }
        );

        let next = frames_for(b"second message", 4);
        assert_eq!(
            reassembler.on_lingering_frame(next[0].clone()),
            LingerAction::NextTransfer(next[0].clone())
        );
        assert_eq!(
            reassembler.on_lingering_frame(next[1].clone()),
            LingerAction::Ignore
        );
    }

    #[test]
    fn test_lingering_before_complete_is_ignored() {
        let frames = frames_for(b"abcdefgh", 4);
        let mut reassembler = Reassembler::new();
        feed(&mut reassembler, &frames[0]);

        assert_eq!(
            reassembler.on_lingering_frame(frames[1].clone()),
            LingerAction::Ignore
        );
    }

    #[test]
    fn test_arbitrary_order_with_duplicates_and_drops() {
        let data: Vec<u8> = (0..2000u32).map(|i| (i * 7 % 251) as u8).collect();
        let frames = frames_for(&data, 37);
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let mut reassembler = Reassembler::new();

        // 매 라운드 일부를 버리고, 일부를 복제하고, 순서를 섞어서 전달
        for _ in 0..10_000 {
            if reassembler.is_complete() {
                break;
            }

            let mut round: Vec<&Frame> = Vec::new();
            for frame in &frames {
                if rng.gen_bool(0.3) {
                    continue;
                }
                round.push(frame);
                if rng.gen_bool(0.2) {
                    round.push(frame);
                }
            }
            round.shuffle(&mut rng);

            for frame in round {
                let before = reassembler.expected_index();
                let action = feed(&mut reassembler, frame);
                if let ReceiveAction::Accepted { ack } = action {
                    assert_eq!(ack, before);
                }
                assert!(data.starts_with(reassembler.buffered()));
            }
        }

        assert!(reassembler.is_complete());
        let message = reassembler.into_message().unwrap().unwrap();
        assert_eq!(message.data.as_ref(), data.as_slice());
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    async fn recv_ack(peer: &MemoryTransport) -> SequenceNumber {
        let mut buf = [0u8; 64];
        let (len, _) = peer.recv_from(&mut buf).await.unwrap();
        let frame = Frame::unpack(&buf[..len]).into_valid().unwrap();
        assert!(frame.is_ack());
        frame.sequence_number
    }

    fn receiver_config() -> TransferConfig {
        TransferConfig {
            msg_total_len: 64,
            linger_ms: 1_000,
            ..TransferConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_receiver_acks_and_lingers() {
        let network = MemoryNetwork::new();
        let transport = network.bind(addr(2)).unwrap();
        let peer = network.bind(addr(1)).unwrap();

        let task = tokio::spawn(async move {
            let mut receiver = Receiver::new(transport, receiver_config()).unwrap();
            let message = receiver.receive_message(addr(1)).await?;
            Ok::<_, Error>((message, receiver.stats().clone()))
        });

        let frames = frames_for(b"HELLO WORLD", 8);
        peer.send_to(&frames[0].pack(), addr(2)).await.unwrap();
        assert_eq!(recv_ack(&peer).await, 0);

        // 2번을 먼저 보내면 0번 ACK 재전송
        peer.send_to(&frames[2].pack(), addr(2)).await.unwrap();
        assert_eq!(recv_ack(&peer).await, 0);

        peer.send_to(&frames[1].pack(), addr(2)).await.unwrap();
        assert_eq!(recv_ack(&peer).await, 1);
        peer.send_to(&frames[2].pack(), addr(2)).await.unwrap();
        assert_eq!(recv_ack(&peer).await, 2);

        // 마지막 ACK가 유실됐다고 가정하고 재전송 -> linger 중이므로 다시 ACK
        tokio::time::sleep(Duration::from_millis(500)).await;
        peer.send_to(&frames[2].pack(), addr(2)).await.unwrap();
        assert_eq!(recv_ack(&peer).await, 2);

        let (message, stats) = task.await.unwrap().unwrap();
        assert_eq!(message.data.as_ref(), b"HELLO WORLD");
        assert_eq!(stats.frames_accepted, 3);
        assert_eq!(stats.out_of_order_frames, 2);
        assert_eq!(stats.acks_sent, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linger_is_capped() {
        let network = MemoryNetwork::new();
        let transport = network.bind(addr(2)).unwrap();
        let peer = network.bind(addr(1)).unwrap();

        let frames = frames_for(b"HELLO WORLD", 8);
        peer.send_to(&frames[0].pack(), addr(2)).await.unwrap();
        peer.send_to(&frames[1].pack(), addr(2)).await.unwrap();
        peer.send_to(&frames[2].pack(), addr(2)).await.unwrap();

        // ACK를 전혀 받지 못한 송신자처럼 마지막 프레임을 계속 재전송
        let final_frame = frames[2].pack();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                if peer.send_to(&final_frame, addr(2)).await.is_err() {
                    break;
                }
            }
        });

        let config = receiver_config();
        let cap = config.max_linger();
        let started = Instant::now();
        let mut receiver = Receiver::new(transport, config).unwrap();
        let message = receiver.receive_message(addr(1)).await.unwrap();

        assert_eq!(message.data.as_ref(), b"HELLO WORLD");
        assert!(started.elapsed() <= cap + Duration::from_millis(500));
        assert!(receiver.stats().out_of_order_frames > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_preamble_ends_linger_and_carries_over() {
        let network = MemoryNetwork::new();
        let transport = network.bind(addr(2)).unwrap();
        let peer = network.bind(addr(1)).unwrap();

        let task = tokio::spawn(async move {
            let mut receiver = Receiver::new(transport, receiver_config()).unwrap();
            let first = receiver.receive_message(addr(1)).await?;
            let second = receiver.receive_message(addr(1)).await?;
            Ok::<_, Error>((first.data, second.data, receiver.stats().clone()))
        });

        let first = frames_for(b"first", 8);
        for (i, frame) in first.iter().enumerate() {
            peer.send_to(&frame.pack(), addr(2)).await.unwrap();
            assert_eq!(recv_ack(&peer).await, i as u32);
        }

        // linger 중 새 프리앰블: 이전 ACK 대신 다음 수신에서 ACK 0
        let second = frames_for(b"second message", 8);
        peer.send_to(&second[0].pack(), addr(2)).await.unwrap();
        assert_eq!(recv_ack(&peer).await, 0);
        for (i, frame) in second.iter().enumerate().skip(1) {
            peer.send_to(&frame.pack(), addr(2)).await.unwrap();
            assert_eq!(recv_ack(&peer).await, i as u32);
        }

        let (a, b, stats) = task.await.unwrap().unwrap();
        assert_eq!(a.as_ref(), b"first");
        assert_eq!(b.as_ref(), b"second message");
        assert_eq!(stats.completed_messages, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receiver_deadline() {
        let network = MemoryNetwork::new();
        let transport = network.bind(addr(2)).unwrap();

        let config = TransferConfig {
            transfer_deadline_ms: Some(3_000),
            ..receiver_config()
        };
        let mut receiver = Receiver::new(transport, config).unwrap();
        let result = receiver.receive_message(addr(1)).await;
        assert!(matches!(result, Err(Error::TransferTimeout { elapsed_ms }) if elapsed_ms >= 3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receiver_cancel() {
        let network = MemoryNetwork::new();
        let transport = network.bind(addr(2)).unwrap();
        let cancel = CancelToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            canceller.cancel();
        });

        let mut receiver = Receiver::new(transport, receiver_config()).unwrap();
        let result = receiver.receive_message_with_cancel(addr(1), &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
