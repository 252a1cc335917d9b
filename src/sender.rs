//! 송신자 (슬라이딩 윈도우)
//!
//! - 프리앰블(0번)을 먼저 보내고 ACK를 받은 뒤 데이터 프레임 전송
//! - 윈도우 크기만큼 연속 전송 후 ACK 대기
//! - 누적 ACK 수신 시 윈도우 전진, 타임아웃 시 윈도우 전체 재전송
//! - 타이머는 하나뿐이며 윈도우가 전진할 때마다 재설정

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use crate::cancel::CancelToken;
use crate::config::TransferConfig;
use crate::frame::{Frame, FrameOutcome};
use crate::message::TransferMessage;
use crate::stats::TransferStats;
use crate::transport::{is_transient, Transport};
use crate::window::{AckEffect, SendWindow};
use crate::{Error, Result};

/// 송신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// 프리앰블 ACK 대기 중
    PreamblePending,

    /// 윈도우 채우는 중
    WindowFilling,

    /// ACK 대기 중
    AwaitingAck,

    /// ACK 수신, 윈도우 전진
    Advancing,

    /// 타임아웃, 윈도우 재전송
    Retransmitting,

    /// 모든 프레임 ACK 완료
    Complete,
}

/// select! 결과
enum SenderEvent {
    Cancelled,
    DeadlineExpired,
    RetransmitTimeout,
    Received(std::io::Result<(usize, SocketAddr)>),
}

/// 송신자
pub struct Sender<T> {
    /// 전송 계층
    transport: T,

    /// 설정
    config: TransferConfig,

    /// 전송 통계
    stats: TransferStats,

    /// 현재 상태 (전송 중이 아니면 Complete)
    state: SenderState,

    /// 마지막 전송의 재전송 라운드 수
    retransmit_rounds: u64,
}

impl<T: Transport> Sender<T> {
    /// 새 송신자 생성
    pub fn new(transport: T, config: TransferConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            transport,
            config,
            stats: TransferStats::new(),
            state: SenderState::Complete,
            retransmit_rounds: 0,
        })
    }

    /// 메시지 전송 (완료될 때까지 대기)
    pub async fn send_message(&mut self, dest: SocketAddr, data: impl Into<Bytes>) -> Result<()> {
        self.send_message_with_cancel(dest, data, &CancelToken::new())
            .await
    }

    /// 취소 가능한 메시지 전송
    pub async fn send_message_with_cancel(
        &mut self,
        dest: SocketAddr,
        data: impl Into<Bytes>,
        cancel: &CancelToken,
    ) -> Result<()> {
        let data = data.into();
        let mut message = TransferMessage::new(data.clone(), self.config.max_payload_len())?;
        let mut window = SendWindow::new(self.config.window_size, message.frame_count());

        info!(
            "전송 시작: {} bytes, {} 프레임 -> {}",
            data.len(),
            message.frame_count(),
            dest
        );

        let started = Instant::now();
        let timeout = self.config.timeout();
        let deadline = self.config.transfer_deadline().map(|d| started + d);
        let mut retransmit_at = started + timeout;
        let mut buf = vec![0u8; self.config.msg_total_len];

        self.drain_stale(&mut buf).await?;
        self.retransmit_rounds = 0;
        self.transition(SenderState::PreamblePending);

        loop {
            // 윈도우 채우기
            if window.can_send() {
                if !window.preamble_pending() {
                    self.transition(SenderState::WindowFilling);
                }
                let was_empty = window.in_flight() == 0;

                while window.can_send() {
                    let Some(frame) = message.next_frame() else {
                        break;
                    };
                    let packed = frame.pack();
                    self.transmit(&packed, dest).await?;
                    trace!("프레임 {} 전송 ({} bytes)", frame.sequence_number, packed.len());

                    window.record_sent(frame.sequence_number, packed);
                    self.stats.frames_sent += 1;
                    self.stats.record_outstanding(window.in_flight());
                }

                // 빈 윈도우에 처음 넣었으면 타이머 시작
                if was_empty {
                    retransmit_at = Instant::now() + timeout;
                }
            }

            self.transition(if window.preamble_pending() {
                SenderState::PreamblePending
            } else {
                SenderState::AwaitingAck
            });

            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => SenderEvent::Cancelled,
                _ = sleep_until_opt(deadline) => SenderEvent::DeadlineExpired,
                _ = sleep_until(retransmit_at) => SenderEvent::RetransmitTimeout,
                result = self.transport.recv_from(&mut buf) => SenderEvent::Received(result),
            };

            match event {
                SenderEvent::Cancelled => {
                    info!("전송 취소: base={}", window.base());
                    return Err(Error::Cancelled);
                }
                SenderEvent::DeadlineExpired => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    warn!("전송 타임아웃: {}ms, base={}", elapsed_ms, window.base());
                    return Err(Error::TransferTimeout { elapsed_ms });
                }
                SenderEvent::RetransmitTimeout => {
                    self.transition(SenderState::Retransmitting);
                    self.stats.timeouts += 1;
                    self.retransmit_rounds += 1;

                    let frames: Vec<Bytes> = window.retransmit_all().map(|f| f.packed.clone()).collect();
                    debug!(
                        "타임아웃: 프레임 {}..{} 재전송 ({}개)",
                        window.base(),
                        window.next_sequence(),
                        frames.len()
                    );

                    for packed in &frames {
                        self.transmit(packed, dest).await?;
                        self.stats.retransmitted_frames += 1;
                    }
                    retransmit_at = Instant::now() + timeout;
                }
                SenderEvent::Received(Ok((len, _from))) => match Frame::unpack(&buf[..len]) {
                    FrameOutcome::Valid(frame) if frame.is_ack() => {
                        self.stats.acks_received += 1;
                        match window.acknowledge(frame.sequence_number) {
                            AckEffect::Advanced(n) => {
                                self.transition(SenderState::Advancing);
                                trace!(
                                    "ACK {}: {}개 확인, base={}",
                                    frame.sequence_number,
                                    n,
                                    window.base()
                                );
                                retransmit_at = Instant::now() + timeout;

                                if window.is_complete() {
                                    break;
                                }
                            }
                            AckEffect::Stale | AckEffect::OutOfRange => {
                                self.stats.stale_acks += 1;
                                trace!("ACK {} 무시 (base={})", frame.sequence_number, window.base());
                            }
                        }
                    }
                    FrameOutcome::Valid(frame) => {
                        trace!("ACK가 아닌 프레임 {} 무시", frame.sequence_number);
                    }
                    FrameOutcome::Corrupt { .. } => {
                        self.stats.corrupt_frames += 1;
                    }
                    FrameOutcome::Malformed { .. } => {
                        self.stats.malformed_frames += 1;
                    }
                },
                SenderEvent::Received(Err(e)) => {
                    if !is_transient(&e) {
                        return Err(e.into());
                    }
                    warn!("수신 에러: {}", e);
                }
            }
        }

        self.transition(SenderState::Complete);
        self.stats.completed_messages += 1;
        self.stats.total_bytes += data.len() as u64;

        info!(
            "전송 완료: {} bytes, {:.2}ms, 재전송 {}회",
            data.len(),
            started.elapsed().as_secs_f64() * 1000.0,
            self.retransmit_rounds
        );

        Ok(())
    }

    /// 데이터그램 전송
    ///
    /// 일시적 에러는 손실로 간주하고 재전송에 맡긴다
    async fn transmit(&self, packed: &[u8], dest: SocketAddr) -> Result<()> {
        match self.transport.send_to(packed, dest).await {
            Ok(()) => Ok(()),
            Err(e) if is_transient(&e) => {
                warn!("송신 에러 (재전송 예정): {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 이전 전송에서 남은 데이터그램 (중복 ACK 등) 버리기
    ///
    /// 새 전송의 윈도우가 지난 ACK로 전진하지 않게 한다
    async fn drain_stale(&self, buf: &mut [u8]) -> Result<()> {
        loop {
            match tokio::time::timeout(Duration::ZERO, self.transport.recv_from(buf)).await {
                Ok(Ok((len, from))) => {
                    trace!("이전 전송의 데이터그램 버림: {} ({} bytes)", from, len);
                }
                Ok(Err(e)) if !is_transient(&e) => return Err(e.into()),
                Ok(Err(_)) | Err(_) => return Ok(()),
            }
        }
    }

    fn transition(&mut self, next: SenderState) {
        if self.state != next {
            trace!("송신 상태: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// 현재 상태
    pub fn state(&self) -> SenderState {
        self.state
    }

    /// 마지막 (또는 진행 중인) 전송의 재전송 라운드 수
    pub fn retransmit_rounds(&self) -> u64 {
        self.retransmit_rounds
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

/// 데드라인이 없으면 영원히 대기
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// 기본 설정으로 메시지 하나 전송
pub async fn send_message<T: Transport>(
    transport: &T,
    destination_address: IpAddr,
    destination_port: u16,
    data: impl Into<Bytes>,
) -> Result<()> {
    let mut sender = Sender::new(transport, TransferConfig::default())?;
    sender
        .send_message(SocketAddr::new(destination_address, destination_port), data)
        .await
}
