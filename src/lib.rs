//! # TXRX
//!
//! UDP 기반 윈도우 신뢰 전송 프로토콜
//!
//! ## 핵심 특징
//! - **슬라이딩 윈도우**: 최대 `window_size`개 프레임을 ACK 없이 연속 전송
//! - **누적 ACK**: ACK `K`는 `K`까지 연속 수신을 의미
//! - **타임아웃 재전송**: 단일 타이머, 만료 시 미확인 윈도우 전체 재전송
//! - **CRC32 프레임 검증**: 손상 프레임은 조용히 버리고 재전송에 맡김
//! - **프리앰블**: 0번 프레임에 전체 길이를 실어 수신측 완료 판단
//! - **순서 보장 조립**: 순서가 어긋난 프레임은 버퍼링하지 않음
//!
//! ```no_run
//! # async fn run() -> txrx::Result<()> {
//! use std::net::SocketAddr;
//! use tokio::net::UdpSocket;
//! use txrx::{Sender, TransferConfig};
//!
//! let socket = UdpSocket::bind("0.0.0.0:0").await?;
//! let dest: SocketAddr = "127.0.0.1:9000".parse().unwrap();
//! let mut sender = Sender::new(socket, TransferConfig::default())?;
//! sender.send_message(dest, &b"HELLO WORLD"[..]).await?;
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod frame;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod sim;
pub mod stats;
pub mod transport;
pub mod window;

pub use cancel::CancelToken;
pub use config::TransferConfig;
pub use error::{Error, Result};
pub use frame::{Frame, FrameOutcome, SequenceNumber};
pub use message::{Preamble, ReassembledMessage, ReceiveMessage, TransferMessage};
pub use receiver::{receive_message, LingerAction, Reassembler, ReceiveAction, Receiver};
pub use sender::{send_message, Sender, SenderState};
pub use stats::TransferStats;
pub use transport::Transport;
pub use window::SendWindow;

/// 프로토콜 버전
pub const PROTOCOL_VERSION: u8 = 1;

/// 매직 넘버 (프리앰블 식별용)
pub const MAGIC_NUMBER: u32 = 0x5458_5258; // "TXRX"

/// 프레임 헤더 길이: sequence(4) + checksum(4)
pub const MSG_HEADER_LEN: usize = 8;

/// 기본 프레임 최대 길이 (헤더 포함)
pub const DEFAULT_MSG_TOTAL_LEN: usize = 1024;

/// 기본 윈도우 크기 (프레임)
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// 기본 ACK 타임아웃 (밀리초)
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// ACK 프레임 페이로드
pub const ACK_TOKEN: &[u8] = b"ACK";
