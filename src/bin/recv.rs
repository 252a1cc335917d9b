//! TXRX 수신 도구
//!
//! 메시지 하나를 받아 파일로 저장하거나 크기만 출력한다
//!
//! 사용법:
//!   cargo run --release --bin txrx-recv -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin txrx-recv -- --bind 0.0.0.0:9000 --ack 127.0.0.1:9001 --output received.bin

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::UdpSocket;
use tracing::info;
use tracing_subscriber::EnvFilter;

use txrx::{Receiver, TransferConfig};

/// 수신 도구 설정
struct RecvConfig {
    bind_addr: SocketAddr,
    ack_addr: SocketAddr,
    output_path: Option<PathBuf>,
    config: TransferConfig,
}

impl Default for RecvConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            ack_addr: SocketAddr::from(([127, 0, 0, 1], 9001)),
            output_path: None,
            config: TransferConfig::default(),
        }
    }
}

fn parse_args() -> RecvConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RecvConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--ack" | "-a" => {
                if i + 1 < args.len() {
                    config.ack_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    config.output_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--frame-len" => {
                if i + 1 < args.len() {
                    config.config.msg_total_len = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--deadline-ms" => {
                if i + 1 < args.len() {
                    config.config.transfer_deadline_ms =
                        Some(args[i + 1].parse().expect("유효한 숫자 필요"));
                    i += 1;
                }
            }
            "--linger-ms" => {
                if i + 1 < args.len() {
                    config.config.linger_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"TXRX Recv - 윈도우 신뢰 전송 수신 도구

사용법:
  cargo run --release --bin txrx-recv -- [OPTIONS]

옵션:
  -b, --bind <ADDR>        로컬 바인드 주소 (기본: 0.0.0.0:9000)
  -a, --ack <ADDR>         ACK를 보낼 송신자 주소 (기본: 127.0.0.1:9001)
  -o, --output <PATH>      수신 데이터 저장 경로
  --frame-len <BYTES>      프레임 최대 길이, 송신자와 같아야 함 (기본: 1024)
  --deadline-ms <MS>       전체 수신 데드라인 (기본: 없음)
  --linger-ms <MS>         완료 후 마지막 ACK 재전송 대기 (기본: 1000)
  -h, --help               이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let recv_config = parse_args();

    info!("TXRX Recv starting...");
    info!("Bind address: {}", recv_config.bind_addr);
    info!("ACK address: {}", recv_config.ack_addr);

    let socket = UdpSocket::bind(recv_config.bind_addr).await?;
    let mut receiver = Receiver::new(socket, recv_config.config)?;
    let message = receiver.receive_message(recv_config.ack_addr).await?;

    info!(
        "Received {} bytes in {} frames ({:.2}ms)",
        message.data.len(),
        message.frame_count,
        message.elapsed.as_secs_f64() * 1000.0
    );
    info!("{}", receiver.stats().summary());

    match recv_config.output_path {
        Some(path) => {
            tokio::fs::write(&path, &message.data).await?;
            info!("Saved to {:?}", path);
        }
        None => {
            let preview = String::from_utf8_lossy(&message.data[..message.data.len().min(64)]);
            info!("Preview: {:?}", preview);
        }
    }

    Ok(())
}
