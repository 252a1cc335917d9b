//! TXRX 송신 도구
//!
//! 파일 또는 문자열 하나를 윈도우 신뢰 전송으로 보낸다
//!
//! 사용법:
//!   cargo run --release --bin txrx-send -- [OPTIONS]
//!
//! 예시:
//!   # 파일 전송
//!   cargo run --release --bin txrx-send -- --dest 127.0.0.1:9000 --input data.bin
//!
//!   # 10% 손실 시뮬레이션
//!   cargo run --release --bin txrx-send -- -d 127.0.0.1:9000 -m "HELLO WORLD" --loss 0.1 --seed 42

use std::net::SocketAddr;
use std::path::PathBuf;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::info;
use tracing_subscriber::EnvFilter;

use txrx::sim::{FaultConfig, LossyTransport};
use txrx::{Sender, TransferConfig, TransferStats};

/// 송신 도구 설정
struct SendConfig {
    bind_addr: SocketAddr,
    dest_addr: SocketAddr,
    input_path: Option<PathBuf>,
    message: Option<String>,
    loss_rate: f64,
    seed: u64,
    config: TransferConfig,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9001)),
            dest_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            input_path: None,
            message: None,
            loss_rate: 0.0,
            seed: 0,
            config: TransferConfig::default(),
        }
    }
}

fn parse_args() -> SendConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SendConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--dest" | "-d" => {
                if i + 1 < args.len() {
                    config.dest_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--input" | "-i" => {
                if i + 1 < args.len() {
                    config.input_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--message" | "-m" => {
                if i + 1 < args.len() {
                    config.message = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--timeout-ms" => {
                if i + 1 < args.len() {
                    config.config.timeout_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--window" | "-w" => {
                if i + 1 < args.len() {
                    config.config.window_size = args[i + 1].parse().expect("유효한 숫자 필요");
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
            "--loss" => {
                if i + 1 < args.len() {
                    config.loss_rate = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--seed" => {
                if i + 1 < args.len() {
                    config.seed = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"TXRX Send - 윈도우 신뢰 전송 송신 도구

사용법:
  cargo run --release --bin txrx-send -- [OPTIONS]

옵션:
  -b, --bind <ADDR>        로컬 바인드 주소 (기본: 0.0.0.0:9001)
  -d, --dest <ADDR>        수신자 주소 (기본: 127.0.0.1:9000)
  -i, --input <PATH>       전송할 파일
  -m, --message <TEXT>     전송할 문자열 (--input 없을 때)
  -w, --window <N>         윈도우 크기 (기본: 10)
  --timeout-ms <MS>        ACK 타임아웃 (기본: 500)
  --frame-len <BYTES>      프레임 최대 길이, 헤더 포함 (기본: 1024)
  --deadline-ms <MS>       전체 전송 데드라인 (기본: 없음)
  --loss <P>               송신 손실 시뮬레이션 확률 (기본: 0)
  --seed <N>               손실 시뮬레이션 시드 (기본: 0)
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

fn report(stats: &TransferStats) {
    info!("{}", stats.summary());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let send_config = parse_args();

    let data = match (&send_config.input_path, &send_config.message) {
        (Some(path), _) => {
            info!("Loading file: {:?}", path);
            Bytes::from(tokio::fs::read(path).await?)
        }
        (None, Some(message)) => Bytes::from(message.clone().into_bytes()),
        (None, None) => Bytes::from(b"HELLO WORLD".repeat(50)),
    };

    info!("TXRX Send starting...");
    info!("Bind address: {}", send_config.bind_addr);
    info!("Destination: {}", send_config.dest_addr);
    info!("Data size: {} bytes", data.len());
    info!(
        "Window: {} frames, timeout: {}ms, frame: {} bytes",
        send_config.config.window_size,
        send_config.config.timeout_ms,
        send_config.config.msg_total_len
    );

    let socket = UdpSocket::bind(send_config.bind_addr).await?;

    if send_config.loss_rate > 0.0 {
        info!(
            "Loss simulation: {:.1}% (seed {})",
            send_config.loss_rate * 100.0,
            send_config.seed
        );
        let transport = LossyTransport::new(
            socket,
            FaultConfig::lossy(send_config.loss_rate),
            send_config.seed,
        );
        let mut sender = Sender::new(transport, send_config.config)?;
        sender.send_message(send_config.dest_addr, data).await?;
        report(sender.stats());
    } else {
        let mut sender = Sender::new(socket, send_config.config)?;
        sender.send_message(send_config.dest_addr, data).await?;
        report(sender.stats());
    }

    Ok(())
}
