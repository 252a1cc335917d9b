//! 네트워크 시뮬레이터
//!
//! 실제 소켓 없이 재전송 로직을 검증하기 위한 도구.
//!
//! | 구성요소 | 역할 |
//! |---|---|
//! | [`MemoryNetwork`] | 프로세스 내 데이터그램 허브. 주소별 수신함 |
//! | [`MemoryTransport`] | 허브에 바인딩된 엔드포인트 |
//! | [`LossyTransport`] | 임의 전송 계층을 감싸 손실/손상/중복을 주입 |
//!
//! 장애 주입은 시드 고정 `StdRng`를 사용하므로 같은 시드면 같은 결과가 나온다.
//! tokio 일시정지 시계(`start_paused`)와 함께 쓰면 타임아웃도 결정적이다.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::trace;

use crate::transport::Transport;

type Datagram = (Bytes, SocketAddr);

/// 메모리 네트워크
///
/// 존재하지 않는 주소로 보낸 데이터그램은 UDP처럼 조용히 사라진다
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    endpoints: Arc<DashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// 주소에 엔드포인트 바인딩
    pub fn bind(&self, addr: SocketAddr) -> io::Result<MemoryTransport> {
        if self.endpoints.contains_key(&addr) {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("{} already bound", addr),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.endpoints.insert(addr, tx);

        Ok(MemoryTransport {
            addr,
            network: self.clone(),
            inbox: tokio::sync::Mutex::new(rx),
        })
    }
}

/// 메모리 네트워크 엔드포인트
#[derive(Debug)]
pub struct MemoryTransport {
    addr: SocketAddr,
    network: MemoryNetwork,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
}

impl MemoryTransport {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Transport for MemoryTransport {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        if let Some(tx) = self.network.endpoints.get(&dest) {
            let _ = tx.send((Bytes::copy_from_slice(bytes), self.addr));
        }
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let mut inbox = self.inbox.lock().await;
        match inbox.recv().await {
            Some((data, from)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok((len, from))
            }
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "memory network endpoint closed",
            )),
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.network.endpoints.remove(&self.addr);
    }
}

/// 장애 주입 설정
///
/// 모든 확률은 `[0.0, 1.0]`
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultConfig {
    /// 송신 데이터그램 손실 확률
    pub loss_rate: f64,

    /// 한 바이트를 변조할 확률
    pub corrupt_rate: f64,

    /// 두 번 전달할 확률
    pub duplicate_rate: f64,
}

impl FaultConfig {
    /// 손실만 있는 설정
    pub fn lossy(loss_rate: f64) -> Self {
        Self {
            loss_rate,
            ..Self::default()
        }
    }
}

/// 주입된 장애 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub passed: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub duplicated: u64,
}

enum Fault {
    Pass,
    Drop,
    Corrupt(Vec<u8>),
    Duplicate,
}

/// 장애 주입 전송 계층
///
/// 송신 방향에만 장애를 적용한다. 양방향 손실은 양쪽 엔드포인트를 각각 감싸면 된다.
#[derive(Debug)]
pub struct LossyTransport<T> {
    inner: T,
    faults: FaultConfig,
    rng: Mutex<StdRng>,
    stats: Mutex<FaultStats>,
}

impl<T> LossyTransport<T> {
    pub fn new(inner: T, faults: FaultConfig, seed: u64) -> Self {
        Self {
            inner,
            faults,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            stats: Mutex::new(FaultStats::default()),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn fault_stats(&self) -> FaultStats {
        *self.stats.lock()
    }

    fn roll(&self, bytes: &[u8]) -> Fault {
        let mut rng = self.rng.lock();
        let mut stats = self.stats.lock();

        if rng.gen_bool(self.faults.loss_rate.clamp(0.0, 1.0)) {
            stats.dropped += 1;
            return Fault::Drop;
        }

        if !bytes.is_empty() && rng.gen_bool(self.faults.corrupt_rate.clamp(0.0, 1.0)) {
            let mut corrupted = bytes.to_vec();
            let idx = rng.gen_range(0..corrupted.len());
            corrupted[idx] ^= rng.gen_range(1..=u8::MAX);
            stats.corrupted += 1;
            return Fault::Corrupt(corrupted);
        }

        if rng.gen_bool(self.faults.duplicate_rate.clamp(0.0, 1.0)) {
            stats.duplicated += 1;
            return Fault::Duplicate;
        }

        stats.passed += 1;
        Fault::Pass
    }
}

impl<T: Transport> Transport for LossyTransport<T> {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        match self.roll(bytes) {
            Fault::Pass => self.inner.send_to(bytes, dest).await,
            Fault::Drop => {
                trace!("sim: {} bytes -> {} 손실", bytes.len(), dest);
                Ok(())
            }
            Fault::Corrupt(corrupted) => {
                trace!("sim: {} bytes -> {} 변조", bytes.len(), dest);
                self.inner.send_to(&corrupted, dest).await
            }
            Fault::Duplicate => {
                self.inner.send_to(bytes, dest).await?;
                self.inner.send_to(bytes, dest).await
            }
        }
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}
