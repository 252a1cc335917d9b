//! 전송 계층 추상화
//!
//! 프로토콜은 "보내기"와 "받기" 두 동작만 요구한다. 실제 UDP 소켓과
//! 테스트용 메모리 네트워크([`crate::sim`])가 같은 트레이트를 구현한다.
//! 하나의 전송 핸들은 한 번에 하나의 송신자/수신자만 사용해야 한다.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

/// 데이터그램 전송 계층
pub trait Transport: Send + Sync {
    /// `dest`로 데이터그램 하나 전송
    fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> impl Future<Output = io::Result<()>> + Send;

    /// 데이터그램 하나 수신 (받은 길이, 보낸 주소)
    ///
    /// `buf`보다 긴 데이터그램은 잘린다
    fn recv_from(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

impl Transport for UdpSocket {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        UdpSocket::send_to(self, bytes, dest).await.map(|_| ())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

impl<T: Transport> Transport for Arc<T> {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        (**self).send_to(bytes, dest).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        (**self).recv_from(buf).await
    }
}

impl<T: Transport> Transport for &T {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        (**self).send_to(bytes, dest).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        (**self).recv_from(buf).await
    }
}

/// 손실로 간주하고 재전송에 맡길 수 있는 에러인지
///
/// UDP에서는 ICMP 응답 때문에 연결 거부/리셋이 보고될 수 있다
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}
