//! 전송 취소 토큰

use std::sync::Arc;

use tokio::sync::watch;

/// 취소 토큰
///
/// 복제본끼리 상태를 공유한다. 한 번 취소되면 되돌릴 수 없다.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// 취소 요청
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 취소될 때까지 대기
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // 송신측은 self.tx가 쥐고 있으므로 changed()가 실패하지 않음
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
