//! Per-call context handed from the transport edge to the service.
//!
//! The edge decides once whether the caller is a local trusted caller;
//! everything downstream only reads the flag.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Interrupt;

/// Token, trust flag, deadline and cancellation for one inbound call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: Option<String>,
    is_local: bool,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallContext {
    /// A call with no session and no trust.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the context from the transport peer.
    ///
    /// The caller is local when the peer is a loopback address AND the
    /// user agent starts with `local_agent_prefix`.
    pub fn from_peer(
        peer: SocketAddr,
        user_agent: &str,
        token: Option<String>,
        local_agent_prefix: &str,
    ) -> Self {
        let is_local = peer.ip().is_loopback()
            && !local_agent_prefix.is_empty()
            && user_agent.starts_with(local_agent_prefix);

        Self {
            token: token.filter(|t| !t.is_empty()),
            is_local,
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Mark the call as coming from a local trusted caller.
    pub fn local(mut self) -> Self {
        self.is_local = true;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check whether the call has already been interrupted.
    pub fn interrupted(&self) -> Option<Interrupt> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Some(Interrupt::Canceled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(Interrupt::DeadlineExceeded);
        }
        None
    }

    /// Drive `fut` to completion unless the call is canceled or its
    /// deadline elapses first.
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<Interrupt>,
    {
        if let Some(interrupt) = self.interrupted() {
            return Err(interrupt.into());
        }

        let cancelled = async {
            match &self.cancel {
                Some(cancel) => cancel.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            _ = cancelled => Err(Interrupt::Canceled.into()),
            _ = expired => Err(Interrupt::DeadlineExceeded.into()),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::SessionError;

    fn peer(addr: &str) -> SocketAddr {
        addr.parse().unwrap()
    }

    #[test]
    fn test_from_peer_local_detection() {
        let ctx = CallContext::from_peer(peer("127.0.0.1:5000"), "charonctl/1.0", None, "charonctl");
        assert!(ctx.is_local());

        let ctx = CallContext::from_peer(peer("[::1]:5000"), "charonctl", None, "charonctl");
        assert!(ctx.is_local());

        let ctx = CallContext::from_peer(peer("10.0.0.1:5000"), "charonctl", None, "charonctl");
        assert!(!ctx.is_local());

        let ctx = CallContext::from_peer(peer("127.0.0.1:5000"), "curl/8.0", None, "charonctl");
        assert!(!ctx.is_local());

        let ctx = CallContext::from_peer(peer("127.0.0.1:5000"), "anything", None, "");
        assert!(!ctx.is_local());
    }

    #[test]
    fn test_from_peer_drops_empty_token() {
        let ctx = CallContext::from_peer(peer("10.0.0.1:1"), "", Some(String::new()), "charonctl");
        assert_eq!(ctx.token(), None);

        let ctx = CallContext::from_peer(peer("10.0.0.1:1"), "", Some("abc".into()), "charonctl");
        assert_eq!(ctx.token(), Some("abc"));
    }

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = CallContext::new();
        let out: Result<i32, SessionError> = ctx.run(async { Ok(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_run_already_canceled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = CallContext::new().with_cancellation(cancel);

        let out: Result<(), SessionError> = ctx.run(async { Ok(()) }).await;
        assert!(matches!(out, Err(SessionError::Canceled)));
    }

    #[tokio::test]
    async fn test_run_canceled_midway() {
        let cancel = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
        let out: Result<(), SessionError> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        trigger.await.unwrap();

        assert!(matches!(out, Err(SessionError::Canceled)));
    }

    #[tokio::test]
    async fn test_run_deadline_exceeded() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));

        let out: Result<(), SessionError> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(out, Err(SessionError::DeadlineExceeded)));
    }
}
