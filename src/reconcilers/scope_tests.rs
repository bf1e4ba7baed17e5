// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `scope.rs`

#[cfg(test)]
mod tests {
    use crate::errors::{ControllerError, ErrorKind};
    use crate::reconcilers::scope::CallScope;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_passes_through_result() {
        let scope = CallScope::new(CancellationToken::new(), Duration::from_secs(5));
        let value = scope.run("op", async { Ok::<_, ControllerError>(42) }).await.unwrap();
        assert_eq!(value, 42);

        let err = scope
            .run("op", async { Err::<(), _>(ControllerError::Terminal("bad".into())) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Terminal);
    }

    #[tokio::test]
    async fn test_deadline_is_transient() {
        let scope = CallScope::new(CancellationToken::new(), Duration::from_millis(100));
        let err = scope
            .run("DescribeNetworkInterfaces", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, ControllerError>(())
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransientCloud);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("DescribeNetworkInterfaces"));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_call() {
        let token = CancellationToken::new();
        let scope = CallScope::new(token.clone(), Duration::from_secs(300));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let err = scope
            .run("compute.instances.get", async {
                tokio::time::sleep(Duration::from_secs(300)).await;
                Ok::<_, ControllerError>(())
            })
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_already_cancelled_scope_never_starts_call() {
        let token = CancellationToken::new();
        token.cancel();
        let scope = CallScope::new(token, Duration::from_secs(1));

        let err = scope
            .run("op", std::future::pending::<Result<(), ControllerError>>())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(scope.is_cancelled());
    }
}
