// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for context.rs

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::test_support::{aws_cloud, FakeCluster, StaticEc2};
    use std::time::Duration;

    fn context(token: CancellationToken) -> Context {
        let options = Options::from_yaml("cloud: aws\ncloudCallTimeoutSeconds: 7\n").unwrap();
        Context::new(
            Arc::new(FakeCluster::default()),
            Arc::new(aws_cloud(Arc::new(StaticEc2::default()))),
            None,
            Arc::new(options),
            token,
        )
    }

    #[test]
    fn test_scope_uses_configured_timeout() {
        let ctx = context(CancellationToken::new());
        assert_eq!(ctx.scope().call_timeout(), Duration::from_secs(7));
        assert!(!ctx.scope().is_cancelled());
    }

    #[test]
    fn test_scope_observes_root_cancellation() {
        let token = CancellationToken::new();
        let ctx = context(token.clone());
        let scope = ctx.scope();

        token.cancel();

        assert!(scope.is_cancelled());
        assert!(ctx.scope().is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = context(CancellationToken::new());
        let clone = ctx.clone();

        ctx.requeues.next_attempt("node-labels//n1");

        assert_eq!(clone.requeues.len(), 1);
        assert!(Arc::ptr_eq(&ctx.hosts, &clone.hosts));
    }
}
