use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::DispatchError;

/// An ordered pool of provider credentials with a rotating cursor.
///
/// Rotation is round-robin rather than least-recently-failed: provider
/// throttling correlates with time, not with a specific bad key, so a
/// cyclic cursor spreads load deterministically. The cursor is the only
/// cross-cutting mutable state in the dispatcher; duplicate rotations under
/// contention are harmless because the pool is small and cyclic.
#[derive(Debug)]
pub struct CredentialPool {
    credentials: Vec<String>,
    current: AtomicUsize,
}

impl CredentialPool {
    pub fn new(credentials: Vec<String>) -> Self {
        Self {
            credentials,
            current: AtomicUsize::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// The currently active credential, or `NoCredentials` for an empty pool.
    pub fn active(&self) -> Result<String, DispatchError> {
        let index = self.current.load(Ordering::Relaxed);
        self.credentials
            .get(index)
            .cloned()
            .ok_or(DispatchError::NoCredentials)
    }

    /// Advance the cursor to the next credential, wrapping at the end.
    ///
    /// Valid (and a no-op index-wise) for pools of one; does nothing for an
    /// empty pool. Only the last four characters of the newly active key are
    /// ever logged.
    pub fn rotate(&self) {
        let len = self.credentials.len();
        if len == 0 {
            return;
        }
        let previous = self
            .current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some((current + 1) % len)
            })
            .unwrap_or_default();
        let next = (previous + 1) % len;
        tracing::info!(
            credential = %format!("...{}", key_suffix(&self.credentials[next])),
            "rotated provider credential"
        );
    }
}

fn key_suffix(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_has_no_active_credential() {
        let pool = CredentialPool::new(vec![]);
        assert!(matches!(
            pool.active(),
            Err(DispatchError::NoCredentials)
        ));
    }

    #[test]
    fn rotation_cycles_through_pool() {
        let pool = CredentialPool::new(vec!["k1".into(), "k2".into(), "k3".into()]);
        assert_eq!(pool.active().unwrap(), "k1");
        pool.rotate();
        assert_eq!(pool.active().unwrap(), "k2");
        pool.rotate();
        assert_eq!(pool.active().unwrap(), "k3");
        pool.rotate();
        assert_eq!(pool.active().unwrap(), "k1");
    }

    #[test]
    fn k_rotations_return_to_start() {
        for k in 1..=5 {
            let pool =
                CredentialPool::new((0..k).map(|i| format!("key-{i}")).collect());
            let before = pool.active().unwrap();
            for _ in 0..k {
                pool.rotate();
            }
            assert_eq!(pool.active().unwrap(), before);
        }
    }

    #[test]
    fn single_credential_rotation_is_a_noop() {
        let pool = CredentialPool::new(vec!["only".into()]);
        pool.rotate();
        assert_eq!(pool.active().unwrap(), "only");
    }

    #[test]
    fn rotating_an_empty_pool_is_safe() {
        let pool = CredentialPool::new(vec![]);
        pool.rotate();
        assert!(pool.active().is_err());
    }

    #[test]
    fn concurrent_rotation_keeps_index_in_bounds() {
        use std::sync::Arc;

        let pool = Arc::new(CredentialPool::new(vec![
            "k1".into(),
            "k2".into(),
            "k3".into(),
        ]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        pool.rotate();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // 4 * 250 rotations on a pool of 3: whatever interleaving happened,
        // the cursor must still point at a real credential.
        assert!(pool.active().is_ok());
    }

    #[test]
    fn key_suffix_handles_short_keys() {
        assert_eq!(key_suffix("abcdef"), "cdef");
        assert_eq!(key_suffix("ab"), "ab");
        assert_eq!(key_suffix(""), "");
    }
}
