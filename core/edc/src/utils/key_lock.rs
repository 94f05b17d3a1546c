use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Per key slots guarded by their own async mutex.
///
/// Holding the slot of one key never blocks callers working on other keys.
pub struct KeyLock<K, V> {
    lock_map: RwLock<HashMap<K, Arc<Mutex<Option<V>>>>>,
}

impl<K: Eq + Hash + Clone, V> KeyLock<K, V> {
    pub fn new() -> KeyLock<K, V> {
        KeyLock {
            lock_map: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_slot(&self, key: &K) -> Arc<Mutex<Option<V>>> {
        // Read guard must be dropped before write lock is taken.
        let existing = { self.lock_map.read().await.get(key).cloned() };
        match existing {
            Some(slot) => slot,
            None => self
                .lock_map
                .write()
                .await
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_shares_slot() {
        let locks = KeyLock::<String, u32>::new();
        let a = locks.get_slot(&"a".to_string()).await;
        *a.lock().await = Some(5);

        let again = locks.get_slot(&"a".to_string()).await;
        assert_eq!(*again.lock().await, Some(5));
        assert!(locks.get_slot(&"b".to_string()).await.lock().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_do_not_block() {
        let locks = KeyLock::<&'static str, ()>::new();
        let a = locks.get_slot(&"a").await;
        let _held = a.lock().await;

        let b = locks.get_slot(&"b").await;
        let acquired = tokio::time::timeout(Duration::from_secs(1), b.lock()).await;
        assert!(acquired.is_ok());

        let a_again = locks.get_slot(&"a").await;
        let blocked = tokio::time::timeout(Duration::from_secs(1), a_again.lock()).await;
        assert!(blocked.is_err());
    }
}
