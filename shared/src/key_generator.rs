use std::{collections::VecDeque, time::{Duration, Instant}};

use log::trace;

/// Issues sequential ids and recycles freed ones after a quarantine period,
/// so an id is only reissued once no stale references to its previous
/// holder can reasonably remain in flight.
pub struct KeyGenerator<K: Copy + From<u16> + Into<u16>> {
    next_key: u16,
    recycle_ttl: Duration,
    recycled: VecDeque<(Instant, u16)>,
    phantom: std::marker::PhantomData<K>,
}

impl<K: Copy + From<u16> + Into<u16>> KeyGenerator<K> {
    pub fn new(recycle_ttl: Duration) -> Self {
        Self {
            next_key: 0,
            recycle_ttl,
            recycled: VecDeque::new(),
            phantom: std::marker::PhantomData,
        }
    }

    pub fn generate(&mut self) -> K {
        // Prefer a quarantine-expired recycled key
        if let Some((freed_at, _)) = self.recycled.front() {
            if freed_at.elapsed() >= self.recycle_ttl {
                if let Some((_, key)) = self.recycled.pop_front() {
                    trace!("Reissuing recycled key {}", key);
                    return K::from(key);
                }
            }
        }
        let key = self.next_key;
        self.next_key = self.next_key.wrapping_add(1);
        K::from(key)
    }

    pub fn recycle_key(&mut self, key: &K) {
        self.recycled.push_back((Instant::now(), (*key).into()));
    }
}
