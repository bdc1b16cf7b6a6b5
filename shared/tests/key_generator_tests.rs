/// Tests for id generation and quarantined recycling

use std::time::Duration;

use polyview_shared::{KeyGenerator, ViewId};

#[test]
fn keys_are_sequential() {
    let mut generator = KeyGenerator::<ViewId>::new(Duration::from_secs(60));
    assert_eq!(generator.generate(), ViewId::new(0));
    assert_eq!(generator.generate(), ViewId::new(1));
    assert_eq!(generator.generate(), ViewId::new(2));
}

#[test]
fn recycled_key_is_quarantined() {
    let mut generator = KeyGenerator::<ViewId>::new(Duration::from_secs(60));
    let first = generator.generate();
    generator.recycle_key(&first);

    // TTL has not elapsed, so the freed id must not come back yet
    assert_eq!(generator.generate(), ViewId::new(1));
    assert_eq!(generator.generate(), ViewId::new(2));
}

#[test]
fn recycled_key_returns_after_quarantine() {
    let mut generator = KeyGenerator::<ViewId>::new(Duration::ZERO);
    let first = generator.generate();
    generator.recycle_key(&first);

    // Zero TTL: immediately eligible for reuse
    assert_eq!(generator.generate(), first);
}
