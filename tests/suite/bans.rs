//! Ban persistence across store handles.

use chrono::TimeDelta;
use wordchain_engine::{BanDuration, TemporaryBanRegistry};
use wordchain_store::BanStore;

use crate::common::{clock, seeded};

#[test]
fn bans_survive_a_reopen() {
    let db = seeded(&["하늘", "늘보"]);
    let clock = clock();

    let registry = TemporaryBanRegistry::load(db.store.clone(), clock.clone()).unwrap();
    registry.ban('늘', BanDuration::Permanent);
    registry.ban('보', BanDuration::For(TimeDelta::hours(1)));
    registry.ban('물', BanDuration::For(TimeDelta::hours(1)));
    assert!(registry.unban('물'));
    drop(registry);

    let reloaded = TemporaryBanRegistry::load(db.reopen(), clock.clone()).unwrap();
    assert!(reloaded.is_banned('늘'));
    assert!(reloaded.is_banned('보'));
    assert!(!reloaded.is_banned('물'));

    clock.advance(TimeDelta::hours(2));
    assert!(!reloaded.is_banned('보'));
    assert_eq!(reloaded.active_chars(), vec!['늘']);
}

#[test]
fn expired_bans_are_purged_on_load() {
    let db = seeded(&["하늘"]);
    let clock = clock();

    let registry = TemporaryBanRegistry::load(db.store.clone(), clock.clone()).unwrap();
    registry.ban('늘', BanDuration::For(TimeDelta::minutes(30)));
    clock.advance(TimeDelta::hours(1));

    let reloaded = TemporaryBanRegistry::load(db.store.clone(), clock).unwrap();
    assert!(reloaded.list_active().is_empty());
    assert!(db.store.load_bans().unwrap().is_empty());
}
