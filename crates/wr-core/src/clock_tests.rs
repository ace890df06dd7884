use super::*;
use chrono::TimeZone;

#[test]
fn fake_clock_holds_time_until_advanced() {
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let clock = FakeClock::at(t0);
    assert_eq!(clock.now(), t0);
    assert_eq!(clock.now(), t0);
    clock.advance(chrono::Duration::seconds(5));
    assert_eq!(clock.now(), t0 + chrono::Duration::seconds(5));
}

#[test]
fn system_clock_moves_forward() {
    let clock = SystemClock;
    let a = clock.now();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let b = clock.now();
    assert!(b >= a);
}
