use crate::scheduler::{CallbackKind, Scheduler};

/// At one shared instant the callbacks come back in the fixed order:
/// forcing, rating curve, allocation, coupling, output.
#[test]
fn shared_instant_ordering() {
    let mut s = Scheduler::build(&[10.0], &[10.0], Some(10.0), Some(10.0), 10.0, 0.0, 20.0);
    // t = 0 has the allocation kick-off and the first output frame.
    let due0 = s.pop_due(0.0);
    assert_eq!(due0, vec![CallbackKind::Allocation, CallbackKind::Output]);
    let due10 = s.pop_due(10.0);
    assert_eq!(
        due10,
        vec![
            CallbackKind::Forcing,
            CallbackKind::RatingCurve,
            CallbackKind::Allocation,
            CallbackKind::Coupling,
            CallbackKind::Output,
        ]
    );
}

#[test]
fn saveat_zero_keeps_only_start_and_end_frames() {
    let mut s = Scheduler::build(&[], &[], None, None, 0.0, 0.0, 100.0);
    assert_eq!(s.pop_due(0.0), vec![CallbackKind::Output]);
    assert_eq!(s.next_time(), Some(100.0));
    assert_eq!(s.pop_due(100.0), vec![CallbackKind::Output]);
    assert!(s.is_finished());
}

#[test]
fn table_times_outside_the_horizon_are_dropped() {
    let s = Scheduler::build(&[-5.0, 50.0, 500.0], &[], None, None, 0.0, 0.0, 100.0);
    // Only the in-range forcing time and the two output frames remain.
    let mut times = vec![];
    let mut s = s;
    while let Some(t) = s.next_time() {
        s.pop_due(t);
        times.push(t);
    }
    assert_eq!(times, vec![0.0, 50.0, 100.0]);
}
