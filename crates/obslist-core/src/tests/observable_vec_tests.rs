use obslist_testing::ChangeRecorder;

use crate::{ListChange, ObservableVec};

#[test]
fn push_emits_one_insert_at_the_end() {
    let list = ObservableVec::from(vec![1, 2]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    list.push(3);

    assert_eq!(list.to_vec(), vec![1, 2, 3]);
    assert_eq!(
        recorder.take(),
        vec![ListChange::Inserted { start: 2, count: 1 }]
    );
}

#[test]
fn insert_all_emits_one_batched_insert() {
    let list = ObservableVec::from(vec![1, 4]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    list.insert_all(1, vec![2, 3]);

    assert_eq!(list.to_vec(), vec![1, 2, 3, 4]);
    assert_eq!(
        recorder.take(),
        vec![ListChange::Inserted { start: 1, count: 2 }]
    );
}

#[test]
fn empty_insert_all_emits_nothing() {
    let list = ObservableVec::from(vec![1]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    list.insert_all(0, Vec::new());
    list.extend(Vec::new());

    assert!(recorder.is_empty());
}

#[test]
fn set_emits_changed_and_returns_the_previous_value() {
    let list = ObservableVec::from(vec![1, 2]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    let previous = list.set(1, 20);

    assert_eq!(previous, 2);
    assert_eq!(list.to_vec(), vec![1, 20]);
    assert_eq!(
        recorder.take(),
        vec![ListChange::Changed { start: 1, count: 1 }]
    );
}

#[test]
fn set_all_overwrites_in_place_and_keeps_the_length() {
    let list = ObservableVec::from(vec![1, 2, 3, 4]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    list.set_all(1, vec![20, 30]);

    assert_eq!(list.to_vec(), vec![1, 20, 30, 4]);
    assert_eq!(
        recorder.take(),
        vec![ListChange::Changed { start: 1, count: 2 }]
    );
}

#[test]
fn remove_range_emits_one_batched_remove() {
    let list = ObservableVec::from(vec![1, 2, 3, 4, 5]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    list.remove_range(1, 3);

    assert_eq!(list.to_vec(), vec![1, 5]);
    assert_eq!(
        recorder.take(),
        vec![ListChange::Removed { start: 1, count: 3 }]
    );
}

#[test]
fn clear_emits_a_remove_covering_everything() {
    let list = ObservableVec::from(vec![1, 2, 3]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    list.clear();
    list.clear(); // already empty, nothing to report

    assert!(list.is_empty());
    assert_eq!(
        recorder.take(),
        vec![ListChange::Removed { start: 0, count: 3 }]
    );
}

#[test]
fn move_range_relocates_forward() {
    let list = ObservableVec::from(vec![1, 2, 3, 4, 5]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    list.move_range(0, 5, 2);

    assert_eq!(list.to_vec(), vec![3, 4, 5, 1, 2]);
    assert_eq!(
        recorder.take(),
        vec![ListChange::Moved {
            from: 0,
            to: 5,
            count: 2
        }]
    );
}

#[test]
fn move_range_relocates_backward() {
    let list = ObservableVec::from(vec![1, 2, 3, 4, 5]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    list.move_range(3, 1, 2);

    assert_eq!(list.to_vec(), vec![1, 4, 5, 2, 3]);
    assert_eq!(
        recorder.take(),
        vec![ListChange::Moved {
            from: 3,
            to: 1,
            count: 2
        }]
    );
}

#[test]
fn move_into_the_moved_window_leaves_contents_untouched() {
    let list = ObservableVec::from(vec![1, 2, 3, 4, 5]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    list.move_range(1, 2, 3);

    assert_eq!(list.to_vec(), vec![1, 2, 3, 4, 5]);
    // The event is still published; consumers decide it is a no-op.
    assert_eq!(
        recorder.take(),
        vec![ListChange::Moved {
            from: 1,
            to: 2,
            count: 3
        }]
    );
}

#[test]
fn notify_reset_publishes_without_mutating() {
    let list = ObservableVec::from(vec![1, 2]);
    let recorder = ChangeRecorder::new();
    let _watch = list.subscribe(recorder.callback());

    list.notify_reset();

    assert_eq!(list.to_vec(), vec![1, 2]);
    assert_eq!(recorder.take(), vec![ListChange::Reset]);
}

#[test]
fn index_of_finds_the_first_match() {
    let list = ObservableVec::from(vec![1, 2, 2, 3]);
    assert_eq!(list.index_of(&2), Some(1));
    assert_eq!(list.index_of(&9), None);
}

#[test]
fn cancelled_subscription_stops_receiving() {
    let list = ObservableVec::from(vec![1]);
    let recorder = ChangeRecorder::new();
    let watch = list.subscribe(recorder.callback());

    list.push(2);
    watch.cancel();
    list.push(3);

    assert_eq!(
        recorder.take(),
        vec![ListChange::Inserted { start: 1, count: 1 }]
    );
}
