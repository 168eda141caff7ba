//! Assertion functions for pane sequences.

use crate::pane::{Pane, PaneTiming};
use crate::window::Window;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections contain the same elements, ignoring order.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use ironpane::testing::assert_collections_unordered_equal;
///
/// assert_collections_unordered_equal(&[3, 1, 2], &[1, 2, 3]);
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );

    let actual_set: HashSet<_> = actual.iter().collect();
    let expected_set: HashSet<_> = expected.iter().collect();
    if actual_set != expected_set {
        let missing: Vec<_> = expected_set.difference(&actual_set).collect();
        let extra: Vec<_> = actual_set.difference(&expected_set).collect();
        panic!(
            "Collection content mismatch:\n  Missing elements: {missing:?}\n  Extra elements: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

/// Assert a pane's window, timing and index.
///
/// # Panics
///
/// Panics on the first field that differs.
pub fn assert_pane<T: Debug>(pane: &Pane<T>, window: Window, timing: PaneTiming, index: u64) {
    assert_eq!(pane.window, window, "Pane window mismatch: {pane:?}");
    assert_eq!(pane.info.timing, timing, "Pane timing mismatch: {pane:?}");
    assert_eq!(pane.info.index, index, "Pane index mismatch: {pane:?}");
}

/// Assert a pane's payload, ignoring order.
///
/// # Panics
///
/// Panics if the payload differs from `expected`.
pub fn assert_payload_unordered<T: Debug + Eq + Hash>(pane: &Pane<T>, expected: &[T]) {
    assert_collections_unordered_equal(&pane.payload, expected);
}

/// Assert that per window, pane indices run 0, 1, 2, … in emission order,
/// and that only index 0 is marked `is_first`.
///
/// # Panics
///
/// Panics at the first pane that breaks the sequence.
pub fn assert_pane_indices_increasing<T: Debug>(panes: &[Pane<T>]) {
    let mut next: HashMap<Window, u64> = HashMap::new();
    for pane in panes {
        let expected = next.entry(pane.window).or_insert(0);
        assert_eq!(
            pane.info.index, *expected,
            "Pane index out of sequence for window {}: {pane:?}",
            pane.window
        );
        assert_eq!(
            pane.info.is_first,
            pane.info.index == 0,
            "is_first must mark exactly index 0: {pane:?}"
        );
        *expected += 1;
    }
}

/// Assert that no window emitted more than one `ON_TIME` pane, and that an
/// `ON_TIME` pane always has index 0.
///
/// # Panics
///
/// Panics at the first offending pane.
pub fn assert_single_on_time<T: Debug>(panes: &[Pane<T>]) {
    let mut seen = HashSet::new();
    for pane in panes.iter().filter(|p| p.info.timing == PaneTiming::OnTime) {
        assert!(
            seen.insert(pane.window),
            "Second ON_TIME pane for window {}: {pane:?}",
            pane.window
        );
        assert_eq!(pane.info.index, 0, "ON_TIME pane must be index 0: {pane:?}");
    }
}

/// Assert that at most one pane per window is marked `is_last`, and that it
/// is the final pane emitted for that window.
///
/// # Panics
///
/// Panics if a window has a pane after its `is_last` pane.
pub fn assert_last_pane_is_final<T: Debug>(panes: &[Pane<T>]) {
    let mut closed = HashSet::new();
    for pane in panes {
        assert!(
            !closed.contains(&pane.window),
            "Pane emitted after the is_last pane of window {}: {pane:?}",
            pane.window
        );
        if pane.info.is_last {
            closed.insert(pane.window);
        }
    }
}

/// Every value across all panes, in emission order.
#[must_use]
pub fn all_values<T: Clone>(panes: &[Pane<T>]) -> Vec<T> {
    panes.iter().flat_map(|p| p.payload.iter().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pane::PaneInfo;

    fn pane(start: i64, index: u64, timing: PaneTiming) -> Pane<u32> {
        Pane {
            window: Window::new(start, start + 5_000),
            info: PaneInfo {
                index,
                timing,
                is_first: index == 0,
                is_last: false,
            },
            payload: vec![],
        }
    }

    #[test]
    fn interleaved_windows_keep_their_own_sequence() {
        let panes = vec![
            pane(0, 0, PaneTiming::OnTime),
            pane(5_000, 0, PaneTiming::OnTime),
            pane(0, 1, PaneTiming::Late),
            pane(5_000, 1, PaneTiming::Late),
        ];
        assert_pane_indices_increasing(&panes);
        assert_single_on_time(&panes);
    }

    #[test]
    #[should_panic(expected = "out of sequence")]
    fn gap_in_indices_panics() {
        assert_pane_indices_increasing(&[
            pane(0, 0, PaneTiming::OnTime),
            pane(0, 2, PaneTiming::Late),
        ]);
    }

    #[test]
    #[should_panic(expected = "Second ON_TIME")]
    fn two_on_time_panes_panic() {
        assert_single_on_time(&[pane(0, 0, PaneTiming::OnTime), pane(0, 0, PaneTiming::OnTime)]);
    }
}
