//! Property tests for combining gripper offsets with calibration.

use proptest::prelude::*;

use protocol_engine::execution::combine_offsets;
use protocol_engine::types::LabwareOffsetVector;

fn vector() -> impl Strategy<Value = LabwareOffsetVector> {
    (-50.0..50.0f64, -50.0..50.0f64, -50.0..50.0f64).prop_map(|(x, y, z)| LabwareOffsetVector::new(x, y, z))
}

proptest! {
    #[test]
    fn combined_offset_adds_current_when_requested(current in vector(), additional in vector()) {
        let combined = combine_offsets(true, Some(current), Some(additional));
        prop_assert_eq!(combined, current + additional);
    }

    #[test]
    fn combined_offset_ignores_current_when_not_requested(
        current in proptest::option::of(vector()),
        additional in vector(),
    ) {
        prop_assert_eq!(combine_offsets(false, current, Some(additional)), additional);
    }

    #[test]
    fn missing_offsets_count_as_zero(current in vector(), use_current in any::<bool>()) {
        let expected = if use_current { current } else { LabwareOffsetVector::zero() };
        prop_assert_eq!(combine_offsets(use_current, Some(current), None), expected);
        prop_assert_eq!(combine_offsets(use_current, None, None), LabwareOffsetVector::zero());
    }
}
