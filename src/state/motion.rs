//! Arc-move planning for pipette moves.

use super::{GeometryView, LabwareView, PipetteView};
use crate::error::{EngineError, EngineResult};
use crate::types::{CriticalPoint, CurrentWell, MountType, Point, Waypoint, WellLocation};

/// Clearance above the tallest item when arcing between labware.
pub const DEFAULT_GENERAL_ARC_Z_MARGIN: f64 = 10.0;

/// Clearance above the current labware when arcing between its wells.
pub const DEFAULT_IN_LABWARE_ARC_Z_MARGIN: f64 = 5.0;

/// Labware quirk that centers multichannel pipettes over a well.
const CENTER_MULTICHANNEL_QUIRK: &str = "centerMultichannelOnWells";

/// Shape of a planned move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveType {
    /// Straight to the destination
    Direct,
    /// Up, over and down between wells of the same labware
    InLabwareArc,
    /// Up, over and down clearing everything on the deck
    GeneralArc,
}

/// Mount and critical point to use for a pipette move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipetteLocationData {
    pub mount: MountType,
    pub critical_point: Option<CriticalPoint>,
}

/// Plan waypoints from `origin` to `dest`.
#[allow(clippy::too_many_arguments)]
pub fn get_waypoints(
    origin: Point,
    dest: Point,
    min_travel_z: f64,
    max_travel_z: f64,
    move_type: MoveType,
    xy_waypoints: &[(f64, f64)],
    origin_cp: Option<CriticalPoint>,
    dest_cp: Option<CriticalPoint>,
) -> EngineResult<Vec<Waypoint>> {
    let dest_waypoint = Waypoint {
        position: dest,
        critical_point: dest_cp,
    };

    if dest.z > max_travel_z {
        return Err(EngineError::MotionPlanningFailed(format!(
            "Destination z {:.2} is above the reachable height {:.2}",
            dest.z, max_travel_z
        )));
    }
    if move_type == MoveType::Direct {
        return Ok(vec![dest_waypoint]);
    }
    if min_travel_z > max_travel_z {
        return Err(EngineError::MotionPlanningFailed(format!(
            "Arc height {:.2} is above the reachable height {:.2}",
            min_travel_z, max_travel_z
        )));
    }

    let margin = match move_type {
        MoveType::InLabwareArc => DEFAULT_IN_LABWARE_ARC_Z_MARGIN,
        _ => DEFAULT_GENERAL_ARC_Z_MARGIN,
    };
    // Never dip down on the way out of the origin
    let travel_z = (min_travel_z + margin).max(origin.z).max(dest.z).min(max_travel_z);

    let mut waypoints = Vec::new();
    if travel_z > origin.z {
        waypoints.push(Waypoint {
            position: origin.with_z(travel_z),
            critical_point: origin_cp,
        });
    }
    for &(x, y) in xy_waypoints {
        waypoints.push(Waypoint {
            position: Point::new(x, y, travel_z),
            critical_point: dest_cp,
        });
    }
    if travel_z > dest.z {
        waypoints.push(Waypoint {
            position: dest.with_z(travel_z),
            critical_point: dest_cp,
        });
    }
    waypoints.push(dest_waypoint);
    Ok(waypoints)
}

/// Motion planning queries.
#[derive(Debug, Clone, Copy)]
pub struct MotionView<'a> {
    labware: LabwareView<'a>,
    pipettes: PipetteView<'a>,
    geometry: GeometryView<'a>,
}

impl<'a> MotionView<'a> {
    pub(crate) fn new(labware: LabwareView<'a>, pipettes: PipetteView<'a>, geometry: GeometryView<'a>) -> Self {
        Self {
            labware,
            pipettes,
            geometry,
        }
    }

    fn should_center_on_wells(&self, pipette_id: &str, labware_id: &str) -> EngineResult<bool> {
        let multichannel = self.pipettes.get_config(pipette_id)?.channels > 1;
        Ok(multichannel && self.labware.get_has_quirk(labware_id, CENTER_MULTICHANNEL_QUIRK)?)
    }

    /// Mount and critical point for a pipette starting from `current_well`.
    pub fn get_pipette_location(
        &self,
        pipette_id: &str,
        current_well: Option<&CurrentWell>,
    ) -> EngineResult<PipetteLocationData> {
        let mount = self.pipettes.get_mount(pipette_id)?;
        let current_well = current_well.or_else(|| self.pipettes.get_current_well());

        let critical_point = match current_well {
            Some(well)
                if well.pipette_id == pipette_id && self.should_center_on_wells(pipette_id, &well.labware_id)? =>
            {
                Some(CriticalPoint::XyCenter)
            }
            _ => None,
        };
        Ok(PipetteLocationData { mount, critical_point })
    }

    /// Waypoints to move a pipette into a well.
    #[allow(clippy::too_many_arguments)]
    pub fn get_movement_waypoints_to_well(
        &self,
        pipette_id: &str,
        labware_id: &str,
        well_name: &str,
        well_location: Option<&WellLocation>,
        origin: Point,
        origin_cp: Option<CriticalPoint>,
        max_travel_z: f64,
        current_well: Option<&CurrentWell>,
        force_direct: bool,
        minimum_z_height: Option<f64>,
    ) -> EngineResult<Vec<Waypoint>> {
        let location = current_well.or_else(|| self.pipettes.get_current_well());
        let dest_cp = self
            .should_center_on_wells(pipette_id, labware_id)?
            .then_some(CriticalPoint::XyCenter);
        let destination = self.geometry.get_well_position(labware_id, well_name, well_location)?;

        let move_type = match location {
            _ if force_direct => MoveType::Direct,
            Some(well) if well.pipette_id == pipette_id && well.labware_id == labware_id => {
                if well.well_name == well_name {
                    MoveType::Direct
                } else {
                    MoveType::InLabwareArc
                }
            }
            _ => MoveType::GeneralArc,
        };

        let min_travel_z = self
            .geometry
            .get_min_travel_z(pipette_id, labware_id, location, minimum_z_height)?;
        let extra_waypoints = self.geometry.get_extra_waypoints(labware_id, location)?;

        get_waypoints(
            origin,
            destination,
            min_travel_z,
            max_travel_z,
            move_type,
            &extra_waypoints,
            origin_cp,
            dest_cp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_arc_clears_min_travel_z() {
        let waypoints = get_waypoints(
            Point::new(0.0, 0.0, 20.0),
            Point::new(100.0, 50.0, 5.0),
            30.0,
            200.0,
            MoveType::GeneralArc,
            &[],
            None,
            None,
        )
        .unwrap();

        let positions: Vec<Point> = waypoints.iter().map(|w| w.position).collect();
        assert_eq!(
            positions,
            vec![
                Point::new(0.0, 0.0, 40.0),
                Point::new(100.0, 50.0, 40.0),
                Point::new(100.0, 50.0, 5.0),
            ]
        );
    }

    #[test]
    fn test_in_labware_arc_uses_smaller_margin() {
        let waypoints = get_waypoints(
            Point::new(0.0, 0.0, 10.0),
            Point::new(9.0, 0.0, 10.0),
            14.0,
            200.0,
            MoveType::InLabwareArc,
            &[],
            None,
            None,
        )
        .unwrap();
        assert_eq!(waypoints[0].position.z, 19.0);
        assert_eq!(waypoints.len(), 3);
    }

    #[test]
    fn test_travel_height_is_capped() {
        let waypoints = get_waypoints(
            Point::new(0.0, 0.0, 10.0),
            Point::new(10.0, 10.0, 10.0),
            95.0,
            100.0,
            MoveType::GeneralArc,
            &[(50.0, 50.0)],
            None,
            Some(CriticalPoint::XyCenter),
        )
        .unwrap();
        assert!(waypoints.iter().all(|w| w.position.z <= 100.0));
        assert_eq!(waypoints[1].position, Point::new(50.0, 50.0, 100.0));
        assert_eq!(waypoints[1].critical_point, Some(CriticalPoint::XyCenter));
    }

    #[test]
    fn test_direct_move_is_one_waypoint() {
        let dest = Point::new(1.0, 2.0, 3.0);
        let waypoints = get_waypoints(Point::default(), dest, 500.0, 100.0, MoveType::Direct, &[], None, None)
            .unwrap();
        assert_eq!(waypoints, vec![Waypoint::new(dest)]);
    }

    #[test]
    fn test_unreachable_plans_fail() {
        let result = get_waypoints(
            Point::default(),
            Point::new(0.0, 0.0, 150.0),
            0.0,
            100.0,
            MoveType::GeneralArc,
            &[],
            None,
            None,
        );
        assert!(matches!(result, Err(EngineError::MotionPlanningFailed(_))));

        let result = get_waypoints(
            Point::default(),
            Point::new(0.0, 0.0, 10.0),
            120.0,
            100.0,
            MoveType::GeneralArc,
            &[],
            None,
            None,
        );
        assert!(matches!(result, Err(EngineError::MotionPlanningFailed(_))));
    }
}
