//! Shared value types: points, deck locations, offsets, mounts and axes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Absolute deck coordinate in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    /// Construct a point from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Same point with a different z.
    pub fn with_z(self, z: f64) -> Self {
        Self { z, ..self }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Add<LabwareOffsetVector> for Point {
    type Output = Point;

    fn add(self, rhs: LabwareOffsetVector) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// Calibration correction applied to a labware's nominal position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LabwareOffsetVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LabwareOffsetVector {
    /// Construct a vector from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Add for LabwareOffsetVector {
    type Output = LabwareOffsetVector;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// Named position on the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeckSlotName {
    #[serde(rename = "1")]
    Slot1,
    #[serde(rename = "2")]
    Slot2,
    #[serde(rename = "3")]
    Slot3,
    #[serde(rename = "4")]
    Slot4,
    #[serde(rename = "5")]
    Slot5,
    #[serde(rename = "6")]
    Slot6,
    #[serde(rename = "7")]
    Slot7,
    #[serde(rename = "8")]
    Slot8,
    #[serde(rename = "9")]
    Slot9,
    #[serde(rename = "10")]
    Slot10,
    #[serde(rename = "11")]
    Slot11,
    #[serde(rename = "12")]
    Slot12,
}

impl DeckSlotName {
    /// Slot occupied by the fixed trash.
    pub const FIXED_TRASH: DeckSlotName = DeckSlotName::Slot12;

    /// Slot id as used by deck definitions.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Slot1 => "1",
            Self::Slot2 => "2",
            Self::Slot3 => "3",
            Self::Slot4 => "4",
            Self::Slot5 => "5",
            Self::Slot6 => "6",
            Self::Slot7 => "7",
            Self::Slot8 => "8",
            Self::Slot9 => "9",
            Self::Slot10 => "10",
            Self::Slot11 => "11",
            Self::Slot12 => "12",
        }
    }

}

impl fmt::Display for DeckSlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.id())
    }
}

/// Labware or module placed directly in a deck slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSlotLocation {
    pub slot_name: DeckSlotName,
}

/// Labware placed on top of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleLocation {
    pub module_id: String,
}

/// Where a labware currently is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabwareLocation {
    DeckSlot(DeckSlotLocation),
    Module(ModuleLocation),
    OffDeck,
}

impl LabwareLocation {
    /// Shorthand for a deck-slot location.
    pub fn slot(slot_name: DeckSlotName) -> Self {
        Self::DeckSlot(DeckSlotLocation { slot_name })
    }

    /// Shorthand for an on-module location.
    pub fn module(module_id: impl Into<String>) -> Self {
        Self::Module(ModuleLocation {
            module_id: module_id.into(),
        })
    }
}

impl fmt::Display for LabwareLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeckSlot(loc) => write!(f, "{}", loc.slot_name),
            Self::Module(loc) => write!(f, "module {}", loc.module_id),
            Self::OffDeck => write!(f, "off deck"),
        }
    }
}

/// Module hardware models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleModel {
    #[serde(rename = "magneticModuleV1")]
    MagneticModuleV1,
    #[serde(rename = "magneticModuleV2")]
    MagneticModuleV2,
    #[serde(rename = "thermocyclerModuleV1")]
    ThermocyclerModuleV1,
    #[serde(rename = "thermocyclerModuleV2")]
    ThermocyclerModuleV2,
    #[serde(rename = "heaterShakerModuleV1")]
    HeaterShakerModuleV1,
}

/// Module families, which decide what sub-state a module carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleType {
    #[serde(rename = "magneticModuleType")]
    Magnetic,
    #[serde(rename = "thermocyclerModuleType")]
    Thermocycler,
    #[serde(rename = "heaterShakerModuleType")]
    HeaterShaker,
}

impl ModuleModel {
    /// Family this model belongs to.
    pub fn module_type(&self) -> ModuleType {
        match self {
            Self::MagneticModuleV1 | Self::MagneticModuleV2 => ModuleType::Magnetic,
            Self::ThermocyclerModuleV1 | Self::ThermocyclerModuleV2 => ModuleType::Thermocycler,
            Self::HeaterShakerModuleV1 => ModuleType::HeaterShaker,
        }
    }
}

/// The definition and location combination a calibration offset applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareOffsetLocation {
    pub slot_name: DeckSlotName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_model: Option<ModuleModel>,
}

/// Request body for adding a calibration offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareOffsetCreate {
    pub definition_uri: String,
    pub location: LabwareOffsetLocation,
    pub vector: LabwareOffsetVector,
}

/// An immutable calibration offset record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareOffset {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub definition_uri: String,
    pub location: LabwareOffsetLocation,
    pub vector: LabwareOffsetVector,
}

/// A labware known to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedLabware {
    pub id: String,
    pub load_name: String,
    pub definition_uri: String,
    pub location: LabwareLocation,
    pub offset_id: Option<String>,
    pub display_name: Option<String>,
}

/// A module known to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedModule {
    pub id: String,
    pub model: ModuleModel,
    pub location: DeckSlotLocation,
    pub serial_number: Option<String>,
}

/// Pipette mounts on the gantry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    Left,
    Right,
}

/// Hardware mounts, including the gripper's extension mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mount {
    Left,
    Right,
    Extension,
}

impl From<MountType> for Mount {
    fn from(mount: MountType) -> Self {
        match mount {
            MountType::Left => Mount::Left,
            MountType::Right => Mount::Right,
        }
    }
}

/// Motor axes the engine may home or move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MotorAxis {
    X,
    Y,
    LeftZ,
    RightZ,
    LeftPlunger,
    RightPlunger,
    ExtensionZ,
    ExtensionJaw,
}

impl MotorAxis {
    /// Every axis, in homing order.
    pub const ALL: [MotorAxis; 8] = [
        MotorAxis::LeftZ,
        MotorAxis::RightZ,
        MotorAxis::ExtensionZ,
        MotorAxis::X,
        MotorAxis::Y,
        MotorAxis::LeftPlunger,
        MotorAxis::RightPlunger,
        MotorAxis::ExtensionJaw,
    ];

    /// Vertical axis of the given mount.
    pub fn z_for_mount(mount: Mount) -> Self {
        match mount {
            Mount::Left => MotorAxis::LeftZ,
            Mount::Right => MotorAxis::RightZ,
            Mount::Extension => MotorAxis::ExtensionZ,
        }
    }
}

/// Cartesian axis for relative moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementAxis {
    X,
    Y,
    Z,
}

/// Reference point on the end-effector that a position describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalPoint {
    Nozzle,
    Tip,
    XyCenter,
    GripperJawCenter,
}

/// Intermediate target of a motion plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub position: Point,
    pub critical_point: Option<CriticalPoint>,
}

impl Waypoint {
    /// Waypoint with no critical-point override.
    pub fn new(position: Point) -> Self {
        Self {
            position,
            critical_point: None,
        }
    }

}

/// Origin a well location is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellOrigin {
    #[default]
    Top,
    Bottom,
    Center,
}

/// Offset from a well origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WellOffset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Position relative to a well.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WellLocation {
    #[serde(default)]
    pub origin: WellOrigin,
    #[serde(default)]
    pub offset: WellOffset,
}

/// Origin for tip drops; `Default` lets the engine pick per labware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropTipWellOrigin {
    Top,
    Bottom,
    Center,
    #[default]
    Default,
}

/// Tip-drop location relative to a well.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DropTipWellLocation {
    #[serde(default)]
    pub origin: DropTipWellOrigin,
    #[serde(default)]
    pub offset: WellOffset,
}

/// The well a pipette last moved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWell {
    pub pipette_id: String,
    pub labware_id: String,
    pub well_name: String,
}

/// How a labware gets from one location to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabwareMovementStrategy {
    UsingGripper,
    ManualMoveWithPause,
    #[default]
    ManualMoveWithoutPause,
}

impl LabwareMovementStrategy {
    pub fn uses_gripper(&self) -> bool {
        matches!(self, Self::UsingGripper)
    }
}

/// Additional gripper offsets for a labware move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareMovementOffsetData {
    pub pick_up_offset: Option<LabwareOffsetVector>,
    pub drop_offset: Option<LabwareOffsetVector>,
    #[serde(default = "default_use_current_offset")]
    pub use_current_offset: bool,
}

fn default_use_current_offset() -> bool {
    true
}

impl Default for LabwareMovementOffsetData {
    fn default() -> Self {
        Self {
            pick_up_offset: None,
            drop_offset: None,
            use_current_offset: default_use_current_offset(),
        }
    }
}

/// Thermocycler lid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermocyclerLidStatus {
    #[default]
    Unknown,
    Open,
    Closed,
}

/// Heater-shaker labware latch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaterShakerLatchStatus {
    #[default]
    Unknown,
    Open,
    Closed,
}

/// Robot door state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
}

/// Outward status of the whole engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineStatus {
    Idle,
    Running,
    Paused,
    BlockedByOpenDoor,
    Stopping,
    Stopped,
    Finishing,
    Failed,
    Succeeded,
}

impl EngineStatus {
    /// Whether the run can no longer make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed | Self::Succeeded)
    }
}

/// A liquid declared for the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Liquid {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub display_color: Option<String>,
}

/// Effective geometry of a tip attached to a pipette.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TipGeometry {
    /// Length below the nozzle once seated
    pub length: f64,
    pub diameter: f64,
    pub volume: f64,
}

/// Overall dimensions of a labware.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}
