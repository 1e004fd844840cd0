//! Read-only reference data: labware, deck, module and pipette definitions.
//!
//! Definitions arrive from an external catalog and are never mutated by the
//! engine. Field names follow the camelCase JSON layout of the catalog so that
//! definition files deserialize directly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::DeckType;
use crate::types::{DeckSlotName, Dimensions, LabwareOffsetVector, ModuleModel, ModuleType, Point};

/// Build the `namespace/loadName/version` URI of a labware definition.
pub fn uri_from_details(namespace: &str, load_name: &str, version: u32) -> String {
    format!("{namespace}/{load_name}/{version}")
}

/// Labware definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareDefinition {
    pub namespace: String,
    pub version: u32,
    pub parameters: LabwareParameters,
    #[serde(default)]
    pub metadata: LabwareMetadata,
    pub dimensions: LabwareDimensions,
    pub corner_offset_from_slot: Point,
    pub wells: BTreeMap<String, WellDefinition>,
    #[serde(default)]
    pub ordering: Vec<Vec<String>>,
}

impl LabwareDefinition {
    /// Unique URI of this definition.
    pub fn uri(&self) -> String {
        uri_from_details(&self.namespace, &self.parameters.load_name, self.version)
    }

    /// Overall labware dimensions.
    pub fn overall_dimensions(&self) -> Dimensions {
        Dimensions {
            x: self.dimensions.x_dimension,
            y: self.dimensions.y_dimension,
            z: self.dimensions.z_dimension,
        }
    }

    /// Well names in column-major pick order.
    pub fn ordered_wells(&self) -> impl Iterator<Item = &String> {
        self.ordering.iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareParameters {
    pub load_name: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub is_tiprack: bool,
    #[serde(default)]
    pub tip_length: Option<f64>,
    #[serde(default)]
    pub tip_overlap: Option<f64>,
    #[serde(default)]
    pub quirks: Vec<String>,
    #[serde(default)]
    pub is_magnetic_module_compatible: bool,
    #[serde(default)]
    pub magnetic_module_engage_height: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareMetadata {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabwareDimensions {
    pub x_dimension: f64,
    pub y_dimension: f64,
    pub z_dimension: f64,
}

/// Geometry of one well, relative to the labware origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellDefinition {
    pub depth: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub shape: String,
    #[serde(default)]
    pub diameter: Option<f64>,
    #[serde(default)]
    pub x_dimension: Option<f64>,
    #[serde(default)]
    pub y_dimension: Option<f64>,
    #[serde(default)]
    pub total_liquid_volume: f64,
}

/// Deck layout definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckDefinition {
    pub ot_id: String,
    pub slots: Vec<SlotDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDefinition {
    pub id: String,
    pub position: Point,
    pub bounding_box: Dimensions,
}

impl DeckDefinition {
    /// Look up a slot by name.
    pub fn slot(&self, slot_name: DeckSlotName) -> Option<&SlotDefinition> {
        self.slots.iter().find(|slot| slot.id == slot_name.id())
    }

    /// Standard 4x3 grid used by OT-2 style decks.
    pub fn standard(deck_type: DeckType) -> Self {
        const COLUMN_X: [f64; 3] = [0.0, 132.5, 265.0];
        const ROW_Y: [f64; 4] = [0.0, 90.5, 181.0, 271.5];

        let mut slots = Vec::with_capacity(12);
        for (row, y) in ROW_Y.iter().enumerate() {
            for (col, x) in COLUMN_X.iter().enumerate() {
                slots.push(SlotDefinition {
                    id: (row * 3 + col + 1).to_string(),
                    position: Point::new(*x, *y, 0.0),
                    bounding_box: Dimensions {
                        x: 128.0,
                        y: 86.0,
                        z: 0.0,
                    },
                });
            }
        }

        Self {
            ot_id: deck_type.as_str().to_string(),
            slots,
        }
    }
}

/// Module definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDefinition {
    pub model: ModuleModel,
    pub module_type: ModuleType,
    pub dimensions: ModuleDimensions,
    pub labware_offset: Point,
    /// Per-deck, per-slot 4x4 affine transforms applied to `labware_offset`.
    #[serde(default)]
    pub slot_transforms: HashMap<String, HashMap<String, SlotTransform>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDimensions {
    pub bare_overall_height: f64,
    pub over_labware_height: f64,
    #[serde(default)]
    pub lid_height: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotTransform {
    pub labware_offset: [[f64; 4]; 4],
}

impl ModuleDefinition {
    /// Offset from the slot origin to the labware origin for a module at `slot_name`.
    pub fn labware_offset_for(&self, deck_type: DeckType, slot_name: DeckSlotName) -> LabwareOffsetVector {
        let pre = [
            self.labware_offset.x,
            self.labware_offset.y,
            self.labware_offset.z,
            1.0,
        ];
        let transform = self
            .slot_transforms
            .get(deck_type.as_str())
            .and_then(|by_slot| by_slot.get(slot_name.id()));

        match transform {
            Some(xform) => {
                let m = &xform.labware_offset;
                let row = |i: usize| m[i].iter().zip(pre.iter()).map(|(a, b)| a * b).sum::<f64>();
                LabwareOffsetVector::new(row(0), row(1), row(2))
            }
            None => LabwareOffsetVector::new(pre[0], pre[1], pre[2]),
        }
    }
}

/// Static per-model pipette configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipetteStaticConfig {
    pub model: &'static str,
    pub channels: u32,
    pub min_volume: f64,
    pub max_volume: f64,
    /// Default nominal tip overlap, used when a tip rack is not listed
    pub default_tip_overlap: f64,
    /// Fraction of the tip length to lower into a tip rack when returning a tip
    pub return_tip_scale: f64,
    /// Highest reachable nozzle z with no tip attached
    pub home_position: f64,
}

const PIPETTE_CONFIGS: &[(&str, PipetteStaticConfig)] = &[
    (
        "p20_single_gen2",
        PipetteStaticConfig {
            model: "p20_single_v2.2",
            channels: 1,
            min_volume: 1.0,
            max_volume: 20.0,
            default_tip_overlap: 8.25,
            return_tip_scale: 0.5,
            home_position: 172.15,
        },
    ),
    (
        "p300_single_gen2",
        PipetteStaticConfig {
            model: "p300_single_v2.1",
            channels: 1,
            min_volume: 20.0,
            max_volume: 300.0,
            default_tip_overlap: 8.2,
            return_tip_scale: 0.5,
            home_position: 172.15,
        },
    ),
    (
        "p1000_single_gen2",
        PipetteStaticConfig {
            model: "p1000_single_v2.2",
            channels: 1,
            min_volume: 100.0,
            max_volume: 1000.0,
            default_tip_overlap: 7.95,
            return_tip_scale: 0.5,
            home_position: 172.15,
        },
    ),
    (
        "p1000_single_gen3",
        PipetteStaticConfig {
            model: "p1000_single_v3.3",
            channels: 1,
            min_volume: 5.0,
            max_volume: 1000.0,
            default_tip_overlap: 10.5,
            return_tip_scale: 0.5,
            home_position: 230.15,
        },
    ),
];

/// Look up the static configuration for a pipette name.
pub fn pipette_config(pipette_name: &str) -> Option<&'static PipetteStaticConfig> {
    PIPETTE_CONFIGS
        .iter()
        .find(|(name, _)| *name == pipette_name)
        .map(|(_, config)| config)
}
