//! Parameter schema the host uses to render and validate the node.

use crate::image::{AspectRatio, Resolution};
use serde::Serialize;

/// Registered node identifier.
pub const NODE_NAME: &str = "NanoBananaPro";
/// Name shown in the host UI.
pub const DISPLAY_NAME: &str = "NanoBanana Pro Image Generator";
/// Menu category.
pub const CATEGORY: &str = "NanoBanana Pro";

/// Default prompt shown in a fresh node.
pub const DEFAULT_PROMPT: &str =
    "A cute kitten sitting in a garden, oil painting style, high detail";

/// Describes one input or output slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ParamSpec {
    /// Free text.
    String {
        /// Initial value.
        default: String,
        /// Render as a text area.
        multiline: bool,
        /// Hint shown while empty.
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    /// One of a fixed list of values.
    Choice {
        /// Allowed values, in display order.
        values: Vec<&'static str>,
        /// Initially selected value.
        default: &'static str,
    },
    /// Unsigned integer.
    #[allow(missing_docs)]
    Int {
        default: u64,
        min: u64,
        max: u64,
        step: u64,
    },
    /// Image batch.
    Image,
}

/// A named slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    /// Slot name, as passed back in [`crate::NodeInputs`].
    pub name: &'static str,
    /// Slot description.
    #[serde(flatten)]
    pub spec: ParamSpec,
}

/// A named output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Output {
    /// Output name.
    pub name: &'static str,
    /// Host type tag.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Full description of the node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSchema {
    /// Registered identifier.
    pub name: &'static str,
    /// Display name.
    pub display_name: &'static str,
    /// Menu category.
    pub category: &'static str,
    /// Inputs that must be connected or set.
    pub required: Vec<Param>,
    /// Inputs that may be left unconnected.
    pub optional: Vec<Param>,
    /// Outputs in order.
    pub outputs: Vec<Output>,
}

/// Display-only hint listing typical generation time per tier.
pub fn estimated_time_hint() -> String {
    let tiers: Vec<String> = [Resolution::TwoK, Resolution::OneK, Resolution::FourK]
        .iter()
        .map(|tier| format!("{tier} ~{}", tier.estimated_time()))
        .collect();
    format!("Estimated time: {}", tiers.join(" | "))
}

impl NodeSchema {
    /// Describes the NanoBanana Pro node.
    pub fn describe() -> Self {
        let string = |default: &str, multiline: bool, placeholder: Option<&str>| ParamSpec::String {
            default: default.to_string(),
            multiline,
            placeholder: placeholder.map(str::to_string),
        };

        Self {
            name: NODE_NAME,
            display_name: DISPLAY_NAME,
            category: CATEGORY,
            required: vec![
                Param {
                    name: "api_key",
                    spec: string("", false, Some("sk-your-api-key")),
                },
                Param {
                    name: "prompt",
                    spec: string(DEFAULT_PROMPT, true, None),
                },
                Param {
                    name: "aspect_ratio",
                    spec: ParamSpec::Choice {
                        values: AspectRatio::ALL.iter().map(AspectRatio::as_str).collect(),
                        default: AspectRatio::default().as_str(),
                    },
                },
                Param {
                    name: "resolution",
                    spec: ParamSpec::Choice {
                        values: Resolution::ALL.iter().map(Resolution::as_str).collect(),
                        default: Resolution::default().as_str(),
                    },
                },
                Param {
                    name: "estimated_time",
                    spec: string(&estimated_time_hint(), false, None),
                },
                Param {
                    name: "seed",
                    spec: ParamSpec::Int {
                        default: 0,
                        min: 0,
                        max: u64::MAX,
                        step: 1,
                    },
                },
            ],
            optional: vec![Param {
                name: "image",
                spec: ParamSpec::Image,
            }],
            outputs: vec![
                Output {
                    name: "image",
                    kind: "IMAGE",
                },
                Output {
                    name: "info",
                    kind: "STRING",
                },
            ],
        }
    }
}
