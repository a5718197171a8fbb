#![warn(missing_docs)]
//! NanoBanana - Gemini 3 Pro Image generation node for visual workflow hosts.
//!
//! The node takes a prompt, an optional batch of reference images and
//! generation options, calls the generateContent endpoint once and returns a
//! decoded image with a Markdown report. Failures never propagate: they
//! produce a gray placeholder and an error report instead.
//!
//! # Quick Start
//!
//! ```no_run
//! use nanobanana::{AspectRatio, NanoBananaNode, NodeInputs, NodeSettings, Resolution};
//!
//! #[tokio::main]
//! async fn main() -> nanobanana::Result<()> {
//!     let node = NanoBananaNode::new(NodeSettings::from_env())?;
//!     let inputs = NodeInputs {
//!         api_key: "sk-your-api-key".into(),
//!         aspect_ratio: AspectRatio::Landscape,
//!         resolution: Resolution::OneK,
//!         ..NodeInputs::new("A lighthouse at dusk, watercolor")
//!     };
//!     let output = node.run(&inputs).await;
//!     println!("{}", output.info);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `nanobanana` command-line front end

mod config;
mod error;
pub mod image;
pub mod key_store;
mod node;
pub mod report;
pub mod schema;

// Re-export error types at crate root
pub use error::{FailureKind, NodeError, Result};

pub use config::{NodeSettings, ENV_API_URL, ENV_KEY_FILE, PLACEHOLDER_GRAY, PLACEHOLDER_SIZE};

pub use self::image::providers::{GeminiProvider, GeminiProviderBuilder};
pub use self::image::{
    AspectRatio, EncodeOptions, GeneratedImage, GenerationRequest, ImageFormat, ImageProvider,
    ImageTensor, Resolution,
};

pub use key_store::{FileKeyStore, KeyStore, MemoryKeyStore};

pub use node::{
    weight_instruction, ChangeToken, NanoBananaNode, NodeFailure, NodeInputs, NodeOutput,
    NodeSuccess,
};

pub use schema::NodeSchema;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{NodeError, Result};
    pub use crate::image::{AspectRatio, ImageProvider, ImageTensor, Resolution};
    pub use crate::node::{ChangeToken, NanoBananaNode, NodeInputs, NodeOutput};
    pub use crate::NodeSettings;
}
