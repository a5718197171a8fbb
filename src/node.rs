//! The NanoBanana Pro node: one linear generate request per invocation.
//!
//! Every path ends in a [`NodeOutput`] holding a valid image and a Markdown
//! report. Failures return a gray placeholder instead of propagating.

use crate::config::{NodeSettings, PLACEHOLDER_GRAY};
use crate::error::{FailureKind, NodeError, Result};
use crate::image::codec::{decode_image_bytes, encode_jpeg_base64};
use crate::image::providers::GeminiProvider;
use crate::image::{
    AspectRatio, GenerationRequest, ImageProvider, ImageTensor, ReferenceImage, Resolution,
};
use crate::key_store::{resolve_api_key, FileKeyStore, KeyStore};
use crate::report::{error_message, failure_report, success_report, RunLog};
use futures_util::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};

/// Prompts longer than this are truncated in the log.
const PROMPT_LOG_CHARS: usize = 100;

/// Inputs for one invocation, mirroring [`crate::schema::NodeSchema`].
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
    /// Key entered in the node; blank falls back to the saved key.
    pub api_key: String,
    /// Text prompt.
    pub prompt: String,
    /// Requested aspect ratio, possibly `Auto`.
    pub aspect_ratio: AspectRatio,
    /// Output resolution tier.
    pub resolution: Resolution,
    /// Display-only text; ignored.
    pub estimated_time: String,
    /// Cache-busting seed; not sent to the endpoint.
    pub seed: u64,
    /// Optional reference images, in priority order.
    pub image: Option<ImageTensor>,
}

impl NodeInputs {
    /// Creates inputs with the given prompt and defaults elsewhere.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// What the host receives: an image batch and a report.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    /// Generated image, or the placeholder on failure.
    pub image: ImageTensor,
    /// Markdown report including the run log.
    pub info: String,
}

/// A successful run.
#[derive(Debug, Clone)]
pub struct NodeSuccess {
    /// Decoded image as a batch of one.
    pub image: ImageTensor,
    /// Log of the run.
    pub log: RunLog,
}

/// A failed run.
#[derive(Debug)]
pub struct NodeFailure {
    /// What went wrong.
    pub error: NodeError,
    /// Log of the run up to the failure.
    pub log: RunLog,
}

impl NodeFailure {
    /// Failure class of the error.
    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

/// Value the host compares between runs to decide whether to re-execute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeToken {
    /// Fresh random value; never matches a previous run.
    Random(f64),
    /// The seed itself; identical inputs may reuse a cached result.
    Seed(u64),
}

impl ChangeToken {
    /// Seed 0 forces re-execution, any other seed allows reuse.
    pub fn for_seed(seed: u64) -> Self {
        if seed == 0 {
            Self::Random(rand::random::<f64>())
        } else {
            Self::Seed(seed)
        }
    }
}

/// Weighting instruction sent before the reference image at `index`.
pub fn weight_instruction(index: usize) -> String {
    match index {
        0 => "This is the BASE image to be modified. Keep its main subject and structure, \
              but apply the style and elements from the reference images."
            .to_string(),
        1 => "This is the PRIMARY STYLE REFERENCE with HIGHEST importance. Apply its artistic \
              style, color palette, and visual characteristics strongly to the base image."
            .to_string(),
        2 => "This is a SECONDARY reference with MODERATE importance. Use its elements as \
              additional inspiration and subtle influence."
            .to_string(),
        n => format!(
            "This is an AUXILIARY reference #{} with MINIMAL importance. Use it only as subtle inspiration.",
            n + 1
        ),
    }
}

fn weight_label(index: usize) -> &'static str {
    match index {
        0 => "base image (to be modified)",
        1 => "primary reference (highest weight)",
        2 => "secondary reference (moderate weight)",
        _ => "auxiliary reference (lowest weight)",
    }
}

fn prompt_preview(prompt: &str) -> String {
    if prompt.chars().count() > PROMPT_LOG_CHARS {
        let head: String = prompt.chars().take(PROMPT_LOG_CHARS).collect();
        format!("{head}...")
    } else {
        prompt.to_string()
    }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Chains a panic hook that records where the panic happened, so a caught
/// panic can be logged with the trace of its origin.
fn install_panic_trace_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = format!("{info}\n{}", Backtrace::force_capture());
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

fn panic_error(payload: &(dyn Any + Send)) -> NodeError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    NodeError::Internal(format!("error while generating image: {detail}"))
}

/// The image generation node.
pub struct NanoBananaNode {
    settings: NodeSettings,
    provider: Arc<dyn ImageProvider>,
    key_store: Arc<dyn KeyStore>,
}

impl std::fmt::Debug for NanoBananaNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NanoBananaNode")
            .field("settings", &self.settings)
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

impl NanoBananaNode {
    /// Creates a node talking to `settings.endpoint` with a file key store.
    pub fn new(settings: NodeSettings) -> Result<Self> {
        let provider = GeminiProvider::builder()
            .endpoint(settings.endpoint.clone())
            .build()?;
        let key_store = FileKeyStore::new(settings.key_file.clone());
        Ok(Self::with_parts(settings, Arc::new(provider), Arc::new(key_store)))
    }

    /// Creates a node from explicit parts.
    pub fn with_parts(
        settings: NodeSettings,
        provider: Arc<dyn ImageProvider>,
        key_store: Arc<dyn KeyStore>,
    ) -> Self {
        Self {
            settings,
            provider,
            key_store,
        }
    }

    /// Settings this node runs with.
    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    /// Gray image returned on every failure path.
    pub fn placeholder(&self) -> ImageTensor {
        let (width, height) = self.settings.placeholder_size;
        ImageTensor::filled(1, height, width, PLACEHOLDER_GRAY)
    }

    /// Runs one invocation, returning a structured outcome.
    ///
    /// A panic while generating is caught and returned as an `Internal`
    /// failure carrying the log recorded up to that point.
    pub async fn execute(
        &self,
        inputs: &NodeInputs,
    ) -> std::result::Result<NodeSuccess, NodeFailure> {
        install_panic_trace_hook();
        let mut log = RunLog::new();
        let outcome = AssertUnwindSafe(self.execute_inner(inputs, &mut log))
            .catch_unwind()
            .await;

        let error = match outcome {
            Ok(Ok(image)) => return Ok(NodeSuccess { image, log }),
            Ok(Err(error)) => error,
            Err(panic) => {
                let error = panic_error(&*panic);
                let trace = take_panic_trace().unwrap_or_default();
                tracing::error!(error = %error, "node invocation panicked\n{trace}");
                error
            }
        };
        log.push_error(error_message(&error));
        Err(NodeFailure { error, log })
    }

    /// Runs one invocation and renders the host-facing output.
    pub async fn run(&self, inputs: &NodeInputs) -> NodeOutput {
        match self.execute(inputs).await {
            Ok(success) => NodeOutput {
                info: success_report(&success.log),
                image: success.image,
            },
            Err(failure) => self.failure_output(&failure.error, &failure.log),
        }
    }

    /// Runs one invocation from synchronous code.
    ///
    /// Drives [`run`](Self::run) on a current-thread runtime. Must not be
    /// called from inside an async runtime; that, runtime setup errors and
    /// panics are reported like any other failure.
    pub fn run_blocking(&self, inputs: &NodeInputs) -> NodeOutput {
        if tokio::runtime::Handle::try_current().is_ok() {
            let error = NodeError::Internal(
                "run_blocking called from within an async runtime; await run() instead".into(),
            );
            tracing::error!(error = %error, "node invocation aborted");
            return self.failure_output(&error, &RunLog::new());
        }

        // The runtime is created and dropped inside the guard so a panic in
        // either place still yields an output.
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map(|runtime| runtime.block_on(self.run(inputs)))
        }));

        let error = match outcome {
            Ok(Ok(output)) => return output,
            Ok(Err(e)) => NodeError::Internal(format!("failed to start runtime: {e}")),
            Err(panic) => panic_error(&*panic),
        };
        tracing::error!(error = %error, "node invocation aborted");
        self.failure_output(&error, &RunLog::new())
    }

    fn failure_output(&self, error: &NodeError, log: &RunLog) -> NodeOutput {
        NodeOutput {
            image: self.placeholder(),
            info: failure_report(error, log),
        }
    }

    async fn execute_inner(&self, inputs: &NodeInputs, log: &mut RunLog) -> Result<ImageTensor> {
        let api_key = resolve_api_key(&inputs.api_key, self.key_store.as_ref(), log)
            .ok_or(NodeError::MissingApiKey)?;

        log.push(format!("Starting image generation (seed: {})", inputs.seed));
        log.push(format!("Prompt: {}", prompt_preview(&inputs.prompt)));

        let reference = inputs
            .image
            .as_ref()
            .filter(|image| !image.is_empty())
            .map(|image| (image.width(), image.height()));
        let aspect_ratio = inputs.aspect_ratio.resolve(reference);
        if inputs.aspect_ratio == AspectRatio::Auto {
            match reference {
                Some((width, height)) => log.push(format!(
                    "Auto aspect ratio: input image {width}x{height} (ratio {:.3}) matched {aspect_ratio}",
                    width as f64 / height as f64
                )),
                None => log.push("Auto aspect ratio: no input image, using 1:1"),
            }
        }
        log.push(format!("Final aspect ratio: {aspect_ratio}"));
        log.push(format!("Resolution: {}", inputs.resolution));

        let mut request = GenerationRequest::new(inputs.prompt.clone())
            .with_aspect_ratio(aspect_ratio)
            .with_resolution(inputs.resolution);

        if let Some(batch) = inputs.image.as_ref() {
            for reference in self.encode_references(batch, log) {
                request = request.with_reference(reference);
            }
        }

        let timeout = inputs.resolution.timeout();
        log.push(format!(
            "Estimated generation time: {}",
            inputs.resolution.estimated_time()
        ));
        log.push(format!(
            "Sending API request (timeout: {} seconds), please wait...",
            timeout.as_secs()
        ));

        let generated = self.provider.generate(&api_key, &request).await?;
        if let Some(ms) = generated.metadata.duration_ms {
            log.push(format!(
                "API responded in {:.1} seconds",
                ms as f64 / 1000.0
            ));
        }
        log.push("Extracted image data from the response");

        let image = decode_image_bytes(&generated.data)?;
        let (_, height, width, _) = image.shape();
        log.push(format!("Decoded image: {width}x{height}"));
        Ok(image)
    }

    /// Encodes every frame of `batch`, pairing each with its weighting text.
    /// Frames that fail to encode are logged and skipped.
    fn encode_references(&self, batch: &ImageTensor, log: &mut RunLog) -> Vec<ReferenceImage> {
        let count = batch.batch_size();
        log.push(format!("Received {count} input image(s)"));

        let mut references = Vec::with_capacity(count);
        for index in 0..count {
            log.push(format!("Processing image {}/{count}...", index + 1));
            let Some(frame) = batch.frame(index) else {
                continue;
            };

            let encoded = match encode_jpeg_base64(&frame, &self.settings.encode) {
                Ok(encoded) => encoded,
                Err(e) => {
                    log.push_error(format!("Image {} skipped: {e}", index + 1));
                    continue;
                }
            };

            let (original_w, original_h) = encoded.original_size;
            let (width, height) = encoded.size;
            if encoded.was_resized() {
                log.push(format!(
                    "Image {} downscaled: {original_w}x{original_h} -> {width}x{height}",
                    index + 1
                ));
            }
            log.push(format!(
                "Image {} encoded: {width}x{height}, {:.1}KB, {}",
                index + 1,
                encoded.byte_len as f64 / 1024.0,
                weight_label(index)
            ));

            references.push(ReferenceImage {
                instruction: weight_instruction(index),
                mime_type: encoded.mime_type(),
                data: encoded.data,
            });
        }

        log.push(format!(
            "Attached {} of {count} image(s) with priority weighting",
            references.len()
        ));
        references
    }
}
