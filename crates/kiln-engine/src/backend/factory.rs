use super::gpu::WgpuDispatcher;
use super::{BackendError, CommandDispatcher, FrameTargetDesc, HeadlessDispatcher};

/// Device/queue pair a GPU backend renders with.
#[derive(Debug, Clone)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

/// What the running machine offers.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub gpu: Option<GpuContext>,
}

impl Capabilities {
    /// No GPU; only the headless backend can be created.
    pub fn headless() -> Self {
        Self { gpu: None }
    }

    pub fn with_gpu(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { gpu: Some(GpuContext { device, queue }) }
    }
}

/// Which backend to create.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum BackendPreference {
    /// wgpu when a GPU is available, headless otherwise.
    #[default]
    Auto,
    Wgpu,
    Headless,
}

/// Backend selection parameters.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub preference: BackendPreference,
    /// Render target the wgpu backend draws into.
    pub target: FrameTargetDesc,
}

/// Creates the dispatcher for this run.
///
/// Called once at startup; the result is owned by a
/// [`RenderContext`](crate::context::RenderContext).
pub fn create_dispatcher(
    config: &BackendConfig,
    capabilities: Capabilities,
) -> Result<Box<dyn CommandDispatcher>, BackendError> {
    let dispatcher: Box<dyn CommandDispatcher> = match (config.preference, capabilities.gpu) {
        (BackendPreference::Headless, _) | (BackendPreference::Auto, None) => {
            Box::new(HeadlessDispatcher::new())
        }
        (BackendPreference::Wgpu | BackendPreference::Auto, Some(gpu)) => {
            Box::new(WgpuDispatcher::new(gpu, config.target)?)
        }
        (BackendPreference::Wgpu, None) => {
            return Err(BackendError::Unavailable("no GPU device was provided"));
        }
    };

    log::info!("render backend: {}", dispatcher.kind());
    Ok(dispatcher)
}
