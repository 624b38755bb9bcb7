use std::sync::OnceLock;
use tch::Device;

static DEVICE: OnceLock<Device> = OnceLock::new();

/// Compute device for this process: the first CUDA device when libtorch sees
/// one, otherwise the CPU. Resolved on first call and cached.
pub fn compute_device() -> Device {
    *DEVICE.get_or_init(|| {
        let device = Device::cuda_if_available();
        log::info!("Using device: {:?}", device);
        device
    })
}
