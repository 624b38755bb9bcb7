use std::path::Path;
use anyhow::{anyhow, ensure, Result};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use tch::{nn, Device, Kind, Tensor};
use std::fs::File;
use memmap2::MmapOptions;

/// Copies every tensor in `path` into the matching variable of `vs`.
/// Fails if a model variable is missing from the file or has another shape.
pub fn load_safetensors<P: AsRef<Path>>(vs: &mut nn::VarStore, path: P) -> Result<()> {
    let file = File::open(path.as_ref())?;
    let buffer = unsafe { MmapOptions::new().map(&file)? };
    let tensors = SafeTensors::deserialize(&buffer)?;

    let mut variables = vs.variables();
    let device = vs.device();
    let mut loaded = 0usize;

    for (name, view) in tensors.tensors() {
        if let Some(var) = variables.get_mut(&name) {
            let shape: Vec<i64> = view.shape().iter().map(|&x| x as i64).collect();
            ensure!(
                var.size() == shape,
                "shape mismatch for {}: model {:?}, checkpoint {:?}",
                name,
                var.size(),
                shape
            );
            let kind = match view.dtype() {
                Dtype::F32 => Kind::Float,
                Dtype::F16 => Kind::Half,
                Dtype::BF16 => Kind::BFloat16,
                _ => return Err(anyhow!("Unsupported dtype: {:?}", view.dtype())),
            };

            let data = view.data();
            let tch_tensor = Tensor::from_data_size(data, &shape, kind).to_device(device);

            tch::no_grad(|| {
                var.copy_(&tch_tensor);
            });
            loaded += 1;
            log::debug!("Loaded tensor: {}", name);
        } else {
            log::warn!("Tensor {} found in safetensors but not in model", name);
        }
    }

    ensure!(
        loaded == variables.len(),
        "checkpoint {} provides {} of {} model variables",
        path.as_ref().display(),
        loaded,
        variables.len()
    );
    Ok(())
}

/// Writes every variable of `vs` (trainable weights and normalization running
/// statistics) as little-endian f32.
pub fn save_safetensors<P: AsRef<Path>>(vs: &nn::VarStore, path: P) -> Result<()> {
    let mut entries: Vec<(String, Vec<usize>, Vec<u8>)> = Vec::new();
    for (name, var) in vs.variables() {
        let tensor = var.detach().to_device(Device::Cpu).to_kind(Kind::Float).contiguous();
        let shape: Vec<usize> = tensor.size().iter().map(|&d| d as usize).collect();
        let values = Vec::<f32>::try_from(&tensor.flatten(0, -1))?;
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        entries.push((name, shape, bytes));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let views = entries
        .iter()
        .map(|(name, shape, bytes)| Ok((name.as_str(), TensorView::new(Dtype::F32, shape.clone(), bytes)?)))
        .collect::<Result<Vec<_>>>()?;

    safetensors::serialize_to_file(views, &None, path.as_ref())?;
    Ok(())
}
