use anyhow::Context;
use candle_core::Device;
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::path::PathBuf;

/// Picks the accelerator compiled in through the `cuda` or `metal` feature, otherwise the CPU.
pub fn select_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        match Device::cuda_if_available(0) {
            Ok(device) => return device,
            Err(e) => tracing::warn!("failed to use CUDA, using CPU instead: {}", e),
        }
    }

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => return device,
            Err(e) => tracing::warn!("failed to use Metal, using CPU instead: {}", e),
        }
    }

    Device::Cpu
}

/// Name of the device [`select_device`] aims for, without touching the hardware.
pub fn preferred_device_name() -> &'static str {
    if cfg!(feature = "cuda") {
        "cuda"
    } else if cfg!(feature = "metal") {
        "mps"
    } else {
        "cpu"
    }
}

pub fn device_name(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "mps",
    }
}

/// Fetches `filename` from a Hugging Face model repository, using the local cache when present.
pub fn hub_file(repo_id: &str, revision: Option<&str>, filename: &str) -> anyhow::Result<PathBuf> {
    let api = Api::new().context("failed to initialize hugging face api")?;
    let repo = match revision {
        Some(revision) => api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        )),
        None => api.model(repo_id.to_string()),
    };

    repo.get(filename)
        .with_context(|| format!("failed to fetch {} from {}", filename, repo_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_build_selects_cpu() {
        if preferred_device_name() == "cpu" {
            let device = select_device();
            assert!(device.is_cpu());
            assert_eq!(device_name(&device), "cpu");
        }
    }
}
