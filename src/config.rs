use crate::{common::*, model::GeneratorInit};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generator: GeneratorInit,
    pub runtime: Runtime,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config: Self = json5::from_str(&text)
            .with_context(|| format!("unable to parse config file {}", path.display()))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runtime {
    #[serde(with = "tch_serde::serde_device", default = "default_device")]
    pub device: Device,
    pub seed: Option<u64>,
    pub batch_size: NonZeroUsize,
    pub image_size: NonZeroUsize,
}

fn default_device() -> Device {
    Device::Cpu
}
