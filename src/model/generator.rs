use super::{
    bottleneck::{Bottleneck, BottleneckInit},
    decoder::{Decoder, DecoderInit},
    encoder::{Encoder, EncoderInit, SkipSet},
    scale,
};
use crate::{common::*, noise::NoiseSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorInit {
    pub corrupt_channels: usize,
    pub edge_channels: usize,
    pub output_channels: usize,
    pub base_channels: usize,
    pub latent_side: usize,
    pub full_layout: bool,
}

impl Default for GeneratorInit {
    fn default() -> Self {
        Self {
            corrupt_channels: 3,
            edge_channels: 1,
            output_channels: 3,
            base_channels: 64,
            latent_side: 4,
            full_layout: true,
        }
    }
}

impl GeneratorInit {
    pub fn build<'a>(self, path: impl Borrow<nn::Path<'a>>) -> Result<Generator> {
        let path = path.borrow();
        let Self {
            corrupt_channels,
            edge_channels,
            output_channels,
            base_channels,
            latent_side,
            full_layout,
        } = self;
        ensure!(
            base_channels >= 4 && base_channels % 4 == 0,
            "base channels must be a positive multiple of 4, got {}",
            base_channels
        );

        let encoder = EncoderInit {
            corrupt_channels,
            edge_channels,
            base_channels,
            full_layout,
        }
        .build(path)?;

        let decoder = DecoderInit {
            base_channels,
            output_channels,
            full_layout,
        }
        .build(path)?;

        let bottleneck = full_layout
            .then(|| {
                let channels = scale::level_channels(base_channels, scale::RESOLUTIONS.len() - 1);
                BottleneckInit {
                    channels,
                    latent_side,
                    z_dim: channels,
                }
                .build(path)
            })
            .transpose()?;

        info!(
            "built generator: {} + {} input channels, {} output channels, base width {}, full layout: {}",
            corrupt_channels, edge_channels, output_channels, base_channels, full_layout
        );

        Ok(Generator {
            encoder,
            decoder,
            bottleneck,
        })
    }
}

#[derive(Debug)]
pub struct Generator {
    encoder: Encoder,
    decoder: Decoder,
    bottleneck: Option<Bottleneck>,
}

impl Generator {
    /// Synthesizes an image from a corrupt image and its edge map.
    pub fn forward(
        &self,
        corrupt: &Tensor,
        edges: &Tensor,
        noise: &mut dyn NoiseSource,
    ) -> Result<Tensor> {
        let skips = self.encode(corrupt, edges, None, noise)?;
        self.decode(&skips)
    }

    pub fn forward_masked(
        &self,
        corrupt: &Tensor,
        edges: &Tensor,
        mask: &Tensor,
        noise: &mut dyn NoiseSource,
    ) -> Result<Tensor> {
        let skips = self.encode(corrupt, edges, Some(mask), noise)?;
        self.decode(&skips)
    }

    pub fn encode(
        &self,
        corrupt: &Tensor,
        edges: &Tensor,
        mask: Option<&Tensor>,
        noise: &mut dyn NoiseSource,
    ) -> Result<SkipSet> {
        let skips = self.encoder.f_forward(corrupt, edges, mask, noise)?;
        debug!(
            "encoded {:?} into skips at scales {:?}",
            corrupt.size(),
            skips.resolutions().collect::<Vec<_>>()
        );
        Ok(skips)
    }

    pub fn decode(&self, skips: &SkipSet) -> Result<Tensor> {
        let output = self.decoder.f_forward(skips)?;
        debug!("decoded output {:?}", output.size());
        Ok(output)
    }

    pub fn bottleneck(&self) -> Result<&Bottleneck> {
        self.bottleneck
            .as_ref()
            .ok_or_else(|| format_err!("the generator was built without the bottleneck"))
    }
}
