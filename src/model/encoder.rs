use super::{
    conv::{Conv2D, Conv2DInit},
    instance_norm::InstanceNorm,
    misc::{ensure_same_grid, ReflectionPad2D},
    resnet_block::ResidualBlock,
    sample_block::DownSample,
    scale::{self, ScaleLevel},
    transform_block::{TransformBlock, TransformBlockInit},
};
use crate::{common::*, noise::NoiseSource};

#[derive(Debug, Clone)]
pub struct EncoderInit {
    pub corrupt_channels: usize,
    pub edge_channels: usize,
    pub base_channels: usize,
    pub full_layout: bool,
}

impl EncoderInit {
    pub fn build<'a>(self, path: impl Borrow<nn::Path<'a>>) -> Result<Encoder> {
        let path = path.borrow();
        let Self {
            corrupt_channels,
            edge_channels,
            base_channels,
            full_layout,
        } = self;
        ensure!(
            corrupt_channels > 0 && edge_channels > 0,
            "corrupt and edge images must have at least one channel"
        );

        let style_channels = corrupt_channels + edge_channels;
        let levels = scale::encoder_levels(base_channels);
        scale::check_levels(&levels)?;

        // one noise channel in front of the style reference
        let stem = {
            let path = path / "model_input_cloth";
            let conv =
                Conv2DInit::unpadded(7).build(&path / "1", style_channels + 1, base_channels)?;
            Stem {
                pad: ReflectionPad2D::new(3),
                conv,
                norm: InstanceNorm::new(base_channels),
            }
        };

        let stages: Vec<_> = levels
            .into_iter()
            .map(|level| -> Result<_> {
                let ScaleLevel {
                    index,
                    resolution,
                    in_channels,
                    out_channels,
                    ..
                } = level;
                let block_path = path / format!("block{}", resolution);

                // the finest level keeps the stem resolution
                let (down, residual_path) = if index == 0 {
                    (None, &block_path / "0")
                } else {
                    let down = DownSample::new(&block_path / "0", in_channels, out_channels)?;
                    (Some(down), &block_path / "1")
                };
                let residual =
                    ResidualBlock::new(residual_path, out_channels, out_channels)?;
                let transform = TransformBlockInit {
                    style_channels,
                    full_layout,
                }
                .build(
                    path / format!("block{}_transform", resolution),
                    out_channels,
                    out_channels,
                )?;

                Ok(EncoderStage {
                    level,
                    down,
                    residual,
                    transform,
                })
            })
            .try_collect()?;

        Ok(Encoder {
            corrupt_channels: corrupt_channels as i64,
            edge_channels: edge_channels as i64,
            stem,
            stages,
        })
    }
}

#[derive(Debug)]
struct Stem {
    pad: ReflectionPad2D,
    conv: Conv2D,
    norm: InstanceNorm,
}

#[derive(Debug)]
struct EncoderStage {
    level: ScaleLevel,
    down: Option<DownSample>,
    residual: ResidualBlock,
    transform: TransformBlock,
}

impl EncoderStage {
    fn f_forward(
        &self,
        xs: Tensor,
        style: &Tensor,
        mask: Option<&Tensor>,
        noise: &mut dyn NoiseSource,
    ) -> Result<Tensor> {
        let Self {
            ref down,
            ref residual,
            ref transform,
            ..
        } = *self;

        let xs = match down {
            Some(down) => down.f_forward(&xs)?,
            None => xs,
        };
        let xs = residual.f_forward(&xs)?;
        let (xs, embedding) = transform.encode_style(&xs, style)?;

        match mask {
            Some(mask) => transform.decode_fuse(&xs, mask, &embedding, noise),
            None => Ok(xs),
        }
    }
}

/// Encoder feature maps kept for the decoder, keyed by reference resolution.
#[derive(Debug)]
pub struct SkipSet {
    pub(super) features: Vec<(usize, Tensor)>,
}

impl SkipSet {
    pub fn get(&self, resolution: usize) -> Option<&Tensor> {
        self.features
            .iter()
            .find(|(res, _)| *res == resolution)
            .map(|(_, feature)| feature)
    }

    pub fn bottom(&self) -> Result<&Tensor> {
        let resolution = scale::RESOLUTIONS[scale::RESOLUTIONS.len() - 1];
        self.get(resolution)
            .ok_or_else(|| format_err!("missing feature map at scale {}", resolution))
    }

    pub fn resolutions(&self) -> impl Iterator<Item = usize> + '_ {
        self.features.iter().map(|(res, _)| *res)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug)]
pub struct Encoder {
    corrupt_channels: i64,
    edge_channels: i64,
    stem: Stem,
    stages: Vec<EncoderStage>,
}

impl Encoder {
    pub fn f_forward(
        &self,
        corrupt: &Tensor,
        edges: &Tensor,
        mask: Option<&Tensor>,
        noise: &mut dyn NoiseSource,
    ) -> Result<SkipSet> {
        let (b, h, w) = self.check_inputs(corrupt, edges, mask)?;

        let style = Tensor::cat(&[corrupt, edges], 1);
        let xs = {
            let Stem { pad, conv, norm } = &self.stem;
            let input_noise = noise.randn(&[b, 1, h, w], (style.kind(), style.device()));
            let xs = Tensor::cat(&[&input_noise, &style], 1);
            let xs = conv.f_forward(&pad.f_forward(&xs)?)?;
            norm.f_forward(&xs)?.relu()
        };

        let (_, features) = self.stages.iter().try_fold(
            (xs, vec![]),
            |(xs, mut features), stage| -> Result<_> {
                let level = stage.level;
                let xs = stage
                    .f_forward(xs, &style, mask, noise)
                    .with_context(|| format!("encoder stage at scale {}", level.resolution))?;
                trace!("encoder scale {} -> {:?}", level.resolution, xs.size());

                if level.has_skip {
                    features.push((level.resolution, xs.shallow_clone()));
                }

                Ok((xs, features))
            },
        )?;

        Ok(SkipSet { features })
    }

    fn check_inputs(
        &self,
        corrupt: &Tensor,
        edges: &Tensor,
        mask: Option<&Tensor>,
    ) -> Result<(i64, i64, i64)> {
        for (name, xs) in [("corrupt", corrupt), ("edges", edges)] {
            ensure!(
                xs.dim() == 4,
                "{} image must be 4-D, got shape {:?}",
                name,
                xs.size()
            );
        }
        ensure_same_grid("encoder input", corrupt, edges)?;

        let (b, corrupt_c, h, w) = corrupt.size4()?;
        let (_, edge_c, _, _) = edges.size4()?;
        ensure!(
            (corrupt_c, edge_c) == (self.corrupt_channels, self.edge_channels),
            "expected {} corrupt and {} edge channels, got {} and {}",
            self.corrupt_channels,
            self.edge_channels,
            corrupt_c,
            edge_c
        );
        scale::check_input_size(h, w)?;

        if let Some(mask) = mask {
            ensure!(
                mask.dim() == 4,
                "mask must be 4-D, got shape {:?}",
                mask.size()
            );
            let (mask_b, _, _, _) = mask.size4()?;
            ensure!(
                mask_b == b || mask_b == 1,
                "mask shape {:?} does not match input batch size of shape {:?}",
                mask.size(),
                corrupt.size()
            );
        }

        Ok((b, h, w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::SeededNoise;

    fn small_encoder(root: &nn::Path) -> Result<Encoder> {
        EncoderInit {
            corrupt_channels: 3,
            edge_channels: 1,
            base_channels: 8,
            full_layout: false,
        }
        .build(root)
    }

    #[test]
    fn encoder_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let encoder = small_encoder(&vs.root())?;
        let mut noise = SeededNoise::new(0);

        let corrupt = Tensor::rand(&[2, 3, 64, 64], FLOAT_CPU);
        let edges = Tensor::rand(&[2, 1, 64, 64], FLOAT_CPU);
        let skips = encoder.f_forward(&corrupt, &edges, None, &mut noise)?;

        ensure!(skips.len() == 3, "expect three skip feature maps");
        ensure!(skips.resolutions().collect::<Vec<_>>() == vec![16, 8, 4]);
        ensure!(skips.get(16).map(Tensor::size) == Some(vec![2, 64, 8, 8]));
        ensure!(skips.get(8).map(Tensor::size) == Some(vec![2, 64, 4, 4]));
        ensure!(skips.bottom()?.size() == vec![2, 64, 2, 2]);
        ensure!(skips.get(32).is_none());

        Ok(())
    }

    #[test]
    fn encoder_with_mask_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let encoder = small_encoder(&vs.root())?;

        let corrupt = Tensor::rand(&[1, 3, 64, 64], FLOAT_CPU);
        let edges = Tensor::rand(&[1, 1, 64, 64], FLOAT_CPU);
        let mask = Tensor::ones(&[1, 1, 64, 64], FLOAT_CPU);

        let plain = encoder.f_forward(&corrupt, &edges, None, &mut SeededNoise::new(5))?;
        let masked =
            encoder.f_forward(&corrupt, &edges, Some(&mask), &mut SeededNoise::new(5))?;

        ensure!(masked.bottom()?.size() == plain.bottom()?.size());
        ensure!(
            !masked.bottom()?.equal(plain.bottom()?),
            "decode-mode fusion had no effect"
        );

        // masks at other resolutions are resized at every scale
        let coarse_mask = Tensor::ones(&[1, 1, 16, 16], FLOAT_CPU);
        let resized =
            encoder.f_forward(&corrupt, &edges, Some(&coarse_mask), &mut SeededNoise::new(5))?;
        ensure!(resized.resolutions().collect::<Vec<_>>() == vec![16, 8, 4]);
        ensure!(resized.bottom()?.size() == plain.bottom()?.size());

        Ok(())
    }

    #[test]
    fn encoder_rejects_bad_inputs_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let encoder = small_encoder(&vs.root())?;
        let mut noise = SeededNoise::new(0);

        let edges = Tensor::rand(&[1, 1, 64, 64], FLOAT_CPU);

        // channel sum is not 5
        let corrupt = Tensor::rand(&[1, 4, 64, 64], FLOAT_CPU);
        ensure!(encoder.f_forward(&corrupt, &edges, None, &mut noise).is_err());

        // spatial size is not reachable by the halvings
        let corrupt = Tensor::rand(&[1, 3, 72, 72], FLOAT_CPU);
        let edges_72 = Tensor::rand(&[1, 1, 72, 72], FLOAT_CPU);
        ensure!(encoder.f_forward(&corrupt, &edges_72, None, &mut noise).is_err());

        // corrupt and edge sizes differ
        let corrupt = Tensor::rand(&[1, 3, 128, 128], FLOAT_CPU);
        ensure!(encoder.f_forward(&corrupt, &edges, None, &mut noise).is_err());

        // mask batch size differs
        let corrupt = Tensor::rand(&[1, 3, 64, 64], FLOAT_CPU);
        let mask = Tensor::ones(&[3, 1, 64, 64], FLOAT_CPU);
        ensure!(encoder
            .f_forward(&corrupt, &edges, Some(&mask), &mut noise)
            .is_err());

        Ok(())
    }

    #[test]
    fn parameter_layout_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let _ = small_encoder(&vs.root())?;
        let vars = vs.variables();

        ensure!(vars["model_input_cloth.1.weight"].size() == vec![8, 5, 7, 7]);
        ensure!(vars.contains_key("block128.0.conv_block.1.weight"));
        ensure!(!vars.contains_key("block128.1.conv_block.1.weight"));
        ensure!(vars["block64.0.conv_block.0.weight"].size() == vec![16, 8, 3, 3]);
        ensure!(vars["block4.1.conv_block.5.weight"].size() == vec![64, 64, 3, 3]);
        ensure!(vars.contains_key("block4_transform.vgg_block.0.weight"));

        Ok(())
    }
}
