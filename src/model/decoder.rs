use super::{
    conv::{Conv2D, Conv2DInit},
    encoder::SkipSet,
    misc::ReflectionPad2D,
    resnet_block::ResidualBlock,
    sample_block::UpSample,
    scale::{self, ScaleLevel},
    transform_up_block::{TransformUpBlock, TransformUpBlockInit},
};
use crate::common::*;

#[derive(Debug, Clone)]
pub struct DecoderInit {
    pub base_channels: usize,
    pub output_channels: usize,
    pub full_layout: bool,
}

impl DecoderInit {
    pub fn build<'a>(self, path: impl Borrow<nn::Path<'a>>) -> Result<Decoder> {
        let path = path.borrow();
        let Self {
            base_channels,
            output_channels,
            full_layout,
        } = self;
        ensure!(output_channels > 0, "output channels must be positive");

        let levels = scale::decoder_levels(base_channels);
        scale::check_levels(&levels)?;

        let stages: Vec<_> = levels
            .into_iter()
            .map(|level| -> Result<_> {
                let ScaleLevel {
                    index,
                    resolution,
                    in_channels,
                    out_channels,
                    has_skip,
                } = level;
                let block_path = path / format!("block{}_up", resolution);

                // skip fusion doubles the width back to the level's output
                let up_channels = if has_skip {
                    out_channels / 2
                } else {
                    out_channels
                };

                // the coarsest level only narrows channels
                let up = if index == 0 {
                    let conv =
                        Conv2DInit::new(3).build(&block_path / "0", in_channels, up_channels)?;
                    UpStep::Conv(conv)
                } else {
                    let up = UpSample::new(&block_path / "0", in_channels, up_channels)?;
                    UpStep::UpSample(up)
                };
                let residual = ResidualBlock::new(&block_path / "1", up_channels, up_channels)?;

                let fuse = if has_skip || full_layout {
                    let fuse = TransformUpBlockInit { diff: !has_skip }.build(
                        path / format!("block{}_up_transform", resolution),
                        out_channels / 2,
                        out_channels,
                    )?;
                    Some(fuse)
                } else {
                    None
                };

                Ok(DecoderStage {
                    level,
                    up,
                    residual,
                    fuse,
                })
            })
            .try_collect()?;

        let head = {
            let path = path / "model_output";
            let conv =
                Conv2DInit::unpadded(7).build(&path / "1", base_channels, output_channels)?;
            OutputHead {
                pad: ReflectionPad2D::new(3),
                conv,
            }
        };

        Ok(Decoder { stages, head })
    }
}

#[derive(Debug)]
enum UpStep {
    Conv(Conv2D),
    UpSample(UpSample),
}

impl UpStep {
    fn f_forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Conv(conv) => conv.f_forward(xs),
            Self::UpSample(up) => up.f_forward(xs),
        }
    }
}

#[derive(Debug)]
struct DecoderStage {
    level: ScaleLevel,
    up: UpStep,
    residual: ResidualBlock,
    fuse: Option<TransformUpBlock>,
}

impl DecoderStage {
    fn f_forward(&self, xs: &Tensor, skips: &SkipSet) -> Result<Tensor> {
        let Self {
            level,
            ref up,
            ref residual,
            ref fuse,
        } = *self;

        let xs = up.f_forward(xs)?;
        let xs = residual.f_forward(&xs)?;

        // levels without a retained encoder map are never fused
        if !level.has_skip {
            return Ok(xs);
        }

        let skip = skips.get(level.resolution).ok_or_else(|| {
            format_err!("missing skip feature map at scale {}", level.resolution)
        })?;
        let fuse = fuse
            .as_ref()
            .ok_or_else(|| format_err!("no skip fusion block at scale {}", level.resolution))?;
        fuse.f_forward(&xs, skip)
    }
}

#[derive(Debug)]
struct OutputHead {
    pad: ReflectionPad2D,
    conv: Conv2D,
}

#[derive(Debug)]
pub struct Decoder {
    stages: Vec<DecoderStage>,
    head: OutputHead,
}

impl Decoder {
    pub fn f_forward(&self, skips: &SkipSet) -> Result<Tensor> {
        let xs = skips.bottom()?.shallow_clone();

        let xs = self.stages.iter().try_fold(xs, |xs, stage| -> Result<_> {
            let resolution = stage.level.resolution;
            let xs = stage
                .f_forward(&xs, skips)
                .with_context(|| format!("decoder stage at scale {}", resolution))?;
            trace!("decoder scale {} -> {:?}", resolution, xs.size());
            Ok(xs)
        })?;

        let OutputHead { pad, conv } = &self.head;
        let xs = conv
            .f_forward(&pad.f_forward(&xs)?)
            .context("decoder output head")?;

        Ok(xs.tanh())
    }
}
