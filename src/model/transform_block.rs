use super::{
    conv::{Conv2D, Conv2DInit},
    misc::{ensure_channels, ensure_same_grid},
    noise_injection::NoiseInjection,
    resnet_block::ConvBlock,
};
use crate::{common::*, noise::NoiseSource};

pub const EMBEDDING_CHANNELS: usize = 64;

#[derive(Debug, Clone)]
pub struct TransformBlockInit {
    pub style_channels: usize,
    pub full_layout: bool,
}

impl Default for TransformBlockInit {
    fn default() -> Self {
        Self {
            style_channels: 4,
            full_layout: true,
        }
    }
}

impl TransformBlockInit {
    pub fn build<'a>(
        self,
        path: impl Borrow<nn::Path<'a>>,
        in_c: usize,
        out_c: usize,
    ) -> Result<TransformBlock> {
        let path = path.borrow();
        let Self {
            style_channels,
            full_layout,
        } = self;
        let embedding_channels = EMBEDDING_CHANNELS;

        ensure!(
            in_c >= 4 && in_c % 4 == 0,
            "transform block input channels must be a positive multiple of 4, got {}",
            in_c
        );

        let style_embedding = ConvReluStack::build(
            path / "vgg_block",
            [
                style_channels,
                embedding_channels / 4,
                embedding_channels / 2,
                embedding_channels,
            ],
        )?;
        let encode_conv = ConvBlock::new(
            path / "convblock_",
            in_c + embedding_channels,
            out_c,
        )?;

        let noise = NoiseInjection::new(path / "noise", in_c);
        let style_projection = ConvReluStack::build(
            path / "down_conv",
            [embedding_channels, in_c / 4, in_c / 2, in_c],
        )?;
        let decode_conv = ConvBlock::new(path / "convblock", in_c * 2, out_c)?;

        let _up_conv = full_layout
            .then(|| Conv2DInit::new(3).build(path / "up_conv", in_c * 2, in_c))
            .transpose()?;

        Ok(TransformBlock {
            in_c: in_c as i64,
            out_c: out_c as i64,
            style_channels: style_channels as i64,
            style_embedding,
            encode_conv,
            noise,
            style_projection,
            decode_conv,
            _up_conv,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TransformOp<'a> {
    EncodeStyle {
        xs: &'a Tensor,
        style: &'a Tensor,
    },
    DecodeFuse {
        xs: &'a Tensor,
        mask: &'a Tensor,
        embedding: &'a Tensor,
    },
}

#[derive(Debug)]
pub enum TransformOutput {
    Encoded { feature: Tensor, embedding: Tensor },
    Decoded { feature: Tensor },
}

impl TransformOutput {
    pub fn feature(&self) -> &Tensor {
        match self {
            Self::Encoded { feature, .. } | Self::Decoded { feature } => feature,
        }
    }
}

#[derive(Debug)]
pub struct TransformBlock {
    in_c: i64,
    out_c: i64,
    style_channels: i64,
    style_embedding: ConvReluStack,
    encode_conv: ConvBlock,
    noise: NoiseInjection,
    style_projection: ConvReluStack,
    decode_conv: ConvBlock,
    // kept for the parameter layout, never run
    _up_conv: Option<Conv2D>,
}

impl TransformBlock {
    pub fn f_forward(
        &self,
        op: TransformOp<'_>,
        noise: &mut dyn NoiseSource,
    ) -> Result<TransformOutput> {
        let output = match op {
            TransformOp::EncodeStyle { xs, style } => {
                let (feature, embedding) = self.encode_style(xs, style)?;
                TransformOutput::Encoded { feature, embedding }
            }
            TransformOp::DecodeFuse {
                xs,
                mask,
                embedding,
            } => TransformOutput::Decoded {
                feature: self.decode_fuse(xs, mask, embedding, noise)?,
            },
        };
        Ok(output)
    }

    pub fn encode_style(&self, xs: &Tensor, style: &Tensor) -> Result<(Tensor, Tensor)> {
        let (b, _, h, w) = ensure_channels("transform block (encode)", xs, self.in_c)?;
        let (style_b, _, _, _) =
            ensure_channels("transform block style", style, self.style_channels)?;
        ensure!(
            style_b == b,
            "transform block (encode): style batch size {} differs from feature batch size {}",
            style_b,
            b
        );

        let style = style.f_upsample_bilinear2d(&[h, w], false, None::<f64>, None::<f64>)?;
        let embedding = self.style_embedding.f_forward(&style)?;
        let feature = self
            .encode_conv
            .f_forward(&Tensor::cat(&[xs, &embedding], 1))?;

        Ok((feature, embedding))
    }

    pub fn decode_fuse(
        &self,
        xs: &Tensor,
        mask: &Tensor,
        embedding: &Tensor,
        noise: &mut dyn NoiseSource,
    ) -> Result<Tensor> {
        let (_, _, h, w) = ensure_channels("transform block (decode)", xs, self.in_c)?;
        ensure_channels(
            "transform block (decode) style embedding",
            embedding,
            EMBEDDING_CHANNELS as i64,
        )?;
        ensure_same_grid("transform block (decode)", xs, embedding)?;
        ensure!(
            self.out_c == self.in_c,
            "transform block (decode): the style residual needs out == in channels, got {} -> {}",
            self.in_c,
            self.out_c
        );
        ensure!(
            mask.dim() == 4,
            "transform block (decode): expected a 4-D mask, got shape {:?}",
            mask.size()
        );

        let mask = mask
            .to_kind(xs.kind())
            .f_upsample_bilinear2d(&[h, w], false, None::<f64>, None::<f64>)?;
        let xs = self.noise.f_forward(xs, &mask, noise)?;
        let style = self.style_projection.f_forward(embedding)?;
        let fused = self
            .decode_conv
            .f_forward(&Tensor::cat(&[&xs, &style], 1))?;

        Ok(fused + style)
    }
}

// parameters sit at indices 0, 2, 4 of a [conv, relu] * 3 sequence
#[derive(Debug)]
struct ConvReluStack {
    convs: [Conv2D; 3],
}

impl ConvReluStack {
    fn build<'a>(path: impl Borrow<nn::Path<'a>>, channels: [usize; 4]) -> Result<Self> {
        let path = path.borrow();
        let [c0, c1, c2, c3] = channels;

        let convs = [
            Conv2DInit::new(3).build(path / "0", c0, c1)?,
            Conv2DInit::new(1).build(path / "2", c1, c2)?,
            Conv2DInit::new(1).build(path / "4", c2, c3)?,
        ];

        Ok(Self { convs })
    }

    fn f_forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.convs
            .iter()
            .try_fold(xs.shallow_clone(), |xs, conv| -> Result<_> {
                Ok(conv.f_forward(&xs)?.relu())
            })
    }
}
