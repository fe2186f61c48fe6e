use super::{
    conv::{Conv2D, Conv2DInit},
    instance_norm::InstanceNorm,
};
use crate::common::*;

#[derive(Debug)]
pub struct DownSample {
    conv: Conv2D,
    norm: InstanceNorm,
}

impl DownSample {
    pub fn new<'a>(
        path: impl Borrow<nn::Path<'a>>,
        in_c: usize,
        out_c: usize,
    ) -> Result<Self> {
        let path = path.borrow() / "conv_block";
        let conv = Conv2DInit {
            stride: 2,
            padding: 1,
            ..Conv2DInit::new(3)
        }
        .build(&path / "0", in_c, out_c)?;
        let norm = InstanceNorm::new(out_c);

        Ok(Self { conv, norm })
    }

    pub fn f_forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self
            .conv
            .f_forward(xs)
            .context("downsample block")?;
        Ok(self.norm.f_forward(&xs)?.relu())
    }
}

#[derive(Debug)]
pub struct UpSample {
    conv: Conv2D,
    norm: InstanceNorm,
}

impl UpSample {
    pub fn new<'a>(
        path: impl Borrow<nn::Path<'a>>,
        in_c: usize,
        out_c: usize,
    ) -> Result<Self> {
        let path = path.borrow() / "conv_block";
        let conv = Conv2DInit {
            stride: 2,
            padding: 1,
            output_padding: 1,
            transposed: true,
            ..Conv2DInit::new(3)
        }
        .build(&path / "0", in_c, out_c)?;
        let norm = InstanceNorm::new(out_c);

        Ok(Self { conv, norm })
    }

    pub fn f_forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.conv.f_forward(xs).context("upsample block")?;
        Ok(self.norm.f_forward(&xs)?.relu())
    }
}
