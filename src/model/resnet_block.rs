use super::{
    conv::{Conv2D, Conv2DInit},
    instance_norm::InstanceNorm,
    misc::{ensure_channels, ReflectionPad2D},
};
use crate::common::*;

#[derive(Debug)]
struct ConvPair {
    pad: ReflectionPad2D,
    conv1: Conv2D,
    norm1: InstanceNorm,
    conv2: Conv2D,
    norm2: InstanceNorm,
}

impl ConvPair {
    fn new<'a>(path: impl Borrow<nn::Path<'a>>, in_c: usize, out_c: usize) -> Result<Self> {
        let path = path.borrow() / "conv_block";

        Ok(Self {
            pad: ReflectionPad2D::new(1),
            conv1: Conv2DInit::unpadded(3).build(&path / "1", in_c, in_c)?,
            norm1: InstanceNorm::new(in_c),
            conv2: Conv2DInit::unpadded(3).build(&path / "5", in_c, out_c)?,
            norm2: InstanceNorm::new(out_c),
        })
    }

    fn f_forward(&self, xs: &Tensor) -> Result<Tensor> {
        let Self {
            pad,
            conv1,
            norm1,
            conv2,
            norm2,
        } = self;

        let xs = conv1.f_forward(&pad.f_forward(xs)?)?;
        let xs = norm1.f_forward(&xs)?.relu();
        let xs = conv2.f_forward(&pad.f_forward(&xs)?)?;
        norm2.f_forward(&xs)
    }
}

#[derive(Debug)]
pub struct ResidualBlock {
    channels: i64,
    convs: ConvPair,
}

impl ResidualBlock {
    pub fn new<'a>(
        path: impl Borrow<nn::Path<'a>>,
        in_c: usize,
        out_c: usize,
    ) -> Result<Self> {
        ensure!(
            in_c == out_c,
            "residual block needs matching channels for its shortcut, got {} -> {}",
            in_c,
            out_c
        );
        let convs = ConvPair::new(path, in_c, out_c)?;

        Ok(Self {
            channels: in_c as i64,
            convs,
        })
    }

    pub fn f_forward(&self, xs: &Tensor) -> Result<Tensor> {
        ensure_channels("residual block", xs, self.channels)?;
        Ok(xs + self.convs.f_forward(xs)?)
    }
}

#[derive(Debug)]
pub struct ConvBlock {
    in_c: i64,
    convs: ConvPair,
}

impl ConvBlock {
    pub fn new<'a>(
        path: impl Borrow<nn::Path<'a>>,
        in_c: usize,
        out_c: usize,
    ) -> Result<Self> {
        let convs = ConvPair::new(path, in_c, out_c)?;
        Ok(Self {
            in_c: in_c as i64,
            convs,
        })
    }

    pub fn f_forward(&self, xs: &Tensor) -> Result<Tensor> {
        ensure_channels("conv block", xs, self.in_c)?;
        self.convs.f_forward(xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residual_block_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();

        let block = ResidualBlock::new(&root / "block", 6, 6)?;
        let input = Tensor::rand(&[2, 6, 12, 16], FLOAT_CPU);
        let output = block.f_forward(&input)?;

        ensure!(
            output.size() == vec![2, 6, 12, 16],
            "incorrect output shape"
        );
        ensure!(block.f_forward(&Tensor::rand(&[2, 5, 12, 16], FLOAT_CPU)).is_err());

        Ok(())
    }

    #[test]
    fn residual_block_channel_mismatch_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let result = ResidualBlock::new(&vs.root() / "block", 4, 8);
        ensure!(result.is_err(), "mismatched shortcut is accepted");
        Ok(())
    }

    #[test]
    fn zero_weight_residual_is_identity_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let block = ResidualBlock::new(&vs.root() / "block", 4, 4)?;

        tch::no_grad(|| {
            for (_, mut var) in vs.variables() {
                let _ = var.zero_();
            }
        });

        let input = Tensor::randn(&[1, 4, 8, 8], FLOAT_CPU);
        let output = tch::no_grad(|| block.f_forward(&input))?;
        ensure!(output.equal(&input), "zero-weight residual block is not identity");

        Ok(())
    }

    #[test]
    fn conv_block_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();

        let block = ConvBlock::new(&root / "block", 10, 4)?;
        let output = block.f_forward(&Tensor::rand(&[1, 10, 8, 8], FLOAT_CPU))?;
        ensure!(output.size() == vec![1, 4, 8, 8], "incorrect output shape");

        let vars = vs.variables();
        ensure!(vars["block.conv_block.1.weight"].size() == vec![10, 10, 3, 3]);
        ensure!(vars["block.conv_block.5.weight"].size() == vec![4, 10, 3, 3]);

        Ok(())
    }
}
