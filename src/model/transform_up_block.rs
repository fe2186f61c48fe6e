use super::{
    conv::{Conv2D, Conv2DInit},
    misc::{ensure_channels, ensure_same_grid},
    resnet_block::ConvBlock,
};
use crate::common::*;

#[derive(Debug, Clone, Default)]
pub struct TransformUpBlockInit {
    pub diff: bool,
}

impl TransformUpBlockInit {
    pub fn build<'a>(
        self,
        path: impl Borrow<nn::Path<'a>>,
        in_c: usize,
        out_c: usize,
    ) -> Result<TransformUpBlock> {
        let path = path.borrow();
        let Self { diff } = self;

        let xs_c = if diff { in_c * 2 } else { in_c };
        let up_conv = Conv2DInit::new(3).build(path / "up_conv" / "0", in_c * 2, in_c)?;
        let conv = ConvBlock::new(path / "convblock", xs_c + in_c, out_c)?;

        Ok(TransformUpBlock {
            xs_c: xs_c as i64,
            skip_c: (in_c * 2) as i64,
            up_conv,
            conv,
        })
    }
}

#[derive(Debug)]
pub struct TransformUpBlock {
    xs_c: i64,
    skip_c: i64,
    up_conv: Conv2D,
    conv: ConvBlock,
}

impl TransformUpBlock {
    pub fn f_forward(&self, xs: &Tensor, skip: &Tensor) -> Result<Tensor> {
        ensure_channels("transform-up block skip", skip, self.skip_c)?;
        ensure_channels("transform-up block input", xs, self.xs_c)?;
        ensure_same_grid("transform-up block", xs, skip)?;

        let skip = self.up_conv.f_forward(skip)?.relu();
        self.conv.f_forward(&Tensor::cat(&[xs, &skip], 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_up_block_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let block = TransformUpBlockInit::default().build(&vs.root() / "fuse", 8, 16)?;

        let xs = Tensor::rand(&[2, 8, 4, 4], FLOAT_CPU);
        let skip = Tensor::rand(&[2, 16, 4, 4], FLOAT_CPU);
        let output = block.f_forward(&xs, &skip)?;
        ensure!(output.size() == vec![2, 16, 4, 4], "incorrect output shape");

        Ok(())
    }

    #[test]
    fn channel_mismatch_without_diff_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let block = TransformUpBlockInit { diff: false }.build(&vs.root() / "fuse", 8, 16)?;

        // the projected skip has 8 channels, so the input must have 8 as well
        let xs = Tensor::rand(&[1, 16, 4, 4], FLOAT_CPU);
        let skip = Tensor::rand(&[1, 16, 4, 4], FLOAT_CPU);
        let err = match block.f_forward(&xs, &skip) {
            Ok(_) => bail!("mismatched channels are accepted"),
            Err(err) => err,
        };
        ensure!(err.to_string().contains("transform-up block input"));

        Ok(())
    }

    #[test]
    fn diff_widens_input_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let block = TransformUpBlockInit { diff: true }.build(&vs.root() / "fuse", 8, 16)?;

        let xs = Tensor::rand(&[1, 16, 4, 4], FLOAT_CPU);
        let skip = Tensor::rand(&[1, 16, 4, 4], FLOAT_CPU);
        let output = block.f_forward(&xs, &skip)?;
        ensure!(output.size() == vec![1, 16, 4, 4], "incorrect output shape");

        let vars = vs.variables();
        ensure!(vars["fuse.up_conv.0.weight"].size() == vec![8, 16, 3, 3]);
        ensure!(vars["fuse.convblock.conv_block.1.weight"].size() == vec![24, 24, 3, 3]);

        Ok(())
    }

    #[test]
    fn spatial_mismatch_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let block = TransformUpBlockInit::default().build(&vs.root() / "fuse", 8, 16)?;

        let xs = Tensor::rand(&[1, 8, 8, 8], FLOAT_CPU);
        let skip = Tensor::rand(&[1, 16, 4, 4], FLOAT_CPU);
        ensure!(block.f_forward(&xs, &skip).is_err());

        Ok(())
    }
}
