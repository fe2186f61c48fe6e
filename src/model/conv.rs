use crate::common::*;

#[derive(Debug, Clone)]
pub struct Conv2DInit {
    pub ksize: usize,
    pub stride: usize,
    pub padding: usize,
    pub output_padding: usize,
    pub transposed: bool,
}

impl Conv2DInit {
    pub fn new(ksize: usize) -> Self {
        Self {
            ksize,
            stride: 1,
            padding: ksize / 2,
            output_padding: 0,
            transposed: false,
        }
    }

    /// A convolution expecting its input to be padded beforehand.
    pub fn unpadded(ksize: usize) -> Self {
        Self {
            padding: 0,
            ..Self::new(ksize)
        }
    }

    pub fn build<'a>(
        self,
        path: impl Borrow<nn::Path<'a>>,
        in_dim: usize,
        out_dim: usize,
    ) -> Result<Conv2D> {
        let Self {
            ksize,
            stride,
            padding,
            output_padding,
            transposed,
        } = self;

        ensure!(
            in_dim > 0 && out_dim > 0,
            "conv2d channels must be positive, got {} -> {}",
            in_dim,
            out_dim
        );
        ensure!(ksize > 0 && stride > 0, "ksize and stride must be positive");
        ensure!(
            !transposed || output_padding < stride,
            "output padding must be smaller than stride"
        );

        let path = path.borrow();
        let in_dim = in_dim as i64;
        let out_dim = out_dim as i64;
        let ksize = ksize as i64;

        let bs = path.var("bias", &[out_dim], nn::Init::Const(0.0));
        let ws = {
            // transposed kernels are stored as [in, out, k, k]
            let weight_size = if transposed {
                [in_dim, out_dim, ksize, ksize]
            } else {
                [out_dim, in_dim, ksize, ksize]
            };
            path.var("weight", &weight_size, nn::Init::KaimingUniform)
        };

        Ok(Conv2D {
            in_dim,
            stride: stride as i64,
            padding: padding as i64,
            output_padding: output_padding as i64,
            transposed,
            weight: ws,
            bias: bs,
        })
    }
}

#[derive(Debug)]
pub struct Conv2D {
    in_dim: i64,
    stride: i64,
    padding: i64,
    output_padding: i64,
    transposed: bool,
    weight: Tensor,
    bias: Tensor,
}

impl Conv2D {
    pub fn f_forward(&self, input: &Tensor) -> Result<Tensor> {
        let Self {
            in_dim,
            stride,
            padding,
            output_padding,
            transposed,
            ref weight,
            ref bias,
        } = *self;

        ensure!(
            input.dim() == 4,
            "conv2d expects a 4-D input, got shape {:?}",
            input.size()
        );
        let (_, in_c, _, _) = input.size4()?;
        ensure!(
            in_c == in_dim,
            "conv2d expects {} input channels, got shape {:?}",
            in_dim,
            input.size()
        );

        let output = input.f_convolution(
            weight,
            Some(bias),
            &[stride, stride],
            &[padding, padding],
            &[1, 1],
            transposed,
            &[output_padding, output_padding],
            1,
        )?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conv_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();

        let conv = Conv2DInit {
            stride: 2,
            ..Conv2DInit::new(3)
        }
        .build(&root / "down", 4, 8)?;
        let output = conv.f_forward(&Tensor::rand(&[2, 4, 16, 16], FLOAT_CPU))?;
        ensure!(output.size() == vec![2, 8, 8, 8], "incorrect output shape");

        let up = Conv2DInit {
            stride: 2,
            output_padding: 1,
            transposed: true,
            ..Conv2DInit::new(3)
        }
        .build(&root / "up", 8, 4)?;
        let output = up.f_forward(&output)?;
        ensure!(output.size() == vec![2, 4, 16, 16], "incorrect output shape");

        ensure!(
            conv.f_forward(&Tensor::rand(&[2, 5, 16, 16], FLOAT_CPU))
                .is_err(),
            "channel mismatch is accepted"
        );

        Ok(())
    }

    #[test]
    fn weight_layout_test() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();

        let _ = Conv2DInit::new(3).build(&root / "conv", 4, 8)?;
        let _ = Conv2DInit {
            transposed: true,
            stride: 2,
            output_padding: 1,
            ..Conv2DInit::new(3)
        }
        .build(&root / "conv_t", 4, 8)?;

        let vars = vs.variables();
        ensure!(vars["conv.weight"].size() == vec![8, 4, 3, 3]);
        ensure!(vars["conv.bias"].size() == vec![8]);
        ensure!(vars["conv_t.weight"].size() == vec![4, 8, 3, 3]);

        Ok(())
    }
}
