use crate::common::*;

#[derive(Debug)]
pub struct ReflectionPad2D {
    pad: i64,
}

impl ReflectionPad2D {
    pub fn new(pad: usize) -> Self {
        Self { pad: pad as i64 }
    }

    pub fn f_forward(&self, xs: &Tensor) -> Result<Tensor> {
        let pad = self.pad;

        // reflection needs the pad to be strictly smaller than the side
        let (_, _, h, w) = xs.size4()?;
        ensure!(
            pad < w && pad < h,
            "reflection padding {} does not fit a {}x{} feature map",
            pad,
            h,
            w
        );
        let output = xs.f_reflection_pad2d(&[pad, pad, pad, pad])?;

        Ok(output)
    }
}

pub fn ensure_channels(block: &str, xs: &Tensor, channels: i64) -> Result<(i64, i64, i64, i64)> {
    ensure!(
        xs.dim() == 4,
        "{}: expected a 4-D feature map, got shape {:?}",
        block,
        xs.size()
    );
    let shape = xs.size4()?;
    let (_, in_c, _, _) = shape;
    ensure!(
        in_c == channels,
        "{}: expected {} channels, got shape {:?}",
        block,
        channels,
        xs.size()
    );
    Ok(shape)
}

pub fn ensure_same_grid(block: &str, lhs: &Tensor, rhs: &Tensor) -> Result<()> {
    let (lb, _, lh, lw) = lhs.size4()?;
    let (rb, _, rh, rw) = rhs.size4()?;
    ensure!(
        (lb, lh, lw) == (rb, rh, rw),
        "{}: batch/spatial size mismatch, {:?} vs {:?}",
        block,
        lhs.size(),
        rhs.size()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_padding_test() -> Result<()> {
        let pad = ReflectionPad2D::new(3);

        let input = Tensor::rand(&[2, 4, 8, 8], FLOAT_CPU);
        let output = pad.f_forward(&input)?;
        ensure!(output.size() == vec![2, 4, 14, 14], "incorrect output shape");

        // pad as wide as the map itself is rejected instead of panicking in libtorch
        let tiny = Tensor::rand(&[1, 4, 2, 2], FLOAT_CPU);
        ensure!(pad.f_forward(&tiny).is_err(), "oversized padding is accepted");

        Ok(())
    }

    #[test]
    fn ensure_channels_test() -> Result<()> {
        let xs = Tensor::zeros(&[1, 8, 4, 4], FLOAT_CPU);
        ensure!(ensure_channels("test", &xs, 8)? == (1, 8, 4, 4));

        let err = ensure_channels("some_block", &xs, 16).unwrap_err();
        ensure!(err.to_string().contains("some_block"));
        ensure!(err.to_string().contains("16"));

        let flat = Tensor::zeros(&[8, 4], FLOAT_CPU);
        ensure!(ensure_channels("test", &flat, 8).is_err());

        Ok(())
    }
}
