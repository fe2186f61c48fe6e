use super::misc::ensure_channels;
use crate::{common::*, noise::NoiseSource};

#[derive(Debug)]
pub struct NoiseInjection {
    channels: i64,
    weight: Tensor,
}

impl NoiseInjection {
    pub fn new<'a>(path: impl Borrow<nn::Path<'a>>, channels: usize) -> Self {
        let channels = channels as i64;
        let weight = path.borrow().zeros("weight", &[1, channels, 1, 1]);
        Self { channels, weight }
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn f_forward(
        &self,
        xs: &Tensor,
        mask: &Tensor,
        noise: &mut dyn NoiseSource,
    ) -> Result<Tensor> {
        let (b, _, h, w) = ensure_channels("noise injection", xs, self.channels)?;
        ensure!(
            mask.dim() == 4,
            "noise injection: expected a 4-D mask, got shape {:?}",
            mask.size()
        );
        let (mask_b, mask_c, mask_h, mask_w) = mask.size4()?;
        ensure!(
            mask_c >= 1 && (mask_h, mask_w) == (h, w) && (mask_b == b || mask_b == 1),
            "noise injection: mask shape {:?} does not match feature shape {:?}",
            mask.size(),
            xs.size()
        );

        let mask = mask.narrow(1, 0, 1);
        let noise = noise.randn(&[1, 1, h, w], (xs.kind(), xs.device()));

        Ok(xs + &self.weight * noise * mask)
    }
}
