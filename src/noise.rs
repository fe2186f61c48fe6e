use crate::common::*;
use rand_distr::StandardNormal;

pub trait NoiseSource {
    fn randn(&mut self, size: &[i64], options: (Kind, Device)) -> Tensor;
}

#[derive(Debug, Clone)]
pub struct SeededNoise {
    rng: StdRng,
}

impl SeededNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl NoiseSource for SeededNoise {
    fn randn(&mut self, size: &[i64], (kind, device): (Kind, Device)) -> Tensor {
        let numel: i64 = size.iter().product();
        let values: Vec<f32> = (&mut self.rng)
            .sample_iter(StandardNormal)
            .take(numel.max(0) as usize)
            .collect();

        Tensor::of_slice(&values)
            .view(size)
            .to_kind(kind)
            .to_device(device)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TorchNoise;

impl NoiseSource for TorchNoise {
    fn randn(&mut self, size: &[i64], options: (Kind, Device)) -> Tensor {
        Tensor::randn(size, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_noise_test() -> Result<()> {
        let mut lhs = SeededNoise::new(7);
        let mut rhs = SeededNoise::new(7);
        let mut other = SeededNoise::new(8);

        let a = lhs.randn(&[2, 1, 4, 4], FLOAT_CPU);
        let b = rhs.randn(&[2, 1, 4, 4], FLOAT_CPU);
        let c = other.randn(&[2, 1, 4, 4], FLOAT_CPU);

        ensure!(a.size() == vec![2, 1, 4, 4], "incorrect shape");
        ensure!(a.kind() == Kind::Float);
        ensure!(a.equal(&b), "same seed gives different draws");
        ensure!(!a.equal(&c), "different seeds give the same draws");

        // the stream advances between draws
        let d = lhs.randn(&[2, 1, 4, 4], FLOAT_CPU);
        ensure!(!a.equal(&d));

        Ok(())
    }

    #[test]
    fn torch_noise_test() -> Result<()> {
        let xs = TorchNoise.randn(&[3, 5], FLOAT_CPU);
        ensure!(xs.size() == vec![3, 5]);
        Ok(())
    }
}
