use super::{
    resnet_block::ResidualBlock,
    sample_block::UpSample,
};
use crate::{common::*, noise::NoiseSource};

#[derive(Debug, Clone)]
pub struct BottleneckInit {
    pub channels: usize,
    pub latent_side: usize,
    pub z_dim: usize,
}

impl BottleneckInit {
    pub fn build<'a>(self, path: impl Borrow<nn::Path<'a>>) -> Result<Bottleneck> {
        let path = path.borrow();
        let Self {
            channels,
            latent_side,
            z_dim,
        } = self;
        ensure!(
            channels > 0 && latent_side > 0 && z_dim > 0,
            "bottleneck sizes must be positive"
        );
        ensure!(
            z_dim == channels,
            "lifting a latent needs z_dim == channels, got {} and {}",
            z_dim,
            channels
        );

        let h_dim = channels * latent_side * latent_side;
        let fc1 = nn::linear(path / "fc1", h_dim as i64, z_dim as i64, Default::default());
        let fc2 = nn::linear(path / "fc2", h_dim as i64, z_dim as i64, Default::default());
        let fc3 = nn::linear(path / "fc3", z_dim as i64, h_dim as i64, Default::default());

        let lift: Vec<_> = {
            let path = path / "block_up_transform";
            (0..2)
                .map(|step| -> Result<_> {
                    let up = UpSample::new(
                        &path / (step * 2).to_string(),
                        channels,
                        channels,
                    )?;
                    let residual = ResidualBlock::new(
                        &path / (step * 2 + 1).to_string(),
                        channels,
                        channels,
                    )?;
                    Ok((up, residual))
                })
                .try_collect()?
        };

        Ok(Bottleneck {
            channels: channels as i64,
            latent_side: latent_side as i64,
            h_dim: h_dim as i64,
            z_dim: z_dim as i64,
            fc1,
            fc2,
            fc3,
            lift,
        })
    }
}

#[derive(Debug)]
pub struct BottleneckOutput {
    pub z: Tensor,
    pub mu: Tensor,
    pub logvar: Tensor,
}

#[derive(Debug)]
pub struct Bottleneck {
    channels: i64,
    latent_side: i64,
    h_dim: i64,
    z_dim: i64,
    fc1: nn::Linear,
    fc2: nn::Linear,
    fc3: nn::Linear,
    lift: Vec<(UpSample, ResidualBlock)>,
}

impl Bottleneck {
    pub fn h_dim(&self) -> i64 {
        self.h_dim
    }

    pub fn z_dim(&self) -> i64 {
        self.z_dim
    }

    pub fn f_forward(
        &self,
        feature: &Tensor,
        noise: &mut dyn NoiseSource,
    ) -> Result<BottleneckOutput> {
        ensure!(
            feature.dim() >= 2,
            "bottleneck expects a batched input, got shape {:?}",
            feature.size()
        );
        let h = feature.flatten(1, -1);
        let (_, h_dim) = h.size2()?;
        ensure!(
            h_dim == self.h_dim,
            "bottleneck expects {} features per sample, got shape {:?}",
            self.h_dim,
            feature.size()
        );

        let mu = self.fc1.forward(&h);
        let logvar = self.fc2.forward(&h);
        let z = reparameterize(&mu, &logvar, noise);

        Ok(BottleneckOutput { z, mu, logvar })
    }

    pub fn expand(&self, z: &Tensor) -> Result<Tensor> {
        let (b, _) = self.check_latent(z)?;
        let h = self.fc3.forward(z);
        Ok(h.view([b, self.channels, self.latent_side, self.latent_side]))
    }

    pub fn lift(&self, z: &Tensor) -> Result<Tensor> {
        let (b, _) = self.check_latent(z)?;
        let xs = z.view([b, self.z_dim, 1, 1]);

        self.lift
            .iter()
            .try_fold(xs, |xs, (up, residual)| -> Result<_> {
                let xs = up.f_forward(&xs)?;
                residual.f_forward(&xs)
            })
    }

    fn check_latent(&self, z: &Tensor) -> Result<(i64, i64)> {
        ensure!(
            z.dim() == 2,
            "latent must be [batch, {}], got shape {:?}",
            self.z_dim,
            z.size()
        );
        let (b, z_dim) = z.size2()?;
        ensure!(
            z_dim == self.z_dim,
            "latent must be [batch, {}], got shape {:?}",
            self.z_dim,
            z.size()
        );
        Ok((b, z_dim))
    }
}

/// Samples `mu + exp(logvar / 2) * eps` with `eps` drawn from `noise`.
pub fn reparameterize(mu: &Tensor, logvar: &Tensor, noise: &mut dyn NoiseSource) -> Tensor {
    let std = (logvar * 0.5).exp();
    let eps = noise.randn(&mu.size(), (mu.kind(), mu.device()));
    mu + std * eps
}
