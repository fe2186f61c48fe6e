use crate::common::*;

const EPS: f64 = 1e-5;

#[derive(Debug)]
pub struct InstanceNorm {
    channels: i64,
}

impl InstanceNorm {
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels as i64,
        }
    }

    pub fn f_forward(&self, input: &Tensor) -> Result<Tensor> {
        let channels = self.channels;

        ensure!(
            input.dim() == 4,
            "instance norm expects a 4-D input, got shape {:?}",
            input.size()
        );
        let (_, in_c, _, _) = input.size4()?;
        ensure!(
            in_c == channels,
            "instance norm expects {} channels, got {}",
            channels,
            in_c
        );

        let output = input.f_instance_norm(
            None::<&Tensor>,
            None::<&Tensor>,
            None::<&Tensor>,
            None::<&Tensor>,
            true,
            0.1,
            EPS,
            true,
        )?;

        Ok(output)
    }
}
