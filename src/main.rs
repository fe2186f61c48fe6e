use anyhow::Result;
use edge_style_gen::{
    common::*,
    config,
    noise::{NoiseSource, SeededNoise, TorchNoise},
};
use std::env;
use structopt::StructOpt;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

#[derive(Debug, Clone, StructOpt)]
/// Runs one forward pass of the edge-conditioned style generator.
pub struct Args {
    #[structopt(long, default_value = "config.json5")]
    pub config: PathBuf,
}

fn main() -> Result<()> {
    // setup tracing
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        }
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    // parse config
    let Args { config } = Args::from_args();
    let config::Config {
        generator: generator_init,
        runtime:
            config::Runtime {
                device,
                seed,
                batch_size,
                image_size,
            },
    } = config::Config::load(&config)?;

    let batch_size = batch_size.get() as i64;
    let image_size = image_size.get() as i64;
    let corrupt_channels = generator_init.corrupt_channels as i64;
    let edge_channels = generator_init.edge_channels as i64;

    // initialize model
    let vs = nn::VarStore::new(device);
    let generator = generator_init.build(vs.root())?;
    info!("generator has {} parameter tensors", vs.variables().len());

    let mut noise: Box<dyn NoiseSource> = match seed {
        Some(seed) => Box::new(SeededNoise::new(seed)),
        None => Box::new(TorchNoise),
    };

    // random inputs in the generator's value ranges
    let options = (Kind::Float, device);
    let corrupt =
        noise.randn(&[batch_size, corrupt_channels, image_size, image_size], options).tanh();
    let edges = noise
        .randn(&[batch_size, edge_channels, image_size, image_size], options)
        .gt(0.0)
        .to_kind(Kind::Float);

    let output = tch::no_grad(|| generator.forward(&corrupt, &edges, noise.as_mut()))?;

    info!(
        "output shape {:?}, values in [{:.4}, {:.4}]",
        output.size(),
        f64::from(output.min()),
        f64::from(output.max())
    );

    Ok(())
}
