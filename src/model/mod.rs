mod bottleneck;
mod conv;
mod decoder;
mod encoder;
mod generator;
mod instance_norm;
mod misc;
mod noise_injection;
mod resnet_block;
mod sample_block;
pub mod scale;
mod transform_block;
mod transform_up_block;

pub use bottleneck::*;
pub use conv::*;
pub use decoder::*;
pub use encoder::*;
pub use generator::*;
pub use instance_norm::*;
pub use misc::*;
pub use noise_injection::*;
pub use resnet_block::*;
pub use sample_block::*;
pub use transform_block::*;
pub use transform_up_block::*;
