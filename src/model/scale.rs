use crate::common::*;

pub const RESOLUTIONS: [usize; 6] = [128, 64, 32, 16, 8, 4];

/// Levels whose encoder output is retained for the decoder.
pub const SKIP_RESOLUTIONS: [usize; 3] = [16, 8, 4];

pub const MAX_DOUBLINGS: usize = 3;

pub const DOWNSCALE: usize = 1 << (RESOLUTIONS.len() - 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScaleLevel {
    pub index: usize,
    pub resolution: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub has_skip: bool,
}

pub fn level_channels(base_channels: usize, index: usize) -> usize {
    base_channels << index.min(MAX_DOUBLINGS)
}

pub fn encoder_levels(base_channels: usize) -> Vec<ScaleLevel> {
    RESOLUTIONS
        .iter()
        .enumerate()
        .map(|(index, &resolution)| ScaleLevel {
            index,
            resolution,
            in_channels: level_channels(base_channels, index.saturating_sub(1)),
            out_channels: level_channels(base_channels, index),
            has_skip: SKIP_RESOLUTIONS.contains(&resolution),
        })
        .collect()
}

pub fn decoder_levels(base_channels: usize) -> Vec<ScaleLevel> {
    let encoder = encoder_levels(base_channels);
    let bottom_channels = encoder
        .last()
        .map(|level| level.out_channels)
        .unwrap_or(base_channels);

    encoder
        .iter()
        .rev()
        .scan(bottom_channels, |in_channels, level| {
            let decoded = ScaleLevel {
                index: RESOLUTIONS.len() - 1 - level.index,
                resolution: level.resolution,
                in_channels: *in_channels,
                out_channels: level.out_channels,
                has_skip: level.has_skip,
            };
            *in_channels = level.out_channels;
            Some(decoded)
        })
        .collect()
}

pub fn check_levels(levels: &[ScaleLevel]) -> Result<()> {
    levels
        .iter()
        .tuple_windows()
        .try_for_each(|(prev, next)| -> Result<()> {
            ensure!(
                prev.out_channels == next.in_channels,
                "level at scale {} outputs {} channels but level at scale {} expects {}",
                prev.resolution,
                prev.out_channels,
                next.resolution,
                next.in_channels
            );
            Ok(())
        })
}

pub fn check_input_size(height: i64, width: i64) -> Result<()> {
    let downscale = DOWNSCALE as i64;
    ensure!(
        height % downscale == 0 && width % downscale == 0,
        "input size {}x{} is not divisible by {}",
        height,
        width,
        downscale
    );
    ensure!(
        height >= downscale * 2 && width >= downscale * 2,
        "input size {}x{} is too small, need at least {}x{}",
        height,
        width,
        downscale * 2,
        downscale * 2
    );
    Ok(())
}
