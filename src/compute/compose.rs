//! Compositing of a chromosome's operators into a single displayable image.

use super::evolution::Gene;
use super::image::Image;

/// Value substituted for NaN channels in an operator's output.
const NAN_FILL: f32 = 1.0;

/// Weighted average of every gene's operator output on `reference`.
///
/// Weights are normalized by their sum. An empty gene list or a zero total
/// weight yields a black image. The result is clamped to `[0, 1]`.
pub fn compose(reference: &Image, genes: &[Gene]) -> Image {
    let mut out = Image::new(reference.width, reference.height);

    let total: f32 = genes.iter().map(|g| g.tone_map.weight).sum();
    if !(total > 0.0) {
        return out;
    }

    for gene in genes {
        let weight = gene.tone_map.weight / total;
        if weight == 0.0 {
            continue;
        }
        let mut mapped = gene.tone_map.apply(reference);
        mapped.patch_nans(NAN_FILL);
        out.add_weighted(&mapped, weight);
    }

    out.clamp01();
    out
}
