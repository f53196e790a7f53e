use log::{error, trace};

use super::{RenderError, scratch::ScratchBuffer, surface::DisplaySurface};
use crate::{engine::traits::Generation, types::SurfaceVersion};

/// Presents `generation` on `surface`, staging the bytes through `scratch`.
///
/// Converts the generation to the surface's pixel format first. The scratch
/// lock is held until the surface has copied the frame, and the surface is
/// left untouched when any size check fails. Lock order is scratch, then
/// surface.
pub fn materialize<G: Generation>(
    generation: &mut G,
    scratch: &ScratchBuffer,
    surface: &DisplaySurface,
) -> Result<SurfaceVersion, RenderError> {
    let format = surface.format();
    generation.convert_depth(format.depth())?;
    generation.convert_colorspace(format.colorspace())?;

    let (width, height) = (generation.width(), generation.height());
    let expected = format.frame_size(width, height);
    let declared = generation.output_buffer_size();
    if declared != expected {
        error!("{width}x{height} generation declares {declared} bytes, expected {expected}");
        return Err(RenderError::SizeMismatch {
            expected,
            actual: declared,
        });
    }

    let mut region = scratch.lock();
    let staged = region.reserve(expected);
    let written = generation.write_to_buffer(staged)?;
    if written != expected {
        error!("engine wrote {written} bytes, expected {expected}");
        return Err(RenderError::SizeMismatch {
            expected,
            actual: written,
        });
    }

    {
        let mut frame = surface.lock();
        frame.allocate(width, height);
        if !frame.install_pixels(&staged[..written]) {
            return Err(RenderError::SizeMismatch {
                expected: frame.pixels().len(),
                actual: written,
            });
        }
    }
    drop(region);

    let version = surface.bump();
    trace!("surface version {version}");
    Ok(version)
}
