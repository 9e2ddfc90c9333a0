//! Per-view uniforms for one frame.
//!
//! A frame carries a fixed array of at most [`MAX_VIEW_COUNT`] views (mono or
//! stereo). Every stage selects its view by index and runs identical math.

use crate::core::ViewUniforms;
use crate::render::config::BoundsRadius;
use crate::render::instancing::InstancingLayout;
use crate::render::RenderError;

pub const MAX_VIEW_COUNT: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct FrameUniforms {
    pub view: ViewUniforms,
    pub splat_count: u32,
    pub indexed_splat_count: u32,

    /// 0 in flat addressing mode
    pub chunk_count: u32,

    pub view_index: u32,
    pub bounds_radius: BoundsRadius,
}

/// One [`FrameUniforms`] per view, after checking the view count and sizes.
pub fn frame_uniforms(
    views: &[ViewUniforms],
    layout: &InstancingLayout,
    chunk_count: u32,
    bounds_radius: BoundsRadius,
) -> Result<Vec<FrameUniforms>, RenderError> {
    if views.is_empty() {
        return Err(RenderError::NoViews);
    }
    if views.len() > MAX_VIEW_COUNT {
        return Err(RenderError::TooManyViews(views.len()));
    }

    views
        .iter()
        .enumerate()
        .map(|(i, view)| {
            if view.width() == 0 || view.height() == 0 {
                return Err(RenderError::EmptyViewport(i));
            }
            Ok(FrameUniforms {
                view: view.clone(),
                splat_count: layout.splat_count,
                indexed_splat_count: layout.indexed_splat_count,
                chunk_count,
                view_index: i as u32,
                bounds_radius,
            })
        })
        .collect()
}
