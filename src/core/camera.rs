//! Per-view camera state handed to every pipeline stage.
//!
//! Conventions:
//! - Right-handed view space, camera looking down -Z
//! - Clip-space depth in [0, 1] (wgpu / Metal), +Y up in NDC
//! - Screen size in pixels

use nalgebra::{Matrix3, Matrix4, Point3, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Projection, view and viewport for one eye.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewUniforms {
    /// View → clip
    pub projection: Matrix4<f32>,

    /// World → view
    pub view: Matrix4<f32>,

    /// World-space eye position, used for the SH view direction
    pub camera_position: Vector3<f32>,

    /// (width, height) in pixels
    pub screen_size: [u32; 2],
}

impl ViewUniforms {
    /// Build from explicit matrices. The eye position is recovered from the
    /// rigid part of the view matrix: C = -Rᵀ t.
    pub fn new(projection: Matrix4<f32>, view: Matrix4<f32>, screen_size: [u32; 2]) -> Self {
        let r: Matrix3<f32> = view.fixed_view::<3, 3>(0, 0).into_owned();
        let t: Vector3<f32> = view.fixed_view::<3, 1>(0, 3).into_owned();
        Self {
            projection,
            view,
            camera_position: -r.transpose() * t,
            screen_size,
        }
    }

    /// Perspective camera at `eye` looking at `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn look_at(
        eye: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        fov_y: f32,
        width: u32,
        height: u32,
        near: f32,
        far: f32,
    ) -> Self {
        let aspect = width as f32 / height.max(1) as f32;
        Self {
            projection: perspective(fov_y, aspect, near, far),
            view: Matrix4::look_at_rh(&eye, &target, &up),
            camera_position: eye.coords,
            screen_size: [width, height],
        }
    }

    pub fn width(&self) -> u32 {
        self.screen_size[0]
    }

    pub fn height(&self) -> u32 {
        self.screen_size[1]
    }

    pub fn world_to_view(&self, point_world: &Vector3<f32>) -> Vector3<f32> {
        (self.view * point_world.push(1.0)).xyz()
    }

    /// World position → clip space (P · V · p).
    pub fn world_to_clip(&self, point_world: &Vector3<f32>) -> Vector4<f32> {
        self.projection * self.view * point_world.push(1.0)
    }

    /// tan(fov / 2) per axis, read back from the projection diagonal.
    pub fn tan_half_fov(&self) -> Vector2<f32> {
        Vector2::new(1.0 / self.projection[(0, 0)], 1.0 / self.projection[(1, 1)])
    }

    /// Focal length in pixels per axis.
    pub fn focal(&self) -> Vector2<f32> {
        Vector2::new(
            self.screen_size[0] as f32 * self.projection[(0, 0)] / 2.0,
            self.screen_size[1] as f32 * self.projection[(1, 1)] / 2.0,
        )
    }
}

/// Right-handed perspective projection with depth mapped to [0, 1].
pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
    let f = 1.0 / (fov_y / 2.0).tan();
    let range = near - far;
    Matrix4::new(
        f / aspect, 0.0, 0.0, 0.0, //
        0.0, f, 0.0, 0.0, //
        0.0, 0.0, far / range, near * far / range, //
        0.0, 0.0, -1.0, 0.0,
    )
}

/// Human-editable camera description (CLI `--camera-json`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookAtCamera {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    #[serde(default = "default_up")]
    pub up: [f32; 3],
    #[serde(default = "default_fov_y_degrees")]
    pub fov_y_degrees: f32,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
}

fn default_up() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

fn default_fov_y_degrees() -> f32 {
    60.0
}

fn default_near() -> f32 {
    0.1
}

fn default_far() -> f32 {
    1000.0
}

impl From<&LookAtCamera> for ViewUniforms {
    fn from(c: &LookAtCamera) -> Self {
        ViewUniforms::look_at(
            Point3::from(c.eye),
            Point3::from(c.target),
            Vector3::from(c.up),
            c.fov_y_degrees.to_radians(),
            c.width,
            c.height,
            c.near,
            c.far,
        )
    }
}
