use crate::config::CameraConfig;
use crate::input::{Input, InputAction};
use glam::{Mat4, Vec3};

const WORLD_UP: Vec3 = Vec3::Y;
const PITCH_LIMIT_DEGREES: f32 = 89.0;
const ZOOM_RANGE_DEGREES: (f32, f32) = (1.0, 45.0);

/// Free-flying perspective camera driven by yaw/pitch mouse look.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Vec3,
    yaw_degrees: f32,
    pitch_degrees: f32,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    speed: f32,
    sensitivity: f32,
    zoom_degrees: f32,
    near: f32,
    far: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

impl FlyCamera {
    pub fn from_config(cfg: &CameraConfig) -> Self {
        let mut camera = Self {
            position: Vec3::from_array(cfg.position),
            yaw_degrees: cfg.yaw_degrees,
            pitch_degrees: cfg.pitch_degrees.clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES),
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: WORLD_UP,
            speed: cfg.speed,
            sensitivity: cfg.sensitivity,
            zoom_degrees: cfg.zoom_degrees.clamp(ZOOM_RANGE_DEGREES.0, ZOOM_RANGE_DEGREES.1),
            near: cfg.near,
            far: cfg.far,
        };
        camera.update_vectors();
        camera
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.zoom_degrees.to_radians(), aspect.max(0.0001), self.near, self.far)
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn zoom_degrees(&self) -> f32 {
        self.zoom_degrees
    }

    /// Applies held movement keys, accumulated mouse motion and scroll for one frame.
    pub fn update(&mut self, input: &mut Input, dt: f32) {
        const BINDINGS: [(InputAction, CameraMovement); 6] = [
            (InputAction::MoveForward, CameraMovement::Forward),
            (InputAction::MoveBackward, CameraMovement::Backward),
            (InputAction::MoveLeft, CameraMovement::Left),
            (InputAction::MoveRight, CameraMovement::Right),
            (InputAction::MoveUp, CameraMovement::Up),
            (InputAction::MoveDown, CameraMovement::Down),
        ];
        for (action, movement) in BINDINGS {
            if input.is_action_down(action) {
                self.process_movement(movement, dt);
            }
        }
        let (dx, dy) = input.take_mouse_delta();
        if dx != 0.0 || dy != 0.0 {
            self.process_mouse(dx, -dy);
        }
        if let Some(scroll) = input.take_wheel_delta() {
            self.process_scroll(scroll);
        }
    }

    pub fn process_movement(&mut self, movement: CameraMovement, dt: f32) {
        let velocity = self.speed * dt;
        let direction = match movement {
            CameraMovement::Forward => self.front,
            CameraMovement::Backward => -self.front,
            CameraMovement::Left => -self.right,
            CameraMovement::Right => self.right,
            CameraMovement::Up => WORLD_UP,
            CameraMovement::Down => -WORLD_UP,
        };
        self.position += direction * velocity;
    }

    /// `y_offset` is positive when the mouse moves up.
    pub fn process_mouse(&mut self, x_offset: f32, y_offset: f32) {
        self.yaw_degrees += x_offset * self.sensitivity;
        self.pitch_degrees =
            (self.pitch_degrees + y_offset * self.sensitivity).clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES);
        self.update_vectors();
    }

    pub fn process_scroll(&mut self, y_offset: f32) {
        self.zoom_degrees = (self.zoom_degrees - y_offset).clamp(ZOOM_RANGE_DEGREES.0, ZOOM_RANGE_DEGREES.1);
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw_degrees.to_radians(), self.pitch_degrees.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize();
        self.right = self.front.cross(WORLD_UP).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputEvent;
    use winit::keyboard::Key;

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = FlyCamera::from_config(&CameraConfig::default());
        assert!((camera.front() - Vec3::NEG_Z).length() < 1e-5);
        let view = camera.view_matrix();
        let origin_in_view = view.transform_point3(Vec3::new(5.0, 0.0, 0.0));
        assert!(origin_in_view.z < 0.0, "scene centre is in front of the camera");
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = FlyCamera::from_config(&CameraConfig::default());
        camera.process_mouse(0.0, 10_000.0);
        assert!(camera.front().y < 1.0);
        assert!(camera.front().y > 0.99);
        assert!(!camera.view_matrix().to_cols_array().iter().any(|v| v.is_nan()));
    }

    #[test]
    fn scroll_zoom_stays_in_range() {
        let mut camera = FlyCamera::from_config(&CameraConfig::default());
        camera.process_scroll(-10.0);
        assert_eq!(camera.zoom_degrees(), 45.0);
        camera.process_scroll(100.0);
        assert_eq!(camera.zoom_degrees(), 1.0);
    }

    #[test]
    fn held_keys_move_by_speed_times_delta() {
        let mut camera = FlyCamera::from_config(&CameraConfig::default());
        let mut input = Input::new();
        input.push(InputEvent::Key { key: Key::Character("w".into()), pressed: true });
        let start = camera.position;
        camera.update(&mut input, 2.0);
        assert!((camera.position - (start + Vec3::NEG_Z * 5.0)).length() < 1e-4);
    }
}
