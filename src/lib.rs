pub mod app;
pub mod camera;
pub mod config;
pub mod environment;
pub mod frame;
pub mod input;
pub mod lights;
pub mod material_table;
pub mod mesh;
pub mod renderer;
pub mod scene;
pub mod textures;
pub mod time;

pub use app::{run, run_with_config, App};
