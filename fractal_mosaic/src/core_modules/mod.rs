pub mod chunk;
pub mod compositor;
pub mod grid_manager;
pub mod image_helper;
pub mod pixel;
pub mod progress;
pub mod quality;
pub mod tile;
