mod character_controller;
mod diag_plugin;

pub use character_controller::*;
pub use diag_plugin::*;
mod camera_plugin;
pub use camera_plugin::*;
mod respawn;
pub use respawn::*;
mod speedrun;
pub use speedrun::*;
