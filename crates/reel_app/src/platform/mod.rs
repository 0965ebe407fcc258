mod app;
mod effects;
mod persistence;
mod render;

pub use app::run_app;
