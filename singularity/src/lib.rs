//! Singularity: an interactive, ray-marched black hole
//!
//! A volumetric black hole with an accretion disk and polar jets sits among
//! orbiting asteroids and a starfield. The viewer flies around in first
//! person; straying inside the capture radius starts a short "swallow"
//! sequence that ends with a respawn.
//!
//! The simulation side ([`animation`], [`scene`], [`frame`]) never touches
//! the GPU directly: it talks to a [`backend::RenderBackend`], which
//! [`renderer::WgpuRenderer`] implements with wgpu.

pub mod animation;
pub mod audio;
pub mod backend;
pub mod config;
pub mod frame;
pub mod geometry;
pub mod hud;
pub mod input;
pub mod renderer;
pub mod scene;
pub mod snapshot;
pub mod texture;
pub mod volume;
