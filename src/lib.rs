pub mod cleanup;
pub mod config;
pub mod error;
pub mod geometry;
pub mod request;
pub mod service;
pub mod sink;
pub mod source;
pub mod processing {
    pub mod blend;
    pub mod blur;
    pub mod color;
    pub mod layout;
}
pub mod text {
    pub mod builtin;
    pub mod font;
    pub mod raster;
}
pub mod compose {
    pub mod effects;
    pub mod layers;
    pub mod position;
    pub mod render;
    pub mod suggest;
    pub mod template;
}
