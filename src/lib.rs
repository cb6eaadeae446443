pub mod api;
pub mod model;
pub mod settings;
pub mod view;
