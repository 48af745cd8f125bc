pub mod assets;
pub mod chat;
pub mod codec;
pub mod composite;
pub mod errors;
pub mod events;
pub mod history;
pub mod hotspot;
pub mod instructions;
pub mod selection;
pub mod style;

pub use assets::ImageAsset;
pub use errors::EditError;
