pub mod actions;
pub mod config;
pub mod decision;
pub mod ids;
pub mod mapper;
pub mod persistence;
pub mod reducer;
pub mod state;
pub mod store;
pub mod taxonomy;

pub use actions::*;
pub use decision::*;
pub use ids::*;
pub use mapper::*;
pub use reducer::*;
pub use state::*;
pub use store::*;
pub use taxonomy::*;

pub use persistence::*;
