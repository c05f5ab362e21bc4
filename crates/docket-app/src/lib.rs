// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod group;
pub mod ids;
pub mod layout;
pub mod list;
pub mod model;
pub mod state;
pub mod window;

#[cfg(test)]
mod testutil;

pub use group::*;
pub use ids::*;
pub use layout::*;
pub use list::*;
pub use model::*;
pub use state::*;
pub use window::*;
