// ── Entity storage ──

mod registry;

pub use registry::EntityRegistry;
