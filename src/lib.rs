// Configuration (TOML file + environment overrides)
pub mod config;

// Kill records and the game-info client
pub mod killboard;

// Tracked players and per-player dedup state
pub mod tracker;

// Inventory grid images
pub mod render;

// Chat notifications
pub mod notify;

// Periodic kill polling
pub mod poller;

// Chat commands
pub mod commands;

// Command and status HTTP API
pub mod api;

#[cfg(test)]
mod testing;
