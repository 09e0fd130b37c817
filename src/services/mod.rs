// Core services
pub mod order_number;
pub mod orders;
pub mod quotes;
pub mod suppliers;

// Outbound side channels
pub mod notifier;

// Operational tooling
pub mod backup;
