pub mod store;
pub mod memory;
pub mod supabase_store;
pub mod events;
pub mod slots;
pub mod availability;

pub use store::SlotStore;
pub use memory::InMemorySlotStore;
pub use supabase_store::SupabaseSlotStore;
pub use events::{AvailabilityNotifier, LoggingNotifier, RedisAvailabilityNotifier};
pub use slots::slot_windows;
pub use availability::AvailabilityService;
