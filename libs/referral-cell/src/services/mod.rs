pub mod inbox;
pub mod lifecycle;
pub mod referral;
pub mod saga;
pub mod slots;

pub use inbox::InboxService;
pub use referral::ReferralService;
pub use slots::SlotAllocator;
