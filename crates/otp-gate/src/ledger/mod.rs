//! OTP ledger: issuance, resend throttling, expiry, and attempt-limited
//! verification of phone-bound one-time passcodes.

mod clock;
mod generator;
mod store;
mod sweeper;

pub use clock::SystemClock;
pub use generator::{GeneratorMode, build_generator};
pub use store::{Ledger, LedgerPolicy};
pub use sweeper::sweeper_worker;

#[cfg(test)]
pub use clock::ManualClock;
#[cfg(test)]
pub use generator::FixedGenerator;
