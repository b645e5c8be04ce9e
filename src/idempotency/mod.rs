//! # Idempotency Ledger
//!
//! Records which (event, consumer) pairs have already been handled so an
//! at-least-once transport narrows to effectively-once execution. The ledger
//! is written only after the wrapped handler succeeds; a crash between the
//! handler and the ledger write causes one harmless re-run that the domain
//! transition guards absorb.

pub mod ledger;
pub mod wrapper;

pub use ledger::{IdempotencyLedger, InMemoryIdempotencyLedger, ProcessedEvent};
pub use wrapper::IdempotentConsumer;
