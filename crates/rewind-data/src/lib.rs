//! Data loading utilities for rewind.

pub mod cancel;
pub mod csv;
pub mod memory;
pub mod source;
pub mod validation;

pub use self::csv::CsvLoader;
pub use cancel::CancelToken;
pub use memory::MemorySource;
pub use source::CandleSource;
pub use validation::{is_strictly_ascending, validate_candle};
