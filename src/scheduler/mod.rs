pub mod aggregator;
pub mod chunk;
pub mod chunker;
pub mod ledger;
pub mod registry;

pub use aggregator::{FinalAggregate, JobReport};
pub use chunk::{Chunk, ChunkState};
pub use ledger::{JobLedger, Retransmit};
pub use registry::{WorkerRecord, WorkerRegistry, WorkerState};
