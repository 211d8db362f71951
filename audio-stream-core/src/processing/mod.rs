pub mod buffer_size;
pub mod sample_accumulator;
