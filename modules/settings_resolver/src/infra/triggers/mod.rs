//! Value provider triggers

pub mod interval;

pub use interval::IntervalTrigger;
