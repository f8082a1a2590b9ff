//! # Template Trigger
//!
//! Second level (FLT-1) trigger which decides whether a trace, already flagged by the first
//! level trigger, resembles a known signal shape. The engine lives in [template_matching],
//! the remaining modules read traces and evaluate the trigger over the channels of an event.
pub mod parameters;
pub mod processing;
pub mod template_matching;
pub mod trace_file;
