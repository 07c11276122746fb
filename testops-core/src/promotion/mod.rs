//! Promotion of legacy shared-step test cases into real shared steps.

pub mod copy;
pub mod engine;
pub mod reference;
pub mod registry;

pub use copy::{copy_scenario, CopyReport};
pub use engine::{
    default_layers, ordinary_filter, shared_filter, ProjectReport, PromotionEngine, RewireReport,
};
pub use reference::{missing_shared_step_body, parse_missing_shared_step, SharedStepPointer};
pub use registry::SharedStepRegistry;
