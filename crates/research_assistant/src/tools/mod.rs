//! Tool registry, runner and the two paper tools
//!
//! Tools decode their typed input from the model's JSON arguments through
//! `DynTool`; the runner formats results and normalizes failures into `ToolError`.

mod error;
mod registry;
mod runner;
mod tool;

pub mod impls;


pub use error::RegistryMismatchError;
pub use registry::ToolRegistry;
pub use runner::ToolRunner;

/// Registry holding `search_papers` and `extract_info`
pub fn default_registry() -> Result<ToolRegistry, RegistryMismatchError> {
    ToolRegistry::new(impls::paper_tool_schemas(), impls::paper_tools())
}
