/// Data layer: core types, loading, type inference, and export.
///
/// Architecture:
/// ```text
///  .csv / .tsv / .json / .parquet / .xlsx / .ods
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → Dataset of raw cells
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ inference │  sample columns → ColumnDescriptor, typed cells
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐        ┌──────────┐
///   │  filter  │ ─────▶ │  export  │  filtered Dataset → file
///   └──────────┘        └──────────┘
/// ```
pub mod descriptor;
pub mod export;
pub mod inference;
pub mod loader;
pub mod model;
