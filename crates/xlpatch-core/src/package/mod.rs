//! The package boundary: manifest, relationship graph, source binding,
//! reader, and writer.

pub mod manifest;
pub mod reader;
pub mod relgraph;
pub mod source;
pub mod writer;

pub(crate) mod paths;

pub use manifest::{PartEntry, PartKind, PartManifest};
pub use reader::{PackageReader, ReadResult};
pub use relgraph::RelationshipGraph;
pub use source::{ModificationTracker, PackageOrigin, SourceContext, SourceFingerprint};
pub use writer::PackageWriter;
