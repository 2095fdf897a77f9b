//! EPUB container: archive I/O, package document parsing and rendering.

pub mod archive;
pub mod parser;
pub mod writer;

pub use archive::{pack, unpack, Unpacked};
pub use parser::{parse_container_xml, parse_ncx, parse_opf, root_folder, PackageInfo};
