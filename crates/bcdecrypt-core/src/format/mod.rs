//! The `bc01` container: header, metadata and encrypted body.

pub mod body;
pub mod header;
pub mod metadata;

pub use body::{
    DecryptOptions, Progress, ProgressFn, block_windows, decrypt_block, decrypt_file_body,
    derive_block_iv,
};
pub use header::{
    ContainerHeader, HeaderError, MAGIC, RAW_HEADER_LEN, RawHeader, parse_header, read_raw_header,
};
pub use metadata::{
    CoreMetadata, JsonMetadataDecoder, KeyContainerFields, MetadataDecoder, MetadataError,
};
