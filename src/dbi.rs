// Copyright (C) Back Engineering Labs, Inc. - All Rights Reserved
//
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential

use crate::{
    error::Error,
    modi::{ModInfoOverlay, Module},
    msf::{round_up_to_multiple, RawFile},
    struct_overlay,
    view::SourceView,
};
use static_assertions::const_assert;
use std::ffi::CStr;
use tracing::debug;

/// The DBI stream always lives at this fixed stream index.
pub const DBI_STREAM_INDEX: u32 = 3;

// https://llvm.org/docs/PDB/DbiStream.html#stream-header
struct_overlay!(pub DbiStreamHeader {
    [0x00] version: i32,
    [0x04] version_header: u32,
    [0x08] age: u32,
    [0x0C] global_stream_index: u16,
    [0x0E] build_number: u16,
    [0x10] public_stream_index: u16,
    [0x12] pdb_dll_version: u16,
    [0x14] sym_record_stream: u16,
    [0x16] pdb_dll_rbld: u16,
    [0x18] mod_info_size: u32,
    [0x1C] section_contribution_size: u32,
    [0x20] section_map_size: u32,
    [0x24] source_info_size: u32,
    [0x28] type_server_map_size: u32,
    [0x2C] mfc_type_server_index: u32,
    [0x30] optional_dbg_header_size: u32,
    [0x34] ec_substream_size: u32,
    [0x38] flags: u16,
    [0x3A] machine: u16,
    [0x3C] padding: u32,
});
const_assert!(DbiStreamHeader::size() == 0x40);

/// Read-only view of the DBI stream, used to enumerate modules and locate
/// their line-information streams.
#[derive(Debug)]
pub struct DbiStream<'s> {
    stream: SourceView<'s>,
}

impl<'s> DbiStream<'s> {
    /// Coalesce stream 3 and validate that the header and the module info
    /// substream are in bounds.
    pub fn new(raw: &RawFile<'s>) -> Result<Self, Error> {
        let stream = raw.create_coalesced_stream(DBI_STREAM_INDEX)?;
        let header = DbiStreamHeader::new(stream.as_slice()).ok_or_else(|| {
            Error::Parse(scroll::Error::Custom(
                "DBI stream too small for its header".to_string(),
            ))
        })?;
        let substream_end = DbiStreamHeader::size() + header.get_mod_info_size() as usize;
        if substream_end > stream.len() {
            return Err(Error::Parse(scroll::Error::Custom(format!(
                "DBI module info substream runs past the stream ({substream_end} > {})",
                stream.len()
            ))));
        }
        debug!(
            age = header.get_age(),
            machine = header.get_machine(),
            mod_info_size = header.get_mod_info_size(),
            "parsed DBI header"
        );
        Ok(Self { stream })
    }

    pub fn header(&self) -> DbiStreamHeader<'_> {
        // Bounds were checked at construction.
        DbiStreamHeader::new(self.stream.as_slice()).unwrap()
    }

    /// Yield every module record of the module info substream. Records are
    /// a fixed header plus two NUL-terminated names, 4-aligned; iteration
    /// must land exactly on the substream end.
    pub fn for_each_module<F>(&self, mut functor: F) -> Result<(), Error>
    where
        F: FnMut(&Module<'_>),
    {
        let bytes = self.stream.as_slice();
        let end = DbiStreamHeader::size() + self.header().get_mod_info_size() as usize;
        let mut offset = DbiStreamHeader::size();
        while offset < end {
            let record = &bytes[offset..end];
            let info =
                ModInfoOverlay::new(record).ok_or(Error::MalformedSubsection { offset, end })?;
            let names = &record[ModInfoOverlay::size()..];
            let name = CStr::from_bytes_until_nul(names)
                .map_err(|_| Error::MalformedSubsection { offset, end })?;
            let object_file_name = CStr::from_bytes_until_nul(&names[name.to_bytes().len() + 1..])
                .map_err(|_| Error::MalformedSubsection { offset, end })?;
            let consumed = ModInfoOverlay::size()
                + name.to_bytes_with_nul().len()
                + object_file_name.to_bytes_with_nul().len();
            functor(&Module {
                info,
                name,
                object_file_name,
            });
            offset = round_up_to_multiple(offset + consumed, 4);
        }
        if offset != end {
            return Err(Error::MalformedSubsection { offset, end });
        }
        Ok(())
    }
}
