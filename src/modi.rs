// Copyright (C) Back Engineering Labs, Inc. - All Rights Reserved
//
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// Read: https://llvm.org/docs/PDB/DbiStream.html#dbi-mod-info-substream

use std::ffi::CStr;

use crate::{
    directory::INVALID_STREAM_INDEX, error::Error, lines::ModuleLineStream, msf::RawFile,
    struct_overlay,
};
use static_assertions::const_assert;

// One fixed-size module record of the DBI module info substream. Two
// NUL-terminated names follow it, then padding up to the next 4-byte
// boundary.
struct_overlay!(pub ModInfoOverlay {
    [0x00] unused1: u32,
    // The module's first section contribution.
    [0x04] section: u16,
    [0x06] padding1: [u8; 2],
    [0x08] offset: i32,
    [0x0C] size: i32,
    [0x10] characteristics: u32,
    [0x14] module_index: u16,
    [0x16] padding2: [u8; 2],
    [0x18] data_crc: u32,
    [0x1C] reloc_crc: u32,
    [0x20] flags: u16,
    // Stream holding this module's symbols and line information, or
    // 0xFFFF for none.
    [0x22] module_sym_stream: u16,
    [0x24] sym_byte_size: u32,
    [0x28] c11_byte_size: u32,
    [0x2C] c13_byte_size: u32,
    [0x30] source_file_count: u16,
    [0x32] padding3: [u8; 2],
    [0x34] unused2: u32,
    [0x38] source_file_name_index: u32,
    [0x3C] pdb_file_path_name_index: u32,
});
const_assert!(ModInfoOverlay::size() == 0x40);

/// One module as yielded by [`crate::dbi::DbiStream::for_each_module`].
#[derive(Debug)]
pub struct Module<'v> {
    pub info: ModInfoOverlay<'v>,
    /// Module name, usually the path of the object file.
    pub name: &'v CStr,
    /// Object file name; for modules linked out of an archive this is the
    /// archive path and `name` is the member.
    pub object_file_name: &'v CStr,
}

impl Module<'_> {
    /// Whether this module carries C13 line information.
    pub fn has_line_info(&self) -> bool {
        self.info.get_module_sym_stream() != INVALID_STREAM_INDEX
            && self.info.get_c13_byte_size() != 0
    }

    /// Open the module's sym stream positioned at its C13 line information.
    /// The symbol and C11 substreams precede it; the trailing global-refs
    /// bytes are cut off by the truncated view.
    pub fn create_line_stream<'s>(&self, raw: &RawFile<'s>) -> Result<ModuleLineStream<'s>, Error> {
        debug_assert!(self.has_line_info());
        let c13_offset = self.info.get_sym_byte_size() + self.info.get_c11_byte_size();
        let size = c13_offset + self.info.get_c13_byte_size();
        ModuleLineStream::new(
            raw,
            self.info.get_module_sym_stream() as u32,
            size,
            c13_offset as usize,
        )
    }
}
