// Copyright (C) Back Engineering Labs, Inc. - All Rights Reserved
//
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// Read: https://llvm.org/docs/PDB/ModiStream.html#the-c13-line-information-substream

use crate::{
    error::Error,
    msf::{round_up_to_multiple, RawFile},
    struct_overlay,
    view::SourceView,
};
use static_assertions::const_assert;

/// DEBUG_S_SUBSECTION_TYPE, the C13 debug subsection kinds.
pub const S_SYMBOLS: u32 = 0xF1;
pub const S_LINES: u32 = 0xF2;
pub const S_STRINGTABLE: u32 = 0xF3;
pub const S_FILECHECKSUMS: u32 = 0xF4;
pub const S_FRAMEDATA: u32 = 0xF5;
pub const S_INLINEELINES: u32 = 0xF6;
/// High bit set means the linker should ignore the subsection.
pub const S_IGNORE: u32 = 0x8000_0000;

/// CHKSUM_TYPE, the file checksum kinds.
pub const CHKSUM_NONE: u8 = 0;
pub const CHKSUM_MD5: u8 = 1;
pub const CHKSUM_SHA1: u8 = 2;
pub const CHKSUM_SHA256: u8 = 3;

// Every C13 subsection starts with this header; the body of `size` bytes
// follows and the next subsection starts at the next 4-byte boundary.
struct_overlay!(pub DebugSubsectionHeader {
    [0x00] kind: u32,
    [0x04] size: u32,
});
const_assert!(DebugSubsectionHeader::size() == 0x08);

// Body header of an S_LINES subsection.
struct_overlay!(pub LinesHeader {
    [0x00] section_offset: u32,
    [0x04] section: u16,
    [0x06] flags: u16,
    [0x08] code_size: u32,
});
const_assert!(LinesHeader::size() == 0x0C);

// One block of line records inside an S_LINES subsection. `size` includes
// this header and the records that follow it.
struct_overlay!(pub LinesFileBlockHeader {
    [0x00] file_checksum_offset: u32,
    [0x04] num_lines: u32,
    [0x08] size: u32,
});
const_assert!(LinesFileBlockHeader::size() == 0x0C);

// One entry of an S_FILECHECKSUMS subsection, followed by `checksum_size`
// checksum bytes and padded to 4 bytes.
struct_overlay!(pub FileChecksumHeader {
    [0x00] filename_offset: u32,
    [0x04] checksum_size: u8,
    [0x05] checksum_kind: u8,
});
const_assert!(FileChecksumHeader::size() == 0x06);

/// One C13 subsection as yielded by [`ModuleLineStream::for_each_section`]:
/// its header fields plus the stream offset it starts at, which is what the
/// per-kind walkers resume from.
#[derive(Debug, Clone, Copy)]
pub struct LineSection {
    pub kind: u32,
    pub size: u32,
    /// Stream offset of the subsection header.
    pub offset: usize,
}

impl LineSection {
    /// Stream offset one past the subsection body, rounded to 4.
    #[inline(always)]
    fn end(&self) -> usize {
        round_up_to_multiple(
            self.offset + DebugSubsectionHeader::size() + self.size as usize,
            4,
        )
    }
}

/// Walker over the C13 line-information substream of a module stream.
///
/// The module stream is coalesced once; the `for_each_*` methods then
/// iterate subsections, lines blocks and file checksums under the strict
/// 4-byte alignment rules of the format. Iteration that does not land
/// exactly on a computed boundary reports [`Error::MalformedSubsection`]
/// instead of truncating silently.
#[derive(Debug)]
pub struct ModuleLineStream<'s> {
    stream: SourceView<'s>,
    c13_line_info_offset: usize,
}

impl<'s> ModuleLineStream<'s> {
    /// Coalesce the module stream and position the walker at the C13
    /// substream. Higher layers provide the offset out of the module's DBI
    /// record; see [`crate::modi::Module::create_line_stream`].
    pub fn new(
        raw: &RawFile<'s>,
        stream_index: u32,
        stream_size: u32,
        c13_line_info_offset: usize,
    ) -> Result<Self, Error> {
        let stream = raw.create_coalesced_stream_with_size(stream_index, stream_size)?;
        Ok(Self {
            stream,
            c13_line_info_offset,
        })
    }

    /// The coalesced module stream bytes.
    #[inline(always)]
    pub fn stream(&self) -> &SourceView<'s> {
        &self.stream
    }

    /// Yield every subsection in order. Every yielded section is fully
    /// bounded by the stream; a `size` running past the end of the stream
    /// is malformed input.
    pub fn for_each_section<F>(&self, mut functor: F) -> Result<(), Error>
    where
        F: FnMut(&LineSection),
    {
        let bytes = self.stream.as_slice();
        let mut offset = self.c13_line_info_offset;
        while offset < bytes.len() {
            let header = bytes
                .get(offset..)
                .and_then(DebugSubsectionHeader::new)
                .ok_or(Error::MalformedSubsection {
                    offset,
                    end: bytes.len(),
                })?;
            let section = LineSection {
                kind: header.get_kind(),
                size: header.get_size(),
                offset,
            };
            if offset + DebugSubsectionHeader::size() + section.size as usize > bytes.len() {
                return Err(Error::MalformedSubsection {
                    offset,
                    end: bytes.len(),
                });
            }
            functor(&section);
            offset = section.end();
        }
        Ok(())
    }

    /// Yield every lines block of an `S_LINES` subsection together with its
    /// raw line records. Iteration must terminate exactly at the subsection
    /// end; anything else indicates a malformed stream.
    pub fn for_each_lines_block<F>(&self, section: &LineSection, mut functor: F) -> Result<(), Error>
    where
        F: FnMut(&LinesFileBlockHeader<'_>, &[u8]),
    {
        debug_assert!(section.kind == S_LINES, "subsection kind is not S_LINES");
        let bytes = self.stream.as_slice();
        let end = section.end();
        // Blocks must stay inside the unpadded subsection body.
        let body_end = std::cmp::min(
            section.offset + DebugSubsectionHeader::size() + section.size as usize,
            bytes.len(),
        );
        let mut offset = round_up_to_multiple(
            section.offset + DebugSubsectionHeader::size() + LinesHeader::size(),
            4,
        );
        while offset < end {
            let block = bytes
                .get(offset..)
                .and_then(LinesFileBlockHeader::new)
                .ok_or(Error::MalformedSubsection { offset, end })?;
            let block_size = block.get_size() as usize;
            // A block that claims less than its own header or runs past the
            // subsection would never terminate at `end`.
            if block_size < LinesFileBlockHeader::size() || offset + block_size > body_end {
                return Err(Error::MalformedSubsection { offset, end });
            }
            let records = &bytes[offset + LinesFileBlockHeader::size()..offset + block_size];
            functor(&block, records);
            offset = round_up_to_multiple(offset + block_size, 4);
        }
        if offset != end {
            return Err(Error::MalformedSubsection { offset, end });
        }
        Ok(())
    }

    /// Yield every checksum entry of an `S_FILECHECKSUMS` subsection
    /// together with its checksum bytes. Termination is checked the same
    /// way as for lines blocks.
    pub fn for_each_file_checksum<F>(
        &self,
        section: &LineSection,
        mut functor: F,
    ) -> Result<(), Error>
    where
        F: FnMut(&FileChecksumHeader<'_>, &[u8]),
    {
        debug_assert!(
            section.kind == S_FILECHECKSUMS,
            "subsection kind is not S_FILECHECKSUMS"
        );
        let bytes = self.stream.as_slice();
        let end = section.end();
        let body_end = std::cmp::min(
            section.offset + DebugSubsectionHeader::size() + section.size as usize,
            bytes.len(),
        );
        let mut offset = round_up_to_multiple(section.offset + DebugSubsectionHeader::size(), 4);
        while offset < end {
            let header = bytes
                .get(offset..)
                .and_then(FileChecksumHeader::new)
                .ok_or(Error::MalformedSubsection { offset, end })?;
            let checksum_size = header.get_checksum_size() as usize;
            let checksum_start = offset + FileChecksumHeader::size();
            if checksum_start + checksum_size > body_end {
                return Err(Error::MalformedSubsection { offset, end });
            }
            let checksum = &bytes[checksum_start..checksum_start + checksum_size];
            functor(&header, checksum);
            offset = round_up_to_multiple(checksum_start + checksum_size, 4);
        }
        if offset != end {
            return Err(Error::MalformedSubsection { offset, end });
        }
        Ok(())
    }
}
