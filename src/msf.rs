// Copyright (C) Back Engineering Labs, Inc. - All Rights Reserved

use crate::{
    direct::DirectStream, directory::StreamDirectory, error::Error, pagelist::PageList,
    struct_overlay, view::SourceView,
};
use scroll::{Pread, LE};
use static_assertions::const_assert;
use tracing::debug;

/// Magic bytes of the PDB file format 7.0
pub const MAGIC: &[u8] = b"Microsoft C/C++ MSF 7.00\r\n\x1a\x44\x53\x00\x00\x00";
pub type PageNumber = u32;

/// How many pages are required to store N amount of bytes?
#[inline(always)]
pub fn pages_needed_to_store(bytes: u32, page_size: u32) -> u32 {
    // Widened so sizes near u32::MAX read out of a corrupt directory
    // cannot overflow the addition.
    ((bytes as u64 + (page_size as u64 - 1)) / page_size as u64) as u32
}

/// File offset at which a page begins.
#[inline(always)]
pub fn page_to_file_offset(page: PageNumber, page_size: u32) -> usize {
    page as usize * page_size as usize
}

/// Round `value` up to a multiple of `multiple`, which must be a power
/// of two. Idempotent on already-aligned values.
#[inline(always)]
pub fn round_up_to_multiple(value: usize, multiple: usize) -> usize {
    debug_assert!(multiple.is_power_of_two());
    (value + multiple - 1) & !(multiple - 1)
}

// https://llvm.org/docs/PDB/MsfFile.html
// struct SuperBlock {
//     char FileMagic[sizeof(Magic)];
//     ulittle32_t BlockSize;
//     ulittle32_t FreeBlockMapBlock;
//     ulittle32_t NumBlocks;
//     ulittle32_t NumDirectoryBytes;
//     ulittle32_t Unknown;
//     ulittle32_t BlockMapAddr;
// };
struct_overlay!(pub MsfHeader {
    // Must be equal to "Microsoft C / C++ MSF 7.00\\r\\n" followed by the bytes 1A 44 53 00 00 00.
    [0x00] magic: [u8; 32],
    // The page size of the internal file system. Valid values are 512, 1024, 2048, and 4096 bytes.
    [0x20] page_size: u32,
    // The index of a page holding the free page bitfield. Can only be 1 or 2.
    [0x24] free_page_map: u32,
    // The total number of pages in the file. num_pages * page_size should equal the file size.
    [0x28] num_pages: u32,
    // The size of the stream directory, in bytes.
    [0x2C] stream_dir_size: u32,
    [0x30] unknown: u32,
    // The page at which an array of ulittle32_t's lists the pages the stream
    // directory resides on. The array has pages_needed_to_store(stream_dir_size)
    // entries, and the directory is stitched together from those pages.
    [0x34] stream_block_map: u32,
});

const_assert!(MsfHeader::size() == 0x38);

impl<'a> MsfHeader<'a> {
    /// Validates the magic bytes and the page size in the header.
    pub fn from(bytes: &'a [u8]) -> Result<Self, Error> {
        let header = Self::new(bytes).ok_or(Error::ImageTooSmall(bytes.len()))?;
        if header.get_magic() != MAGIC {
            return Err(Error::InvalidMagic);
        }
        match header.get_page_size() {
            512 | 1024 | 2048 | 4096 => Ok(header),
            other => Err(Error::InvalidPageSize(other)),
        }
    }

    /// How many pages are required to store N amount of bytes?
    #[inline(always)]
    pub fn pages_needed_to_store(&self, bytes: u32) -> u32 {
        pages_needed_to_store(bytes, self.get_page_size())
    }

    /// File offset of the page holding the stream directory's page list.
    #[inline(always)]
    pub fn stream_block_map(&self) -> usize {
        page_to_file_offset(self.get_stream_block_map(), self.get_page_size())
    }
}

/// Read-only aggregate over a PDB/MSF image. Parses the SuperBlock and the
/// stream directory once, then hands out per-stream views on demand.
///
/// The image is borrowed for the whole lifetime of the `RawFile`; nothing is
/// mutated after construction, so shared reads across threads are fine.
#[derive(Debug)]
pub struct RawFile<'s> {
    image: &'s [u8],
    header: MsfHeader<'s>,
    directory: StreamDirectory<'s>,
}

impl<'s> RawFile<'s> {
    /// Parse the SuperBlock and stream directory out of a memory-mapped
    /// image. Mapping the file is the caller's concern.
    pub fn open(image: &'s [u8]) -> Result<Self, Error> {
        let header = MsfHeader::from(image)?;
        let page_size = header.get_page_size();
        if image.len() < page_size as usize {
            return Err(Error::ImageTooSmall(image.len()));
        }
        debug!(
            page_size,
            num_pages = header.get_num_pages(),
            stream_dir_size = header.get_stream_dir_size(),
            "opening MSF image"
        );
        // The directory's page list must itself fit on the single page that
        // the header points at.
        let dir_page_count = header.pages_needed_to_store(header.get_stream_dir_size());
        if dir_page_count as usize * 4 > page_size as usize {
            return Err(Error::DirectoryTooLarge(dir_page_count, page_size));
        }
        let map_offset = header.stream_block_map();
        if map_offset + page_size as usize > image.len() {
            return Err(Error::PageOutOfRange(
                header.get_stream_block_map(),
                header.get_num_pages(),
            ));
        }
        // Read the page numbers the stream directory lives on, then map it
        // to a linear sequence of bytes with a known size.
        let stream_block_map = &image[map_offset..];
        let mut offset = 0;
        let mut pages = PageList::new(page_size);
        for _ in 0..dir_page_count {
            pages.push(stream_block_map.gread_with::<u32>(&mut offset, LE)?);
        }
        let view = SourceView::coalesce(image, &pages, header.get_stream_dir_size() as usize)?;
        let directory = StreamDirectory::parse(view, &header)?;
        debug!(streams = directory.stream_count(), "parsed stream directory");
        Ok(Self {
            image,
            header,
            directory,
        })
    }

    #[inline(always)]
    pub fn header(&self) -> &MsfHeader<'s> {
        &self.header
    }

    #[inline(always)]
    pub fn directory(&self) -> &StreamDirectory<'s> {
        &self.directory
    }

    #[inline(always)]
    pub fn stream_count(&self) -> u32 {
        self.directory.stream_count()
    }

    #[inline(always)]
    pub fn is_valid_stream_index(&self, index: u32) -> bool {
        index < self.stream_count()
    }

    /// Byte size of a stream; absent streams read as empty.
    ///
    /// The index must be valid.
    #[inline(always)]
    pub fn stream_size(&self, index: u32) -> u32 {
        debug_assert!(self.is_valid_stream_index(index));
        self.directory
            .stream(index)
            .map(|info| info.size())
            .unwrap_or(0)
    }

    /// Lazy random-access view of a stream. The view borrows this
    /// `RawFile`'s page tables and performs no copies.
    pub fn create_direct_stream(&self, index: u32) -> Result<DirectStream<'_>, Error> {
        let info = self.directory.stream(index)?;
        Ok(DirectStream::new(
            self.image,
            self.header.get_page_size(),
            &info.pages().pfns,
            info.size(),
        ))
    }

    /// Like [`Self::create_direct_stream`] but presenting only the first
    /// `size` bytes. `size` must not exceed the stream's size.
    pub fn create_direct_stream_with_size(
        &self,
        index: u32,
        size: u32,
    ) -> Result<DirectStream<'_>, Error> {
        let info = self.directory.stream(index)?;
        debug_assert!(size <= info.size(), "invalid stream size");
        Ok(DirectStream::new(
            self.image,
            self.header.get_page_size(),
            &info.pages().pfns,
            std::cmp::min(size, info.size()),
        ))
    }

    /// Contiguous view of a stream, borrowing the image when its pages are
    /// contiguous and copying otherwise. The view is independent of this
    /// `RawFile` and may outlive it.
    pub fn create_coalesced_stream(&self, index: u32) -> Result<SourceView<'s>, Error> {
        let info = self.directory.stream(index)?;
        SourceView::coalesce(self.image, info.pages(), info.size() as usize)
    }

    /// Like [`Self::create_coalesced_stream`] but presenting only the first
    /// `size` bytes. `size` must not exceed the stream's size.
    pub fn create_coalesced_stream_with_size(
        &self,
        index: u32,
        size: u32,
    ) -> Result<SourceView<'s>, Error> {
        let info = self.directory.stream(index)?;
        debug_assert!(size <= info.size(), "invalid stream size");
        let size = std::cmp::min(size, info.size());
        SourceView::coalesce(self.image, info.pages(), size as usize)
    }
}
