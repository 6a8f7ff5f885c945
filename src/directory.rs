// Copyright (C) Back Engineering Labs, Inc. - All Rights Reserved

use crate::{error::Error, msf::MsfHeader, pagelist::PageList, view::SourceView};
use scroll::{Pread, LE};
use tracing::trace;

/// Sentinel stream size marking an absent/deleted stream. An absent stream
/// owns no pages and must never be dereferenced.
pub const INVALID_STREAM_SIZE: u32 = u32::MAX;
/// Sentinel stream index used by DBI records that point at no stream.
pub const INVALID_STREAM_INDEX: u16 = 0xFFFF;

/// Size and page locations of a single stream.
#[derive(Debug, Default)]
pub struct StreamInfo {
    /// Size as stored in the directory, sentinel included.
    size: u32,
    /// The pages backing the stream, in stream order.
    pages: PageList,
}

impl StreamInfo {
    /// The on-disk size field, which may be the absent sentinel.
    #[inline(always)]
    pub fn raw_size(&self) -> u32 {
        self.size
    }

    #[inline(always)]
    pub fn is_absent(&self) -> bool {
        self.size == INVALID_STREAM_SIZE
    }

    /// Byte size of the stream; absent streams read as empty.
    #[inline(always)]
    pub fn size(&self) -> u32 {
        if self.is_absent() {
            0
        } else {
            self.size
        }
    }

    #[inline(always)]
    pub fn pages(&self) -> &PageList {
        &self.pages
    }
}

/// The parsed stream directory:
///
/// ```text
/// uint32_t streamCount;
/// uint32_t streamSizes[streamCount];
/// uint32_t streamBlocks[streamCount][];
/// ```
///
/// Index into `streams` with the stream index.
#[derive(Debug)]
pub struct StreamDirectory<'s> {
    /// Linear mapping of the pages used for the StreamDirectory.
    pub view: SourceView<'s>,
    streams: Vec<StreamInfo>,
}

impl<'s> StreamDirectory<'s> {
    /// Lift the directory table out of its coalesced view. Page rows are
    /// concatenated without gaps; an absent stream consumes no entries.
    pub(crate) fn parse(view: SourceView<'s>, header: &MsfHeader<'_>) -> Result<Self, Error> {
        let buff = view.as_slice();
        let mut offset = 0;
        let num_streams = buff.gread_with::<u32>(&mut offset, LE)?;
        let mut streams = Vec::with_capacity(num_streams as usize);
        // Read all of the sizes for each stream.
        for _ in 0..num_streams {
            streams.push(StreamInfo {
                size: buff.gread_with::<u32>(&mut offset, LE)?,
                pages: PageList::new(header.get_page_size()),
            });
        }
        // Read the pages for each stream. Absent streams have no PFN's.
        let image_pages = header.get_num_pages();
        for (index, stream) in streams.iter_mut().enumerate() {
            if stream.is_absent() {
                continue;
            }
            let num_pages = header.pages_needed_to_store(stream.size);
            for _ in 0..num_pages {
                let pfn = buff.gread_with::<u32>(&mut offset, LE)?;
                if pfn >= image_pages {
                    return Err(Error::PageOutOfRange(pfn, image_pages));
                }
                stream.pages.push(pfn);
            }
            trace!(index, size = stream.size, pages = num_pages, "stream");
        }
        Ok(Self { view, streams })
    }

    #[inline(always)]
    pub fn stream_count(&self) -> u32 {
        self.streams.len() as u32
    }

    /// Info for a stream index, `InvalidStreamIndex` when out of range.
    pub fn stream(&self, index: u32) -> Result<&StreamInfo, Error> {
        self.streams
            .get(index as usize)
            .ok_or(Error::InvalidStreamIndex(index, self.stream_count()))
    }
}
