// Copyright (C) Back Engineering Labs, Inc. - All Rights Reserved

use scroll::{Pwrite, LE};
use scrollview::msf::MAGIC;

pub const PAGE_SIZE: u32 = 0x200;

/// Builds a minimal MSF image page by page: SuperBlock on page 0, caller
/// chosen pages for the directory page list, the directory and every
/// stream.
pub struct ImageBuilder {
    page_size: u32,
    image: Vec<u8>,
    streams: Vec<(u32, Vec<u32>)>,
}

impl ImageBuilder {
    pub fn new(page_size: u32, num_pages: u32) -> Self {
        let mut image = vec![0u8; (page_size * num_pages) as usize];
        image[..32].copy_from_slice(MAGIC);
        image.pwrite_with::<u32>(page_size, 0x20, LE).unwrap();
        image.pwrite_with::<u32>(1, 0x24, LE).unwrap();
        image.pwrite_with::<u32>(num_pages, 0x28, LE).unwrap();
        Self {
            page_size,
            image,
            streams: Vec::new(),
        }
    }

    fn write_page(&mut self, page: u32, bytes: &[u8]) {
        let start = page as usize * self.page_size as usize;
        self.image[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Register a stream and scatter its bytes over the given pages.
    pub fn add_stream(&mut self, pages: &[u32], bytes: &[u8]) {
        for (nth, chunk) in bytes.chunks(self.page_size as usize).enumerate() {
            self.write_page(pages[nth], chunk);
        }
        self.streams.push((bytes.len() as u32, pages.to_vec()));
    }

    pub fn add_empty_stream(&mut self) {
        self.streams.push((0, Vec::new()));
    }

    /// Register a directory entry without writing any page content, for
    /// corrupt-directory tests.
    #[allow(dead_code)]
    pub fn add_stream_entry(&mut self, size: u32, pages: &[u32]) {
        self.streams.push((size, pages.to_vec()));
    }

    #[allow(dead_code)]
    pub fn add_absent_stream(&mut self) {
        self.streams.push((u32::MAX, Vec::new()));
    }

    /// Serialize the stream directory over `dir_pages`, write the directory
    /// page list at `dir_index_page` and return the finished image.
    pub fn finish(mut self, dir_index_page: u32, dir_pages: &[u32]) -> Vec<u8> {
        let mut dir = Vec::new();
        dir.extend_from_slice(&(self.streams.len() as u32).to_le_bytes());
        for (size, _) in &self.streams {
            dir.extend_from_slice(&size.to_le_bytes());
        }
        for (_, pages) in &self.streams {
            for page in pages {
                dir.extend_from_slice(&page.to_le_bytes());
            }
        }
        let chunks: Vec<Vec<u8>> = dir
            .chunks(self.page_size as usize)
            .map(|c| c.to_vec())
            .collect();
        for (nth, chunk) in chunks.iter().enumerate() {
            self.write_page(dir_pages[nth], chunk);
        }
        let mut offset = dir_index_page as usize * self.page_size as usize;
        for page in &dir_pages[..chunks.len()] {
            self.image.pwrite_with::<u32>(*page, offset, LE).unwrap();
            offset += 4;
        }
        self.image
            .pwrite_with::<u32>(dir.len() as u32, 0x2C, LE)
            .unwrap();
        self.image
            .pwrite_with::<u32>(dir_index_page, 0x34, LE)
            .unwrap();
        self.image
    }
}
