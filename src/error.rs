// Copyright (C) Back Engineering Labs, Inc. - All Rights Reserved

use thiserror::Error;

/// Everything that can go wrong while opening an MSF image or walking
/// its streams. Each variant carries the offending offset, index or page
/// so corrupt files can be diagnosed.
#[derive(Error, Debug)]
pub enum Error {
    #[error("image of {0} bytes is too small to hold an MSF header")]
    ImageTooSmall(usize),

    #[error("MSF magic mismatch, not a PDB file")]
    InvalidMagic,

    #[error("invalid page size {0}, must be 512, 1024, 2048 or 4096")]
    InvalidPageSize(u32),

    #[error("page {0} is out of range, the image holds {1} pages")]
    PageOutOfRange(u32, u32),

    #[error("stream directory spans {0} pages, its page list does not fit a single {1} byte page")]
    DirectoryTooLarge(u32, u32),

    #[error("stream index {0} is out of range, the directory holds {1} streams")]
    InvalidStreamIndex(u32, u32),

    #[error("substream iteration ended at offset {offset}, expected {end}")]
    MalformedSubsection { offset: usize, end: usize },

    #[error("malformed stream data: {0}")]
    Parse(#[from] scroll::Error),
}
