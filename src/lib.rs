// Copyright (C) Back Engineering Labs, Inc. - All Rights Reserved
//
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential

//! Read-only parser for the PDB/MSF container format.
//!
//! A PDB is a multi-stream file: fixed-size pages encoding a set of
//! logically contiguous byte streams. [`msf::RawFile`] parses the
//! SuperBlock and the stream directory out of a caller-supplied image and
//! hands out per-stream views, either lazy ([`direct::DirectStream`]) or
//! contiguous ([`view::SourceView`]). On top of that,
//! [`lines::ModuleLineStream`] walks the CodeView C13 line-information
//! subsections of a module stream, and [`dbi::DbiStream`] enumerates the
//! modules that own them.

pub mod dbi;
pub mod direct;
pub mod directory;
pub mod error;
pub mod lines;
pub mod modi;
pub mod msf;
pub mod overlays;
pub mod pagelist;
pub mod view;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
