// Copyright (C) 2025, 2026 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Page compression back ends

use super::{Compression, Error, PAGE_SIZE};

/// Compress one page with the given mode
///
/// Returns `None` whenever the page should be stored literally: the mode
/// is [`Compression::None`], the compressed form would not be smaller, or
/// the back end failed.
pub fn compress(mode: Compression, page: &[u8]) -> Option<Vec<u8>> {
    let packed = match mode {
        Compression::None => return None,
        #[cfg(feature = "zlib")]
        Compression::Zlib => {
            use std::io::Write;
            use tracing::warn;

            let mut encoder =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            let result = encoder.write_all(page).and_then(|()| encoder.finish());
            match result {
                Ok(packed) => packed,
                Err(err) => {
                    warn!(%err, "page compression failed, storing literally");
                    return None;
                }
            }
        }
        #[cfg(feature = "lz4")]
        Compression::Lz4 => lz4_flex::block::compress(page),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    (packed.len() < page.len()).then_some(packed)
}

/// Decompress a load-data block into exactly one page
pub fn decompress(
    mode: Compression,
    data: &[u8],
    index: usize,
) -> Result<Vec<u8>, Error> {
    let page = match mode {
        Compression::None => return Err(Error::UnsupportedCompression(mode as u32)),
        #[cfg(feature = "zlib")]
        Compression::Zlib => {
            use std::io::Read;

            let mut page = Vec::with_capacity(PAGE_SIZE);
            flate2::read::ZlibDecoder::new(data)
                .read_to_end(&mut page)
                .map_err(|_| Error::Decompress { index })?;
            page
        }
        #[cfg(feature = "lz4")]
        Compression::Lz4 => lz4_flex::block::decompress(data, PAGE_SIZE)
            .map_err(|_| Error::Decompress { index })?,
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedCompression(mode as u32)),
    };
    if page.len() != PAGE_SIZE {
        return Err(Error::BadPageSize {
            index,
            size: page.len(),
        });
    }
    Ok(page)
}
