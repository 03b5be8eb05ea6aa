// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source capabilities — deferred access to stream and buffer inputs.
//
// A provider invokes a source exactly once per decode. Streams are dropped
// before the decode call returns.

use std::io::{self, Read};

/// Produces a fresh readable stream on demand.
pub trait StreamSource {
    fn open(&mut self) -> io::Result<Box<dyn Read>>;
}

impl<F, R> StreamSource for F
where
    F: FnMut() -> io::Result<R>,
    R: Read + 'static,
{
    fn open(&mut self) -> io::Result<Box<dyn Read>> {
        let stream = self()?;
        Ok(Box::new(stream))
    }
}

/// Produces the encoded image bytes on demand.
pub trait BufferSource {
    fn read(&mut self) -> io::Result<Vec<u8>>;
}

impl<F> BufferSource for F
where
    F: FnMut() -> io::Result<Vec<u8>>,
{
    fn read(&mut self) -> io::Result<Vec<u8>> {
        self()
    }
}
