//! Entry decompression with truncation tolerance
//!
//! Order of attempts for deflate entries:
//! 1. raw deflate over the whole range (the ZIP encoding)
//! 2. zlib-wrapped deflate (some producers mis-encode)
//! 3. probing: strip 0..N leading bytes and cut the tail in decreasing
//!    steps, re-running raw deflate, until one probe inflates or the
//!    probe budget runs out
//!
//! A stream that ends cleanly without its final block is a truncated prefix
//! and counts as a successful inflate (`complete == false`).

use flate2::{Decompress, FlushDecompress, Status};
use tracing::{debug, trace};

use super::types::CompressionMethod;
use crate::config::RepairConfig;
use crate::error::{DecodeError, DecodeFailure};

/// Output growth step when the declared size is unknown or wrong
const GROWTH_CHUNK: usize = 64 * 1024;

/// Bytes produced by a successful decompression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inflated {
    pub data: Vec<u8>,
    /// The stream reached its final block
    pub complete: bool,
    /// Leading bytes stripped by the probe that succeeded
    pub skipped: usize,
    /// Probe attempts spent after the raw and zlib attempts
    pub probes: usize,
}

impl Inflated {
    fn full(data: Vec<u8>) -> Self {
        Self { data, complete: true, skipped: 0, probes: 0 }
    }
}

/// Limits for the probing phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeLimits {
    pub budget: usize,
    pub max_leading_skip: usize,
    pub trailing_steps: usize,
    pub max_output: usize,
}

impl Default for ProbeLimits {
    fn default() -> Self {
        ProbeLimits::from(&RepairConfig::default())
    }
}

impl From<&RepairConfig> for ProbeLimits {
    fn from(config: &RepairConfig) -> Self {
        Self {
            budget: config.probe_budget,
            max_leading_skip: config.max_leading_skip,
            trailing_steps: config.trailing_steps,
            max_output: config.max_inflated_size,
        }
    }
}

/// Result of one inflate pass
#[derive(Debug)]
enum Pass {
    /// Final block reached
    Complete(Vec<u8>),
    /// Input ran out cleanly before the final block
    Truncated(Vec<u8>),
    /// Invalid data; holds whatever was produced before the error
    Corrupt(Vec<u8>),
    TooLarge,
}

/// Decompress with default limits
pub fn decompress(bytes: &[u8], method: CompressionMethod) -> Result<Inflated, DecodeError> {
    decompress_with(bytes, method, None, &ProbeLimits::default())
}

/// Decompress one entry's data
///
/// `size_hint` is the declared uncompressed size; it only sizes the output
/// buffer and is never trusted as a bound.
pub fn decompress_with(
    bytes: &[u8],
    method: CompressionMethod,
    size_hint: Option<u64>,
    limits: &ProbeLimits,
) -> Result<Inflated, DecodeError> {
    match method {
        CompressionMethod::Store => Ok(Inflated::full(bytes.to_vec())),
        CompressionMethod::Deflate => inflate_entry(bytes, size_hint, limits),
        CompressionMethod::Unknown(code) => {
            Err(DecodeError::new(DecodeFailure::UnsupportedMethod(code)))
        }
    }
}

fn inflate_entry(
    bytes: &[u8],
    size_hint: Option<u64>,
    limits: &ProbeLimits,
) -> Result<Inflated, DecodeError> {
    let capacity = initial_capacity(bytes.len(), size_hint, limits.max_output);

    let mut best_partial: Vec<u8> = Vec::new();

    match inflate_pass(bytes, false, capacity, limits.max_output) {
        Pass::Complete(data) => return Ok(Inflated::full(data)),
        Pass::Truncated(data) if !data.is_empty() => {
            // Clean truncation: probing can only yield shorter prefixes
            debug!(len = bytes.len(), out = data.len(), "Raw deflate stream is truncated");
            return Ok(Inflated { data, complete: false, skipped: 0, probes: 0 });
        }
        Pass::Truncated(_) => {}
        Pass::Corrupt(data) => keep_longer(&mut best_partial, data),
        Pass::TooLarge => return Err(DecodeError::new(DecodeFailure::OutputLimit(limits.max_output))),
    }

    match inflate_pass(bytes, true, capacity, limits.max_output) {
        Pass::Complete(data) => {
            debug!(len = bytes.len(), "Recovered zlib-wrapped entry");
            return Ok(Inflated::full(data));
        }
        Pass::Truncated(data) if !data.is_empty() => {
            return Ok(Inflated { data, complete: false, skipped: 0, probes: 0 });
        }
        Pass::TooLarge => return Err(DecodeError::new(DecodeFailure::OutputLimit(limits.max_output))),
        _ => {}
    }

    let mut probes = 0usize;
    let max_skip = limits.max_leading_skip.min(bytes.len().saturating_sub(1));

    'probing: for skip in 0..=max_skip {
        let available = bytes.len() - skip;
        for keep in trailing_cuts(available, limits.trailing_steps) {
            // Whole-range raw pass already done above
            if skip == 0 && keep == available {
                continue;
            }
            if probes >= limits.budget {
                break 'probing;
            }
            probes += 1;

            let window = &bytes[skip..skip + keep];
            match inflate_pass(window, false, capacity, limits.max_output) {
                Pass::Complete(data) => {
                    debug!(skip, keep, probes, "Probe inflated a complete stream");
                    return Ok(Inflated { data, complete: true, skipped: skip, probes });
                }
                Pass::Truncated(data) if !data.is_empty() => {
                    debug!(skip, keep, probes, out = data.len(), "Probe recovered a truncated prefix");
                    return Ok(Inflated { data, complete: false, skipped: skip, probes });
                }
                Pass::Corrupt(data) if skip == 0 => keep_longer(&mut best_partial, data),
                _ => {}
            }
        }
    }

    if !best_partial.is_empty() {
        debug!(out = best_partial.len(), probes, "Falling back to output produced before corruption");
        return Ok(Inflated { data: best_partial, complete: false, skipped: 0, probes });
    }

    trace!(len = bytes.len(), probes, "Deflate probing exhausted");
    Err(DecodeError::new(DecodeFailure::Exhausted))
}

/// Window lengths to try for one leading offset, longest first
fn trailing_cuts(available: usize, steps: usize) -> impl Iterator<Item = usize> {
    let step = (available / steps.max(1)).max(1);
    (0..=steps)
        .map(move |i| available.saturating_sub(i * step))
        .take_while(|&keep| keep > 0)
}

fn initial_capacity(input_len: usize, size_hint: Option<u64>, max_output: usize) -> usize {
    let guess = match size_hint {
        Some(size) if size > 0 => usize::try_from(size).unwrap_or(max_output),
        _ => input_len.saturating_mul(4),
    };
    guess.clamp(64, max_output.max(64)).min(GROWTH_CHUNK * 16)
}

fn keep_longer(best: &mut Vec<u8>, candidate: Vec<u8>) {
    if candidate.len() > best.len() {
        *best = candidate;
    }
}

/// Run one inflate pass over `input`
fn inflate_pass(input: &[u8], zlib: bool, capacity: usize, max_output: usize) -> Pass {
    let mut decoder = Decompress::new(zlib);
    let mut out: Vec<u8> = Vec::with_capacity(capacity);

    loop {
        if out.len() == out.capacity() {
            if out.len() >= max_output {
                return Pass::TooLarge;
            }
            let extra = GROWTH_CHUNK.max(out.len() / 2).min(max_output - out.len());
            out.reserve_exact(extra);
        }

        let consumed = decoder.total_in() as usize;
        let produced = decoder.total_out();
        let remaining = &input[consumed.min(input.len())..];

        match decoder.decompress_vec(remaining, &mut out, FlushDecompress::None) {
            Ok(Status::StreamEnd) => return Pass::Complete(out),
            Ok(Status::Ok) | Ok(Status::BufError) => {
                let progressed = decoder.total_in() as usize != consumed
                    || decoder.total_out() != produced;
                if !progressed {
                    if decoder.total_in() as usize >= input.len() {
                        return Pass::Truncated(out);
                    }
                    // Output space available, input left, no progress
                    return Pass::Corrupt(out);
                }
            }
            Err(_) => return Pass::Corrupt(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn sample_text() -> Vec<u8> {
        crate::test_support::long_paragraphs(120).join("\n").into_bytes()
    }

    fn raw_deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib_deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_store_is_identity() {
        let out = decompress(b"plain bytes", CompressionMethod::Store).unwrap();
        assert_eq!(out.data, b"plain bytes");
        assert!(out.complete);
    }

    #[test]
    fn test_unknown_method_fails_immediately() {
        let err = decompress(b"anything", CompressionMethod::Unknown(14)).unwrap_err();
        assert_eq!(err.reason, DecodeFailure::UnsupportedMethod(14));
    }

    #[test]
    fn test_raw_deflate_round_trip() {
        let text = sample_text();
        let out = decompress(&raw_deflate(&text), CompressionMethod::Deflate).unwrap();
        assert_eq!(out.data, text);
        assert!(out.complete);
        assert_eq!(out.probes, 0);
    }

    #[test]
    fn test_zlib_wrapped_fallback() {
        let text = sample_text();
        let out = decompress(&zlib_deflate(&text), CompressionMethod::Deflate).unwrap();
        assert_eq!(out.data, text);
        assert!(out.complete);
    }

    #[test]
    fn test_truncated_stream_yields_prefix() {
        let text = sample_text();
        let compressed = raw_deflate(&text);
        let cut = &compressed[..compressed.len() - 200];

        let out = decompress(cut, CompressionMethod::Deflate).unwrap();
        assert!(!out.complete);
        assert!(!out.data.is_empty());
        assert!(text.starts_with(&out.data));
    }

    #[test]
    fn test_leading_garbage_is_stripped() {
        let text = sample_text();
        let mut damaged = vec![0xFFu8, 0xFF, 0xFF];
        damaged.extend(raw_deflate(&text));

        let out = decompress(&damaged, CompressionMethod::Deflate).unwrap();
        assert!(!out.data.is_empty());
        if out.complete {
            assert_eq!(out.data, text);
        }
    }

    #[test]
    fn test_probe_budget_is_respected() {
        let limits = ProbeLimits { budget: 5, ..ProbeLimits::default() };
        let garbage = vec![0xFFu8; 64];

        match decompress_with(&garbage, CompressionMethod::Deflate, None, &limits) {
            Ok(out) => assert!(out.probes <= 5),
            Err(err) => assert_eq!(err.reason, DecodeFailure::Exhausted),
        }
    }

    #[test]
    fn test_empty_input_is_exhausted() {
        let err = decompress(&[], CompressionMethod::Deflate).unwrap_err();
        assert_eq!(err.reason, DecodeFailure::Exhausted);
    }

    #[test]
    fn test_output_limit() {
        let zeros = vec![0u8; 1024 * 1024];
        let limits = ProbeLimits { max_output: 4096, ..ProbeLimits::default() };

        let err = decompress_with(&raw_deflate(&zeros), CompressionMethod::Deflate, None, &limits)
            .unwrap_err();
        assert_eq!(err.reason, DecodeFailure::OutputLimit(4096));
    }

    #[test]
    fn test_trailing_cuts_decrease() {
        let cuts: Vec<usize> = trailing_cuts(100, 4).collect();
        assert_eq!(cuts, vec![100, 75, 50, 25]);
        assert_eq!(trailing_cuts(3, 16).collect::<Vec<_>>(), vec![3, 2, 1]);
    }
}
