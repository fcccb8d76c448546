//! The decode seam.  Turning image bytes into pixels happens outside this
//! crate; a [`Decoder`] is whatever the caller plugs in.

use std::time::Instant;

use crate::metrics::ReadObserver;
use crate::reader::{RawRecord, ReadError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub trait Decoder: Send + Sync {
    type Output: Send;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Output, BoxError>;
}

/// Returns the record bytes unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl Decoder for RawDecoder {
    type Output = Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, BoxError> {
        Ok(bytes.to_vec())
    }
}

/// What to do with a batch when one of its records fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Fail the whole batch.
    #[default]
    Abort,
    /// Drop the record together with its label and keep going.
    Skip,
}

/// Where a batch came from, for error tagging.
#[derive(Debug, Clone, Copy)]
pub struct BatchOrigin<'a> {
    pub group:      &'a str,
    pub pack_index: usize,
}

/// Decode `records` in order, pairing each sample with its class index.
pub fn decode_records<D: Decoder + ?Sized>(
    records:  Vec<RawRecord>,
    decoder:  &D,
    origin:   BatchOrigin<'_>,
    policy:   DecodePolicy,
    observer: &dyn ReadObserver,
) -> Result<Vec<(D::Output, usize)>, ReadError> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let started = Instant::now();
        let decoded = decoder.decode(&record.bytes);
        observer.on_decode(&record.record_id, started.elapsed());

        match decoded {
            Ok(sample) => out.push((sample, record.class_index)),
            Err(source) => {
                if policy == DecodePolicy::Skip {
                    tracing::warn!(
                        group = origin.group,
                        pack = origin.pack_index,
                        record = %record.record_id,
                        error = %source,
                        "skipping undecodable record"
                    );
                    continue;
                }
                return Err(ReadError::Decode {
                    group:      origin.group.to_owned(),
                    pack_index: origin.pack_index,
                    record_id:  record.record_id,
                    source,
                });
            }
        }
    }
    Ok(out)
}
