// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Key-grouped reduction: collapses each run of equal adjacent keys into a
//! single value, preserving run order.
//!
//! The parallel path is a segmented inclusive scan: chunks scan locally,
//! a sequential pass threads run carries across chunk seams, and a second
//! fan-out folds the carries in while gathering the run ends.

use crate::policy::ExecutionPolicy;

/// Reduces `values` over runs of equal adjacent `keys` with `op`, comparing
/// over the shorter of the two lengths. Returns one key and one reduced
/// value per run, in input order. Keys are compared for adjacency only; two
/// separated runs of the same key stay separate.
///
/// ```
/// # use parstd::{reduce_by_key, Seq};
/// let keys = [1, 1, 2, 2, 2, 3];
/// let values = [10, 20, 30, 40, 50, 5];
/// let (out_keys, out_values) = reduce_by_key(Seq, &keys, &values, |a, b| a + b);
/// assert_eq!(out_keys, [1, 2, 3]);
/// assert_eq!(out_values, [30, 120, 5]);
/// ```
pub fn reduce_by_key<'data, K, V, P, F>(
    policy: P,
    keys: &'data [K],
    values: &'data [V],
    op: F,
) -> P::Result<(Vec<K>, Vec<V>)>
where
    K: Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
    P: ExecutionPolicy<'data>,
    F: Fn(&V, &V) -> V + Send + Sync + 'data,
{
    policy.execute(move |partitioner| {
        let n = keys.len().min(values.len());
        // Zero or one pairs never need the pipeline.
        if n <= 1 {
            return (
                keys[..n].to_vec(),
                values[..n].to_vec(),
            );
        }
        let Some(mut partitioner) = partitioner else {
            return seq_reduce(keys, values, n, &op);
        };

        let chunks = partitioner.chunk_ranges(n);

        // Chunk-local inclusive scans. Each chunk also reports the offset of
        // its first run head, if it contains one; a head is any index whose
        // key differs from its left neighbour (index 0 included).
        let locals = partitioner.run(n, |_, range| {
            let base = range.start;
            let mut scan: Vec<V> = Vec::with_capacity(range.len());
            let mut first_head = None;
            for i in range {
                let is_head = i == 0 || keys[i] != keys[i - 1];
                if is_head && first_head.is_none() {
                    first_head = Some(i - base);
                }
                let value = match scan.last() {
                    Some(prev) if !is_head && i > base => op(prev, &values[i]),
                    _ => values[i].clone(),
                };
                scan.push(value);
            }
            (scan, first_head)
        });

        // Carry propagation across chunk seams. A carry reaches a chunk when
        // its first element continues the previous chunk's last run, and it
        // flows through any chunk that contains no head at all.
        let mut carries: Vec<Option<V>> = Vec::with_capacity(chunks.len());
        carries.push(None);
        for c in 1..chunks.len() {
            let seam = chunks[c].start;
            let carry = if keys[seam] == keys[seam - 1] {
                let (scan, first_head) = &locals[c - 1];
                let tail = scan.last().cloned();
                match (&carries[c - 1], first_head) {
                    (Some(incoming), None) => tail.map(|t| op(incoming, &t)),
                    _ => tail,
                }
            } else {
                None
            };
            carries.push(carry);
        }

        // Carry application fused with the run-end gather.
        let chunks = &chunks[..];
        let locals = &locals[..];
        let carries = &carries[..];
        let gathered = partitioner.run(chunks.len(), |_, chunk_range| {
            let mut out: Vec<(K, V)> = Vec::new();
            for c in chunk_range {
                let base = chunks[c].start;
                let (scan, first_head) = &locals[c];
                let prefix_end = first_head.unwrap_or(scan.len());
                for (offset, value) in scan.iter().enumerate() {
                    let i = base + offset;
                    let is_end = i == n - 1 || keys[i + 1] != keys[i];
                    if !is_end {
                        continue;
                    }
                    let value = match &carries[c] {
                        Some(incoming) if offset < prefix_end => op(incoming, value),
                        _ => value.clone(),
                    };
                    out.push((keys[i].clone(), value));
                }
            }
            out
        });

        let total = gathered.iter().map(Vec::len).sum();
        let mut out_keys = Vec::with_capacity(total);
        let mut out_values = Vec::with_capacity(total);
        for (key, value) in gathered.into_iter().flatten() {
            out_keys.push(key);
            out_values.push(value);
        }
        (out_keys, out_values)
    })
}

fn seq_reduce<K, V>(
    keys: &[K],
    values: &[V],
    n: usize,
    op: &(impl Fn(&V, &V) -> V + ?Sized),
) -> (Vec<K>, Vec<V>)
where
    K: Eq + Clone,
    V: Clone,
{
    let mut out_keys = Vec::new();
    let mut out_values = Vec::new();
    for i in 0..n {
        if i > 0 && keys[i] == keys[i - 1] {
            let last = out_values.last_mut().unwrap();
            *last = op(last, &values[i]);
        } else {
            out_keys.push(keys[i].clone());
            out_values.push(values[i].clone());
        }
    }
    (out_keys, out_values)
}
