/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Canonical binary encoding of a [`ReplayWindow`].
//!
//! ```text
//! bucket[0] .. bucket[num_buckets - 1]   (see below)
//! basetime                               8 bytes, big endian
//! center                                 8 bytes, big endian
//!
//! bucket := count                        varint
//!           count × (hash, mask)         hash: 32 bytes, mask: 8 bytes big endian,
//!                                        in ascending order of hash bytes
//! ```
//!
//! `varint` is big endian base 128: seven bits per byte, most significant group first, with the high
//! bit set on every byte but the last.
//!
//! The number of buckets is not encoded, so decoding needs to be told how many to expect.

use std::io::{self, Read, Write};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::CryptoHash;

use super::{
    mask::ReplayMask,
    window::{Bucket, ReplayWindow},
};

impl BorshSerialize for ReplayWindow {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for bucket in &self.buckets {
            write_varint(writer, bucket.len() as u64)?;
            // BTreeMap iterates in ascending key order.
            for (hash, mask) in bucket {
                hash.serialize(writer)?;
                writer.write_all(&mask.bits().to_be_bytes())?;
            }
        }
        writer.write_all(&self.basetime.to_be_bytes())?;
        writer.write_all(&self.center.to_be_bytes())
    }
}

impl ReplayWindow {
    pub(crate) fn deserialize_reader<R: Read>(
        num_buckets: usize,
        reader: &mut R,
    ) -> io::Result<ReplayWindow> {
        let mut window = ReplayWindow::new(num_buckets);
        for bucket in window.buckets.iter_mut() {
            *bucket = read_bucket(reader)?;
        }
        window.basetime = i64::from_be_bytes(read_array(reader)?);
        window.center = i64::from_be_bytes(read_array(reader)?);
        Ok(window)
    }
}

fn read_bucket<R: Read>(reader: &mut R) -> io::Result<Bucket> {
    let count = read_varint(reader)?;
    let mut bucket = Bucket::new();
    for _ in 0..count {
        let hash = CryptoHash::deserialize_reader(reader)?;
        let mask = ReplayMask::new(u64::from_be_bytes(read_array(reader)?));
        if bucket.insert(hash, mask).is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("hash {} appears twice in one bucket", hash),
            ));
        }
    }
    Ok(bucket)
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut bytes = [0u8; N];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn write_varint<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    let mut groups = Vec::with_capacity(10);
    let mut rest = value;
    loop {
        groups.push((rest & 0x7f) as u8);
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    let last = groups.len() - 1;
    let bytes: Vec<u8> = groups
        .iter()
        .rev()
        .enumerate()
        .map(|(i, group)| if i < last { group | 0x80 } else { *group })
        .collect();
    writer.write_all(&bytes)
}

fn read_varint<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut value: u64 = 0;
    loop {
        let [byte] = read_array::<R, 1>(reader)?;
        if value > u64::MAX >> 7 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "varint overflows 64 bits",
            ));
        }
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}
