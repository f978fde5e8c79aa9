use std::{
    convert::TryInto,
    fs::{File, OpenOptions},
    io::{Cursor, Read, Seek, SeekFrom, Write},
    mem::size_of,
    path::Path,
};

use crate::{error::SmallError, types::SimpleResult};

/// A thin wrapper over a read/write/create file handle, offering
/// `Encodeable`/`Decodeable`-typed reads and writes on top of raw
/// `std::fs::File` operations.
pub struct SmallFile {
    file: File,
}

impl SmallFile {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self, SmallError> {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(file_path)?;

        Ok(Self { file })
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) -> SimpleResult {
        self.file.write_all(&obj.encode())?;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> SimpleResult {
        self.file.write_all(bytes)?;
        Ok(())
    }

    pub fn read<T: Decodeable>(&mut self) -> Result<T, SmallError> {
        let mut bytes = vec![0u8; size_of::<T>()];
        self.file.read_exact(&mut bytes)?;
        let mut reader = Cursor::new(bytes);
        Ok(T::decode_from(&mut reader))
    }

    pub fn read_exact_bytes(&mut self, n: usize) -> Result<Vec<u8>, SmallError> {
        let mut buf = vec![0u8; n];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn get_size(&self) -> Result<u64, SmallError> {
        Ok(self.file.metadata()?.len())
    }

    pub fn get_current_position(&mut self) -> Result<u64, SmallError> {
        Ok(self.file.seek(SeekFrom::Current(0))?)
    }

    pub fn set_len(&self, len: u64) -> SimpleResult {
        self.file.set_len(len)?;
        Ok(())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, SmallError> {
        Ok(self.file.seek(pos)?)
    }

    pub fn flush(&mut self) -> SimpleResult {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

pub fn read_into<T: Decodeable, R: Read>(reader: &mut R) -> T {
    T::decode_from(reader)
}

pub fn read_exact<R: Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .unwrap_or_else(|e| panic!("io error, expected {} bytes: {}", bytes_count, e));
    buffer
}

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable {
    fn decode_from<R: Read>(reader: &mut R) -> Self;
}

/// # Format
/// - 1 byte: size of the payload (range: 0 - 255)
/// - n bytes: payload
impl Encodeable for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(1 + self.len());
        buffer.push(self.len() as u8);
        buffer.extend_from_slice(self);
        buffer
    }
}

impl Decodeable for Vec<u8> {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let size = u8::from_le_bytes(read_exact(reader, 1).try_into().unwrap());
        read_exact(reader, size as usize)
    }
}

impl Encodeable for String {
    fn encode(&self) -> Vec<u8> {
        let bytes = self.as_bytes().to_vec();
        let mut buffer = Vec::with_capacity(1 + bytes.len());
        buffer.push(bytes.len() as u8);
        buffer.extend_from_slice(&bytes);
        buffer
    }
}

impl Decodeable for String {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let size = u8::from_le_bytes(read_exact(reader, 1).try_into().unwrap());
        let bytes = read_exact(reader, size as usize);
        String::from_utf8(bytes).unwrap()
    }
}

impl Encodeable for bool {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

impl Decodeable for bool {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        u8::decode_from(reader) == 1
    }
}

macro_rules! impl_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, size_of::<Self>());
                    Self::from_le_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_serialization!(for u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, isize, usize, f32, f64);
