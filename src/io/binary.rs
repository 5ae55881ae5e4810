//! Native self-describing array format.
//!
//! ```text
//! magic "AIOB" | version u8 | dtype u8 | ndim u8 | reserved u8 | ndim x u64 extents | payload
//! ```
//!
//! Everything is little endian; the payload is row-major with complex
//! values interleaved as (re, im).

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::core::array::{ArrayData, ElementType, TypeInfo, MAX_DIM};
use crate::error::{Error, Result};
use crate::io::codec::Codec;

const MAGIC: &[u8; 4] = b"AIOB";
const VERSION: u8 = 1;

/// Codec for the native `.bin` format
#[derive(Debug, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    /// Creates the codec
    pub fn new() -> Self {
        Self
    }

    fn read_header<R: Read>(&self, reader: &mut R, path: &Path) -> Result<TypeInfo> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::Format(format!("{} is not an arrayio binary file", path.display())));
        }
        let version = reader.read_u8()?;
        if version != VERSION {
            return Err(Error::Format(format!(
                "{}: unsupported format version {}",
                path.display(),
                version
            )));
        }
        let code = reader.read_u8()?;
        let dtype = ElementType::from_code(code)
            .ok_or_else(|| Error::Format(format!("{}: unknown element type code {}", path.display(), code)))?;
        let ndim = reader.read_u8()? as usize;
        let _reserved = reader.read_u8()?;
        if ndim == 0 || ndim > MAX_DIM {
            return Err(Error::Dimension { got: ndim, max: MAX_DIM });
        }
        let mut shape = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            let extent = reader.read_u64::<LittleEndian>()?;
            let extent = usize::try_from(extent)
                .map_err(|_| Error::Format(format!("{}: extent {} too large", path.display(), extent)))?;
            shape.push(extent);
        }
        TypeInfo::new(dtype, shape).map_err(|e| Error::Format(format!("{}: {}", path.display(), e)))
    }

    fn header_len(info: &TypeInfo) -> u64 {
        8 + 8 * info.ndim() as u64
    }
}

impl Codec for BinaryCodec {
    fn name(&self) -> &str {
        "arrayio.binary"
    }

    fn extensions(&self) -> &[&'static str] {
        &[".bin"]
    }

    fn peek(&self, path: &Path) -> Result<TypeInfo> {
        let mut reader = BufReader::new(File::open(path)?);
        self.read_header(&mut reader, path)
    }

    fn load(&self, path: &Path) -> Result<ArrayData> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let info = self.read_header(&mut reader, path)?;

        let payload_size = file_size.saturating_sub(Self::header_len(&info));
        if payload_size != info.buffer_size() as u64 {
            return Err(Error::Format(format!(
                "{}: header declares {} bytes of {} data, file holds {}",
                path.display(),
                info.buffer_size(),
                info,
                payload_size
            )));
        }
        let mut payload = Vec::with_capacity(info.buffer_size());
        reader.read_to_end(&mut payload)?;
        log::debug!("Loaded {} from {}", info, path.display());
        ArrayData::from_le_bytes(&info, &payload)
    }

    fn save(&self, path: &Path, data: &ArrayData) -> Result<()> {
        let info = data.type_info();
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        writer.write_u8(VERSION)?;
        writer.write_u8(info.dtype.code())?;
        writer.write_u8(info.ndim() as u8)?;
        writer.write_u8(0)?;
        for &extent in &info.shape {
            writer.write_u64::<LittleEndian>(extent as u64)?;
        }
        writer.write_all(&data.to_le_bytes())?;
        writer.flush()?;
        log::debug!("Saved {} to {}", info, path.display());
        Ok(())
    }
}
