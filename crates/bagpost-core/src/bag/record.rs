use super::time::RosTime;
use super::BagError;
use std::collections::BTreeMap;
use std::io::{Read, Write};

pub const MAGIC: &[u8] = b"#ROSBAG V2.0\n";

/// Header plus data of the bag header record, padded to this many bytes.
/// The two length prefixes come on top, so the record spans 4104 bytes and
/// the first chunk starts at offset 4117.
pub const BAG_HEADER_LENGTH: usize = 4096;

/// Bytes the bag header record occupies on disk, length prefixes included.
pub const BAG_HEADER_RECORD_LENGTH: usize = BAG_HEADER_LENGTH + 8;

/// Upper bound on a single header or data block; anything larger is corrupt.
const MAX_BLOCK_LEN: u32 = 1 << 30;

pub mod op {
    pub const MSG_DATA: u8 = 0x02;
    pub const BAG_HEADER: u8 = 0x03;
    pub const INDEX_DATA: u8 = 0x04;
    pub const CHUNK: u8 = 0x05;
    pub const CHUNK_INFO: u8 = 0x06;
    pub const CONNECTION: u8 = 0x07;
}

/// A record header: a set of `name=value` fields, each prefixed with its
/// little-endian u32 length. Field order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: BTreeMap<String, Vec<u8>>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, BagError> {
        let mut fields = BTreeMap::new();
        let mut pos = 0usize;

        while pos < bytes.len() {
            let len_bytes = bytes
                .get(pos..pos + 4)
                .ok_or_else(|| BagError::InvalidRecord("truncated header field length".into()))?;
            let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
                as usize;
            pos += 4;

            let field = bytes
                .get(pos..pos + len)
                .ok_or_else(|| BagError::InvalidRecord("truncated header field".into()))?;
            pos += len;

            let eq = field
                .iter()
                .position(|b| *b == b'=')
                .ok_or_else(|| BagError::InvalidRecord("header field without '='".into()))?;
            let name = String::from_utf8_lossy(&field[..eq]).into_owned();
            fields.insert(name, field[eq + 1..].to_vec());
        }

        Ok(Self { fields })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in &self.fields {
            let len = (name.len() + 1 + value.len()) as u32;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.push(b'=');
            out.extend_from_slice(value);
        }
        out
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Vec<u8>>) -> &mut Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Result<&[u8], BagError> {
        self.fields
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| BagError::MissingField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn op(&self) -> Result<u8, BagError> {
        match self.get("op")? {
            [code] => Ok(*code),
            other => Err(BagError::InvalidRecord(format!(
                "op field has {} bytes",
                other.len()
            ))),
        }
    }

    pub fn u32(&self, name: &str) -> Result<u32, BagError> {
        let bytes: [u8; 4] = self
            .get(name)?
            .try_into()
            .map_err(|_| BagError::InvalidRecord(format!("field '{}' is not 4 bytes", name)))?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn u64(&self, name: &str) -> Result<u64, BagError> {
        let bytes: [u8; 8] = self
            .get(name)?
            .try_into()
            .map_err(|_| BagError::InvalidRecord(format!("field '{}' is not 8 bytes", name)))?;
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn time(&self, name: &str) -> Result<RosTime, BagError> {
        let bytes: [u8; 8] = self
            .get(name)?
            .try_into()
            .map_err(|_| BagError::InvalidRecord(format!("field '{}' is not 8 bytes", name)))?;
        Ok(RosTime::from_bytes(bytes))
    }

    pub fn string(&self, name: &str) -> Result<String, BagError> {
        Ok(String::from_utf8_lossy(self.get(name)?).into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct Record {
    pub header: Header,
    pub data: Vec<u8>,
}

fn read_block<R: Read>(reader: &mut R) -> Result<Vec<u8>, BagError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_BLOCK_LEN {
        return Err(BagError::InvalidRecord(format!("block length {} too large", len)));
    }
    let mut block = vec![0u8; len as usize];
    reader.read_exact(&mut block)?;
    Ok(block)
}

pub fn read_record<R: Read>(reader: &mut R) -> Result<Record, BagError> {
    let header = Header::parse(&read_block(reader)?)?;
    let data = read_block(reader)?;
    Ok(Record { header, data })
}

/// Writes one record and returns the number of bytes written.
pub fn write_record<W: Write>(writer: &mut W, header: &Header, data: &[u8]) -> std::io::Result<u64> {
    let encoded = header.encode();
    writer.write_all(&(encoded.len() as u32).to_le_bytes())?;
    writer.write_all(&encoded)?;
    writer.write_all(&(data.len() as u32).to_le_bytes())?;
    writer.write_all(data)?;
    Ok(8 + encoded.len() as u64 + data.len() as u64)
}

/// Writes the bag header record with its header and data together padded
/// with spaces to `BAG_HEADER_LENGTH`.
pub fn write_bag_header<W: Write>(
    writer: &mut W,
    index_pos: u64,
    conn_count: u32,
    chunk_count: u32,
) -> std::io::Result<u64> {
    let header = Header::new()
        .with("op", [op::BAG_HEADER])
        .with("index_pos", index_pos.to_le_bytes())
        .with("conn_count", conn_count.to_le_bytes())
        .with("chunk_count", chunk_count.to_le_bytes());
    let padding = BAG_HEADER_LENGTH - header.encode().len();
    write_record(writer, &header, &vec![b' '; padding])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_field_layout() {
        let header = Header::new().with("op", [op::CHUNK]);
        assert_eq!(header.encode(), vec![4, 0, 0, 0, b'o', b'p', b'=', 0x05]);
    }

    #[test]
    fn test_header_value_may_contain_equals() {
        let header = Header::new().with("message_definition", "string a=b\n");
        let parsed = Header::parse(&header.encode()).unwrap();
        assert_eq!(parsed.string("message_definition").unwrap(), "string a=b\n");
    }

    #[test]
    fn test_truncated_header_is_rejected() {
        let mut bytes = Header::new().with("topic", "/status").encode();
        bytes.pop();
        assert!(matches!(
            Header::parse(&bytes),
            Err(BagError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_bag_header_is_padded_to_fixed_length() {
        let mut buf = Vec::new();
        let written = write_bag_header(&mut buf, 4117, 2, 1).unwrap();
        assert_eq!(written as usize, BAG_HEADER_RECORD_LENGTH);
        assert_eq!(buf.len(), 4104);
        assert_eq!(MAGIC.len() + buf.len(), 4117);

        let record = read_record(&mut Cursor::new(buf)).unwrap();
        assert_eq!(record.header.op().unwrap(), op::BAG_HEADER);
        assert_eq!(record.header.u64("index_pos").unwrap(), 4117);
        assert_eq!(record.header.u32("conn_count").unwrap(), 2);
        assert_eq!(record.header.u32("chunk_count").unwrap(), 1);
    }

    #[test]
    fn test_wrong_width_numeric_field() {
        let header = Header::new().with("conn", [1u8, 2]);
        assert!(header.u32("conn").is_err());
        assert!(matches!(header.u32("missing"), Err(BagError::MissingField(_))));
    }
}
